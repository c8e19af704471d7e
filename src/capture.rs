//! Screen capture module
//! Uses `xcap` to find the game window by title and capture it.
//! Trims the configured margins (title bar, borders) and crops to the board grid.
//! Latency goal: 30-50ms.

use crate::board::Move;
use crate::config::{Config, Margins};
use anyhow::{bail, Context, Result};
use image::{DynamicImage, GenericImageView, GrayImage};
use std::env;
use std::fs;
use std::time::Instant;
use xcap::Window;

/// A captured board image and where it sits on screen.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub image: GrayImage,
    /// Screen position (in points) of the image's top-left pixel.
    pub origin: (f64, f64),
    /// Captured pixels per screen point.
    pub scale: f64,
}

impl Frame {
    /// Screen coordinates of the centre of the cell at `mv`.
    pub fn cell_center(&self, mv: Move, cell_size: u32) -> (f64, f64) {
        let half = f64::from(cell_size) / 2.0;
        let px = mv.col as f64 * f64::from(cell_size) + half;
        let py = mv.row as f64 * f64::from(cell_size) + half;
        (self.origin.0 + px / self.scale, self.origin.1 + py / self.scale)
    }
}

/// Source of board captures.
pub trait Screen {
    /// Returns `None` when the target window does not exist.
    fn capture(&mut self) -> Result<Option<Frame>>;
}

/// Captures a desktop window whose title contains `title`.
pub struct WindowScreen {
    title: String,
    margins: Margins,
    board_pixels: Option<(u32, u32)>,
    scale: f64,
}

impl WindowScreen {
    pub fn from_config(config: &Config) -> Self {
        WindowScreen {
            title: config.window_title.clone(),
            margins: config.margins,
            board_pixels: config.board_pixels(),
            scale: config.pixel_scale,
        }
    }
}

impl Screen for WindowScreen {
    /// Permissions note: On macOS, grant "Screen & System Audio Recording" permission to the terminal.
    /// Debug: Set env var `DEBUG_CAPTURE=1` to save the cropped board to `screenshots/debug_board.png`.
    fn capture(&mut self) -> Result<Option<Frame>> {
        let start = Instant::now();

        let Some(window) = find_window(&self.title)? else {
            return Ok(None);
        };

        let x = window.x().context("Failed to read window position")?;
        let y = window.y().context("Failed to read window position")?;
        let raw = window
            .capture_image()
            .context("Failed to capture window. On macOS, ensure the terminal has Screen Recording permission in System Settings > Privacy & Security")?;

        let screenshot = DynamicImage::ImageRgba8(raw);
        if screenshot.dimensions() == (0, 0) {
            bail!("Captured empty window image - possible permission issue or minimized window");
        }

        let board = crop_board(&screenshot, self.margins, self.board_pixels)?;
        if env::var_os("DEBUG_CAPTURE").is_some() {
            fs::create_dir_all("screenshots")
                .context("Failed to create screenshots/ debug directory")?;
            board
                .save("screenshots/debug_board.png")
                .context("Failed to save debug board image to screenshots/")?;
        }

        let frame = Frame {
            image: board.to_luma8(),
            origin: (
                f64::from(x) + f64::from(self.margins.left) / self.scale,
                f64::from(y) + f64::from(self.margins.top) / self.scale,
            ),
            scale: self.scale,
        };

        log::debug!("Capture + crop latency: {:?}", start.elapsed());
        Ok(Some(frame))
    }
}

/// First window (in enumeration order) whose title contains `title`.
pub fn find_window(title: &str) -> Result<Option<Window>> {
    let windows = Window::all().context("Failed to enumerate windows")?;
    for window in windows {
        // Windows without a readable title are skipped, not fatal.
        match window.title() {
            Ok(t) if t.contains(title) => return Ok(Some(window)),
            _ => continue,
        }
    }
    Ok(None)
}

/// Trims `margins` off a window capture, then keeps the top-left `board` region if given.
pub fn crop_board(
    screenshot: &DynamicImage,
    margins: Margins,
    board: Option<(u32, u32)>,
) -> Result<DynamicImage> {
    let (w, h) = screenshot.dimensions();
    let horizontal = margins.left.saturating_add(margins.right);
    let vertical = margins.top.saturating_add(margins.bottom);
    if horizontal >= w || vertical >= h {
        bail!(
            "Margins {:?} leave nothing of the {}x{} window capture",
            margins,
            w,
            h
        );
    }

    let (inner_w, inner_h) = (w - horizontal, h - vertical);
    let (crop_w, crop_h) = match board {
        Some((bw, bh)) => {
            if bw > inner_w || bh > inner_h {
                bail!(
                    "Window interior {}x{} is smaller than the {}x{} board",
                    inner_w,
                    inner_h,
                    bw,
                    bh
                );
            }
            (bw, bh)
        }
        None => (inner_w, inner_h),
    };

    Ok(screenshot.crop_imm(margins.left, margins.top, crop_w, crop_h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn window_capture(w: u32, h: u32) -> DynamicImage {
        // Pixel value encodes its own x coordinate so crops can be checked.
        DynamicImage::ImageRgba8(RgbaImage::from_fn(w, h, |x, y| {
            Rgba([x as u8, y as u8, 0, 255])
        }))
    }

    #[test]
    fn test_crop_trims_margins() {
        let margins = Margins { left: 10, top: 30, right: 10, bottom: 10 };
        let board = crop_board(&window_capture(120, 140), margins, None).unwrap();
        assert_eq!(board.dimensions(), (100, 100));
        assert_eq!(board.to_rgba8().get_pixel(0, 0).0[..2], [10, 30]);
    }

    #[test]
    fn test_crop_to_grid() {
        let margins = Margins { left: 5, top: 5, right: 5, bottom: 5 };
        let board = crop_board(&window_capture(130, 90), margins, Some((100, 50))).unwrap();
        assert_eq!(board.dimensions(), (100, 50));
    }

    #[test]
    fn test_crop_rejects_board_larger_than_window() {
        let margins = Margins::default();
        assert!(crop_board(&window_capture(100, 100), margins, Some((500, 500))).is_err());
    }

    #[test]
    fn test_crop_rejects_margins_covering_window() {
        let margins = Margins { left: 50, top: 0, right: 50, bottom: 0 };
        assert!(crop_board(&window_capture(100, 100), margins, None).is_err());
    }

    #[test]
    fn test_cell_center_maps_to_screen() {
        let frame = Frame {
            image: GrayImage::new(100, 100),
            origin: (200.0, 330.0),
            scale: 1.0,
        };
        assert_eq!(frame.cell_center(Move::new(0, 0), 50), (225.0, 355.0));
        assert_eq!(frame.cell_center(Move::new(1, 0), 50), (225.0, 405.0));
        assert_eq!(frame.cell_center(Move::new(0, 1), 50), (275.0, 355.0));
    }

    #[test]
    fn test_cell_center_honours_scale() {
        let frame = Frame {
            image: GrayImage::new(200, 200),
            origin: (10.0, 20.0),
            scale: 2.0,
        };
        assert_eq!(frame.cell_center(Move::new(1, 1), 100), (85.0, 95.0));
    }

    #[test]
    #[ignore = "requires graphical display and screen recording permissions"]
    fn test_missing_window_is_none() {
        let mut screen = WindowScreen::from_config(&Config {
            window_title: "no window is called this 7f3a".to_string(),
            ..Config::default()
        });
        assert!(screen.capture().unwrap().is_none());
    }
}
