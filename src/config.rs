//! Config module.
//! Manages I/O for sweeper_config.json (window, margins, cell grid, delays, templates, OCR).
//! Uses serde for JSON serialization; every field has a default so partial files are fine.
//! Falls back to defaults when the file is missing. CLI flags are applied on top in main.

use crate::ocr::OcrMode;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "sweeper_config.json";

/// Pixels trimmed from each side of the captured window (title bar, borders).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Margins {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Default for Margins {
    fn default() -> Self {
        Margins {
            left: 10,
            top: 30,
            right: 10,
            bottom: 10,
        }
    }
}

/// Board size in cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSize {
    pub rows: u32,
    pub cols: u32,
}

/// File names of the reference templates inside `Config::template_dir`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateFiles {
    pub unrevealed: String,
    pub mine: String,
    pub empty: String,
    pub flag: String,
}

impl Default for TemplateFiles {
    fn default() -> Self {
        TemplateFiles {
            unrevealed: "cell.png".to_string(),
            mine: "mine.png".to_string(),
            empty: "noMine.png".to_string(),
            flag: "flag.png".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub mode: OcrMode,
    /// Tesseract executable, looked up on PATH unless absolute.
    pub command: String,
    /// Tesseract page segmentation mode; 10 treats the patch as one character.
    pub psm: u8,
}

impl Default for OcrConfig {
    fn default() -> Self {
        OcrConfig {
            mode: OcrMode::default(),
            command: "tesseract".to_string(),
            psm: 10,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Substring of the game window title.
    pub window_title: String,
    pub margins: Margins,
    /// Edge length of one cell in captured pixels.
    pub cell_size: u32,
    /// Crop the window interior to this many cells; `None` uses the whole interior.
    pub grid: Option<GridSize>,
    /// Captured pixels per screen point (2.0 on most HiDPI displays).
    pub pixel_scale: f64,
    pub startup_delay_ms: u64,
    pub settle_delay_ms: u64,
    pub settle_poll_ms: u64,
    /// Extra captures after the settle delay while waiting for a stable frame; 0 disables.
    pub settle_max_polls: u32,
    pub template_dir: PathBuf,
    pub templates: TemplateFiles,
    /// Baseline confidence at or above which an otherwise unknown cell counts as unrevealed.
    pub unrevealed_threshold: f32,
    pub ocr: OcrConfig,
    /// Write every classified cell as a PNG here when set.
    pub debug_cells_dir: Option<PathBuf>,
    /// Seed for move selection; random when unset.
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            window_title: "Saper".to_string(),
            margins: Margins::default(),
            cell_size: 50,
            grid: Some(GridSize { rows: 10, cols: 10 }),
            pixel_scale: 1.0,
            startup_delay_ms: 5000,
            settle_delay_ms: 1000,
            settle_poll_ms: 100,
            settle_max_polls: 5,
            template_dir: PathBuf::from("res"),
            templates: TemplateFiles::default(),
            unrevealed_threshold: 0.8,
            ocr: OcrConfig::default(),
            debug_cells_dir: None,
            seed: None,
        }
    }
}

impl Config {
    /// Reads `path`, or returns defaults if it does not exist. The result is validated.
    pub fn load(path: &Path) -> Result<Config> {
        let config = if path.exists() {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            let config: Config = serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse config {}", path.display()))?;
            log::info!("Loaded config from {}", path.display());
            config
        } else {
            log::info!("No config at {}, using defaults", path.display());
            Config::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)
            .with_context(|| format!("Failed to write config {}", path.display()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize config")
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_title.is_empty() {
            bail!("window_title must not be empty");
        }
        if self.cell_size == 0 {
            bail!("cell_size must be positive");
        }
        if let Some(grid) = self.grid {
            if grid.rows == 0 || grid.cols == 0 {
                bail!("grid must have at least one row and column, got {}x{}", grid.rows, grid.cols);
            }
            if grid.rows.checked_mul(self.cell_size).is_none()
                || grid.cols.checked_mul(self.cell_size).is_none()
            {
                bail!(
                    "grid of {}x{} cells of {}px does not fit in u32 pixels",
                    grid.rows,
                    grid.cols,
                    self.cell_size
                );
            }
        }
        if !(self.pixel_scale.is_finite() && self.pixel_scale > 0.0) {
            bail!("pixel_scale must be positive, got {}", self.pixel_scale);
        }
        if !(-1.0..=1.0).contains(&self.unrevealed_threshold) {
            bail!(
                "unrevealed_threshold must be within [-1, 1], got {}",
                self.unrevealed_threshold
            );
        }
        if self.settle_max_polls > 0 && self.settle_poll_ms == 0 {
            bail!("settle_poll_ms must be positive when settle_max_polls is set");
        }
        Ok(())
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn settle_poll(&self) -> Duration {
        Duration::from_millis(self.settle_poll_ms)
    }

    /// Board region size in captured pixels, if a grid is configured.
    /// `None` also when the size overflows, which `validate` rejects.
    pub fn board_pixels(&self) -> Option<(u32, u32)> {
        let g = self.grid?;
        Some((g.cols.checked_mul(self.cell_size)?, g.rows.checked_mul(self.cell_size)?))
    }
}
