//! Shared test fixtures: synthetic cell templates, board composition and fake collaborators.

use crate::board::CellLabel;
use crate::ocr::DigitOcr;
use crate::template::{Template, TemplateSet};
use anyhow::{bail, Result};
use image::{GrayImage, Luma};
use std::path::PathBuf;

pub const CELL: u32 = 10;

fn lit(size: u32, on: impl Fn(u32, u32) -> bool) -> GrayImage {
    GrayImage::from_fn(size, size, |x, y| if on(x, y) { Luma([255]) } else { Luma([0]) })
}

pub fn unrevealed_template() -> GrayImage {
    unrevealed_sized(CELL)
}

pub fn mine_template() -> GrayImage {
    mine_sized(CELL)
}

pub fn empty_template() -> GrayImage {
    empty_sized(CELL)
}

pub fn flag_template() -> GrayImage {
    flag_sized(CELL)
}

pub fn unrevealed_sized(size: u32) -> GrayImage {
    lit(size, |x, _| x < size / 2)
}

pub fn mine_sized(size: u32) -> GrayImage {
    lit(size, |_, y| y < size / 2)
}

pub fn empty_sized(size: u32) -> GrayImage {
    lit(size, |x, _| x >= size / 2)
}

pub fn flag_sized(size: u32) -> GrayImage {
    lit(size, |_, y| y >= size / 2)
}

/// Two pixels in the left column: weak baseline match, weaker candidate matches.
pub fn faint() -> GrayImage {
    lit(CELL, |x, y| x == 2 && (y == 2 || y == 7))
}

/// Both diagonals; ties with every template, so only OCR can label it.
pub fn glyph_sized(size: u32) -> GrayImage {
    lit(size, |x, y| x == y || x + y == size - 1)
}

pub fn glyph() -> GrayImage {
    glyph_sized(CELL)
}

pub fn template_set() -> TemplateSet {
    template_set_sized(CELL)
}

pub fn template_set_sized(size: u32) -> TemplateSet {
    TemplateSet::new(
        unrevealed_sized(size),
        vec![
            Template::new(CellLabel::Mine, mine_sized(size)),
            Template::new(CellLabel::Empty, empty_sized(size)),
            Template::new(CellLabel::Flagged, flag_sized(size)),
        ],
    )
}

/// Tiles equal-sized cell images into one board image, row-major.
pub fn compose(rows: &[Vec<GrayImage>]) -> GrayImage {
    let cell_w = rows[0][0].width();
    let cell_h = rows[0][0].height();
    let mut board = GrayImage::new(cell_w * rows[0].len() as u32, cell_h * rows.len() as u32);
    for (r, row) in rows.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            image::imageops::replace(&mut board, cell, (c as u32 * cell_w) as i64, (r as u32 * cell_h) as i64);
        }
    }
    board
}

/// Per-process scratch directory under the system temp dir.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("sweeper-bot-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Returns the text registered for an exactly matching patch, empty otherwise.
#[derive(Default)]
pub struct LookupOcr {
    pub entries: Vec<(GrayImage, String)>,
}

impl LookupOcr {
    pub fn with(mut self, patch: GrayImage, text: &str) -> Self {
        self.entries.push((patch, text.to_string()));
        self
    }
}

impl DigitOcr for LookupOcr {
    fn recognize(&self, patch: &GrayImage) -> Result<String> {
        Ok(self
            .entries
            .iter()
            .find(|(img, _)| img == patch)
            .map(|(_, text)| text.clone())
            .unwrap_or_default())
    }
}

/// Always fails, to exercise per-cell error absorption.
pub struct BrokenOcr;

impl DigitOcr for BrokenOcr {
    fn recognize(&self, _patch: &GrayImage) -> Result<String> {
        bail!("ocr engine crashed")
    }
}
