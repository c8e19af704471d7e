//! Cell classifier.
//! Tiles a captured board image into fixed-size cells (top-left origin, row-major) and labels
//! each one:
//! 1. score against the unrevealed template (baseline)
//! 2. score against mine, empty and flag templates, best one wins only if it beats the baseline
//! 3. otherwise OCR the cell for a digit
//! 4. otherwise unrevealed if the baseline is strong enough, else unknown
//!
//! A failure on one cell downgrades that cell to unknown and never aborts the board.

use crate::board::{BoardState, CellLabel};
use crate::ocr::{parse_digit, DigitOcr};
use crate::template::TemplateSet;
use anyhow::{Context, Result};
use image::GrayImage;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("board image {width}x{height} is not a multiple of cell size {cell_size}")]
    Misaligned {
        width: u32,
        height: u32,
        cell_size: u32,
    },
    #[error("board image is empty")]
    Empty,
}

/// What the classifier decided for one cell, handed to a `CellObserver`.
pub struct CellReport<'a> {
    pub row: usize,
    pub col: usize,
    pub image: &'a GrayImage,
    pub label: CellLabel,
    /// Winning template score, or the baseline score when no candidate won; `None` on failure.
    pub confidence: Option<f32>,
}

/// Called once per classified cell, in row-major order.
pub trait CellObserver: Send {
    fn on_cell(&mut self, report: &CellReport<'_>);
}

pub struct NoopObserver;

impl CellObserver for NoopObserver {
    fn on_cell(&mut self, _report: &CellReport<'_>) {}
}

/// Writes every classified cell to `dir` as `cell_{row}_{col}_{label}_{confidence}.png`.
pub struct CellDump {
    dir: PathBuf,
}

impl CellDump {
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create cell dump directory {}", dir.display()))?;
        Ok(CellDump {
            dir: dir.to_path_buf(),
        })
    }

    fn file_name(report: &CellReport<'_>) -> String {
        let label = match report.label {
            CellLabel::Unrevealed => "unrevealed".to_string(),
            CellLabel::Mine => "mine".to_string(),
            CellLabel::Empty => "empty".to_string(),
            CellLabel::Flagged => "flag".to_string(),
            CellLabel::Digit(n) => n.to_string(),
            CellLabel::Unknown => "unknown".to_string(),
        };
        format!(
            "cell_{}_{}_{}_{:.2}.png",
            report.row,
            report.col,
            label,
            report.confidence.unwrap_or(f32::NAN)
        )
    }
}

impl CellObserver for CellDump {
    fn on_cell(&mut self, report: &CellReport<'_>) {
        let path = self.dir.join(Self::file_name(report));
        if let Err(e) = report.image.save(&path) {
            log::warn!("Failed to write {}: {}", path.display(), e);
        }
    }
}

pub struct Classifier {
    templates: TemplateSet,
    ocr: Box<dyn DigitOcr>,
    cell_size: u32,
    unrevealed_threshold: f32,
}

impl Classifier {
    pub fn new(
        templates: TemplateSet,
        ocr: Box<dyn DigitOcr>,
        cell_size: u32,
        unrevealed_threshold: f32,
    ) -> Self {
        let (tw, th) = templates.max_dimensions();
        if tw > cell_size || th > cell_size {
            log::warn!(
                "Templates up to {}x{} are larger than the {}px cell; those cells will be unknown",
                tw,
                th,
                cell_size
            );
        }
        Classifier {
            templates,
            ocr,
            cell_size,
            unrevealed_threshold,
        }
    }

    pub fn cell_size(&self) -> u32 {
        self.cell_size
    }

    pub fn classify(&self, board: &GrayImage) -> Result<BoardState> {
        self.classify_with(board, &mut NoopObserver)
    }

    /// Classifies every cell of `board`. Rejects images whose size is not a whole number of cells.
    pub fn classify_with(
        &self,
        board: &GrayImage,
        observer: &mut dyn CellObserver,
    ) -> Result<BoardState> {
        let start = Instant::now();
        let (width, height) = board.dimensions();
        if width == 0 || height == 0 {
            return Err(ClassifyError::Empty.into());
        }
        if width % self.cell_size != 0 || height % self.cell_size != 0 {
            return Err(ClassifyError::Misaligned {
                width,
                height,
                cell_size: self.cell_size,
            }
            .into());
        }

        let rows = (height / self.cell_size) as usize;
        let cols = (width / self.cell_size) as usize;
        let mut labels = Vec::with_capacity(rows * cols);

        for row in 0..rows {
            for col in 0..cols {
                let cell = image::imageops::crop_imm(
                    board,
                    col as u32 * self.cell_size,
                    row as u32 * self.cell_size,
                    self.cell_size,
                    self.cell_size,
                )
                .to_image();

                let (label, confidence) = match self.classify_cell(&cell) {
                    Ok((label, confidence)) => (label, Some(confidence)),
                    Err(e) => {
                        log::warn!("Cell ({}, {}) left unknown: {:#}", row, col, e);
                        (CellLabel::Unknown, None)
                    }
                };

                observer.on_cell(&CellReport {
                    row,
                    col,
                    image: &cell,
                    label,
                    confidence,
                });
                labels.push(label);
            }
        }

        log::debug!("Classified {}x{} board in {:?}", rows, cols, start.elapsed());
        BoardState::new(rows, cols, labels)
    }

    /// Labels one cell and returns the confidence behind the decision.
    pub fn classify_cell(&self, cell: &GrayImage) -> Result<(CellLabel, f32)> {
        let baseline = self.templates.baseline().confidence(cell)?;

        // Strict > keeps the first candidate on ties.
        let mut best: Option<(CellLabel, f32)> = None;
        for template in self.templates.candidates() {
            let score = template.confidence(cell)?;
            let bar = best.map_or(baseline, |(_, s)| s);
            if score > bar {
                best = Some((template.label, score));
            }
        }
        if let Some(hit) = best {
            return Ok(hit);
        }

        let text = self.ocr.recognize(cell).context("OCR failed")?;
        if let Some(digit) = parse_digit(&text) {
            return Ok((digit, baseline));
        }

        if baseline >= self.unrevealed_threshold {
            Ok((CellLabel::Unrevealed, baseline))
        } else {
            Ok((CellLabel::Unknown, baseline))
        }
    }
}
