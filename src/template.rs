//! Template matching module.
//! Scores a cell image against reference templates using zero-mean normalized
//! cross-correlation (correlation coefficient). Scores lie in [-1, 1]: 1 for the same
//! pattern at any brightness and contrast, 0 for unrelated patterns, -1 for the inverted one.
//! Confidence is the best score over all placements; with equal-sized cell and template
//! there is exactly one placement.
//! Templates are loaded once at startup into an immutable `TemplateSet`.

use crate::board::CellLabel;
use crate::config::TemplateFiles;
use anyhow::{Context, Result};
use image::{GrayImage, ImageBuffer, Luma};
use imageproc::template_matching::find_extremes;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum MatchError {
    #[error("cell {cell:?} is smaller than template {template:?}")]
    TemplateTooLarge {
        cell: (u32, u32),
        template: (u32, u32),
    },
    /// Flat template, or no placement with any variance; the correlation is undefined.
    #[error("correlation undefined for a flat image or template")]
    Degenerate,
}

/// Returns the maximum correlation coefficient of `template` over `cell`.
pub fn match_confidence(cell: &GrayImage, template: &GrayImage) -> Result<f32, MatchError> {
    if cell.width() < template.width() || cell.height() < template.height() {
        return Err(MatchError::TemplateTooLarge {
            cell: cell.dimensions(),
            template: template.dimensions(),
        });
    }

    let (tw, th) = template.dimensions();
    let n = f64::from(tw * th);
    let t_mean = template.as_raw().iter().map(|&p| f64::from(p)).sum::<f64>() / n;
    let t_dev: Vec<f64> = template.as_raw().iter().map(|&p| f64::from(p) - t_mean).collect();
    let t_energy: f64 = t_dev.iter().map(|d| d * d).sum();
    if t_energy == 0.0 {
        return Err(MatchError::Degenerate);
    }

    let scores = ImageBuffer::from_fn(cell.width() - tw + 1, cell.height() - th + 1, |u, v| {
        Luma([placement_score(cell, u, v, &t_dev, tw, th, t_energy)])
    });
    let best = find_extremes(&scores).max_value;
    if !best.is_finite() {
        return Err(MatchError::Degenerate);
    }
    Ok(best)
}

/// Score of the window at (u, v). Flat windows score -inf so they never win.
fn placement_score(
    cell: &GrayImage,
    u: u32,
    v: u32,
    t_dev: &[f64],
    tw: u32,
    th: u32,
    t_energy: f64,
) -> f32 {
    let window = || {
        (0..th).flat_map(move |y| (0..tw).map(move |x| f64::from(cell.get_pixel(u + x, v + y)[0])))
    };
    let w_mean = window().sum::<f64>() / f64::from(tw * th);

    // The template deviations sum to zero, so the window mean drops out of the cross term.
    let mut cross = 0.0;
    let mut w_energy = 0.0;
    for (w, t) in window().zip(t_dev) {
        cross += w * t;
        w_energy += (w - w_mean) * (w - w_mean);
    }
    if w_energy == 0.0 {
        return f32::NEG_INFINITY;
    }
    (cross / (t_energy * w_energy).sqrt()).clamp(-1.0, 1.0) as f32
}

/// One labeled reference image.
#[derive(Clone, Debug)]
pub struct Template {
    pub label: CellLabel,
    pub image: GrayImage,
}

impl Template {
    pub fn new(label: CellLabel, image: GrayImage) -> Self {
        Template { label, image }
    }

    pub fn confidence(&self, cell: &GrayImage) -> Result<f32, MatchError> {
        match_confidence(cell, &self.image)
    }
}

/// The unrevealed baseline plus the candidate templates, in scan order.
#[derive(Clone, Debug)]
pub struct TemplateSet {
    baseline: Template,
    candidates: Vec<Template>,
}

impl TemplateSet {
    /// `candidates` are scanned in the given order; the first one wins ties.
    pub fn new(baseline: GrayImage, candidates: Vec<Template>) -> Self {
        TemplateSet {
            baseline: Template::new(CellLabel::Unrevealed, baseline),
            candidates,
        }
    }

    /// Loads unrevealed, mine, empty and flag templates from `dir`.
    /// Any missing or undecodable file is an error.
    pub fn load(dir: &Path, files: &TemplateFiles) -> Result<Self> {
        let baseline = load_gray(&dir.join(&files.unrevealed))?;
        let candidates = vec![
            Template::new(CellLabel::Mine, load_gray(&dir.join(&files.mine))?),
            Template::new(CellLabel::Empty, load_gray(&dir.join(&files.empty))?),
            Template::new(CellLabel::Flagged, load_gray(&dir.join(&files.flag))?),
        ];

        for t in std::iter::once(&baseline).chain(candidates.iter().map(|t| &t.image)) {
            log::debug!("Loaded template {:?}", t.dimensions());
        }

        Ok(TemplateSet::new(baseline, candidates))
    }

    pub fn baseline(&self) -> &Template {
        &self.baseline
    }

    pub fn candidates(&self) -> &[Template] {
        &self.candidates
    }

    /// Largest template extent; cells smaller than this can never match.
    pub fn max_dimensions(&self) -> (u32, u32) {
        std::iter::once(&self.baseline)
            .chain(self.candidates.iter())
            .fold((0, 0), |(w, h), t| (w.max(t.image.width()), h.max(t.image.height())))
    }
}

fn load_gray(path: &Path) -> Result<GrayImage> {
    let img = image::open(path)
        .with_context(|| format!("Failed to load template {}", path.display()))?;
    Ok(img.to_luma8())
}
