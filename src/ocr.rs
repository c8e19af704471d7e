//! OCR facade module - reads the digit printed on a revealed cell.
//! The classifier only talks to the `DigitOcr` trait, so the backend can be swapped:
//! - **Tesseract mode**: shells out to the `tesseract` CLI (PNG on stdin, text on stdout)
//! - **Off mode**: never recognizes anything, every non-template cell stays unknown

use crate::board::CellLabel;
use crate::config::OcrConfig;
use anyhow::{bail, Context, Result};
use image::{GrayImage, ImageFormat};
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Write};
use std::process::{Command, Stdio};
use std::str::FromStr;

/// OCR implementation mode
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrMode {
    /// Tesseract command-line engine
    #[default]
    Tesseract,
    /// No OCR
    Off,
}

impl std::fmt::Display for OcrMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OcrMode::Tesseract => write!(f, "tesseract"),
            OcrMode::Off => write!(f, "off"),
        }
    }
}

impl FromStr for OcrMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "tesseract" => Ok(OcrMode::Tesseract),
            "off" => Ok(OcrMode::Off),
            other => bail!("Unknown OCR mode '{}'", other),
        }
    }
}

/// Recognizes text on a small grayscale patch in single-token mode.
/// Runs on the blocking pool during classification, hence `Send + Sync`.
pub trait DigitOcr: Send + Sync {
    /// Returns the recognized text, possibly empty.
    fn recognize(&self, patch: &GrayImage) -> Result<String>;
}

/// Turns OCR output into a digit label: non-empty, decimal digits only, value 1..=8.
pub fn parse_digit(text: &str) -> Option<CellLabel> {
    let text = text.trim();
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    text.parse::<u8>().ok().and_then(CellLabel::digit)
}

/// Builds the backend selected in the config.
/// Falls back to `NoOcr` with a warning when tesseract cannot be started.
pub fn from_config(config: &OcrConfig) -> Box<dyn DigitOcr> {
    match config.mode {
        OcrMode::Tesseract => {
            let engine = Tesseract::new(&config.command, config.psm);
            if engine.is_available() {
                Box::new(engine)
            } else {
                log::warn!(
                    "'{} --version' failed; digit recognition disabled (install tesseract or set ocr.mode = \"off\")",
                    config.command
                );
                Box::new(NoOcr)
            }
        }
        OcrMode::Off => Box::new(NoOcr),
    }
}

pub struct NoOcr;

impl DigitOcr for NoOcr {
    fn recognize(&self, _patch: &GrayImage) -> Result<String> {
        Ok(String::new())
    }
}

pub struct Tesseract {
    command: String,
    psm: u8,
}

impl Tesseract {
    pub fn new(command: &str, psm: u8) -> Self {
        Tesseract {
            command: command.to_string(),
            psm,
        }
    }

    pub fn is_available(&self) -> bool {
        Command::new(&self.command)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn args(&self) -> Vec<String> {
        vec![
            "stdin".to_string(),
            "stdout".to_string(),
            "--psm".to_string(),
            self.psm.to_string(),
            "-c".to_string(),
            "tessedit_char_whitelist=0123456789".to_string(),
        ]
    }
}

impl DigitOcr for Tesseract {
    fn recognize(&self, patch: &GrayImage) -> Result<String> {
        let mut png = Vec::new();
        patch
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .context("Failed to encode cell for OCR")?;

        let mut child = Command::new(&self.command)
            .args(self.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to start {}", self.command))?;

        {
            // Dropped at the end of the block so tesseract sees EOF.
            let mut stdin = child.stdin.take().context("tesseract stdin unavailable")?;
            stdin
                .write_all(&png)
                .context("Failed to send cell to tesseract")?;
        }

        let output = child
            .wait_with_output()
            .context("Failed to read tesseract output")?;
        if !output.status.success() {
            bail!(
                "tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
