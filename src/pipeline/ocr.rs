//! OCR of rasterised pages through the Tesseract command-line tool.
//!
//! Each page is written as a PNG to a [`tempfile`] handle and passed to
//! `tesseract <image> stdout -l <lang> --psm <n>`. The handle is dropped when
//! the call returns, so no image outlives its page on any exit path.
//!
//! [`OcrEngine`] is the seam the pipeline depends on; tests substitute a fake.

use crate::error::ExtractionError;
use image::GrayImage;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Command;
use tracing::debug;

/// Recognises the text of one pre-processed page image.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &GrayImage, page_num: usize) -> Result<String, ExtractionError>;
}

/// [`OcrEngine`] that shells out to the `tesseract` binary.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    binary: PathBuf,
    language: String,
    psm: u8,
}

impl TesseractOcr {
    pub fn new(binary: impl Into<PathBuf>, language: impl Into<String>, psm: u8) -> Self {
        Self {
            binary: binary.into(),
            language: language.into(),
            psm,
        }
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize(&self, image: &GrayImage, page_num: usize) -> Result<String, ExtractionError> {
        let tmp = tempfile::Builder::new()
            .prefix("techsheet-ocr-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| ExtractionError::Ocr {
                page: page_num,
                detail: format!("temp file: {e}"),
            })?;

        image
            .save_with_format(tmp.path(), image::ImageFormat::Png)
            .map_err(|e| ExtractionError::Ocr {
                page: page_num,
                detail: format!("PNG write: {e}"),
            })?;

        let output = Command::new(&self.binary)
            .arg(tmp.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg(self.psm.to_string())
            .output()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => ExtractionError::OcrUnavailable(format!(
                    "'{}' not found; install Tesseract or set --tesseract-path",
                    self.binary.display()
                )),
                _ => ExtractionError::OcrUnavailable(format!(
                    "could not start '{}': {e}",
                    self.binary.display()
                )),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionError::Ocr {
                page: page_num,
                detail: format!("{}: {}", output.status, crate::pipeline::preview(stderr.trim())),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("OCR page {}: {} chars", page_num, text.len());
        Ok(text)
    }
}

// ── Text cleanup ─────────────────────────────────────────────────────────

static RE_HYPHEN_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\p{L})-[ \t]*\n[ \t]*(\p{Ll})").unwrap());

static RE_INLINE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\x0B\x0C\u{00A0}]+").unwrap());

static RE_BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Normalise OCR output: re-join words hyphenated across line breaks,
/// collapse runs of horizontal whitespace, trim every line and keep at most
/// one blank line between paragraphs.
pub fn clean_ocr_text(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = RE_HYPHEN_BREAK.replace_all(&text, "$1$2");
    let text = RE_INLINE_WS.replace_all(&text, " ");
    let trimmed: Vec<&str> = text.lines().map(str::trim).collect();
    let joined = trimmed.join("\n");
    RE_BLANK_RUNS
        .replace_all(&joined, "\n\n")
        .trim()
        .to_string()
}
