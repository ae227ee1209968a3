//! Pipeline stages that turn a PDF into analysable text.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ text_layer ──(too short)──▶ rasterize ──▶ preprocess ──▶ ocr
//!                                          │
//!                          (still empty) ──┴──▶ encode ──▶ llm (vision)
//! ```
//!
//! 1. [`input`]: resolve a path, URL or buffer into an immutable `Document`
//! 2. [`text_layer`]: native text via `pdf-extract`
//! 3. [`rasterize`]: pdfium page renders, in `spawn_blocking`
//! 4. [`preprocess`]: contrast/grayscale/threshold chain before OCR
//! 5. [`ocr`]: Tesseract per page
//! 6. [`encode`]: PNG + base64 for the vision model
//! 7. [`llm`]: analyzer and vision clients with retry/backoff
//! 8. [`extract`]: the strategy orchestration tying 2–7 together

pub mod encode;
pub mod extract;
pub mod input;
pub mod llm;
pub mod ocr;
pub mod preprocess;
pub mod rasterize;
pub mod text_layer;

const PREVIEW_CHARS: usize = 120;

/// First 120 characters of `text` on one line, for log messages.
pub(crate) fn preview(text: &str) -> String {
    let mut out: String = text
        .chars()
        .take(PREVIEW_CHARS)
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    if text.chars().nth(PREVIEW_CHARS).is_some() {
        out.push('…');
    }
    out
}
