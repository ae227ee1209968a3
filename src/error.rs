//! Error types for the techsheet-audit library.
//!
//! Failures are split by how far they are allowed to travel:
//!
//! * [`AuditError`] is **fatal**: the audit cannot produce a report at all
//!   (unreadable input, every extraction strategy exhausted, analyzer gave
//!   nothing usable). Returned as `Err(AuditError)` from the top-level
//!   `audit*` functions.
//!
//! * [`ExtractionError`] is **non-fatal**: one extraction strategy (or one
//!   page within it) failed. The pipeline logs it, records it in the attempt
//!   log and moves on to the next tier.
//!
//! * [`AnalysisError`]: a single analyzer or vision call failed. Inside the
//!   vision tier it only costs one page; at the analysis stage it becomes
//!   [`AuditError::AnalysisFailed`].
//!
//! Report-level defects ([`crate::report::MalformedReport`]) and rendering
//! glitches ([`crate::report::RenderFault`]) live next to the code that
//! produces them; neither aborts an audit.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the techsheet-audit library.
#[derive(Debug, Error)]
pub enum AuditError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The bytes were read, but they are not a PDF.
    #[error("Input '{source_name}' is not a valid PDF\nFirst bytes: {magic:?}")]
    NotAPdf { source_name: String, magic: Vec<u8> },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// Native text, OCR and vision all failed to produce any text.
    #[error(
        "No text could be extracted from the document ({pages} pages).\nAttempts: {}",
        .attempts.join("; ")
    )]
    ExtractionExhausted { pages: usize, attempts: Vec<String> },

    /// The report analyzer returned no usable text.
    #[error("Report analysis failed: {reason}")]
    AnalysisFailed { reason: String },

    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Serialising the report PDF failed.
    #[error("Failed to serialise the report PDF: {0}")]
    RenderFailed(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Checklist data could not be loaded or is inconsistent.
    #[error("Invalid checklist: {0}")]
    InvalidChecklist(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal failure inside one extraction strategy.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ExtractionError {
    /// The native text layer could not be read.
    #[error("text layer extraction failed: {0}")]
    TextLayer(String),

    /// The pdfium library could not be loaded.
    #[error("pdfium unavailable: {0}")]
    PdfiumBinding(String),

    /// The document could not be opened for rasterisation.
    #[error("could not open PDF for rasterisation: {0}")]
    DocumentLoad(String),

    /// A single page failed to rasterise.
    #[error("page {page}: rasterisation failed: {detail}")]
    Rasterisation { page: usize, detail: String },

    /// The OCR engine is missing or could not be started.
    #[error("OCR engine unavailable: {0}")]
    OcrUnavailable(String),

    /// OCR ran but failed on a page.
    #[error("page {page}: OCR failed: {detail}")]
    Ocr { page: usize, detail: String },

    /// A page image could not be encoded for the vision service.
    #[error("page {page}: image encoding failed: {detail}")]
    Encoding { page: usize, detail: String },

    /// The vision service failed on a page.
    #[error("page {page}: vision fallback failed: {detail}")]
    Vision { page: usize, detail: String },

    /// A blocking worker panicked or was cancelled.
    #[error("extraction worker failed: {0}")]
    Worker(String),
}

/// A failed call to the analyzer or the vision service.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum AnalysisError {
    /// The call did not complete within the configured timeout.
    #[error("call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The provider returned an error after all retries.
    #[error("provider error after {retries} retries: {detail}")]
    Provider { retries: u32, detail: String },

    /// The provider answered with nothing usable.
    #[error("empty response from the model")]
    EmptyResponse,
}
