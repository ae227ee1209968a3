//! Progress-callback trait for stage and per-page audit events.
//!
//! Inject an [`Arc<dyn AuditProgressCallback>`] via
//! [`crate::config::AuditConfigBuilder::progress_callback`] to follow an
//! audit as it moves through extraction tiers, analysis and rendering.
//!
//! # Example
//!
//! ```rust
//! use techsheet_audit::{AuditConfig, AuditProgressCallback, AuditStage};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct PageCounter {
//!     pages: AtomicUsize,
//! }
//!
//! impl AuditProgressCallback for PageCounter {
//!     fn on_page_complete(&self, stage: AuditStage, page_num: usize, total_pages: usize, chars: usize) {
//!         self.pages.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{stage}: page {page_num}/{total_pages} ({chars} chars)");
//!     }
//! }
//!
//! let config = AuditConfig::builder()
//!     .progress_callback(Arc::new(PageCounter { pages: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Coarse step of an audit, as reported to progress callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditStage {
    NativeText,
    Ocr,
    Vision,
    Analysis,
    Rendering,
}

impl fmt::Display for AuditStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuditStage::NativeText => "native text",
            AuditStage::Ocr => "OCR",
            AuditStage::Vision => "vision",
            AuditStage::Analysis => "analysis",
            AuditStage::Rendering => "rendering",
        })
    }
}

/// Called by the auditor as it works through a document.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Pages are processed one after another, but the
/// callback may be invoked from a blocking worker thread, hence `Send + Sync`.
pub trait AuditProgressCallback: Send + Sync {
    /// Called once the text layer has been read.
    ///
    /// * `total_pages`: page count, or 0 when the text layer was unreadable
    fn on_audit_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called when a stage begins.
    fn on_stage_start(&self, stage: AuditStage) {
        let _ = stage;
    }

    /// Called before a page is processed by a page-level stage (OCR, vision).
    fn on_page_start(&self, stage: AuditStage, page_num: usize, total_pages: usize) {
        let _ = (stage, page_num, total_pages);
    }

    /// Called when a page produced text.
    ///
    /// * `chars`: characters of text the page contributed
    fn on_page_complete(&self, stage: AuditStage, page_num: usize, total_pages: usize, chars: usize) {
        let _ = (stage, page_num, total_pages, chars);
    }

    /// Called when a page failed inside a stage. The stage carries on.
    fn on_page_error(&self, stage: AuditStage, page_num: usize, total_pages: usize, error: &str) {
        let _ = (stage, page_num, total_pages, error);
    }

    /// Called when a stage ends.
    ///
    /// * `succeeded`: for extraction tiers, whether the tier produced the
    ///   document text; for analysis and rendering, whether the step completed
    fn on_stage_complete(&self, stage: AuditStage, succeeded: bool) {
        let _ = (stage, succeeded);
    }

    /// Called once after the report PDF has been produced.
    fn on_audit_complete(&self, report_pages: usize) {
        let _ = report_pages;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AuditProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AuditConfig`].
pub type ProgressCallback = Arc<dyn AuditProgressCallback>;
