//! # techsheet-audit
//!
//! Audit food-product technical data sheets (PDF) against a 20-point
//! compliance checklist and produce a formatted PDF report.
//!
//! ## Why this crate?
//!
//! Supplier data sheets arrive in every shape: clean exports with a text
//! layer, scans with no text at all, and mixes of both. This crate gets text
//! out of all of them by degrading through extraction strategies, hands it to
//! a language model together with the checklist, and turns the model's
//! free-form answer into a structured report with a stable layout.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      resolve local file or download from URL
//!  ├─ 2. Extract    native text layer → Tesseract OCR → vision model
//!  ├─ 3. Analyze    checklist prompt + document text → model answer
//!  ├─ 4. Normalize  line state machine → Report (20 findings + summary)
//!  └─ 5. Render     wrap + paginate → A4 PDF (lopdf)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use techsheet_audit::{audit_to_file, AuditConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = AuditConfig::default();
//!     let output = audit_to_file("fiche.pdf", "rapport.pdf", &config).await?;
//!     eprintln!(
//!         "{} findings via {}, decision: {}",
//!         output.report.findings.len(),
//!         output.method,
//!         output.report.summary.decision
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `techsheet-audit` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! ## External Tools
//!
//! OCR shells out to the `tesseract` binary (with the `fra` language data)
//! and rasterisation needs the pdfium shared library. Both are optional at
//! runtime: a missing tool only disables its strategy.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod audit;
pub mod checklist;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod report;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use audit::{audit, audit_from_bytes, audit_sync, audit_to_file, Auditor};
pub use checklist::{Checklist, ControlPoint, Severity};
pub use config::{AuditConfig, AuditConfigBuilder, LayoutConfig};
pub use error::{AnalysisError, AuditError, ExtractionError};
pub use output::{AuditOutput, AuditStats};
pub use pipeline::extract::{ExtractedText, ExtractionMethod, ExtractionPipeline, StrategyAttempt, StrategyOutcome};
pub use pipeline::input::Document;
pub use pipeline::llm::{ReportAnalyzer, VisionClient};
pub use progress::{AuditProgressCallback, AuditStage, NoopProgressCallback, ProgressCallback};
pub use report::{
    normalize, render_report, render_text, Decision, Evidence, Finding, FindingStatus,
    MalformedReport, Recommendation, RenderFault, RenderedReport, Report, Summary,
};
