//! Result types returned by the audit entry points.

use crate::pipeline::extract::{ExtractionMethod, StrategyAttempt};
use crate::report::{RenderFault, Report};
use serde::{Deserialize, Serialize};

/// Everything an audit produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditOutput {
    /// The rendered report PDF.
    #[serde(skip)]
    pub pdf: Vec<u8>,
    pub report: Report,
    /// Strategy that produced the document text.
    pub method: ExtractionMethod,
    /// Extraction attempt log, in the order the strategies ran.
    pub attempts: Vec<StrategyAttempt>,
    /// Analyzer output before normalization.
    pub raw_report: String,
    /// Control points with no block in the model output. Empty when complete.
    pub missing_points: Vec<usize>,
    /// Human-readable warnings: malformed report, render substitutions.
    pub warnings: Vec<String>,
    pub faults: Vec<RenderFault>,
    pub stats: AuditStats,
}

impl AuditOutput {
    /// True when every control point has a block.
    pub fn is_complete(&self) -> bool {
        self.missing_points.is_empty()
    }
}

/// Sizes and timings of one audit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStats {
    /// Pages in the source document.
    pub source_pages: usize,
    /// Characters of extracted text sent to the analyzer, before truncation.
    pub extracted_chars: usize,
    /// Pages in the rendered report.
    pub report_pages: usize,
    pub report_bytes: usize,
    pub extraction_duration_ms: u64,
    pub analysis_duration_ms: u64,
    pub render_duration_ms: u64,
    pub total_duration_ms: u64,
}
