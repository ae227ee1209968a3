//! End-to-end audit: input → extraction → analysis → normalization → PDF.
//!
//! [`Auditor`] owns the collaborators, so tests can swap in fakes for the
//! extraction backends and the analyzer. The free functions build an
//! `Auditor` from an [`AuditConfig`] for one-shot use.
//!
//! Only two conditions abort an audit: no text could be extracted, or the
//! analyzer gave nothing usable. A report that misses control points is
//! rendered anyway and flagged in [`AuditOutput::warnings`].

use crate::checklist::Checklist;
use crate::config::{AuditConfig, LayoutConfig};
use crate::error::AuditError;
use crate::output::{AuditOutput, AuditStats};
use crate::pipeline::extract::{ExtractionMethod, ExtractionPipeline};
use crate::pipeline::input::{self, Document};
use crate::pipeline::llm::{
    resolve_provider, CallSettings, LlmReportAnalyzer, LlmVisionClient, ReportAnalyzer,
};
use crate::progress::{AuditStage, ProgressCallback};
use crate::prompts::analysis_prompt;
use crate::report;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs audits with a fixed set of collaborators.
pub struct Auditor {
    pipeline: ExtractionPipeline,
    analyzer: Arc<dyn ReportAnalyzer>,
    checklist: Arc<Checklist>,
    layout: LayoutConfig,
    download_timeout_secs: u64,
    progress: Option<ProgressCallback>,
}

impl Auditor {
    /// Auditor from explicit collaborators; checklist, layout and progress come from `config`.
    pub fn new(
        pipeline: ExtractionPipeline,
        analyzer: Arc<dyn ReportAnalyzer>,
        config: &AuditConfig,
    ) -> Self {
        Self {
            pipeline,
            analyzer,
            checklist: Arc::clone(&config.checklist),
            layout: config.layout.clone(),
            download_timeout_secs: config.download_timeout_secs,
            progress: config.progress_callback.clone(),
        }
    }

    /// Auditor with the default backends and an LLM provider resolved from
    /// `config` or the environment. The same provider serves analysis and
    /// the vision fallback.
    pub fn from_config(config: &AuditConfig) -> Result<Self, AuditError> {
        let provider = resolve_provider(config)?;
        let settings = CallSettings::from(config);
        let vision = LlmVisionClient::new(Arc::clone(&provider), settings.clone());
        let analyzer = LlmReportAnalyzer::new(provider, settings, config.max_input_chars);
        let pipeline = ExtractionPipeline::from_config(config).with_vision(Arc::new(vision));
        Ok(Self::new(pipeline, Arc::new(analyzer), config))
    }

    pub fn checklist(&self) -> &Checklist {
        &self.checklist
    }

    /// Audit a local path or HTTP/HTTPS URL.
    pub async fn audit(&self, input: &str) -> Result<AuditOutput, AuditError> {
        info!("Starting audit: {}", input);
        let document = input::resolve_input(input, self.download_timeout_secs).await?;
        self.audit_document(&document).await
    }

    /// Audit PDF bytes already in memory.
    pub async fn audit_bytes(
        &self,
        bytes: impl Into<Arc<[u8]>>,
        source: &str,
    ) -> Result<AuditOutput, AuditError> {
        let document = Document::from_bytes(bytes, source)?;
        self.audit_document(&document).await
    }

    /// Audit a resolved document.
    pub async fn audit_document(&self, document: &Document) -> Result<AuditOutput, AuditError> {
        let total_start = Instant::now();

        // ── Step 1: Extract text ─────────────────────────────────────────
        let extraction_start = Instant::now();
        let extracted = self.pipeline.extract(document).await.into_result()?;
        let extraction_duration_ms = extraction_start.elapsed().as_millis() as u64;
        let method = extracted.method.unwrap_or(ExtractionMethod::NativeText);
        info!(
            "Extracted {} chars from {} page(s) via {} in {}ms",
            extracted.text.chars().count(),
            extracted.page_count,
            method,
            extraction_duration_ms
        );

        // ── Step 2: Analyze ──────────────────────────────────────────────
        self.stage_start(AuditStage::Analysis);
        let analysis_start = Instant::now();
        let prompt = analysis_prompt(&self.checklist);
        let analysis_input = extracted.analysis_input();
        let raw_report = match self.analyzer.analyze(&analysis_input, &prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                self.stage_complete(AuditStage::Analysis, false);
                return Err(AuditError::AnalysisFailed {
                    reason: e.to_string(),
                });
            }
        };
        let analysis_duration_ms = analysis_start.elapsed().as_millis() as u64;
        debug!(
            "Analyzer returned {} chars in {}ms",
            raw_report.len(),
            analysis_duration_ms
        );

        // ── Step 3: Normalize ────────────────────────────────────────────
        let mut warnings = Vec::new();
        let (report, missing_points) = match report::normalize(&raw_report, &self.checklist) {
            Ok(report) => (report, Vec::new()),
            Err(malformed) => {
                warn!("{}; rendering the partial report", malformed);
                warnings.push(malformed.to_string());
                (malformed.partial, malformed.missing)
            }
        };
        for note in &report.notes {
            debug!("normalize: {}", note);
        }
        self.stage_complete(AuditStage::Analysis, true);

        // ── Step 4: Render ───────────────────────────────────────────────
        self.stage_start(AuditStage::Rendering);
        let render_start = Instant::now();
        let rendered = match report::render_report(&report, &self.layout) {
            Ok(rendered) => rendered,
            Err(e) => {
                self.stage_complete(AuditStage::Rendering, false);
                return Err(e);
            }
        };
        let render_duration_ms = render_start.elapsed().as_millis() as u64;
        if !rendered.faults.is_empty() {
            warnings.push(format!(
                "{} character(s) could not be drawn and were substituted",
                rendered.faults.len()
            ));
        }
        self.stage_complete(AuditStage::Rendering, true);

        let stats = AuditStats {
            source_pages: extracted.page_count,
            extracted_chars: extracted.text.chars().count(),
            report_pages: rendered.pages,
            report_bytes: rendered.bytes.len(),
            extraction_duration_ms,
            analysis_duration_ms,
            render_duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        };
        info!(
            "Audit complete: {} finding(s), decision '{}', {} report page(s), {}ms total",
            report.findings.len(),
            report.summary.decision,
            stats.report_pages,
            stats.total_duration_ms
        );
        if let Some(ref cb) = self.progress {
            cb.on_audit_complete(rendered.pages);
        }

        Ok(AuditOutput {
            pdf: rendered.bytes,
            report,
            method,
            attempts: extracted.attempts,
            raw_report,
            missing_points,
            warnings,
            faults: rendered.faults,
            stats,
        })
    }

    /// Audit `input` and write the report PDF to `output_path`.
    ///
    /// The file is written to a sibling temp path and renamed into place, so
    /// readers never see a partial PDF.
    pub async fn audit_to_file(
        &self,
        input: &str,
        output_path: impl AsRef<Path>,
    ) -> Result<AuditOutput, AuditError> {
        let output = self.audit(input).await?;
        write_atomic(output_path.as_ref(), &output.pdf).await?;
        Ok(output)
    }

    fn stage_start(&self, stage: AuditStage) {
        if let Some(ref cb) = self.progress {
            cb.on_stage_start(stage);
        }
    }

    fn stage_complete(&self, stage: AuditStage, succeeded: bool) {
        if let Some(ref cb) = self.progress {
            cb.on_stage_complete(stage, succeeded);
        }
    }
}

/// Audit a PDF file or URL and return the report.
///
/// # Errors
/// Returns `Err(AuditError)` only for fatal errors:
/// - File not found, download failure, not a PDF
/// - No extraction strategy produced text
/// - The analyzer failed after all retries
/// - No LLM provider could be resolved
pub async fn audit(input: impl AsRef<str>, config: &AuditConfig) -> Result<AuditOutput, AuditError> {
    Auditor::from_config(config)?.audit(input.as_ref()).await
}

/// Audit PDF bytes in memory.
pub async fn audit_from_bytes(bytes: &[u8], config: &AuditConfig) -> Result<AuditOutput, AuditError> {
    Auditor::from_config(config)?
        .audit_bytes(bytes.to_vec(), "<bytes>")
        .await
}

/// Audit `input` and write the report PDF to `output_path`.
pub async fn audit_to_file(
    input: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &AuditConfig,
) -> Result<AuditOutput, AuditError> {
    Auditor::from_config(config)?
        .audit_to_file(input.as_ref(), output_path)
        .await
}

/// Synchronous wrapper around [`audit`].
///
/// Creates a temporary tokio runtime internally.
pub fn audit_sync(input: impl AsRef<str>, config: &AuditConfig) -> Result<AuditOutput, AuditError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| AuditError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(audit(input, config))
}

/// Write `bytes` to `path` via a temp file and rename.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), AuditError> {
    let write_err = |e| AuditError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);
    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}
