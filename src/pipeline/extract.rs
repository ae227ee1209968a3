//! The degrading extraction pipeline: native text layer → OCR → vision.
//!
//! Strategies run in strict priority and the first one producing non-trivial
//! text wins. Each strategy reports an explicit [`StrategyOutcome`]; a failed
//! or empty strategy is logged, recorded in [`ExtractedText::attempts`] and
//! never aborts the document. Exhausting all three strategies yields an
//! empty [`ExtractedText`] with no method, which
//! [`ExtractedText::into_result`] turns into
//! [`AuditError::ExtractionExhausted`].
//!
//! Pages are processed one after another. Rasterisation and OCR block, so
//! they run through `tokio::task::spawn_blocking`.

use crate::config::AuditConfig;
use crate::error::{AuditError, ExtractionError};
use crate::pipeline::encode::encode_png;
use crate::pipeline::input::Document;
use crate::pipeline::llm::VisionClient;
use crate::pipeline::ocr::{clean_ocr_text, OcrEngine, TesseractOcr};
use crate::pipeline::preprocess::{prepare_for_ocr, PreprocessOptions};
use crate::pipeline::rasterize::{PageRasterizer, PdfiumRasterizer, RasterPage};
use crate::pipeline::text_layer::{PageText, PdfTextExtractor, TextLayerExtractor};
use crate::progress::{AuditStage, ProgressCallback};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Which strategy produced the document text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionMethod {
    NativeText,
    Ocr,
    /// Native text per page, OCR for the pages without a text layer.
    Hybrid,
    Vision,
}

impl ExtractionMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            ExtractionMethod::NativeText => "native-text",
            ExtractionMethod::Ocr => "ocr",
            ExtractionMethod::Hybrid => "hybrid",
            ExtractionMethod::Vision => "vision",
        }
    }

    fn stage(self) -> AuditStage {
        match self {
            ExtractionMethod::NativeText => AuditStage::NativeText,
            ExtractionMethod::Ocr | ExtractionMethod::Hybrid => AuditStage::Ocr,
            ExtractionMethod::Vision => AuditStage::Vision,
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of running one strategy over the whole document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StrategyOutcome {
    /// The strategy produced usable text of this many characters.
    Text { chars: usize },
    /// The strategy ran but produced nothing usable.
    Empty { reason: String },
    /// The strategy could not run.
    Failed(ExtractionError),
}

/// One entry of the attempt log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyAttempt {
    pub method: ExtractionMethod,
    pub outcome: StrategyOutcome,
    /// Non-fatal per-page failures inside the strategy.
    pub page_errors: Vec<ExtractionError>,
}

impl fmt::Display for StrategyAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            StrategyOutcome::Text { chars } => write!(f, "{}: {} chars", self.method, chars)?,
            StrategyOutcome::Empty { reason } => write!(f, "{}: {}", self.method, reason)?,
            StrategyOutcome::Failed(e) => write!(f, "{}: {}", self.method, e)?,
        }
        if !self.page_errors.is_empty() {
            write!(f, " ({} page errors)", self.page_errors.len())?;
        }
        Ok(())
    }
}

/// Text of a document as produced by the pipeline.
///
/// Empty `text` with `method == None` is the failure value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedText {
    pub text: String,
    pub method: Option<ExtractionMethod>,
    /// Per-page fragments of the winning strategy, in page order.
    #[serde(skip)]
    pub pages: Vec<PageText>,
    pub page_count: usize,
    pub attempts: Vec<StrategyAttempt>,
}

impl ExtractedText {
    pub fn is_empty(&self) -> bool {
        self.method.is_none() || self.text.trim().is_empty()
    }

    /// Text sent to the analyzer, with the trailing extraction info tag.
    pub fn analysis_input(&self) -> String {
        let method = self.method.map_or("none", ExtractionMethod::as_str);
        format!("{}\n\n[INFO] extraction={}", self.text.trim_end(), method)
    }

    /// `Err(ExtractionExhausted)` when no strategy produced text.
    pub fn into_result(self) -> Result<Self, AuditError> {
        if self.is_empty() {
            Err(AuditError::ExtractionExhausted {
                pages: self.page_count,
                attempts: self.attempts.iter().map(ToString::to_string).collect(),
            })
        } else {
            Ok(self)
        }
    }
}

/// Marker inserted before each page when the text mixes pages from several calls.
pub fn page_marker(page_num: usize) -> String {
    format!("--- Page {page_num} ---")
}

/// Knobs of the pipeline, taken from [`AuditConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionSettings {
    pub native_min_chars: usize,
    pub ocr_dpi: u32,
    pub vision_dpi: u32,
    pub hybrid_pages: bool,
    pub clean_ocr_text: bool,
    pub preprocess: PreprocessOptions,
}

impl From<&AuditConfig> for ExtractionSettings {
    fn from(config: &AuditConfig) -> Self {
        Self {
            native_min_chars: config.native_min_chars,
            ocr_dpi: config.ocr_dpi,
            vision_dpi: config.vision_dpi,
            hybrid_pages: config.hybrid_pages,
            clean_ocr_text: config.clean_ocr_text,
            preprocess: PreprocessOptions {
                contrast_boost: config.contrast_boost,
                threshold: config.binarize_threshold,
            },
        }
    }
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self::from(&AuditConfig::default())
    }
}

/// Native text, OCR and vision strategies behind one `extract` call.
pub struct ExtractionPipeline {
    settings: ExtractionSettings,
    text_layer: Arc<dyn TextLayerExtractor>,
    rasterizer: Arc<dyn PageRasterizer>,
    ocr: Arc<dyn OcrEngine>,
    vision: Option<Arc<dyn VisionClient>>,
    progress: Option<ProgressCallback>,
}

/// Result of one strategy before it is folded into the attempt log.
struct TierRun {
    outcome: StrategyOutcome,
    pages: Vec<PageText>,
    text: String,
    page_errors: Vec<ExtractionError>,
}

impl TierRun {
    fn failed(e: ExtractionError) -> Self {
        Self {
            outcome: StrategyOutcome::Failed(e),
            pages: Vec::new(),
            text: String::new(),
            page_errors: Vec::new(),
        }
    }
}

impl ExtractionPipeline {
    pub fn new(
        settings: ExtractionSettings,
        text_layer: Arc<dyn TextLayerExtractor>,
        rasterizer: Arc<dyn PageRasterizer>,
        ocr: Arc<dyn OcrEngine>,
    ) -> Self {
        Self {
            settings,
            text_layer,
            rasterizer,
            ocr,
            vision: None,
            progress: None,
        }
    }

    /// Pipeline with the default `pdf-extract`, pdfium and Tesseract backends.
    pub fn from_config(config: &AuditConfig) -> Self {
        let mut pipeline = Self::new(
            ExtractionSettings::from(config),
            Arc::new(PdfTextExtractor),
            Arc::new(PdfiumRasterizer::new(
                config.pdfium_lib_path.clone(),
                config.password.clone(),
                config.max_rendered_pixels,
            )),
            Arc::new(TesseractOcr::new(
                config.tesseract_path.clone(),
                config.language.clone(),
                config.ocr_psm,
            )),
        );
        pipeline.progress = config.progress_callback.clone();
        pipeline
    }

    pub fn with_vision(mut self, vision: Arc<dyn VisionClient>) -> Self {
        self.vision = Some(vision);
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn settings(&self) -> &ExtractionSettings {
        &self.settings
    }

    /// Extract the text of `document`, degrading through the strategies.
    pub async fn extract(&self, document: &Document) -> ExtractedText {
        let mut result = ExtractedText::default();

        // ── 1. Native text layer ─────────────────────────────────────────
        self.stage_start(AuditStage::NativeText);
        let native = self.run_native(document).await;
        let native_pages = native.pages.clone();
        if !native_pages.is_empty() {
            result.page_count = native_pages.len();
        }
        if let Some(ref cb) = self.progress {
            cb.on_audit_start(result.page_count);
        }

        // Hybrid mode applies to mixed documents only: some pages carry a
        // text layer, others are scans.
        let has_text = native_pages.iter().any(|p| !p.text.trim().is_empty());
        let has_blank = native_pages.iter().any(|p| p.text.trim().is_empty());
        let hybrid = self.settings.hybrid_pages && has_text && has_blank;
        let native_fallback = (hybrid && matches!(native.outcome, StrategyOutcome::Text { .. }))
            .then(|| (native.text.clone(), native_pages.clone()));

        if self.record(&mut result, ExtractionMethod::NativeText, native, !hybrid) {
            return result;
        }

        // ── 1b. Hybrid: OCR only the pages without a text layer ─────────
        if hybrid {
            self.stage_start(AuditStage::Ocr);
            let run = self.run_hybrid(document, &native_pages).await;
            if self.record(&mut result, ExtractionMethod::Hybrid, run, true) {
                return result;
            }
            // The text layer alone was good enough; keep it rather than degrade.
            if let Some((text, pages)) = native_fallback {
                info!("Hybrid OCR unavailable; keeping the native text layer");
                result.text = text;
                result.pages = pages;
                result.method = Some(ExtractionMethod::NativeText);
                return result;
            }
        }

        // ── 2. OCR ───────────────────────────────────────────────────────
        if !hybrid {
            self.stage_start(AuditStage::Ocr);
            let ocr = self.run_ocr(document, &mut result.page_count).await;
            if self.record(&mut result, ExtractionMethod::Ocr, ocr, true) {
                return result;
            }
        }

        // ── 3. Vision fallback ───────────────────────────────────────────
        self.stage_start(AuditStage::Vision);
        let vision = self.run_vision(document, &mut result.page_count).await;
        if self.record(&mut result, ExtractionMethod::Vision, vision, true) {
            return result;
        }

        warn!(
            "All extraction strategies exhausted for '{}' ({} pages)",
            document.source(),
            result.page_count
        );
        result
    }

    /// Append the attempt. When it produced text and `accept` is set, move the
    /// text into `result` and return true.
    fn record(
        &self,
        result: &mut ExtractedText,
        method: ExtractionMethod,
        run: TierRun,
        accept: bool,
    ) -> bool {
        let won = accept && matches!(run.outcome, StrategyOutcome::Text { .. });
        match &run.outcome {
            StrategyOutcome::Text { chars } => info!("{}: {} chars extracted", method, chars),
            StrategyOutcome::Empty { reason } => info!("{}: no usable text ({})", method, reason),
            StrategyOutcome::Failed(e) => warn!("{}: strategy failed: {}", method, e),
        }
        result.attempts.push(StrategyAttempt {
            method,
            outcome: run.outcome,
            page_errors: run.page_errors,
        });
        if let Some(ref cb) = self.progress {
            cb.on_stage_complete(method.stage(), won);
        }
        if won {
            result.text = run.text;
            result.pages = run.pages;
            result.method = Some(method);
        }
        won
    }

    fn stage_start(&self, stage: AuditStage) {
        if let Some(ref cb) = self.progress {
            cb.on_stage_start(stage);
        }
    }

    async fn run_native(&self, document: &Document) -> TierRun {
        let extractor = Arc::clone(&self.text_layer);
        let bytes = document.shared_bytes();
        let pages = match blocking(move || extractor.extract_pages(&bytes)).await {
            Ok(pages) => pages,
            Err(e) => return TierRun::failed(e),
        };

        let text = pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string();
        let chars = text.chars().count();
        debug!("Native text layer: {} pages, {} chars", pages.len(), chars);

        let outcome = if chars >= self.settings.native_min_chars.max(1) {
            StrategyOutcome::Text { chars }
        } else {
            StrategyOutcome::Empty {
                reason: format!(
                    "{} chars, below the {} char threshold",
                    chars, self.settings.native_min_chars
                ),
            }
        };
        TierRun {
            outcome,
            pages,
            text,
            page_errors: Vec::new(),
        }
    }

    async fn rasterize(&self, document: &Document, dpi: u32) -> Result<Vec<RasterPage>, ExtractionError> {
        let rasterizer = Arc::clone(&self.rasterizer);
        let bytes = document.shared_bytes();
        blocking(move || rasterizer.rasterize(&bytes, dpi)).await
    }

    /// OCR one rasterised page, pre-processing included.
    async fn ocr_page(&self, page: RasterPage) -> Result<String, ExtractionError> {
        let engine = Arc::clone(&self.ocr);
        let opts = self.settings.preprocess;
        let clean = self.settings.clean_ocr_text;
        blocking(move || {
            let gray = prepare_for_ocr(&page.image, opts);
            let raw = engine.recognize(&gray, page.page_num)?;
            Ok(if clean {
                clean_ocr_text(&raw)
            } else {
                raw.trim().to_string()
            })
        })
        .await
    }

    async fn run_ocr(&self, document: &Document, page_count: &mut usize) -> TierRun {
        let raster = match self.rasterize(document, self.settings.ocr_dpi).await {
            Ok(r) => r,
            Err(e) => return TierRun::failed(e),
        };
        *page_count = (*page_count).max(raster.len());
        let total = raster.len();

        let mut pages = Vec::with_capacity(total);
        let mut page_errors = Vec::new();
        for page in raster {
            let page_num = page.page_num;
            self.page_start(AuditStage::Ocr, page_num, total);
            match self.ocr_page(page).await {
                Ok(text) => {
                    self.page_complete(AuditStage::Ocr, page_num, total, text.chars().count());
                    pages.push(PageText { page_num, text });
                }
                Err(e @ ExtractionError::OcrUnavailable(_)) => {
                    self.page_error(AuditStage::Ocr, page_num, total, &e);
                    return TierRun {
                        page_errors,
                        ..TierRun::failed(e)
                    };
                }
                Err(e) => {
                    warn!("OCR page {}: {}", page_num, e);
                    self.page_error(AuditStage::Ocr, page_num, total, &e);
                    page_errors.push(e);
                }
            }
        }

        let text = pages
            .iter()
            .map(|p| p.text.as_str())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string();
        let outcome = outcome_for(&text, total, &page_errors);
        TierRun {
            outcome,
            pages,
            text,
            page_errors,
        }
    }

    async fn run_hybrid(&self, document: &Document, native: &[PageText]) -> TierRun {
        let blank: Vec<usize> = native
            .iter()
            .filter(|p| p.text.trim().is_empty())
            .map(|p| p.page_num)
            .collect();
        info!("Hybrid extraction: OCR for {} of {} pages", blank.len(), native.len());

        let raster = match self.rasterize(document, self.settings.ocr_dpi).await {
            Ok(r) => r,
            Err(e) => return TierRun::failed(e),
        };

        let total = native.len();
        let mut ocr_text: Vec<(usize, String)> = Vec::with_capacity(blank.len());
        let mut page_errors = Vec::new();
        for page in raster.into_iter().filter(|p| blank.contains(&p.page_num)) {
            let page_num = page.page_num;
            self.page_start(AuditStage::Ocr, page_num, total);
            match self.ocr_page(page).await {
                Ok(text) => {
                    self.page_complete(AuditStage::Ocr, page_num, total, text.chars().count());
                    ocr_text.push((page_num, text));
                }
                Err(e @ ExtractionError::OcrUnavailable(_)) => {
                    self.page_error(AuditStage::Ocr, page_num, total, &e);
                    return TierRun {
                        page_errors,
                        ..TierRun::failed(e)
                    };
                }
                Err(e) => {
                    warn!("Hybrid OCR page {}: {}", page_num, e);
                    self.page_error(AuditStage::Ocr, page_num, total, &e);
                    page_errors.push(e);
                }
            }
        }

        let pages: Vec<PageText> = native
            .iter()
            .map(|p| {
                let text = if p.text.trim().is_empty() {
                    ocr_text
                        .iter()
                        .find(|(n, _)| *n == p.page_num)
                        .map(|(_, t)| t.clone())
                        .unwrap_or_default()
                } else {
                    p.text.trim().to_string()
                };
                PageText {
                    page_num: p.page_num,
                    text,
                }
            })
            .collect();

        let text = join_with_markers(&pages);
        // The combined text must clear the same bar as the text layer alone.
        let min_chars = self.settings.native_min_chars.max(1);
        let outcome = match outcome_for(&strip_markers(&text), total, &page_errors) {
            StrategyOutcome::Text { chars } if chars < min_chars => StrategyOutcome::Empty {
                reason: format!(
                    "{} chars, below the {} char threshold",
                    chars, self.settings.native_min_chars
                ),
            },
            outcome => outcome,
        };
        TierRun {
            outcome,
            pages,
            text,
            page_errors,
        }
    }

    async fn run_vision(&self, document: &Document, page_count: &mut usize) -> TierRun {
        let Some(vision) = self.vision.as_ref() else {
            return TierRun::failed(ExtractionError::Vision {
                page: 0,
                detail: "no vision client configured".into(),
            });
        };

        let raster = match self.rasterize(document, self.settings.vision_dpi).await {
            Ok(r) => r,
            Err(e) => return TierRun::failed(e),
        };
        *page_count = (*page_count).max(raster.len());
        let total = raster.len();

        let mut pages = Vec::with_capacity(total);
        let mut page_errors = Vec::new();
        for page in raster {
            let page_num = page.page_num;
            self.page_start(AuditStage::Vision, page_num, total);

            let png = match encode_png(&page.image) {
                Ok(png) => png,
                Err(e) => {
                    let e = ExtractionError::Encoding {
                        page: page_num,
                        detail: e.to_string(),
                    };
                    self.page_error(AuditStage::Vision, page_num, total, &e);
                    page_errors.push(e);
                    pages.push(PageText {
                        page_num,
                        text: String::new(),
                    });
                    continue;
                }
            };
            drop(page);

            let text = match vision.analyze_image(&png, page_num).await {
                Ok(text) => {
                    self.page_complete(AuditStage::Vision, page_num, total, text.chars().count());
                    text.trim().to_string()
                }
                Err(e) => {
                    let e = ExtractionError::Vision {
                        page: page_num,
                        detail: e.to_string(),
                    };
                    warn!("{}", e);
                    self.page_error(AuditStage::Vision, page_num, total, &e);
                    page_errors.push(e);
                    String::new()
                }
            };
            pages.push(PageText { page_num, text });
        }

        let content = pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("");
        let outcome = outcome_for(content.trim(), total, &page_errors);
        let text = if matches!(outcome, StrategyOutcome::Text { .. }) {
            join_with_markers(&pages)
        } else {
            String::new()
        };
        TierRun {
            outcome,
            pages,
            text,
            page_errors,
        }
    }

    fn page_start(&self, stage: AuditStage, page_num: usize, total: usize) {
        if let Some(ref cb) = self.progress {
            cb.on_page_start(stage, page_num, total);
        }
    }

    fn page_complete(&self, stage: AuditStage, page_num: usize, total: usize, chars: usize) {
        if let Some(ref cb) = self.progress {
            cb.on_page_complete(stage, page_num, total, chars);
        }
    }

    fn page_error(&self, stage: AuditStage, page_num: usize, total: usize, e: &ExtractionError) {
        if let Some(ref cb) = self.progress {
            cb.on_page_error(stage, page_num, total, &e.to_string());
        }
    }
}

/// Classify a page-level strategy by its combined text and page errors.
fn outcome_for(content: &str, total_pages: usize, page_errors: &[ExtractionError]) -> StrategyOutcome {
    if !content.trim().is_empty() {
        return StrategyOutcome::Text {
            chars: content.chars().count(),
        };
    }
    match page_errors.first() {
        Some(first) if page_errors.len() >= total_pages => StrategyOutcome::Failed(first.clone()),
        _ if total_pages == 0 => StrategyOutcome::Empty {
            reason: "document has no pages".into(),
        },
        _ => StrategyOutcome::Empty {
            reason: "no text recognised".into(),
        },
    }
}

/// `--- Page N ---` followed by the page text, for every page.
fn join_with_markers(pages: &[PageText]) -> String {
    pages
        .iter()
        .map(|p| {
            if p.text.is_empty() {
                page_marker(p.page_num)
            } else {
                format!("{}\n{}", page_marker(p.page_num), p.text)
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn strip_markers(text: &str) -> String {
    text.lines()
        .filter(|l| !(l.starts_with("--- Page ") && l.ends_with(" ---")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Run blocking work off the async worker threads.
async fn blocking<T, F>(f: F) -> Result<T, ExtractionError>
where
    F: FnOnce() -> Result<T, ExtractionError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ExtractionError::Worker(e.to_string()))?
}
