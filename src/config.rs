//! Configuration types for a technical data sheet audit.
//!
//! Every knob lives in [`AuditConfig`], built via [`AuditConfigBuilder`].
//! Nothing is read from process-wide state once a config is built: the
//! Tesseract path, the provider and the checklist are all fields, so two
//! audits with different settings can run side by side.
//!
//! Page layout of the rendered report is a separate value type,
//! [`LayoutConfig`], because it is also used on its own by
//! [`crate::report::render_text`].

use crate::checklist::Checklist;
use crate::error::AuditError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Upper bound for [`AuditConfigBuilder::max_retries`].
const MAX_RETRIES: u32 = 10;

/// Configuration for one audit run.
///
/// Built via [`AuditConfig::builder()`] or using [`AuditConfig::default()`].
///
/// # Example
/// ```rust
/// use techsheet_audit::AuditConfig;
///
/// let config = AuditConfig::builder()
///     .language("fra")
///     .ocr_dpi(300)
///     .native_min_chars(200)
///     .model("gpt-4.1-mini")
///     .build()
///     .unwrap();
/// assert_eq!(config.ocr_dpi, 300);
/// ```
#[derive(Clone)]
pub struct AuditConfig {
    // ── Extraction ────────────────────────────────────────────────────────
    /// Tesseract language code(s), e.g. `fra` or `fra+eng`. Default: `fra`.
    pub language: String,

    /// Rasterisation DPI for the OCR tier. Range: 250–400. Default: 300.
    ///
    /// Below 250 DPI Tesseract starts confusing small glyphs on data sheets
    /// (`°C`, `µg`); above 400 pages take seconds each with no accuracy gain.
    pub ocr_dpi: u32,

    /// Rasterisation DPI for the vision tier. Range: 72–600. Default: 350.
    pub vision_dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 4000.
    ///
    /// Caps either dimension independently of DPI so a poster-sized page
    /// cannot exhaust memory.
    pub max_rendered_pixels: u32,

    /// Minimum trimmed length of the native text layer, in characters, for
    /// the native tier to count as a success. Default: 200.
    ///
    /// Scanned sheets often carry a handful of characters in their text layer
    /// (a watermark, a page number) that must not short-circuit OCR.
    pub native_min_chars: usize,

    /// Per-page hybrid mode: OCR only the pages whose own text layer is empty. Default: false.
    pub hybrid_pages: bool,

    /// Collapse whitespace and re-join hyphenated line breaks in OCR text. Default: true.
    pub clean_ocr_text: bool,

    /// Path to the `tesseract` executable. Default: `tesseract` (looked up on `PATH`).
    pub tesseract_path: PathBuf,

    /// Tesseract page segmentation mode (`--psm`). Range: 0–13. Default: 3.
    pub ocr_psm: u8,

    /// Contrast boost applied before grayscale conversion. Range: 0–100. Default: 30.0.
    pub contrast_boost: f32,

    /// Luma threshold for binarisation (pixels below become black). Default: 140.
    pub binarize_threshold: u8,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Directory or file of the pdfium shared library. If None, the system
    /// library search path is used.
    pub pdfium_lib_path: Option<PathBuf>,

    // ── Language model ───────────────────────────────────────────────────
    /// LLM model identifier, e.g. "gpt-4.1-mini". If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is auto-detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.0.
    ///
    /// The report must be reproducible across runs on the same sheet.
    pub temperature: f32,

    /// Maximum tokens the model may generate for the report. Default: 3500.
    ///
    /// Twenty point blocks plus a summary need roughly 2 500 tokens in French.
    pub max_tokens: usize,

    /// Maximum number of characters of extracted text sent for analysis. Default: 60 000.
    pub max_input_chars: usize,

    /// Maximum retry attempts on a transient LLM failure. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-LLM-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    // ── Report ───────────────────────────────────────────────────────────
    /// Checklist the sheet is audited against. Default: the built-in v1.
    pub checklist: Arc<Checklist>,

    /// Page layout of the rendered report.
    pub layout: LayoutConfig,

    /// Optional progress callback for stage and page events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            language: "fra".to_string(),
            ocr_dpi: 300,
            vision_dpi: 350,
            max_rendered_pixels: 4000,
            native_min_chars: 200,
            hybrid_pages: false,
            clean_ocr_text: true,
            tesseract_path: PathBuf::from("tesseract"),
            ocr_psm: 3,
            contrast_boost: 30.0,
            binarize_threshold: 140,
            password: None,
            pdfium_lib_path: None,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 3500,
            max_input_chars: 60_000,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            download_timeout_secs: 120,
            checklist: Arc::new(Checklist::builtin()),
            layout: LayoutConfig::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AuditConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditConfig")
            .field("language", &self.language)
            .field("ocr_dpi", &self.ocr_dpi)
            .field("vision_dpi", &self.vision_dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("native_min_chars", &self.native_min_chars)
            .field("hybrid_pages", &self.hybrid_pages)
            .field("clean_ocr_text", &self.clean_ocr_text)
            .field("tesseract_path", &self.tesseract_path)
            .field("ocr_psm", &self.ocr_psm)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("checklist", &self.checklist.version)
            .field("layout", &self.layout)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn AuditProgressCallback>"),
            )
            .finish()
    }
}

impl AuditConfig {
    /// Create a new builder for `AuditConfig`.
    pub fn builder() -> AuditConfigBuilder {
        AuditConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`AuditConfig`].
#[derive(Debug)]
pub struct AuditConfigBuilder {
    config: AuditConfig,
}

impl AuditConfigBuilder {
    pub fn language(mut self, lang: impl Into<String>) -> Self {
        self.config.language = lang.into();
        self
    }

    pub fn ocr_dpi(mut self, dpi: u32) -> Self {
        self.config.ocr_dpi = dpi.clamp(250, 400);
        self
    }

    pub fn vision_dpi(mut self, dpi: u32) -> Self {
        self.config.vision_dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn native_min_chars(mut self, n: usize) -> Self {
        self.config.native_min_chars = n;
        self
    }

    pub fn hybrid_pages(mut self, v: bool) -> Self {
        self.config.hybrid_pages = v;
        self
    }

    pub fn clean_ocr_text(mut self, v: bool) -> Self {
        self.config.clean_ocr_text = v;
        self
    }

    pub fn tesseract_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tesseract_path = path.into();
        self
    }

    pub fn ocr_psm(mut self, psm: u8) -> Self {
        self.config.ocr_psm = psm.min(13);
        self
    }

    pub fn contrast_boost(mut self, c: f32) -> Self {
        self.config.contrast_boost = c.clamp(0.0, 100.0);
        self
    }

    pub fn binarize_threshold(mut self, t: u8) -> Self {
        self.config.binarize_threshold = t;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_input_chars(mut self, n: usize) -> Self {
        self.config.max_input_chars = n;
        self
    }

    /// Clamped to 10.
    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.min(MAX_RETRIES);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn checklist(mut self, checklist: Checklist) -> Self {
        self.config.checklist = Arc::new(checklist);
        self
    }

    pub fn layout(mut self, layout: LayoutConfig) -> Self {
        self.config.layout = layout;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AuditConfig, AuditError> {
        let c = &self.config;
        if !(250..=400).contains(&c.ocr_dpi) {
            return Err(AuditError::InvalidConfig(format!(
                "OCR DPI must be 250–400, got {}",
                c.ocr_dpi
            )));
        }
        if c.language.trim().is_empty() {
            return Err(AuditError::InvalidConfig("OCR language must not be empty".into()));
        }
        if c.max_tokens == 0 {
            return Err(AuditError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.max_input_chars == 0 {
            return Err(AuditError::InvalidConfig("max_input_chars must be ≥ 1".into()));
        }
        c.layout.validate()?;
        Ok(self.config)
    }
}

// ── Layout ───────────────────────────────────────────────────────────────

/// A4 width in PDF points.
pub const A4_WIDTH: f32 = 595.28;
/// A4 height in PDF points.
pub const A4_HEIGHT: f32 = 841.89;

/// Page geometry and typography of the rendered report.
///
/// All values are in PDF points (1/72 inch) except `wrap_chars`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub page_width: f32,
    pub page_height: f32,
    pub margin_left: f32,
    pub margin_right: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
    /// Vertical advance of one text line.
    pub line_height: f32,
    pub body_font_size: f32,
    pub heading_font_size: f32,
    pub title_font_size: f32,
    /// Greedy word-wrap budget for body lines, in characters.
    pub wrap_chars: usize,
    /// Extra vertical space consumed by a separator rule.
    pub separator_gap: f32,
    /// Heading colour as RGB components in `0.0..=1.0`. `None` draws headings in black.
    pub heading_color: Option<[f32; 3]>,
    /// Title drawn on the first page.
    pub title: Option<String>,
    /// Caption drawn on the last page at `footer_offset` above the page bottom.
    pub footer: Option<String>,
    pub footer_offset: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            page_width: A4_WIDTH,
            page_height: A4_HEIGHT,
            margin_left: 50.0,
            margin_right: 50.0,
            margin_top: 50.0,
            margin_bottom: 50.0,
            line_height: 14.0,
            body_font_size: 11.0,
            heading_font_size: 12.0,
            title_font_size: 16.0,
            wrap_chars: 88,
            separator_gap: 7.0,
            heading_color: Some([0.0, 0.2, 0.45]),
            title: Some("Rapport d'analyse de fiche technique".to_string()),
            footer: None,
            footer_offset: 30.0,
        }
    }
}

impl LayoutConfig {
    /// Usable width between the left and right margins.
    pub fn content_width(&self) -> f32 {
        self.page_width - self.margin_left - self.margin_right
    }

    /// Wrap budget for heading lines, scaled down from `wrap_chars` by the
    /// larger heading font.
    pub fn heading_wrap_chars(&self) -> usize {
        let scaled = self.wrap_chars as f32 * self.body_font_size / self.heading_font_size;
        (scaled.floor() as usize).clamp(1, self.wrap_chars)
    }

    /// Usable height between the top and bottom margins.
    pub fn content_height(&self) -> f32 {
        self.page_height - self.margin_top - self.margin_bottom
    }

    /// Number of full body lines that fit on one page.
    pub fn lines_per_page(&self) -> usize {
        // Tolerance keeps 756/14 = 54 from flooring to 53 on float noise.
        ((self.content_height() + 1e-3) / self.line_height).floor() as usize
    }

    fn validate(&self) -> Result<(), AuditError> {
        if self.line_height <= 0.0 {
            return Err(AuditError::InvalidConfig("line_height must be > 0".into()));
        }
        if self.content_width() <= 0.0 || self.content_height() < self.line_height {
            return Err(AuditError::InvalidConfig(format!(
                "margins leave no room for text on a {}×{} page",
                self.page_width, self.page_height
            )));
        }
        if self.wrap_chars < 10 {
            return Err(AuditError::InvalidConfig(format!(
                "wrap_chars must be ≥ 10, got {}",
                self.wrap_chars
            )));
        }
        Ok(())
    }
}
