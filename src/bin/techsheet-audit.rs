//! CLI binary for techsheet-audit.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `AuditConfig`, runs one audit and writes the report.

use anyhow::{Context, Result};
use base64::Engine as _;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use techsheet_audit::{
    AuditConfig, AuditOutput, AuditProgressCallback, AuditStage, Auditor, Checklist, LayoutConfig,
    ProgressCallback,
};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress display: a spinner while a whole-document step runs,
/// a page bar during OCR and vision, and one log line per page or stage.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-page wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<usize, Instant>>,
    /// Page count from the text layer; 0 until known.
    total_pages: AtomicUsize,
    /// Pages that failed across all stages.
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(spinner_style());
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            total_pages: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
        })
    }

    /// Switch to the page bar for a page-level stage.
    fn activate_bar(&self, total: usize, prefix: &str) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_style(style);
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_prefix(prefix.to_string());
        self.bar.reset_eta();
    }

    fn activate_spinner(&self, prefix: &str, message: &str) {
        self.bar.set_style(spinner_style());
        self.bar.set_prefix(prefix.to_string());
        self.bar.set_message(message.to_string());
    }

    fn elapsed_secs(&self, page_num: usize) -> f64 {
        let elapsed_ms = match self.start_times.lock() {
            Ok(mut times) => times
                .remove(&page_num)
                .map(|t| t.elapsed().as_millis())
                .unwrap_or(0),
            Err(_) => 0,
        };
        elapsed_ms as f64 / 1000.0
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(TICKS)
}

impl AuditProgressCallback for CliProgressCallback {
    fn on_audit_start(&self, total_pages: usize) {
        self.total_pages.store(total_pages, Ordering::SeqCst);
        if total_pages > 0 {
            self.bar.println(format!(
                "{} {}",
                cyan("◆"),
                bold(&format!("Auditing a {total_pages}-page data sheet…"))
            ));
        } else {
            self.bar.println(format!(
                "{} {}",
                cyan("◆"),
                bold("No readable text layer, falling back to page images…")
            ));
        }
    }

    fn on_stage_start(&self, stage: AuditStage) {
        match stage {
            AuditStage::NativeText => self.activate_spinner("Reading", "text layer…"),
            AuditStage::Ocr | AuditStage::Vision => {
                let total = self.total_pages.load(Ordering::SeqCst);
                if total > 0 {
                    self.activate_bar(total, if stage == AuditStage::Ocr { "OCR" } else { "Vision" });
                } else {
                    self.activate_spinner(
                        if stage == AuditStage::Ocr { "OCR" } else { "Vision" },
                        "rendering pages…",
                    );
                }
            }
            AuditStage::Analysis => self.activate_spinner("Analysing", "scoring the checklist…"),
            AuditStage::Rendering => self.activate_spinner("Rendering", "laying out the report…"),
        }
    }

    fn on_page_start(&self, stage: AuditStage, page_num: usize, total_pages: usize) {
        if self.bar.length() != Some(total_pages as u64) {
            self.activate_bar(total_pages, if stage == AuditStage::Ocr { "OCR" } else { "Vision" });
        }
        if let Ok(mut times) = self.start_times.lock() {
            times.insert(page_num, Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, stage: AuditStage, page_num: usize, total: usize, chars: usize) {
        let secs = self.elapsed_secs(page_num);
        self.bar.println(format!(
            "  {} {:<6} page {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            stage.to_string(),
            page_num,
            total,
            dim(&format!("{chars:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, stage: AuditStage, page_num: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(page_num);
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:<6} page {:>3}/{:<3}  {}  {}",
            red("✗"),
            stage.to_string(),
            page_num,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_stage_complete(&self, stage: AuditStage, succeeded: bool) {
        let mark = if succeeded { green("✓") } else { dim("·") };
        let note = match (stage, succeeded) {
            (AuditStage::NativeText | AuditStage::Ocr | AuditStage::Vision, true) => "text extracted",
            (AuditStage::NativeText | AuditStage::Ocr | AuditStage::Vision, false) => "no usable text",
            (_, true) => "done",
            (_, false) => "failed",
        };
        self.bar.println(format!("{mark} {}  {}", bold(&stage.to_string()), dim(note)));
    }

    fn on_audit_complete(&self, report_pages: usize) {
        self.bar.finish_and_clear();
        let errors = self.errors.load(Ordering::SeqCst);
        if errors == 0 {
            eprintln!(
                "{} report rendered on {} page(s)",
                green("✔"),
                bold(&report_pages.to_string())
            );
        } else {
            eprintln!(
                "{} report rendered on {} page(s)  ({} page error(s) during extraction)",
                cyan("⚠"),
                bold(&report_pages.to_string()),
                red(&errors.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Audit a data sheet, report next to it (fiche.audit.pdf)
  techsheet-audit fiche.pdf

  # Choose the report path
  techsheet-audit fiche.pdf -o rapports/fiche.pdf

  # Audit a sheet published online
  techsheet-audit https://example.com/fiches/jambon.pdf -o jambon.pdf

  # Structured findings as JSON on stdout
  techsheet-audit --json fiche.pdf > fiche.json

  # Base64 envelope: base64 PDF in, base64 report out
  base64 fiche.pdf | techsheet-audit --base64-in --base64-out - > rapport.b64

  # Scans with a mix of text and image pages
  techsheet-audit --hybrid --ocr-dpi 400 scan.pdf

  # Custom checklist and model
  techsheet-audit --checklist checklist_v2.json --model gpt-4.1 --provider openai fiche.pdf

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY        OpenAI API key
  ANTHROPIC_API_KEY     Anthropic API key
  GEMINI_API_KEY        Google Gemini API key
  EDGEQUAKE_MODEL       Default model (overridden by --model)
  EDGEQUAKE_PROVIDER    Default provider (overridden by --provider)
  PDFIUM_LIB_PATH       Path to an existing libpdfium
  TECHSHEET_*           Every flag has a TECHSHEET_<FLAG> variable
  RUST_LOG              Log filter, e.g. techsheet_audit=debug

EXTERNAL TOOLS:
  tesseract             OCR tier; install with the 'fra' language data
  libpdfium             Page rendering for OCR and vision
"#;

/// Audit food-product technical data sheets against the 20-point checklist.
#[derive(Parser, Debug)]
#[command(
    name = "techsheet-audit",
    version,
    about = "Audit a food-product technical data sheet (PDF) and render a PDF report",
    long_about = "Extracts the text of a technical data sheet (text layer, then OCR, then a \
                  vision model), asks a language model to score it against the 20-point \
                  compliance checklist and renders the structured findings as a PDF report.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP,
)]
struct Cli {
    /// Input PDF: local path or HTTP/HTTPS URL. With --base64-in, a file of
    /// base64 text, or `-` for stdin.
    input: String,

    /// Report PDF path. Defaults to `<input>.audit.pdf` in the current directory.
    #[arg(short, long, env = "TECHSHEET_OUTPUT")]
    output: Option<PathBuf>,

    /// Print the structured audit (findings, summary, attempts, stats) as JSON.
    #[arg(long, env = "TECHSHEET_JSON", conflicts_with = "base64_out")]
    json: bool,

    /// Read the input as base64-encoded PDF bytes.
    #[arg(long, env = "TECHSHEET_BASE64_IN")]
    base64_in: bool,

    /// Print the report PDF as base64 on stdout instead of writing a file.
    #[arg(long, env = "TECHSHEET_BASE64_OUT")]
    base64_out: bool,

    /// Checklist JSON file replacing the built-in 20-point checklist.
    #[arg(long, env = "TECHSHEET_CHECKLIST")]
    checklist: Option<PathBuf>,

    /// LLM model name.
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider (openai, anthropic, gemini, ollama, ...).
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Tesseract language(s), e.g. `fra` or `fra+eng`.
    #[arg(long, env = "TECHSHEET_LANGUAGE", default_value = "fra")]
    language: String,

    /// Rendering DPI for OCR (250–400).
    #[arg(long, env = "TECHSHEET_OCR_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(250..=400))]
    ocr_dpi: u32,

    /// Rendering DPI for the vision fallback (72–400).
    #[arg(long, env = "TECHSHEET_VISION_DPI", default_value_t = 350,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    vision_dpi: u32,

    /// Minimum characters of native text before OCR is skipped.
    #[arg(long, env = "TECHSHEET_NATIVE_MIN_CHARS", default_value_t = 200)]
    native_min_chars: usize,

    /// OCR only the pages without a text layer and keep native text for the rest.
    #[arg(long, env = "TECHSHEET_HYBRID")]
    hybrid: bool,

    /// Keep raw Tesseract output (no line clean-up).
    #[arg(long, env = "TECHSHEET_RAW_OCR")]
    raw_ocr: bool,

    /// Path to the tesseract binary.
    #[arg(long, env = "TECHSHEET_TESSERACT", default_value = "tesseract")]
    tesseract: PathBuf,

    /// Tesseract page segmentation mode (0–13).
    #[arg(long, env = "TECHSHEET_PSM", default_value_t = 3,
          value_parser = clap::value_parser!(u8).range(0..=13))]
    psm: u8,

    /// Password for encrypted PDFs.
    #[arg(long, env = "TECHSHEET_PASSWORD")]
    password: Option<String>,

    /// Path to the pdfium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Max output tokens per LLM call.
    #[arg(long, env = "TECHSHEET_MAX_TOKENS", default_value_t = 3500)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "TECHSHEET_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Retries per LLM call on failure.
    #[arg(long, env = "TECHSHEET_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "TECHSHEET_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "TECHSHEET_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Title drawn on the first report page.
    #[arg(long, env = "TECHSHEET_TITLE")]
    title: Option<String>,

    /// Caption drawn at the bottom of the last report page.
    #[arg(long, env = "TECHSHEET_FOOTER")]
    footer: Option<String>,

    /// Disable progress bar.
    #[arg(long, env = "TECHSHEET_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "TECHSHEET_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "TECHSHEET_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; --verbose always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.base64_out;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new();
        Some(cb as Arc<dyn AuditProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;
    let auditor = Auditor::from_config(&config).context("Failed to set up the auditor")?;

    // ── Run audit ────────────────────────────────────────────────────────
    let output = if cli.base64_in {
        let bytes = read_base64_input(&cli.input)?;
        auditor
            .audit_bytes(bytes, "<base64>")
            .await
            .context("Audit failed")?
    } else {
        auditor.audit(&cli.input).await.context("Audit failed")?
    };

    // ── Emit results ─────────────────────────────────────────────────────
    let written = if cli.base64_out && cli.output.is_none() {
        None
    } else {
        let path = cli
            .output
            .clone()
            .unwrap_or_else(|| default_output_path(&cli.input, cli.base64_in));
        write_report(&path, &output.pdf)?;
        Some(path)
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if cli.base64_out {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&output.pdf);
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(encoded.as_bytes())
            .and_then(|_| handle.write_all(b"\n"))
            .context("Failed to write to stdout")?;
    }

    if !cli.quiet {
        print_summary(&output, written.as_deref());
    }

    Ok(())
}

/// Map CLI args to `AuditConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<AuditConfig> {
    let mut layout = LayoutConfig::default();
    if let Some(ref title) = cli.title {
        layout.title = Some(title.clone()).filter(|t| !t.trim().is_empty());
    }
    layout.footer = cli.footer.clone();

    let mut builder = AuditConfig::builder()
        .language(cli.language.clone())
        .ocr_dpi(cli.ocr_dpi)
        .vision_dpi(cli.vision_dpi)
        .native_min_chars(cli.native_min_chars)
        .hybrid_pages(cli.hybrid)
        .clean_ocr_text(!cli.raw_ocr)
        .tesseract_path(cli.tesseract.clone())
        .ocr_psm(cli.psm)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout)
        .layout(layout);

    if let Some(ref path) = cli.checklist {
        let checklist = Checklist::from_file(path)
            .with_context(|| format!("Failed to load checklist from {:?}", path))?;
        builder = builder.checklist(checklist);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password.clone());
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(lib.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Decode base64 PDF bytes from a file or from stdin (`-`).
fn read_base64_input(input: &str) -> Result<Vec<u8>> {
    let mut encoded = String::new();
    if input == "-" {
        io::stdin()
            .read_to_string(&mut encoded)
            .context("Failed to read base64 input from stdin")?;
    } else {
        encoded = std::fs::read_to_string(input)
            .with_context(|| format!("Failed to read base64 input from {:?}", input))?;
    }
    // `base64` wraps at 76 columns; the decoder rejects whitespace.
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .context("Input is not valid base64")
}

/// `fiche.pdf` → `fiche.audit.pdf`; URLs and base64 input → `rapport.audit.pdf`.
fn default_output_path(input: &str, base64_in: bool) -> PathBuf {
    let is_url = input.starts_with("http://") || input.starts_with("https://");
    let stem = if base64_in || is_url || input == "-" {
        None
    } else {
        Path::new(input).file_stem().and_then(|s| s.to_str())
    };
    PathBuf::from(format!("{}.audit.pdf", stem.unwrap_or("rapport")))
}

fn write_report(path: &Path, pdf: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }
    std::fs::write(path, pdf).with_context(|| format!("Failed to write report to {:?}", path))
}

fn print_summary(output: &AuditOutput, written: Option<&Path>) {
    let summary = &output.report.summary;
    let checklist_len = output.report.findings.len() + output.missing_points.len();
    eprintln!(
        "{}  {}  {}/{} points  via {}  {}ms{}",
        if output.is_complete() { green("✔") } else { cyan("⚠") },
        bold(&summary.decision.to_string()),
        output.report.findings.len(),
        checklist_len,
        output.method,
        output.stats.total_duration_ms,
        written
            .map(|p| format!("  →  {}", bold(&p.display().to_string())))
            .unwrap_or_default(),
    );
    eprintln!(
        "   {} critical  /  {} major  /  {} minor",
        dim(&summary.critical_count().to_string()),
        dim(&summary.major_count().to_string()),
        dim(&summary.minor_count().to_string()),
    );
    for warning in &output.warnings {
        eprintln!("   {} {}", cyan("⚠"), warning);
    }
}
