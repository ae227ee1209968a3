//! End-to-end tests for techsheet-audit.
//!
//! Most tests drive the [`Auditor`] with in-memory fakes for the text layer,
//! the rasterizer, the OCR engine, the vision client and the analyzer, so
//! they run anywhere without pdfium, Tesseract or an API key.
//!
//! The live tests at the bottom use real data sheets in `./test_cases/` and
//! make LLM API calls. They are gated behind the `E2E_ENABLED` environment
//! variable so they do not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 DYLD_LIBRARY_PATH=. cargo test --test e2e -- --nocapture

use async_trait::async_trait;
use image::{DynamicImage, GrayImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document as PdfDocument, Object, Stream, StringFormat};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use techsheet_audit::pipeline::extract::ExtractionSettings;
use techsheet_audit::pipeline::ocr::OcrEngine;
use techsheet_audit::pipeline::rasterize::{PageRasterizer, RasterPage};
use techsheet_audit::pipeline::text_layer::{PageText, PdfTextExtractor, TextLayerExtractor};
use techsheet_audit::{
    AnalysisError, AuditConfig, AuditError, AuditProgressCallback, AuditStage, Auditor, Checklist,
    Decision, Document, ExtractionError, ExtractionMethod, ExtractionPipeline, FindingStatus,
    ReportAnalyzer, StrategyOutcome, VisionClient,
};

// ── Fakes ────────────────────────────────────────────────────────────────────

/// Text layer with canned page texts.
struct FakeTextLayer {
    pages: Vec<&'static str>,
    calls: AtomicUsize,
}

impl FakeTextLayer {
    fn new(pages: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            pages,
            calls: AtomicUsize::new(0),
        })
    }
}

impl TextLayerExtractor for FakeTextLayer {
    fn extract_pages(&self, _pdf_bytes: &[u8]) -> Result<Vec<PageText>, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .pages
            .iter()
            .enumerate()
            .map(|(i, t)| PageText {
                page_num: i + 1,
                text: t.to_string(),
            })
            .collect())
    }
}

/// Rasterizer producing `pages` small white bitmaps and logging the DPI of each call.
struct FakeRasterizer {
    pages: usize,
    dpis: Mutex<Vec<u32>>,
}

impl FakeRasterizer {
    fn new(pages: usize) -> Arc<Self> {
        Arc::new(Self {
            pages,
            dpis: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.dpis.lock().unwrap().len()
    }
}

impl PageRasterizer for FakeRasterizer {
    fn rasterize(&self, _pdf_bytes: &[u8], dpi: u32) -> Result<Vec<RasterPage>, ExtractionError> {
        self.dpis.lock().unwrap().push(dpi);
        Ok((1..=self.pages)
            .map(|page_num| RasterPage {
                page_num,
                image: DynamicImage::ImageLuma8(GrayImage::from_pixel(16, 16, image::Luma([255]))),
            })
            .collect())
    }
}

enum OcrBehaviour {
    Text(HashMap<usize, &'static str>),
    Unavailable,
}

struct FakeOcr {
    behaviour: OcrBehaviour,
    calls: AtomicUsize,
}

impl FakeOcr {
    fn with_text(pages: &[(usize, &'static str)]) -> Arc<Self> {
        Arc::new(Self {
            behaviour: OcrBehaviour::Text(pages.iter().copied().collect()),
            calls: AtomicUsize::new(0),
        })
    }

    fn blank() -> Arc<Self> {
        Self::with_text(&[])
    }

    fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            behaviour: OcrBehaviour::Unavailable,
            calls: AtomicUsize::new(0),
        })
    }
}

impl OcrEngine for FakeOcr {
    fn recognize(&self, _image: &GrayImage, page_num: usize) -> Result<String, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behaviour {
            OcrBehaviour::Text(pages) => Ok(pages.get(&page_num).copied().unwrap_or("").to_string()),
            OcrBehaviour::Unavailable => Err(ExtractionError::OcrUnavailable(
                "tesseract: command not found".into(),
            )),
        }
    }
}

/// Vision client recording the page numbers it was asked about.
struct FakeVision {
    pages: Mutex<Vec<usize>>,
    reply: &'static str,
}

impl FakeVision {
    fn new(reply: &'static str) -> Arc<Self> {
        Arc::new(Self {
            pages: Mutex::new(Vec::new()),
            reply,
        })
    }

    fn pages(&self) -> Vec<usize> {
        self.pages.lock().unwrap().clone()
    }
}

#[async_trait]
impl VisionClient for FakeVision {
    async fn analyze_image(&self, png: &[u8], page_num: usize) -> Result<String, AnalysisError> {
        assert!(png.starts_with(b"\x89PNG"), "vision input must be PNG");
        self.pages.lock().unwrap().push(page_num);
        Ok(self.reply.to_string())
    }
}

/// Analyzer returning a canned answer and keeping the text it was given.
struct FakeAnalyzer {
    reply: Result<String, AnalysisError>,
    inputs: Mutex<Vec<String>>,
}

impl FakeAnalyzer {
    fn replying(reply: String) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply),
            inputs: Mutex::new(Vec::new()),
        })
    }

    fn failing(err: AnalysisError) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(err),
            inputs: Mutex::new(Vec::new()),
        })
    }

    fn inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReportAnalyzer for FakeAnalyzer {
    async fn analyze(&self, document_text: &str, prompt: &str) -> Result<String, AnalysisError> {
        assert!(!prompt.is_empty());
        self.inputs.lock().unwrap().push(document_text.to_string());
        self.reply.clone()
    }
}

/// Progress callback logging events as short strings.
#[derive(Default)]
struct EventLog {
    events: Mutex<Vec<String>>,
}

impl EventLog {
    fn push(&self, e: String) {
        self.events.lock().unwrap().push(e);
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl AuditProgressCallback for EventLog {
    fn on_audit_start(&self, total_pages: usize) {
        self.push(format!("start {total_pages}"));
    }
    fn on_stage_start(&self, stage: AuditStage) {
        self.push(format!("begin {stage}"));
    }
    fn on_page_complete(&self, stage: AuditStage, page_num: usize, _total: usize, _chars: usize) {
        self.push(format!("page {stage} {page_num}"));
    }
    fn on_stage_complete(&self, stage: AuditStage, succeeded: bool) {
        self.push(format!("end {stage} {succeeded}"));
    }
    fn on_audit_complete(&self, report_pages: usize) {
        self.push(format!("complete {}", report_pages > 0));
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

const NATIVE_SHEET: &str = "FICHE TECHNIQUE PRODUIT\n\
    Dénomination : Jambon cuit supérieur découenné dégraissé\n\
    Fournisseur : Salaisons de l'Odet, 12 rue du Port, 29000 Quimper\n\
    Estampille sanitaire : FR 29.021.001 CE\n\
    Conservation : entre 0 °C et +4 °C, DLC 21 jours après fabrication\n\
    Origine des porcs : France. Conditionnement : sous vide, carton de 4 pièces.";

const SCANNED_PAGE: &str = "Dénomination : Filet de poulet\nEstampille FR 56.162.001 CE";

fn fake_document() -> Document {
    Document::from_bytes(b"%PDF-1.4\n%%EOF\n".to_vec(), "fixture.pdf").expect("valid header")
}

/// One-page PDF with nothing drawn on it.
fn blank_pdf() -> Vec<u8> {
    pdf_with_pages(&[None])
}

/// PDF with one page per entry; `Some(text)` draws the text in Helvetica.
fn pdf_with_pages(pages: &[Option<&str>]) -> Vec<u8> {
    let mut doc = PdfDocument::with_version("1.4");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let mut operations = Vec::new();
        if let Some(text) = text {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), 11.into()]));
            operations.push(Operation::new("TL", vec![14.into()]));
            operations.push(Operation::new("Td", vec![50.into(), 780.into()]));
            for line in text.lines() {
                operations.push(Operation::new(
                    "Tj",
                    vec![Object::String(line.as_bytes().to_vec(), StringFormat::Literal)],
                ));
                operations.push(Operation::new("T*", vec![]));
            }
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages.len() as i64,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("save fixture");
    bytes
}

/// A well-formed model answer: point 3 present, everything else missing.
fn model_answer(checklist: &Checklist) -> String {
    let mut out = String::from("Voici l'analyse de la fiche technique.\n\n");
    for point in &checklist.points {
        if point.index == 3 {
            out.push_str(
                "3. Estampille\n\
                 Statut : Présent\n\
                 Preuve : \"Estampille sanitaire : FR 29.021.001 CE\"\n\
                 Recommandation : Valider\n",
            );
        } else {
            out.push_str(&format!(
                "{}. {}\nStatut : Non trouvé\nPreuve : Non trouvé\nCriticité : {} - absent de la fiche\nRecommandation : Demander complément\n",
                point.index,
                point.name,
                point.severity.label()
            ));
        }
        out.push_str("---\n");
    }
    out.push_str("Résumé\n- Décision : Demander complément\n- Incohérences : aucune\n");
    out
}

struct Harness {
    text_layer: Arc<FakeTextLayer>,
    rasterizer: Arc<FakeRasterizer>,
    ocr: Arc<FakeOcr>,
    vision: Arc<FakeVision>,
    analyzer: Arc<FakeAnalyzer>,
    config: AuditConfig,
}

impl Harness {
    fn new(native: Vec<&'static str>, ocr: Arc<FakeOcr>, vision_reply: &'static str) -> Self {
        let config = AuditConfig::default();
        let raster_pages = native.len().max(1);
        Self {
            text_layer: FakeTextLayer::new(native),
            rasterizer: FakeRasterizer::new(raster_pages),
            ocr,
            vision: FakeVision::new(vision_reply),
            analyzer: FakeAnalyzer::replying(model_answer(&config.checklist)),
            config,
        }
    }

    fn pipeline(&self) -> ExtractionPipeline {
        let mut pipeline = ExtractionPipeline::new(
            ExtractionSettings::from(&self.config),
            self.text_layer.clone(),
            self.rasterizer.clone(),
            self.ocr.clone(),
        )
        .with_vision(self.vision.clone());
        if let Some(ref cb) = self.config.progress_callback {
            pipeline = pipeline.with_progress(Arc::clone(cb));
        }
        pipeline
    }

    fn auditor(&self) -> Auditor {
        Auditor::new(self.pipeline(), self.analyzer.clone(), &self.config)
    }
}

// ── Extraction strategies ────────────────────────────────────────────────────

#[tokio::test]
async fn native_text_above_threshold_skips_ocr_and_vision() {
    let h = Harness::new(vec![NATIVE_SHEET], FakeOcr::blank(), "unused");
    let extracted = h.pipeline().extract(&fake_document()).await;

    assert_eq!(extracted.method, Some(ExtractionMethod::NativeText));
    assert_eq!(extracted.text, NATIVE_SHEET);
    assert_eq!(h.text_layer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.rasterizer.calls(), 0);
    assert_eq!(h.ocr.calls.load(Ordering::SeqCst), 0);
    assert!(h.vision.pages().is_empty());
    assert_eq!(extracted.attempts.len(), 1);
}

#[tokio::test]
async fn short_native_text_falls_through_to_ocr() {
    let h = Harness::new(
        vec!["Page 1/2", ""],
        FakeOcr::with_text(&[(1, SCANNED_PAGE)]),
        "unused",
    );
    let extracted = h.pipeline().extract(&fake_document()).await;

    assert_eq!(extracted.method, Some(ExtractionMethod::Ocr));
    assert!(extracted.text.contains("FR 56.162.001 CE"));
    assert_eq!(h.ocr.calls.load(Ordering::SeqCst), 2);
    assert!(h.vision.pages().is_empty(), "OCR text must stop the fallback");
    assert_eq!(*h.rasterizer.dpis.lock().unwrap(), vec![h.config.ocr_dpi]);
    assert!(matches!(
        extracted.attempts[0].outcome,
        StrategyOutcome::Empty { .. }
    ));
}

#[tokio::test]
async fn empty_ocr_uses_vision_once_per_page_with_markers() {
    let h = Harness::new(vec!["", "", ""], FakeOcr::blank(), "Origine : France");
    let extracted = h.pipeline().extract(&fake_document()).await;

    assert_eq!(extracted.method, Some(ExtractionMethod::Vision));
    assert_eq!(h.vision.pages(), vec![1, 2, 3]);
    for page in 1..=3 {
        let marker = format!("--- Page {page} ---");
        assert_eq!(extracted.text.matches(&marker).count(), 1, "marker {marker}");
    }
    let first = extracted.text.find("--- Page 1 ---").unwrap();
    let third = extracted.text.find("--- Page 3 ---").unwrap();
    assert!(first < third);
    assert_eq!(
        *h.rasterizer.dpis.lock().unwrap(),
        vec![h.config.ocr_dpi, h.config.vision_dpi]
    );
}

#[tokio::test]
async fn missing_ocr_engine_degrades_to_vision() {
    let h = Harness::new(vec![""], FakeOcr::unavailable(), "Espèce : porc");
    let extracted = h.pipeline().extract(&fake_document()).await;

    assert_eq!(extracted.method, Some(ExtractionMethod::Vision));
    let ocr_attempt = &extracted.attempts[1];
    assert_eq!(ocr_attempt.method, ExtractionMethod::Ocr);
    assert!(matches!(
        ocr_attempt.outcome,
        StrategyOutcome::Failed(ExtractionError::OcrUnavailable(_))
    ));
}

fn hybrid_config() -> AuditConfig {
    AuditConfig::builder().hybrid_pages(true).build().unwrap()
}

#[tokio::test]
async fn hybrid_mode_ocrs_only_pages_without_text() {
    let mut h = Harness::new(
        vec![NATIVE_SHEET, ""],
        FakeOcr::with_text(&[(1, "ne doit pas servir"), (2, SCANNED_PAGE)]),
        "unused",
    );
    h.config = hybrid_config();
    let extracted = h.pipeline().extract(&fake_document()).await;

    assert_eq!(extracted.method, Some(ExtractionMethod::Hybrid));
    assert_eq!(h.ocr.calls.load(Ordering::SeqCst), 1);
    assert!(h.vision.pages().is_empty());
    assert_eq!(*h.rasterizer.dpis.lock().unwrap(), vec![h.config.ocr_dpi]);

    let first = extracted.text.find("--- Page 1 ---").expect("page 1 marker");
    let second = extracted.text.find("--- Page 2 ---").expect("page 2 marker");
    assert!(first < second);
    assert!(extracted.text[first..second].contains("FR 29.021.001 CE"));
    assert!(extracted.text[second..].contains("FR 56.162.001 CE"));
    assert!(!extracted.text.contains("ne doit pas servir"));

    let methods: Vec<_> = extracted.attempts.iter().map(|a| a.method).collect();
    assert_eq!(methods, vec![ExtractionMethod::NativeText, ExtractionMethod::Hybrid]);
}

#[tokio::test]
async fn hybrid_mode_rejects_trivial_text_and_uses_vision() {
    let mut h = Harness::new(vec!["1", ""], FakeOcr::blank(), "Dénomination : Jambon cuit");
    h.config = hybrid_config();
    let extracted = h.pipeline().extract(&fake_document()).await;

    assert_eq!(extracted.method, Some(ExtractionMethod::Vision));
    assert_eq!(h.vision.pages(), vec![1, 2]);
    let hybrid = extracted
        .attempts
        .iter()
        .find(|a| a.method == ExtractionMethod::Hybrid)
        .expect("hybrid attempt");
    assert!(matches!(hybrid.outcome, StrategyOutcome::Empty { .. }));
    assert!(extracted.attempts.iter().all(|a| a.method != ExtractionMethod::Ocr));
}

#[tokio::test]
async fn hybrid_mode_keeps_text_layer_when_ocr_is_missing() {
    let mut h = Harness::new(vec![NATIVE_SHEET, ""], FakeOcr::unavailable(), "unused");
    h.config = hybrid_config();
    let extracted = h.pipeline().extract(&fake_document()).await;

    assert_eq!(extracted.method, Some(ExtractionMethod::NativeText));
    assert!(extracted.text.contains("FR 29.021.001 CE"));
    assert!(h.vision.pages().is_empty());
    assert!(matches!(
        extracted.attempts[1].outcome,
        StrategyOutcome::Failed(ExtractionError::OcrUnavailable(_))
    ));
}

#[tokio::test]
async fn blank_single_page_pdf_calls_vision_for_page_one() {
    let h = Harness::new(vec![], FakeOcr::blank(), "Conservation : 0/+4 °C");
    let pipeline = ExtractionPipeline::new(
        ExtractionSettings::from(&h.config),
        Arc::new(PdfTextExtractor),
        h.rasterizer.clone(),
        h.ocr.clone(),
    )
    .with_vision(h.vision.clone());

    let document = Document::from_bytes(blank_pdf(), "blank.pdf").expect("fixture");
    let extracted = pipeline.extract(&document).await;

    assert_eq!(h.vision.pages(), vec![1]);
    assert_eq!(extracted.method, Some(ExtractionMethod::Vision));
    assert!(extracted.text.starts_with("--- Page 1 ---"));
}

#[tokio::test]
async fn real_text_layer_is_read_from_fixture_pdf() {
    // The fixture writes raw bytes, so keep to ASCII.
    let ascii: String = NATIVE_SHEET
        .chars()
        .map(|c| if c.is_ascii() { c } else { 'e' })
        .collect();
    let h = Harness::new(vec![], FakeOcr::blank(), "unused");
    let pipeline = ExtractionPipeline::new(
        ExtractionSettings::from(&h.config),
        Arc::new(PdfTextExtractor),
        h.rasterizer.clone(),
        h.ocr.clone(),
    );

    let document = Document::from_bytes(pdf_with_pages(&[Some(ascii.as_str())]), "sheet.pdf").expect("fixture");
    let extracted = pipeline.extract(&document).await;

    assert_eq!(extracted.method, Some(ExtractionMethod::NativeText));
    assert!(extracted.text.contains("FR 29.021.001 CE"), "got: {}", extracted.text);
    assert_eq!(h.rasterizer.calls(), 0);
}

#[tokio::test]
async fn exhausted_extraction_is_fatal_and_skips_analysis() {
    let h = Harness::new(vec![""], FakeOcr::blank(), "   ");
    let err = h.auditor().audit_document(&fake_document()).await.unwrap_err();

    assert!(matches!(err, AuditError::ExtractionExhausted { pages: 1, .. }), "got: {err}");
    assert!(h.analyzer.inputs().is_empty());
}

// ── Full audit ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn native_sheet_produces_complete_report_pdf() {
    let h = Harness::new(vec![NATIVE_SHEET], FakeOcr::blank(), "unused");
    let output = h.auditor().audit_document(&fake_document()).await.expect("audit");

    assert!(output.is_complete());
    assert_eq!(output.method, ExtractionMethod::NativeText);
    assert_eq!(output.report.findings.len(), 20);
    assert_eq!(
        output.report.finding(3).and_then(|f| f.status),
        Some(FindingStatus::Present)
    );
    assert_eq!(output.report.summary.decision, Decision::RequestSupplement);

    let inputs = h.analyzer.inputs();
    assert_eq!(inputs.len(), 1);
    assert!(inputs[0].starts_with(NATIVE_SHEET));
    assert!(inputs[0].ends_with("[INFO] extraction=native-text"));

    let pdf = PdfDocument::load_mem(&output.pdf).expect("report is a valid PDF");
    assert_eq!(pdf.get_pages().len(), output.stats.report_pages);
    assert!(output.stats.report_pages >= 2);
    assert_eq!(output.stats.report_bytes, output.pdf.len());
}

#[tokio::test]
async fn same_input_renders_byte_identical_reports() {
    let h = Harness::new(vec![NATIVE_SHEET], FakeOcr::blank(), "unused");
    let auditor = h.auditor();
    let first = auditor.audit_document(&fake_document()).await.expect("first");
    let second = auditor.audit_document(&fake_document()).await.expect("second");
    assert_eq!(first.pdf, second.pdf);
}

#[tokio::test]
async fn missing_control_point_still_renders_with_warning() {
    let mut h = Harness::new(vec![NATIVE_SHEET], FakeOcr::blank(), "unused");
    let answer = model_answer(&h.config.checklist);
    let start = answer.find("19. Critères microbiologiques").expect("point 19");
    let end = start + answer[start..].find("---\n").expect("separator") + 4;
    let truncated = format!("{}{}", &answer[..start], &answer[end..]);
    h.analyzer = FakeAnalyzer::replying(truncated);

    let output = h.auditor().audit_document(&fake_document()).await.expect("audit");

    assert!(!output.is_complete());
    assert_eq!(output.missing_points, vec![19]);
    assert_eq!(output.report.findings.len(), 19);
    assert!(output.warnings.iter().any(|w| w.contains("19")), "{:?}", output.warnings);
    assert!(!output.pdf.is_empty());
}

#[tokio::test]
async fn analyzer_failure_is_fatal() {
    let mut h = Harness::new(vec![NATIVE_SHEET], FakeOcr::blank(), "unused");
    h.analyzer = FakeAnalyzer::failing(AnalysisError::Timeout { secs: 120 });

    let err = h.auditor().audit_document(&fake_document()).await.unwrap_err();
    match err {
        AuditError::AnalysisFailed { reason } => assert!(reason.contains("120s"), "{reason}"),
        other => panic!("expected AnalysisFailed, got {other}"),
    }
}

#[tokio::test]
async fn audit_bytes_rejects_non_pdf_input() {
    let h = Harness::new(vec![NATIVE_SHEET], FakeOcr::blank(), "unused");
    let err = h
        .auditor()
        .audit_bytes(b"\x89PNG\r\n\x1a\n".to_vec(), "scan.png")
        .await
        .unwrap_err();
    assert!(matches!(err, AuditError::NotAPdf { .. }), "got: {err}");
}

#[tokio::test]
async fn audit_of_missing_file_reports_path() {
    let h = Harness::new(vec![NATIVE_SHEET], FakeOcr::blank(), "unused");
    let err = h.auditor().audit("/nonexistent/fiche.pdf").await.unwrap_err();
    assert!(matches!(err, AuditError::FileNotFound { .. }), "got: {err}");
}

#[tokio::test]
async fn audit_to_file_writes_the_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("fiche.pdf");
    std::fs::write(&input, fake_document().bytes()).expect("write input");
    let target = dir.path().join("rapports").join("fiche.audit.pdf");

    let h = Harness::new(vec![NATIVE_SHEET], FakeOcr::blank(), "unused");
    let output = h
        .auditor()
        .audit_to_file(input.to_str().expect("utf8"), &target)
        .await
        .expect("audit");

    let written = std::fs::read(&target).expect("report written");
    assert_eq!(written, output.pdf);
    assert!(written.starts_with(b"%PDF-1.4"));
}

#[tokio::test]
async fn progress_events_follow_the_audit() {
    let log = Arc::new(EventLog::default());
    let mut h = Harness::new(vec!["", ""], FakeOcr::with_text(&[(2, SCANNED_PAGE)]), "unused");
    h.config = AuditConfig::builder()
        .progress_callback(log.clone())
        .build()
        .expect("config");

    h.auditor().audit_document(&fake_document()).await.expect("audit");

    assert_eq!(
        log.events(),
        vec![
            "begin native text",
            "start 2",
            "end native text false",
            "begin OCR",
            "page OCR 1",
            "page OCR 2",
            "end OCR true",
            "begin analysis",
            "end analysis true",
            "begin rendering",
            "end rendering true",
            "complete true",
        ]
    );
}

#[tokio::test]
async fn custom_checklist_drives_the_report() {
    let json = r#"{
        "version": "test-3",
        "points": [
            {"index": 1, "name": "Estampille", "severity": "critical"},
            {"index": 2, "name": "Température", "severity": "critical"},
            {"index": 3, "name": "Origine", "severity": "major"}
        ]
    }"#;
    let checklist = Checklist::from_json(json).expect("checklist");
    let mut h = Harness::new(vec![NATIVE_SHEET], FakeOcr::blank(), "unused");
    h.config = AuditConfig::builder()
        .checklist(checklist)
        .build()
        .expect("config");
    h.analyzer = FakeAnalyzer::replying(
        "1. Estampille\nStatut : Présent\nPreuve : \"FR 29.021.001 CE\"\n---\n\
         2. Température\nStatut : Présent\nPreuve : \"entre 0 °C et +4 °C\"\n---\n\
         3. Origine\nStatut : Partiel\nCriticité : Majeur - pays d'élevage seul\n---\n\
         Résumé\n- Points majeurs (1) : [Origine]\n"
            .to_string(),
    );

    let output = h.auditor().audit_document(&fake_document()).await.expect("audit");

    assert!(output.is_complete());
    assert_eq!(output.report.checklist_version, "test-3");
    assert_eq!(output.report.findings.len(), 3);
    assert_eq!(output.report.summary.major_count(), 1);
    assert_eq!(output.report.summary.decision, Decision::RequestSupplement);
}

#[test]
fn output_serialises_without_pdf_bytes() {
    let rt = tokio::runtime::Runtime::new().expect("runtime");
    let h = Harness::new(vec![NATIVE_SHEET], FakeOcr::blank(), "unused");
    let output = rt
        .block_on(h.auditor().audit_document(&fake_document()))
        .expect("audit");

    let json = serde_json::to_value(&output).expect("serialise");
    assert!(json.get("pdf").is_none());
    assert_eq!(json["method"], "native-text");
    assert_eq!(json["report"]["findings"].as_array().map(Vec::len), Some(20));
}

#[test]
fn callbacks_and_collaborators_are_send_sync() {
    fn assert_send_sync<T: Send + Sync + ?Sized>() {}
    assert_send_sync::<dyn AuditProgressCallback>();
    assert_send_sync::<dyn ReportAnalyzer>();
    assert_send_sync::<dyn VisionClient>();
    assert_send_sync::<Auditor>();
}

// ── Live tests (E2E_ENABLED) ─────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

fn output_dir() -> PathBuf {
    let d = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/output");
    std::fs::create_dir_all(&d).ok();
    d
}

/// Skip this test if E2E_ENABLED is not set *or* no PDF file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP: test file not found: {}", p.display());
            return;
        }
        p
    }};
}

#[tokio::test]
async fn live_audit_of_native_data_sheet() {
    let input = e2e_skip_unless_ready!(test_cases_dir().join("fiche_native.pdf"));
    let target = output_dir().join("fiche_native.audit.pdf");

    let config = AuditConfig::default();
    let output = techsheet_audit::audit_to_file(input.to_string_lossy(), &target, &config)
        .await
        .expect("live audit");

    println!("{}", output.report.to_canonical_text());
    for w in &output.warnings {
        println!("warning: {w}");
    }
    assert_eq!(output.method, ExtractionMethod::NativeText);
    assert!(!output.report.findings.is_empty());
    assert!(target.exists());
}

#[tokio::test]
async fn live_audit_of_scanned_data_sheet() {
    let input = e2e_skip_unless_ready!(test_cases_dir().join("fiche_scan.pdf"));
    let target = output_dir().join("fiche_scan.audit.pdf");

    let config = AuditConfig::builder()
        .hybrid_pages(true)
        .build()
        .expect("config");
    let output = techsheet_audit::audit_to_file(input.to_string_lossy(), &target, &config)
        .await
        .expect("live audit");

    for attempt in &output.attempts {
        println!("attempt: {attempt}");
    }
    assert_ne!(output.method, ExtractionMethod::NativeText);
    assert!(output.stats.report_pages >= 1);
}
