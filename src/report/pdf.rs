//! Serialize laid-out pages to PDF bytes with `lopdf`.
//!
//! Output uses the two standard Helvetica faces with `WinAnsiEncoding`, so
//! no font is embedded. The writer adds no timestamps or random IDs, which
//! makes rendering byte-for-byte reproducible.

use super::layout::{self, PlacedItem, RenderedPage, StyledLine, TextStyle};
use super::Report;
use crate::config::LayoutConfig;
use crate::error::AuditError;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

const FONT_REGULAR: &str = "F1";
const FONT_BOLD: &str = "F2";
const RULE_WIDTH: f32 = 0.5;
const RULE_GRAY: f32 = 0.6;

/// A character the PDF fonts cannot show, and what was drawn instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderFault {
    pub page: usize,
    pub character: char,
    pub replacement: String,
}

impl fmt::Display for RenderFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "page {}: U+{:04X} '{}' drawn as '{}'",
            self.page, self.character as u32, self.character, self.replacement
        )
    }
}

/// A finished PDF.
#[derive(Debug, Clone)]
pub struct RenderedReport {
    pub bytes: Vec<u8>,
    pub pages: usize,
    pub faults: Vec<RenderFault>,
}

/// Render a normalized report through its canonical text.
pub fn render_report(report: &Report, config: &LayoutConfig) -> Result<RenderedReport, AuditError> {
    let lines = layout::canonical_lines(&report.to_canonical_text());
    render_lines(&lines, config)
}

/// Render arbitrary report text, classifying headings and separators per line.
pub fn render_text(text: &str, config: &LayoutConfig) -> Result<RenderedReport, AuditError> {
    render_lines(&layout::styled_lines(text), config)
}

fn render_lines(lines: &[StyledLine], config: &LayoutConfig) -> Result<RenderedReport, AuditError> {
    let pages = layout::layout(lines, config);
    let mut faults = Vec::new();

    let mut doc = Document::with_version("1.4");
    let pages_id = doc.new_object_id();
    let regular_id = doc.add_object(font_dictionary("Helvetica"));
    let bold_id = doc.add_object(font_dictionary("Helvetica-Bold"));
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            FONT_REGULAR => regular_id,
            FONT_BOLD => bold_id,
        },
    });

    let media_box: Vec<Object> = vec![
        0i64.into(),
        0i64.into(),
        round2(config.page_width).into(),
        round2(config.page_height).into(),
    ];

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for (i, page) in pages.iter().enumerate() {
        let content = Content {
            operations: page_operations(page, i + 1, config, &mut faults),
        };
        let encoded = content
            .encode()
            .map_err(|e| AuditError::RenderFailed(format!("page {}: {e}", i + 1)))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => media_box.clone(),
            "Resources" => resources_id,
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
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| AuditError::RenderFailed(e.to_string()))?;

    if !faults.is_empty() {
        warn!("{} character(s) substituted while rendering", faults.len());
    }
    debug!("Rendered {} page(s), {} bytes", pages.len(), bytes.len());

    Ok(RenderedReport {
        bytes,
        pages: pages.len(),
        faults,
    })
}

fn font_dictionary(base_font: &str) -> lopdf::Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base_font,
        "Encoding" => "WinAnsiEncoding",
    }
}

fn page_operations(
    page: &RenderedPage,
    page_num: usize,
    config: &LayoutConfig,
    faults: &mut Vec<RenderFault>,
) -> Vec<Operation> {
    let mut ops = Vec::new();
    for item in &page.items {
        match item {
            PlacedItem::Text { x, y, text, style } => {
                let (font, size) = match style {
                    TextStyle::Body => (FONT_REGULAR, config.body_font_size),
                    TextStyle::Footer => (FONT_REGULAR, (config.body_font_size - 2.0).max(6.0)),
                    TextStyle::Heading => (FONT_BOLD, config.heading_font_size),
                    TextStyle::Title => (FONT_BOLD, config.title_font_size),
                };
                let color = match style {
                    TextStyle::Heading | TextStyle::Title => config.heading_color.unwrap_or([0.0; 3]),
                    TextStyle::Body | TextStyle::Footer => [0.0; 3],
                };
                let encoded = encode_win_ansi(text, page_num, faults);
                ops.push(Operation::new("BT", vec![]));
                ops.push(Operation::new(
                    "Tf",
                    vec![Object::Name(font.as_bytes().to_vec()), round2(size).into()],
                ));
                ops.push(Operation::new(
                    "rg",
                    color.iter().map(|c| round2(*c).into()).collect(),
                ));
                ops.push(Operation::new(
                    "Tm",
                    vec![
                        1i64.into(),
                        0i64.into(),
                        0i64.into(),
                        1i64.into(),
                        round2(*x).into(),
                        round2(*y).into(),
                    ],
                ));
                ops.push(Operation::new(
                    "Tj",
                    vec![Object::String(encoded, StringFormat::Literal)],
                ));
                ops.push(Operation::new("ET", vec![]));
            }
            PlacedItem::Rule { x1, x2, y } => {
                ops.push(Operation::new("w", vec![RULE_WIDTH.into()]));
                ops.push(Operation::new(
                    "RG",
                    vec![RULE_GRAY.into(), RULE_GRAY.into(), RULE_GRAY.into()],
                ));
                ops.push(Operation::new("m", vec![round2(*x1).into(), round2(*y).into()]));
                ops.push(Operation::new("l", vec![round2(*x2).into(), round2(*y).into()]));
                ops.push(Operation::new("S", vec![]));
            }
        }
    }
    ops
}

fn round2(v: f32) -> f32 {
    (v * 100.0).round() / 100.0
}

/// Encode `text` for a WinAnsi font, substituting what it cannot show.
pub fn encode_win_ansi(text: &str, page: usize, faults: &mut Vec<RenderFault>) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for c in text.chars() {
        if let Some(b) = win_ansi_byte(c) {
            out.push(b);
            continue;
        }
        if c.is_control() {
            out.push(b' ');
            continue;
        }
        let replacement = substitute(c);
        out.extend(replacement.bytes());
        faults.push(RenderFault {
            page,
            character: c,
            replacement: replacement.to_string(),
        });
    }
    out
}

fn win_ansi_byte(c: char) -> Option<u8> {
    let code = c as u32;
    match code {
        0x20..=0x7E | 0xA0..=0xFF => Some(code as u8),
        _ => match c {
            '€' => Some(0x80),
            '‚' => Some(0x82),
            'ƒ' => Some(0x83),
            '„' => Some(0x84),
            '…' => Some(0x85),
            '†' => Some(0x86),
            '‡' => Some(0x87),
            'ˆ' => Some(0x88),
            '‰' => Some(0x89),
            'Š' => Some(0x8A),
            '‹' => Some(0x8B),
            'Œ' => Some(0x8C),
            'Ž' => Some(0x8E),
            '‘' => Some(0x91),
            '’' => Some(0x92),
            '“' => Some(0x93),
            '”' => Some(0x94),
            '•' => Some(0x95),
            '–' => Some(0x96),
            '—' => Some(0x97),
            '˜' => Some(0x98),
            '™' => Some(0x99),
            'š' => Some(0x9A),
            '›' => Some(0x9B),
            'œ' => Some(0x9C),
            'ž' => Some(0x9E),
            'Ÿ' => Some(0x9F),
            _ => None,
        },
    }
}

/// ASCII stand-in for a character outside WinAnsi.
fn substitute(c: char) -> &'static str {
    match c {
        '≤' => "<=",
        '≥' => ">=",
        '≠' => "!=",
        '≈' | '∼' => "~",
        '→' | '⇒' => "->",
        '←' => "<-",
        '‐' | '‑' | '‒' | '−' => "-",
        '′' | 'ʼ' => "'",
        '″' => "\"",
        'ﬁ' => "fi",
        'ﬂ' => "fl",
        '✓' | '✔' | '✅' => "[OK]",
        '✗' | '✘' | '❌' => "[X]",
        '⚠' => "(!)",
        _ => "?",
    }
}
