//! Pure text layout: styled lines → positioned items on A4 pages.
//!
//! Nothing here touches PDF objects, so wrapping and pagination are tested
//! on plain data. Coordinates are PDF points with the origin at the bottom
//! left; the cursor starts at the top margin and moves down.

use super::lines::{self, LineKind};
use crate::config::LayoutConfig;

/// Average Helvetica glyph width as a fraction of the font size. The default
/// `wrap_chars` budget and hanging indents are sized with it.
const AVG_GLYPH_EM: f32 = 0.5;
/// Baseline position within a line box, from its top.
const BASELINE_RATIO: f32 = 0.75;
const EPSILON: f32 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextStyle {
    Body,
    Heading,
    Title,
    Footer,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlacedItem {
    Text {
        x: f32,
        y: f32,
        text: String,
        style: TextStyle,
    },
    /// Horizontal rule across the content width.
    Rule { x1: f32, x2: f32, y: f32 },
}

/// One laid-out page.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderedPage {
    pub items: Vec<PlacedItem>,
}

impl RenderedPage {
    /// Text items in drawing order.
    pub fn texts(&self) -> impl Iterator<Item = (&str, TextStyle)> {
        self.items.iter().filter_map(|item| match item {
            PlacedItem::Text { text, style, .. } => Some((text.as_str(), *style)),
            PlacedItem::Rule { .. } => None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Heading,
    Body,
    Separator,
    Blank,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledLine {
    pub style: LineStyle,
    pub text: String,
}

impl StyledLine {
    fn new(style: LineStyle, text: impl Into<String>) -> Self {
        Self {
            style,
            text: text.into(),
        }
    }
}

/// Style arbitrary report text with the line classifier.
pub fn styled_lines(text: &str) -> Vec<StyledLine> {
    text.lines()
        .map(|line| match lines::classify(line) {
            LineKind::Blank => StyledLine::new(LineStyle::Blank, ""),
            LineKind::Separator => StyledLine::new(LineStyle::Separator, ""),
            LineKind::Numbered { .. } | LineKind::Heading { .. } | LineKind::SummaryHeading => {
                StyledLine::new(LineStyle::Heading, lines::clean_title(line))
            }
            LineKind::Field { .. } | LineKind::Body(_) => {
                StyledLine::new(LineStyle::Body, line.replace("**", "").trim_end())
            }
        })
        .collect()
}

/// Style canonical report text: the first line of every block is its heading.
pub fn canonical_lines(text: &str) -> Vec<StyledLine> {
    let mut out = Vec::new();
    let mut block_start = true;
    for line in text.lines() {
        if line.trim() == "---" {
            out.push(StyledLine::new(LineStyle::Separator, ""));
            block_start = true;
        } else if line.trim().is_empty() {
            out.push(StyledLine::new(LineStyle::Blank, ""));
        } else if block_start {
            out.push(StyledLine::new(LineStyle::Heading, line.trim()));
            block_start = false;
        } else {
            out.push(StyledLine::new(LineStyle::Body, line.trim_end()));
        }
    }
    out
}

/// Lay out `lines` onto as many pages as needed. Always returns at least one page.
pub fn layout(lines: &[StyledLine], config: &LayoutConfig) -> Vec<RenderedPage> {
    let mut cursor = Cursor::new(config);

    if let Some(ref title) = config.title {
        cursor.place(title, 0.0, TextStyle::Title, 2);
    }

    for line in lines {
        match line.style {
            LineStyle::Blank => cursor.skip_line(),
            LineStyle::Separator => cursor.rule(),
            LineStyle::Heading => {
                for chunk in wrap(&line.text, config.heading_wrap_chars(), 0) {
                    cursor.place(&chunk, 0.0, TextStyle::Heading, 1);
                }
            }
            LineStyle::Body => {
                let indent = hanging_indent(&line.text);
                let text = line.text.trim_start();
                for (i, chunk) in wrap(text, config.wrap_chars, indent).into_iter().enumerate() {
                    let x = if i == 0 {
                        0.0
                    } else {
                        indent as f32 * config.body_font_size * AVG_GLYPH_EM
                    };
                    cursor.place(&chunk, x, TextStyle::Body, 1);
                }
            }
        }
    }

    let mut pages = cursor.finish();
    if let (Some(footer), Some(last)) = (config.footer.as_ref(), pages.last_mut()) {
        last.items.push(PlacedItem::Text {
            x: config.margin_left,
            y: config.footer_offset,
            text: footer.clone(),
            style: TextStyle::Footer,
        });
    }
    pages
}

/// Characters of hanging indent for a bullet line, 0 otherwise.
fn hanging_indent(line: &str) -> usize {
    if lines::is_bullet(line) {
        2
    } else {
        0
    }
}

struct Cursor<'a> {
    config: &'a LayoutConfig,
    pages: Vec<RenderedPage>,
    current: RenderedPage,
    /// Top of the next line box.
    y: f32,
}

impl<'a> Cursor<'a> {
    fn new(config: &'a LayoutConfig) -> Self {
        Self {
            config,
            pages: Vec::new(),
            current: RenderedPage::default(),
            y: config.page_height - config.margin_top,
        }
    }

    fn fits(&self, height: f32) -> bool {
        self.y - height >= self.config.margin_bottom - EPSILON
    }

    fn at_top(&self) -> bool {
        self.current.items.is_empty()
    }

    fn new_page(&mut self) {
        let page = std::mem::take(&mut self.current);
        self.pages.push(page);
        self.y = self.config.page_height - self.config.margin_top;
    }

    /// Place one line of text occupying `lines` line heights.
    fn place(&mut self, text: &str, x_offset: f32, style: TextStyle, lines: usize) {
        let height = self.config.line_height * lines as f32;
        if !self.fits(height) && !self.at_top() {
            self.new_page();
        }
        let baseline = self.y - self.config.line_height * BASELINE_RATIO;
        self.current.items.push(PlacedItem::Text {
            x: self.config.margin_left + x_offset,
            y: baseline,
            text: text.to_string(),
            style,
        });
        self.y -= height;
    }

    fn skip_line(&mut self) {
        if self.at_top() {
            return;
        }
        if self.fits(self.config.line_height) {
            self.y -= self.config.line_height;
        } else {
            self.new_page();
        }
    }

    fn rule(&mut self) {
        let gap = self.config.separator_gap;
        if !self.fits(gap) {
            // A rule at a page break separates nothing.
            self.new_page();
            return;
        }
        let y = self.y - gap / 2.0;
        self.current.items.push(PlacedItem::Rule {
            x1: self.config.margin_left,
            x2: self.config.page_width - self.config.margin_right,
            y,
        });
        self.y -= gap;
    }

    fn finish(mut self) -> Vec<RenderedPage> {
        if !self.current.items.is_empty() || self.pages.is_empty() {
            self.pages.push(self.current);
        }
        self.pages
    }
}

/// Greedy word wrap at `width` characters.
///
/// Continuation lines get `indent` fewer characters. Only words longer than
/// the available width are split.
pub fn wrap(text: &str, width: usize, indent: usize) -> Vec<String> {
    let width = width.max(1);
    let cont_width = width.saturating_sub(indent).max(1);
    let mut out: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    let limit = |out: &Vec<String>| if out.is_empty() { width } else { cont_width };

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if current_len > 0 && current_len + 1 + word_len <= limit(&out) {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
            continue;
        }
        if current_len > 0 {
            out.push(std::mem::take(&mut current));
            current_len = 0;
        }
        let mut rest: Vec<char> = word.chars().collect();
        while rest.len() > limit(&out) {
            let tail = rest.split_off(limit(&out));
            out.push(rest.into_iter().collect());
            rest = tail;
        }
        current = rest.into_iter().collect();
        current_len = current.chars().count();
    }

    if current_len > 0 || out.is_empty() {
        out.push(current);
    }
    out
}
