//! Line classification shared by the normalizer and the layout engine.
//!
//! Model output is free-form Markdown-ish French. Every line is classified
//! once, in isolation; deciding whether a numbered line really opens a point
//! block needs context and is left to the normalizer.

use crate::checklist::fold;
use once_cell::sync::Lazy;
use regex::Regex;

/// Known `key : value` fields of point blocks and the summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKey {
    Status,
    Evidence,
    Criticality,
    Recommendation,
    CriticalList,
    MajorList,
    MinorList,
    Decision,
    Inconsistencies,
}

impl FieldKey {
    /// Fields that only make sense in the summary.
    pub fn is_summary_field(self) -> bool {
        matches!(
            self,
            FieldKey::CriticalList
                | FieldKey::MajorList
                | FieldKey::MinorList
                | FieldKey::Decision
                | FieldKey::Inconsistencies
        )
    }
}

/// Classification of one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind<'a> {
    Blank,
    /// `---`, `***`, `___`, `===` or a box-drawing rule.
    Separator,
    /// `1. Title`, `1) Title`, `Point 1 : Title`, `### 1 - Title`, optionally bold.
    Numbered { number: usize, title: String },
    /// A bold line or Markdown heading without a number.
    Heading { title: String },
    /// `Résumé`, `Synthèse`, `Summary`, … on a line of its own.
    SummaryHeading,
    /// A recognised field. `raw_key` keeps the key as written, e.g. `Points critiques (2)`.
    Field {
        key: FieldKey,
        raw_key: &'a str,
        value: &'a str,
    },
    Body(&'a str),
}

static RE_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:-{3,}|\*{3,}|_{3,}|={3,}|[─━]{3,})\s*$").unwrap());

static RE_POINT_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:#{1,6}\s*)?(?:\*\*\s*)?point\s*(?:n[°o]\.?\s*)?(\d{1,3})\s*[.):\-–—]*\s*(.*)$")
        .unwrap()
});

static RE_NUMBERED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:#{1,6}\s*)?(?:\*\*\s*)?(\d{1,3})\s*[.):\-–—]+\s*(.*)$").unwrap()
});

static RE_SUMMARY_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:#{1,6}\s*)?(?:\*\*\s*)?(?:r[ée]sum[ée]|synth[èe]se|summary|bilan|conclusion)\b[^:*]{0,40}(?:\*\*)?\s*:?\s*(?:\*\*)?\s*$",
    )
    .unwrap()
});

static RE_BOLD_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:#{1,6}\s*)?\*\*([^*]+)\*\*\s*:?\s*$").unwrap());

static RE_MD_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*#{1,6}\s+(.+?)\s*$").unwrap());

static RE_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:[-*•]\s+)?(?:\*\*)?\s*([^:*]{2,60}?)\s*(?:\*\*)?\s*:\s*(?:\*\*)?\s*(.*?)\s*$").unwrap()
});

/// Classify a single line.
pub fn classify(line: &str) -> LineKind<'_> {
    if line.trim().is_empty() {
        return LineKind::Blank;
    }
    if RE_SEPARATOR.is_match(line) {
        return LineKind::Separator;
    }
    if RE_SUMMARY_HEADING.is_match(line) {
        return LineKind::SummaryHeading;
    }
    if let Some(caps) = RE_POINT_PREFIX
        .captures(line)
        .or_else(|| RE_NUMBERED.captures(line))
    {
        let title = clean_title(caps.get(2).map_or("", |m| m.as_str()));
        // "1.5 g" is a quantity, not a heading.
        if !title.starts_with(|c: char| c.is_ascii_digit()) {
            if let Ok(number) = caps[1].parse::<usize>() {
                return LineKind::Numbered { number, title };
            }
        }
    }
    if let Some(caps) = RE_FIELD.captures(line) {
        let raw_key = caps.get(1).map_or("", |m| m.as_str());
        if let Some(key) = field_key(raw_key) {
            let value = caps.get(2).map_or("", |m| m.as_str());
            return LineKind::Field {
                key,
                raw_key,
                value: value.trim_end_matches("**").trim(),
            };
        }
    }
    if let Some(caps) = RE_BOLD_LINE.captures(line).or_else(|| RE_MD_HEADING.captures(line)) {
        return LineKind::Heading {
            title: clean_title(&caps[1]),
        };
    }
    LineKind::Body(line.trim_end())
}

/// Strip emphasis markers, trailing colons and surrounding whitespace.
pub fn clean_title(title: &str) -> String {
    title
        .replace("**", "")
        .trim_matches(|c: char| c.is_whitespace() || c == ':' || c == '*' || c == '#')
        .to_string()
}

fn field_key(raw: &str) -> Option<FieldKey> {
    let key = fold(raw);
    let key = key.trim();
    let starts = |prefixes: &[&str]| prefixes.iter().any(|p| key.starts_with(p));

    if starts(&["points critiques", "point critique", "critiques", "critical"]) {
        Some(FieldKey::CriticalList)
    } else if starts(&["points majeurs", "point majeur", "majeurs", "major"]) {
        Some(FieldKey::MajorList)
    } else if starts(&["points mineurs", "point mineur", "mineurs", "minor"]) {
        Some(FieldKey::MinorList)
    } else if starts(&["statut", "status", "etat"]) {
        Some(FieldKey::Status)
    } else if starts(&["preuve", "extrait", "evidence", "citation", "element trouve"]) {
        Some(FieldKey::Evidence)
    } else if starts(&["criticite", "niveau de criticite", "criticality", "gravite"]) {
        Some(FieldKey::Criticality)
    } else if starts(&["recommandation", "recommendation", "action recommandee"]) {
        Some(FieldKey::Recommendation)
    } else if starts(&["decision", "avis final"]) {
        Some(FieldKey::Decision)
    } else if starts(&["incoherence", "inconsistenc", "anomalies"]) {
        Some(FieldKey::Inconsistencies)
    } else {
        None
    }
}

static RE_STATED_COUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\((\d+)\)").unwrap());

/// The `(N)` count written inside a summary key, if any.
pub fn stated_count(raw_key: &str) -> Option<usize> {
    RE_STATED_COUNT
        .captures(raw_key)
        .and_then(|c| c[1].parse().ok())
}

/// True for a bullet line (`- x`, `* x`, `• x`).
pub fn is_bullet(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("- ") || t.starts_with("* ") || t.starts_with("• ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(line: &str) -> Option<(usize, String)> {
        match classify(line) {
            LineKind::Numbered { number, title } => Some((number, title)),
            _ => None,
        }
    }

    #[test]
    fn numbered_heading_variants() {
        assert_eq!(numbered("1. Produit"), Some((1, "Produit".into())));
        assert_eq!(numbered("2) Coordonnées du fournisseur"), Some((2, "Coordonnées du fournisseur".into())));
        assert_eq!(numbered("Point 3 : Estampille"), Some((3, "Estampille".into())));
        assert_eq!(numbered("### 4 - Certification"), Some((4, "Certification".into())));
        assert_eq!(numbered("**5. Mode de réception**"), Some((5, "Mode de réception".into())));
        assert_eq!(numbered("**12. Contaminants** :"), Some((12, "Contaminants".into())));
        assert_eq!(numbered("Point n°7"), Some((7, String::new())));
    }

    #[test]
    fn quantities_are_not_headings() {
        assert_eq!(numbered("1.5 g de sel"), None);
        assert!(matches!(classify("4 °C maximum"), LineKind::Body(_)));
    }

    #[test]
    fn fields() {
        match classify("- **Statut** : Non trouvé") {
            LineKind::Field { key, value, .. } => {
                assert_eq!(key, FieldKey::Status);
                assert_eq!(value, "Non trouvé");
            }
            other => panic!("unexpected {other:?}"),
        }
        match classify("- Points critiques (2): [Estampille, VSM]") {
            LineKind::Field { key, raw_key, value } => {
                assert_eq!(key, FieldKey::CriticalList);
                assert_eq!(stated_count(raw_key), Some(2));
                assert_eq!(value, "[Estampille, VSM]");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            classify("Criticité: Majeur - absence de liste"),
            LineKind::Field { key: FieldKey::Criticality, .. }
        ));
        assert!(matches!(classify("Température : +4 °C"), LineKind::Body(_)));
    }

    #[test]
    fn summary_headings() {
        assert_eq!(classify("Résumé:"), LineKind::SummaryHeading);
        assert_eq!(classify("## Synthèse globale"), LineKind::SummaryHeading);
        assert_eq!(classify("**Résumé :**"), LineKind::SummaryHeading);
        assert!(!matches!(
            classify("Conclusion : produit conforme"),
            LineKind::SummaryHeading
        ));
    }

    #[test]
    fn separators_and_headings() {
        assert_eq!(classify("---"), LineKind::Separator);
        assert_eq!(classify("  ***  "), LineKind::Separator);
        assert_eq!(classify(""), LineKind::Blank);
        assert_eq!(
            classify("**Estampille**"),
            LineKind::Heading {
                title: "Estampille".into()
            }
        );
        assert_eq!(
            classify("## Origine"),
            LineKind::Heading {
                title: "Origine".into()
            }
        );
    }
}
