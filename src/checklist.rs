//! Versioned checklist data: the control points a data sheet is audited against.
//!
//! The checklist is data, not code. The built-in version ships as JSON inside
//! the binary; callers can load another revision from a file without touching
//! the pipeline. Synonyms widen both the analysis prompt ("look for these
//! words before answering *not found*") and heading matching in the
//! normalizer.

use crate::error::AuditError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

const BUILTIN_V1: &str = include_str!("../data/checklist_v1.json");

/// Severity class of a control point, also used for finding criticality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Major,
    Minor,
}

impl Severity {
    /// French label used in prompts and canonical report text.
    pub fn label(self) -> &'static str {
        match self {
            Severity::Critical => "Critique",
            Severity::Major => "Majeur",
            Severity::Minor => "Mineur",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One fixed compliance checklist item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlPoint {
    /// 1-based position in the checklist.
    pub index: usize,
    pub name: String,
    pub severity: Severity,
    #[serde(default)]
    pub synonyms: Vec<String>,
    /// Extra guidance for the model (expected format, regulation, …).
    #[serde(default)]
    pub hint: Option<String>,
}

impl ControlPoint {
    /// True when `title` names this point, by canonical name or synonym.
    ///
    /// Matching is case- and accent-insensitive and works on whole words: a
    /// title containing the name matches (`"Estampille sanitaire"` matches
    /// `Estampille`), and so does a title that is a word run of the name
    /// (`"Produit"` matches `Intitulé du produit`).
    pub fn matches_title(&self, title: &str) -> bool {
        self.title_score(&fold(title)).is_some()
    }

    /// Length of the longest name or synonym matching an already folded title.
    fn title_score(&self, title: &str) -> Option<usize> {
        if title.is_empty() {
            return None;
        }
        std::iter::once(&self.name)
            .chain(self.synonyms.iter())
            .map(|n| fold(n))
            .filter(|n| !n.is_empty())
            .filter_map(|n| {
                if contains_words(title, &n) {
                    Some(n.len())
                } else if title.len() >= 4 && contains_words(&n, title) {
                    Some(title.len())
                } else {
                    None
                }
            })
            .max()
    }
}

/// An ordered, versioned list of control points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checklist {
    pub version: String,
    pub points: Vec<ControlPoint>,
}

impl Checklist {
    /// The built-in 20-point checklist.
    pub fn builtin() -> Self {
        // The embedded JSON is validated by the `builtin_is_valid` test.
        Self::from_json(BUILTIN_V1).unwrap_or_else(|e| panic!("built-in checklist: {e}"))
    }

    /// Parse and validate a checklist from JSON.
    pub fn from_json(json: &str) -> Result<Self, AuditError> {
        let checklist: Checklist = serde_json::from_str(json)
            .map_err(|e| AuditError::InvalidChecklist(format!("JSON: {e}")))?;
        checklist.validate()?;
        Ok(checklist)
    }

    /// Load a checklist revision from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, AuditError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            AuditError::InvalidChecklist(format!("cannot read '{}': {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Point by 1-based index.
    pub fn get(&self, index: usize) -> Option<&ControlPoint> {
        index.checked_sub(1).and_then(|i| self.points.get(i))
    }

    /// Best point after `after` (1-based) whose name or synonyms match `title`.
    ///
    /// The longest matching name wins, so `"Composition du produit"` resolves
    /// to the composition point rather than to the `Produit` synonym of point 1.
    pub fn find_by_title(&self, title: &str, after: usize) -> Option<&ControlPoint> {
        let title = fold(title);
        let mut best: Option<(&ControlPoint, usize)> = None;
        for point in self.points.iter().skip(after) {
            if let Some(score) = point.title_score(&title) {
                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((point, score));
                }
            }
        }
        best.map(|(p, _)| p)
    }

    fn validate(&self) -> Result<(), AuditError> {
        if self.points.is_empty() {
            return Err(AuditError::InvalidChecklist("no control points".into()));
        }
        let mut names = HashSet::new();
        for (i, point) in self.points.iter().enumerate() {
            if point.index != i + 1 {
                return Err(AuditError::InvalidChecklist(format!(
                    "point '{}' has index {}, expected {}",
                    point.name,
                    point.index,
                    i + 1
                )));
            }
            if point.name.trim().is_empty() {
                return Err(AuditError::InvalidChecklist(format!(
                    "point {} has an empty name",
                    point.index
                )));
            }
            if !names.insert(fold(&point.name)) {
                return Err(AuditError::InvalidChecklist(format!(
                    "duplicate point name '{}'",
                    point.name
                )));
            }
        }
        Ok(())
    }
}

impl Default for Checklist {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Lowercase, strip common French diacritics and markdown emphasis, squeeze spaces.
pub(crate) fn fold(s: &str) -> String {
    let mapped: String = s
        .chars()
        .filter(|c| !matches!(c, '*' | '_' | '`' | '#'))
        .map(|c| match c {
            'à' | 'â' | 'ä' | 'À' | 'Â' | 'Ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' | 'É' | 'È' | 'Ê' | 'Ë' => 'e',
            'î' | 'ï' | 'Î' | 'Ï' => 'i',
            'ô' | 'ö' | 'Ô' | 'Ö' => 'o',
            'ù' | 'û' | 'ü' | 'Ù' | 'Û' | 'Ü' => 'u',
            'ç' | 'Ç' => 'c',
            '’' => '\'',
            c => c.to_ascii_lowercase(),
        })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `needle` occurs in `hay` with no alphanumeric character on either side.
fn contains_words(hay: &str, needle: &str) -> bool {
    hay.match_indices(needle).any(|(start, m)| {
        let before = hay[..start].chars().next_back();
        let after = hay[start + m.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}
