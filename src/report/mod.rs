//! Structured audit report: model output in, paginated PDF out.
//!
//! ## Data Flow
//!
//! ```text
//! raw model text ──▶ cleanup ──▶ normalize ──▶ Report ──▶ layout ──▶ pdf
//!                                   │                        ▲
//!                          (lines: classifier) ──────────────┘
//! ```
//!
//! 1. [`cleanup`]: fences, line endings, invisible characters
//! 2. [`lines`]: one classification per line, shared by 3 and 4
//! 3. [`normalize`]: line state machine building [`Report`]
//! 4. [`layout`]: wrap and paginate canonical text onto A4 pages
//! 5. [`pdf`]: serialize laid-out pages with `lopdf`

pub mod cleanup;
pub mod layout;
pub mod lines;
pub mod normalize;
pub mod pdf;

pub use crate::checklist::Severity;
pub use normalize::normalize;
pub use pdf::{render_report, render_text, RenderFault, RenderedReport};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether the model found a control point in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FindingStatus {
    Present,
    Partial,
    Doubtful,
    NotFound,
}

impl FindingStatus {
    pub fn label(self) -> &'static str {
        match self {
            FindingStatus::Present => "Présent",
            FindingStatus::Partial => "Partiel",
            FindingStatus::Doubtful => "Douteux",
            FindingStatus::NotFound => "Non trouvé",
        }
    }
}

/// Per-point recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Recommendation {
    Validate,
    RequestSupplement,
    Blocking,
}

impl Recommendation {
    pub fn label(self) -> &'static str {
        match self {
            Recommendation::Validate => "Valider",
            Recommendation::RequestSupplement => "Demander complément",
            Recommendation::Blocking => "Bloquant",
        }
    }
}

/// Overall decision carried by the summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Decision {
    Validate,
    RequestSupplement,
    Reject,
}

impl Decision {
    pub fn label(self) -> &'static str {
        match self {
            Decision::Validate => "Valider",
            Decision::RequestSupplement => "Demander complément",
            Decision::Reject => "Refuser",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Quoted evidence, or an explicit statement that none was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind", content = "text")]
pub enum Evidence {
    Quote(String),
    NotFound,
}

/// Severity assigned to a gap, with the model's explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criticality {
    /// `None` when the model wrote an explanation without a recognisable level.
    pub level: Option<Severity>,
    pub explanation: String,
}

/// One control point as reported by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub point: usize,
    /// Canonical checklist name.
    pub name: String,
    /// Heading line as the model wrote it.
    pub heading: String,
    pub status: Option<FindingStatus>,
    pub evidence: Option<Evidence>,
    pub criticality: Option<Criticality>,
    pub recommendation: Option<Recommendation>,
    /// Remaining lines of the block, cleaned.
    pub body: Vec<String>,
}

impl Finding {
    pub(crate) fn new(point: usize, name: &str, heading: &str) -> Self {
        Self {
            point,
            name: name.to_string(),
            heading: heading.trim().to_string(),
            status: None,
            evidence: None,
            criticality: None,
            recommendation: None,
            body: Vec::new(),
        }
    }

    /// Criticality level, if any.
    pub fn level(&self) -> Option<Severity> {
        self.criticality.as_ref().and_then(|c| c.level)
    }
}

/// The single trailing summary.
///
/// Counts are the lengths of the name lists; after normalization they equal
/// the tally of findings by criticality level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub critical: Vec<String>,
    pub major: Vec<String>,
    pub minor: Vec<String>,
    pub decision: Decision,
    pub inconsistencies: Vec<String>,
}

impl Summary {
    pub fn critical_count(&self) -> usize {
        self.critical.len()
    }

    pub fn major_count(&self) -> usize {
        self.major.len()
    }

    pub fn minor_count(&self) -> usize {
        self.minor.len()
    }
}

impl Default for Summary {
    fn default() -> Self {
        Self {
            critical: Vec::new(),
            major: Vec::new(),
            minor: Vec::new(),
            decision: Decision::Validate,
            inconsistencies: Vec::new(),
        }
    }
}

/// Something the normalizer changed or could not reconcile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum NormalizeNote {
    LeadingArtifactsStripped { lines: usize },
    IntermediateSummaryRemoved { before_point: usize },
    DuplicatePointIgnored { point: usize },
    CriticalityDroppedForPresent { point: usize },
    SummaryCountMismatch {
        level: Severity,
        stated: usize,
        tallied: usize,
    },
    UnknownSummaryEntry { entry: String },
    MissingSummary,
    DecisionDerived { decision: Decision },
}

impl fmt::Display for NormalizeNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizeNote::LeadingArtifactsStripped { lines } => {
                write!(f, "{lines} line(s) before the first point removed")
            }
            NormalizeNote::IntermediateSummaryRemoved { before_point } => {
                write!(f, "intermediate summary before point {before_point} removed")
            }
            NormalizeNote::DuplicatePointIgnored { point } => {
                write!(f, "repeated heading for point {point} kept as body text")
            }
            NormalizeNote::CriticalityDroppedForPresent { point } => {
                write!(f, "criticality dropped for present point {point}")
            }
            NormalizeNote::SummaryCountMismatch {
                level,
                stated,
                tallied,
            } => write!(
                f,
                "summary stated {stated} {} point(s), findings tally {tallied}",
                level.label().to_lowercase()
            ),
            NormalizeNote::UnknownSummaryEntry { entry } => {
                write!(f, "summary entry '{entry}' matches no control point")
            }
            NormalizeNote::MissingSummary => f.write_str("no summary found, rebuilt from findings"),
            NormalizeNote::DecisionDerived { decision } => {
                write!(f, "decision missing, derived as '{decision}'")
            }
        }
    }
}

/// A normalized audit report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub checklist_version: String,
    /// Findings in checklist order.
    pub findings: Vec<Finding>,
    pub summary: Summary,
    pub notes: Vec<NormalizeNote>,
}

impl Report {
    pub fn finding(&self, point: usize) -> Option<&Finding> {
        self.findings.iter().find(|f| f.point == point)
    }

    /// Re-emit the report in the canonical block-per-point layout.
    ///
    /// Blocks are separated by `---`, with one more separator before and
    /// after the summary. This is the text the renderer lays out.
    pub fn to_canonical_text(&self) -> String {
        let mut blocks: Vec<String> = self.findings.iter().map(finding_block).collect();
        blocks.push(summary_block(&self.summary));
        let mut out = blocks.join("\n---\n");
        out.push_str("\n---\n");
        out
    }
}

fn finding_block(finding: &Finding) -> String {
    let mut lines = vec![format!("{}. {}", finding.point, finding.name)];
    if let Some(status) = finding.status {
        lines.push(format!("Statut : {}", status.label()));
    }
    match &finding.evidence {
        Some(Evidence::Quote(q)) => lines.push(format!("Preuve : \"{q}\"")),
        Some(Evidence::NotFound) => lines.push("Preuve : Non trouvé".to_string()),
        None => {}
    }
    if let Some(c) = &finding.criticality {
        let line = match (c.level, c.explanation.is_empty()) {
            (Some(level), true) => format!("Criticité : {}", level.label()),
            (Some(level), false) => format!("Criticité : {} - {}", level.label(), c.explanation),
            (None, _) => format!("Criticité : {}", c.explanation),
        };
        lines.push(line);
    }
    if let Some(r) = finding.recommendation {
        lines.push(format!("Recommandation : {}", r.label()));
    }
    lines.extend(finding.body.iter().cloned());
    lines.join("\n")
}

fn summary_block(summary: &Summary) -> String {
    let list = |names: &[String]| format!("[{}]", names.join(", "));
    let inconsistencies = if summary.inconsistencies.is_empty() {
        "aucune".to_string()
    } else {
        summary.inconsistencies.join(" ; ")
    };
    [
        "Résumé".to_string(),
        format!("- Points critiques ({}) : {}", summary.critical_count(), list(&summary.critical)),
        format!("- Points majeurs ({}) : {}", summary.major_count(), list(&summary.major)),
        format!("- Points mineurs ({}) : {}", summary.minor_count(), list(&summary.minor)),
        format!("- Décision : {}", summary.decision.label()),
        format!("- Incohérences : {inconsistencies}"),
    ]
    .join("\n")
}

/// Model output that could not be aligned to every control point.
///
/// Recoverable: `partial` holds everything that was found, in order.
#[derive(Debug, Clone, thiserror::Error)]
#[error("malformed report: missing control point(s) {}", format_indices(.missing))]
pub struct MalformedReport {
    pub partial: Report,
    pub missing: Vec<usize>,
}

fn format_indices(indices: &[usize]) -> String {
    indices
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
