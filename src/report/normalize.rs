//! Raw model output → structured [`Report`].
//!
//! A single pass over classified lines drives a three-state machine:
//!
//! ```text
//!            point heading              summary heading / summary field
//!   Idle ─────────────────▶ InPoint ───────────────────────────────▶ InSummary
//!                            ▲   │                                       │
//!                            └───┘ next point heading                   │
//!                            ▲                                           │
//!                            └─────────── next point heading ────────────┘
//!                                         (summary dropped as intermediate)
//! ```
//!
//! A numbered heading opens point *n* only when *n* is the next point after
//! the last one opened, or when its title names point *n*. Numbered lists
//! inside a block therefore stay body text. After the pass the summary is
//! reconciled with the findings: counts always come from the findings tally.

use super::cleanup::clean_model_output;
use super::lines::{self, FieldKey, LineKind};
use super::{
    Criticality, Decision, Evidence, Finding, FindingStatus, MalformedReport, NormalizeNote,
    Recommendation, Report, Severity, Summary,
};
use crate::checklist::{fold, Checklist};
use tracing::{debug, warn};

/// Normalize raw model output against `checklist`.
///
/// Returns [`MalformedReport`] when any control point has no block; the
/// error still carries every finding that was parsed.
pub fn normalize(raw: &str, checklist: &Checklist) -> Result<Report, MalformedReport> {
    let cleaned = clean_model_output(raw);
    let mut machine = Normalizer::new(checklist);
    for line in cleaned.lines() {
        machine.feed(line);
    }
    machine.finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    InPoint(usize),
    InSummary,
}

#[derive(Debug, Default)]
struct ListDraft {
    stated: Option<usize>,
    names: Vec<String>,
}

#[derive(Debug, Default)]
struct SummaryDraft {
    critical: Option<ListDraft>,
    major: Option<ListDraft>,
    minor: Option<ListDraft>,
    decision: Option<Decision>,
    inconsistencies: Vec<String>,
    last_field: Option<FieldKey>,
}

impl SummaryDraft {
    fn list_mut(&mut self, key: FieldKey) -> Option<&mut Option<ListDraft>> {
        match key {
            FieldKey::CriticalList => Some(&mut self.critical),
            FieldKey::MajorList => Some(&mut self.major),
            FieldKey::MinorList => Some(&mut self.minor),
            _ => None,
        }
    }

    fn list(&self, level: Severity) -> Option<&ListDraft> {
        match level {
            Severity::Critical => self.critical.as_ref(),
            Severity::Major => self.major.as_ref(),
            Severity::Minor => self.minor.as_ref(),
        }
    }
}

struct Normalizer<'c> {
    checklist: &'c Checklist,
    state: State,
    slots: Vec<Option<Finding>>,
    last_opened: usize,
    summary: Option<SummaryDraft>,
    leading: usize,
    notes: Vec<NormalizeNote>,
}

impl<'c> Normalizer<'c> {
    fn new(checklist: &'c Checklist) -> Self {
        Self {
            checklist,
            state: State::Idle,
            slots: vec![None; checklist.len()],
            last_opened: 0,
            summary: None,
            leading: 0,
            notes: Vec::new(),
        }
    }

    fn feed(&mut self, line: &str) {
        match lines::classify(line) {
            LineKind::Blank | LineKind::Separator => {}
            LineKind::Numbered { number, title } => {
                if self.accepts_numbered(number, &title) {
                    self.open(number, line);
                } else {
                    self.body(line);
                }
            }
            LineKind::Heading { title } => {
                match self.checklist.find_by_title(&title, self.last_opened) {
                    Some(point) => self.open(point.index, line),
                    None => self.body(line),
                }
            }
            LineKind::SummaryHeading => self.enter_summary(),
            LineKind::Field {
                key,
                raw_key,
                value,
            } => self.field(key, raw_key, value, line),
            LineKind::Body(text) => self.body(text),
        }
    }

    fn accepts_numbered(&mut self, number: usize, title: &str) -> bool {
        let Some(point) = self.checklist.get(number) else {
            return false;
        };
        if number <= self.last_opened {
            if number == self.last_opened && point.matches_title(title) {
                self.notes
                    .push(NormalizeNote::DuplicatePointIgnored { point: number });
            }
            return false;
        }
        number == self.last_opened + 1 || point.matches_title(title)
    }

    fn open(&mut self, index: usize, heading: &str) {
        if self.summary.take().is_some() {
            debug!("Dropping intermediate summary before point {}", index);
            self.notes
                .push(NormalizeNote::IntermediateSummaryRemoved { before_point: index });
        }
        if self.last_opened == 0 && self.leading > 0 {
            self.notes.push(NormalizeNote::LeadingArtifactsStripped {
                lines: self.leading,
            });
            self.leading = 0;
        }
        let Some(point) = self.checklist.get(index) else {
            return;
        };
        self.slots[index - 1] = Some(Finding::new(index, &point.name, heading));
        self.last_opened = index;
        self.state = State::InPoint(index);
    }

    fn enter_summary(&mut self) {
        if self.state != State::InSummary {
            self.summary = Some(SummaryDraft::default());
            self.state = State::InSummary;
        }
    }

    fn current(&mut self) -> Option<&mut Finding> {
        match self.state {
            State::InPoint(index) => self.slots.get_mut(index - 1).and_then(Option::as_mut),
            _ => None,
        }
    }

    fn field(&mut self, key: FieldKey, raw_key: &str, value: &str, line: &str) {
        if key.is_summary_field() {
            self.enter_summary();
            if let Some(draft) = self.summary.as_mut() {
                summary_field(draft, key, raw_key, value);
            }
            return;
        }
        match self.state {
            State::InPoint(_) => {
                let value = value.replace("**", "");
                let value = value.trim();
                let Some(finding) = self.current() else {
                    return;
                };
                let filled = match key {
                    FieldKey::Status if finding.status.is_none() => {
                        finding.status = parse_status(value);
                        finding.status.is_some()
                    }
                    FieldKey::Evidence if finding.evidence.is_none() => {
                        finding.evidence = parse_evidence(value);
                        finding.evidence.is_some()
                    }
                    FieldKey::Criticality if finding.criticality.is_none() => {
                        finding.criticality = parse_criticality(value);
                        true
                    }
                    FieldKey::Recommendation if finding.recommendation.is_none() => {
                        finding.recommendation = parse_recommendation(value);
                        finding.recommendation.is_some()
                    }
                    _ => false,
                };
                if !filled {
                    finding.body.push(clean_body(line));
                }
            }
            State::InSummary => {}
            State::Idle => self.leading += 1,
        }
    }

    fn body(&mut self, text: &str) {
        match self.state {
            State::Idle => self.leading += 1,
            State::InPoint(_) => {
                let line = clean_body(text);
                if let Some(finding) = self.current() {
                    if !line.is_empty() {
                        finding.body.push(line);
                    }
                }
            }
            State::InSummary => {
                let Some(draft) = self.summary.as_mut() else {
                    return;
                };
                if !lines::is_bullet(text) {
                    return;
                }
                let item = strip_bullet(text);
                match draft.last_field {
                    Some(FieldKey::Inconsistencies) => draft.inconsistencies.push(item),
                    Some(key) => {
                        if let Some(Some(list)) = draft.list_mut(key) {
                            list.names.push(item);
                        }
                    }
                    None => {}
                }
            }
        }
    }

    fn finish(mut self) -> Result<Report, MalformedReport> {
        if self.last_opened == 0 && self.leading > 0 {
            self.notes.push(NormalizeNote::LeadingArtifactsStripped {
                lines: self.leading,
            });
        }

        for finding in self.slots.iter_mut().flatten() {
            if finding.status == Some(FindingStatus::Present) && finding.criticality.take().is_some()
            {
                self.notes.push(NormalizeNote::CriticalityDroppedForPresent {
                    point: finding.point,
                });
            }
        }

        let draft = self.summary.take();
        if draft.is_none() {
            self.notes.push(NormalizeNote::MissingSummary);
        }
        if let Some(ref draft) = draft {
            self.adopt_summary_levels(draft);
        }
        let summary = self.reconcile_summary(draft.as_ref());

        let missing: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_none())
            .map(|(i, _)| i + 1)
            .collect();

        let report = Report {
            checklist_version: self.checklist.version.clone(),
            findings: self.slots.into_iter().flatten().collect(),
            summary,
            notes: self.notes,
        };
        debug!(
            "Normalized {} finding(s), {} note(s)",
            report.findings.len(),
            report.notes.len()
        );

        if missing.is_empty() {
            Ok(report)
        } else {
            warn!("Report is missing control point(s) {:?}", missing);
            Err(MalformedReport {
                partial: report,
                missing,
            })
        }
    }

    /// Give findings without a level the level the summary lists them under.
    fn adopt_summary_levels(&mut self, draft: &SummaryDraft) {
        for level in [Severity::Critical, Severity::Major, Severity::Minor] {
            let Some(list) = draft.list(level) else {
                continue;
            };
            for entry in &list.names {
                let Some(index) = resolve_entry(self.checklist, entry) else {
                    self.notes.push(NormalizeNote::UnknownSummaryEntry {
                        entry: entry.clone(),
                    });
                    continue;
                };
                let Some(finding) = self.slots.get_mut(index - 1).and_then(Option::as_mut) else {
                    continue;
                };
                if finding.status == Some(FindingStatus::Present) || finding.level().is_some() {
                    continue;
                }
                match finding.criticality.as_mut() {
                    Some(c) => c.level = Some(level),
                    None => {
                        finding.criticality = Some(Criticality {
                            level: Some(level),
                            explanation: String::new(),
                        })
                    }
                }
            }
        }
    }

    fn reconcile_summary(&mut self, draft: Option<&SummaryDraft>) -> Summary {
        let tally = |level: Severity| -> Vec<String> {
            self.slots
                .iter()
                .flatten()
                .filter(|f| f.level() == Some(level))
                .map(|f| f.name.clone())
                .collect()
        };
        let critical = tally(Severity::Critical);
        let major = tally(Severity::Major);
        let minor = tally(Severity::Minor);

        if let Some(draft) = draft {
            for (level, tallied) in [
                (Severity::Critical, critical.len()),
                (Severity::Major, major.len()),
                (Severity::Minor, minor.len()),
            ] {
                let Some(list) = draft.list(level) else {
                    continue;
                };
                let stated = list.stated.unwrap_or(list.names.len());
                if stated != tallied {
                    self.notes.push(NormalizeNote::SummaryCountMismatch {
                        level,
                        stated,
                        tallied,
                    });
                }
            }
        }

        let decision = match draft.and_then(|d| d.decision) {
            Some(decision) => decision,
            None => {
                let decision = if !critical.is_empty() {
                    Decision::Reject
                } else if !major.is_empty() {
                    Decision::RequestSupplement
                } else {
                    Decision::Validate
                };
                self.notes.push(NormalizeNote::DecisionDerived { decision });
                decision
            }
        };

        Summary {
            critical,
            major,
            minor,
            decision,
            inconsistencies: draft.map(|d| d.inconsistencies.clone()).unwrap_or_default(),
        }
    }
}

fn summary_field(draft: &mut SummaryDraft, key: FieldKey, raw_key: &str, value: &str) {
    draft.last_field = Some(key);
    match key {
        FieldKey::Decision => {
            if draft.decision.is_none() {
                draft.decision = parse_decision(value);
            }
        }
        FieldKey::Inconsistencies => draft.inconsistencies.extend(parse_inconsistencies(value)),
        _ => {
            if let Some(slot) = draft.list_mut(key) {
                *slot = Some(ListDraft {
                    stated: lines::stated_count(raw_key),
                    names: parse_list(value),
                });
            }
        }
    }
}

// ── Field vocabulary ─────────────────────────────────────────────────────────

const NONE_WORDS: &[&str] = &[
    "-", "aucun", "aucune", "neant", "none", "n/a", "na", "sans objet", "[]", "rien",
];

fn is_none_word(folded: &str) -> bool {
    let t = folded.trim_matches(|c: char| c == '.' || c.is_whitespace());
    NONE_WORDS.contains(&t)
}

fn contains_any(hay: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| hay.contains(n))
}

/// Negated verdicts; checked before "conforme" and "valider" match.
const NEGATED_VERDICTS: &[&str] = &["non conforme", "non-conforme", "ne pas valider", "pas conforme"];

fn parse_status(value: &str) -> Option<FindingStatus> {
    let f = fold(value);
    // Negations first: "non trouvé" contains "trouvé".
    if f == "non"
        || contains_any(
            &f,
            &[
                "non trouve",
                "non present",
                "non mentionne",
                "non renseigne",
                "non indique",
                "introuvable",
                "absent",
                "manquant",
                "not found",
                "missing",
            ],
        )
    {
        Some(FindingStatus::NotFound)
    } else if contains_any(&f, NEGATED_VERDICTS) {
        Some(FindingStatus::Doubtful)
    } else if contains_any(&f, &["partiel", "partial", "incomplet"]) {
        Some(FindingStatus::Partial)
    } else if contains_any(&f, &["douteux", "doubtful", "a verifier", "incertain", "ambigu"]) {
        Some(FindingStatus::Doubtful)
    } else if f == "oui" || contains_any(&f, &["present", "trouve", "found", "conforme"]) {
        Some(FindingStatus::Present)
    } else {
        None
    }
}

fn parse_evidence(value: &str) -> Option<Evidence> {
    let f = fold(value);
    if f.is_empty() {
        return None;
    }
    if is_none_word(&f) || f.starts_with("non trouve") || f.starts_with("not found") || f == "absent"
    {
        return Some(Evidence::NotFound);
    }
    let quote = value
        .trim()
        .trim_matches(|c: char| matches!(c, '"' | '«' | '»' | '“' | '”' | '\'') || c.is_whitespace());
    if quote.is_empty() {
        None
    } else {
        Some(Evidence::Quote(quote.to_string()))
    }
}

fn parse_criticality(value: &str) -> Option<Criticality> {
    let f = fold(value);
    if f.is_empty() || is_none_word(&f) {
        return None;
    }
    let level = if f.starts_with("critique") || f.starts_with("critical") {
        Some(Severity::Critical)
    } else if f.starts_with("majeur") || f.starts_with("major") {
        Some(Severity::Major)
    } else if f.starts_with("mineur") || f.starts_with("minor") {
        Some(Severity::Minor)
    } else {
        None
    };
    let explanation = match level {
        Some(_) => value
            .split_once(|c: char| c.is_whitespace() || matches!(c, '-' | '–' | '—' | ':' | ','))
            .map_or("", |(_, rest)| rest)
            .trim_start_matches(|c: char| c.is_whitespace() || matches!(c, '-' | '–' | '—' | ':' | ','))
            .trim(),
        None => value.trim(),
    };
    Some(Criticality {
        level,
        explanation: explanation.to_string(),
    })
}

fn parse_recommendation(value: &str) -> Option<Recommendation> {
    let f = fold(value);
    if contains_any(&f, &["bloquant", "blocking", "refus", "rejet"]) || contains_any(&f, NEGATED_VERDICTS)
    {
        Some(Recommendation::Blocking)
    } else if contains_any(&f, &["complement", "demander", "request", "a completer"]) {
        Some(Recommendation::RequestSupplement)
    } else if contains_any(&f, &["valider", "valide", "validate"]) {
        Some(Recommendation::Validate)
    } else {
        None
    }
}

fn parse_decision(value: &str) -> Option<Decision> {
    let f = fold(value);
    if contains_any(&f, &["refus", "rejet", "reject", "bloquant"]) || contains_any(&f, NEGATED_VERDICTS) {
        Some(Decision::Reject)
    } else if contains_any(&f, &["complement", "demander", "request", "reserve"]) {
        Some(Decision::RequestSupplement)
    } else if contains_any(&f, &["valid", "accept", "conforme"]) {
        Some(Decision::Validate)
    } else {
        None
    }
}

fn parse_list(value: &str) -> Vec<String> {
    let inner = value
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(|c: char| c == ']' || c == '.' || c.is_whitespace());
    inner
        .split([',', ';'])
        .map(|s| {
            s.replace("**", "")
                .trim_matches(|c: char| matches!(c, '"' | '\'' | '[' | ']') || c.is_whitespace())
                .to_string()
        })
        .filter(|s| !s.is_empty() && !is_none_word(&fold(s)))
        .collect()
}

fn parse_inconsistencies(value: &str) -> Vec<String> {
    let f = fold(value);
    if f.is_empty() || is_none_word(&f) || f.starts_with("aucune ") {
        return Vec::new();
    }
    value
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Map a summary list entry to a point: `"3"`, `"3. Estampille"` or a name.
fn resolve_entry(checklist: &Checklist, entry: &str) -> Option<usize> {
    let digits: String = entry.chars().take_while(char::is_ascii_digit).collect();
    if let Ok(index) = digits.parse::<usize>() {
        if checklist.get(index).is_some() {
            return Some(index);
        }
    }
    checklist.find_by_title(entry, 0).map(|p| p.index)
}

fn strip_bullet(line: &str) -> String {
    line.trim_start()
        .trim_start_matches(['-', '*', '•'])
        .replace("**", "")
        .trim()
        .to_string()
}

fn clean_body(line: &str) -> String {
    line.replace("**", "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checklist() -> Checklist {
        Checklist::builtin()
    }

    /// Well-formed output with every point `Non trouvé` except the overrides.
    fn raw_report(overrides: &[(usize, &str)], summary: &str) -> String {
        let cl = checklist();
        let mut out = String::new();
        for point in &cl.points {
            match overrides.iter().find(|(i, _)| *i == point.index) {
                Some((_, block)) => out.push_str(block),
                None => out.push_str(&format!(
                    "{}. {}\nStatut : Non trouvé\nPreuve : Non trouvé\n",
                    point.index, point.name
                )),
            }
            out.push_str("---\n");
        }
        out.push_str(summary);
        out
    }

    #[test]
    fn all_not_found_scenario() {
        let cl = checklist();
        let mut raw = String::from("1. Produit\nStatut: Non trouvé\n");
        for point in cl.points.iter().skip(1) {
            raw.push_str(&format!("{}. {}\nStatut: Non trouvé\n", point.index, point.name));
        }
        raw.push_str("Résumé:\n- Points critiques (0): []");

        let report = normalize(&raw, &cl).expect("well-formed");
        assert_eq!(report.findings.len(), 20);
        assert!(report
            .findings
            .iter()
            .all(|f| f.status == Some(FindingStatus::NotFound)));
        assert_eq!(report.summary.critical_count(), 0);
        assert_eq!(report.summary.decision, Decision::Validate);
        assert!(report.notes.contains(&NormalizeNote::DecisionDerived {
            decision: Decision::Validate
        }));
    }

    #[test]
    fn twenty_markers_give_twenty_findings_in_order() {
        let raw: String = (1..=20)
            .map(|i| format!("{i}. Rubrique {i}\nStatut : Partiel\n"))
            .collect();
        let report = normalize(&raw, &checklist()).expect("well-formed");
        let order: Vec<usize> = report.findings.iter().map(|f| f.point).collect();
        assert_eq!(order, (1..=20).collect::<Vec<_>>());
        assert_eq!(report.findings[4].heading, "5. Rubrique 5");
        assert!(report.notes.contains(&NormalizeNote::MissingSummary));
    }

    #[test]
    fn missing_point_is_malformed_not_dropped() {
        let raw = raw_report(&[], "Résumé\n- Décision : Valider");
        let raw = raw.replace("7. Température\nStatut : Non trouvé\nPreuve : Non trouvé\n", "");
        let err = normalize(&raw, &checklist()).unwrap_err();
        assert_eq!(err.missing, vec![7]);
        assert_eq!(err.partial.findings.len(), 19);
        assert!(err.partial.finding(7).is_none());
        assert_eq!(err.partial.summary.decision, Decision::Validate);
    }

    #[test]
    fn leading_artifacts_and_fences_are_stripped() {
        let raw = format!(
            "```markdown\nVoici l'analyse demandée.\nBonne lecture !\n\n{}\n```",
            raw_report(&[], "Résumé\n- Décision : Valider")
        );
        let report = normalize(&raw, &checklist()).expect("well-formed");
        assert_eq!(report.findings[0].heading, "1. Intitulé du produit");
        assert!(report
            .notes
            .contains(&NormalizeNote::LeadingArtifactsStripped { lines: 2 }));
    }

    #[test]
    fn intermediate_summary_is_removed() {
        let block10 = "10. Espèce\nStatut : Présent\nPreuve : \"Salmo salar\"\n\
                       Résumé\n- Points critiques (1) : [Estampille]\n- Décision : Refuser\n";
        let raw = raw_report(
            &[(10, block10)],
            "Synthèse\n- Points critiques (0) : []\n- Décision : Demander complément",
        );
        let report = normalize(&raw, &checklist()).expect("well-formed");
        assert_eq!(report.findings.len(), 20);
        assert!(report
            .notes
            .contains(&NormalizeNote::IntermediateSummaryRemoved { before_point: 11 }));
        assert_eq!(report.summary.decision, Decision::RequestSupplement);
        assert!(report.summary.critical.is_empty());
        assert_eq!(report.finding(10).map(|f| f.status), Some(Some(FindingStatus::Present)));
    }

    #[test]
    fn present_points_lose_criticality() {
        let block = "1. Intitulé du produit\nStatut : Présent\nPreuve : \"Pavé de saumon\"\n\
                     Criticité : Critique - sans objet\nRecommandation : Valider\n";
        let report = normalize(&raw_report(&[(1, block)], "Résumé"), &checklist()).expect("ok");
        let finding = report.finding(1).expect("point 1");
        assert!(finding.criticality.is_none());
        assert_eq!(finding.evidence, Some(Evidence::Quote("Pavé de saumon".into())));
        assert_eq!(finding.recommendation, Some(Recommendation::Validate));
        assert!(report
            .notes
            .contains(&NormalizeNote::CriticalityDroppedForPresent { point: 1 }));
    }

    #[test]
    fn non_conforming_points_keep_criticality() {
        let block = "7. Température\nStatut : Non conforme\nPreuve : \"Conserver à 8 °C\"\n\
                     Criticité : Majeur - température trop haute\nRecommandation : Ne pas valider\n";
        let report = normalize(&raw_report(&[(7, block)], "Résumé"), &checklist()).expect("ok");
        let finding = report.finding(7).expect("point 7");
        assert_eq!(finding.status, Some(FindingStatus::Doubtful));
        assert_eq!(finding.recommendation, Some(Recommendation::Blocking));
        assert_eq!(
            finding.criticality.as_ref().map(|c| c.explanation.as_str()),
            Some("température trop haute")
        );
        assert!(!report
            .notes
            .contains(&NormalizeNote::CriticalityDroppedForPresent { point: 7 }));
    }

    #[test]
    fn summary_counts_come_from_findings() {
        let estampille = "3. Estampille\nStatut : Non trouvé\nCriticité : Critique - absence d'agrément\n";
        let vsm = "14. VSM\nStatut : Douteux\n";
        let raw = raw_report(
            &[(3, estampille), (14, vsm)],
            "Résumé\n- Points critiques (3) : [Estampille, VSM]\n- Points majeurs (0) : []",
        );
        let report = normalize(&raw, &checklist()).expect("well-formed");
        assert_eq!(report.summary.critical, vec!["Estampille", "VSM"]);
        assert_eq!(report.finding(14).and_then(Finding::level), Some(Severity::Critical));
        assert_eq!(
            report.finding(3).map(|f| f.criticality.clone()),
            Some(Some(Criticality {
                level: Some(Severity::Critical),
                explanation: "absence d'agrément".into()
            }))
        );
        assert!(report.notes.contains(&NormalizeNote::SummaryCountMismatch {
            level: Severity::Critical,
            stated: 3,
            tallied: 2
        }));
        assert_eq!(report.summary.decision, Decision::Reject);
    }

    #[test]
    fn bold_headings_without_numbers() {
        let cl = checklist();
        let mut raw = String::new();
        for point in &cl.points {
            raw.push_str(&format!("**{}**\n- **Statut** : Partiel\n\n", point.name));
        }
        raw.push_str("## Résumé\n- Points mineurs (0) : aucun\n- Décision : Valider");
        let report = normalize(&raw, &cl).expect("well-formed");
        assert_eq!(report.findings.len(), 20);
        assert!(report
            .findings
            .iter()
            .all(|f| f.status == Some(FindingStatus::Partial)));
        assert!(report.notes.is_empty(), "{:?}", report.notes);
    }

    #[test]
    fn numbered_lists_inside_a_block_stay_body() {
        let process = "18. Process\nStatut : Présent\nÉtapes :\n1. Réception\n2. Découpe\n3. Conditionnement\n";
        let report = normalize(&raw_report(&[(18, process)], "Résumé"), &checklist()).expect("ok");
        let finding = report.finding(18).expect("point 18");
        assert_eq!(
            finding.body,
            vec!["Étapes :", "1. Réception", "2. Découpe", "3. Conditionnement"]
        );
        assert_eq!(report.findings.len(), 20);
    }

    #[test]
    fn inconsistency_bullets_are_collected() {
        let raw = raw_report(
            &[],
            "Résumé\n- Décision : Refuser\n- Incohérences :\n  - DLC de 12 jours vs 10 jours\n  - origine contradictoire",
        );
        let report = normalize(&raw, &checklist()).expect("ok");
        assert_eq!(
            report.summary.inconsistencies,
            vec!["DLC de 12 jours vs 10 jours", "origine contradictoire"]
        );
    }

    #[test]
    fn vocabulary() {
        assert_eq!(parse_status("✅ Présent"), Some(FindingStatus::Present));
        assert_eq!(parse_status("Non présent"), Some(FindingStatus::NotFound));
        assert_eq!(parse_status("Partiellement renseigné"), Some(FindingStatus::Partial));
        assert_eq!(parse_status("À vérifier"), Some(FindingStatus::Doubtful));
        assert_eq!(parse_status("?"), None);
        assert_eq!(parse_evidence("«Conserver entre 0 et 4 °C»"), Some(Evidence::Quote("Conserver entre 0 et 4 °C".into())));
        assert_eq!(parse_evidence("Aucune"), Some(Evidence::NotFound));
        assert_eq!(parse_recommendation("Demander un complément"), Some(Recommendation::RequestSupplement));
        assert_eq!(parse_decision("Non conforme, refuser"), Some(Decision::Reject));
        assert_eq!(parse_decision("Valider sous réserve"), Some(Decision::RequestSupplement));
        assert_eq!(parse_decision("Ne pas valider"), Some(Decision::Reject));
        assert_eq!(parse_decision("Non-conforme"), Some(Decision::Reject));
        assert_eq!(parse_decision("Conforme"), Some(Decision::Validate));
        assert_eq!(parse_status("Non conforme"), Some(FindingStatus::Doubtful));
        assert_eq!(parse_status("non-conforme"), Some(FindingStatus::Doubtful));
        assert_eq!(parse_status("Conforme"), Some(FindingStatus::Present));
        assert_eq!(parse_recommendation("Ne pas valider"), Some(Recommendation::Blocking));
        assert_eq!(parse_recommendation("Non conforme"), Some(Recommendation::Blocking));
        assert_eq!(parse_recommendation("Valider"), Some(Recommendation::Validate));
        assert_eq!(parse_list("[Estampille ; 14. VSM]"), vec!["Estampille", "14. VSM"]);
        assert_eq!(resolve_entry(&checklist(), "14. VSM"), Some(14));
        assert!(parse_list("aucun").is_empty());
        assert_eq!(parse_criticality("-"), None);
        assert_eq!(
            parse_criticality("Majeur : liste incomplète"),
            Some(Criticality {
                level: Some(Severity::Major),
                explanation: "liste incomplète".into()
            })
        );
    }
}
