//! Deterministic cleanup of raw model output before normalization.
//!
//! These rules fix transport quirks without touching content: a fenced
//! answer, CRLF line endings, invisible Unicode, trailing spaces and long
//! blank runs. Each rule is a pure `&str → String` pass.
//!
//! ## Rule Order
//!
//! Line endings are normalised before trimming, and fences are stripped
//! first so the fence regex sees the raw answer.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply every cleanup rule to `input`, in order:
///
/// 1. Strip an outer ```` ``` ```` / ```` ```markdown ```` / ```` ```text ```` fence
/// 2. Normalise line endings (CRLF/CR → LF)
/// 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, …)
/// 4. Replace non-breaking spaces with plain spaces
/// 5. Trim trailing whitespace per line
/// 6. Collapse runs of blank lines down to one
/// 7. Trim the whole text
pub fn clean_model_output(input: &str) -> String {
    let s = strip_outer_fences(input);
    let s = normalise_line_endings(&s);
    let s = remove_invisible_chars(&s);
    let s = normalise_spaces(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    s.trim().to_string()
}

static RE_OUTER_FENCES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```(?:markdown|md|text|txt)?[ \t]*\r?\n(.*)\r?\n```\s*$").unwrap()
});

fn strip_outer_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn remove_invisible_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| {
            !matches!(
                c,
                '\u{200B}' | '\u{FEFF}' | '\u{00AD}' | '\u{200C}' | '\u{200D}' | '\u{2060}'
            )
        })
        .collect()
}

fn normalise_spaces(input: &str) -> String {
    input.replace(['\u{00A0}', '\u{202F}', '\t'], " ")
}

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

static RE_BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_RUN.replace_all(input, "\n\n").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fences() {
        let raw = "```markdown\n1. Produit\nStatut : Présent\n```";
        assert_eq!(clean_model_output(raw), "1. Produit\nStatut : Présent");
        let raw = "```\n1. Produit\n```\n";
        assert_eq!(clean_model_output(raw), "1. Produit");
    }

    #[test]
    fn inner_fences_are_left_alone() {
        let raw = "Intro\n```\ncode\n```";
        assert_eq!(clean_model_output(raw), raw);
    }

    #[test]
    fn crlf_and_trailing_spaces() {
        assert_eq!(clean_model_output("a  \r\nb\t\r\n"), "a\nb");
    }

    #[test]
    fn invisible_and_nbsp() {
        assert_eq!(
            clean_model_output("\u{FEFF}Statut\u{00A0}: Pr\u{200B}ésent"),
            "Statut : Présent"
        );
    }

    #[test]
    fn blank_runs_collapse() {
        assert_eq!(clean_model_output("a\n\n\n\n\nb"), "a\n\nb");
    }
}
