//! Prompts sent to the language models.
//!
//! The analysis prompt is generated from the [`Checklist`] so that a new
//! checklist revision changes the prompt without touching code. Its output
//! format section is the contract [`crate::report::normalize`] parses; keep
//! the two in sync.

use crate::checklist::Checklist;
use std::fmt::Write as _;

/// System prompt for the vision fallback: transcribe one page image.
pub const VISION_TRANSCRIPTION_PROMPT: &str = r#"Tu reçois l'image d'une page de fiche technique de produit alimentaire.
Transcris fidèlement TOUT le texte visible, dans l'ordre de lecture.

- Conserve les nombres, unités (°C, %, g, ufc/g), dates et numéros d'agrément exactement.
- Restitue les tableaux ligne par ligne, cellules séparées par " | ".
- N'ajoute aucun commentaire, aucune analyse, aucun résumé.
- Si la page ne contient aucun texte lisible, réponds par une ligne vide."#;

const INTRODUCTION: &str = "Tu analyses la fiche technique d'un produit alimentaire fournie par l'utilisateur. \
Pour chaque point de contrôle ci-dessous, indique s'il est présent dans le document, \
en citant l'extrait qui le prouve. Chaque fiche doit mener à un rapport unique, \
avec exactement la même structure pour toutes les fiches.";

const OUTPUT_FORMAT: &str = r#"FORMAT DE SORTIE (obligatoire, sans texte avant ni après) :

Pour chaque point, dans l'ordre, un bloc :

<numéro>. <nom du point>
Statut : Présent | Partiel | Douteux | Non trouvé
Preuve : "<extrait exact du document>" ou Non trouvé
Criticité : <Critique | Majeur | Mineur> - <explication>
Recommandation : Valider | Demander complément | Bloquant
---

Règles :
- Exactement un bloc par point, numérotés de 1 au dernier point, sans en omettre.
- Si le statut est Présent, n'écris PAS de ligne Criticité.
- Avant de conclure Non trouvé, cherche aussi les synonymes indiqués.
- Aucun résumé intermédiaire : un seul résumé, après le dernier point.

Puis, après le dernier bloc :

Résumé
- Points critiques (<nombre>) : [<noms des points>]
- Points majeurs (<nombre>) : [<noms des points>]
- Points mineurs (<nombre>) : [<noms des points>]
- Décision : Valider | Demander complément | Refuser
- Incohérences : aucune, ou la liste des incohérences relevées"#;

/// Build the analysis system prompt for `checklist`.
pub fn analysis_prompt(checklist: &Checklist) -> String {
    let mut out = String::with_capacity(4096);
    out.push_str(INTRODUCTION);
    let _ = write!(
        out,
        "\n\nPOINTS DE CONTRÔLE (checklist {}) :\n\n",
        checklist.version
    );
    for point in &checklist.points {
        let _ = write!(out, "{}. {} [{}]", point.index, point.name, point.severity);
        if let Some(ref hint) = point.hint {
            let _ = write!(out, " : {hint}");
        }
        if !point.synonyms.is_empty() {
            let _ = write!(out, " (synonymes : {})", point.synonyms.join(", "));
        }
        out.push('\n');
    }
    out.push('\n');
    out.push_str(OUTPUT_FORMAT);
    out
}
