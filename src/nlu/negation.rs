//! Explicit negation pass: "pas de / sans / absence de / aucun / ni"
//! followed by a symptom sets that field to a confirmed negative.
//! Runs last in the hybrid pipeline and has the final word on negatives.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::CaseField;

const NEGATION_CONFIDENCE: f64 = 0.90;
const FIXED_PHRASE_CONFIDENCE: f64 = 0.95;

const NEGATION_PREFIXES: &[&str] = &[
    r"pas\s+de\s+notion\s+d[e']?\s*",
    r"pas\s+d[e']?\s*",
    r"sans\s+",
    r"absence\s+d[e']?\s*",
    r"aucune?\s+",
    r"ni\s+d[e']?\s*",
    r"ni\s+",
    r"negatif(?:ve)?\s+(?:pour\s+)?(?:l[ae']\s*)?",
];

/// Normalized symptom term -> field it negates.
const SYMPTOM_TO_FIELD: &[(&str, CaseField)] = &[
    ("fievre", CaseField::Fever),
    ("febrile", CaseField::Fever),
    ("temperature", CaseField::Fever),
    ("hyperthermie", CaseField::Fever),
    ("pyrexie", CaseField::Fever),
    ("raideur de la nuque", CaseField::MeningealSigns),
    ("raideur de nuque", CaseField::MeningealSigns),
    ("raideur nuque", CaseField::MeningealSigns),
    ("raideur", CaseField::MeningealSigns),
    ("signes meninges", CaseField::MeningealSigns),
    ("signe meninge", CaseField::MeningealSigns),
    ("syndrome meninge", CaseField::MeningealSigns),
    ("meninge", CaseField::MeningealSigns),
    ("deficit neurologique", CaseField::NeuroDeficit),
    ("deficit moteur", CaseField::NeuroDeficit),
    ("deficit sensitif", CaseField::NeuroDeficit),
    ("deficit", CaseField::NeuroDeficit),
    ("paralysie", CaseField::NeuroDeficit),
    ("paresie", CaseField::NeuroDeficit),
    ("faiblesse", CaseField::NeuroDeficit),
    ("signes de localisation", CaseField::NeuroDeficit),
    ("signe de localisation", CaseField::NeuroDeficit),
    ("traumatisme", CaseField::Trauma),
    ("trauma", CaseField::Trauma),
    ("choc", CaseField::Trauma),
    ("chute", CaseField::Trauma),
    ("convulsions", CaseField::Seizure),
    ("convulsion", CaseField::Seizure),
    ("crises", CaseField::Seizure),
    ("crise", CaseField::Seizure),
    ("epilepsie", CaseField::Seizure),
    ("vomissements", CaseField::HticPattern),
    ("vomissement", CaseField::HticPattern),
];

const FIXED_NEGATIONS: &[(&str, CaseField)] = &[
    (r"examen\s+neurologique\s+(?:strictement\s+)?normal", CaseField::NeuroDeficit),
    (r"examen\s+neuro\s+normal", CaseField::NeuroDeficit),
    (r"nuque\s+souple", CaseField::MeningealSigns),
    (r"\bapyretique\b|\bapyrexie\b", CaseField::Fever),
];

struct NegationPatterns {
    combined: Option<Regex>,
    fields: HashMap<&'static str, CaseField>,
    fixed: Vec<(Regex, CaseField)>,
}

static PATTERNS: LazyLock<NegationPatterns> = LazyLock::new(|| {
    let mut symptoms: Vec<&str> = SYMPTOM_TO_FIELD.iter().map(|(s, _)| *s).collect();
    symptoms.sort_by_key(|s| std::cmp::Reverse(s.len()));
    let symptom_alt = symptoms
        .iter()
        .map(|s| regex::escape(s).replace(' ', r"\s+"))
        .collect::<Vec<_>>()
        .join("|");
    let combined = Regex::new(&format!(
        r"\b(?:{})({})\b",
        NEGATION_PREFIXES.join("|"),
        symptom_alt
    ))
    .ok();

    NegationPatterns {
        combined,
        fields: SYMPTOM_TO_FIELD.iter().copied().collect(),
        fixed: FIXED_NEGATIONS
            .iter()
            .filter_map(|(p, f)| Regex::new(p).ok().map(|r| (r, *f)))
            .collect(),
    }
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegationMatch {
    pub field: CaseField,
    pub term: String,
    pub confidence: f64,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NegationResult {
    /// At most one negation per field, first occurrence.
    pub negations: Vec<NegationMatch>,
    /// Input with negated spans removed, for semantic matching.
    pub cleaned_text: String,
}

fn collapse_spaces(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Find explicit negations in normalized text.
pub fn detect_negations(normalized: &str) -> NegationResult {
    let patterns = &*PATTERNS;
    let mut found: Vec<NegationMatch> = Vec::new();

    for (regex, field) in &patterns.fixed {
        for m in regex.find_iter(normalized) {
            found.push(NegationMatch {
                field: *field,
                term: m.as_str().to_string(),
                confidence: FIXED_PHRASE_CONFIDENCE,
                start: m.start(),
                end: m.end(),
            });
        }
    }

    if let Some(combined) = &patterns.combined {
        for caps in combined.captures_iter(normalized) {
            let (Some(whole), Some(symptom)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let key = collapse_spaces(symptom.as_str());
            if let Some(field) = patterns.fields.get(key.as_str()) {
                found.push(NegationMatch {
                    field: *field,
                    term: whole.as_str().to_string(),
                    confidence: NEGATION_CONFIDENCE,
                    start: whole.start(),
                    end: whole.end(),
                });
            }
        }
    }

    found.sort_by_key(|m| m.start);

    let mut cleaned = String::with_capacity(normalized.len());
    let mut cursor = 0;
    for m in &found {
        if m.start >= cursor {
            cleaned.push_str(&normalized[cursor..m.start]);
            cursor = m.end;
        }
    }
    cleaned.push_str(&normalized[cursor.min(normalized.len())..]);

    let mut negations: Vec<NegationMatch> = Vec::new();
    for m in found {
        if !negations.iter().any(|n| n.field == m.field) {
            negations.push(m);
        }
    }

    NegationResult {
        negations,
        cleaned_text: collapse_spaces(&cleaned),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlu::normalize::normalize;

    fn fields(text: &str) -> Vec<CaseField> {
        detect_negations(&normalize(text))
            .negations
            .iter()
            .map(|n| n.field)
            .collect()
    }

    #[test]
    fn pas_de_fievre() {
        assert_eq!(fields("pas de fièvre"), vec![CaseField::Fever]);
    }

    #[test]
    fn chained_negations() {
        let f = fields("sans fièvre ni raideur de nuque, pas de vomissements");
        assert!(f.contains(&CaseField::Fever));
        assert!(f.contains(&CaseField::MeningealSigns));
        assert!(f.contains(&CaseField::HticPattern));
    }

    #[test]
    fn fixed_phrases_high_confidence() {
        let r = detect_negations(&normalize("Examen neurologique normal, nuque souple"));
        let neuro = r
            .negations
            .iter()
            .find(|n| n.field == CaseField::NeuroDeficit)
            .unwrap();
        assert_eq!(neuro.confidence, 0.95);
        assert!(r.negations.iter().any(|n| n.field == CaseField::MeningealSigns));
    }

    #[test]
    fn one_entry_per_field() {
        let f = fields("pas de fièvre, apyrétique");
        assert_eq!(f, vec![CaseField::Fever]);
    }

    #[test]
    fn cleaned_text_drops_negated_spans() {
        let r = detect_negations(&normalize("céphalée brutale sans fièvre"));
        assert_eq!(r.cleaned_text, "cephalee brutale");
    }

    #[test]
    fn positive_mention_not_negated() {
        assert!(fields("fièvre et raideur de nuque").is_empty());
    }

    #[test]
    fn partial_word_not_matched() {
        assert!(fields("sans chuteur").is_empty());
    }
}
