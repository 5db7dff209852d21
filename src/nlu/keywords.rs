//! Inverted index from single keywords to `(field, value, weight)`.
//!
//! Weights are static per entry: >= 0.90 for unambiguous terms, 0.70-0.90
//! for moderately specific ones, below 0.70 for weak signals that are
//! recorded but not applied. Negative keywords ("apyrétique") carry
//! `false` directly; a positive keyword right after a negation prefix
//! ("pas de chimiothérapie") is skipped.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use super::normalize::normalize;
use super::vocabulary::is_negated_at;
use crate::models::{CaseField, FieldValue};

#[derive(Debug, Clone, Copy)]
enum Kw {
    Yes,
    No,
    Is(&'static str),
}

impl Kw {
    fn to_value(self) -> FieldValue {
        match self {
            Kw::Yes => FieldValue::Bool(true),
            Kw::No => FieldValue::Bool(false),
            Kw::Is(s) => FieldValue::text(s),
        }
    }
}

use CaseField as F;
use Kw::{Is, No, Yes};

#[rustfmt::skip]
const KEYWORD_TABLE: &[(&str, CaseField, Kw, f64)] = &[
    // onset
    ("brutale", F::Onset, Is("thunderclap"), 0.85),
    ("brutal", F::Onset, Is("thunderclap"), 0.85),
    ("soudaine", F::Onset, Is("thunderclap"), 0.80),
    ("soudain", F::Onset, Is("thunderclap"), 0.80),
    ("subite", F::Onset, Is("thunderclap"), 0.80),
    ("subit", F::Onset, Is("thunderclap"), 0.80),
    ("foudroyante", F::Onset, Is("thunderclap"), 0.90),
    ("explosive", F::Onset, Is("thunderclap"), 0.85),
    ("progressive", F::Onset, Is("progressive"), 0.85),
    ("progressif", F::Onset, Is("progressive"), 0.85),
    ("graduellement", F::Onset, Is("progressive"), 0.75),
    ("insidieuse", F::Onset, Is("progressive"), 0.80),
    ("insidieux", F::Onset, Is("progressive"), 0.80),
    // fever
    ("fébrile", F::Fever, Yes, 0.90),
    ("fièvre", F::Fever, Yes, 0.90),
    ("fiévreux", F::Fever, Yes, 0.85),
    ("fiévreuse", F::Fever, Yes, 0.85),
    ("hyperthermie", F::Fever, Yes, 0.95),
    ("pyrexie", F::Fever, Yes, 0.95),
    ("apyrétique", F::Fever, No, 0.95),
    ("apyrexie", F::Fever, No, 0.95),
    // meningeal
    ("méningé", F::MeningealSigns, Yes, 0.90),
    ("méningée", F::MeningealSigns, Yes, 0.90),
    ("méningite", F::MeningealSigns, Yes, 0.85),
    ("méningite", F::Fever, Yes, 0.70),
    ("photophobie", F::MeningealSigns, Yes, 0.75),
    ("phonophobie", F::MeningealSigns, Yes, 0.60),
    // neurological deficit
    ("déficit", F::NeuroDeficit, Yes, 0.85),
    ("déficitaire", F::NeuroDeficit, Yes, 0.90),
    ("paralysie", F::NeuroDeficit, Yes, 0.95),
    ("parésie", F::NeuroDeficit, Yes, 0.95),
    ("hémiplégie", F::NeuroDeficit, Yes, 0.95),
    ("hémiparésie", F::NeuroDeficit, Yes, 0.95),
    ("aphasie", F::NeuroDeficit, Yes, 0.95),
    ("dysarthrie", F::NeuroDeficit, Yes, 0.90),
    ("diplopie", F::NeuroDeficit, Yes, 0.85),
    ("ataxie", F::NeuroDeficit, Yes, 0.90),
    ("paresthésie", F::NeuroDeficit, Yes, 0.70),
    ("paresthésies", F::NeuroDeficit, Yes, 0.70),
    ("engourdissement", F::NeuroDeficit, Yes, 0.65),
    ("fourmillements", F::NeuroDeficit, Yes, 0.60),
    // intracranial hypertension
    ("vomissement", F::HticPattern, Yes, 0.70),
    ("vomissements", F::HticPattern, Yes, 0.70),
    ("nausée", F::HticPattern, Yes, 0.40),
    ("nausées", F::HticPattern, Yes, 0.40),
    ("papilloedème", F::HticPattern, Yes, 0.95),
    ("matinale", F::HticPattern, Yes, 0.70),
    ("matinales", F::HticPattern, Yes, 0.70),
    // trauma
    ("traumatisme", F::Trauma, Yes, 0.90),
    ("trauma", F::Trauma, Yes, 0.90),
    ("traumatique", F::Trauma, Yes, 0.85),
    ("chute", F::Trauma, Yes, 0.70),
    ("accident", F::Trauma, Yes, 0.65),
    ("avp", F::Trauma, Yes, 0.90),
    ("choc", F::Trauma, Yes, 0.60),
    ("coup", F::Trauma, Yes, 0.55),
    // seizure
    ("convulsion", F::Seizure, Yes, 0.95),
    ("convulsions", F::Seizure, Yes, 0.95),
    ("convulsif", F::Seizure, Yes, 0.90),
    ("épilepsie", F::Seizure, Yes, 0.95),
    ("épileptique", F::Seizure, Yes, 0.90),
    ("comitial", F::Seizure, Yes, 0.95),
    ("comitiale", F::Seizure, Yes, 0.95),
    // pregnancy
    ("enceinte", F::PregnancyPostpartum, Yes, 0.95),
    ("grossesse", F::PregnancyPostpartum, Yes, 0.95),
    ("parturiente", F::PregnancyPostpartum, Yes, 0.95),
    ("accouchement", F::PregnancyPostpartum, Yes, 0.90),
    ("post-partum", F::PregnancyPostpartum, Yes, 0.95),
    ("postpartum", F::PregnancyPostpartum, Yes, 0.95),
    // lumbar puncture / peridural
    ("péridurale", F::RecentPl, Yes, 0.90),
    ("péridural", F::RecentPl, Yes, 0.90),
    ("ponction", F::RecentPl, Yes, 0.80),
    ("lombaire", F::RecentPl, Yes, 0.65),
    ("pl", F::RecentPl, Yes, 0.85),
    // immunosuppression
    ("immunodéprimé", F::Immunosuppression, Yes, 0.95),
    ("immunodéprimée", F::Immunosuppression, Yes, 0.95),
    ("immunosuppression", F::Immunosuppression, Yes, 0.95),
    ("immunosupprimé", F::Immunosuppression, Yes, 0.95),
    ("vih", F::Immunosuppression, Yes, 0.90),
    ("sida", F::Immunosuppression, Yes, 0.90),
    ("chimiothérapie", F::Immunosuppression, Yes, 0.85),
    ("greffe", F::Immunosuppression, Yes, 0.80),
    ("greffé", F::Immunosuppression, Yes, 0.85),
    ("greffée", F::Immunosuppression, Yes, 0.85),
    ("corticothérapie", F::Immunosuppression, Yes, 0.70),
    // headache profile
    ("pulsatile", F::HeadacheProfile, Is("migraine_like"), 0.75),
    ("pulsatilité", F::HeadacheProfile, Is("migraine_like"), 0.75),
    ("lancinant", F::HeadacheProfile, Is("migraine_like"), 0.70),
    ("lancinante", F::HeadacheProfile, Is("migraine_like"), 0.70),
    ("oppressif", F::HeadacheProfile, Is("tension_like"), 0.75),
    ("oppressive", F::HeadacheProfile, Is("tension_like"), 0.75),
    ("constrictif", F::HeadacheProfile, Is("tension_like"), 0.75),
    ("constrictive", F::HeadacheProfile, Is("tension_like"), 0.75),
    // neuropathic
    ("névralgie", F::NeuropathicPattern, Yes, 0.95),
    ("névralgie", F::FacialPain, Yes, 0.80),
    ("névralgique", F::NeuropathicPattern, Yes, 0.90),
    ("trijumeau", F::NeuropathicPattern, Yes, 0.90),
    ("trijumeau", F::FacialPain, Yes, 0.95),
    ("électrique", F::NeuropathicPattern, Yes, 0.75),
    ("brûlure", F::NeuropathicPattern, Yes, 0.70),
    ("brûlante", F::NeuropathicPattern, Yes, 0.70),
    // anticoagulation
    ("anticoagulant", F::Anticoagulation, Yes, 0.95),
    ("anticoagulants", F::Anticoagulation, Yes, 0.95),
    ("anticoagulé", F::Anticoagulation, Yes, 0.95),
    ("anticoagulée", F::Anticoagulation, Yes, 0.95),
    ("coumadine", F::Anticoagulation, Yes, 0.95),
    ("warfarine", F::Anticoagulation, Yes, 0.95),
    ("xarelto", F::Anticoagulation, Yes, 0.95),
    ("eliquis", F::Anticoagulation, Yes, 0.95),
    ("pradaxa", F::Anticoagulation, Yes, 0.95),
    ("héparine", F::Anticoagulation, Yes, 0.90),
    ("lovenox", F::Anticoagulation, Yes, 0.90),
];

pub const DEFAULT_MIN_APPLY_WEIGHT: f64 = 0.65;

struct IndexEntry {
    keyword: &'static str,
    field: CaseField,
    value: Kw,
    weight: f64,
}

/// Folded keyword -> entries.
static KEYWORD_INDEX: LazyLock<HashMap<String, Vec<IndexEntry>>> = LazyLock::new(|| {
    let mut index: HashMap<String, Vec<IndexEntry>> = HashMap::new();
    for &(keyword, field, value, weight) in KEYWORD_TABLE {
        index.entry(normalize(keyword)).or_default().push(IndexEntry {
            keyword,
            field,
            value,
            weight,
        });
    }
    index
});

/// Exact (accented) spellings, used to tell correct words from typos.
static EXACT_KEYWORDS: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| KEYWORD_TABLE.iter().map(|(k, ..)| *k).collect());

/// Word tokens (letters, digits, hyphens) with their byte offsets.
pub fn tokens(text: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut start: Option<usize> = None;
    for (idx, ch) in text.char_indices() {
        if ch.is_alphanumeric() || ch == '-' {
            start.get_or_insert(idx);
        } else if let Some(s) = start.take() {
            out.push((s, &text[s..idx]));
        }
    }
    if let Some(s) = start {
        out.push((s, &text[s..]));
    }
    out
}

/// True when `lower` is an exact, correctly spelled keyword.
pub fn is_indexed_keyword(lower: &str) -> bool {
    EXACT_KEYWORDS.contains(lower)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordMatch {
    pub keyword: String,
    pub field: CaseField,
    pub value: FieldValue,
    pub weight: f64,
    pub position: usize,
}

/// All keyword hits in normalized text, best weight per field, strongest first.
pub fn detect_keywords(normalized: &str) -> Vec<KeywordMatch> {
    let mut best: HashMap<CaseField, KeywordMatch> = HashMap::new();

    for (position, token) in tokens(normalized) {
        let Some(entries) = KEYWORD_INDEX.get(token) else {
            continue;
        };
        let negated = is_negated_at(normalized, position);
        for entry in entries {
            if negated && matches!(entry.value, Kw::Yes) {
                continue;
            }
            let better = best
                .get(&entry.field)
                .map_or(true, |current| entry.weight > current.weight);
            if better {
                best.insert(
                    entry.field,
                    KeywordMatch {
                        keyword: entry.keyword.to_string(),
                        field: entry.field,
                        value: entry.value.to_value(),
                        weight: entry.weight,
                        position,
                    },
                );
            }
        }
    }

    let mut matches: Vec<KeywordMatch> = best.into_values().collect();
    matches.sort_by(|a, b| {
        b.weight
            .total_cmp(&a.weight)
            .then_with(|| a.position.cmp(&b.position))
    });
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(text: &str) -> Vec<KeywordMatch> {
        detect_keywords(&normalize(text))
    }

    #[test]
    fn negative_keyword_carries_false() {
        let m = detect("patient apyrétique");
        assert_eq!(m.len(), 1);
        assert_eq!(m[0].field, CaseField::Fever);
        assert_eq!(m[0].value, FieldValue::Bool(false));
        assert_eq!(m[0].weight, 0.95);
    }

    #[test]
    fn one_keyword_can_feed_two_fields() {
        let m = detect("suspicion de méningite");
        let fields: Vec<CaseField> = m.iter().map(|k| k.field).collect();
        assert!(fields.contains(&CaseField::MeningealSigns));
        assert!(fields.contains(&CaseField::Fever));
    }

    #[test]
    fn best_weight_per_field_kept() {
        let m = detect("chute puis traumatisme");
        let trauma: Vec<_> = m.iter().filter(|k| k.field == CaseField::Trauma).collect();
        assert_eq!(trauma.len(), 1);
        assert_eq!(trauma[0].keyword, "traumatisme");
    }

    #[test]
    fn sorted_by_weight_descending() {
        let m = detect("nausées et convulsions");
        assert_eq!(m[0].field, CaseField::Seizure);
        assert!(m.windows(2).all(|w| w[0].weight >= w[1].weight));
    }

    #[test]
    fn matches_unaccented_input() {
        let m = detect("patiente enceinte, fievre");
        assert!(m.iter().any(|k| k.field == CaseField::Fever));
    }

    #[test]
    fn negated_positive_keyword_is_skipped() {
        assert!(detect("pas de chimiothérapie").is_empty());
        assert!(detect("sans fièvre").is_empty());
        let m = detect("pas de fièvre mais convulsions");
        assert_eq!(m.len(), 1);
        assert_eq!(m[0].field, CaseField::Seizure);
    }

    #[test]
    fn whole_tokens_only() {
        assert!(detect("plusieurs jours").is_empty());
    }

    #[test]
    fn exact_spelling_lookup() {
        assert!(is_indexed_keyword("fébrile"));
        assert!(!is_indexed_keyword("febrile"));
    }
}
