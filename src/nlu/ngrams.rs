//! Multi-word phrase patterns. A phrase match outranks any single-keyword
//! match for the same field.

use std::collections::HashMap;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use super::normalize::normalize;
use crate::models::{CaseField, FieldValue};

/// Minimum confidence for a phrase to replace an already-set onset or
/// headache profile.
pub const DEFAULT_OVERRIDE_CONFIDENCE: f64 = 0.80;

#[rustfmt::skip]
const NGRAM_TABLE: &[(&str, &str, CaseField, &str, f64)] = &[
    // (phrase, category, field, value, confidence); value "true" for boolean fields
    ("pire douleur de ma vie", "thunderclap", CaseField::Onset, "thunderclap", 0.95),
    ("pire mal de tête de ma vie", "thunderclap", CaseField::Onset, "thunderclap", 0.95),
    ("coup de tonnerre", "thunderclap", CaseField::Onset, "thunderclap", 0.95),
    ("coup de poignard", "thunderclap", CaseField::Onset, "thunderclap", 0.85),
    ("comme un coup de marteau", "thunderclap", CaseField::Onset, "thunderclap", 0.90),
    ("explosion dans la tête", "thunderclap", CaseField::Onset, "thunderclap", 0.90),
    ("maximale d'emblée", "thunderclap", CaseField::Onset, "thunderclap", 0.95),
    ("d'emblée maximale", "thunderclap", CaseField::Onset, "thunderclap", 0.95),
    ("brutale maximale", "thunderclap", CaseField::Onset, "thunderclap", 0.90),
    ("pendant rapport sexuel", "thunderclap", CaseField::Onset, "thunderclap", 0.85),
    ("pendant l'orgasme", "thunderclap", CaseField::Onset, "thunderclap", 0.85),

    ("chien de fusil", "meningeal", CaseField::MeningealSigns, "true", 0.95),
    ("raideur de nuque", "meningeal", CaseField::MeningealSigns, "true", 0.90),
    ("nuque raide", "meningeal", CaseField::MeningealSigns, "true", 0.90),
    ("un peu raide", "meningeal", CaseField::MeningealSigns, "true", 0.70),

    ("vomissements en jet", "htic", CaseField::HticPattern, "true", 0.95),
    ("aggravé par la toux", "htic", CaseField::HticPattern, "true", 0.85),
    ("aggravé par l'effort", "htic", CaseField::HticPattern, "true", 0.85),
    ("pire le matin", "htic", CaseField::HticPattern, "true", 0.80),
    ("pire au réveil", "htic", CaseField::HticPattern, "true", 0.80),
    ("œdème papillaire", "htic", CaseField::HticPattern, "true", 0.95),
    ("effort physique intense", "htic", CaseField::HticPattern, "true", 0.75),
    ("céphalées matinales", "htic", CaseField::HticPattern, "true", 0.75),

    ("en étau", "tension", CaseField::HeadacheProfile, "tension_like", 0.85),
    ("comme un bandeau", "tension", CaseField::HeadacheProfile, "tension_like", 0.85),
    ("bandeau serré", "tension", CaseField::HeadacheProfile, "tension_like", 0.85),
    ("bat dans la tête", "migraine", CaseField::HeadacheProfile, "migraine_like", 0.80),
    ("bat dans la tempe", "migraine", CaseField::HeadacheProfile, "migraine_like", 0.80),
    ("douleur qui bat", "migraine", CaseField::HeadacheProfile, "migraine_like", 0.75),
    ("pulsatile", "migraine", CaseField::HeadacheProfile, "migraine_like", 0.75),

    ("décharge électrique", "neuralgia", CaseField::NeuropathicPattern, "true", 0.90),
    ("en décharge électrique", "neuralgia", CaseField::NeuropathicPattern, "true", 0.90),
    ("décharges électriques", "neuralgia", CaseField::NeuropathicPattern, "true", 0.90),
    ("éclair douloureux", "neuralgia", CaseField::NeuropathicPattern, "true", 0.85),
    ("douleur fulgurante", "neuralgia", CaseField::NeuropathicPattern, "true", 0.85),

    ("soulagé allongé", "post_pl", CaseField::RecentPl, "true", 0.80),
    ("pire debout", "post_pl", CaseField::RecentPl, "true", 0.75),
    ("aggravé debout", "post_pl", CaseField::RecentPl, "true", 0.75),

    ("depuis plusieurs semaines", "progressive", CaseField::Onset, "progressive", 0.85),
    ("depuis 3 semaines", "progressive", CaseField::Onset, "progressive", 0.85),
    ("depuis 2 semaines", "progressive", CaseField::Onset, "progressive", 0.80),
    ("depuis 1 mois", "progressive", CaseField::Onset, "progressive", 0.85),
    ("depuis plusieurs mois", "progressive", CaseField::Onset, "progressive", 0.90),

    ("depuis 6 mois", "chronic", CaseField::Onset, "chronic", 0.75),
    ("depuis plusieurs années", "chronic", CaseField::Onset, "chronic", 0.90),
    ("céphalées quotidiennes", "chronic", CaseField::Onset, "chronic", 0.90),
];

struct NgramPattern {
    phrase: &'static str,
    normalized: String,
    category: &'static str,
    field: CaseField,
    value: &'static str,
    confidence: f64,
}

static NGRAM_PATTERNS: LazyLock<Vec<NgramPattern>> = LazyLock::new(|| {
    NGRAM_TABLE
        .iter()
        .map(|&(phrase, category, field, value, confidence)| NgramPattern {
            phrase,
            normalized: normalize(phrase),
            category,
            field,
            value,
            confidence,
        })
        .collect()
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NgramMatch {
    pub pattern: String,
    pub category: String,
    pub field: CaseField,
    pub value: FieldValue,
    pub confidence: f64,
    pub start: usize,
    pub end: usize,
}

fn pattern_value(field: CaseField, raw: &str) -> FieldValue {
    if field.is_boolean() {
        FieldValue::Bool(raw == "true")
    } else {
        FieldValue::text(raw)
    }
}

/// Same anchoring as vocabulary terms: a phrase must start a word
/// ("soupire debout" is not "pire debout"); only very short phrases also
/// need a right boundary, so plurals still match.
fn on_word_boundaries(text: &str, start: usize, end: usize) -> bool {
    let phrase = &text[start..end];
    let is_word = |c: char| c.is_alphanumeric();
    let left_ok = !phrase.starts_with(is_word)
        || text[..start].chars().next_back().map_or(true, |c| !is_word(c));
    let right_ok = phrase.chars().count() > 4
        || !phrase.ends_with(is_word)
        || text[end..].chars().next().map_or(true, |c| !is_word(c));
    left_ok && right_ok
}

/// Every phrase found in normalized text, one per (field, value) keeping
/// the most confident, ordered by position.
pub fn detect_ngrams(normalized: &str) -> Vec<NgramMatch> {
    let mut best: HashMap<(CaseField, &'static str), NgramMatch> = HashMap::new();

    for pattern in NGRAM_PATTERNS.iter() {
        let phrase = pattern.normalized.as_str();
        let found = normalized
            .match_indices(phrase)
            .filter(|(start, _)| on_word_boundaries(normalized, *start, start + phrase.len()));
        for (start, _) in found {
            let key = (pattern.field, pattern.value);
            let better = best
                .get(&key)
                .map_or(true, |current| pattern.confidence > current.confidence);
            if better {
                best.insert(
                    key,
                    NgramMatch {
                        pattern: pattern.phrase.to_string(),
                        category: pattern.category.to_string(),
                        field: pattern.field,
                        value: pattern_value(pattern.field, pattern.value),
                        confidence: pattern.confidence,
                        start,
                        end: start + pattern.normalized.len(),
                    },
                );
            }
        }
    }

    let mut matches: Vec<NgramMatch> = best.into_values().collect();
    matches.sort_by_key(|m| (m.start, m.end));
    matches
}

/// Whether a phrase may replace a value already present on the case.
pub fn may_override(field: CaseField, confidence: f64, min_confidence: f64) -> bool {
    matches!(field, CaseField::Onset | CaseField::HeadacheProfile) && confidence >= min_confidence
}
