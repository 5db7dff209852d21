//! Per-concept vocabulary detectors over normalized French clinical text.
//!
//! Every detector returns a [`DetectionResult`] with three meaningful
//! states: not mentioned (`detected == false`), confirmed present
//! (`value == Some(true)`), and confirmed absent (`value == Some(false)`).

pub mod clinical;
pub mod profile;

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::normalize::normalize;
use crate::models::{HeadacheLocation, HeadacheProfile, Onset, VisualDisturbance};

pub use clinical::{
    detect_cancer_history, detect_fever, detect_horton, detect_htic, detect_immunosuppression,
    detect_joint_pain, detect_meningeal, detect_neuro_deficit, detect_pattern_change,
    detect_pregnancy, detect_seizure, detect_tinnitus, detect_trauma, detect_vertigo,
};
pub use profile::{
    detect_headache_profile, detect_location, detect_onset, detect_visual_disturbance,
};

pub const RELIABLE_CONFIDENCE: f64 = 0.60;
pub const HIGH_CONFIDENCE: f64 = 0.85;

// ═══════════════════════════════════════════════════════════
// DetectionResult
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionSource {
    Keyword,
    Pattern,
    NegationKeyword,
    Embedding,
    ClinicalSign,
}

/// Outcome of one detector. `value` is only meaningful when `detected`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult<T> {
    pub detected: bool,
    pub value: Option<T>,
    pub confidence: f64,
    pub matched_term: Option<String>,
    pub source: Option<DetectionSource>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl<T> DetectionResult<T> {
    pub fn not_detected() -> Self {
        Self {
            detected: false,
            value: None,
            confidence: 0.0,
            matched_term: None,
            source: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn found(value: T, confidence: f64, term: &str, source: DetectionSource) -> Self {
        Self {
            detected: true,
            value: Some(value),
            confidence: confidence.clamp(0.0, 1.0),
            matched_term: Some(term.to_string()),
            source: Some(source),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn is_reliable(&self) -> bool {
        self.detected && self.confidence >= RELIABLE_CONFIDENCE
    }

    pub fn is_high_confidence(&self) -> bool {
        self.detected && self.confidence >= HIGH_CONFIDENCE
    }

    /// Value only when detected; guards against reading a stale value.
    pub fn detected_value(&self) -> Option<&T> {
        if self.detected {
            self.value.as_ref()
        } else {
            None
        }
    }
}

impl DetectionResult<bool> {
    pub fn negative(confidence: f64, term: &str) -> Self {
        Self::found(false, confidence, term, DetectionSource::NegationKeyword)
    }
}

// ═══════════════════════════════════════════════════════════
// Term matching
// ═══════════════════════════════════════════════════════════

/// Prefixes that cancel a clinical sign mentioned right after them.
const NEGATION_PREFIXES: &[&str] = &[
    "pas de",
    "pas d'",
    "sans",
    "aucun",
    "aucune",
    "absence de",
    "absence d'",
    "non",
    "ni",
    "pas d'antecedent de",
    "pas d'antecedent d'",
    "pas d'atcd de",
    "sans antecedent de",
    "aucun antecedent de",
];

/// A set of normalized terms compiled into one alternation.
/// Terms always match on a left word boundary; short terms (or the whole
/// set when `whole_word`) also need a right boundary.
pub struct TermSet {
    regex: Option<Regex>,
}

impl TermSet {
    pub fn new(terms: &[&str], whole_word: bool) -> Self {
        let mut normalized: Vec<String> = terms.iter().map(|t| normalize(t)).collect();
        normalized.sort_by_key(|t| std::cmp::Reverse(t.len()));
        normalized.dedup();

        let alternatives: Vec<String> = normalized
            .iter()
            .filter(|t| !t.is_empty())
            .map(|t| {
                let starts_word = t.chars().next().is_some_and(|c| c.is_alphanumeric());
                let ends_word = t.chars().last().is_some_and(|c| c.is_alphanumeric());
                let left = if starts_word { r"\b" } else { "" };
                let right = if ends_word && (whole_word || t.chars().count() <= 4) {
                    r"\b"
                } else {
                    ""
                };
                format!("{left}{}{right}", regex::escape(t))
            })
            .collect();

        let regex = if alternatives.is_empty() {
            None
        } else {
            Regex::new(&format!("(?:{})", alternatives.join("|"))).ok()
        };
        Self { regex }
    }

    /// First match as (start, matched text).
    pub fn find<'t>(&self, text: &'t str) -> Option<(usize, &'t str)> {
        self.regex
            .as_ref()
            .and_then(|r| r.find(text))
            .map(|m| (m.start(), m.as_str()))
    }

    /// First match not preceded by a negation prefix.
    pub fn find_unnegated<'t>(&self, text: &'t str) -> Option<(usize, &'t str)> {
        let regex = self.regex.as_ref()?;
        regex
            .find_iter(text)
            .find(|m| !is_negated_at(text, m.start()))
            .map(|m| (m.start(), m.as_str()))
    }

    pub fn find_all<'t>(&self, text: &'t str) -> Vec<(usize, &'t str)> {
        match &self.regex {
            Some(r) => r.find_iter(text).map(|m| (m.start(), m.as_str())).collect(),
            None => Vec::new(),
        }
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.as_ref().is_some_and(|r| r.is_match(text))
    }
}

/// True when the slice before `pos` ends with a negation prefix.
pub fn is_negated_at(text: &str, pos: usize) -> bool {
    let before = text[..pos].trim_end();
    NEGATION_PREFIXES.iter().any(|p| {
        before.ends_with(p)
            && before[..before.len() - p.len()]
                .chars()
                .last()
                .map_or(true, |c| !c.is_alphanumeric())
    })
}

/// Ordered group of terms sharing a confidence multiplier.
pub struct TermGroup {
    pub name: &'static str,
    pub terms: TermSet,
    pub multiplier: f64,
    pub source: DetectionSource,
    pub guard_negation: bool,
}

impl TermGroup {
    pub fn new(name: &'static str, terms: &[&str], multiplier: f64) -> Self {
        Self {
            name,
            terms: TermSet::new(terms, false),
            multiplier,
            source: DetectionSource::Keyword,
            guard_negation: false,
        }
    }

    pub fn acronyms(name: &'static str, terms: &[&str], multiplier: f64) -> Self {
        Self {
            terms: TermSet::new(terms, true),
            ..Self::new(name, terms, multiplier)
        }
    }

    pub fn clinical(mut self) -> Self {
        self.source = DetectionSource::ClinicalSign;
        self.guard_negation = true;
        self
    }

    pub fn pattern(mut self) -> Self {
        self.source = DetectionSource::Pattern;
        self
    }

    pub fn guarded(mut self) -> Self {
        self.guard_negation = true;
        self
    }

    fn find<'t>(&self, text: &'t str) -> Option<(usize, &'t str)> {
        if self.guard_negation {
            self.terms.find_unnegated(text)
        } else {
            self.terms.find(text)
        }
    }
}

/// Boolean concept: negation list first, then positive groups in order.
pub struct BoolVocabulary {
    pub concept: &'static str,
    pub base_confidence: f64,
    pub negation_confidence: f64,
    pub negations: TermSet,
    pub groups: Vec<TermGroup>,
    /// Terms that make the whole concept inapplicable.
    pub exclusions: Option<TermSet>,
    /// Words that, shortly after a negation, reopen the question.
    pub negation_exceptions: Option<TermSet>,
}

/// Window after a negation in which an exception marker cancels it.
const NEGATION_EXCEPTION_WINDOW: usize = 100;

impl BoolVocabulary {
    pub fn new(concept: &'static str, base_confidence: f64, negation_confidence: f64) -> Self {
        Self {
            concept,
            base_confidence,
            negation_confidence,
            negations: TermSet::new(&[], false),
            groups: Vec::new(),
            exclusions: None,
            negation_exceptions: None,
        }
    }

    pub fn negations(mut self, terms: &[&str]) -> Self {
        self.negations = TermSet::new(terms, false);
        self
    }

    pub fn group(mut self, group: TermGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn exclusions(mut self, terms: &[&str]) -> Self {
        self.exclusions = Some(TermSet::new(terms, true));
        self
    }

    pub fn negation_exceptions(mut self, terms: &[&str]) -> Self {
        self.negation_exceptions = Some(TermSet::new(terms, true));
        self
    }

    fn negation_reopened(&self, text: &str, end: usize) -> bool {
        let Some(exceptions) = &self.negation_exceptions else {
            return false;
        };
        let mut limit = (end + NEGATION_EXCEPTION_WINDOW).min(text.len());
        while !text.is_char_boundary(limit) {
            limit -= 1;
        }
        exceptions.is_match(&text[end..limit])
    }

    pub fn detect(&self, normalized: &str) -> DetectionResult<bool> {
        if self
            .exclusions
            .as_ref()
            .is_some_and(|ex| ex.is_match(normalized))
        {
            return DetectionResult::not_detected().with_meta("excluded", true);
        }

        if let Some((start, term)) = self.negations.find(normalized) {
            if !self.negation_reopened(normalized, start + term.len()) {
                return DetectionResult::negative(self.negation_confidence, term)
                    .with_meta("concept", self.concept);
            }
        }

        for group in &self.groups {
            if let Some((_, term)) = group.find(normalized) {
                return DetectionResult::found(
                    true,
                    self.base_confidence * group.multiplier,
                    term,
                    group.source,
                )
                .with_meta("category", group.name)
                .with_meta("concept", self.concept);
            }
        }

        DetectionResult::not_detected()
    }
}

/// Multi-class concept where the first class with any matching group wins.
pub struct ClassVocabulary<T> {
    pub classes: Vec<(T, f64, Vec<TermGroup>)>,
}

impl<T: Copy> ClassVocabulary<T> {
    pub fn detect(&self, normalized: &str) -> DetectionResult<T> {
        for (value, base, groups) in &self.classes {
            for group in groups {
                if let Some((_, term)) = group.find(normalized) {
                    return DetectionResult::found(*value, base * group.multiplier, term, group.source)
                        .with_meta("category", group.name);
                }
            }
        }
        DetectionResult::not_detected()
    }
}

/// Multi-class concept scored by match count. Classes are listed in
/// tie-break priority order: on equal counts the earlier class wins.
pub struct CountVocabulary<T> {
    pub classes: Vec<(T, f64, TermSet)>,
}

impl<T: Copy> CountVocabulary<T> {
    pub fn detect(&self, normalized: &str) -> DetectionResult<T> {
        let mut best: Option<(usize, &(T, f64, TermSet), Vec<&str>)> = None;

        for class in &self.classes {
            let mut matched: Vec<&str> = class
                .2
                .find_all(normalized)
                .into_iter()
                .filter(|(pos, _)| !is_negated_at(normalized, *pos))
                .map(|(_, t)| t)
                .collect();
            matched.sort_unstable();
            matched.dedup();
            let count = matched.len();
            if count == 0 {
                continue;
            }
            if best.as_ref().map_or(true, |(c, _, _)| count > *c) {
                best = Some((count, class, matched));
            }
        }

        match best {
            Some((count, (value, base, _), matched)) => {
                let term = matched.first().copied().unwrap_or_default();
                DetectionResult::found(*value, *base, term, DetectionSource::Keyword)
                    .with_meta("match_count", count)
                    .with_meta("matched_terms", matched)
            }
            None => DetectionResult::not_detected(),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Aggregate
// ═══════════════════════════════════════════════════════════

/// All vocabulary detector outputs for one text.
#[derive(Debug, Clone)]
pub struct VocabularyDetections {
    pub onset: DetectionResult<Onset>,
    pub fever: DetectionResult<bool>,
    pub meningeal: DetectionResult<bool>,
    pub htic: DetectionResult<bool>,
    pub trauma: DetectionResult<bool>,
    pub neuro_deficit: DetectionResult<bool>,
    pub seizure: DetectionResult<bool>,
    pub pregnancy: DetectionResult<bool>,
    pub immunosuppression: DetectionResult<bool>,
    pub cancer_history: DetectionResult<bool>,
    pub vertigo: DetectionResult<bool>,
    pub tinnitus: DetectionResult<bool>,
    pub joint_pain: DetectionResult<bool>,
    pub horton: DetectionResult<bool>,
    pub pattern_change: DetectionResult<bool>,
    pub visual: DetectionResult<VisualDisturbance>,
    pub location: DetectionResult<HeadacheLocation>,
    pub headache_profile: DetectionResult<HeadacheProfile>,
}

/// Run every detector on already-normalized text.
pub fn detect_all(normalized: &str) -> VocabularyDetections {
    VocabularyDetections {
        onset: detect_onset(normalized),
        fever: detect_fever(normalized),
        meningeal: detect_meningeal(normalized),
        htic: detect_htic(normalized),
        trauma: detect_trauma(normalized),
        neuro_deficit: detect_neuro_deficit(normalized),
        seizure: detect_seizure(normalized),
        pregnancy: detect_pregnancy(normalized),
        immunosuppression: detect_immunosuppression(normalized),
        cancer_history: detect_cancer_history(normalized),
        vertigo: detect_vertigo(normalized),
        tinnitus: detect_tinnitus(normalized),
        joint_pain: detect_joint_pain(normalized),
        horton: detect_horton(normalized),
        pattern_change: detect_pattern_change(normalized),
        visual: detect_visual_disturbance(normalized),
        location: detect_location(normalized),
        headache_profile: detect_headache_profile(normalized),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reliability_thresholds() {
        let weak = DetectionResult::found(true, 0.59, "x", DetectionSource::Keyword);
        let ok = DetectionResult::found(true, 0.60, "x", DetectionSource::Keyword);
        let high = DetectionResult::found(true, 0.85, "x", DetectionSource::Keyword);
        assert!(!weak.is_reliable());
        assert!(ok.is_reliable());
        assert!(!ok.is_high_confidence());
        assert!(high.is_high_confidence());
    }

    #[test]
    fn not_detected_carries_no_value() {
        let r: DetectionResult<bool> = DetectionResult::not_detected();
        assert!(!r.detected);
        assert_eq!(r.detected_value(), None);
        assert!(!r.is_reliable());
    }

    #[test]
    fn confirmed_negative_is_detected_false() {
        let r = DetectionResult::negative(0.85, "apyretique");
        assert!(r.detected);
        assert_eq!(r.value, Some(false));
        assert_eq!(r.source, Some(DetectionSource::NegationKeyword));
    }

    #[test]
    fn term_set_respects_left_boundary() {
        let set = TermSet::new(&["fébrile"], false);
        assert!(set.find("patient febrile").is_some());
        assert!(set.find("patient afebrile").is_none());
    }

    #[test]
    fn short_terms_need_right_boundary() {
        let set = TermSet::new(&["pl"], false);
        assert!(set.find("pl hier").is_some());
        assert!(set.find("plusieurs").is_none());
    }

    #[test]
    fn negation_prefix_guard() {
        assert!(is_negated_at("pas de raideur", 7));
        assert!(is_negated_at("sans raideur", 5));
        assert!(!is_negated_at("raideur", 0));
        assert!(!is_negated_at("casans raideur", 7));
        assert!(is_negated_at("pas d'antecedent de cancer", 20));
    }

    #[test]
    fn unnegated_search_skips_negated_occurrence() {
        let set = TermSet::new(&["raideur"], false);
        let text = "pas de raideur hier, raideur ce matin";
        let (pos, _) = set.find_unnegated(text).unwrap();
        assert!(pos > 10);
    }
}
