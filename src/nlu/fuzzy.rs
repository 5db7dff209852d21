//! Typo repair for critical medical terms.
//!
//! Each token is compared to a fixed dictionary with Levenshtein distance;
//! a token is replaced only when `1 - distance / max_len` reaches the
//! threshold and the token is not already a known spelling. The corrected
//! token keeps the original capitalization pattern.

use std::collections::HashSet;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use super::keywords::is_indexed_keyword;

pub const DEFAULT_THRESHOLD: f64 = 0.80;
pub const DEFAULT_MIN_WORD_LEN: usize = 4;
pub const DEFAULT_MAX_LEN_DIFF: usize = 3;

/// Canonical spellings the corrector may restore. Lowercase, accented.
const CRITICAL_MEDICAL_TERMS: &[&str] = &[
    // onset
    "brutale", "brutal", "soudaine", "soudain", "foudroyante", "explosive",
    "progressive", "progressif", "tonnerre", "chronique", "quotidienne",
    // fever
    "fièvre", "fébrile", "hyperthermie", "apyrétique", "température",
    // meningeal
    "méningé", "méningée", "méningés", "méningite", "raideur", "nuque",
    "photophobie", "phonophobie",
    // neurological deficit
    "déficit", "paralysie", "hémiplégie", "hémiparésie", "parésie", "aphasie",
    "dysarthrie", "diplopie", "confusion", "engourdissement",
    // intracranial hypertension
    "vomissements", "vomissement", "nausées", "papillaire", "œdème", "oedème",
    // trauma
    "traumatisme", "traumatique", "accident",
    // seizure
    "convulsions", "convulsion", "épilepsie", "épileptique", "comitiale",
    // pregnancy
    "enceinte", "grossesse", "accouchement", "post-partum", "trimestre",
    // immunosuppression and oncology
    "immunodéprimé", "immunodéprimée", "immunosuppression", "chimiothérapie",
    "corticothérapie", "métastases", "cancer",
    // anticoagulation
    "anticoagulant", "anticoagulants", "anticoagulé", "warfarine", "héparine",
    // profile
    "pulsatile", "lancinante", "unilatérale", "bilatérale", "migraine",
    "migraineux", "migraineuse", "céphalée", "céphalées",
    // neuralgia
    "névralgie", "trijumeau", "décharge", "électrique",
    // ENT, vision, vascular
    "vertiges", "vertige", "acouphènes", "scotome", "horton", "temporale",
    "occipitale", "frontale",
    // age
    "âgée", "octogénaire", "septuagénaire",
];

static TERM_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| CRITICAL_MEDICAL_TERMS.iter().copied().collect());

/// One replacement, with byte offsets into the original text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzyCorrectionMatch {
    pub original: String,
    pub corrected: String,
    pub similarity: f64,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzyCorrection {
    pub corrected_text: String,
    pub corrections: Vec<FuzzyCorrectionMatch>,
}

#[derive(Debug, Clone)]
pub struct FuzzyCorrector {
    pub threshold: f64,
    pub min_word_len: usize,
    pub max_len_diff: usize,
}

impl Default for FuzzyCorrector {
    fn default() -> Self {
        Self::new()
    }
}

impl FuzzyCorrector {
    pub fn new() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            min_word_len: DEFAULT_MIN_WORD_LEN,
            max_len_diff: DEFAULT_MAX_LEN_DIFF,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Correct every token of `text`. Separators are copied through untouched.
    pub fn correct(&self, text: &str) -> FuzzyCorrection {
        let mut corrected_text = String::with_capacity(text.len());
        let mut corrections = Vec::new();
        let mut word_start: Option<usize> = None;

        let mut flush = |start: usize, end: usize, out: &mut String| {
            let word = &text[start..end];
            match self.try_correct_word(word) {
                Some((replacement, similarity)) => {
                    corrections.push(FuzzyCorrectionMatch {
                        original: word.to_string(),
                        corrected: replacement.clone(),
                        similarity,
                        start,
                        end,
                    });
                    out.push_str(&replacement);
                }
                None => out.push_str(word),
            }
        };

        for (idx, ch) in text.char_indices() {
            if ch.is_alphanumeric() || ch == '-' {
                word_start.get_or_insert(idx);
            } else {
                if let Some(start) = word_start.take() {
                    flush(start, idx, &mut corrected_text);
                }
                corrected_text.push(ch);
            }
        }
        if let Some(start) = word_start {
            flush(start, text.len(), &mut corrected_text);
        }

        FuzzyCorrection {
            corrected_text,
            corrections,
        }
    }

    fn is_known(lower: &str) -> bool {
        if TERM_SET.contains(lower) || is_indexed_keyword(lower) {
            return true;
        }
        // Plural of a known term
        lower
            .strip_suffix('s')
            .or_else(|| lower.strip_suffix('x'))
            .is_some_and(|stem| TERM_SET.contains(stem) || is_indexed_keyword(stem))
    }

    /// Best unambiguous dictionary match at or above the threshold.
    fn try_correct_word(&self, word: &str) -> Option<(String, f64)> {
        let len = word.chars().count();
        if len < self.min_word_len || word.chars().any(|c| c.is_ascii_digit()) {
            return None;
        }

        let lower = word.to_lowercase();
        if Self::is_known(&lower) {
            return None;
        }

        let mut best: Option<(&str, f64)> = None;
        let mut ambiguous = false;

        for &term in CRITICAL_MEDICAL_TERMS {
            if term.chars().count().abs_diff(len) > self.max_len_diff {
                continue;
            }
            let sim = similarity_ratio(&lower, term);
            if sim < self.threshold {
                continue;
            }
            match best {
                Some((_, best_sim)) if sim < best_sim => {}
                Some((best_term, best_sim)) if sim == best_sim => {
                    if best_term != term {
                        ambiguous = true;
                    }
                }
                _ => {
                    best = Some((term, sim));
                    ambiguous = false;
                }
            }
        }

        match best {
            Some((term, sim)) if !ambiguous => Some((preserve_case(word, term), sim)),
            _ => None,
        }
    }
}

/// Preserve the original word's capitalization pattern when applying correction.
fn preserve_case(original: &str, correction: &str) -> String {
    if original.chars().all(|c| c.is_uppercase() || !c.is_alphabetic()) {
        return correction.to_uppercase();
    }

    let first_upper = original.chars().next().is_some_and(|c| c.is_uppercase());
    if first_upper {
        let mut chars = correction.chars();
        match chars.next() {
            Some(c) => {
                let mut s = c.to_uppercase().to_string();
                s.extend(chars);
                s
            }
            None => correction.to_string(),
        }
    } else {
        correction.to_string()
    }
}

/// Levenshtein distance over chars (insert, delete, substitute at unit cost).
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let n = b_chars.len();

    if a_chars.is_empty() {
        return n;
    }
    if n == 0 {
        return a_chars.len();
    }

    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr = vec![0usize; n + 1];

    for (i, &a_ch) in a_chars.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &b_ch) in b_chars.iter().enumerate() {
            let cost = usize::from(a_ch != b_ch);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

/// `1 - distance / max(len)`; two empty strings are identical.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / max_len as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levenshtein_accent_is_one_edit() {
        assert_eq!(levenshtein("fievre", "fièvre"), 1);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
    }

    #[test]
    fn similarity_identical_is_one() {
        assert_eq!(similarity_ratio("brutale", "brutale"), 1.0);
        assert!((similarity_ratio("fievre", "fièvre") - 5.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn corrects_missing_accent() {
        let result = FuzzyCorrector::new().correct("Patient avec fievre");
        assert_eq!(result.corrected_text, "Patient avec fièvre");
        assert_eq!(result.corrections.len(), 1);
        let m = &result.corrections[0];
        assert_eq!(m.original, "fievre");
        assert_eq!(m.corrected, "fièvre");
        assert_eq!((m.start, m.end), (13, 19));
    }

    #[test]
    fn already_correct_text_untouched() {
        let result = FuzzyCorrector::new().correct("Patient avec fièvre");
        assert!(result.corrections.is_empty(), "got {:?}", result.corrections);
        assert_eq!(result.corrected_text, "Patient avec fièvre");
    }

    #[test]
    fn all_caps_preserved() {
        let result = FuzzyCorrector::new().correct("FIEVRE");
        assert_eq!(result.corrected_text, "FIÈVRE");
    }

    #[test]
    fn lowercase_preserved() {
        let result = FuzzyCorrector::new().correct("fievre");
        assert_eq!(result.corrected_text, "fièvre");
    }

    #[test]
    fn capitalized_preserved() {
        let result = FuzzyCorrector::new().correct("Cephalée brutale");
        assert_eq!(result.corrected_text, "Céphalée brutale");
    }

    #[test]
    fn short_words_skipped() {
        let result = FuzzyCorrector::new().correct("il a mal");
        assert!(result.corrections.is_empty());
    }

    #[test]
    fn correct_accented_terms_never_rewritten() {
        let text = "Céphalée brutale, raideur méningée, vomissements, photophobie";
        let result = FuzzyCorrector::new().correct(text);
        assert!(result.corrections.is_empty(), "got {:?}", result.corrections);
    }

    #[test]
    fn plural_of_known_term_untouched() {
        let result = FuzzyCorrector::new().correct("céphalées migraines");
        assert!(result.corrections.is_empty());
    }

    #[test]
    fn mixed_text_keeps_punctuation() {
        let result = FuzzyCorrector::new().correct("Nuque raide, febrile!");
        assert_eq!(result.corrected_text, "Nuque raide, fébrile!");
    }

    #[test]
    fn stricter_threshold_blocks_correction() {
        let result = FuzzyCorrector::new().with_threshold(0.9).correct("fievre");
        assert!(result.corrections.is_empty());
    }
}
