//! Hybrid orchestrator: fuzzy correction, lexical rules, phrase and
//! keyword layers, explicit negations, then semantic voting when the
//! result is still weak.
//!
//! Layer precedence on a single field, strongest first:
//! negations, n-grams, rules/vocabulary, keywords, embedding.
//! Every later layer only fills unset fields, except that n-grams may
//! replace onset/headache profile and negations may turn a value to
//! `false`. A field once detected is therefore never lost.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::embedding::{
    should_use_embedding, Corpus, EmbeddingEnhancer, EnhancementDetails, EnhancerSettings,
    HashingEmbedder,
};
use super::fuzzy::{FuzzyCorrectionMatch, FuzzyCorrector};
use super::keywords::{detect_keywords, KeywordMatch};
use super::negation::{detect_negations, NegationMatch};
use super::ngrams::{detect_ngrams, may_override, NgramMatch};
use super::normalize::normalize;
use super::rules_nlu::{parse_rules_only, RulesMetadata};
use super::vocabulary::DetectionSource;
use crate::config::TriageConfig;
use crate::models::{CaseField, FieldValue, HeadacheCase};

/// A value written to the case by one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedMatch {
    pub field: CaseField,
    pub value: FieldValue,
    /// Keyword, phrase or negation text that produced it.
    pub origin: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrode: Option<FieldValue>,
}

/// Which extraction path produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NluMethod {
    Rules,
    Embedding,
    Hybrid,
}

impl NluMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rules => "rules",
            Self::Embedding => "embedding",
            Self::Hybrid => "hybrid",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NluMetadata {
    pub hybrid_mode: String,
    pub embedding_used: bool,
    pub original_text: String,
    pub corrected_text: String,
    pub fuzzy_corrections: Vec<FuzzyCorrectionMatch>,
    pub keywords_detected: Vec<KeywordMatch>,
    pub keywords_applied: Vec<AppliedMatch>,
    pub ngrams_detected: Vec<NgramMatch>,
    pub ngrams_applied: Vec<AppliedMatch>,
    pub negations_detected: Vec<NegationMatch>,
    pub negations_applied: Vec<AppliedMatch>,
    /// Keyword values that disagreed with an existing value and were dropped.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keyword_conflicts: Vec<AppliedMatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhancement_details: Option<EnhancementDetails>,
    /// Aggregate confidence before the semantic fallback.
    pub rules_confidence: f64,
    pub rules: RulesMetadata,
    pub processing_ms: f64,
}

impl NluMetadata {
    pub fn overall_confidence(&self) -> f64 {
        self.rules.overall_confidence
    }

    pub fn detected_fields(&self) -> &[CaseField] {
        &self.rules.detected_fields
    }

    pub fn method(&self) -> NluMethod {
        let enriched = self
            .enhancement_details
            .as_ref()
            .map_or(0, |d| d.enriched_fields.len());
        match (self.embedding_used, enriched) {
            (false, _) | (true, 0) => NluMethod::Rules,
            (true, n) if n == self.rules.detected_fields.len() => NluMethod::Embedding,
            _ => NluMethod::Hybrid,
        }
    }
}

pub struct HybridNlu {
    corrector: FuzzyCorrector,
    enhancer: Option<EmbeddingEnhancer>,
    confidence_threshold: f64,
    keyword_min_weight: f64,
    ngram_override_min_confidence: f64,
}

impl HybridNlu {
    /// Full pipeline. The semantic fallback uses the built-in corpus and
    /// the hashing embedder; if either fails the pipeline stays rules-only.
    pub fn new(config: &TriageConfig) -> Self {
        let nlu = Self::rules_only(config);
        if !config.enable_embedding {
            return nlu;
        }
        let enhancer = Corpus::builtin().and_then(|corpus| {
            EmbeddingEnhancer::new(
                Box::new(HashingEmbedder::new()),
                corpus,
                EnhancerSettings::from(config),
            )
        });
        match enhancer {
            Ok(enhancer) => nlu.with_enhancer(enhancer),
            Err(e) => {
                tracing::warn!(error = %e, "Embedding fallback unavailable, running rules-only");
                nlu
            }
        }
    }

    /// Pipeline without the semantic fallback.
    pub fn rules_only(config: &TriageConfig) -> Self {
        Self {
            corrector: FuzzyCorrector {
                threshold: config.fuzzy_threshold,
                min_word_len: config.fuzzy_min_word_len,
                max_len_diff: config.fuzzy_max_len_diff,
            },
            enhancer: None,
            confidence_threshold: config.embedding_confidence_threshold,
            keyword_min_weight: config.keyword_min_weight,
            ngram_override_min_confidence: config.ngram_override_min_confidence,
        }
    }

    pub fn with_enhancer(mut self, enhancer: EmbeddingEnhancer) -> Self {
        self.enhancer = Some(enhancer);
        self
    }

    pub fn has_embedding(&self) -> bool {
        self.enhancer.is_some()
    }

    pub fn parse(&self, text: &str) -> (HeadacheCase, NluMetadata) {
        let started = Instant::now();
        let text_len = text.chars().count();

        // Typos first, so every lexical layer sees the repaired text
        let correction = self.corrector.correct(text);
        let working = correction.corrected_text.as_str();
        let normalized = normalize(working);

        let ngrams = detect_ngrams(&normalized);
        let keywords = detect_keywords(&normalized);
        let negations = detect_negations(&normalized);

        let (mut case, mut meta) = parse_rules_only(working);
        if !correction.corrections.is_empty() {
            let (raw_case, raw_meta) = parse_rules_only(text);
            merge_missing(&mut case, &mut meta, &raw_case, &raw_meta);
        }

        let ngrams_applied = apply_ngrams(
            &mut case,
            &mut meta,
            &ngrams,
            self.ngram_override_min_confidence,
        );
        let (keywords_applied, keyword_conflicts) =
            apply_keywords(&mut case, &mut meta, &keywords, self.keyword_min_weight);
        let negations_applied = apply_negations(&mut case, &mut meta, &negations.negations);

        meta.refresh_confidence(text_len);
        let rules_confidence = meta.overall_confidence;

        let mut enhancement_details = None;
        if let Some(enhancer) = &self.enhancer {
            if should_use_embedding(&meta, self.confidence_threshold) {
                match enhancer.enhance(&negations.cleaned_text, &mut case, &mut meta) {
                    Ok(details) => {
                        meta.refresh_confidence(text_len);
                        enhancement_details = Some(details);
                    }
                    Err(e) => tracing::warn!(error = %e, "Embedding enhancement failed"),
                }
            }
        }
        let embedding_used = enhancement_details.is_some();

        let mut modes = Vec::new();
        if !correction.corrections.is_empty() {
            modes.push("fuzzy");
        }
        modes.push("rules");
        if !ngrams.is_empty() {
            modes.push("ngrams");
        }
        if !keywords.is_empty() {
            modes.push("keywords");
        }
        if !negations.negations.is_empty() {
            modes.push("negations");
        }
        if embedding_used {
            modes.push("embedding");
        }

        let processing_ms = started.elapsed().as_secs_f64() * 1000.0;
        let metadata = NluMetadata {
            hybrid_mode: modes.join("+"),
            embedding_used,
            original_text: text.to_string(),
            corrected_text: correction.corrected_text.clone(),
            fuzzy_corrections: correction.corrections,
            keywords_detected: keywords,
            keywords_applied,
            ngrams_detected: ngrams,
            ngrams_applied,
            negations_detected: negations.negations,
            negations_applied,
            keyword_conflicts,
            enhancement_details,
            rules_confidence,
            rules: meta,
            processing_ms,
        };

        tracing::info!(
            mode = %metadata.hybrid_mode,
            fields = metadata.rules.detected_fields.len(),
            confidence = metadata.rules.overall_confidence,
            corrections = metadata.fuzzy_corrections.len(),
            elapsed_ms = processing_ms,
            "NLU parse complete"
        );

        (case, metadata)
    }
}

/// Copy fields found in the uncorrected text that the corrected pass lost.
fn merge_missing(
    case: &mut HeadacheCase,
    meta: &mut RulesMetadata,
    raw_case: &HeadacheCase,
    raw_meta: &RulesMetadata,
) {
    for field in raw_case.detected_fields() {
        if case.is_set(field) {
            continue;
        }
        let Some(value) = raw_case.get(field) else {
            continue;
        };
        if case.set(field, &value).is_ok() {
            let trace = raw_meta.detection_trace.get(&field);
            meta.note(
                field,
                raw_meta.confidence_scores.get(&field).copied().unwrap_or(0.5),
                trace.and_then(|t| t.matched_term.as_deref()),
                trace
                    .and_then(|t| t.source)
                    .unwrap_or(DetectionSource::Pattern),
            );
        }
    }
}

/// Phrases fill unset fields and may replace onset/headache profile.
pub fn apply_ngrams(
    case: &mut HeadacheCase,
    meta: &mut RulesMetadata,
    matches: &[NgramMatch],
    override_min_confidence: f64,
) -> Vec<AppliedMatch> {
    let mut applied = Vec::new();
    for m in matches {
        let current = case.get(m.field);
        let allowed = match &current {
            None => true,
            Some(v) if *v == m.value => false,
            Some(_) => may_override(m.field, m.confidence, override_min_confidence),
        };
        if !allowed || case.set(m.field, &m.value).is_err() {
            continue;
        }
        meta.note(
            m.field,
            m.confidence,
            Some(m.pattern.as_str()),
            DetectionSource::Pattern,
        );
        applied.push(AppliedMatch {
            field: m.field,
            value: m.value.clone(),
            origin: m.pattern.clone(),
            confidence: m.confidence,
            overrode: current,
        });
    }
    applied
}

/// Keywords above `min_weight` fill unset fields only. Disagreements with
/// an existing value are returned separately.
pub fn apply_keywords(
    case: &mut HeadacheCase,
    meta: &mut RulesMetadata,
    matches: &[KeywordMatch],
    min_weight: f64,
) -> (Vec<AppliedMatch>, Vec<AppliedMatch>) {
    let mut applied = Vec::new();
    let mut conflicts = Vec::new();
    for m in matches.iter().filter(|m| m.weight >= min_weight) {
        let record = AppliedMatch {
            field: m.field,
            value: m.value.clone(),
            origin: m.keyword.clone(),
            confidence: m.weight,
            overrode: None,
        };
        match case.get(m.field) {
            Some(current) if current != m.value => conflicts.push(record),
            Some(_) => {}
            None => {
                if case.set(m.field, &m.value).is_ok() {
                    meta.note(
                        m.field,
                        m.weight,
                        Some(m.keyword.as_str()),
                        DetectionSource::Keyword,
                    );
                    applied.push(record);
                }
            }
        }
    }
    (applied, conflicts)
}

/// Explicit negations set `false`, replacing any positive value.
pub fn apply_negations(
    case: &mut HeadacheCase,
    meta: &mut RulesMetadata,
    negations: &[NegationMatch],
) -> Vec<AppliedMatch> {
    let negative = FieldValue::Bool(false);
    let mut applied = Vec::new();
    for n in negations {
        let current = case.get(n.field);
        if current.as_ref() == Some(&negative) || case.set(n.field, &negative).is_err() {
            continue;
        }
        meta.note(
            n.field,
            n.confidence,
            Some(n.term.as_str()),
            DetectionSource::NegationKeyword,
        );
        applied.push(AppliedMatch {
            field: n.field,
            value: negative.clone(),
            origin: n.term.clone(),
            confidence: n.confidence,
            overrode: current,
        });
    }
    applied
}
