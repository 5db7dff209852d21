//! Top-k similarity voting over the annotated corpus. Votes only fill
//! fields the rules left unset; a rule-detected value is never replaced.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::corpus::{Corpus, CorpusExample};
use super::{cosine_similarity, EmbeddingError, EmbeddingModel};
use crate::config::TriageConfig;
use crate::models::{CaseField, FieldValue, HeadacheCase};
use crate::nlu::normalize::fold_accents;
use crate::nlu::rules_nlu::RulesMetadata;
use crate::nlu::vocabulary::DetectionSource;

/// Fields the corpus may vote on.
pub const ENRICHABLE_FIELDS: &[CaseField] = &[
    CaseField::Onset,
    CaseField::Fever,
    CaseField::MeningealSigns,
    CaseField::HticPattern,
    CaseField::NeuroDeficit,
    CaseField::Trauma,
    CaseField::Seizure,
    CaseField::PregnancyPostpartum,
    CaseField::Immunosuppression,
    CaseField::HeadacheProfile,
];

/// When two or more of these are missing the fallback runs regardless of
/// the aggregate confidence.
const CRITICAL_FIELDS: &[CaseField] = &[
    CaseField::Onset,
    CaseField::Fever,
    CaseField::MeningealSigns,
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnhancerSettings {
    pub top_k: usize,
    pub example_min_similarity: f32,
    pub pattern_min_similarity: f32,
    pub majority_ratio: f64,
    pub min_votes: usize,
}

impl Default for EnhancerSettings {
    fn default() -> Self {
        Self::from(&TriageConfig::default())
    }
}

impl From<&TriageConfig> for EnhancerSettings {
    fn from(config: &TriageConfig) -> Self {
        Self {
            top_k: config.embedding_top_k.max(1),
            example_min_similarity: config.embedding_example_min_similarity as f32,
            pattern_min_similarity: config.embedding_pattern_min_similarity as f32,
            majority_ratio: config.embedding_majority_ratio,
            min_votes: config.embedding_min_votes.max(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarExample {
    pub text: String,
    pub similarity: f32,
    pub source: String,
    pub fields: Vec<(CaseField, FieldValue)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedField {
    pub field: CaseField,
    pub value: FieldValue,
    /// Share of supporting votes among qualifying neighbours.
    pub vote_ratio: f64,
    pub support: usize,
    pub confidence: f64,
}

/// A vote that won but was not applied (confirmed-negative from similarity).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithheldVote {
    pub field: CaseField,
    pub value: FieldValue,
    pub support: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialPatternKind {
    Neuralgia,
    ChronicDailyHeadache,
}

/// Entity outside the case model that close neighbours point to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialPattern {
    pub kind: SpecialPatternKind,
    pub description: String,
    pub similarity: f32,
    pub imaging_recommendation: String,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnhancementDetails {
    pub top_matches: Vec<SimilarExample>,
    pub enriched_fields: Vec<EnrichedField>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub withheld_votes: Vec<WithheldVote>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub special_patterns: Vec<SpecialPattern>,
}

pub struct EmbeddingEnhancer {
    model: Box<dyn EmbeddingModel>,
    examples: Vec<CorpusExample>,
    vectors: Vec<Vec<f32>>,
    settings: EnhancerSettings,
}

impl EmbeddingEnhancer {
    /// Vectorize the corpus once. Fails if the model cannot embed it.
    pub fn new(
        model: Box<dyn EmbeddingModel>,
        corpus: Corpus,
        settings: EnhancerSettings,
    ) -> Result<Self, EmbeddingError> {
        if corpus.is_empty() {
            return Err(EmbeddingError::EmptyCorpus);
        }
        let texts: Vec<String> = corpus
            .examples
            .iter()
            .map(|e| preprocess_for_embedding(&e.text))
            .collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let vectors = model.embed_batch(&refs)?;

        tracing::info!(
            examples = corpus.examples.len(),
            dimension = model.dimension(),
            "Embedding corpus indexed"
        );

        Ok(Self {
            model,
            examples: corpus.examples,
            vectors,
            settings,
        })
    }

    pub fn settings(&self) -> &EnhancerSettings {
        &self.settings
    }

    pub fn corpus_size(&self) -> usize {
        self.examples.len()
    }

    /// The `k` nearest examples, most similar first.
    pub fn nearest(&self, text: &str, k: usize) -> Result<Vec<(usize, f32)>, EmbeddingError> {
        let query = self.model.embed(&preprocess_for_embedding(text))?;
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, cosine_similarity(v, &query)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored)
    }

    /// Vote on still-unset fields and write the winners into `case`,
    /// recording them in `meta` with an embedding source.
    pub fn enhance(
        &self,
        text: &str,
        case: &mut HeadacheCase,
        meta: &mut RulesMetadata,
    ) -> Result<EnhancementDetails, EmbeddingError> {
        let neighbours = self.nearest(text, self.settings.top_k)?;
        let mut details = EnhancementDetails {
            top_matches: neighbours
                .iter()
                .map(|(i, sim)| {
                    let ex = &self.examples[*i];
                    SimilarExample {
                        text: ex.text.clone(),
                        similarity: *sim,
                        source: ex.annotations.source.clone(),
                        fields: ex.fields.clone(),
                    }
                })
                .collect(),
            ..EnhancementDetails::default()
        };

        let qualifying: Vec<&CorpusExample> = neighbours
            .iter()
            .filter(|(_, sim)| *sim > self.settings.example_min_similarity)
            .map(|(i, _)| &self.examples[*i])
            .collect();
        let mean_similarity = if qualifying.is_empty() {
            0.0
        } else {
            neighbours
                .iter()
                .filter(|(_, sim)| *sim > self.settings.example_min_similarity)
                .map(|(_, sim)| f64::from(*sim))
                .sum::<f64>()
                / qualifying.len() as f64
        };

        for &field in ENRICHABLE_FIELDS {
            if case.is_set(field) || meta.is_detected(field) {
                continue;
            }
            let votes: Vec<&FieldValue> = qualifying.iter().filter_map(|e| e.value(field)).collect();
            let Some((value, support, ratio)) =
                majority_vote(&votes, self.settings.majority_ratio, self.settings.min_votes)
            else {
                continue;
            };

            // Similarity alone never confirms an absence
            if value == FieldValue::Bool(false) {
                details.withheld_votes.push(WithheldVote {
                    field,
                    value,
                    support,
                });
                continue;
            }

            if let Err(e) = case.set(field, &value) {
                tracing::debug!(field = %field, error = %e, "Corpus vote rejected");
                continue;
            }
            let confidence = (ratio * mean_similarity).clamp(0.0, 1.0);
            meta.note(field, confidence, None, DetectionSource::Embedding);
            details.enriched_fields.push(EnrichedField {
                field,
                value,
                vote_ratio: ratio,
                support,
                confidence,
            });
        }

        details.special_patterns = self.special_patterns(&neighbours);

        tracing::debug!(
            neighbours = details.top_matches.len(),
            enriched = details.enriched_fields.len(),
            special = details.special_patterns.len(),
            "Embedding enhancement complete"
        );
        Ok(details)
    }

    fn special_patterns(&self, neighbours: &[(usize, f32)]) -> Vec<SpecialPattern> {
        let mut found = Vec::new();
        for (i, sim) in neighbours {
            if *sim <= self.settings.pattern_min_similarity {
                continue;
            }
            let ex = &self.examples[*i];
            let source = fold_accents(&ex.annotations.source);

            if source.contains("nevralgie") || source.contains("neuropathie") {
                found.push(SpecialPattern {
                    kind: SpecialPatternKind::Neuralgia,
                    description: ex.annotations.source.clone(),
                    similarity: *sim,
                    imaging_recommendation: ex
                        .annotations
                        .imaging
                        .clone()
                        .unwrap_or_else(|| "irm_cerebrale".to_string()),
                    note: ex.annotations.note.clone(),
                });
            }
            if source.contains("ccq") || source.contains("chronique quotidienne") {
                found.push(SpecialPattern {
                    kind: SpecialPatternKind::ChronicDailyHeadache,
                    description: ex.annotations.source.clone(),
                    similarity: *sim,
                    imaging_recommendation: "irm_cerebrale".to_string(),
                    note: ex.annotations.note.clone(),
                });
            }
        }
        found
    }
}

/// Most frequent value with its support and share. `None` when there are
/// too few votes or no clear majority.
pub fn majority_vote(
    votes: &[&FieldValue],
    min_ratio: f64,
    min_votes: usize,
) -> Option<(FieldValue, usize, f64)> {
    if votes.len() < min_votes || votes.is_empty() {
        return None;
    }
    let mut tally: Vec<(&FieldValue, usize)> = Vec::new();
    for &vote in votes {
        match tally.iter().position(|(seen, _)| *seen == vote) {
            Some(idx) => tally[idx].1 += 1,
            None => tally.push((vote, 1)),
        }
    }
    // Strictly greater replaces, so the nearer neighbour wins ties
    let mut best = tally[0];
    for &(value, count) in &tally[1..] {
        if count > best.1 {
            best = (value, count);
        }
    }
    let (winner, count) = best;
    let ratio = count as f64 / votes.len() as f64;
    (ratio >= min_ratio).then(|| (winner.clone(), count, ratio))
}

/// Whether the rules result is weak enough to consult the corpus.
pub fn should_use_embedding(meta: &RulesMetadata, threshold: f64) -> bool {
    if meta.overall_confidence < threshold {
        return true;
    }
    let missing = CRITICAL_FIELDS
        .iter()
        .filter(|f| !meta.is_detected(**f))
        .count();
    missing >= 2
}

static TEMPORAL_SPANS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    const UNIT: &str = r"(?:minutes?|heures?|jours?|semaines?|mois|ans?)";
    [
        format!(r"depuis\s+(?:\d+[\s\-a]*\d*\s*)?(?:quelques?\s+)?{UNIT}"),
        format!(r"depuis\s+environ\s+\d+[\s\-a]*\d*\s*{UNIT}"),
        format!(r"il\s+y\s+a\s+(?:\d+[\s\-a]*\d*\s*)?(?:quelques?\s+)?{UNIT}"),
        format!(r"(?:^|,\s*)\d+[\s\-a]*\d*\s*{UNIT}"),
        format!(r"sur\s+(?:plusieurs|quelques)\s+{UNIT}"),
        r"depuis\s+(?:longtemps|des\s+(?:mois|annees?|semaines?|jours?))".to_string(),
        format!(r"(?:environ|a\s+peu\s+pres)\s+\d+\s*{UNIT}"),
        r"\b(?:ce\s+matin|hier\s*(?:soir|matin)?|avant[\s\-]hier|cette\s+nuit|aujourd'hui)\b"
            .to_string(),
        r"\bdepuis\s*$".to_string(),
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Strip durations and time anchors so similarity focuses on symptoms.
pub fn preprocess_for_embedding(text: &str) -> String {
    let mut result = fold_accents(text);
    for pattern in TEMPORAL_SPANS.iter() {
        result = pattern.replace_all(&result, "").into_owned();
    }
    let collapsed = result.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut cleaned = collapsed.replace(" ,", ",");
    while cleaned.contains(",,") || cleaned.contains(", ,") {
        cleaned = cleaned.replace(", ,", ",").replace(",,", ",");
    }
    cleaned
        .trim_matches(|c: char| c == ',' || c.is_whitespace())
        .to_string()
}
