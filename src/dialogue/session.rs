//! Per-conversation state: the accumulated case, field confidences,
//! question bookkeeping and turn history.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{CaseField, FieldValue, HeadacheCase, ImagingRecommendation, Profile};
use crate::nlu::embedding::SpecialPattern;
use crate::nlu::extractors::infer_profile;
use crate::nlu::NluMetadata;

/// Confidence given to a direct answer to a question.
pub const ANSWER_CONFIDENCE: f64 = 1.0;
/// Used when a layer set a field without reporting a score.
const UNSCORED_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueState {
    Collecting,
    Sufficient,
    Emergency,
    Complete,
}

/// Why the dialogue stopped asking questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Emergency,
    CriteriaRatio,
    AbsoluteCriteria,
    ChronicStableNoUrgency,
    ChronicWithNewRedFlags,
    ChronicAggravatedNoRedFlags,
    NoMoreQuestions,
    InsufficientDescription,
}

impl EndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Emergency => "emergency",
            Self::CriteriaRatio => "criteria_ratio",
            Self::AbsoluteCriteria => "absolute_criteria",
            Self::ChronicStableNoUrgency => "chronic_stable_no_urgency",
            Self::ChronicWithNewRedFlags => "chronic_with_new_red_flags",
            Self::ChronicAggravatedNoRedFlags => "chronic_aggravated_no_red_flags",
            Self::NoMoreQuestions => "no_more_questions",
            Self::InsufficientDescription => "insufficient_description",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub user_text: String,
    pub asked_field: Option<CaseField>,
    pub detected: Vec<CaseField>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub case: HeadacheCase,
    pub confidence: BTreeMap<CaseField, f64>,
    pub asked_fields: Vec<CaseField>,
    /// Field of the question currently awaiting an answer.
    pub last_asked: Option<CaseField>,
    pub answered: Vec<CaseField>,
    pub history: Vec<Turn>,
    pub state: DialogueState,
    /// Set after the one request for a fuller description.
    pub awaiting_detail: bool,
    pub detail_requested: bool,
    pub special_patterns: Vec<SpecialPattern>,
    pub last_confidence: f64,
    pub recommendation: Option<ImagingRecommendation>,
    pub end_reason: Option<EndReason>,
}

impl Session {
    pub fn new(id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            updated_at: now,
            case: HeadacheCase::default(),
            confidence: BTreeMap::new(),
            asked_fields: Vec::new(),
            last_asked: None,
            answered: Vec::new(),
            history: Vec::new(),
            state: DialogueState::Collecting,
            awaiting_detail: false,
            detail_requested: false,
            special_patterns: Vec::new(),
            last_confidence: 0.0,
            recommendation: None,
            end_reason: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state == DialogueState::Complete
    }

    pub fn turn_count(&self) -> usize {
        self.history.len()
    }

    /// Merge one parse into the accumulated case. A field is written when
    /// it is unset or the new confidence is at least the stored one;
    /// red-flag contexts accumulate. Returns the fields written.
    pub fn merge_parse(&mut self, parsed: &HeadacheCase, meta: &NluMetadata) -> Vec<CaseField> {
        let mut written = Vec::new();
        for field in parsed.detected_fields() {
            let Some(value) = parsed.get(field) else {
                continue;
            };
            let confidence = meta
                .rules
                .confidence_scores
                .get(&field)
                .copied()
                .unwrap_or(UNSCORED_CONFIDENCE);
            if self.write(field, &value, confidence) {
                written.push(field);
            }
        }

        if let Some(details) = &meta.enhancement_details {
            for pattern in &details.special_patterns {
                if !self.special_patterns.iter().any(|p| p.kind == pattern.kind) {
                    self.special_patterns.push(pattern.clone());
                }
            }
        }
        self.last_confidence = meta.overall_confidence();
        written
    }

    /// Record a direct answer to a question.
    pub fn apply_answer(&mut self, field: CaseField, value: &FieldValue) -> bool {
        let written = self.write(field, value, ANSWER_CONFIDENCE);
        if written && !self.answered.contains(&field) {
            self.answered.push(field);
        }
        written
    }

    fn write(&mut self, field: CaseField, value: &FieldValue, confidence: f64) -> bool {
        if field == CaseField::RedFlagContext {
            let before = self.case.red_flag_context.len();
            if self.case.set(field, value).is_err() {
                return false;
            }
            return self.case.red_flag_context.len() > before;
        }

        let stored = self.confidence.get(&field).copied();
        let replaceable =
            !self.case.is_set(field) || stored.map_or(true, |old| confidence >= old);
        if !replaceable || self.case.get(field).as_ref() == Some(value) {
            if self.case.is_set(field) {
                self.raise_confidence(field, confidence);
            }
            return false;
        }

        match self.case.set(field, value) {
            Ok(()) => {
                self.confidence.insert(field, confidence);
                true
            }
            Err(err) => {
                tracing::debug!(field = field.as_str(), error = %err, "Merge value rejected");
                false
            }
        }
    }

    fn raise_confidence(&mut self, field: CaseField, confidence: f64) {
        let entry = self.confidence.entry(field).or_insert(confidence);
        if confidence > *entry {
            *entry = confidence;
        }
    }

    /// Fill the temporal profile from onset and duration when it is still
    /// unknown. Returns true when a profile was inferred.
    pub fn infer_missing_profile(&mut self) -> bool {
        if self.case.profile != Profile::Unknown {
            return false;
        }
        match infer_profile(
            self.case.onset,
            self.case.duration_current_episode_hours,
            "",
        ) {
            Some((profile, confidence)) => {
                self.case.profile = profile;
                self.confidence.insert(CaseField::Profile, confidence);
                true
            }
            None => false,
        }
    }

    pub fn record_turn(&mut self, user_text: &str, asked: Option<CaseField>, detected: Vec<CaseField>) {
        let now = Utc::now();
        self.history.push(Turn {
            user_text: user_text.to_string(),
            asked_field: asked,
            detected,
            at: now,
        });
        self.updated_at = now;
    }

    pub fn mark_asked(&mut self, field: CaseField) {
        if !self.asked_fields.contains(&field) {
            self.asked_fields.push(field);
        }
        self.last_asked = Some(field);
    }

    /// Back to an empty conversation, keeping the id.
    pub fn reset(&mut self) {
        let created_at = self.created_at;
        *self = Self::new(self.id);
        self.created_at = created_at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TriageConfig;
    use crate::models::Onset;
    use crate::nlu::HybridNlu;

    fn parse(text: &str) -> (HeadacheCase, NluMetadata) {
        HybridNlu::rules_only(&TriageConfig::default()).parse(text)
    }

    #[test]
    fn merge_fills_unset_fields() {
        let mut session = Session::new(Uuid::new_v4());
        let (case, meta) = parse("Femme de 45 ans avec fièvre");
        let written = session.merge_parse(&case, &meta);
        assert!(written.contains(&CaseField::Age));
        assert!(written.contains(&CaseField::Fever));
        assert_eq!(session.case.age, Some(45));
        assert_eq!(session.case.fever, Some(true));
    }

    #[test]
    fn answer_is_not_overwritten_by_weaker_parse() {
        let mut session = Session::new(Uuid::new_v4());
        assert!(session.apply_answer(CaseField::Fever, &FieldValue::Bool(false)));
        let (case, meta) = parse("un peu chaud, fébrile peut-être");
        session.merge_parse(&case, &meta);
        assert_eq!(session.case.fever, Some(false));
        assert_eq!(session.answered, vec![CaseField::Fever]);
    }

    #[test]
    fn stronger_value_replaces_weaker_one() {
        let mut session = Session::new(Uuid::new_v4());
        session.write(CaseField::Onset, &FieldValue::text("progressive"), 0.6);
        assert!(session.write(CaseField::Onset, &FieldValue::text("thunderclap"), 0.9));
        assert_eq!(session.case.onset, Onset::Thunderclap);
        assert!(!session.write(CaseField::Onset, &FieldValue::text("progressive"), 0.7));
        assert_eq!(session.confidence[&CaseField::Onset], 0.9);
    }

    #[test]
    fn red_flag_context_accumulates() {
        let mut session = Session::new(Uuid::new_v4());
        assert!(session.write(CaseField::RedFlagContext, &FieldValue::text("vih"), 0.8));
        assert!(session.write(CaseField::RedFlagContext, &FieldValue::text("cancer"), 0.8));
        assert!(!session.write(CaseField::RedFlagContext, &FieldValue::text("vih"), 0.8));
        assert_eq!(session.case.red_flag_context.len(), 2);
    }

    #[test]
    fn invalid_value_is_rejected() {
        let mut session = Session::new(Uuid::new_v4());
        assert!(!session.apply_answer(CaseField::Intensity, &FieldValue::Int(14)));
        assert!(session.case.intensity.is_none());
        assert!(session.answered.is_empty());
    }

    #[test]
    fn profile_is_inferred_from_onset() {
        let mut session = Session::new(Uuid::new_v4());
        session.case.onset = Onset::Thunderclap;
        assert!(session.infer_missing_profile());
        assert_eq!(session.case.profile, Profile::Acute);
        assert!(!session.infer_missing_profile());
    }

    #[test]
    fn reset_keeps_identity() {
        let id = Uuid::new_v4();
        let mut session = Session::new(id);
        session.apply_answer(CaseField::Fever, &FieldValue::Bool(true));
        session.mark_asked(CaseField::Fever);
        session.record_turn("oui", Some(CaseField::Fever), vec![CaseField::Fever]);
        session.reset();
        assert_eq!(session.id, id);
        assert!(session.case.fever.is_none());
        assert!(session.history.is_empty());
        assert!(session.asked_fields.is_empty());
        assert_eq!(session.state, DialogueState::Collecting);
    }
}
