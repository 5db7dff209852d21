//! Rules-only extraction: vocabulary detectors plus regex extractors,
//! merged into a [`HeadacheCase`] with per-field confidence and a trace of
//! which term produced each value.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::confidence::overall_confidence;
use super::extractors::{
    extract_age, extract_duration_hours, extract_intensity, extract_profile, extract_recent_pl,
    extract_sex, extract_trimester, infer_profile, HOURS_PER_QUARTER, HOURS_PER_WEEK,
};
use super::normalize::normalize;
use super::vocabulary::{detect_all, DetectionResult, DetectionSource};
use crate::models::{CaseField, FieldValue, HeadacheCase, HeadacheProfile, Onset, Profile};

/// Below this an HTIC detection is traced but not applied.
pub const HTIC_MIN_CONFIDENCE: f64 = 0.70;

const TENSION_FROM_ABSENT_SIGNS: f64 = 0.75;

/// Phrasings stating that migraine companions are absent.
const NO_ASSOCIATED_SIGNS: &[&str] = &[
    "sans n/v",
    "pas de n/v",
    "ø n/v",
    "ø photo",
    "ø phono",
    "aucun signe associe",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldTrace {
    pub matched_term: Option<String>,
    pub source: Option<DetectionSource>,
    pub confidence: f64,
}

/// Inconsistencies kept for audit. Never fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Contradiction {
    OnsetConflicting,
    FeverConflicting,
    DurationProfileMismatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulesMetadata {
    /// In detection order.
    pub detected_fields: Vec<CaseField>,
    pub confidence_scores: BTreeMap<CaseField, f64>,
    pub detection_trace: BTreeMap<CaseField, FieldTrace>,
    pub overall_confidence: f64,
    pub contradictions: Vec<Contradiction>,
    pub timestamp: DateTime<Utc>,
}

impl RulesMetadata {
    pub fn is_detected(&self, field: CaseField) -> bool {
        self.detected_fields.contains(&field)
    }

    /// Record a field detected by a later layer.
    pub fn note(
        &mut self,
        field: CaseField,
        confidence: f64,
        term: Option<&str>,
        source: DetectionSource,
    ) {
        if !self.is_detected(field) {
            self.detected_fields.push(field);
        }
        self.confidence_scores.insert(field, confidence);
        self.detection_trace.insert(
            field,
            FieldTrace {
                matched_term: term.map(str::to_string),
                source: Some(source),
                confidence,
            },
        );
    }

    /// Recompute the aggregate after later layers changed the fields.
    pub fn refresh_confidence(&mut self, text_len: usize) {
        self.overall_confidence =
            overall_confidence(&self.confidence_scores, &self.detected_fields, text_len);
    }
}

struct Extraction {
    case: HeadacheCase,
    meta: RulesMetadata,
}

impl Extraction {
    fn new() -> Self {
        Self {
            case: HeadacheCase::new(),
            meta: RulesMetadata {
                detected_fields: Vec::new(),
                confidence_scores: BTreeMap::new(),
                detection_trace: BTreeMap::new(),
                overall_confidence: 0.0,
                contradictions: Vec::new(),
                timestamp: Utc::now(),
            },
        }
    }

    fn apply(
        &mut self,
        field: CaseField,
        value: FieldValue,
        confidence: f64,
        term: Option<&str>,
        source: Option<DetectionSource>,
    ) {
        if let Err(e) = self.case.set(field, &value) {
            tracing::debug!(field = %field, error = %e, "Extracted value rejected");
            return;
        }
        self.meta
            .note(field, confidence, term, source.unwrap_or(DetectionSource::Pattern));
    }

    fn record<T>(
        &mut self,
        field: CaseField,
        result: &DetectionResult<T>,
        to_value: impl Fn(&T) -> FieldValue,
    ) {
        if let Some(value) = result.detected_value() {
            self.apply(
                field,
                to_value(value),
                result.confidence,
                result.matched_term.as_deref(),
                result.source,
            );
        }
    }

    /// Only confirmed-present values; absence is left unknown.
    fn record_positive(&mut self, field: CaseField, result: &DetectionResult<bool>) {
        if result.detected_value() == Some(&true) {
            self.record(field, result, |b| FieldValue::Bool(*b));
        }
    }
}

fn boolean(b: &bool) -> FieldValue {
    FieldValue::Bool(*b)
}

/// Parse raw clinical text with lexical rules only.
pub fn parse_rules_only(text: &str) -> (HeadacheCase, RulesMetadata) {
    let normalized = normalize(text);
    let mut x = Extraction::new();

    // Demographics
    x.record(CaseField::Age, &extract_age(&normalized), |a| {
        FieldValue::Int(*a as i64)
    });
    x.record(CaseField::Sex, &extract_sex(&normalized), |s| {
        FieldValue::text(s.as_str())
    });

    // Onset and temporal profile
    let vocab = detect_all(&normalized);
    x.record(CaseField::Onset, &vocab.onset, |o| FieldValue::text(o.as_str()));
    x.record(CaseField::Profile, &extract_profile(&normalized), |p| {
        FieldValue::text(p.as_str())
    });
    x.record(CaseField::Duration, &extract_duration_hours(&normalized), |h| {
        FieldValue::Float(*h)
    });
    x.record(CaseField::Intensity, &extract_intensity(&normalized), |i| {
        FieldValue::Int(*i as i64)
    });

    // Red flags
    x.record(CaseField::Fever, &vocab.fever, boolean);
    x.record(CaseField::MeningealSigns, &vocab.meningeal, boolean);
    if vocab.htic.detected_value() == Some(&true) {
        if vocab.htic.confidence >= HTIC_MIN_CONFIDENCE {
            x.record(CaseField::HticPattern, &vocab.htic, boolean);
        } else {
            tracing::debug!(
                confidence = vocab.htic.confidence,
                "HTIC signal below threshold, not applied"
            );
        }
    }
    x.record_positive(CaseField::NeuroDeficit, &vocab.neuro_deficit);
    x.record_positive(CaseField::Seizure, &vocab.seizure);

    // Risk contexts
    x.record(CaseField::PregnancyPostpartum, &vocab.pregnancy, boolean);
    if vocab.pregnancy.detected_value() == Some(&true) {
        x.record(CaseField::PregnancyTrimester, &extract_trimester(&normalized), |t| {
            FieldValue::Int(*t as i64)
        });
    }
    x.record(CaseField::Trauma, &vocab.trauma, boolean);
    x.record(CaseField::RecentPl, &extract_recent_pl(&normalized), boolean);
    x.record(CaseField::Immunosuppression, &vocab.immunosuppression, boolean);
    x.record(CaseField::RecentPatternChange, &vocab.pattern_change, boolean);
    x.record(CaseField::CancerHistory, &vocab.cancer_history, boolean);
    x.record(CaseField::Vertigo, &vocab.vertigo, boolean);
    x.record(CaseField::Tinnitus, &vocab.tinnitus, boolean);
    x.record(CaseField::VisualDisturbance, &vocab.visual, |v| {
        FieldValue::text(v.as_str())
    });
    x.record(CaseField::JointPain, &vocab.joint_pain, boolean);
    x.record(CaseField::HortonCriteria, &vocab.horton, boolean);
    x.record(CaseField::HeadacheLocation, &vocab.location, |l| {
        FieldValue::text(l.as_str())
    });

    // Headache characteristics
    x.record(CaseField::HeadacheProfile, &vocab.headache_profile, |h| {
        FieldValue::text(h.as_str())
    });
    if x.case.headache_profile == HeadacheProfile::Unknown {
        if let Some(marker) = NO_ASSOCIATED_SIGNS.iter().find(|m| normalized.contains(*m)) {
            x.apply(
                CaseField::HeadacheProfile,
                FieldValue::text(HeadacheProfile::TensionLike.as_str()),
                TENSION_FROM_ABSENT_SIGNS,
                Some(*marker),
                Some(DetectionSource::Pattern),
            );
        }
    }

    // Profile inferred from onset or duration
    if x.case.profile == Profile::Unknown {
        let inferred = infer_profile(
            x.case.onset,
            x.case.duration_current_episode_hours,
            &normalized,
        );
        if let Some((profile, confidence)) = inferred {
            x.apply(
                CaseField::Profile,
                FieldValue::text(profile.as_str()),
                confidence,
                Some("inferred"),
                Some(DetectionSource::Pattern),
            );
        }
    }

    x.meta.contradictions = find_contradictions(&x.case, &normalized);
    x.meta.refresh_confidence(text.chars().count());

    tracing::debug!(
        fields = x.meta.detected_fields.len(),
        confidence = x.meta.overall_confidence,
        contradictions = x.meta.contradictions.len(),
        "Rules extraction complete"
    );

    (x.case, x.meta)
}

fn find_contradictions(case: &HeadacheCase, normalized: &str) -> Vec<Contradiction> {
    let mut found = Vec::new();

    if matches!(case.onset, Onset::Thunderclap | Onset::Progressive)
        && normalized.contains("progressi")
        && normalized.contains("brutal")
    {
        found.push(Contradiction::OnsetConflicting);
    }

    if case.fever == Some(true)
        && ["apyretique", "apyrexie", "sans fievre"]
            .iter()
            .any(|w| normalized.contains(w))
    {
        found.push(Contradiction::FeverConflicting);
    }

    if let Some(hours) = case.duration_current_episode_hours {
        let mismatch = (hours < HOURS_PER_WEEK && case.profile == Profile::Chronic)
            || (hours >= HOURS_PER_QUARTER && case.profile == Profile::Acute);
        if mismatch {
            found.push(Contradiction::DurationProfileMismatch);
        }
    }

    found
}
