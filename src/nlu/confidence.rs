//! Aggregate confidence of a rules-based extraction. It gates the
//! fallback to semantic matching.
//!
//! `overall = 0.45 * weighted_mean + 0.25 * essential_coverage
//!          + 0.15 * completeness + 0.15 * red_flag_clarity`

use std::collections::BTreeMap;

use crate::models::CaseField;

const DEFAULT_FIELD_WEIGHT: f64 = 0.5;

/// Clinical importance of each field in the weighted mean.
pub fn field_weight(field: CaseField) -> f64 {
    use CaseField as F;
    match field {
        F::Onset | F::MeningealSigns | F::NeuroDeficit => 2.0,
        F::HticPattern => 1.8,
        F::Fever | F::Seizure => 1.5,
        F::Trauma | F::PregnancyPostpartum | F::Immunosuppression => 1.3,
        F::Age | F::Profile => 1.0,
        F::Duration | F::CancerHistory | F::HortonCriteria => 0.8,
        F::Intensity => 0.7,
        F::HeadacheProfile => 0.5,
        F::HeadacheLocation | F::Vertigo => 0.4,
        F::Sex | F::Tinnitus => 0.3,
        _ => DEFAULT_FIELD_WEIGHT,
    }
}

/// Fields a usable case needs.
pub const ESSENTIAL_FIELDS: &[CaseField] = &[CaseField::Onset, CaseField::Age, CaseField::Profile];

/// Red flags whose explicit presence or absence clarifies the case.
pub const CRITICAL_RED_FLAGS: &[CaseField] = &[
    CaseField::Fever,
    CaseField::MeningealSigns,
    CaseField::NeuroDeficit,
    CaseField::Seizure,
    CaseField::HticPattern,
];

/// Score in [0, 1]. `text_len` is the input length in characters; longer
/// texts are expected to yield more fields.
pub fn overall_confidence(
    scores: &BTreeMap<CaseField, f64>,
    detected: &[CaseField],
    text_len: usize,
) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }

    let (weighted_sum, weight_total) = scores.iter().fold((0.0, 0.0), |(sum, total), (f, c)| {
        let w = field_weight(*f);
        (sum + c * w, total + w)
    });
    let weighted_mean = if weight_total > 0.0 {
        weighted_sum / weight_total
    } else {
        0.0
    };

    let share = |set: &[CaseField]| {
        set.iter().filter(|f| detected.contains(f)).count() as f64 / set.len() as f64
    };
    let coverage = share(ESSENTIAL_FIELDS);
    let red_flag_clarity = share(CRITICAL_RED_FLAGS);

    let expected = (3 + text_len / 50).min(10) as f64;
    let meaningful = detected.iter().filter(|f| **f != CaseField::Sex).count() as f64;
    let completeness = (meaningful / expected).min(1.0);

    let overall = weighted_mean * 0.45
        + coverage * 0.25
        + completeness * 0.15
        + red_flag_clarity * 0.15;
    overall.clamp(0.0, 1.0)
}
