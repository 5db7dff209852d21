//! Structured headache case: the typed record every NLU layer fills and
//! the rules engine consumes.
//!
//! Boolean clinical fields are `Option<bool>`: `None` means "not mentioned",
//! `Some(false)` is a confirmed negative. The two are never conflated.

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use super::enums::{
    str_enum, HeadacheLocation, HeadacheProfile, Onset, Profile, Sex, VisualDisturbance,
};
use super::error::ValidationError;

pub const MAX_AGE: i64 = 120;
pub const MAX_INTENSITY: i64 = 10;

str_enum!(CaseField {
    Age => "age",
    Sex => "sex",
    Profile => "profile",
    Onset => "onset",
    Duration => "duration_current_episode_hours",
    Intensity => "intensity",
    Fever => "fever",
    MeningealSigns => "meningeal_signs",
    NeuroDeficit => "neuro_deficit",
    Seizure => "seizure",
    HticPattern => "htic_pattern",
    PregnancyPostpartum => "pregnancy_postpartum",
    PregnancyTrimester => "pregnancy_trimester",
    Trauma => "trauma",
    RecentPl => "recent_pl_or_peridural",
    Immunosuppression => "immunosuppression",
    RecentPatternChange => "recent_pattern_change",
    CancerHistory => "cancer_history",
    Vertigo => "vertigo",
    Tinnitus => "tinnitus",
    JointPain => "joint_pain",
    HortonCriteria => "horton_criteria",
    Anticoagulation => "anticoagulation",
    NeuropathicPattern => "neuropathic_pattern",
    FacialPain => "facial_pain",
    VisualDisturbance => "visual_disturbance_type",
    HeadacheLocation => "headache_location",
    HeadacheProfile => "headache_profile",
    RedFlagContext => "red_flag_context",
});

impl CaseField {
    pub fn is_boolean(&self) -> bool {
        matches!(
            self,
            Self::Fever
                | Self::MeningealSigns
                | Self::NeuroDeficit
                | Self::Seizure
                | Self::HticPattern
                | Self::PregnancyPostpartum
                | Self::Trauma
                | Self::RecentPl
                | Self::Immunosuppression
                | Self::RecentPatternChange
                | Self::CancerHistory
                | Self::Vertigo
                | Self::Tinnitus
                | Self::JointPain
                | Self::HortonCriteria
                | Self::Anticoagulation
                | Self::NeuropathicPattern
                | Self::FacialPain
        )
    }
}

/// Dynamically typed field value, used by lexical layers and rule conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn text(s: &str) -> Self {
        Self::Text(s.to_string())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Text(s) => s.clone(),
            Self::List(l) => l.join(","),
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}

// ═══════════════════════════════════════════════════════════
// HeadacheCase
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadacheCase {
    #[serde(deserialize_with = "de_age")]
    pub age: Option<u8>,
    pub sex: Sex,
    pub profile: Profile,
    pub onset: Onset,
    #[serde(deserialize_with = "de_duration")]
    pub duration_current_episode_hours: Option<f64>,
    #[serde(deserialize_with = "de_intensity")]
    pub intensity: Option<u8>,

    pub fever: Option<bool>,
    pub meningeal_signs: Option<bool>,
    pub neuro_deficit: Option<bool>,
    pub seizure: Option<bool>,
    pub htic_pattern: Option<bool>,
    pub pregnancy_postpartum: Option<bool>,
    #[serde(deserialize_with = "de_trimester")]
    pub pregnancy_trimester: Option<u8>,
    pub trauma: Option<bool>,
    pub recent_pl_or_peridural: Option<bool>,
    pub immunosuppression: Option<bool>,

    pub recent_pattern_change: Option<bool>,
    pub cancer_history: Option<bool>,
    pub vertigo: Option<bool>,
    pub tinnitus: Option<bool>,
    pub joint_pain: Option<bool>,
    pub horton_criteria: Option<bool>,
    pub anticoagulation: Option<bool>,
    pub neuropathic_pattern: Option<bool>,
    pub facial_pain: Option<bool>,
    pub visual_disturbance_type: Option<VisualDisturbance>,
    pub headache_location: Option<HeadacheLocation>,

    pub red_flag_context: BTreeSet<String>,
    pub headache_profile: HeadacheProfile,
}

fn de_age<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u8>, D::Error> {
    let raw = Option::<i64>::deserialize(d)?;
    raw.map(validate_age).transpose().map_err(serde::de::Error::custom)
}

fn de_intensity<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u8>, D::Error> {
    let raw = Option::<i64>::deserialize(d)?;
    raw.map(validate_intensity)
        .transpose()
        .map_err(serde::de::Error::custom)
}

fn de_trimester<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u8>, D::Error> {
    let raw = Option::<i64>::deserialize(d)?;
    raw.map(validate_trimester)
        .transpose()
        .map_err(serde::de::Error::custom)
}

fn de_duration<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let raw = Option::<f64>::deserialize(d)?;
    raw.map(validate_duration)
        .transpose()
        .map_err(serde::de::Error::custom)
}

pub fn validate_age(age: i64) -> Result<u8, ValidationError> {
    if (0..=MAX_AGE).contains(&age) {
        Ok(age as u8)
    } else {
        Err(ValidationError::AgeOutOfRange(age))
    }
}

pub fn validate_intensity(v: i64) -> Result<u8, ValidationError> {
    if (0..=MAX_INTENSITY).contains(&v) {
        Ok(v as u8)
    } else {
        Err(ValidationError::IntensityOutOfRange(v))
    }
}

pub fn validate_trimester(v: i64) -> Result<u8, ValidationError> {
    if (1..=3).contains(&v) {
        Ok(v as u8)
    } else {
        Err(ValidationError::TrimesterOutOfRange(v))
    }
}

pub fn validate_duration(hours: f64) -> Result<f64, ValidationError> {
    if hours >= 0.0 && hours.is_finite() {
        Ok(hours)
    } else {
        Err(ValidationError::NegativeDuration(hours))
    }
}

impl HeadacheCase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a case from its flat JSON document, enforcing field ranges.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_age(mut self, age: i64) -> Result<Self, ValidationError> {
        self.age = Some(validate_age(age)?);
        Ok(self)
    }

    pub fn with_duration_hours(mut self, hours: f64) -> Result<Self, ValidationError> {
        self.duration_current_episode_hours = Some(validate_duration(hours)?);
        Ok(self)
    }

    fn bool_slot(&mut self, field: CaseField) -> Option<&mut Option<bool>> {
        let slot = match field {
            CaseField::Fever => &mut self.fever,
            CaseField::MeningealSigns => &mut self.meningeal_signs,
            CaseField::NeuroDeficit => &mut self.neuro_deficit,
            CaseField::Seizure => &mut self.seizure,
            CaseField::HticPattern => &mut self.htic_pattern,
            CaseField::PregnancyPostpartum => &mut self.pregnancy_postpartum,
            CaseField::Trauma => &mut self.trauma,
            CaseField::RecentPl => &mut self.recent_pl_or_peridural,
            CaseField::Immunosuppression => &mut self.immunosuppression,
            CaseField::RecentPatternChange => &mut self.recent_pattern_change,
            CaseField::CancerHistory => &mut self.cancer_history,
            CaseField::Vertigo => &mut self.vertigo,
            CaseField::Tinnitus => &mut self.tinnitus,
            CaseField::JointPain => &mut self.joint_pain,
            CaseField::HortonCriteria => &mut self.horton_criteria,
            CaseField::Anticoagulation => &mut self.anticoagulation,
            CaseField::NeuropathicPattern => &mut self.neuropathic_pattern,
            CaseField::FacialPain => &mut self.facial_pain,
            _ => return None,
        };
        Some(slot)
    }

    fn bool_value(&self, field: CaseField) -> Option<bool> {
        match field {
            CaseField::Fever => self.fever,
            CaseField::MeningealSigns => self.meningeal_signs,
            CaseField::NeuroDeficit => self.neuro_deficit,
            CaseField::Seizure => self.seizure,
            CaseField::HticPattern => self.htic_pattern,
            CaseField::PregnancyPostpartum => self.pregnancy_postpartum,
            CaseField::Trauma => self.trauma,
            CaseField::RecentPl => self.recent_pl_or_peridural,
            CaseField::Immunosuppression => self.immunosuppression,
            CaseField::RecentPatternChange => self.recent_pattern_change,
            CaseField::CancerHistory => self.cancer_history,
            CaseField::Vertigo => self.vertigo,
            CaseField::Tinnitus => self.tinnitus,
            CaseField::JointPain => self.joint_pain,
            CaseField::HortonCriteria => self.horton_criteria,
            CaseField::Anticoagulation => self.anticoagulation,
            CaseField::NeuropathicPattern => self.neuropathic_pattern,
            CaseField::FacialPain => self.facial_pain,
            _ => None,
        }
    }

    /// Current value of a field, `None` when it is unset or `unknown`.
    pub fn get(&self, field: CaseField) -> Option<FieldValue> {
        if field.is_boolean() {
            return self.bool_value(field).map(FieldValue::Bool);
        }
        match field {
            CaseField::Age => self.age.map(|a| FieldValue::Int(a as i64)),
            CaseField::Sex => match self.sex {
                Sex::Other => None,
                s => Some(FieldValue::text(s.as_str())),
            },
            CaseField::Profile => match self.profile {
                Profile::Unknown => None,
                p => Some(FieldValue::text(p.as_str())),
            },
            CaseField::Onset => match self.onset {
                Onset::Unknown => None,
                o => Some(FieldValue::text(o.as_str())),
            },
            CaseField::Duration => self.duration_current_episode_hours.map(FieldValue::Float),
            CaseField::Intensity => self.intensity.map(|i| FieldValue::Int(i as i64)),
            CaseField::PregnancyTrimester => {
                self.pregnancy_trimester.map(|t| FieldValue::Int(t as i64))
            }
            CaseField::VisualDisturbance => self
                .visual_disturbance_type
                .map(|v| FieldValue::text(v.as_str())),
            CaseField::HeadacheLocation => {
                self.headache_location.map(|l| FieldValue::text(l.as_str()))
            }
            CaseField::HeadacheProfile => match self.headache_profile {
                HeadacheProfile::Unknown => None,
                h => Some(FieldValue::text(h.as_str())),
            },
            CaseField::RedFlagContext => {
                if self.red_flag_context.is_empty() {
                    None
                } else {
                    Some(FieldValue::List(
                        self.red_flag_context.iter().cloned().collect(),
                    ))
                }
            }
            _ => None,
        }
    }

    pub fn is_set(&self, field: CaseField) -> bool {
        self.get(field).is_some()
    }

    /// Assign a field from a dynamically typed value, validating ranges.
    pub fn set(&mut self, field: CaseField, value: &FieldValue) -> Result<(), ValidationError> {
        let mismatch = || ValidationError::FieldType {
            field: field.as_str().into(),
            value: value.describe(),
        };

        if let Some(slot) = self.bool_slot(field) {
            match value {
                FieldValue::Bool(b) => {
                    *slot = Some(*b);
                    return Ok(());
                }
                _ => return Err(mismatch()),
            }
        }

        match (field, value) {
            (CaseField::Age, v) => {
                let n = v.as_f64().ok_or_else(mismatch)?;
                self.age = Some(validate_age(n as i64)?);
            }
            (CaseField::Intensity, v) => {
                let n = v.as_f64().ok_or_else(mismatch)?;
                self.intensity = Some(validate_intensity(n as i64)?);
            }
            (CaseField::PregnancyTrimester, v) => {
                let n = v.as_f64().ok_or_else(mismatch)?;
                self.pregnancy_trimester = Some(validate_trimester(n as i64)?);
            }
            (CaseField::Duration, v) => {
                let n = v.as_f64().ok_or_else(mismatch)?;
                self.duration_current_episode_hours = Some(validate_duration(n)?);
            }
            (CaseField::Sex, FieldValue::Text(s)) => self.sex = Sex::from_str(s)?,
            (CaseField::Profile, FieldValue::Text(s)) => self.profile = Profile::from_str(s)?,
            (CaseField::Onset, FieldValue::Text(s)) => self.onset = Onset::from_str(s)?,
            (CaseField::HeadacheProfile, FieldValue::Text(s)) => {
                self.headache_profile = HeadacheProfile::from_str(s)?
            }
            (CaseField::VisualDisturbance, FieldValue::Text(s)) => {
                self.visual_disturbance_type = Some(VisualDisturbance::from_str(s)?)
            }
            (CaseField::HeadacheLocation, FieldValue::Text(s)) => {
                self.headache_location = Some(HeadacheLocation::from_str(s)?)
            }
            (CaseField::RedFlagContext, FieldValue::Text(s)) => {
                self.red_flag_context.insert(s.clone());
            }
            (CaseField::RedFlagContext, FieldValue::List(items)) => {
                self.red_flag_context.extend(items.iter().cloned());
            }
            _ => return Err(mismatch()),
        }
        Ok(())
    }

    /// Fields that carry a value (sex excluded when unspecified).
    pub fn detected_fields(&self) -> Vec<CaseField> {
        CaseField::ALL
            .iter()
            .copied()
            .filter(|f| self.is_set(*f))
            .collect()
    }

    pub fn detected_field_count(&self) -> usize {
        self.detected_fields().len()
    }

    // ── Clinical predicates ──────────────────────────────────

    pub fn has_red_flags(&self) -> bool {
        let acute_over_50 =
            self.age.is_some_and(|a| a > 50) && self.profile == Profile::Acute;
        let flagged = [
            self.fever,
            self.meningeal_signs,
            self.neuro_deficit,
            self.seizure,
            self.htic_pattern,
            self.pregnancy_postpartum,
            self.trauma,
            self.recent_pl_or_peridural,
            self.immunosuppression,
            self.cancer_history,
            self.vertigo,
            self.horton_criteria,
        ]
        .iter()
        .any(|v| *v == Some(true));

        self.onset == Onset::Thunderclap
            || flagged
            || acute_over_50
            || self.visual_disturbance_type == Some(VisualDisturbance::Blindness)
            || !self.red_flag_context.is_empty()
    }

    pub fn is_emergency(&self) -> bool {
        let acute = self.profile == Profile::Acute;
        let yes = |v: Option<bool>| v == Some(true);

        self.onset == Onset::Thunderclap
            || (yes(self.fever) && yes(self.meningeal_signs))
            || (yes(self.neuro_deficit) && acute)
            || (yes(self.seizure) && acute)
            || (yes(self.htic_pattern) && (yes(self.neuro_deficit) || yes(self.seizure)))
    }

    /// Fields still worth asking about, in no particular order.
    pub fn missing_critical_fields(&self) -> Vec<CaseField> {
        let mut missing = Vec::new();
        if self.onset == Onset::Unknown {
            missing.push(CaseField::Onset);
        }
        for field in [
            CaseField::Fever,
            CaseField::MeningealSigns,
            CaseField::Intensity,
            CaseField::HticPattern,
            CaseField::NeuroDeficit,
            CaseField::Seizure,
            CaseField::RecentPl,
        ] {
            if !self.is_set(field) {
                missing.push(field);
            }
        }
        if self.profile == Profile::Chronic && self.recent_pattern_change.is_none() {
            missing.push(CaseField::RecentPatternChange);
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thunderclap_is_emergency() {
        let case = HeadacheCase {
            onset: Onset::Thunderclap,
            ..Default::default()
        };
        assert!(case.is_emergency());
        assert!(case.has_red_flags());
    }

    #[test]
    fn fever_with_meningeal_signs_is_emergency() {
        let case = HeadacheCase {
            fever: Some(true),
            meningeal_signs: Some(true),
            ..Default::default()
        };
        assert!(case.is_emergency());
    }

    #[test]
    fn fever_alone_is_red_flag_not_emergency() {
        let case = HeadacheCase {
            fever: Some(true),
            ..Default::default()
        };
        assert!(case.has_red_flags());
        assert!(!case.is_emergency());
    }

    #[test]
    fn chronic_without_fever_has_no_red_flags() {
        let case = HeadacheCase {
            profile: Profile::Chronic,
            onset: Onset::Chronic,
            fever: Some(false),
            ..Default::default()
        };
        assert!(!case.has_red_flags());
        assert!(!case.is_emergency());
    }

    #[test]
    fn age_over_50_acute_is_red_flag() {
        let case = HeadacheCase {
            age: Some(62),
            profile: Profile::Acute,
            ..Default::default()
        };
        assert!(case.has_red_flags());
        let younger = HeadacheCase {
            age: Some(40),
            profile: Profile::Acute,
            ..Default::default()
        };
        assert!(!younger.has_red_flags());
    }

    #[test]
    fn neuro_deficit_needs_acute_profile_for_emergency() {
        let mut case = HeadacheCase {
            neuro_deficit: Some(true),
            profile: Profile::Chronic,
            ..Default::default()
        };
        assert!(!case.is_emergency());
        case.profile = Profile::Acute;
        assert!(case.is_emergency());
    }

    #[test]
    fn round_trip_preserves_populated_and_unknown_fields() {
        let mut case = HeadacheCase::new().with_age(45).unwrap();
        case.sex = Sex::Female;
        case.onset = Onset::Progressive;
        case.fever = Some(false);
        case.meningeal_signs = None;
        case.duration_current_episode_hours = Some(72.0);
        case.red_flag_context.insert("post_partum".into());

        let json = serde_json::to_string(&case).unwrap();
        let back = HeadacheCase::from_json(&json).unwrap();
        assert_eq!(back, case);
        assert_eq!(back.meningeal_signs, None, "unknown must stay unknown");
        assert_eq!(back.fever, Some(false), "confirmed negative must survive");
        assert_eq!(back.profile, Profile::Unknown);
    }

    #[test]
    fn out_of_range_age_rejected() {
        assert!(HeadacheCase::new().with_age(121).is_err());
        assert!(HeadacheCase::new().with_age(-1).is_err());
        assert!(HeadacheCase::from_json(r#"{"age": 150}"#).is_err());
        assert!(HeadacheCase::from_json(r#"{"age": 120}"#).is_ok());
    }

    #[test]
    fn negative_duration_rejected() {
        assert!(HeadacheCase::new().with_duration_hours(-2.0).is_err());
        assert!(
            HeadacheCase::from_json(r#"{"duration_current_episode_hours": -1.5}"#).is_err()
        );
    }

    #[test]
    fn intensity_above_ten_rejected() {
        assert!(HeadacheCase::from_json(r#"{"intensity": 11}"#).is_err());
        let mut case = HeadacheCase::new();
        assert!(case.set(CaseField::Intensity, &FieldValue::Int(12)).is_err());
        assert_eq!(case.intensity, None, "rejected value must not be clamped in");
    }

    #[test]
    fn set_and_get_dynamic_fields() {
        let mut case = HeadacheCase::new();
        case.set(CaseField::Fever, &FieldValue::Bool(true)).unwrap();
        case.set(CaseField::Onset, &FieldValue::text("thunderclap")).unwrap();
        assert_eq!(case.get(CaseField::Fever), Some(FieldValue::Bool(true)));
        assert_eq!(case.onset, Onset::Thunderclap);
        assert!(case.set(CaseField::Fever, &FieldValue::text("yes")).is_err());
        assert!(case.set(CaseField::Onset, &FieldValue::text("sudden")).is_err());
    }

    #[test]
    fn unknown_enums_count_as_unset() {
        let case = HeadacheCase::new();
        assert!(!case.is_set(CaseField::Onset));
        assert!(!case.is_set(CaseField::Sex));
        assert_eq!(case.detected_field_count(), 0);
    }

    #[test]
    fn missing_fields_include_pattern_change_for_chronic() {
        let case = HeadacheCase {
            profile: Profile::Chronic,
            ..Default::default()
        };
        let missing = case.missing_critical_fields();
        assert!(missing.contains(&CaseField::RecentPatternChange));
        assert!(missing.contains(&CaseField::Onset));
    }
}
