use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use super::enums::{ImagingExam, Urgency};
use super::error::ValidationError;

/// Outcome of the rules engine: which exams, how fast, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagingRecommendation {
    pub imaging: Vec<ImagingExam>,
    pub urgency: Urgency,
    #[serde(deserialize_with = "de_comment")]
    pub comment: String,
    #[serde(default)]
    pub applied_rule_id: Option<String>,
}

fn de_comment<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let comment = String::deserialize(d)?;
    if comment.trim().is_empty() {
        return Err(serde::de::Error::custom(ValidationError::EmptyComment));
    }
    Ok(comment)
}

impl ImagingRecommendation {
    pub fn new(
        imaging: Vec<ImagingExam>,
        urgency: Urgency,
        comment: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let comment = comment.into();
        if comment.trim().is_empty() {
            return Err(ValidationError::EmptyComment);
        }
        Ok(Self {
            imaging,
            urgency,
            comment,
            applied_rule_id: None,
        })
    }

    /// Build from raw exam identifiers; any identifier outside the closed
    /// vocabulary fails the whole construction.
    pub fn from_identifiers(
        identifiers: &[&str],
        urgency: Urgency,
        comment: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let imaging = identifiers
            .iter()
            .map(|id| {
                ImagingExam::from_str(id).map_err(|_| ValidationError::UnknownExam(id.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(imaging, urgency, comment)
    }

    pub fn with_rule_id(mut self, rule_id: impl Into<String>) -> Self {
        self.applied_rule_id = Some(rule_id.into());
        self
    }

    pub fn requires_imaging(&self) -> bool {
        !self.imaging.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_exam_identifier() {
        let err = ImagingRecommendation::from_identifiers(
            &["irm_cerebrale", "radio_du_crane"],
            Urgency::Urgent,
            "test",
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::UnknownExam("radio_du_crane".into()));
    }

    #[test]
    fn rejects_empty_comment() {
        assert_eq!(
            ImagingRecommendation::new(vec![], Urgency::None, "  ").unwrap_err(),
            ValidationError::EmptyComment
        );
        let json = r#"{"imaging":[],"urgency":"none","comment":""}"#;
        assert!(serde_json::from_str::<ImagingRecommendation>(json).is_err());
    }

    #[test]
    fn round_trip_keeps_rule_id_and_order() {
        let rec = ImagingRecommendation::from_identifiers(
            &["scanner_cerebral_sans_injection", "ponction_lombaire"],
            Urgency::Immediate,
            "Suspicion HSA",
        )
        .unwrap()
        .with_rule_id("HSA_001");
        let json = serde_json::to_string(&rec).unwrap();
        let back: ImagingRecommendation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rec);
        assert_eq!(back.imaging[0], ImagingExam::ScannerSansInjection);
    }

    #[test]
    fn deserializing_unknown_exam_fails() {
        let json = r#"{"imaging":["pet_scan"],"urgency":"urgent","comment":"x"}"#;
        assert!(serde_json::from_str::<ImagingRecommendation>(json).is_err());
    }
}
