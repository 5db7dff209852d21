/// Rejections raised when building a case or a recommendation.
/// Out-of-range values are refused, never clamped.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid value '{value}' for {field}")]
    InvalidEnum { field: String, value: String },

    #[error("Age out of range: {0} (expected 0..=120)")]
    AgeOutOfRange(i64),

    #[error("Duration must be non-negative, got {0}")]
    NegativeDuration(f64),

    #[error("Intensity out of range: {0} (expected 0..=10)")]
    IntensityOutOfRange(i64),

    #[error("Pregnancy trimester out of range: {0} (expected 1..=3)")]
    TrimesterOutOfRange(i64),

    #[error("Unknown imaging exam identifier: {0}")]
    UnknownExam(String),

    #[error("Recommendation comment must not be empty")]
    EmptyComment,

    #[error("Field {field} does not accept value {value}")]
    FieldType { field: String, value: String },
}
