pub mod case;
pub mod enums;
pub mod error;
pub mod recommendation;

pub use case::{CaseField, FieldValue, HeadacheCase};
pub use enums::{
    HeadacheLocation, HeadacheProfile, ImagingExam, Onset, Profile, Sex, Urgency,
    VisualDisturbance,
};
pub use error::ValidationError;
pub use recommendation::ImagingRecommendation;
