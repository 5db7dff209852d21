//! French clinical text to structured headache case.

pub mod confidence;
pub mod embedding;
pub mod extractors;
pub mod fuzzy;
pub mod hybrid;
pub mod keywords;
pub mod negation;
pub mod ngrams;
pub mod normalize;
pub mod rules_nlu;
pub mod vocabulary;

pub use fuzzy::{FuzzyCorrection, FuzzyCorrectionMatch, FuzzyCorrector};
pub use hybrid::{AppliedMatch, HybridNlu, NluMetadata, NluMethod};
pub use keywords::KeywordMatch;
pub use ngrams::NgramMatch;
pub use rules_nlu::{parse_rules_only, RulesMetadata};
pub use vocabulary::{DetectionResult, DetectionSource};
