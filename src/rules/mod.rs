//! Imaging decision rules: a prioritized, replaceable rule table and the
//! engine that evaluates a `HeadacheCase` against it.

pub mod adaptations;
pub mod engine;
pub mod table;

use thiserror::Error;

pub use engine::{CaseSummary, DecisionExplanation, RulesEngine};
pub use table::{Condition, ConditionOp, Logic, Rule, RulesTable, TableMetadata};

/// Rules table bundled with the crate.
pub const DEFAULT_RULES: &str = include_str!("../../resources/rules/headache_rules.json");

#[derive(Error, Debug)]
pub enum RulesError {
    #[error("Rules file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Rules parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid rule {id}: {reason}")]
    InvalidRule { id: String, reason: String },

    #[error("Duplicate rule id: {0}")]
    DuplicateRule(String),

    #[error("Rules table contains no rules")]
    EmptyTable,
}
