//! Rule table: JSON rule definitions parsed into typed predicates.
//!
//! Condition keys are case field names, optionally suffixed:
//! - `field: value` equality (`true`/`false` match only a confirmed value)
//! - `field: [a, b]` membership; `field: []` means "empty or unset"
//! - `field_min` / `field_max` inclusive numeric bounds
//! - `field_count_min` minimum number of items in a list field
//!
//! Every expected value is checked against the case field's type when the
//! table is loaded, so a typo in a rule file fails at startup instead of
//! silently never matching.

use std::collections::HashSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{CaseField, FieldValue, HeadacheCase, ImagingRecommendation};

use super::RulesError;

const NUMERIC_EPSILON: f64 = 1e-9;

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Logic {
    #[default]
    All,
    Any,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum ConditionOp {
    Equals(FieldValue),
    OneOf(Vec<FieldValue>),
    Empty,
    Min(f64),
    Max(f64),
    CountMin(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Condition {
    /// Key as written in the rule file, e.g. `age_min`.
    pub key: String,
    pub field: CaseField,
    pub op: ConditionOp,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rule {
    pub id: String,
    pub category: String,
    pub logic: Logic,
    pub conditions: Vec<Condition>,
    /// Carries `applied_rule_id = id`.
    pub recommendation: ImagingRecommendation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RulesTable {
    pub metadata: TableMetadata,
    pub rules: Vec<Rule>,
}

#[derive(Deserialize)]
struct RawTable {
    #[serde(default)]
    metadata: TableMetadata,
    rules: Vec<RawRule>,
}

#[derive(Deserialize)]
struct RawRule {
    id: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    logic: Logic,
    conditions: serde_json::Map<String, Value>,
    recommendation: ImagingRecommendation,
}

// ═══════════════════════════════════════════════════════════
// Parsing
// ═══════════════════════════════════════════════════════════

impl RulesTable {
    pub fn from_json_str(json: &str) -> Result<Self, RulesError> {
        let raw: RawTable = serde_json::from_str(json)?;
        if raw.rules.is_empty() {
            return Err(RulesError::EmptyTable);
        }

        let mut seen = HashSet::new();
        let mut rules = Vec::with_capacity(raw.rules.len());
        for raw_rule in raw.rules {
            if !seen.insert(raw_rule.id.clone()) {
                return Err(RulesError::DuplicateRule(raw_rule.id));
            }
            rules.push(Rule::try_from(raw_rule)?);
        }

        Ok(Self {
            metadata: raw.metadata,
            rules,
        })
    }
}

impl TryFrom<RawRule> for Rule {
    type Error = RulesError;

    fn try_from(raw: RawRule) -> Result<Self, Self::Error> {
        let invalid = |reason: String| RulesError::InvalidRule {
            id: raw.id.clone(),
            reason,
        };

        if raw.conditions.is_empty() {
            return Err(invalid("rule has no conditions".into()));
        }

        let conditions = raw
            .conditions
            .iter()
            .map(|(key, value)| parse_condition(key, value).map_err(&invalid))
            .collect::<Result<Vec<_>, _>>()?;

        let recommendation = raw.recommendation.with_rule_id(raw.id.clone());

        Ok(Self {
            id: raw.id,
            category: raw.category,
            logic: raw.logic,
            conditions,
            recommendation,
        })
    }
}

fn parse_condition(key: &str, value: &Value) -> Result<Condition, String> {
    let numeric = || {
        value
            .as_f64()
            .ok_or_else(|| format!("{key} expects a number, got {value}"))
    };

    let (field_name, op) = if let Some(name) = key.strip_suffix("_count_min") {
        let n = value
            .as_u64()
            .ok_or_else(|| format!("{key} expects a non-negative integer, got {value}"))?;
        (name, ConditionOp::CountMin(n as usize))
    } else if let Some(name) = key.strip_suffix("_min") {
        (name, ConditionOp::Min(numeric()?))
    } else if let Some(name) = key.strip_suffix("_max") {
        (name, ConditionOp::Max(numeric()?))
    } else {
        match value {
            Value::Array(items) if items.is_empty() => (key, ConditionOp::Empty),
            Value::Array(items) => {
                let values = items
                    .iter()
                    .map(|v| to_field_value(key, v))
                    .collect::<Result<Vec<_>, _>>()?;
                (key, ConditionOp::OneOf(values))
            }
            other => (key, ConditionOp::Equals(to_field_value(key, other)?)),
        }
    };

    let field = CaseField::from_str(field_name).map_err(|_| format!("unknown field '{field_name}'"))?;
    check_expected_type(field, &op)?;

    Ok(Condition {
        key: key.to_string(),
        field,
        op,
    })
}

fn to_field_value(key: &str, value: &Value) -> Result<FieldValue, String> {
    if value.is_null() {
        return Err(format!("{key} must not be null"));
    }
    serde_json::from_value(value.clone()).map_err(|e| format!("{key}: {e}"))
}

/// Assign each expected value to a scratch case: whatever the case refuses
/// can never match at runtime.
fn check_expected_type(field: CaseField, op: &ConditionOp) -> Result<(), String> {
    let expected: &[FieldValue] = match op {
        ConditionOp::Equals(v) => std::slice::from_ref(v),
        ConditionOp::OneOf(values) => values,
        ConditionOp::Min(_) | ConditionOp::Max(_) => {
            if matches!(
                field,
                CaseField::Age
                    | CaseField::Intensity
                    | CaseField::Duration
                    | CaseField::PregnancyTrimester
            ) {
                return Ok(());
            }
            return Err(format!("{} is not numeric", field.as_str()));
        }
        ConditionOp::CountMin(_) => {
            if field == CaseField::RedFlagContext {
                return Ok(());
            }
            return Err(format!("{} is not a list", field.as_str()));
        }
        ConditionOp::Empty => return Ok(()),
    };

    let mut scratch = HeadacheCase::default();
    for value in expected {
        scratch
            .set(field, value)
            .map_err(|e| format!("{}: {e}", field.as_str()))?;
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════
// Matching
// ═══════════════════════════════════════════════════════════

impl Condition {
    pub fn is_satisfied(&self, case: &HeadacheCase) -> bool {
        let actual = case.get(self.field);
        match (&self.op, actual) {
            (ConditionOp::Empty, None) => true,
            (ConditionOp::Empty, Some(FieldValue::List(items))) => items.is_empty(),
            (ConditionOp::Empty, Some(_)) => false,
            (ConditionOp::CountMin(n), None) => *n == 0,
            (ConditionOp::CountMin(n), Some(FieldValue::List(items))) => items.len() >= *n,
            (ConditionOp::CountMin(_), Some(_)) => false,
            (_, None) => false,
            (ConditionOp::Min(min), Some(v)) => v.as_f64().is_some_and(|x| x >= *min),
            (ConditionOp::Max(max), Some(v)) => v.as_f64().is_some_and(|x| x <= *max),
            (ConditionOp::Equals(expected), Some(v)) => values_match(&v, expected),
            (ConditionOp::OneOf(expected), Some(v)) => {
                expected.iter().any(|e| values_match(&v, e))
            }
        }
    }
}

fn values_match(actual: &FieldValue, expected: &FieldValue) -> bool {
    match (actual, expected) {
        (FieldValue::Bool(a), FieldValue::Bool(b)) => a == b,
        (FieldValue::Text(a), FieldValue::Text(b)) => a == b,
        (FieldValue::List(items), FieldValue::Text(t)) => items.contains(t),
        (a, b) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => (x - y).abs() < NUMERIC_EPSILON,
            _ => false,
        },
    }
}

impl Rule {
    pub fn matches(&self, case: &HeadacheCase) -> bool {
        match self.logic {
            Logic::All => self.conditions.iter().all(|c| c.is_satisfied(case)),
            Logic::Any => self.conditions.iter().any(|c| c.is_satisfied(case)),
        }
    }

    /// Per-condition outcome, in declaration order.
    pub fn condition_outcomes(&self, case: &HeadacheCase) -> Vec<(String, bool)> {
        self.conditions
            .iter()
            .map(|c| (c.key.clone(), c.is_satisfied(case)))
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Onset, Profile};

    fn table(rules: &str) -> Result<RulesTable, RulesError> {
        RulesTable::from_json_str(&format!(
            r#"{{"metadata": {{"version": "test"}}, "rules": [{rules}]}}"#
        ))
    }

    fn rule(conditions: &str) -> Rule {
        let json = format!(
            r#"{{"id": "R1", "category": "test", "conditions": {conditions},
                "recommendation": {{"imaging": [], "urgency": "none", "comment": "ok"}}}}"#
        );
        table(&json).unwrap().rules.remove(0)
    }

    #[test]
    fn rule_carries_its_id_into_recommendation() {
        let r = rule(r#"{"onset": "thunderclap"}"#);
        assert_eq!(r.recommendation.applied_rule_id.as_deref(), Some("R1"));
        assert_eq!(r.logic, Logic::All);
    }

    #[test]
    fn boolean_equality_needs_confirmed_value() {
        let r = rule(r#"{"fever": false}"#);
        let unset = HeadacheCase::default();
        let negative = HeadacheCase {
            fever: Some(false),
            ..Default::default()
        };
        assert!(!r.matches(&unset));
        assert!(r.matches(&negative));
    }

    #[test]
    fn numeric_bounds_are_inclusive() {
        let r = rule(r#"{"age_min": 50, "age_max": 60}"#);
        let at = |age: u8| HeadacheCase {
            age: Some(age),
            ..Default::default()
        };
        assert!(r.matches(&at(50)));
        assert!(r.matches(&at(60)));
        assert!(!r.matches(&at(61)));
        assert!(!r.matches(&HeadacheCase::default()));
    }

    #[test]
    fn membership_list() {
        let r = rule(r#"{"profile": ["acute", "subacute"]}"#);
        let case = HeadacheCase {
            profile: Profile::Subacute,
            ..Default::default()
        };
        assert!(r.matches(&case));
        let chronic = HeadacheCase {
            profile: Profile::Chronic,
            ..Default::default()
        };
        assert!(!r.matches(&chronic));
    }

    #[test]
    fn empty_list_and_count_min_on_context() {
        let empty = rule(r#"{"red_flag_context": []}"#);
        let count = rule(r#"{"red_flag_context_count_min": 2}"#);
        let mut case = HeadacheCase::default();
        assert!(empty.matches(&case));
        assert!(!count.matches(&case));

        case.red_flag_context.insert("anticoagulant".into());
        case.red_flag_context.insert("voyage_recent".into());
        assert!(!empty.matches(&case));
        assert!(count.matches(&case));
    }

    #[test]
    fn any_logic_needs_one_condition() {
        let json = r#"{"id": "ANY", "logic": "any",
            "conditions": {"fever": true, "onset": "thunderclap"},
            "recommendation": {"imaging": [], "urgency": "urgent", "comment": "x"}}"#;
        let r = table(json).unwrap().rules.remove(0);
        let case = HeadacheCase {
            onset: Onset::Thunderclap,
            ..Default::default()
        };
        assert!(r.matches(&case));
        assert!(!r.matches(&HeadacheCase::default()));
    }

    #[test]
    fn condition_outcomes_report_each_key() {
        let r = rule(r#"{"fever": true, "meningeal_signs": true}"#);
        let case = HeadacheCase {
            fever: Some(true),
            ..Default::default()
        };
        let outcomes = r.condition_outcomes(&case);
        assert!(outcomes.contains(&("fever".to_string(), true)));
        assert!(outcomes.contains(&("meningeal_signs".to_string(), false)));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let json = r#"{"id": "BAD", "conditions": {"confusion": true},
            "recommendation": {"imaging": [], "urgency": "none", "comment": "x"}}"#;
        let err = table(json).unwrap_err();
        assert!(matches!(err, RulesError::InvalidRule { ref id, .. } if id == "BAD"));
    }

    #[test]
    fn misspelled_enum_value_is_rejected() {
        let json = r#"{"id": "BAD", "conditions": {"onset": "thunderklap"},
            "recommendation": {"imaging": [], "urgency": "none", "comment": "x"}}"#;
        assert!(matches!(table(json), Err(RulesError::InvalidRule { .. })));
    }

    #[test]
    fn bound_on_non_numeric_field_is_rejected() {
        let json = r#"{"id": "BAD", "conditions": {"fever_min": 1},
            "recommendation": {"imaging": [], "urgency": "none", "comment": "x"}}"#;
        assert!(matches!(table(json), Err(RulesError::InvalidRule { .. })));
    }

    #[test]
    fn unknown_exam_fails_parse() {
        let json = r#"{"id": "BAD", "conditions": {"fever": true},
            "recommendation": {"imaging": ["radio_crane"], "urgency": "none", "comment": "x"}}"#;
        assert!(matches!(table(json), Err(RulesError::Parse(_))));
    }

    #[test]
    fn empty_and_duplicate_tables_are_rejected() {
        assert!(matches!(table(""), Err(RulesError::EmptyTable)));
        let one = r#"{"id": "DUP", "conditions": {"fever": true},
            "recommendation": {"imaging": [], "urgency": "none", "comment": "x"}}"#;
        let err = table(&format!("{one},{one}")).unwrap_err();
        assert!(matches!(err, RulesError::DuplicateRule(ref id) if id == "DUP"));
    }

    #[test]
    fn rule_without_conditions_is_rejected() {
        let json = r#"{"id": "NONE", "conditions": {},
            "recommendation": {"imaging": [], "urgency": "none", "comment": "x"}}"#;
        assert!(matches!(table(json), Err(RulesError::InvalidRule { .. })));
    }
}
