//! When to stop asking questions.

use serde::{Deserialize, Serialize};

use super::questions::target_fields;
use super::session::EndReason;
use crate::config::TriageConfig;
use crate::models::{HeadacheCase, Onset, Profile, Urgency};

/// Red flags whose appearance changes a chronic headache's workup.
fn chronic_red_flags(case: &HeadacheCase) -> [Option<bool>; 6] {
    [
        case.fever,
        case.meningeal_signs,
        case.neuro_deficit,
        case.seizure,
        case.htic_pattern,
        case.trauma,
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StopCheck {
    pub reason: Option<EndReason>,
    /// Share of applicable question fields that carry a value.
    pub criteria_ratio: f64,
    /// Confirmed red flags.
    pub absolute_criteria: usize,
}

impl StopCheck {
    pub fn should_stop(&self) -> bool {
        self.reason.is_some()
    }
}

pub fn criteria_ratio(case: &HeadacheCase) -> f64 {
    let targets = target_fields(case);
    if targets.is_empty() {
        return 1.0;
    }
    let set = targets.iter().filter(|f| case.is_set(**f)).count();
    set as f64 / targets.len() as f64
}

pub fn absolute_criteria(case: &HeadacheCase) -> usize {
    let flags = [
        case.fever,
        case.meningeal_signs,
        case.neuro_deficit,
        case.seizure,
        case.htic_pattern,
        case.trauma,
        case.pregnancy_postpartum,
        case.immunosuppression,
        case.recent_pl_or_peridural,
    ];
    let positive = flags.iter().filter(|v| **v == Some(true)).count();
    positive + usize::from(case.onset == Onset::Thunderclap)
}

/// Stopping checks in order: emergency, accumulated red flags, the chronic
/// sub-flow, then coverage of the question fields. `provisional` is the
/// rules engine's verdict on the current case.
pub fn check(case: &HeadacheCase, provisional: Urgency, config: &TriageConfig) -> StopCheck {
    let ratio = criteria_ratio(case);
    let absolute = absolute_criteria(case);
    let stop = |reason| StopCheck {
        reason: Some(reason),
        criteria_ratio: ratio,
        absolute_criteria: absolute,
    };

    if case.is_emergency() || provisional == Urgency::Immediate {
        return stop(EndReason::Emergency);
    }
    if absolute >= config.early_stop_absolute_criteria {
        return stop(EndReason::AbsoluteCriteria);
    }
    if let Some(reason) = chronic_outcome(case) {
        return stop(reason);
    }
    if ratio > config.early_stop_ratio {
        return stop(EndReason::CriteriaRatio);
    }

    StopCheck {
        reason: None,
        criteria_ratio: ratio,
        absolute_criteria: absolute,
    }
}

fn chronic_outcome(case: &HeadacheCase) -> Option<EndReason> {
    if case.profile != Profile::Chronic {
        return None;
    }
    match case.recent_pattern_change? {
        false => Some(EndReason::ChronicStableNoUrgency),
        true => {
            let flags = chronic_red_flags(case);
            if flags.contains(&Some(true)) {
                Some(EndReason::ChronicWithNewRedFlags)
            } else if flags.iter().all(Option::is_some) {
                Some(EndReason::ChronicAggravatedNoRedFlags)
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Sex;

    fn config() -> TriageConfig {
        TriageConfig::default()
    }

    #[test]
    fn empty_case_continues() {
        let result = check(&HeadacheCase::default(), Urgency::None, &config());
        assert!(!result.should_stop());
        assert_eq!(result.criteria_ratio, 0.0);
        assert_eq!(result.absolute_criteria, 0);
    }

    #[test]
    fn thunderclap_stops_immediately() {
        let case = HeadacheCase {
            onset: Onset::Thunderclap,
            ..Default::default()
        };
        assert_eq!(
            check(&case, Urgency::None, &config()).reason,
            Some(EndReason::Emergency)
        );
    }

    #[test]
    fn immediate_rule_stops() {
        let case = HeadacheCase {
            trauma: Some(true),
            anticoagulation: Some(true),
            ..Default::default()
        };
        assert_eq!(
            check(&case, Urgency::Immediate, &config()).reason,
            Some(EndReason::Emergency)
        );
    }

    #[test]
    fn three_red_flags_stop() {
        let case = HeadacheCase {
            trauma: Some(true),
            immunosuppression: Some(true),
            recent_pl_or_peridural: Some(true),
            ..Default::default()
        };
        let result = check(&case, Urgency::Urgent, &config());
        assert_eq!(result.reason, Some(EndReason::AbsoluteCriteria));
        assert_eq!(result.absolute_criteria, 3);
    }

    #[test]
    fn chronic_stable_stops() {
        let case = HeadacheCase {
            profile: Profile::Chronic,
            recent_pattern_change: Some(false),
            ..Default::default()
        };
        assert_eq!(
            check(&case, Urgency::None, &config()).reason,
            Some(EndReason::ChronicStableNoUrgency)
        );
    }

    #[test]
    fn chronic_change_with_new_flag_stops() {
        let case = HeadacheCase {
            profile: Profile::Chronic,
            recent_pattern_change: Some(true),
            htic_pattern: Some(true),
            ..Default::default()
        };
        assert_eq!(
            check(&case, Urgency::Urgent, &config()).reason,
            Some(EndReason::ChronicWithNewRedFlags)
        );
    }

    #[test]
    fn chronic_change_waits_for_all_flags() {
        let mut case = HeadacheCase {
            profile: Profile::Chronic,
            recent_pattern_change: Some(true),
            fever: Some(false),
            ..Default::default()
        };
        assert!(!check(&case, Urgency::Routine, &config()).should_stop());

        case.meningeal_signs = Some(false);
        case.neuro_deficit = Some(false);
        case.seizure = Some(false);
        case.htic_pattern = Some(false);
        case.trauma = Some(false);
        assert_eq!(
            check(&case, Urgency::Routine, &config()).reason,
            Some(EndReason::ChronicAggravatedNoRedFlags)
        );
    }

    #[test]
    fn coverage_above_ratio_stops() {
        let case = HeadacheCase {
            sex: Sex::Male,
            onset: Onset::Progressive,
            profile: Profile::Acute,
            fever: Some(false),
            meningeal_signs: Some(false),
            intensity: Some(6),
            htic_pattern: Some(false),
            neuro_deficit: Some(false),
            seizure: Some(false),
            trauma: Some(false),
            recent_pl_or_peridural: Some(false),
            immunosuppression: Some(false),
            ..Default::default()
        };
        let result = check(&case, Urgency::Routine, &config());
        assert!(result.criteria_ratio > 0.8);
        assert_eq!(result.reason, Some(EndReason::CriteriaRatio));
    }
}
