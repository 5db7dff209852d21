//! Headache triage decision support.
//!
//! French clinical free text goes through the hybrid NLU into a
//! [`HeadacheCase`]; the rules engine maps the case to an imaging
//! recommendation; the dialogue manager asks clarification questions
//! until it can stop.

pub mod audit;
pub mod config;
pub mod dialogue;
pub mod models;
pub mod nlu;
pub mod rules;

use tracing_subscriber::EnvFilter;

pub use config::TriageConfig;
pub use dialogue::{DialogueManager, SessionError, TurnKind, TurnResponse};
pub use models::{HeadacheCase, ImagingExam, ImagingRecommendation, Urgency};
pub use nlu::{HybridNlu, NluMetadata};
pub use rules::RulesEngine;

/// Install the global fmt subscriber. `RUST_LOG` overrides the default
/// filter. Later calls are no-ops.
pub fn init_tracing() {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
    }

    #[test]
    fn free_text_to_recommendation() {
        let config = TriageConfig::default();
        let nlu = HybridNlu::new(&config);
        let (case, _) = nlu.parse(
            "Homme de 35 ans, fièvre à 39.5 et raideur de nuque depuis ce matin",
        );
        let rec = RulesEngine::default().evaluate(&case);
        assert_eq!(rec.urgency, Urgency::Immediate);
        assert_eq!(rec.applied_rule_id.as_deref(), Some("MNG_001"));
        assert!(rec.imaging.contains(&ImagingExam::PonctionLombaire));
    }

    #[test]
    fn negated_cancer_does_not_trigger_immunosuppression_rule() {
        let nlu = HybridNlu::rules_only(&TriageConfig::default());
        let (case, _) = nlu.parse("Homme de 40 ans, céphalée progressive, pas de cancer");
        assert_eq!(case.immunosuppression, None);
        assert_eq!(case.cancer_history, Some(false));
        let rec = RulesEngine::default().evaluate(&case);
        assert_ne!(rec.applied_rule_id.as_deref(), Some("IMMUNO_001"));
    }
}
