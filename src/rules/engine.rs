use std::path::Path;

use serde::Serialize;

use crate::models::{
    HeadacheCase, ImagingExam, ImagingRecommendation, Onset, Profile, Sex, Urgency,
};

use super::adaptations::adapt;
use super::table::{Rule, RulesTable, TableMetadata};
use super::{RulesError, DEFAULT_RULES};

const UNAVAILABLE_COMMENT: &str = "Aucune recommandation disponible: table de règles indisponible. \
     Évaluation clinique requise; en cas de doute, orienter vers les urgences.";

/// First-match rule evaluation over a severity-ordered table.
///
/// An engine without a table stays usable: every evaluation returns the
/// "no recommendation available" result instead of failing.
#[derive(Debug, Clone)]
pub struct RulesEngine {
    table: Option<RulesTable>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseSummary {
    pub age: Option<u8>,
    pub sex: Sex,
    pub profile: Profile,
    pub onset: Onset,
    pub has_red_flags: bool,
    pub is_emergency: bool,
}

/// Why a case received its recommendation.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionExplanation {
    pub case_summary: CaseSummary,
    pub matching_rule_ids: Vec<String>,
    pub applied_rule_id: Option<String>,
    /// Condition outcomes of the applied rule (empty for fallbacks).
    pub applied_conditions: Vec<(String, bool)>,
    pub recommendation: ImagingRecommendation,
}

impl RulesEngine {
    pub fn new(table: RulesTable) -> Self {
        tracing::info!(
            version = %table.metadata.version,
            rules = table.rules.len(),
            "Rules table loaded"
        );
        Self { table: Some(table) }
    }

    /// Engine over the bundled table.
    pub fn builtin() -> Result<Self, RulesError> {
        Ok(Self::new(RulesTable::from_json_str(DEFAULT_RULES)?))
    }

    pub fn from_json_str(json: &str) -> Result<Self, RulesError> {
        Ok(Self::new(RulesTable::from_json_str(json)?))
    }

    pub fn from_path(path: &Path) -> Result<Self, RulesError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Load a table from disk, degrading to an unavailable engine on error.
    pub fn load_or_unavailable(path: &Path) -> Self {
        match Self::from_path(path) {
            Ok(engine) => engine,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Rules table unavailable");
                Self::unavailable()
            }
        }
    }

    pub fn unavailable() -> Self {
        Self { table: None }
    }

    pub fn is_available(&self) -> bool {
        self.table.is_some()
    }

    pub fn metadata(&self) -> Option<&TableMetadata> {
        self.table.as_ref().map(|t| &t.metadata)
    }

    pub fn rules(&self) -> &[Rule] {
        self.table.as_ref().map(|t| t.rules.as_slice()).unwrap_or(&[])
    }

    // ── Evaluation ───────────────────────────────────────────

    /// Recommendation for a case: the first matching rule, or a profile
    /// fallback, adapted to the patient.
    pub fn evaluate(&self, case: &HeadacheCase) -> ImagingRecommendation {
        if !self.is_available() {
            return no_recommendation();
        }

        let recommendation = match self.rules().iter().find(|r| r.matches(case)) {
            Some(rule) => {
                tracing::debug!(
                    rule_id = %rule.id,
                    category = %rule.category,
                    urgency = %rule.recommendation.urgency,
                    "Rule matched"
                );
                rule.recommendation.clone()
            }
            None => {
                let fallback = fallback_recommendation(case);
                tracing::debug!(
                    rule_id = fallback.applied_rule_id.as_deref().unwrap_or("none"),
                    "No rule matched, using fallback"
                );
                fallback
            }
        };

        adapt(case, recommendation)
    }

    /// Every rule the case satisfies, in table order.
    pub fn find_matching_rules(&self, case: &HeadacheCase) -> Vec<&Rule> {
        self.rules().iter().filter(|r| r.matches(case)).collect()
    }

    pub fn rule_by_id(&self, id: &str) -> Option<&Rule> {
        self.rules().iter().find(|r| r.id == id)
    }

    pub fn rules_by_category(&self, category: &str) -> Vec<&Rule> {
        self.rules()
            .iter()
            .filter(|r| r.category == category)
            .collect()
    }

    pub fn explain_decision(&self, case: &HeadacheCase) -> DecisionExplanation {
        let matching = self.find_matching_rules(case);
        let recommendation = self.evaluate(case);
        let applied_conditions = matching
            .first()
            .map(|r| r.condition_outcomes(case))
            .unwrap_or_default();

        DecisionExplanation {
            case_summary: CaseSummary {
                age: case.age,
                sex: case.sex,
                profile: case.profile,
                onset: case.onset,
                has_red_flags: case.has_red_flags(),
                is_emergency: case.is_emergency(),
            },
            matching_rule_ids: matching.iter().map(|r| r.id.clone()).collect(),
            applied_rule_id: recommendation.applied_rule_id.clone(),
            applied_conditions,
            recommendation,
        }
    }
}

impl Default for RulesEngine {
    /// Bundled table, or an unavailable engine if it fails to load.
    fn default() -> Self {
        Self::builtin().unwrap_or_else(|e| {
            tracing::error!(error = %e, "Bundled rules table failed to load");
            Self::unavailable()
        })
    }
}

fn no_recommendation() -> ImagingRecommendation {
    ImagingRecommendation {
        imaging: Vec::new(),
        urgency: Urgency::None,
        comment: UNAVAILABLE_COMMENT.to_string(),
        applied_rule_id: None,
    }
}

/// Recommendation when no rule matches, keyed on the temporal profile.
/// An unknown profile gets no imaging and a generic comment.
pub(crate) fn fallback_recommendation(case: &HeadacheCase) -> ImagingRecommendation {
    let (imaging, urgency, comment, id) = match case.profile {
        Profile::Acute => (
            vec![ImagingExam::ScannerSansInjection],
            Urgency::Urgent,
            "Céphalée aiguë inhabituelle sans règle spécifique: scanner cérébral pour éliminer \
             une cause secondaire grave. Examen neurologique complet requis.",
            "FALLBACK_ACUTE",
        ),
        Profile::Subacute => (
            vec![ImagingExam::IrmCerebrale],
            Urgency::Routine,
            "Céphalée subaiguë: IRM cérébrale programmée, consultation neurologique dans les 7 jours.",
            "FALLBACK_SUBACUTE",
        ),
        Profile::Chronic if case.has_red_flags() => (
            vec![ImagingExam::IrmCerebrale],
            Urgency::Urgent,
            "Céphalée chronique avec signe d'alarme: IRM cérébrale, consultation neurologique rapide.",
            "FALLBACK_CHRONIC_RED_FLAGS",
        ),
        Profile::Chronic => (
            Vec::new(),
            Urgency::None,
            "Céphalée chronique sans signe d'alarme: pas d'imagerie systématique si examen \
             neurologique normal.",
            "FALLBACK_CHRONIC_NO_FLAGS",
        ),
        Profile::Unknown => (
            Vec::new(),
            Urgency::None,
            "Aucune règle ne correspond aux informations disponibles. Compléter l'anamnèse; \
             consulter en urgence si aggravation, fièvre ou déficit neurologique.",
            "FALLBACK_UNKNOWN",
        ),
    };

    ImagingRecommendation {
        imaging,
        urgency,
        comment: comment.to_string(),
        applied_rule_id: Some(id.to_string()),
    }
}
