//! Dialogue manager: one call per user turn.
//!
//! Each turn runs the hybrid NLU on the text, reads it as an answer to the
//! previous question unless the parse says otherwise, merges the result
//! into the session case, asks the rules engine for a provisional verdict
//! and either stops with a final recommendation or asks the next question.

use std::sync::Mutex;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::messages;
use super::questions::{interpret_answer, next_question};
use super::session::{DialogueState, EndReason, Session};
use super::stopping::{self, StopCheck};
use super::store::SessionStore;
use super::SessionError;
use crate::audit::{AuditSink, DecisionRecord, NluRecord, TracingAuditSink};
use crate::config::TriageConfig;
use crate::models::{CaseField, HeadacheCase, ImagingRecommendation, Urgency};
use crate::nlu::normalize::token_count;
use crate::nlu::{HybridNlu, NluMetadata, NluMethod};
use crate::rules::RulesEngine;

// ═══════════════════════════════════════════════════════════
// Responses
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnKind {
    Question,
    Emergency,
    Recommendation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnDiagnostic {
    /// State reached this turn; a finished session then becomes complete.
    pub state: DialogueState,
    pub end_reason: Option<EndReason>,
    pub nlu_method: NluMethod,
    pub nlu_confidence: f64,
    /// Fields written to the case this turn.
    pub detected_fields: Vec<CaseField>,
    pub answered_field: Option<CaseField>,
    pub criteria_ratio: f64,
    pub absolute_criteria: usize,
    pub applied_rule_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnResponse {
    pub session_id: Uuid,
    pub message: String,
    pub kind: TurnKind,
    pub should_continue: bool,
    pub case_snapshot: HeadacheCase,
    pub next_field: Option<CaseField>,
    pub recommendation: Option<ImagingRecommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<TurnDiagnostic>,
}

/// Read-only view of a stored session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub state: DialogueState,
    pub turn_count: usize,
    pub case: HeadacheCase,
    pub asked_fields: Vec<CaseField>,
    pub last_confidence: f64,
    pub end_reason: Option<EndReason>,
    pub recommendation: Option<ImagingRecommendation>,
}

impl From<&Session> for SessionInfo {
    fn from(s: &Session) -> Self {
        Self {
            id: s.id,
            created_at: s.created_at,
            updated_at: s.updated_at,
            state: s.state,
            turn_count: s.turn_count(),
            case: s.case.clone(),
            asked_fields: s.asked_fields.clone(),
            last_confidence: s.last_confidence,
            end_reason: s.end_reason,
            recommendation: s.recommendation.clone(),
        }
    }
}

/// What this turn's NLU pass contributed, carried into the diagnostic.
struct TurnTrace {
    method: NluMethod,
    confidence: f64,
    detected: Vec<CaseField>,
    answered: Option<CaseField>,
}

impl TurnTrace {
    fn new(meta: &NluMetadata, detected: Vec<CaseField>, answered: Option<CaseField>) -> Self {
        Self {
            method: meta.method(),
            confidence: meta.overall_confidence(),
            detected,
            answered,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// DialogueManager
// ═══════════════════════════════════════════════════════════

pub struct DialogueManager {
    nlu: HybridNlu,
    rules: RulesEngine,
    config: TriageConfig,
    store: Mutex<SessionStore>,
    audit: Box<dyn AuditSink>,
}

impl DialogueManager {
    /// Full NLU pipeline and the built-in rules table.
    pub fn new(config: TriageConfig) -> Self {
        let nlu = HybridNlu::new(&config);
        Self::with_parts(nlu, RulesEngine::default(), config)
    }

    pub fn with_parts(nlu: HybridNlu, rules: RulesEngine, config: TriageConfig) -> Self {
        Self {
            nlu,
            rules,
            store: Mutex::new(SessionStore::new(config.max_sessions)),
            config,
            audit: Box::new(TracingAuditSink),
        }
    }

    pub fn with_audit_sink(mut self, sink: Box<dyn AuditSink>) -> Self {
        self.audit = sink;
        self
    }

    pub fn config(&self) -> &TriageConfig {
        &self.config
    }

    pub fn rules(&self) -> &RulesEngine {
        &self.rules
    }

    // ── Session lifecycle ────────────────────────────────────

    pub fn start_session(&self) -> Result<Uuid, SessionError> {
        let id = Uuid::new_v4();
        let evicted = self
            .store
            .lock()
            .map_err(|_| SessionError::LockPoisoned)?
            .insert(Session::new(id));
        for old in evicted {
            tracing::debug!(session_id = %old, "Session evicted");
        }
        tracing::info!(session_id = %id, "Dialogue session started");
        Ok(id)
    }

    /// Clear a session's case and history, keeping its id.
    pub fn reset_session(&self, session_id: Uuid) -> Result<(), SessionError> {
        let shared = self.shared(session_id)?;
        let mut session = shared.lock().map_err(|_| SessionError::LockPoisoned)?;
        session.reset();
        tracing::info!(session_id = %session_id, "Dialogue session reset");
        Ok(())
    }

    pub fn session_info(&self, session_id: Uuid) -> Result<SessionInfo, SessionError> {
        let shared = self.shared(session_id)?;
        let session = shared.lock().map_err(|_| SessionError::LockPoisoned)?;
        Ok(SessionInfo::from(&*session))
    }

    /// Drop a session. Returns false if it did not exist.
    pub fn end_session(&self, session_id: Uuid) -> Result<bool, SessionError> {
        let removed = self
            .store
            .lock()
            .map_err(|_| SessionError::LockPoisoned)?
            .remove(&session_id);
        if removed {
            tracing::info!(session_id = %session_id, "Dialogue session ended");
        }
        Ok(removed)
    }

    pub fn session_count(&self) -> usize {
        self.store.lock().map(|s| s.len()).unwrap_or(0)
    }

    fn shared(&self, session_id: Uuid) -> Result<super::store::SharedSession, SessionError> {
        self.store
            .lock()
            .map_err(|_| SessionError::LockPoisoned)?
            .get(&session_id)
            .ok_or(SessionError::UnknownSession(session_id))
    }

    // ── Turns ────────────────────────────────────────────────

    /// Process one user message. Turns on the same session are serialized
    /// by the session lock; the store lock is held only for the lookup.
    pub fn process_turn(
        &self,
        session_id: Uuid,
        user_text: &str,
    ) -> Result<TurnResponse, SessionError> {
        let start = Instant::now();
        let shared = self.shared(session_id)?;
        let mut session = shared.lock().map_err(|_| SessionError::LockPoisoned)?;
        if session.is_complete() {
            return Err(SessionError::AlreadyComplete(session_id));
        }

        let (parsed, meta) = self.nlu.parse(user_text);
        self.audit.record_nlu(&NluRecord::from_metadata(user_text, &meta));

        let asked = session.last_asked.take();
        let mut answered = None;
        if let Some(field) = asked {
            if let Some(value) = interpret_answer(field, user_text) {
                // The parse of the same text outranks a yes/no reading of it
                let contradicted = parsed
                    .get(field)
                    .is_some_and(|parsed_value| parsed_value != value);
                if contradicted {
                    tracing::debug!(
                        session_id = %session_id,
                        field = field.as_str(),
                        "Answer contradicted by parse, keeping parsed value"
                    );
                } else if session.apply_answer(field, &value) {
                    answered = Some(field);
                }
            }
        }

        let mut detected = session.merge_parse(&parsed, &meta);
        if let Some(field) = answered {
            if !detected.contains(&field) {
                detected.insert(0, field);
            }
        }
        if session.infer_missing_profile() && !detected.contains(&CaseField::Profile) {
            detected.push(CaseField::Profile);
        }
        session.record_turn(user_text, asked, detected.clone());
        let trace = TurnTrace::new(&meta, detected, answered);

        let response = self.advance(&mut session, user_text, trace);
        tracing::info!(
            session_id = %session_id,
            turn = session.turn_count(),
            kind = ?response.kind,
            fields = session.case.detected_field_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Dialogue turn processed"
        );
        Ok(response)
    }

    fn advance(&self, session: &mut Session, user_text: &str, trace: TurnTrace) -> TurnResponse {
        let signal = has_clinical_signal(&session.case);

        if session.awaiting_detail {
            session.awaiting_detail = false;
            if !signal {
                let recommendation = messages::safety_recommendation(&session.case);
                let check = StopCheck {
                    reason: Some(EndReason::InsufficientDescription),
                    criteria_ratio: stopping::criteria_ratio(&session.case),
                    absolute_criteria: stopping::absolute_criteria(&session.case),
                };
                return self.finish(session, check, recommendation, trace);
            }
        } else if session.turn_count() == 1
            && !signal
            && token_count(user_text) < self.config.short_input_token_limit
        {
            session.awaiting_detail = true;
            session.detail_requested = true;
            let message =
                messages::clarification(!trace.detected.is_empty(), messages::DETAIL_REQUEST);
            return self.question(session, message, None, trace, None);
        }

        let provisional = self.rules.evaluate(&session.case);
        let check = stopping::check(&session.case, provisional.urgency, &self.config);
        if check.should_stop() {
            return self.finish(session, check, provisional, trace);
        }

        match next_question(&session.case, &session.asked_fields) {
            Some(q) => {
                session.mark_asked(q.field);
                let message = messages::clarification(!trace.detected.is_empty(), q.text);
                self.question(session, message, Some(q.field), trace, Some(check))
            }
            None => {
                let check = StopCheck {
                    reason: Some(EndReason::NoMoreQuestions),
                    ..check
                };
                self.finish(session, check, provisional, trace)
            }
        }
    }

    fn question(
        &self,
        session: &mut Session,
        message: String,
        next_field: Option<CaseField>,
        trace: TurnTrace,
        check: Option<StopCheck>,
    ) -> TurnResponse {
        session.state = DialogueState::Collecting;
        let diagnostic = self.config.include_diagnostics.then(|| TurnDiagnostic {
            state: session.state,
            end_reason: None,
            nlu_method: trace.method,
            nlu_confidence: trace.confidence,
            detected_fields: trace.detected,
            answered_field: trace.answered,
            criteria_ratio: check.map_or_else(
                || stopping::criteria_ratio(&session.case),
                |c| c.criteria_ratio,
            ),
            absolute_criteria: check.map_or_else(
                || stopping::absolute_criteria(&session.case),
                |c| c.absolute_criteria,
            ),
            applied_rule_id: None,
        });
        TurnResponse {
            session_id: session.id,
            message,
            kind: TurnKind::Question,
            should_continue: true,
            case_snapshot: session.case.clone(),
            next_field,
            recommendation: None,
            diagnostic,
        }
    }

    /// Close the session on `recommendation`, which was evaluated on the
    /// final case, and record the decision.
    fn finish(
        &self,
        session: &mut Session,
        check: StopCheck,
        recommendation: ImagingRecommendation,
        trace: TurnTrace,
    ) -> TurnResponse {
        let reason = check.reason.unwrap_or(EndReason::NoMoreQuestions);
        let emergency =
            reason == EndReason::Emergency || recommendation.urgency == Urgency::Immediate;
        let reached = if emergency {
            DialogueState::Emergency
        } else {
            DialogueState::Sufficient
        };
        tracing::debug!(
            session_id = %session.id,
            state = ?reached,
            reason = reason.as_str(),
            "Dialogue stopping"
        );

        let message = messages::final_message(&recommendation, &session.special_patterns);
        self.audit.record_decision(
            &DecisionRecord::new(session.id, &recommendation, session.last_confidence)
                .with_extra("end_reason", reason.as_str())
                .with_extra("turns", session.turn_count()),
        );

        session.state = DialogueState::Complete;
        session.end_reason = Some(reason);
        session.recommendation = Some(recommendation.clone());

        let diagnostic = self.config.include_diagnostics.then(|| TurnDiagnostic {
            state: reached,
            end_reason: Some(reason),
            nlu_method: trace.method,
            nlu_confidence: trace.confidence,
            detected_fields: trace.detected,
            answered_field: trace.answered,
            criteria_ratio: check.criteria_ratio,
            absolute_criteria: check.absolute_criteria,
            applied_rule_id: recommendation.applied_rule_id.clone(),
        });
        TurnResponse {
            session_id: session.id,
            message,
            kind: if emergency {
                TurnKind::Emergency
            } else {
                TurnKind::Recommendation
            },
            should_continue: false,
            case_snapshot: session.case.clone(),
            next_field: None,
            recommendation: Some(recommendation),
            diagnostic,
        }
    }
}

/// Anything beyond demographics counts as a clinical signal.
fn has_clinical_signal(case: &HeadacheCase) -> bool {
    case.detected_fields().iter().any(|f| {
        !matches!(
            f,
            CaseField::Age
                | CaseField::Sex
                | CaseField::PregnancyPostpartum
                | CaseField::PregnancyTrimester
        )
    })
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::models::{Onset, Profile, Sex};

    fn manager_with(config: TriageConfig) -> (DialogueManager, Arc<MemoryAuditSink>) {
        let sink = Arc::new(MemoryAuditSink::new());
        let nlu = HybridNlu::rules_only(&config);
        let manager = DialogueManager::with_parts(nlu, RulesEngine::default(), config)
            .with_audit_sink(Box::new(Arc::clone(&sink)));
        (manager, sink)
    }

    fn manager() -> (DialogueManager, Arc<MemoryAuditSink>) {
        manager_with(TriageConfig::default())
    }

    #[test]
    fn thunderclap_ends_on_first_turn() {
        let (m, sink) = manager();
        let id = m.start_session().unwrap();
        let r = m
            .process_turn(
                id,
                "Patient de 45 ans, céphalée brutale en coup de tonnerre il y a une heure",
            )
            .unwrap();

        assert_eq!(r.kind, TurnKind::Emergency);
        assert!(!r.should_continue);
        assert!(r.message.starts_with("URGENCE MÉDICALE DÉTECTÉE"));
        let rec = r.recommendation.unwrap();
        assert_eq!(rec.urgency, Urgency::Immediate);
        assert_eq!(rec.applied_rule_id.as_deref(), Some("HSA_001"));
        assert_eq!(r.case_snapshot.onset, Onset::Thunderclap);

        let diag = r.diagnostic.unwrap();
        assert_eq!(diag.state, DialogueState::Emergency);
        assert_eq!(diag.end_reason, Some(EndReason::Emergency));

        let decisions = sink.decisions();
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].case_id, id);
        assert_eq!(decisions[0].rule_matched.as_deref(), Some("HSA_001"));
        assert_eq!(sink.nlu_records().len(), 1);
        assert_eq!(
            m.session_info(id).unwrap().state,
            DialogueState::Complete
        );
    }

    #[test]
    fn question_answer_cycle() {
        let (m, _) = manager();
        let id = m.start_session().unwrap();
        let r = m
            .process_turn(id, "Homme de 40 ans, céphalée progressive depuis 2 jours")
            .unwrap();
        assert_eq!(r.kind, TurnKind::Question);
        assert!(r.should_continue);
        assert_eq!(r.next_field, Some(CaseField::Fever));
        assert!(r.message.starts_with(messages::ACKNOWLEDGMENT));
        assert_eq!(r.case_snapshot.profile, Profile::Acute);

        let r = m.process_turn(id, "non").unwrap();
        assert_eq!(r.case_snapshot.fever, Some(false));
        assert_eq!(r.next_field, Some(CaseField::MeningealSigns));
        let diag = r.diagnostic.unwrap();
        assert_eq!(diag.answered_field, Some(CaseField::Fever));

        let info = m.session_info(id).unwrap();
        assert_eq!(info.turn_count, 2);
        assert_eq!(info.asked_fields, vec![CaseField::Fever, CaseField::MeningealSigns]);
    }

    fn asked_about_fever(m: &DialogueManager) -> Uuid {
        let id = m.start_session().unwrap();
        let r = m
            .process_turn(id, "Homme de 40 ans, céphalée progressive depuis 2 jours")
            .unwrap();
        assert_eq!(r.next_field, Some(CaseField::Fever));
        id
    }

    #[test]
    fn dont_know_answer_leaves_field_unknown() {
        let (m, _) = manager();
        let id = asked_about_fever(&m);
        let r = m.process_turn(id, "je ne sais pas").unwrap();
        assert_eq!(r.case_snapshot.fever, None);
        assert_eq!(r.diagnostic.unwrap().answered_field, None);
        assert_ne!(r.next_field, Some(CaseField::Fever));
    }

    #[test]
    fn yes_with_another_negated_sign_keeps_fever() {
        let (m, _) = manager();
        let id = asked_about_fever(&m);
        let r = m
            .process_turn(id, "oui, 39.5 de température, pas de raideur de nuque")
            .unwrap();
        assert_eq!(r.case_snapshot.fever, Some(true));
        assert_eq!(r.case_snapshot.meningeal_signs, Some(false));
    }

    #[test]
    fn answer_contradicted_by_same_turn_parse_is_not_stored() {
        let (m, _) = manager();
        let id = asked_about_fever(&m);
        let r = m.process_turn(id, "oui mais apyrétique ce matin").unwrap();
        assert_eq!(r.case_snapshot.fever, Some(false));
        assert_eq!(r.diagnostic.unwrap().answered_field, None);
    }

    #[test]
    fn fields_are_never_asked_twice() {
        let (m, _) = manager();
        let id = m.start_session().unwrap();
        m.process_turn(id, "Homme de 40 ans, céphalée progressive depuis 2 jours")
            .unwrap();
        // Unintelligible answer: the question is not repeated
        let r = m.process_turn(id, "hmm je vois").unwrap();
        assert_ne!(r.next_field, Some(CaseField::Fever));
        assert!(r.case_snapshot.fever.is_none());
    }

    #[test]
    fn dialogue_runs_to_a_recommendation() {
        let (m, sink) = manager();
        let id = m.start_session().unwrap();
        let mut r = m
            .process_turn(id, "Homme de 40 ans, céphalée progressive depuis 2 jours")
            .unwrap();
        let mut turns = 1;
        while r.should_continue {
            let answer = match r.next_field {
                Some(CaseField::Intensity) => "5",
                Some(CaseField::HeadacheProfile) => "en étau, bilatérale",
                Some(CaseField::Duration) => "48",
                _ => "non",
            };
            r = m.process_turn(id, answer).unwrap();
            turns += 1;
            assert!(turns < 20, "dialogue did not terminate");
        }
        assert_eq!(r.kind, TurnKind::Recommendation);
        assert!(r.recommendation.is_some());
        assert!(r.message.contains("Outil d'aide à la décision"));
        assert_eq!(sink.decisions().len(), 1);
        assert!(matches!(
            m.process_turn(id, "encore"),
            Err(SessionError::AlreadyComplete(_))
        ));
    }

    #[test]
    fn chronic_stable_headache_ends_after_pattern_question() {
        let (m, _) = manager();
        let id = m.start_session().unwrap();
        let r = m
            .process_turn(
                id,
                "Femme de 35 ans, céphalées chroniques depuis des années",
            )
            .unwrap();
        assert_eq!(r.next_field, Some(CaseField::RecentPatternChange));

        let r = m.process_turn(id, "non").unwrap();
        assert!(!r.should_continue);
        assert_eq!(
            r.diagnostic.unwrap().end_reason,
            Some(EndReason::ChronicStableNoUrgency)
        );
        assert_eq!(r.recommendation.unwrap().urgency, Urgency::None);
    }

    #[test]
    fn short_demographic_input_asks_for_detail_once() {
        let (m, _) = manager();
        let id = m.start_session().unwrap();
        let r = m.process_turn(id, "Femme de 30 ans").unwrap();
        assert_eq!(r.kind, TurnKind::Question);
        assert!(r.next_field.is_none());
        assert!(r.message.contains(messages::DETAIL_REQUEST));
        assert_eq!(r.case_snapshot.sex, Sex::Female);

        let r = m.process_turn(id, "rien d'autre").unwrap();
        assert!(!r.should_continue);
        let rec = r.recommendation.unwrap();
        assert_eq!(rec.applied_rule_id.as_deref(), Some("SAFETY_GENERIC"));
        assert_eq!(
            r.diagnostic.unwrap().end_reason,
            Some(EndReason::InsufficientDescription)
        );
    }

    #[test]
    fn detail_after_request_resumes_questions() {
        let (m, _) = manager();
        let id = m.start_session().unwrap();
        m.process_turn(id, "Homme de 62 ans").unwrap();
        let r = m
            .process_turn(id, "céphalée progressive depuis 3 jours, pas de fièvre")
            .unwrap();
        assert!(r.should_continue);
        assert_eq!(r.case_snapshot.fever, Some(false));
        assert!(r.next_field.is_some());
    }

    #[test]
    fn unknown_session_is_an_error() {
        let (m, _) = manager();
        let missing = Uuid::new_v4();
        assert!(matches!(
            m.process_turn(missing, "bonjour"),
            Err(SessionError::UnknownSession(id)) if id == missing
        ));
        assert!(m.session_info(missing).is_err());
        assert!(m.reset_session(missing).is_err());
    }

    #[test]
    fn reset_and_end_session() {
        let (m, _) = manager();
        let id = m.start_session().unwrap();
        m.process_turn(id, "Homme de 40 ans, céphalée progressive depuis 2 jours")
            .unwrap();

        m.reset_session(id).unwrap();
        let info = m.session_info(id).unwrap();
        assert_eq!(info.turn_count, 0);
        assert!(info.case.age.is_none());

        assert!(m.end_session(id).unwrap());
        assert!(!m.end_session(id).unwrap());
        assert_eq!(m.session_count(), 0);
    }

    #[test]
    fn oldest_session_is_evicted() {
        let config = TriageConfig {
            max_sessions: 2,
            ..Default::default()
        };
        let (m, _) = manager_with(config);
        let first = m.start_session().unwrap();
        m.start_session().unwrap();
        m.start_session().unwrap();
        assert_eq!(m.session_count(), 2);
        assert!(m.session_info(first).is_err());
    }

    #[test]
    fn diagnostics_can_be_disabled() {
        let config = TriageConfig {
            include_diagnostics: false,
            ..Default::default()
        };
        let (m, _) = manager_with(config);
        let id = m.start_session().unwrap();
        let r = m
            .process_turn(id, "Homme de 40 ans, céphalée progressive depuis 2 jours")
            .unwrap();
        assert!(r.diagnostic.is_none());
    }

    #[test]
    fn sessions_run_in_parallel() {
        let (m, sink) = manager();
        let ids: Vec<Uuid> = (0..4).map(|_| m.start_session().unwrap()).collect();
        std::thread::scope(|scope| {
            for id in &ids {
                let m = &m;
                scope.spawn(move || {
                    let r = m
                        .process_turn(*id, "Céphalée brutale en coup de tonnerre, patient de 50 ans")
                        .unwrap();
                    assert_eq!(r.kind, TurnKind::Emergency);
                });
            }
        });
        assert_eq!(sink.decisions().len(), 4);
    }
}
