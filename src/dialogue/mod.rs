//! Multi-turn triage dialogue: sessions, clarification questions,
//! stopping criteria and the manager that drives them.

pub mod manager;
pub mod messages;
pub mod questions;
pub mod session;
pub mod stopping;
pub mod store;

use thiserror::Error;
use uuid::Uuid;

pub use manager::{DialogueManager, SessionInfo, TurnDiagnostic, TurnKind, TurnResponse};
pub use questions::{interpret_answer, next_question, target_fields, Question};
pub use session::{DialogueState, EndReason, Session};
pub use stopping::StopCheck;
pub use store::SessionStore;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Unknown session: {0}")]
    UnknownSession(Uuid),

    #[error("Session {0} is complete; start a new session")]
    AlreadyComplete(Uuid),

    #[error("Session lock poisoned")]
    LockPoisoned,
}
