//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{AnswerError, SessionStateError};
use storage::repository::StorageError;

use crate::sessions::Phase;

/// Errors emitted by session services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no learner selected")]
    MissingLearner,
    #[error("no subject selected")]
    MissingSubject,
    #[error("round has no questions")]
    Empty,
    #[error("expected the {expected} step, session is on {actual}")]
    WrongPhase { expected: Phase, actual: Phase },
    #[error("round is not finished")]
    NotFinished,
    #[error(transparent)]
    Answer(#[from] AnswerError),
    #[error(transparent)]
    State(#[from] SessionStateError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SessionError {
    /// Whether the shell should send the learner back to identity or subject
    /// selection.
    #[must_use]
    pub fn is_prerequisite(&self) -> bool {
        matches!(self, Self::MissingLearner | Self::MissingSubject)
    }
}
