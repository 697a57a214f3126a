use thiserror::Error;

use crate::model::{
    AnswerError, ParseIdError, QuestionDocError, SessionStateError, SettingsError,
    StatRecordError,
};

/// Umbrella error for callers that do not care which model rule failed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Id(#[from] ParseIdError),
    #[error(transparent)]
    QuestionDoc(#[from] QuestionDocError),
    #[error(transparent)]
    StatRecord(#[from] StatRecordError),
    #[error(transparent)]
    Answer(#[from] AnswerError),
    #[error(transparent)]
    SessionState(#[from] SessionStateError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}
