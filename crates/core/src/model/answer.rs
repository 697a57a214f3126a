use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{LearnerId, QuestionId, SessionId, Subject};
use crate::model::question::{Question, QuestionKind};
use crate::model::stats::Verdict;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnswerError {
    #[error("response {response} does not fit a {kind} question")]
    ResponseMismatch {
        kind: QuestionKind,
        response: &'static str,
    },
}

/// The single action a learner takes on the answer screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Response {
    /// Pick on a true/false question.
    TrueFalse(bool),
    /// Flip a card to see its back.
    Revealed,
}

impl Response {
    /// Stored label: `TRUE`, `FALSE` or `REVEALED`.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::TrueFalse(true) => "TRUE",
            Self::TrueFalse(false) => "FALSE",
            Self::Revealed => "REVEALED",
        }
    }

    /// Inverse of `label`.
    #[must_use]
    pub fn from_label(raw: &str) -> Option<Self> {
        match raw.trim() {
            "TRUE" => Some(Self::TrueFalse(true)),
            "FALSE" => Some(Self::TrueFalse(false)),
            "REVEALED" => Some(Self::Revealed),
            _ => None,
        }
    }
}

//
// ─── RECORD ────────────────────────────────────────────────────────────────────
//

/// In-memory record of one answered question within a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub question_id: QuestionId,
    pub topic: String,
    pub kind: QuestionKind,
    pub read_ms: u64,
    pub answer_ms: u64,
    pub is_correct: bool,
    pub response: Response,
}

impl Record {
    /// Score `response` against `question`.
    ///
    /// True/false answers are compared with the key; cards are self-assessed
    /// and always count as correct. Answer time is 0 because there is no
    /// separate confirm step.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError::ResponseMismatch` when the response kind does not
    /// fit the question type.
    pub fn evaluate(
        question: &Question,
        response: Response,
        read_ms: u64,
    ) -> Result<Self, AnswerError> {
        let is_correct = match (question.kind, response) {
            (QuestionKind::TrueFalse, Response::TrueFalse(pick)) => {
                pick == question.expects_true()
            }
            (QuestionKind::Card, Response::Revealed) => true,
            (kind, response) => {
                return Err(AnswerError::ResponseMismatch {
                    kind,
                    response: response.label(),
                });
            }
        };

        Ok(Self {
            question_id: question.id.clone(),
            topic: question.topic.clone(),
            kind: question.kind,
            read_ms,
            answer_ms: 0,
            is_correct,
            response,
        })
    }

    #[must_use]
    pub fn total_ms(&self) -> u64 {
        self.read_ms.saturating_add(self.answer_ms)
    }
}

//
// ─── ANSWER ────────────────────────────────────────────────────────────────────
//

/// Durable, append-only copy of a record with its session context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub session_id: SessionId,
    pub learner: LearnerId,
    pub learner_name: Option<String>,
    pub subject: Subject,
    pub question_id: QuestionId,
    pub kind: QuestionKind,
    pub topic: String,
    pub response: Response,
    pub is_correct: bool,
    pub verdict: Verdict,
    pub read_ms: u64,
    pub answer_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl Answer {
    /// Total time spent on the question (`read_ms + answer_ms`).
    #[must_use]
    pub fn time_ms(&self) -> u64 {
        self.read_ms.saturating_add(self.answer_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(kind: QuestionKind, key: &str) -> Question {
        Question {
            id: QuestionId::new("q1").unwrap(),
            subject: Subject::new("physics").unwrap(),
            kind,
            topic: "Waves".into(),
            statement: "Sound needs a medium.".into(),
            answer_key: key.into(),
            explanation: String::new(),
            teacher_priority: 0.0,
            force_repeat: false,
            active: true,
        }
    }

    #[test]
    fn true_key_matches_true_pick() {
        let q = question(QuestionKind::TrueFalse, "TRUE");
        assert!(Record::evaluate(&q, Response::TrueFalse(true), 10).unwrap().is_correct);
        assert!(!Record::evaluate(&q, Response::TrueFalse(false), 10).unwrap().is_correct);
    }

    #[test]
    fn key_is_normalized_before_comparison() {
        let q = question(QuestionKind::TrueFalse, "  false ");
        assert!(Record::evaluate(&q, Response::TrueFalse(false), 0).unwrap().is_correct);
        let q = question(QuestionKind::TrueFalse, "true");
        assert!(Record::evaluate(&q, Response::TrueFalse(true), 0).unwrap().is_correct);
    }

    #[test]
    fn cards_are_always_correct_and_zero_answer_time() {
        let q = question(QuestionKind::Card, "Snell's law");
        let rec = Record::evaluate(&q, Response::Revealed, 1_500).unwrap();
        assert!(rec.is_correct);
        assert_eq!(rec.answer_ms, 0);
        assert_eq!(rec.total_ms(), 1_500);
    }

    #[test]
    fn mismatched_response_is_rejected() {
        let q = question(QuestionKind::Card, "");
        let err = Record::evaluate(&q, Response::TrueFalse(true), 0).unwrap_err();
        assert!(matches!(err, AnswerError::ResponseMismatch { kind: QuestionKind::Card, .. }));
    }

    #[test]
    fn labels_round_trip() {
        for r in [Response::TrueFalse(true), Response::TrueFalse(false), Response::Revealed] {
            assert_eq!(Response::from_label(r.label()), Some(r));
        }
    }
}
