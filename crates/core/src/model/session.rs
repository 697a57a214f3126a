use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::model::answer::Record;
use crate::model::ids::{LearnerId, SessionId, Subject};
use crate::model::question::QuestionKind;

/// Label used for records whose topic is blank.
pub const UNCATEGORIZED_TOPIC: &str = "(uncategorized)";

/// Number of slowest topics surfaced on the summary screen.
pub const SLOWEST_TOPICS_SHOWN: usize = 3;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionStateError {
    #[error("session already completed")]
    AlreadyCompleted,

    #[error("ended_at is before started_at")]
    InvalidTimeRange,

    #[error("completed session is missing its completion fields")]
    MissingCompletion,
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
}

impl SessionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

//
// ─── SUMMARY ───────────────────────────────────────────────────────────────────
//

/// Aggregate time spent on one topic during a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicTiming {
    pub topic: String,
    pub total_ms: u64,
    pub read_ms: u64,
    pub answer_ms: u64,
    pub count: u32,
}

/// Closing message tier picked from the true/false accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encouragement {
    /// Accuracy of 85% or more.
    Solid,
    /// Accuracy of 60% or more.
    Good,
    /// Anything lower, including rounds without true/false questions.
    KeepGoing,
}

impl Encouragement {
    #[must_use]
    pub fn from_percent(percent: u32) -> Self {
        if percent >= 85 {
            Self::Solid
        } else if percent >= 60 {
            Self::Good
        } else {
            Self::KeepGoing
        }
    }

    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::Solid => {
                "Very steady! Reread the explanations for your three slowest topics to speed up."
            }
            Self::Good => "Nice work! Sum up each of your three slowest topics in one sentence.",
            Self::KeepGoing => {
                "No worries, you found your weak spots. Redo the slowest topic and aim to halve the misses."
            }
        }
    }
}

/// End-of-round statistics computed from a session's records.
///
/// Accuracy only considers true/false records; cards are self-assessed.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    total_ms: u64,
    answered: u32,
    tf_total: u32,
    tf_correct: u32,
    topics: Vec<TopicTiming>,
}

impl SessionSummary {
    #[must_use]
    pub fn from_records(records: &[Record]) -> Self {
        let mut total_ms = 0_u64;
        let mut tf_total = 0_u32;
        let mut tf_correct = 0_u32;
        let mut by_topic: HashMap<&str, TopicTiming> = HashMap::new();

        for record in records {
            total_ms = total_ms.saturating_add(record.total_ms());
            if record.kind == QuestionKind::TrueFalse {
                tf_total = tf_total.saturating_add(1);
                if record.is_correct {
                    tf_correct = tf_correct.saturating_add(1);
                }
            }

            let label = if record.topic.trim().is_empty() {
                UNCATEGORIZED_TOPIC
            } else {
                record.topic.as_str()
            };
            let entry = by_topic.entry(label).or_insert_with(|| TopicTiming {
                topic: label.to_owned(),
                total_ms: 0,
                read_ms: 0,
                answer_ms: 0,
                count: 0,
            });
            entry.total_ms = entry.total_ms.saturating_add(record.total_ms());
            entry.read_ms = entry.read_ms.saturating_add(record.read_ms);
            entry.answer_ms = entry.answer_ms.saturating_add(record.answer_ms);
            entry.count = entry.count.saturating_add(1);
        }

        let mut topics: Vec<TopicTiming> = by_topic.into_values().collect();
        // Ties broken by name so the order is stable.
        topics.sort_by(|a, b| b.total_ms.cmp(&a.total_ms).then_with(|| a.topic.cmp(&b.topic)));

        Self {
            total_ms,
            answered: u32::try_from(records.len()).unwrap_or(u32::MAX),
            tf_total,
            tf_correct,
            topics,
        }
    }

    #[must_use]
    pub fn total_ms(&self) -> u64 {
        self.total_ms
    }

    /// Total elapsed time rounded to whole seconds.
    #[must_use]
    pub fn total_seconds(&self) -> u64 {
        self.total_ms.saturating_add(500) / 1000
    }

    #[must_use]
    pub fn answered(&self) -> u32 {
        self.answered
    }

    #[must_use]
    pub fn tf_total(&self) -> u32 {
        self.tf_total
    }

    #[must_use]
    pub fn tf_correct(&self) -> u32 {
        self.tf_correct
    }

    /// Correct true/false answers over true/false answers; 0 when there were none.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        if self.tf_total == 0 {
            0.0
        } else {
            f64::from(self.tf_correct) / f64::from(self.tf_total)
        }
    }

    /// Accuracy as a rounded percentage.
    #[must_use]
    pub fn accuracy_percent(&self) -> u32 {
        if self.tf_total == 0 {
            return 0;
        }
        (self.tf_correct * 100 + self.tf_total / 2) / self.tf_total
    }

    /// Per-topic timings, slowest first.
    #[must_use]
    pub fn topics(&self) -> &[TopicTiming] {
        &self.topics
    }

    #[must_use]
    pub fn slowest_topics(&self) -> &[TopicTiming] {
        let n = self.topics.len().min(SLOWEST_TOPICS_SHOWN);
        &self.topics[..n]
    }

    #[must_use]
    pub fn encouragement(&self) -> Encouragement {
        Encouragement::from_percent(self.accuracy_percent())
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Completion fields written when the last question is done.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionCompletion {
    pub ended_at: DateTime<Utc>,
    pub total_seconds: u64,
    pub correct_count: u32,
    pub accuracy: f64,
}

/// One practice session of a learner on a subject.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    id: SessionId,
    learner: LearnerId,
    learner_name: Option<String>,
    subject: Subject,
    started_at: DateTime<Utc>,
    total_questions: u32,
    status: SessionStatus,
    completion: Option<SessionCompletion>,
}

impl Session {
    /// A fresh session in `in_progress` status.
    #[must_use]
    pub fn start(
        id: SessionId,
        learner: LearnerId,
        learner_name: Option<String>,
        subject: Subject,
        started_at: DateTime<Utc>,
        total_questions: u32,
    ) -> Self {
        Self {
            id,
            learner,
            learner_name,
            subject,
            started_at,
            total_questions,
            status: SessionStatus::InProgress,
            completion: None,
        }
    }

    /// Rehydrate a session from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::MissingCompletion` if a completed session has
    /// no completion fields, or `InvalidTimeRange` if it ended before it started.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: SessionId,
        learner: LearnerId,
        learner_name: Option<String>,
        subject: Subject,
        started_at: DateTime<Utc>,
        total_questions: u32,
        status: SessionStatus,
        completion: Option<SessionCompletion>,
    ) -> Result<Self, SessionStateError> {
        match (status, &completion) {
            (SessionStatus::Completed, None) => return Err(SessionStateError::MissingCompletion),
            (_, Some(c)) if c.ended_at < started_at => {
                return Err(SessionStateError::InvalidTimeRange);
            }
            _ => {}
        }
        Ok(Self {
            id,
            learner,
            learner_name,
            subject,
            started_at,
            total_questions,
            status,
            completion,
        })
    }

    /// Mark the session completed with the round's summary.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::AlreadyCompleted` on a second call and
    /// `InvalidTimeRange` if `ended_at` precedes the start.
    pub fn complete(
        &mut self,
        summary: &SessionSummary,
        ended_at: DateTime<Utc>,
    ) -> Result<&SessionCompletion, SessionStateError> {
        if self.status == SessionStatus::Completed {
            return Err(SessionStateError::AlreadyCompleted);
        }
        if ended_at < self.started_at {
            return Err(SessionStateError::InvalidTimeRange);
        }
        self.status = SessionStatus::Completed;
        Ok(&*self.completion.insert(SessionCompletion {
            ended_at,
            total_seconds: summary.total_seconds(),
            correct_count: summary.tf_correct(),
            accuracy: summary.accuracy(),
        }))
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn learner(&self) -> &LearnerId {
        &self.learner
    }

    #[must_use]
    pub fn learner_name(&self) -> Option<&str> {
        self.learner_name.as_deref()
    }

    #[must_use]
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    #[must_use]
    pub fn completion(&self) -> Option<&SessionCompletion> {
        self.completion.as_ref()
    }
}
