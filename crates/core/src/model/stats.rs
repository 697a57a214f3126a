use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::ids::{LearnerId, QuestionId, StatKey, Subject};
use crate::model::question::QuestionKind;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StatRecordError {
    #[error("wrong count ({wrong}) exceeds attempts ({attempts})")]
    WrongExceedsAttempts { attempts: u32, wrong: u32 },

    #[error("outcome key {outcome} does not match record key {record}")]
    KeyMismatch { record: String, outcome: String },
}

//
// ─── FAMILIARITY ───────────────────────────────────────────────────────────────
//

/// Learner's self-reported familiarity with a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Familiarity {
    #[default]
    Unknown,
    Familiar,
    NeedsPractice,
    Mastered,
}

impl Familiarity {
    /// Lenient parse; anything unrecognised is `Unknown`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "familiar" => Self::Familiar,
            "needs_practice" => Self::NeedsPractice,
            "mastered" => Self::Mastered,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Familiar => "familiar",
            Self::NeedsPractice => "needs_practice",
            Self::Mastered => "mastered",
        }
    }
}

impl fmt::Display for Familiarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The verdict a learner must pick on the feedback screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Familiar,
    NeedsPractice,
    Mastered,
}

impl Verdict {
    #[must_use]
    pub fn familiarity(self) -> Familiarity {
        match self {
            Self::Familiar => Familiarity::Familiar,
            Self::NeedsPractice => Familiarity::NeedsPractice,
            Self::Mastered => Familiarity::Mastered,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.familiarity().as_str()
    }

    /// Strict parse; `unknown` is not a verdict.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match Familiarity::parse(raw) {
            Familiarity::Familiar => Some(Self::Familiar),
            Familiarity::NeedsPractice => Some(Self::NeedsPractice),
            Familiarity::Mastered => Some(Self::Mastered),
            Familiarity::Unknown => None,
        }
    }
}

//
// ─── LAST RESULT ───────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LastResult {
    #[serde(rename = "correct")]
    Correct,
    #[serde(rename = "wrong")]
    Wrong,
    /// Self-assessed card; there is no objective result.
    #[serde(rename = "n/a")]
    NotApplicable,
}

impl LastResult {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "correct" => Some(Self::Correct),
            "wrong" => Some(Self::Wrong),
            "n/a" => Some(Self::NotApplicable),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Correct => "correct",
            Self::Wrong => "wrong",
            Self::NotApplicable => "n/a",
        }
    }
}

//
// ─── OUTCOME ───────────────────────────────────────────────────────────────────
//

/// Everything needed to merge one answered question into a learner's stats.
///
/// Persistence layers apply this as a single atomic merge keyed by
/// (learner, question) instead of a separate read and write.
#[derive(Debug, Clone, PartialEq)]
pub struct StatOutcome {
    pub key: StatKey,
    pub subject: Subject,
    pub topic: String,
    pub counts_as_wrong: bool,
    pub familiarity: Familiarity,
    pub needs_practice_until: Option<DateTime<Utc>>,
    pub last_result: LastResult,
    pub recorded_at: DateTime<Utc>,
}

impl StatOutcome {
    /// Build the outcome of a verdict on an answered question.
    ///
    /// `wrong` only moves for an incorrect true/false answer, and
    /// `needs_practice_until` is `recorded_at + horizon` only for
    /// `Verdict::NeedsPractice`.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn from_verdict(
        learner: LearnerId,
        question: QuestionId,
        subject: Subject,
        topic: impl Into<String>,
        kind: QuestionKind,
        is_correct: bool,
        verdict: Verdict,
        recorded_at: DateTime<Utc>,
        horizon: Duration,
    ) -> Self {
        let (counts_as_wrong, last_result) = match kind {
            QuestionKind::TrueFalse if is_correct => (false, LastResult::Correct),
            QuestionKind::TrueFalse => (true, LastResult::Wrong),
            QuestionKind::Card => (false, LastResult::NotApplicable),
        };
        let needs_practice_until =
            (verdict == Verdict::NeedsPractice).then(|| recorded_at + horizon);

        Self {
            key: StatKey::new(learner, question),
            subject,
            topic: topic.into(),
            counts_as_wrong,
            familiarity: verdict.familiarity(),
            needs_practice_until,
            last_result,
            recorded_at,
        }
    }
}

//
// ─── STAT RECORD ───────────────────────────────────────────────────────────────
//

/// Durable performance record for one (learner, question) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct StatRecord {
    key: StatKey,
    subject: Subject,
    topic: String,
    attempts: u32,
    wrong: u32,
    familiarity: Familiarity,
    needs_practice_until: Option<DateTime<Utc>>,
    last_result: Option<LastResult>,
    updated_at: DateTime<Utc>,
}

impl StatRecord {
    /// Rehydrate a record from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `StatRecordError::WrongExceedsAttempts` if `wrong > attempts`.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        key: StatKey,
        subject: Subject,
        topic: String,
        attempts: u32,
        wrong: u32,
        familiarity: Familiarity,
        needs_practice_until: Option<DateTime<Utc>>,
        last_result: Option<LastResult>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, StatRecordError> {
        if wrong > attempts {
            return Err(StatRecordError::WrongExceedsAttempts { attempts, wrong });
        }
        Ok(Self {
            key,
            subject,
            topic,
            attempts,
            wrong,
            familiarity,
            needs_practice_until,
            last_result,
            updated_at,
        })
    }

    /// Record created by the very first answer to a question.
    #[must_use]
    pub fn first(outcome: &StatOutcome) -> Self {
        Self {
            key: outcome.key.clone(),
            subject: outcome.subject.clone(),
            topic: outcome.topic.clone(),
            attempts: 1,
            wrong: u32::from(outcome.counts_as_wrong),
            familiarity: outcome.familiarity,
            needs_practice_until: outcome.needs_practice_until,
            last_result: Some(outcome.last_result),
            updated_at: outcome.recorded_at,
        }
    }

    /// Merge an outcome into `existing`, or create the record if absent.
    ///
    /// # Errors
    ///
    /// Returns `StatRecordError::KeyMismatch` if the keys differ.
    pub fn merge(existing: Option<&Self>, outcome: &StatOutcome) -> Result<Self, StatRecordError> {
        let Some(current) = existing else {
            return Ok(Self::first(outcome));
        };
        if current.key != outcome.key {
            return Err(StatRecordError::KeyMismatch {
                record: current.key.doc_id(),
                outcome: outcome.key.doc_id(),
            });
        }

        let attempts = current.attempts.saturating_add(1);
        let wrong = if outcome.counts_as_wrong {
            current.wrong.saturating_add(1)
        } else {
            current.wrong
        }
        .min(attempts);

        Ok(Self {
            key: current.key.clone(),
            subject: outcome.subject.clone(),
            topic: outcome.topic.clone(),
            attempts,
            wrong,
            familiarity: outcome.familiarity,
            needs_practice_until: outcome.needs_practice_until,
            last_result: Some(outcome.last_result),
            updated_at: outcome.recorded_at,
        })
    }

    #[must_use]
    pub fn key(&self) -> &StatKey {
        &self.key
    }

    #[must_use]
    pub fn learner(&self) -> &LearnerId {
        &self.key.learner
    }

    #[must_use]
    pub fn question(&self) -> &QuestionId {
        &self.key.question
    }

    #[must_use]
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub fn wrong(&self) -> u32 {
        self.wrong
    }

    /// `wrong / attempts`, or 0 when never attempted.
    #[must_use]
    pub fn wrong_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            f64::from(self.wrong) / f64::from(self.attempts)
        }
    }

    #[must_use]
    pub fn familiarity(&self) -> Familiarity {
        self.familiarity
    }

    #[must_use]
    pub fn needs_practice_until(&self) -> Option<DateTime<Utc>> {
        self.needs_practice_until
    }

    #[must_use]
    pub fn last_result(&self) -> Option<LastResult> {
        self.last_result
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

//
// ─── INGESTION ─────────────────────────────────────────────────────────────────
//

/// Loosely typed stats document from the `user_question_stats` collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatDoc {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub q_id: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub core_topic: Option<String>,
    #[serde(default)]
    pub attempts: Option<i64>,
    #[serde(default)]
    pub wrong: Option<i64>,
    #[serde(default)]
    pub familiarity: Option<String>,
    #[serde(default)]
    pub needs_practice_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_result: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl StatDoc {
    /// Normalise into a `StatRecord`. Missing or out-of-range counters fall
    /// back to zero and `wrong` is clamped to `attempts`. Returns `None` only
    /// when the document cannot be keyed (no learner, question or subject).
    #[must_use]
    pub fn normalize(self, fallback_time: DateTime<Utc>) -> Option<StatRecord> {
        let learner = LearnerId::new(self.user_id?).ok()?;
        let question = QuestionId::new(self.q_id?).ok()?;
        let subject = Subject::new(self.subject?).ok()?;

        let attempts = self
            .attempts
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(0);
        let wrong = self
            .wrong
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(0)
            .min(attempts);

        Some(StatRecord {
            key: StatKey::new(learner, question),
            subject,
            topic: self.core_topic.unwrap_or_default(),
            attempts,
            wrong,
            familiarity: self
                .familiarity
                .as_deref()
                .map_or(Familiarity::Unknown, Familiarity::parse),
            needs_practice_until: self.needs_practice_until,
            last_result: self.last_result.as_deref().and_then(LastResult::parse),
            updated_at: self.updated_at.unwrap_or(fallback_time),
        })
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
