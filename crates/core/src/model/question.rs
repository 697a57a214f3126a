use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::ids::{QuestionId, Subject};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Reasons a question document is rejected at the ingestion boundary.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum QuestionDocError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("unsupported question type: {0}")]
    UnsupportedType(String),

    #[error("teacher_priority must be a non-negative number, got {0}")]
    InvalidPriority(f64),
}

//
// ─── QUESTION KIND ─────────────────────────────────────────────────────────────
//

/// Question type served by the trainer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionKind {
    /// True/false statement with an objective answer key.
    #[serde(rename = "TF")]
    TrueFalse,
    /// Flip card, self-assessed.
    #[serde(rename = "CARD")]
    Card,
}

impl QuestionKind {
    /// Parses a raw type tag. Case and surrounding whitespace are ignored and
    /// `FLASHCARD` is accepted as an alias of `CARD`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "TF" => Some(Self::TrueFalse),
            "CARD" | "FLASHCARD" => Some(Self::Card),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TrueFalse => "TF",
            Self::Card => "CARD",
        }
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A validated, immutable question from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub subject: Subject,
    pub kind: QuestionKind,
    pub topic: String,
    pub statement: String,
    pub answer_key: String,
    pub explanation: String,
    pub teacher_priority: f64,
    pub force_repeat: bool,
    pub active: bool,
}

impl Question {
    /// For true/false questions: whether the statement is true.
    #[must_use]
    pub fn expects_true(&self) -> bool {
        self.answer_key.trim().eq_ignore_ascii_case("TRUE")
    }

    #[must_use]
    pub fn is_true_false(&self) -> bool {
        self.kind == QuestionKind::TrueFalse
    }
}

//
// ─── INGESTION ─────────────────────────────────────────────────────────────────
//

/// Loosely typed question document, as stored in the `questions` collection
/// or found in an import file. Every field is optional here; `validate`
/// decides which ones are required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionDoc {
    #[serde(default)]
    pub q_id: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub core_topic: Option<String>,
    #[serde(default)]
    pub statement: Option<String>,
    #[serde(default)]
    pub answer_key: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default, deserialize_with = "loose_number")]
    pub teacher_priority: Option<f64>,
    #[serde(default, deserialize_with = "loose_flag")]
    pub force_repeat: Option<bool>,
    #[serde(default, deserialize_with = "loose_flag")]
    pub active: Option<bool>,
}

/// Any scalar a hand-edited document store may hold for a number or flag.
#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Bool(bool),
    Number(f64),
    Text(String),
    Other(#[allow(dead_code)] IgnoredAny),
}

/// Numbers, numeric strings and booleans (as 1/0). Anything else is absent.
fn loose_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(match Option::<Loose>::deserialize(d)? {
        Some(Loose::Number(n)) => Some(n),
        Some(Loose::Bool(b)) => Some(if b { 1.0 } else { 0.0 }),
        Some(Loose::Text(s)) => s.trim().parse().ok(),
        Some(Loose::Other(_)) | None => None,
    })
}

/// Booleans, non-zero numbers and `true`/`1`/`yes` strings.
fn loose_flag<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    Ok(match Option::<Loose>::deserialize(d)? {
        Some(Loose::Bool(b)) => Some(b),
        Some(Loose::Number(n)) => Some(n != 0.0),
        Some(Loose::Text(s)) => Some(matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes"
        )),
        Some(Loose::Other(_)) | None => None,
    })
}

fn required(field: &'static str, value: Option<String>) -> Result<String, QuestionDocError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_owned()),
        _ => Err(QuestionDocError::MissingField(field)),
    }
}

impl QuestionDoc {
    /// Validate the document into a `Question`, filling defaults for optional
    /// fields (`teacher_priority = 0`, `force_repeat = false`, `active = false`,
    /// empty topic and explanation).
    ///
    /// # Errors
    ///
    /// Returns `QuestionDocError` when a required field is missing, the type is
    /// not served by the trainer, or the priority is negative or not finite.
    pub fn validate(self) -> Result<Question, QuestionDocError> {
        let id = QuestionId::new(required("q_id", self.q_id)?)
            .map_err(|_| QuestionDocError::MissingField("q_id"))?;
        let subject = Subject::new(required("subject", self.subject)?)
            .map_err(|_| QuestionDocError::MissingField("subject"))?;
        let raw_kind = required("type", self.kind)?;
        let kind = QuestionKind::parse(&raw_kind)
            .ok_or(QuestionDocError::UnsupportedType(raw_kind))?;
        let statement = required("statement", self.statement)?;

        // Any true/false key other than TRUE reads as false.
        let answer_key = self.answer_key.unwrap_or_default().trim().to_owned();

        let teacher_priority = self.teacher_priority.unwrap_or(0.0);
        if !teacher_priority.is_finite() || teacher_priority < 0.0 {
            return Err(QuestionDocError::InvalidPriority(teacher_priority));
        }

        Ok(Question {
            id,
            subject,
            kind,
            topic: self.core_topic.unwrap_or_default().trim().to_owned(),
            statement,
            answer_key,
            explanation: self.explanation.unwrap_or_default(),
            teacher_priority,
            force_repeat: self.force_repeat.unwrap_or(false),
            active: self.active.unwrap_or(false),
        })
    }
}

impl From<&Question> for QuestionDoc {
    fn from(q: &Question) -> Self {
        Self {
            q_id: Some(q.id.to_string()),
            subject: Some(q.subject.to_string()),
            kind: Some(q.kind.as_str().to_owned()),
            core_topic: Some(q.topic.clone()),
            statement: Some(q.statement.clone()),
            answer_key: Some(q.answer_key.clone()),
            explanation: Some(q.explanation.clone()),
            teacher_priority: Some(q.teacher_priority),
            force_repeat: Some(q.force_repeat),
            active: Some(q.active),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
