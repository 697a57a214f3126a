use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Error type for parsing or constructing an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: &'static str,
}

impl ParseIdError {
    fn new(kind: &'static str) -> Self {
        Self { kind }
    }
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from string", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

fn non_blank(kind: &'static str, raw: &str) -> Result<String, ParseIdError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ParseIdError::new(kind));
    }
    Ok(trimmed.to_owned())
}

//
// ─── STRING IDS ────────────────────────────────────────────────────────────────
//

/// Stable identifier of a learner, supplied by the identity step.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LearnerId(String);

impl LearnerId {
    /// Creates a new `LearnerId` from a non-blank string.
    ///
    /// # Errors
    ///
    /// Returns `ParseIdError` if the value is empty after trimming.
    pub fn new(id: impl AsRef<str>) -> Result<Self, ParseIdError> {
        non_blank("LearnerId", id.as_ref()).map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Unique, stable identifier of an authored question (`q_id`).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuestionId(String);

impl QuestionId {
    /// Creates a new `QuestionId` from a non-blank string.
    ///
    /// # Errors
    ///
    /// Returns `ParseIdError` if the value is empty after trimming.
    pub fn new(id: impl AsRef<str>) -> Result<Self, ParseIdError> {
        non_blank("QuestionId", id.as_ref()).map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Subject tag shared by questions, stats and sessions (e.g. `physics`).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Subject(String);

impl Subject {
    /// Creates a new `Subject` from a non-blank string.
    ///
    /// # Errors
    ///
    /// Returns `ParseIdError` if the value is empty after trimming.
    pub fn new(key: impl AsRef<str>) -> Result<Self, ParseIdError> {
        non_blank("Subject", key.as_ref()).map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identifier of a practice session.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generates a fresh random `SessionId`.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn value(&self) -> Uuid {
        self.0
    }
}

/// Composite key of a stats record: one per (learner, question) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatKey {
    pub learner: LearnerId,
    pub question: QuestionId,
}

impl StatKey {
    #[must_use]
    pub fn new(learner: LearnerId, question: QuestionId) -> Self {
        Self { learner, question }
    }

    /// Concatenated document key, `{learner}__{question}`.
    #[must_use]
    pub fn doc_id(&self) -> String {
        format!("{}__{}", self.learner, self.question)
    }
}

// ─── Debug / Display Implementations ───────────────────────────────────────────

impl fmt::Debug for LearnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LearnerId({})", self.0)
    }
}

impl fmt::Debug for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QuestionId({})", self.0)
    }
}

impl fmt::Debug for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Subject({})", self.0)
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

impl fmt::Display for LearnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─── FromStr Implementations ───────────────────────────────────────────────────

impl FromStr for LearnerId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl FromStr for QuestionId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl FromStr for Subject {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl FromStr for SessionId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(SessionId)
            .map_err(|_| ParseIdError::new("SessionId"))
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn learner_id_trims_whitespace() {
        let id = LearnerId::new("  chiao ").unwrap();
        assert_eq!(id.as_str(), "chiao");
        assert_eq!(id.to_string(), "chiao");
    }

    #[test]
    fn blank_ids_are_rejected() {
        assert!(LearnerId::new("   ").is_err());
        assert!("".parse::<QuestionId>().is_err());
        assert!(Subject::new("\t").is_err());
    }

    #[test]
    fn stat_key_doc_id_joins_with_double_underscore() {
        let key = StatKey::new(
            LearnerId::new("ashley").unwrap(),
            QuestionId::new("phy-001").unwrap(),
        );
        assert_eq!(key.doc_id(), "ashley__phy-001");
    }

    #[test]
    fn session_id_parses_its_display_form() {
        let id = SessionId::generate();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<SessionId>().is_err());
    }
}
