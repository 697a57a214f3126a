use async_trait::async_trait;
use quiz_core::model::{
    Answer, LearnerId, Question, QuestionId, Session, SessionId, StatKey, StatOutcome,
    StatRecord, Subject,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Read access to the question catalog, plus upsert for imports.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Insert or replace a question by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError>;

    /// Active questions of one subject, at most `limit` of them.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the catalog cannot be read.
    async fn active_questions(
        &self,
        subject: &Subject,
        limit: u32,
    ) -> Result<Vec<Question>, StorageError>;
}

/// Per-learner performance records keyed by (learner, question).
#[async_trait]
pub trait StatsRepository: Send + Sync {
    /// A learner's records for one subject, at most `limit` of them.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the records cannot be read.
    async fn stats_for_learner(
        &self,
        learner: &LearnerId,
        subject: &Subject,
        limit: u32,
    ) -> Result<Vec<StatRecord>, StorageError>;

    /// Point lookup by composite key.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the lookup fails.
    async fn get_stat(&self, key: &StatKey) -> Result<Option<StatRecord>, StorageError>;

    /// Merge one answered question into the stored record as a single atomic
    /// step, creating the record on first answer. Returns the merged record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the merge cannot be applied.
    async fn record_outcome(&self, outcome: &StatOutcome) -> Result<StatRecord, StorageError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Persist a new session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the id already exists.
    async fn create_session(&self, session: &Session) -> Result<(), StorageError>;

    /// Write status and completion fields of an existing session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session was never created.
    async fn complete_session(&self, session: &Session) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_session(&self, id: SessionId) -> Result<Session, StorageError>;
}

/// Append-only log of answers, at most one per question per session.
#[async_trait]
pub trait AnswerRepository: Send + Sync {
    /// Append an answer. A second answer for the same (session, question) is
    /// ignored and `false` is returned.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the answer cannot be stored.
    async fn append_answer(&self, answer: &Answer) -> Result<bool, StorageError>;

    /// Answers of one session, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the answers cannot be read.
    async fn answers_for_session(&self, id: SessionId) -> Result<Vec<Answer>, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    questions: Arc<Mutex<BTreeMap<QuestionId, Question>>>,
    stats: Arc<Mutex<HashMap<StatKey, StatRecord>>>,
    sessions: Arc<Mutex<HashMap<SessionId, Session>>>,
    answers: Arc<Mutex<Vec<Answer>>>,
}

fn lock<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    m.lock().map_err(|e| StorageError::Connection(e.to_string()))
}

fn cap(limit: u32) -> usize {
    usize::try_from(limit).unwrap_or(usize::MAX)
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        lock(&self.questions)?.insert(question.id.clone(), question.clone());
        Ok(())
    }

    async fn active_questions(
        &self,
        subject: &Subject,
        limit: u32,
    ) -> Result<Vec<Question>, StorageError> {
        let guard = lock(&self.questions)?;
        Ok(guard
            .values()
            .filter(|q| q.active && &q.subject == subject)
            .take(cap(limit))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl StatsRepository for InMemoryRepository {
    async fn stats_for_learner(
        &self,
        learner: &LearnerId,
        subject: &Subject,
        limit: u32,
    ) -> Result<Vec<StatRecord>, StorageError> {
        let guard = lock(&self.stats)?;
        Ok(guard
            .values()
            .filter(|s| s.learner() == learner && s.subject() == subject)
            .take(cap(limit))
            .cloned()
            .collect())
    }

    async fn get_stat(&self, key: &StatKey) -> Result<Option<StatRecord>, StorageError> {
        Ok(lock(&self.stats)?.get(key).cloned())
    }

    async fn record_outcome(&self, outcome: &StatOutcome) -> Result<StatRecord, StorageError> {
        // Merge and write under a single lock.
        let mut guard = lock(&self.stats)?;
        let merged = StatRecord::merge(guard.get(&outcome.key), outcome)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        guard.insert(outcome.key.clone(), merged.clone());
        Ok(merged)
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn create_session(&self, session: &Session) -> Result<(), StorageError> {
        let mut guard = lock(&self.sessions)?;
        if guard.contains_key(&session.id()) {
            return Err(StorageError::Conflict);
        }
        guard.insert(session.id(), session.clone());
        Ok(())
    }

    async fn complete_session(&self, session: &Session) -> Result<(), StorageError> {
        let mut guard = lock(&self.sessions)?;
        let slot = guard.get_mut(&session.id()).ok_or(StorageError::NotFound)?;
        *slot = session.clone();
        Ok(())
    }

    async fn get_session(&self, id: SessionId) -> Result<Session, StorageError> {
        lock(&self.sessions)?
            .get(&id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl AnswerRepository for InMemoryRepository {
    async fn append_answer(&self, answer: &Answer) -> Result<bool, StorageError> {
        let mut guard = lock(&self.answers)?;
        let duplicate = guard
            .iter()
            .any(|a| a.session_id == answer.session_id && a.question_id == answer.question_id);
        if duplicate {
            return Ok(false);
        }
        guard.push(answer.clone());
        Ok(true)
    }

    async fn answers_for_session(&self, id: SessionId) -> Result<Vec<Answer>, StorageError> {
        Ok(lock(&self.answers)?
            .iter()
            .filter(|a| a.session_id == id)
            .cloned()
            .collect())
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub questions: Arc<dyn QuestionRepository>,
    pub stats: Arc<dyn StatsRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub answers: Arc<dyn AnswerRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            questions: Arc::new(repo.clone()),
            stats: Arc::new(repo.clone()),
            sessions: Arc::new(repo.clone()),
            answers: Arc::new(repo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use quiz_core::model::{QuestionKind, Response, SessionSummary, Verdict};
    use quiz_core::time::fixed_now;

    fn question(id: &str, subject: &str, active: bool) -> Question {
        Question {
            id: QuestionId::new(id).unwrap(),
            subject: Subject::new(subject).unwrap(),
            kind: QuestionKind::TrueFalse,
            topic: "Forces".into(),
            statement: "Mass and weight are the same.".into(),
            answer_key: "FALSE".into(),
            explanation: String::new(),
            teacher_priority: 0.0,
            force_repeat: false,
            active,
        }
    }

    fn outcome(correct: bool, verdict: Verdict) -> StatOutcome {
        StatOutcome::from_verdict(
            LearnerId::new("ashley").unwrap(),
            QuestionId::new("q1").unwrap(),
            Subject::new("physics").unwrap(),
            "Forces",
            QuestionKind::TrueFalse,
            correct,
            verdict,
            fixed_now(),
            Duration::hours(24),
        )
    }

    fn answer(session: SessionId, q: &str) -> Answer {
        Answer {
            session_id: session,
            learner: LearnerId::new("ashley").unwrap(),
            learner_name: Some("Ashley".into()),
            subject: Subject::new("physics").unwrap(),
            question_id: QuestionId::new(q).unwrap(),
            kind: QuestionKind::TrueFalse,
            topic: "Forces".into(),
            response: Response::TrueFalse(false),
            is_correct: true,
            verdict: Verdict::Familiar,
            read_ms: 1200,
            answer_ms: 0,
            created_at: fixed_now(),
        }
    }

    #[tokio::test]
    async fn active_questions_filter_by_subject_and_flag() {
        let repo = InMemoryRepository::new();
        repo.upsert_question(&question("q1", "physics", true)).await.unwrap();
        repo.upsert_question(&question("q2", "physics", false)).await.unwrap();
        repo.upsert_question(&question("q3", "biology", true)).await.unwrap();
        repo.upsert_question(&question("q4", "physics", true)).await.unwrap();

        let physics = Subject::new("physics").unwrap();
        let found = repo.active_questions(&physics, 800).await.unwrap();
        let ids: Vec<_> = found.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["q1", "q4"]);

        let capped = repo.active_questions(&physics, 1).await.unwrap();
        assert_eq!(capped.len(), 1);
    }

    #[tokio::test]
    async fn record_outcome_merges_counters() {
        let repo = InMemoryRepository::new();
        repo.record_outcome(&outcome(false, Verdict::NeedsPractice))
            .await
            .unwrap();
        let merged = repo
            .record_outcome(&outcome(true, Verdict::Familiar))
            .await
            .unwrap();
        assert_eq!(merged.attempts(), 2);
        assert_eq!(merged.wrong(), 1);
        assert!(merged.needs_practice_until().is_none());

        let stored = repo.get_stat(merged.key()).await.unwrap().unwrap();
        assert_eq!(stored, merged);

        let listed = repo
            .stats_for_learner(
                &LearnerId::new("ashley").unwrap(),
                &Subject::new("physics").unwrap(),
                2000,
            )
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn append_answer_is_idempotent_per_question() {
        let repo = InMemoryRepository::new();
        let sid = SessionId::generate();
        assert!(repo.append_answer(&answer(sid, "q1")).await.unwrap());
        assert!(!repo.append_answer(&answer(sid, "q1")).await.unwrap());
        assert!(repo.append_answer(&answer(sid, "q2")).await.unwrap());
        assert_eq!(repo.answers_for_session(sid).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn session_lifecycle() {
        let repo = InMemoryRepository::new();
        let mut session = Session::start(
            SessionId::generate(),
            LearnerId::new("ashley").unwrap(),
            None,
            Subject::new("physics").unwrap(),
            fixed_now(),
            3,
        );
        repo.create_session(&session).await.unwrap();
        assert!(matches!(
            repo.create_session(&session).await,
            Err(StorageError::Conflict)
        ));

        session
            .complete(&SessionSummary::from_records(&[]), fixed_now())
            .unwrap();
        repo.complete_session(&session).await.unwrap();
        let stored = repo.get_session(session.id()).await.unwrap();
        assert!(stored.is_completed());

        let unknown = Session::start(
            SessionId::generate(),
            LearnerId::new("ashley").unwrap(),
            None,
            Subject::new("physics").unwrap(),
            fixed_now(),
            1,
        );
        assert!(matches!(
            repo.complete_session(&unknown).await,
            Err(StorageError::NotFound)
        ));
    }
}
