use chrono::{DateTime, Duration, Utc};
use std::fmt;

use quiz_core::model::{
    Answer, Question, Record, Response, Session, SessionSummary, StatOutcome, Verdict,
};
use quiz_core::selection::Round;
use quiz_core::time::elapsed_ms;

use super::progress::SessionProgress;
use crate::error::SessionError;

/// Which step of a question the runner is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for a true/false pick or a card reveal.
    Answer,
    /// Waiting for the familiarity verdict.
    Feedback,
    /// Round finished; the summary is available.
    Summary,
}

impl Phase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Answer => "answer",
            Self::Feedback => "feedback",
            Self::Summary => "summary",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── RUNNER ────────────────────────────────────────────────────────────────────
//

/// Per-question state machine over an immutable round.
///
/// `answer → feedback → (answer | summary)`. Records are append-only. The
/// runner never touches storage; `PracticeService` persists between the
/// feedback and advance steps so a failed write leaves the runner on feedback.
pub struct SessionRunner {
    session: Session,
    round: Round,
    current: usize,
    shown_at: DateTime<Utc>,
    pending: Option<Record>,
    records: Vec<Record>,
    summary: Option<SessionSummary>,
    finalized: bool,
}

impl SessionRunner {
    /// Start on the first question, shown at `shown_at`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` when the round has no questions.
    pub fn new(session: Session, round: Round, shown_at: DateTime<Utc>) -> Result<Self, SessionError> {
        if round.is_empty() {
            return Err(SessionError::Empty);
        }
        Ok(Self {
            session,
            round,
            current: 0,
            shown_at,
            pending: None,
            records: Vec::new(),
            summary: None,
            finalized: false,
        })
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        if self.summary.is_some() {
            Phase::Summary
        } else if self.pending.is_some() {
            Phase::Feedback
        } else {
            Phase::Answer
        }
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub fn round(&self) -> &Round {
        &self.round
    }

    /// Question on screen, `None` once the summary is reached.
    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        if self.summary.is_some() {
            return None;
        }
        self.round.get(self.current)
    }

    /// Zero-based position of the current question.
    #[must_use]
    pub fn position(&self) -> usize {
        self.current
    }

    /// Record waiting for a verdict.
    #[must_use]
    pub fn pending(&self) -> Option<&Record> {
        self.pending.as_ref()
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[must_use]
    pub fn summary(&self) -> Option<&SessionSummary> {
        self.summary.as_ref()
    }

    /// Whether the completed session has been written back to storage.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub(crate) fn mark_finalized(&mut self) {
        self.finalized = true;
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let total = self.round.len();
        let answered = self.records.len();
        SessionProgress {
            total,
            answered,
            remaining: total.saturating_sub(answered),
            is_complete: self.summary.is_some(),
        }
    }

    /// Pick true or false on the current true/false question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::WrongPhase` outside the answer step and
    /// `SessionError::Answer` if the question is a card.
    pub fn answer_true_false(
        &mut self,
        pick: bool,
        now: DateTime<Utc>,
    ) -> Result<&Record, SessionError> {
        self.respond(Response::TrueFalse(pick), now)
    }

    /// Flip the current card.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::WrongPhase` outside the answer step and
    /// `SessionError::Answer` if the question is true/false.
    pub fn reveal_card(&mut self, now: DateTime<Utc>) -> Result<&Record, SessionError> {
        self.respond(Response::Revealed, now)
    }

    /// Submit a response for the current question and move to feedback.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::WrongPhase` outside the answer step and
    /// `SessionError::Answer` when the response does not fit the question.
    pub fn respond(&mut self, response: Response, now: DateTime<Utc>) -> Result<&Record, SessionError> {
        self.expect_phase(Phase::Answer)?;
        let question = self.round.get(self.current).ok_or(SessionError::Empty)?;
        let record = Record::evaluate(question, response, elapsed_ms(self.shown_at, now))?;
        Ok(&*self.pending.insert(record))
    }

    /// Build the durable answer and the stats outcome for `verdict` without
    /// changing state.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::WrongPhase` outside the feedback step.
    pub fn prepare_verdict(
        &self,
        verdict: Verdict,
        now: DateTime<Utc>,
        horizon: Duration,
    ) -> Result<(Answer, StatOutcome), SessionError> {
        let record = self.pending.as_ref().ok_or(SessionError::WrongPhase {
            expected: Phase::Feedback,
            actual: self.phase(),
        })?;

        let answer = Answer {
            session_id: self.session.id(),
            learner: self.session.learner().clone(),
            learner_name: self.session.learner_name().map(str::to_owned),
            subject: self.session.subject().clone(),
            question_id: record.question_id.clone(),
            kind: record.kind,
            topic: record.topic.clone(),
            response: record.response,
            is_correct: record.is_correct,
            verdict,
            read_ms: record.read_ms,
            answer_ms: record.answer_ms,
            created_at: now,
        };
        let outcome = StatOutcome::from_verdict(
            self.session.learner().clone(),
            record.question_id.clone(),
            self.session.subject().clone(),
            record.topic.clone(),
            record.kind,
            record.is_correct,
            verdict,
            now,
            horizon,
        );
        Ok((answer, outcome))
    }

    /// Commit the pending record and move on. After the last question the
    /// summary is computed and the in-memory session is marked completed.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::WrongPhase` outside the feedback step.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Result<Phase, SessionError> {
        let Some(record) = self.pending.take() else {
            return Err(SessionError::WrongPhase {
                expected: Phase::Feedback,
                actual: self.phase(),
            });
        };
        self.records.push(record);
        self.current += 1;

        if self.current < self.round.len() {
            self.shown_at = now;
            return Ok(Phase::Answer);
        }

        let summary = SessionSummary::from_records(&self.records);
        self.session.complete(&summary, now)?;
        self.summary = Some(summary);
        Ok(Phase::Summary)
    }

    fn expect_phase(&self, expected: Phase) -> Result<(), SessionError> {
        let actual = self.phase();
        if actual == expected {
            Ok(())
        } else {
            Err(SessionError::WrongPhase { expected, actual })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{
        LastResult, LearnerId, QuestionId, QuestionKind, SessionId, SessionStatus, Subject,
        TrainerSettings,
    };
    use quiz_core::selection::{RoundBuilder, StatsIndex};
    use quiz_core::time::fixed_now;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn question(id: &str, kind: QuestionKind, key: &str, topic: &str) -> Question {
        Question {
            id: QuestionId::new(id).unwrap(),
            subject: Subject::new("chemistry").unwrap(),
            kind,
            topic: topic.into(),
            statement: format!("Statement {id}"),
            answer_key: key.into(),
            explanation: String::new(),
            teacher_priority: 0.0,
            force_repeat: false,
            active: true,
        }
    }

    fn runner(catalog: Vec<Question>) -> SessionRunner {
        let settings = TrainerSettings::default();
        let mut rng = StdRng::seed_from_u64(11);
        let round = RoundBuilder::new(&settings).build(
            catalog,
            &StatsIndex::new(),
            &Subject::new("chemistry").unwrap(),
            &mut rng,
        );
        let session = Session::start(
            SessionId::generate(),
            LearnerId::new("chiao").unwrap(),
            Some("Chiao".into()),
            Subject::new("chemistry").unwrap(),
            fixed_now(),
            u32::try_from(round.len()).unwrap(),
        );
        SessionRunner::new(session, round, fixed_now()).unwrap()
    }

    /// Answer the current question the way the key says (or reveal a card).
    fn answer_correctly(r: &mut SessionRunner, now: DateTime<Utc>) {
        let q = r.current_question().unwrap().clone();
        match q.kind {
            QuestionKind::TrueFalse => {
                r.answer_true_false(q.expects_true(), now).unwrap();
            }
            QuestionKind::Card => {
                r.reveal_card(now).unwrap();
            }
        }
    }

    #[test]
    fn empty_round_is_rejected() {
        let session = Session::start(
            SessionId::generate(),
            LearnerId::new("chiao").unwrap(),
            None,
            Subject::new("chemistry").unwrap(),
            fixed_now(),
            0,
        );
        assert!(matches!(
            SessionRunner::new(session, Round::default(), fixed_now()),
            Err(SessionError::Empty)
        ));
    }

    #[test]
    fn read_time_is_measured_from_display() {
        let mut r = runner(vec![question("c1", QuestionKind::TrueFalse, "TRUE", "Acids")]);
        let record = r
            .answer_true_false(false, fixed_now() + Duration::milliseconds(3_200))
            .unwrap();
        assert_eq!(record.read_ms, 3_200);
        assert_eq!(record.answer_ms, 0);
        assert!(!record.is_correct);
        assert_eq!(r.phase(), Phase::Feedback);
    }

    #[test]
    fn feedback_requires_a_verdict_before_advancing() {
        let mut r = runner(vec![question("c1", QuestionKind::Card, "", "Bonds")]);
        assert!(matches!(
            r.advance(fixed_now()),
            Err(SessionError::WrongPhase {
                expected: Phase::Feedback,
                actual: Phase::Answer
            })
        ));
        r.reveal_card(fixed_now()).unwrap();
        assert!(matches!(
            r.reveal_card(fixed_now()),
            Err(SessionError::WrongPhase { .. })
        ));
    }

    #[test]
    fn mismatched_response_keeps_answer_phase() {
        let mut r = runner(vec![question("c1", QuestionKind::Card, "", "Bonds")]);
        assert!(matches!(
            r.answer_true_false(true, fixed_now()),
            Err(SessionError::Answer(_))
        ));
        assert_eq!(r.phase(), Phase::Answer);
    }

    #[test]
    fn verdict_builds_answer_and_outcome() {
        let mut r = runner(vec![question("c1", QuestionKind::TrueFalse, "FALSE", "Acids")]);
        r.answer_true_false(true, fixed_now() + Duration::seconds(2))
            .unwrap();
        let now = fixed_now() + Duration::seconds(4);
        let (answer, outcome) = r
            .prepare_verdict(Verdict::NeedsPractice, now, Duration::hours(24))
            .unwrap();

        assert_eq!(answer.response.label(), "TRUE");
        assert!(!answer.is_correct);
        assert_eq!(answer.time_ms(), 2_000);
        assert_eq!(answer.learner_name.as_deref(), Some("Chiao"));
        assert!(outcome.counts_as_wrong);
        assert_eq!(outcome.last_result, LastResult::Wrong);
        assert_eq!(outcome.needs_practice_until, Some(now + Duration::hours(24)));
        // preparing does not move the runner
        assert_eq!(r.phase(), Phase::Feedback);
    }

    #[test]
    fn full_round_reaches_summary_and_completes_session() {
        let mut r = runner(vec![
            question("t1", QuestionKind::TrueFalse, "TRUE", "Acids"),
            question("t2", QuestionKind::TrueFalse, "FALSE", "Acids"),
            question("k1", QuestionKind::Card, "", "Bonds"),
        ]);
        let mut now = fixed_now();
        while r.phase() != Phase::Summary {
            now += Duration::seconds(5);
            answer_correctly(&mut r, now);
            r.advance(now).unwrap();
        }

        let summary = r.summary().unwrap();
        assert_eq!(summary.answered(), 3);
        assert_eq!(summary.tf_total(), 2);
        assert_eq!(summary.accuracy_percent(), 100);
        assert_eq!(summary.total_seconds(), 15);
        assert!(r.current_question().is_none());

        let progress = r.progress();
        assert!(progress.is_complete);
        assert_eq!(progress.remaining, 0);

        assert_eq!(r.session().status(), SessionStatus::Completed);
        let completion = r.session().completion().unwrap();
        assert_eq!(completion.correct_count, 2);
        assert_eq!(completion.ended_at, now);
        assert!(!r.is_finalized());
    }

    #[test]
    fn advance_resets_question_timer() {
        let mut r = runner(vec![
            question("t1", QuestionKind::TrueFalse, "TRUE", "Acids"),
            question("t2", QuestionKind::TrueFalse, "TRUE", "Acids"),
        ]);
        r.answer_true_false(true, fixed_now() + Duration::seconds(10))
            .unwrap();
        r.advance(fixed_now() + Duration::seconds(12)).unwrap();
        let record = r
            .answer_true_false(true, fixed_now() + Duration::seconds(13))
            .unwrap();
        assert_eq!(record.read_ms, 1_000);
    }
}
