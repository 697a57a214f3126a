use std::sync::{Arc, Mutex, PoisonError};

use rand::SeedableRng;
use rand::rngs::StdRng;

use quiz_core::model::{
    LearnerId, Response, Session, SessionId, StatRecord, Subject, TrainerSettings, Verdict,
};
use quiz_core::selection::{Round, RoundBuilder, RoundDiagnostic, StatsIndex};
use storage::repository::{
    AnswerRepository, QuestionRepository, SessionRepository, StatsRepository, Storage,
};

use super::runner::{Phase, SessionRunner};
use crate::Clock;
use crate::error::SessionError;

/// Identity and subject chosen in the shell; either may still be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PracticeRequest {
    pub learner: Option<String>,
    pub learner_name: Option<String>,
    pub subject: Option<String>,
}

impl PracticeRequest {
    #[must_use]
    pub fn new(learner: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            learner: Some(learner.into()),
            learner_name: None,
            subject: Some(subject.into()),
        }
    }

    #[must_use]
    pub fn with_learner_name(mut self, name: impl Into<String>) -> Self {
        self.learner_name = Some(name.into());
        self
    }

    /// Validate the prerequisites, learner first.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::MissingLearner` or `SessionError::MissingSubject`
    /// when either is absent or blank.
    pub fn resolve(&self) -> Result<(LearnerId, Subject), SessionError> {
        let learner = self
            .learner
            .as_deref()
            .and_then(|raw| LearnerId::new(raw).ok())
            .ok_or(SessionError::MissingLearner)?;
        let subject = self
            .subject
            .as_deref()
            .and_then(|raw| Subject::new(raw).ok())
            .ok_or(SessionError::MissingSubject)?;
        Ok((learner, subject))
    }
}

/// Result of starting a practice round.
pub enum PracticeStart {
    Ready(SessionRunner),
    /// No eligible questions; no session was created.
    NothingToPractice,
}

/// Result of a persisted verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct VerdictOutcome {
    pub stat: StatRecord,
    /// `false` when the same answer had already been stored by an earlier try.
    pub answer_stored: bool,
    pub phase: Phase,
}

/// Orchestrates round building and persisted answering.
#[derive(Clone)]
pub struct PracticeService {
    clock: Clock,
    settings: TrainerSettings,
    questions: Arc<dyn QuestionRepository>,
    stats: Arc<dyn StatsRepository>,
    sessions: Arc<dyn SessionRepository>,
    answers: Arc<dyn AnswerRepository>,
    rng: Arc<Mutex<StdRng>>,
}

impl PracticeService {
    #[must_use]
    pub fn new(clock: Clock, settings: TrainerSettings, storage: &Storage) -> Self {
        Self {
            clock,
            settings,
            questions: Arc::clone(&storage.questions),
            stats: Arc::clone(&storage.stats),
            sessions: Arc::clone(&storage.sessions),
            answers: Arc::clone(&storage.answers),
            rng: Arc::new(Mutex::new(StdRng::from_os_rng())),
        }
    }

    /// Use a seeded random source so rounds are reproducible.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Arc::new(Mutex::new(StdRng::seed_from_u64(seed)));
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &TrainerSettings {
        &self.settings
    }

    /// Build a round and open a session for it.
    ///
    /// # Errors
    ///
    /// Returns prerequisite errors, or `SessionError::Storage` when the
    /// catalog cannot be read or the session cannot be created.
    pub async fn start(&self, request: &PracticeRequest) -> Result<PracticeStart, SessionError> {
        let (learner, subject) = request.resolve()?;
        let (round, _stats) = self.plan_round(&learner, &subject).await?;

        if round.is_empty() {
            tracing::info!(%learner, %subject, "nothing to practice");
            return Ok(PracticeStart::NothingToPractice);
        }

        let now = self.clock.now();
        let total = u32::try_from(round.len()).unwrap_or(u32::MAX);
        let session = Session::start(
            SessionId::generate(),
            learner,
            request.learner_name.clone(),
            subject,
            now,
            total,
        );
        if let Err(err) = self.sessions.create_session(&session).await {
            tracing::error!(session_id = %session.id(), error = %err, "failed to create session");
            return Err(err.into());
        }
        tracing::info!(
            session_id = %session.id(),
            learner = %session.learner(),
            subject = %session.subject(),
            questions = total,
            forced = ?round.forced(),
            "session started"
        );

        Ok(PracticeStart::Ready(SessionRunner::new(session, round, now)?))
    }

    /// Build a round without opening a session and explain its weights.
    ///
    /// # Errors
    ///
    /// Same as `start`, minus session creation.
    pub async fn preview(
        &self,
        request: &PracticeRequest,
    ) -> Result<Vec<RoundDiagnostic>, SessionError> {
        let (learner, subject) = request.resolve()?;
        let (round, stats) = self.plan_round(&learner, &subject).await?;
        Ok(RoundBuilder::new(&self.settings).diagnose(&round, &stats))
    }

    async fn plan_round(
        &self,
        learner: &LearnerId,
        subject: &Subject,
    ) -> Result<(Round, StatsIndex), SessionError> {
        let catalog = self
            .questions
            .active_questions(subject, self.settings.question_fetch_limit())
            .await?;

        // Missing history only costs weighting quality.
        let stats = match self
            .stats
            .stats_for_learner(learner, subject, self.settings.stats_fetch_limit())
            .await
        {
            Ok(records) => StatsIndex::from_records(records),
            Err(err) => {
                tracing::warn!(%learner, %subject, error = %err, "stats lookup failed, using empty history");
                StatsIndex::new()
            }
        };

        let candidates = catalog.len();
        let round = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            RoundBuilder::new(&self.settings).build(catalog, &stats, subject, &mut *rng)
        };
        tracing::debug!(
            %learner,
            %subject,
            candidates,
            history = stats.len(),
            picked = round.len(),
            "round built"
        );
        Ok((round, stats))
    }

    /// Submit a response for the current question, timed by the service clock.
    ///
    /// # Errors
    ///
    /// See `SessionRunner::respond`.
    pub fn respond(
        &self,
        runner: &mut SessionRunner,
        response: Response,
    ) -> Result<(), SessionError> {
        runner.respond(response, self.clock.now()).map(|_| ())
    }

    /// Persist the answer and the stats merge for `verdict`, then advance.
    /// After the last question the session is finalized as well.
    ///
    /// A failed answer or stats write leaves the runner on feedback so the
    /// same verdict can be retried. A failed finalize leaves it on the
    /// summary; call `finalize_session` to retry.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::WrongPhase` outside feedback, or
    /// `SessionError::Storage` when a write fails.
    pub async fn choose_familiarity(
        &self,
        runner: &mut SessionRunner,
        verdict: Verdict,
    ) -> Result<VerdictOutcome, SessionError> {
        let now = self.clock.now();
        let (answer, outcome) =
            runner.prepare_verdict(verdict, now, self.settings.needs_practice_horizon())?;

        let answer_stored = match self.answers.append_answer(&answer).await {
            Ok(stored) => stored,
            Err(err) => {
                tracing::error!(
                    session_id = %answer.session_id,
                    q_id = %answer.question_id,
                    error = %err,
                    "failed to store answer"
                );
                return Err(err.into());
            }
        };

        let stat = match self.stats.record_outcome(&outcome).await {
            Ok(stat) => stat,
            Err(err) => {
                tracing::error!(
                    stat_id = %outcome.key.doc_id(),
                    error = %err,
                    "failed to update stats"
                );
                return Err(err.into());
            }
        };

        let phase = runner.advance(now)?;
        if phase == Phase::Summary {
            self.finalize_session(runner).await?;
        }

        Ok(VerdictOutcome {
            stat,
            answer_stored,
            phase,
        })
    }

    /// Write the completed session back to storage. Safe to call again after
    /// a failure; a no-op once it succeeded.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotFinished` before the summary, or
    /// `SessionError::Storage` if the update fails.
    pub async fn finalize_session(&self, runner: &mut SessionRunner) -> Result<(), SessionError> {
        if runner.is_finalized() {
            return Ok(());
        }
        if runner.phase() != Phase::Summary {
            return Err(SessionError::NotFinished);
        }

        if let Err(err) = self.sessions.complete_session(runner.session()).await {
            tracing::error!(session_id = %runner.session().id(), error = %err, "failed to finalize session");
            return Err(err.into());
        }
        runner.mark_finalized();

        if let Some(summary) = runner.summary() {
            tracing::info!(
                session_id = %runner.session().id(),
                answered = summary.answered(),
                accuracy = summary.accuracy_percent(),
                total_seconds = summary.total_seconds(),
                "session completed"
            );
        }
        Ok(())
    }
}
