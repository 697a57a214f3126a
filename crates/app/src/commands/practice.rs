//! The `quiz practice` command: a line-based answer, feedback, summary loop.

use std::io::{BufRead, Write};

use anyhow::Result;

use quiz_core::model::{Question, QuestionKind, Response, SessionSummary, Verdict};
use services::{Phase, PracticeRequest, PracticeService, PracticeStart, SessionError, SessionRunner};

/// How an interactive round ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PracticeOutcome {
    Completed(SessionSummary),
    /// Every answer was stored but closing the session failed and the
    /// learner declined to retry. The session stays in progress.
    Unsaved(SessionSummary),
    NothingToPractice,
    /// Input closed or the learner gave up on a failed save. The session
    /// stays in progress.
    Abandoned { answered: usize },
}

pub async fn execute(service: &PracticeService, request: &PracticeRequest) -> Result<()> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    let outcome = run_practice(service, request, stdin.lock(), &mut stdout).await?;
    match outcome {
        PracticeOutcome::Abandoned { answered } => {
            tracing::info!(answered, "practice abandoned");
            Ok(())
        }
        PracticeOutcome::Unsaved(_) => anyhow::bail!("session was not saved"),
        PracticeOutcome::Completed(_) | PracticeOutcome::NothingToPractice => Ok(()),
    }
}

/// Drive one round against `input`/`output`.
pub async fn run_practice<R: BufRead, W: Write>(
    service: &PracticeService,
    request: &PracticeRequest,
    mut input: R,
    out: &mut W,
) -> Result<PracticeOutcome> {
    let mut runner = match service.start(request).await? {
        PracticeStart::Ready(runner) => runner,
        PracticeStart::NothingToPractice => {
            writeln!(out, "Nothing to practice for this subject yet.")?;
            return Ok(PracticeOutcome::NothingToPractice);
        }
    };

    if let Some(name) = runner.session().learner_name() {
        writeln!(out, "Hi {name}! {} questions today.", runner.round().len())?;
    }

    loop {
        match runner.phase() {
            Phase::Answer => {
                let Some(question) = runner.current_question().cloned() else {
                    return Err(SessionError::Empty.into());
                };
                show_question(out, &runner, &question)?;
                let Some(response) = ask_response(&mut input, out, question.kind)? else {
                    return Ok(abandoned(&runner));
                };
                service.respond(&mut runner, response)?;
                show_feedback(out, &runner, &question)?;
            }
            Phase::Feedback => {
                let Some(verdict) = ask_verdict(&mut input, out)? else {
                    return Ok(abandoned(&runner));
                };
                loop {
                    match service.choose_familiarity(&mut runner, verdict).await {
                        Ok(_) => break,
                        // The answer went through; only the session close failed.
                        Err(SessionError::Storage(_)) if runner.phase() == Phase::Summary => break,
                        Err(SessionError::Storage(err)) => {
                            writeln!(out, "Could not save your answer: {err}")?;
                            if !ask_retry(&mut input, out)? {
                                return Ok(abandoned(&runner));
                            }
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
            }
            Phase::Summary => {
                let mut saved = true;
                if !runner.is_finalized() {
                    if let Err(err) = service.finalize_session(&mut runner).await {
                        writeln!(out, "Could not save the session: {err}")?;
                        if ask_retry(&mut input, out)? {
                            continue;
                        }
                        saved = false;
                    }
                }
                let Some(summary) = runner.summary().cloned() else {
                    return Err(SessionError::NotFinished.into());
                };
                if !saved {
                    writeln!(out)?;
                    writeln!(
                        out,
                        "Your answers were saved, but this session was not recorded as finished."
                    )?;
                    return Ok(PracticeOutcome::Unsaved(summary));
                }
                show_summary(out, &summary)?;
                return Ok(PracticeOutcome::Completed(summary));
            }
        }
    }
}

fn abandoned(runner: &SessionRunner) -> PracticeOutcome {
    PracticeOutcome::Abandoned {
        answered: runner.records().len(),
    }
}

/// Read one trimmed line; `None` once input is closed.
fn read_line<R: BufRead>(input: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn prompt<R: BufRead, W: Write>(input: &mut R, out: &mut W, text: &str) -> Result<Option<String>> {
    write!(out, "{text}")?;
    out.flush()?;
    read_line(input)
}

fn show_question<W: Write>(out: &mut W, runner: &SessionRunner, question: &Question) -> Result<()> {
    writeln!(out)?;
    let topic = if question.topic.is_empty() {
        String::new()
    } else {
        format!(" | {}", question.topic)
    };
    writeln!(out, "[{}] {}{topic}", runner.progress(), question.kind)?;
    writeln!(out, "{}", question.statement)?;
    Ok(())
}

fn ask_response<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    kind: QuestionKind,
) -> Result<Option<Response>> {
    match kind {
        QuestionKind::Card => {
            let line = prompt(input, out, "Press Enter to flip the card. ")?;
            Ok(line.map(|_| Response::Revealed))
        }
        QuestionKind::TrueFalse => loop {
            let Some(line) = prompt(input, out, "True or false? [t/f]: ")? else {
                return Ok(None);
            };
            match line.to_ascii_lowercase().as_str() {
                "t" | "true" => return Ok(Some(Response::TrueFalse(true))),
                "f" | "false" => return Ok(Some(Response::TrueFalse(false))),
                _ => writeln!(out, "Please type t or f.")?,
            }
        },
    }
}

fn show_feedback<W: Write>(out: &mut W, runner: &SessionRunner, question: &Question) -> Result<()> {
    match question.kind {
        QuestionKind::TrueFalse => {
            let correct = runner.pending().is_some_and(|r| r.is_correct);
            if correct {
                writeln!(out, "Correct!")?;
            } else {
                let key = if question.expects_true() { "TRUE" } else { "FALSE" };
                writeln!(out, "Not quite. The statement is {key}.")?;
            }
        }
        QuestionKind::Card => writeln!(out, "Back: {}", question.answer_key)?,
    }
    if !question.explanation.trim().is_empty() {
        writeln!(out, "Why: {}", question.explanation.trim())?;
    }
    Ok(())
}

fn parse_verdict(raw: &str) -> Option<Verdict> {
    match raw {
        "1" => Some(Verdict::Familiar),
        "2" => Some(Verdict::NeedsPractice),
        "3" => Some(Verdict::Mastered),
        other => Verdict::parse(other),
    }
}

fn ask_verdict<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> Result<Option<Verdict>> {
    loop {
        let Some(line) = prompt(
            input,
            out,
            "How well do you know it? [1] familiar [2] needs practice [3] mastered: ",
        )?
        else {
            return Ok(None);
        };
        match parse_verdict(&line) {
            Some(verdict) => return Ok(Some(verdict)),
            None => writeln!(out, "Please pick 1, 2 or 3.")?,
        }
    }
}

fn ask_retry<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> Result<bool> {
    let Some(line) = prompt(input, out, "Retry? [Y/n]: ")? else {
        return Ok(false);
    };
    Ok(!matches!(line.to_ascii_lowercase().as_str(), "n" | "no"))
}

fn show_summary<W: Write>(out: &mut W, summary: &SessionSummary) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "Round complete!")?;
    writeln!(out, "Time: {}s", summary.total_seconds())?;
    if summary.tf_total() > 0 {
        writeln!(
            out,
            "True/false: {}/{} correct ({}%)",
            summary.tf_correct(),
            summary.tf_total(),
            summary.accuracy_percent()
        )?;
    }
    let slowest = summary.slowest_topics();
    if !slowest.is_empty() {
        writeln!(out, "Slowest topics:")?;
        for (rank, timing) in slowest.iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let seconds = timing.total_ms as f64 / 1000.0;
            writeln!(
                out,
                "  {}. {} ({seconds:.1}s over {})",
                rank + 1,
                timing.topic,
                timing.count
            )?;
        }
    }
    writeln!(out, "{}", summary.encouragement().message())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quiz_core::model::{
        LearnerId, QuestionDoc, QuestionId, Session, SessionId, SessionStatus, StatKey,
        TrainerSettings,
    };
    use quiz_core::time::fixed_clock;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};
    use storage::repository::{InMemoryRepository, SessionRepository, Storage, StorageError};

    /// Sessions can be opened but never closed.
    #[derive(Default)]
    struct StuckSessions {
        inner: InMemoryRepository,
        opened: Mutex<Vec<SessionId>>,
    }

    #[async_trait]
    impl SessionRepository for StuckSessions {
        async fn create_session(&self, session: &Session) -> Result<(), StorageError> {
            self.opened.lock().unwrap().push(session.id());
            self.inner.create_session(session).await
        }

        async fn complete_session(&self, _session: &Session) -> Result<(), StorageError> {
            Err(StorageError::Connection("offline".into()))
        }

        async fn get_session(&self, id: SessionId) -> Result<Session, StorageError> {
            self.inner.get_session(id).await
        }
    }

    async fn storage_with(docs: &[(&str, &str, &str)]) -> Storage {
        let storage = Storage::in_memory();
        for (id, kind, key) in docs {
            let question = QuestionDoc {
                q_id: Some((*id).into()),
                subject: Some("physics".into()),
                kind: Some((*kind).into()),
                core_topic: Some("Optics".into()),
                statement: Some(format!("Statement {id}")),
                answer_key: Some((*key).into()),
                explanation: Some("Snell's law.".into()),
                active: Some(true),
                ..QuestionDoc::default()
            }
            .validate()
            .unwrap();
            storage.questions.upsert_question(&question).await.unwrap();
        }
        storage
    }

    fn service(storage: &Storage) -> PracticeService {
        PracticeService::new(fixed_clock(), TrainerSettings::default(), storage).with_seed(7)
    }

    fn request() -> PracticeRequest {
        PracticeRequest::new("tester", "physics").with_learner_name("Tester")
    }

    #[tokio::test]
    async fn scripted_true_false_round_completes() {
        let storage = storage_with(&[("p1", "TF", "TRUE")]).await;
        let mut out = Vec::new();

        let outcome = run_practice(
            &service(&storage),
            &request(),
            Cursor::new("maybe\nt\n9\n2\n"),
            &mut out,
        )
        .await
        .unwrap();

        let PracticeOutcome::Completed(summary) = outcome else {
            panic!("expected a completed round");
        };
        assert_eq!(summary.tf_correct(), 1);
        assert_eq!(summary.accuracy_percent(), 100);

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Hi Tester!"));
        assert!(text.contains("[1/1] TF | Optics"));
        assert!(text.contains("Please type t or f."));
        assert!(text.contains("Correct!"));
        assert!(text.contains("Why: Snell's law."));
        assert!(text.contains("Please pick 1, 2 or 3."));
        assert!(text.contains("True/false: 1/1 correct (100%)"));

        let key = StatKey::new(LearnerId::new("tester").unwrap(), QuestionId::new("p1").unwrap());
        let stat = storage.stats.get_stat(&key).await.unwrap().unwrap();
        assert_eq!(stat.attempts(), 1);
        assert_eq!(stat.wrong(), 0);
    }

    #[tokio::test]
    async fn card_is_flipped_and_wrong_tf_is_reported() {
        let storage = storage_with(&[("c1", "CARD", "Refraction"), ("p1", "TF", "FALSE")]).await;
        let mut out = Vec::new();

        // Each question takes one response line and one verdict line; a card
        // accepts any line as its flip.
        let outcome = run_practice(
            &service(&storage),
            &request(),
            Cursor::new("t\nmastered\nt\n3\n"),
            &mut out,
        )
        .await
        .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(matches!(outcome, PracticeOutcome::Completed(_)));
        assert!(text.contains("Back: Refraction"));
        assert!(text.contains("Not quite. The statement is FALSE."));
        assert!(text.contains("True/false: 0/1 correct (0%)"));
    }

    #[tokio::test]
    async fn closed_input_abandons_the_round() {
        let storage = storage_with(&[("p1", "TF", "TRUE"), ("p2", "TF", "FALSE")]).await;
        let mut out = Vec::new();

        let outcome = run_practice(&service(&storage), &request(), Cursor::new("t\n1\n"), &mut out)
            .await
            .unwrap();
        assert_eq!(outcome, PracticeOutcome::Abandoned { answered: 1 });
    }

    #[tokio::test]
    async fn declined_finalize_retry_is_not_reported_as_complete() {
        let base = storage_with(&[("p1", "TF", "TRUE")]).await;
        let sessions = Arc::new(StuckSessions::default());
        let storage = Storage {
            sessions: sessions.clone(),
            ..base
        };
        let mut out = Vec::new();

        let outcome = run_practice(&service(&storage), &request(), Cursor::new("t\n1\nn\n"), &mut out)
            .await
            .unwrap();

        let PracticeOutcome::Unsaved(summary) = outcome else {
            panic!("expected an unsaved round");
        };
        assert_eq!(summary.tf_correct(), 1);

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Could not save the session"));
        assert!(text.contains("not recorded as finished"));
        assert!(!text.contains("Round complete!"));

        let opened = sessions.opened.lock().unwrap().clone();
        assert_eq!(opened.len(), 1);
        let stored = sessions.get_session(opened[0]).await.unwrap();
        assert_eq!(stored.status(), SessionStatus::InProgress);
    }

    #[tokio::test]
    async fn empty_catalog_has_nothing_to_practice() {
        let storage = Storage::in_memory();
        let mut out = Vec::new();
        let outcome = run_practice(&service(&storage), &request(), Cursor::new(""), &mut out)
            .await
            .unwrap();
        assert_eq!(outcome, PracticeOutcome::NothingToPractice);
    }

    #[tokio::test]
    async fn missing_subject_is_a_prerequisite_error() {
        let storage = Storage::in_memory();
        let mut out = Vec::new();
        let request = PracticeRequest {
            learner: Some("tester".into()),
            ..PracticeRequest::default()
        };
        let err = run_practice(&service(&storage), &request, Cursor::new(""), &mut out)
            .await
            .unwrap_err();
        let err = err.downcast::<SessionError>().unwrap();
        assert!(err.is_prerequisite());
    }
}
