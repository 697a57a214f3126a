use chrono::{DateTime, Utc};
use quiz_core::model::{
    Answer, LearnerId, QuestionDoc, QuestionId, QuestionKind, Response, Session,
    SessionCompletion, SessionId, SessionStatus, StatDoc, StatRecord, Subject, Verdict,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use sqlx::types::Uuid;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn u64_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn u64_from_i64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

/// Read a question row back into its loose document form. Validation is left
/// to the caller so malformed rows can be skipped rather than failing a query.
pub(crate) fn map_question_doc(row: &SqliteRow) -> Result<QuestionDoc, StorageError> {
    Ok(QuestionDoc {
        q_id: row.try_get("q_id").map_err(ser)?,
        subject: row.try_get("subject").map_err(ser)?,
        kind: row.try_get("type").map_err(ser)?,
        core_topic: row.try_get("core_topic").map_err(ser)?,
        statement: row.try_get("statement").map_err(ser)?,
        answer_key: row.try_get("answer_key").map_err(ser)?,
        explanation: row.try_get("explanation").map_err(ser)?,
        teacher_priority: row.try_get("teacher_priority").map_err(ser)?,
        force_repeat: row.try_get("force_repeat").map_err(ser)?,
        active: row.try_get("active").map_err(ser)?,
    })
}

pub(crate) fn map_stat_row(row: &SqliteRow) -> Result<StatRecord, StorageError> {
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(ser)?;
    let doc = StatDoc {
        user_id: row.try_get("user_id").map_err(ser)?,
        q_id: row.try_get("q_id").map_err(ser)?,
        subject: row.try_get("subject").map_err(ser)?,
        core_topic: row.try_get("core_topic").map_err(ser)?,
        attempts: row.try_get("attempts").map_err(ser)?,
        wrong: row.try_get("wrong").map_err(ser)?,
        familiarity: row.try_get("familiarity").map_err(ser)?,
        needs_practice_until: row.try_get("needs_practice_until").map_err(ser)?,
        last_result: row.try_get("last_result").map_err(ser)?,
        updated_at: Some(updated_at),
    };
    doc.normalize(updated_at)
        .ok_or_else(|| StorageError::Serialization("stat row missing key fields".into()))
}

pub(crate) fn map_session_row(row: &SqliteRow) -> Result<Session, StorageError> {
    let id: Uuid = row.try_get("id").map_err(ser)?;
    let learner = LearnerId::new(row.try_get::<String, _>("user_id").map_err(ser)?).map_err(ser)?;
    let subject = Subject::new(row.try_get::<String, _>("subject").map_err(ser)?).map_err(ser)?;
    let status_raw: String = row.try_get("status").map_err(ser)?;
    let status = SessionStatus::parse(&status_raw)
        .ok_or_else(|| StorageError::Serialization(format!("invalid status: {status_raw}")))?;

    let ended_at: Option<DateTime<Utc>> = row.try_get("ended_at").map_err(ser)?;
    let completion = match ended_at {
        Some(ended_at) => Some(SessionCompletion {
            ended_at,
            total_seconds: u64_from_i64(
                "total_seconds",
                row.try_get::<Option<i64>, _>("total_seconds")
                    .map_err(ser)?
                    .unwrap_or(0),
            )?,
            correct_count: u32_from_i64(
                "correct_count",
                row.try_get::<Option<i64>, _>("correct_count")
                    .map_err(ser)?
                    .unwrap_or(0),
            )?,
            accuracy: row
                .try_get::<Option<f64>, _>("accuracy")
                .map_err(ser)?
                .unwrap_or(0.0),
        }),
        None => None,
    };

    Session::from_persisted(
        SessionId::from_uuid(id),
        learner,
        row.try_get("user_name").map_err(ser)?,
        subject,
        row.try_get("started_at").map_err(ser)?,
        u32_from_i64(
            "total_questions",
            row.try_get::<i64, _>("total_questions").map_err(ser)?,
        )?,
        status,
        completion,
    )
    .map_err(ser)
}

pub(crate) fn map_answer_row(row: &SqliteRow) -> Result<Answer, StorageError> {
    let id: Uuid = row.try_get("session_id").map_err(ser)?;
    let kind_raw: String = row.try_get("type").map_err(ser)?;
    let response_raw: String = row.try_get("user_answer").map_err(ser)?;
    let verdict_raw: String = row.try_get("familiarity").map_err(ser)?;

    Ok(Answer {
        session_id: SessionId::from_uuid(id),
        learner: LearnerId::new(row.try_get::<String, _>("user_id").map_err(ser)?).map_err(ser)?,
        learner_name: row.try_get("user_name").map_err(ser)?,
        subject: Subject::new(row.try_get::<String, _>("subject").map_err(ser)?).map_err(ser)?,
        question_id: QuestionId::new(row.try_get::<String, _>("q_id").map_err(ser)?)
            .map_err(ser)?,
        kind: QuestionKind::parse(&kind_raw)
            .ok_or_else(|| StorageError::Serialization(format!("invalid type: {kind_raw}")))?,
        topic: row.try_get("core_topic").map_err(ser)?,
        response: Response::from_label(&response_raw).ok_or_else(|| {
            StorageError::Serialization(format!("invalid user_answer: {response_raw}"))
        })?,
        is_correct: row.try_get("is_correct").map_err(ser)?,
        verdict: Verdict::parse(&verdict_raw).ok_or_else(|| {
            StorageError::Serialization(format!("invalid familiarity: {verdict_raw}"))
        })?,
        read_ms: u64_from_i64("read_ms", row.try_get::<i64, _>("read_ms").map_err(ser)?)?,
        answer_ms: u64_from_i64("answer_ms", row.try_get::<i64, _>("answer_ms").map_err(ser)?)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}
