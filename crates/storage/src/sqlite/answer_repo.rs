use quiz_core::model::{Answer, SessionId};

use super::SqliteRepository;
use super::mapping::{conn, map_answer_row, u64_to_i64};
use crate::repository::{AnswerRepository, StorageError};

#[async_trait::async_trait]
impl AnswerRepository for SqliteRepository {
    async fn append_answer(&self, answer: &Answer) -> Result<bool, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO answers (
                session_id, user_id, user_name, subject, q_id, type, core_topic,
                user_answer, is_correct, familiarity, read_ms, answer_ms, time_ms,
                created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ON CONFLICT(session_id, q_id) DO NOTHING
            ",
        )
        .bind(answer.session_id.value())
        .bind(answer.learner.as_str())
        .bind(answer.learner_name.as_deref())
        .bind(answer.subject.as_str())
        .bind(answer.question_id.as_str())
        .bind(answer.kind.as_str())
        .bind(answer.topic.as_str())
        .bind(answer.response.label())
        .bind(answer.is_correct)
        .bind(answer.verdict.as_str())
        .bind(u64_to_i64("read_ms", answer.read_ms)?)
        .bind(u64_to_i64("answer_ms", answer.answer_ms)?)
        .bind(u64_to_i64("time_ms", answer.time_ms())?)
        .bind(answer.created_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.rows_affected() == 1)
    }

    async fn answers_for_session(&self, id: SessionId) -> Result<Vec<Answer>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT
                session_id, user_id, user_name, subject, q_id, type, core_topic,
                user_answer, is_correct, familiarity, read_ms, answer_ms, created_at
            FROM answers
            WHERE session_id = ?1
            ORDER BY id
            ",
        )
        .bind(id.value())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_answer_row).collect()
    }
}
