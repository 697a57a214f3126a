use quiz_core::model::{Session, SessionId};

use super::SqliteRepository;
use super::mapping::{conn, map_session_row, u64_to_i64};
use crate::repository::{SessionRepository, StorageError};

#[async_trait::async_trait]
impl SessionRepository for SqliteRepository {
    async fn create_session(&self, session: &Session) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO sessions (
                id, user_id, user_name, subject, started_at, total_questions, status
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(session.id().value())
        .bind(session.learner().as_str())
        .bind(session.learner_name())
        .bind(session.subject().as_str())
        .bind(session.started_at())
        .bind(i64::from(session.total_questions()))
        .bind(session.status().as_str())
        .execute(&self.pool)
        .await;

        match res {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StorageError::Conflict)
            }
            Err(e) => Err(conn(e)),
        }
    }

    async fn complete_session(&self, session: &Session) -> Result<(), StorageError> {
        let completion = session.completion();
        let res = sqlx::query(
            r"
            UPDATE sessions SET
                status = ?2,
                ended_at = ?3,
                total_seconds = ?4,
                correct_count = ?5,
                accuracy = ?6
            WHERE id = ?1
            ",
        )
        .bind(session.id().value())
        .bind(session.status().as_str())
        .bind(completion.map(|c| c.ended_at))
        .bind(
            completion
                .map(|c| u64_to_i64("total_seconds", c.total_seconds))
                .transpose()?,
        )
        .bind(completion.map(|c| i64::from(c.correct_count)))
        .bind(completion.map(|c| c.accuracy))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn get_session(&self, id: SessionId) -> Result<Session, StorageError> {
        let row = sqlx::query(
            r"
            SELECT
                id, user_id, user_name, subject, started_at, total_questions, status,
                ended_at, total_seconds, correct_count, accuracy
            FROM sessions
            WHERE id = ?1
            ",
        )
        .bind(id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        map_session_row(&row)
    }
}
