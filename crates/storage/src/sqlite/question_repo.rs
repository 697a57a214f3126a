use quiz_core::model::{Question, Subject};

use super::SqliteRepository;
use super::mapping::{conn, map_question_doc};
use crate::repository::{QuestionRepository, StorageError};

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO questions (
                q_id, subject, type, core_topic, statement, answer_key,
                explanation, teacher_priority, force_repeat, active
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(q_id) DO UPDATE SET
                subject = excluded.subject,
                type = excluded.type,
                core_topic = excluded.core_topic,
                statement = excluded.statement,
                answer_key = excluded.answer_key,
                explanation = excluded.explanation,
                teacher_priority = excluded.teacher_priority,
                force_repeat = excluded.force_repeat,
                active = excluded.active
            ",
        )
        .bind(question.id.as_str())
        .bind(question.subject.as_str())
        .bind(question.kind.as_str())
        .bind(question.topic.as_str())
        .bind(question.statement.as_str())
        .bind(question.answer_key.as_str())
        .bind(question.explanation.as_str())
        .bind(question.teacher_priority)
        .bind(question.force_repeat)
        .bind(question.active)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    // Rows without a statement or with an unserved type are filtered in SQL
    // so they never count against `limit`.
    async fn active_questions(
        &self,
        subject: &Subject,
        limit: u32,
    ) -> Result<Vec<Question>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT
                q_id, subject, type, core_topic, statement, answer_key,
                explanation, teacher_priority, force_repeat, active
            FROM questions
            WHERE subject = ?1 AND active = 1
              AND TRIM(COALESCE(statement, '')) <> ''
              AND UPPER(TRIM(COALESCE(type, ''))) IN ('TF', 'CARD', 'FLASHCARD')
            ORDER BY q_id
            LIMIT ?2
            ",
        )
        .bind(subject.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            match map_question_doc(&row).and_then(|doc| {
                doc.validate()
                    .map_err(|e| StorageError::Serialization(e.to_string()))
            }) {
                Ok(question) => out.push(question),
                Err(err) => tracing::warn!(%subject, error = %err, "skipping malformed question row"),
            }
        }
        Ok(out)
    }
}
