use quiz_core::model::{LearnerId, StatKey, StatOutcome, StatRecord, Subject};

use super::SqliteRepository;
use super::mapping::{conn, map_stat_row};
use crate::repository::{StatsRepository, StorageError};

const STAT_COLUMNS: &str = "user_id, q_id, subject, core_topic, attempts, wrong, familiarity, \
                            needs_practice_until, last_result, updated_at";

#[async_trait::async_trait]
impl StatsRepository for SqliteRepository {
    async fn stats_for_learner(
        &self,
        learner: &LearnerId,
        subject: &Subject,
        limit: u32,
    ) -> Result<Vec<StatRecord>, StorageError> {
        let sql = format!(
            "SELECT {STAT_COLUMNS} FROM user_question_stats \
             WHERE user_id = ?1 AND subject = ?2 LIMIT ?3"
        );
        let rows = sqlx::query(&sql)
            .bind(learner.as_str())
            .bind(subject.as_str())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter().map(map_stat_row).collect()
    }

    async fn get_stat(&self, key: &StatKey) -> Result<Option<StatRecord>, StorageError> {
        let sql = format!(
            "SELECT {STAT_COLUMNS} FROM user_question_stats WHERE user_id = ?1 AND q_id = ?2"
        );
        let row = sqlx::query(&sql)
            .bind(key.learner.as_str())
            .bind(key.question.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.as_ref().map(map_stat_row).transpose()
    }

    async fn record_outcome(&self, outcome: &StatOutcome) -> Result<StatRecord, StorageError> {
        // One statement: the counters are incremented by the database, never
        // read back and rewritten.
        let sql = format!(
            r"
            INSERT INTO user_question_stats (
                user_id, q_id, subject, core_topic, attempts, wrong, familiarity,
                needs_practice_until, last_result, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(user_id, q_id) DO UPDATE SET
                attempts = user_question_stats.attempts + 1,
                wrong = MIN(user_question_stats.wrong + excluded.wrong,
                            user_question_stats.attempts + 1),
                subject = excluded.subject,
                core_topic = excluded.core_topic,
                familiarity = excluded.familiarity,
                needs_practice_until = excluded.needs_practice_until,
                last_result = excluded.last_result,
                updated_at = excluded.updated_at
            RETURNING {STAT_COLUMNS}
            "
        );
        let row = sqlx::query(&sql)
            .bind(outcome.key.learner.as_str())
            .bind(outcome.key.question.as_str())
            .bind(outcome.subject.as_str())
            .bind(outcome.topic.as_str())
            .bind(i64::from(outcome.counts_as_wrong))
            .bind(outcome.familiarity.as_str())
            .bind(outcome.needs_practice_until)
            .bind(outcome.last_result.as_str())
            .bind(outcome.recorded_at)
            .fetch_one(&self.pool)
            .await
            .map_err(conn)?;

        map_stat_row(&row)
    }
}
