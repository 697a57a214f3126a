use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs the versioned migrations for the quiz schema.
///
/// Version 1 creates questions, per-learner stats, sessions and answers.
#[allow(clippy::too_many_lines)]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if is_applied(pool, 1).await? {
        return Ok(());
    }

    let mut tx = pool.begin().await?;

    // Nullable columns; rows are validated on read.
    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS questions (
                q_id TEXT PRIMARY KEY,
                subject TEXT,
                type TEXT,
                core_topic TEXT,
                statement TEXT,
                answer_key TEXT,
                explanation TEXT,
                teacher_priority REAL,
                force_repeat INTEGER,
                active INTEGER
            );
        ",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS user_question_stats (
                user_id TEXT NOT NULL,
                q_id TEXT NOT NULL,
                subject TEXT NOT NULL,
                core_topic TEXT NOT NULL DEFAULT '',
                attempts INTEGER NOT NULL CHECK (attempts >= 0),
                wrong INTEGER NOT NULL CHECK (wrong >= 0 AND wrong <= attempts),
                familiarity TEXT NOT NULL DEFAULT 'unknown',
                needs_practice_until TEXT,
                last_result TEXT,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (user_id, q_id)
            );
        ",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS sessions (
                id BLOB PRIMARY KEY,
                user_id TEXT NOT NULL,
                user_name TEXT,
                subject TEXT NOT NULL,
                started_at TEXT NOT NULL,
                total_questions INTEGER NOT NULL CHECK (total_questions >= 0),
                status TEXT NOT NULL,
                ended_at TEXT,
                total_seconds INTEGER,
                correct_count INTEGER,
                accuracy REAL
            );
        ",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS answers (
                id INTEGER PRIMARY KEY,
                session_id BLOB NOT NULL,
                user_id TEXT NOT NULL,
                user_name TEXT,
                subject TEXT NOT NULL,
                q_id TEXT NOT NULL,
                type TEXT NOT NULL,
                core_topic TEXT NOT NULL,
                user_answer TEXT NOT NULL,
                is_correct INTEGER NOT NULL,
                familiarity TEXT NOT NULL,
                read_ms INTEGER NOT NULL CHECK (read_ms >= 0),
                answer_ms INTEGER NOT NULL CHECK (answer_ms >= 0),
                time_ms INTEGER NOT NULL CHECK (time_ms >= 0),
                created_at TEXT NOT NULL,
                UNIQUE (session_id, q_id),
                FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
            );
        ",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r"
            CREATE INDEX IF NOT EXISTS idx_questions_subject_active
                ON questions (subject, active);
        ",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r"
            CREATE INDEX IF NOT EXISTS idx_stats_user_subject
                ON user_question_stats (user_id, subject);
        ",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r"
            CREATE INDEX IF NOT EXISTS idx_sessions_user_started
                ON sessions (user_id, started_at);
        ",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r"
            INSERT INTO schema_migrations (version, applied_at)
            VALUES (?1, ?2)
            ON CONFLICT(version) DO NOTHING
        ",
    )
    .bind(1_i64)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    tracing::info!(version = 1, "applied schema migration");

    Ok(())
}
