//! The `quiz import` command.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

use quiz_core::model::{Question, QuestionDoc};
use storage::repository::Storage;

/// Counts reported after an import.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
}

pub async fn execute(storage: &Storage, path: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading questions from {}", path.display()))?;
    let report = import_questions(storage, &raw).await?;
    println!(
        "Imported {} question(s), skipped {} malformed.",
        report.imported, report.skipped
    );
    Ok(())
}

/// Import a JSON array of question documents. Documents that fail to
/// deserialize or validate are skipped with a warning; storage failures abort.
pub async fn import_questions(storage: &Storage, raw: &str) -> Result<ImportReport> {
    let docs: Vec<Value> = serde_json::from_str(raw).context("expected a JSON array of questions")?;
    let mut report = ImportReport::default();

    for (index, value) in docs.into_iter().enumerate() {
        let question = match parse_question(value) {
            Ok(question) => question,
            Err(err) => {
                tracing::warn!(index, error = %err, "skipping malformed question");
                report.skipped += 1;
                continue;
            }
        };
        storage
            .questions
            .upsert_question(&question)
            .await
            .with_context(|| format!("storing question {}", question.id))?;
        report.imported += 1;
    }

    tracing::info!(imported = report.imported, skipped = report.skipped, "import finished");
    Ok(report)
}

fn parse_question(value: Value) -> Result<Question> {
    let doc: QuestionDoc = serde_json::from_value(value)?;
    Ok(doc.validate().map_err(quiz_core::error::Error::from)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{QuestionKind, Subject};

    #[tokio::test]
    async fn imports_valid_docs_and_skips_the_rest() {
        let storage = Storage::in_memory();
        let raw = r#"[
            {"q_id": "p1", "subject": "physics", "type": "TF", "core_topic": "Optics",
             "statement": "Light bends in water.", "answer_key": "true", "active": true},
            {"q_id": "p2", "subject": "physics", "type": "flashcard",
             "statement": "Define refraction.", "answer_key": "Bending of light",
             "teacher_priority": 2, "force_repeat": true, "active": true},
            {"q_id": "p3", "subject": "physics", "type": "MCQ", "statement": "?", "active": true},
            {"subject": "physics", "type": "TF", "statement": "no id", "active": true},
            {"q_id": "p5", "subject": "physics", "type": "TF", "statement": "bad key",
             "answer_key": "maybe", "active": "true"},
            {"q_id": "p6", "subject": "physics", "type": "TF", "statement": "x",
             "answer_key": "TRUE", "teacher_priority": "high", "active": true},
            42
        ]"#;

        let report = import_questions(&storage, raw).await.unwrap();
        assert_eq!(
            report,
            ImportReport {
                imported: 4,
                skipped: 3
            }
        );

        let stored = storage
            .questions
            .active_questions(&Subject::new("physics").unwrap(), 800)
            .await
            .unwrap();
        assert_eq!(stored.len(), 4);
        assert_eq!(stored[1].kind, QuestionKind::Card);
        assert!(stored[1].force_repeat);
        assert!(stored[0].expects_true());
        // Unrecognised keys read as false; unparseable priorities default to 0.
        assert!(!stored[2].expects_true());
        assert_eq!(stored[3].teacher_priority, 0.0);
    }

    #[tokio::test]
    async fn non_array_input_is_an_error() {
        let storage = Storage::in_memory();
        assert!(import_questions(&storage, r#"{"q_id": "p1"}"#).await.is_err());
    }
}
