use std::collections::HashMap;

use crate::model::{Familiarity, QuestionId, StatRecord};

/// Lookup from question id to one learner's performance record.
#[derive(Debug, Clone, Default)]
pub struct StatsIndex {
    by_question: HashMap<QuestionId, StatRecord>,
}

impl StatsIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index records by question. When the same question appears more than
    /// once the most recently updated record wins.
    #[must_use]
    pub fn from_records(records: impl IntoIterator<Item = StatRecord>) -> Self {
        let mut by_question: HashMap<QuestionId, StatRecord> = HashMap::new();
        for record in records {
            match by_question.get(record.question()) {
                Some(existing) if existing.updated_at() > record.updated_at() => {}
                _ => {
                    by_question.insert(record.question().clone(), record);
                }
            }
        }
        Self { by_question }
    }

    #[must_use]
    pub fn get(&self, question: &QuestionId) -> Option<&StatRecord> {
        self.by_question.get(question)
    }

    /// Familiarity for a question, `Unknown` when never answered.
    #[must_use]
    pub fn familiarity(&self, question: &QuestionId) -> Familiarity {
        self.get(question)
            .map_or(Familiarity::Unknown, StatRecord::familiarity)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_question.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_question.is_empty()
    }
}
