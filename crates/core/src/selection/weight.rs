use rand::Rng;

use crate::model::{Familiarity, Question, StatRecord};

/// Scores how much a learner needs to see a question again.
///
/// `base + wrong_rate_factor·wrongRate + needs_practice_bonus
///  + priority_factor·teacher_priority + force_repeat_bonus + jitter`,
/// all scaled by `mastered_factor` when the question is mastered.
/// Never returns a negative value.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightFunction {
    pub base: f64,
    pub wrong_rate_factor: f64,
    pub needs_practice_bonus: f64,
    pub priority_factor: f64,
    pub force_repeat_bonus: f64,
    pub mastered_factor: f64,
    jitter: f64,
}

impl Default for WeightFunction {
    fn default() -> Self {
        Self {
            base: 1.0,
            wrong_rate_factor: 4.0,
            needs_practice_bonus: 3.0,
            priority_factor: 2.0,
            force_repeat_bonus: 2.0,
            mastered_factor: 0.25,
            jitter: 0.5,
        }
    }
}

impl WeightFunction {
    /// Set the jitter amplitude, clamped to `[0, 1]`.
    #[must_use]
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = if jitter.is_finite() {
            jitter.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }

    #[must_use]
    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    /// Weight without the random jitter term.
    #[must_use]
    pub fn score(&self, question: &Question, stat: Option<&StatRecord>) -> f64 {
        self.combine(question, stat, 0.0)
    }

    /// Weight with a fresh jitter draw from `rng`.
    pub fn weight<R: Rng + ?Sized>(
        &self,
        question: &Question,
        stat: Option<&StatRecord>,
        rng: &mut R,
    ) -> f64 {
        let jitter = if self.jitter > 0.0 {
            rng.random::<f64>() * self.jitter
        } else {
            0.0
        };
        self.combine(question, stat, jitter)
    }

    fn combine(&self, question: &Question, stat: Option<&StatRecord>, jitter: f64) -> f64 {
        let wrong_rate = stat.map_or(0.0, StatRecord::wrong_rate);
        let familiarity = stat.map_or(Familiarity::Unknown, StatRecord::familiarity);
        let priority = if question.teacher_priority.is_finite() {
            question.teacher_priority.max(0.0)
        } else {
            0.0
        };

        let mut w = self.base
            + self.wrong_rate_factor * wrong_rate
            + self.priority_factor * priority
            + jitter;
        if familiarity == Familiarity::NeedsPractice {
            w += self.needs_practice_bonus;
        }
        if question.force_repeat {
            w += self.force_repeat_bonus;
        }
        if familiarity == Familiarity::Mastered {
            w *= self.mastered_factor;
        }

        if w.is_finite() { w.max(0.0) } else { 0.0 }
    }
}
