use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;
use std::collections::HashSet;

use crate::model::{
    Familiarity, MasteredPolicy, Question, QuestionId, QuestionKind, Subject, TrainerSettings,
};
use crate::selection::sampler::sample_without_replacement;
use crate::selection::stats_index::StatsIndex;
use crate::selection::weight::WeightFunction;

//
// ─── ROUND ─────────────────────────────────────────────────────────────────────
//

/// Ordered questions served in one practice session.
///
/// Never holds the same question twice and at most one `force_repeat`
/// question. An empty round means there is nothing to practice.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Round {
    questions: Vec<Question>,
    forced: Option<QuestionId>,
}

impl Round {
    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// The question inserted because of its `force_repeat` flag, if any.
    #[must_use]
    pub fn forced(&self) -> Option<&QuestionId> {
        self.forced.as_ref()
    }

    #[must_use]
    pub fn contains(&self, id: &QuestionId) -> bool {
        self.questions.iter().any(|q| &q.id == id)
    }
}

//
// ─── DIAGNOSTICS ───────────────────────────────────────────────────────────────
//

/// Why a question scored the way it did; one row per question in a round.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundDiagnostic {
    pub question_id: QuestionId,
    pub kind: QuestionKind,
    pub topic: String,
    pub weight: f64,
    pub attempts: u32,
    pub wrong: u32,
    /// Rounded to two decimals.
    pub wrong_rate: f64,
    pub familiarity: Familiarity,
    pub teacher_priority: f64,
    pub force_repeat: bool,
}

//
// ─── BUILDER ───────────────────────────────────────────────────────────────────
//

/// Builds a round from the catalog and a learner's stats.
///
/// 1. Candidates: active questions of the subject, first occurrence of each id.
/// 2. Forced pick: one `force_repeat` candidate chosen uniformly, if any.
/// 3. Remainder pool: every other candidate that is not `force_repeat`, minus
///    mastered questions when the policy excludes them.
/// 4. Weighted draw without replacement to fill the round.
/// 5. Shuffle and truncate to the round size.
pub struct RoundBuilder<'a> {
    settings: &'a TrainerSettings,
    weights: WeightFunction,
}

impl<'a> RoundBuilder<'a> {
    #[must_use]
    pub fn new(settings: &'a TrainerSettings) -> Self {
        Self {
            settings,
            weights: WeightFunction::default().with_jitter(settings.jitter()),
        }
    }

    /// Replace the weight function (usually to zero out jitter in tests).
    #[must_use]
    pub fn with_weights(mut self, weights: WeightFunction) -> Self {
        self.weights = weights;
        self
    }

    #[must_use]
    pub fn weights(&self) -> &WeightFunction {
        &self.weights
    }

    pub fn build<R: Rng + ?Sized>(
        &self,
        catalog: impl IntoIterator<Item = Question>,
        stats: &StatsIndex,
        subject: &Subject,
        rng: &mut R,
    ) -> Round {
        let round_size = self.settings.round_size();

        let mut seen: HashSet<QuestionId> = HashSet::new();
        let mut candidates: Vec<Question> = catalog
            .into_iter()
            .filter(|q| q.active && &q.subject == subject)
            .filter(|q| seen.insert(q.id.clone()))
            .collect();

        let forced = {
            let forceable: Vec<usize> = candidates
                .iter()
                .enumerate()
                .filter(|(_, q)| q.force_repeat)
                .map(|(i, _)| i)
                .collect();
            if forceable.is_empty() {
                None
            } else {
                let pick = forceable[rng.random_range(0..forceable.len())];
                Some(candidates.remove(pick))
            }
        };

        let exclude_mastered = self.settings.mastered_policy() == MasteredPolicy::Exclude;
        let remainder: Vec<Question> = candidates
            .into_iter()
            .filter(|q| !q.force_repeat)
            .filter(|q| !(exclude_mastered && stats.familiarity(&q.id) == Familiarity::Mastered))
            .collect();

        let need = round_size.saturating_sub(usize::from(forced.is_some()));
        let picked = sample_without_replacement(remainder, need, rng, |q, r| {
            self.weights.weight(q, stats.get(&q.id), r)
        });

        let forced_id = forced.as_ref().map(|q| q.id.clone());
        let mut questions: Vec<Question> = forced.into_iter().chain(picked).collect();
        questions.shuffle(rng);
        questions.truncate(round_size);

        Round {
            forced: forced_id.filter(|id| questions.iter().any(|q| &q.id == id)),
            questions,
        }
    }

    /// Jitter-free weights and stats for every question of `round`, heaviest first.
    #[must_use]
    pub fn diagnose(&self, round: &Round, stats: &StatsIndex) -> Vec<RoundDiagnostic> {
        let mut rows: Vec<RoundDiagnostic> = round
            .questions()
            .iter()
            .map(|q| {
                let stat = stats.get(&q.id);
                let wrong_rate = stat.map_or(0.0, |s| s.wrong_rate());
                RoundDiagnostic {
                    question_id: q.id.clone(),
                    kind: q.kind,
                    topic: q.topic.clone(),
                    weight: self.weights.score(q, stat),
                    attempts: stat.map_or(0, |s| s.attempts()),
                    wrong: stat.map_or(0, |s| s.wrong()),
                    wrong_rate: (wrong_rate * 100.0).round() / 100.0,
                    familiarity: stats.familiarity(&q.id),
                    teacher_priority: q.teacher_priority,
                    force_repeat: q.force_repeat,
                }
            })
            .collect();
        rows.sort_by(|a, b| b.weight.total_cmp(&a.weight));
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LearnerId, StatOutcome, StatRecord, Verdict};
    use crate::time::fixed_now;
    use chrono::Duration;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn question(id: &str, subject: &str) -> Question {
        Question {
            id: QuestionId::new(id).unwrap(),
            subject: Subject::new(subject).unwrap(),
            kind: QuestionKind::TrueFalse,
            topic: "General".into(),
            statement: format!("Statement {id}"),
            answer_key: "TRUE".into(),
            explanation: String::new(),
            teacher_priority: 0.0,
            force_repeat: false,
            active: true,
        }
    }

    fn forced(id: &str) -> Question {
        Question {
            force_repeat: true,
            ..question(id, "physics")
        }
    }

    fn catalog(n: usize) -> Vec<Question> {
        (0..n).map(|i| question(&format!("q{i}"), "physics")).collect()
    }

    fn stat(id: &str, verdict: Verdict) -> StatRecord {
        StatRecord::first(&StatOutcome::from_verdict(
            LearnerId::new("chiao").unwrap(),
            QuestionId::new(id).unwrap(),
            Subject::new("physics").unwrap(),
            "General",
            QuestionKind::TrueFalse,
            true,
            verdict,
            fixed_now(),
            Duration::hours(24),
        ))
    }

    fn physics() -> Subject {
        Subject::new("physics").unwrap()
    }

    fn ids(round: &Round) -> Vec<&str> {
        round.questions().iter().map(|q| q.id.as_str()).collect()
    }

    #[test]
    fn large_pool_gives_full_round_without_duplicates() {
        let settings = TrainerSettings::default();
        let builder = RoundBuilder::new(&settings);
        for seed in 0..25 {
            let mut rng = StdRng::seed_from_u64(seed);
            let round = builder.build(catalog(40), &StatsIndex::new(), &physics(), &mut rng);
            assert_eq!(round.len(), 10);
            let unique: HashSet<_> = ids(&round).into_iter().collect();
            assert_eq!(unique.len(), 10);
        }
    }

    #[test]
    fn duplicate_catalog_entries_are_served_once() {
        let settings = TrainerSettings::default();
        let mut cat = catalog(3);
        cat.extend(catalog(3));
        let mut rng = StdRng::seed_from_u64(9);
        let round = RoundBuilder::new(&settings).build(cat, &StatsIndex::new(), &physics(), &mut rng);
        assert_eq!(round.len(), 3);
    }

    #[test]
    fn forced_question_is_always_included_and_alone() {
        let settings = TrainerSettings::default();
        let builder = RoundBuilder::new(&settings);
        let mut cat = catalog(12);
        cat.push(forced("f1"));
        cat.push(forced("f2"));
        cat.push(forced("f3"));

        for seed in 0..40 {
            let mut rng = StdRng::seed_from_u64(seed);
            let round = builder.build(cat.clone(), &StatsIndex::new(), &physics(), &mut rng);
            assert_eq!(round.len(), 10);
            let forced_count = round.questions().iter().filter(|q| q.force_repeat).count();
            assert_eq!(forced_count, 1);
            let forced_id = round.forced().unwrap();
            assert!(round.contains(forced_id));
        }
    }

    #[test]
    fn mastered_questions_are_left_out_of_the_pool() {
        let settings = TrainerSettings::default();
        let stats = StatsIndex::from_records(vec![
            stat("q0", Verdict::Mastered),
            stat("q1", Verdict::Mastered),
            stat("q2", Verdict::NeedsPractice),
        ]);
        let mut rng = StdRng::seed_from_u64(3);
        let round = RoundBuilder::new(&settings).build(catalog(5), &stats, &physics(), &mut rng);
        let mut got = ids(&round);
        got.sort_unstable();
        assert_eq!(got, vec!["q2", "q3", "q4"]);
    }

    #[test]
    fn mastered_forced_question_can_still_be_forced() {
        let settings = TrainerSettings::default();
        let stats = StatsIndex::from_records(vec![stat("f1", Verdict::Mastered)]);
        let mut rng = StdRng::seed_from_u64(4);
        let mut cat = catalog(2);
        cat.push(forced("f1"));
        let round = RoundBuilder::new(&settings).build(cat, &stats, &physics(), &mut rng);
        assert!(round.contains(&QuestionId::new("f1").unwrap()));
    }

    #[test]
    fn down_weight_policy_keeps_mastered_questions_eligible() {
        let settings =
            TrainerSettings::new(10, MasteredPolicy::DownWeight, 800, 2000, 24, 0.5).unwrap();
        let stats = StatsIndex::from_records(vec![stat("q0", Verdict::Mastered)]);
        let mut rng = StdRng::seed_from_u64(5);
        let round = RoundBuilder::new(&settings).build(catalog(3), &stats, &physics(), &mut rng);
        assert_eq!(round.len(), 3);
    }

    #[test]
    fn filters_inactive_and_other_subjects() {
        let settings = TrainerSettings::default();
        let mut cat = catalog(2);
        cat.push(question("chem", "chemistry"));
        cat.push(Question {
            active: false,
            ..question("off", "physics")
        });
        let mut rng = StdRng::seed_from_u64(6);
        let round = RoundBuilder::new(&settings).build(cat, &StatsIndex::new(), &physics(), &mut rng);
        let mut got = ids(&round);
        got.sort_unstable();
        assert_eq!(got, vec!["q0", "q1"]);
    }

    #[test]
    fn empty_catalog_gives_empty_round() {
        let settings = TrainerSettings::default();
        let mut rng = StdRng::seed_from_u64(7);
        let round = RoundBuilder::new(&settings).build(
            Vec::new(),
            &StatsIndex::new(),
            &physics(),
            &mut rng,
        );
        assert!(round.is_empty());
        assert!(round.forced().is_none());
    }

    #[test]
    fn respects_custom_round_size() {
        let settings =
            TrainerSettings::new(4, MasteredPolicy::Exclude, 800, 2000, 24, 0.5).unwrap();
        let mut cat = catalog(10);
        cat.push(forced("f1"));
        let mut rng = StdRng::seed_from_u64(8);
        let round = RoundBuilder::new(&settings).build(cat, &StatsIndex::new(), &physics(), &mut rng);
        assert_eq!(round.len(), 4);
        assert!(round.contains(&QuestionId::new("f1").unwrap()));
    }

    #[test]
    fn diagnostics_sorted_by_weight() {
        let settings = TrainerSettings::default();
        let builder = RoundBuilder::new(&settings);
        let stats = StatsIndex::from_records(vec![stat("q1", Verdict::NeedsPractice)]);
        let mut rng = StdRng::seed_from_u64(10);
        let round = builder.build(catalog(3), &stats, &physics(), &mut rng);
        let rows = builder.diagnose(&round, &stats);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].question_id.as_str(), "q1");
        assert_eq!(rows[0].familiarity, Familiarity::NeedsPractice);
        assert!((rows[0].weight - 4.0).abs() < 1e-9);
        assert_eq!(rows[0].attempts, 1);
    }
}
