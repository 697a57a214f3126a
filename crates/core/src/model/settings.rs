use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("round size must be > 0")]
    InvalidRoundSize,

    #[error("fetch limits must be > 0")]
    InvalidFetchLimit,

    #[error("needs-practice horizon must be at least one hour")]
    InvalidHorizon,

    #[error("jitter amplitude must be in [0, 1], got {0}")]
    InvalidJitter(f64),
}

/// How questions the learner marked `mastered` are treated during selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MasteredPolicy {
    /// Drop mastered questions from the weighted pool entirely.
    #[default]
    Exclude,
    /// Keep them in the pool; the weight function scales them by 0.25.
    DownWeight,
}

/// Tunables for round selection and stats bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainerSettings {
    round_size: usize,
    mastered_policy: MasteredPolicy,
    question_fetch_limit: u32,
    stats_fetch_limit: u32,
    needs_practice_hours: u32,
    jitter: f64,
}

impl Default for TrainerSettings {
    /// Ten-question rounds, mastered questions excluded, 800 questions and
    /// 2000 stats per lookup, a 24 hour needs-practice horizon and 0.5 jitter.
    fn default() -> Self {
        Self {
            round_size: 10,
            mastered_policy: MasteredPolicy::Exclude,
            question_fetch_limit: 800,
            stats_fetch_limit: 2000,
            needs_practice_hours: 24,
            jitter: 0.5,
        }
    }
}

impl TrainerSettings {
    /// Creates custom settings.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if a size or limit is zero, the horizon is zero
    /// hours, or the jitter amplitude is outside `[0, 1]`.
    pub fn new(
        round_size: usize,
        mastered_policy: MasteredPolicy,
        question_fetch_limit: u32,
        stats_fetch_limit: u32,
        needs_practice_hours: u32,
        jitter: f64,
    ) -> Result<Self, SettingsError> {
        if round_size == 0 {
            return Err(SettingsError::InvalidRoundSize);
        }
        if question_fetch_limit == 0 || stats_fetch_limit == 0 {
            return Err(SettingsError::InvalidFetchLimit);
        }
        if needs_practice_hours == 0 {
            return Err(SettingsError::InvalidHorizon);
        }
        if !(0.0..=1.0).contains(&jitter) {
            return Err(SettingsError::InvalidJitter(jitter));
        }
        Ok(Self {
            round_size,
            mastered_policy,
            question_fetch_limit,
            stats_fetch_limit,
            needs_practice_hours,
            jitter,
        })
    }

    #[must_use]
    pub fn round_size(&self) -> usize {
        self.round_size
    }

    #[must_use]
    pub fn mastered_policy(&self) -> MasteredPolicy {
        self.mastered_policy
    }

    #[must_use]
    pub fn question_fetch_limit(&self) -> u32 {
        self.question_fetch_limit
    }

    #[must_use]
    pub fn stats_fetch_limit(&self) -> u32 {
        self.stats_fetch_limit
    }

    #[must_use]
    pub fn needs_practice_horizon(&self) -> Duration {
        Duration::hours(i64::from(self.needs_practice_hours))
    }

    #[must_use]
    pub fn jitter(&self) -> f64 {
        self.jitter
    }
}
