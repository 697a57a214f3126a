use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use quiz_core::error::Error as ModelError;
use quiz_core::model::{LearnerId, MasteredPolicy, Subject, TrainerSettings};

/// File-backed configuration. Every field has a default so an empty or
/// partial file is valid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default)]
    pub trainer: TrainerConfig,
    #[serde(default = "default_learners")]
    pub learners: Vec<LearnerEntry>,
    #[serde(default = "default_subjects")]
    pub subjects: Vec<SubjectEntry>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    #[serde(default = "default_round_size")]
    pub round_size: usize,
    #[serde(default)]
    pub mastered_policy: MasteredPolicy,
    #[serde(default = "default_question_fetch_limit")]
    pub question_fetch_limit: u32,
    #[serde(default = "default_stats_fetch_limit")]
    pub stats_fetch_limit: u32,
    #[serde(default = "default_needs_practice_hours")]
    pub needs_practice_hours: u32,
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnerEntry {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectEntry {
    pub key: String,
    pub label: String,
}

fn default_database_url() -> String {
    "sqlite://quiz.sqlite3".to_string()
}
fn default_round_size() -> usize {
    10
}
fn default_question_fetch_limit() -> u32 {
    800
}
fn default_stats_fetch_limit() -> u32 {
    2000
}
fn default_needs_practice_hours() -> u32 {
    24
}
fn default_jitter() -> f64 {
    0.5
}
fn default_learners() -> Vec<LearnerEntry> {
    [("chiao", "Chiao"), ("ashley", "Ashley"), ("tester", "Tester")]
        .into_iter()
        .map(|(id, name)| LearnerEntry {
            id: id.to_string(),
            name: name.to_string(),
        })
        .collect()
}
fn default_subjects() -> Vec<SubjectEntry> {
    [
        ("physics", "Physics"),
        ("chemistry", "Chemistry"),
        ("biology", "Biology"),
        ("earth", "Earth Science"),
    ]
    .into_iter()
    .map(|(key, label)| SubjectEntry {
        key: key.to_string(),
        label: label.to_string(),
    })
    .collect()
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            round_size: default_round_size(),
            mastered_policy: MasteredPolicy::default(),
            question_fetch_limit: default_question_fetch_limit(),
            stats_fetch_limit: default_stats_fetch_limit(),
            needs_practice_hours: default_needs_practice_hours(),
            jitter: default_jitter(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            trainer: TrainerConfig::default(),
            learners: default_learners(),
            subjects: default_subjects(),
        }
    }
}

impl Config {
    /// Load from `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check settings and roster entries.
    pub fn validate(&self) -> Result<(), ModelError> {
        self.trainer_settings()?;
        for learner in &self.learners {
            LearnerId::new(&learner.id)?;
        }
        for subject in &self.subjects {
            Subject::new(&subject.key)?;
        }
        Ok(())
    }

    pub fn trainer_settings(&self) -> Result<TrainerSettings, ModelError> {
        let t = &self.trainer;
        Ok(TrainerSettings::new(
            t.round_size,
            t.mastered_policy,
            t.question_fetch_limit,
            t.stats_fetch_limit,
            t.needs_practice_hours,
            t.jitter,
        )?)
    }

    /// Display name of a learner on the roster.
    pub fn learner_name(&self, id: &str) -> Option<&str> {
        self.learners
            .iter()
            .find(|l| l.id == id.trim())
            .map(|l| l.name.as_str())
    }

    pub fn has_subject(&self, key: &str) -> bool {
        self.subjects.iter().any(|s| s.key == key.trim())
    }
}
