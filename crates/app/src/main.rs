//! `quiz`: adaptive true/false and flashcard trainer on the command line.

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use services::{Clock, PracticeRequest, PracticeService, SessionError};
use storage::repository::Storage;

mod commands;
mod config;
mod db;

use config::Config;

#[derive(Parser)]
#[command(name = "quiz", version, about = "Adaptive quiz trainer")]
struct Cli {
    /// Config file path
    #[arg(long, global = true, env = "QUIZ_CONFIG")]
    config: Option<PathBuf>,

    /// Database URL or path; overrides the config file
    #[arg(long, global = true, env = "QUIZ_DB_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Practice one round
    Practice {
        /// Learner id from the roster
        #[arg(long, env = "QUIZ_LEARNER")]
        learner: Option<String>,

        /// Subject key
        #[arg(long)]
        subject: Option<String>,

        /// Seed for reproducible rounds
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Show the next round and its weights without starting a session
    Preview {
        #[arg(long, env = "QUIZ_LEARNER")]
        learner: Option<String>,

        #[arg(long)]
        subject: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Import questions from a JSON array
    Import {
        /// Path to the JSON file
        path: PathBuf,
    },

    /// List the learner roster
    Learners,

    /// List subjects
    Subjects,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,quiz=info")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        if e
            .downcast_ref::<SessionError>()
            .is_some_and(SessionError::is_prerequisite)
        {
            eprintln!("Hint: pass --learner and --subject (see `quiz learners` and `quiz subjects`).");
        }
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Learners => commands::roster::learners(&config),
        Commands::Subjects => commands::roster::subjects(&config),
        Commands::Import { path } => {
            let storage = open_storage(&config, cli.database_url.as_deref()).await?;
            commands::import::execute(&storage, &path).await
        }
        Commands::Practice {
            learner,
            subject,
            seed,
        } => {
            let storage = open_storage(&config, cli.database_url.as_deref()).await?;
            let service = practice_service(&config, &storage, seed)?;
            let request = practice_request(&config, learner, subject);
            commands::practice::execute(&service, &request).await
        }
        Commands::Preview {
            learner,
            subject,
            json,
            seed,
        } => {
            let storage = open_storage(&config, cli.database_url.as_deref()).await?;
            let service = practice_service(&config, &storage, seed)?;
            let request = practice_request(&config, learner, subject);
            commands::preview::execute(&service, &request, json).await
        }
    }
}

async fn open_storage(config: &Config, override_url: Option<&str>) -> Result<Storage> {
    let url = db::normalize_sqlite_url(override_url.unwrap_or(&config.database_url));
    db::prepare_sqlite_file(&url)?;
    tracing::debug!(%url, "opening database");
    Storage::sqlite(&url)
        .await
        .with_context(|| format!("opening database {url}"))
}

fn practice_service(config: &Config, storage: &Storage, seed: Option<u64>) -> Result<PracticeService> {
    let settings = config.trainer_settings()?;
    let service = PracticeService::new(Clock::default(), settings, storage);
    Ok(match seed {
        Some(seed) => service.with_seed(seed),
        None => service,
    })
}

fn practice_request(
    config: &Config,
    learner: Option<String>,
    subject: Option<String>,
) -> PracticeRequest {
    let learner_name = learner
        .as_deref()
        .and_then(|id| config.learner_name(id))
        .map(str::to_string);
    if let Some(id) = learner.as_deref() {
        if learner_name.is_none() {
            tracing::warn!(learner = id, "learner is not on the roster");
        }
    }
    if let Some(key) = subject.as_deref() {
        if !config.has_subject(key) {
            tracing::warn!(subject = key, "subject is not configured");
        }
    }

    PracticeRequest {
        learner,
        learner_name,
        subject,
    }
}
