//! Command-line entry points for Petwise.
//!
//! ```text
//! petwise chat --user u123 --name Sam --pet Biscuit:Dog
//! petwise report --date 2026-03-14
//! ```

pub mod console;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use petwise_core::{PetProfile, UserContext};
use petwise_eval::EvalLogWriter;
use petwise_memory::InMemoryUserStore;
use petwise_runner::{AppConfig, Assistant};
use petwise_telemetry::init_telemetry;

#[derive(Parser, Debug)]
#[command(name = "petwise")]
#[command(about = "Pet supply shopping assistant", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Chat with the assistant in the terminal
    Chat {
        /// Customer id used for persona, pets and logs
        #[arg(short, long, default_value = "local")]
        user: String,

        /// Display name used in greetings
        #[arg(long)]
        name: Option<String>,

        /// Pet as NAME or NAME:SPECIES; repeatable
        #[arg(long = "pet")]
        pets: Vec<String>,
    },
    /// Aggregate one day of evaluation logs into a report
    Report {
        /// Day to aggregate (YYYY-MM-DD); defaults to today
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Log root; defaults to PETWISE_EVAL_LOG_DIR
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

/// `NAME` or `NAME:SPECIES`.
pub fn parse_pet(spec: &str) -> Option<PetProfile> {
    let (name, species) = match spec.split_once(':') {
        Some((name, species)) => (name.trim(), Some(species.trim())),
        None => (spec.trim(), None),
    };
    if name.is_empty() {
        return None;
    }
    let mut pet = PetProfile::new(name);
    pet.species = species.filter(|s| !s.is_empty()).map(str::to_string);
    Some(pet)
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("reading configuration")?;
    if let Err(e) = init_telemetry("petwise-cli", config.log_format) {
        eprintln!("logging disabled: {e}");
    }

    match cli.command {
        Command::Chat { user, name, pets } => {
            let store = Arc::new(InMemoryUserStore::new());
            let mut context = UserContext::new(&user);
            context.display_name = name;
            store.upsert_user(context).await;
            for spec in &pets {
                match parse_pet(spec) {
                    Some(pet) => store.add_pet(&user, pet).await,
                    None => eprintln!("ignoring pet '{spec}'"),
                }
            }

            let assistant = Assistant::from_config(&config, store).context("starting the assistant")?;
            console::chat(&assistant, &user).await
        }
        Command::Report { date, dir } => {
            let writer = EvalLogWriter::new(dir.unwrap_or(config.eval_log_dir));
            let date = date.unwrap_or_else(|| chrono::Utc::now().date_naive());
            let (path, report) = writer.write_report(date).await.context("building the report")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            eprintln!("report written to {}", path.display());
            Ok(())
        }
    }
}
