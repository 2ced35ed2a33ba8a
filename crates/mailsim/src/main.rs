//! `MailSim` - mailbox load simulation
//!
//! Replays an XML operation sequence against a mail store.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod args;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, bail};
use clap::Parser;
use mailsim_core::{
    MailStore, MemoryStore, Pacer, ProviderKind, RunOutcome, SequenceConfig, SequenceExecutor,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use args::Cli;

const DEFAULT_ADDRESS: &str = "mailsim@localhost";

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let sequence = mailsim_core::load_sequence(&cli.sequence)
        .with_context(|| format!("Failed to load sequence {}", cli.sequence.display()))?;

    let log_dir = cli.log_dir.clone().or_else(|| sequence.log_file_location.clone());
    init_logging(log_dir.as_deref(), &cli.sequence)?;

    let provider = cli.provider.unwrap_or(sequence.provider);
    info!(sequence = %cli.sequence.display(), provider = %provider, "Starting MailSim");

    let store = open_store(provider, cli.mailbox.as_deref(), &sequence)?;
    let mut executor = SequenceExecutor::new(store).with_pacer(Pacer::new(&cli.stop_file));
    if let Some(seed) = cli.seed {
        executor = executor.with_seed(seed);
    }

    match executor.execute(&sequence)? {
        RunOutcome::Completed => info!("MailSim finished"),
        RunOutcome::Cancelled => {
            warn!(stop_file = %cli.stop_file.display(), "MailSim stopped by stop file");
        }
    }
    Ok(())
}

fn init_logging(log_dir: Option<&Path>, sequence: &Path) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mailsim=info,mailsim_core=info".into());

    let file_layer = match log_dir {
        Some(dir) => {
            if !dir.is_dir() {
                bail!("Log file location {} does not exist", dir.display());
            }
            let path = log_file_path(dir, sequence);
            let file = File::create(&path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            Some(fmt::layer().json().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();
    Ok(())
}

fn log_file_path(dir: &Path, sequence: &Path) -> PathBuf {
    let stem = sequence
        .file_stem()
        .map_or_else(|| "sequence".into(), |s| s.to_string_lossy());
    let started = chrono::Local::now().format("%Y-%m-%d %H-%M-%S");
    dir.join(format!("{started} {stem}.log"))
}

fn open_store(
    provider: ProviderKind,
    fixture: Option<&Path>,
    sequence: &SequenceConfig,
) -> anyhow::Result<Box<dyn MailStore>> {
    match provider {
        ProviderKind::Memory => {
            let store = match fixture {
                Some(path) => MemoryStore::from_fixture_file(path)
                    .with_context(|| format!("Failed to load mailbox fixture {}", path.display()))?,
                None => MemoryStore::new(
                    sequence.mailbox.as_deref().unwrap_or("MailSim"),
                    DEFAULT_ADDRESS,
                ),
            };
            info!(mailbox = %store.display_name(), "Opened in-memory mail store");
            Ok(Box::new(store))
        }
        other => Err(mailsim_core::Error::UnsupportedProvider(other.to_string()))
            .context("Failed to open mail store"),
    }
}
