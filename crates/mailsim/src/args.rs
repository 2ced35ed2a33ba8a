//! Command line arguments.

use std::path::PathBuf;

use clap::Parser;
use mailsim_core::{DEFAULT_STOP_FILE, ProviderKind};

/// Replay a mailbox operation sequence against a mail store.
#[derive(Debug, Parser)]
#[command(name = "mailsim", version, about)]
pub struct Cli {
    /// Sequence XML file to run.
    pub sequence: PathBuf,

    /// JSON fixture seeding the in-memory mailbox.
    #[arg(long, value_name = "FIXTURE")]
    pub mailbox: Option<PathBuf>,

    /// The run stops cleanly at the next checkpoint once this file exists.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_STOP_FILE)]
    pub stop_file: PathBuf,

    /// Seed for repeatable random selection.
    #[arg(long, env = "MAILSIM_SEED")]
    pub seed: Option<u64>,

    /// Directory for the JSON log file, overriding `LogFileLocation`.
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Mail store backend, overriding `Provider`.
    #[arg(long, value_parser = parse_provider)]
    pub provider: Option<ProviderKind>,
}

fn parse_provider(s: &str) -> Result<ProviderKind, String> {
    ProviderKind::parse(s)
        .ok_or_else(|| format!("unknown provider {s:?}, expected Memory, OOM, HTTP or SDK"))
}
