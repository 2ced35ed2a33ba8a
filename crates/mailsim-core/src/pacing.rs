//! Cooperative cancellation and sleeping between iterations.

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use crate::{Error, Result};

/// Stop file name looked up in the working directory by default.
pub const DEFAULT_STOP_FILE: &str = "stop.txt";

/// A point between iterations where a run may stop or sleep.
pub trait Checkpoint {
    /// Stop or sleep for `sleep` seconds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] when the run must stop.
    fn checkpoint(&self, context: &str, sleep: Option<u64>) -> Result<()>;
}

/// Checks the stop file and sleeps at every checkpoint of a run.
#[derive(Debug)]
pub struct Pacer {
    stop_file: PathBuf,
    sleeper: fn(Duration),
    slept: Cell<Duration>,
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new(DEFAULT_STOP_FILE)
    }
}

impl Pacer {
    /// Create a pacer watching `stop_file`.
    pub fn new(stop_file: impl Into<PathBuf>) -> Self {
        Self {
            stop_file: stop_file.into(),
            sleeper: std::thread::sleep,
            slept: Cell::new(Duration::ZERO),
        }
    }

    /// Replace the function used to block, e.g. with a no-op for dry runs.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: fn(Duration)) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Path of the watched stop file.
    #[must_use]
    pub fn stop_file(&self) -> &Path {
        &self.stop_file
    }

    /// Total time requested from the sleeper so far.
    #[must_use]
    pub fn slept(&self) -> Duration {
        self.slept.get()
    }

    /// Whether the stop file exists.
    #[must_use]
    pub fn stop_requested(&self) -> bool {
        self.stop_file.exists()
    }
}

impl Checkpoint for Pacer {
    /// Stop if the stop file exists, otherwise sleep for `sleep` seconds.
    fn checkpoint(&self, context: &str, sleep: Option<u64>) -> Result<()> {
        if self.stop_requested() {
            warn!(
                context,
                stop_file = %self.stop_file.display(),
                "Stop file detected, stopping the run"
            );
            return Err(Error::Cancelled);
        }
        if let Some(seconds) = sleep.filter(|s| *s > 0) {
            info!(context, "Sleeping for {seconds} seconds");
            let duration = Duration::from_secs(seconds);
            (self.sleeper)(duration);
            self.slept.set(self.slept.get() + duration);
        }
        Ok(())
    }
}
