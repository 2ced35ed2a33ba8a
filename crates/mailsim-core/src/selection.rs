//! Iteration over a shrinking candidate set.
//!
//! [`ParsedOperation`] owns the candidates of one task invocation (mails or
//! folders), works out how many iterations to run from the operation's
//! [`Count`], and hands each iteration the index to act on:
//!
//! - random counts draw uniformly from `[1, candidates]`
//! - explicit counts above the candidate count are clamped with a warning
//! - random selection draws from the list as it stands at that iteration,
//!   ordered selection always takes the last entry

use rand::Rng;
use tracing::{error, info, warn};

use crate::operation::Count;
use crate::pacing::Checkpoint;
use crate::{Error, Result};

/// Candidate set and iteration plan for one task invocation.
#[derive(Debug)]
pub struct ParsedOperation<T> {
    name: String,
    candidates: Vec<T>,
    iterations: usize,
    random: bool,
}

impl<T> ParsedOperation<T> {
    /// Plan iterations for `count` over `candidates`.
    pub fn new<R: Rng + ?Sized>(
        name: impl Into<String>,
        count: Count,
        candidates: Vec<T>,
        rng: &mut R,
    ) -> Self {
        let name = name.into();
        let available = candidates.len();
        let (iterations, random) = if available == 0 {
            info!(operation = %name, "No candidates to operate on");
            (0, count.is_random())
        } else {
            match count {
                Count::Random => (rng.gen_range(1..=available), true),
                Count::Fixed(requested) => {
                    let requested = requested as usize;
                    if requested > available {
                        warn!(
                            operation = %name,
                            "Count {requested} exceeds the {available} available item(s), clamping"
                        );
                        (available, false)
                    } else {
                        (requested, false)
                    }
                }
            }
        };
        Self {
            name,
            candidates,
            iterations,
            random,
        }
    }

    /// Number of iterations that will run.
    #[must_use]
    pub const fn iterations(&self) -> usize {
        self.iterations
    }

    /// Whether indices are drawn at random.
    #[must_use]
    pub const fn is_random(&self) -> bool {
        self.random
    }

    /// Candidates not consumed yet.
    #[must_use]
    pub fn candidates(&self) -> &[T] {
        &self.candidates
    }

    /// Index to act on next, or `None` once the candidates are exhausted.
    pub fn next_index<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<usize> {
        next_index(self.random, self.candidates.len(), rng)
    }

    /// Run every planned iteration.
    ///
    /// `body` receives the rng, the candidate list and the selected index; it
    /// is expected to remove what it consumed. The loop stops at the first
    /// iteration that fails or returns `false`, and a checkpoint with the
    /// operation's `sleep` follows every iteration.
    ///
    /// Returns `Ok(true)` when every iteration succeeded.
    ///
    /// # Errors
    ///
    /// Only [`Error::Cancelled`] is returned; other failures are logged and
    /// reported as `Ok(false)`.
    pub fn iterate<R, C, F>(
        &mut self,
        rng: &mut R,
        pace: &C,
        sleep: Option<u64>,
        mut body: F,
    ) -> Result<bool>
    where
        R: Rng + ?Sized,
        C: Checkpoint + ?Sized,
        F: FnMut(&mut R, &mut Vec<T>, usize) -> Result<bool>,
    {
        for iteration in 1..=self.iterations {
            let Some(index) = self.next_index(rng) else {
                error!(operation = %self.name, iteration, "Ran out of candidates");
                return Ok(false);
            };
            info!(operation = %self.name, "Starting iteration {iteration}");
            match body(rng, &mut self.candidates, index) {
                Ok(true) => {}
                Ok(false) => {
                    error!(operation = %self.name, iteration, "Iteration failed");
                    return Ok(false);
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    error!(operation = %self.name, iteration, error = %e, "Iteration failed");
                    return Ok(false);
                }
            }
            info!(operation = %self.name, "Finished iteration {iteration}");
            pace.checkpoint(&self.name, sleep)?;
        }
        Ok(true)
    }
}

/// Pick an index into a list of `len` entries.
pub(crate) fn next_index<R: Rng + ?Sized>(random: bool, len: usize, rng: &mut R) -> Option<usize> {
    match len {
        0 => None,
        _ if random => Some(rng.gen_range(0..len)),
        _ => Some(len - 1),
    }
}

/// Resolve a count that has no candidate set, drawing random counts from `[1, cap]`.
pub(crate) fn uncapped_count<R: Rng + ?Sized>(count: Count, cap: u32, rng: &mut R) -> u32 {
    match count {
        Count::Fixed(n) => n,
        Count::Random => rng.gen_range(1..=cap),
    }
}
