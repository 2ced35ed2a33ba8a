//! Sequence execution.
//!
//! [`SequenceExecutor`] walks the groups of a sequence, loads each group's
//! operation file, and runs its tasks in order against a [`MailStore`]:
//!
//! - every failure is contained at the task boundary and logged
//! - the stop file is polled at every checkpoint and ends the run cleanly
//! - folder subscriptions made by a group are dropped when the group ends

mod handlers;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{error, info, warn};

pub use handlers::{DEFAULT_BODY, DEFAULT_SUBJECT, compose_text, timestamp};

use crate::config::{self, OperationGroup, RANDOM_COUNT_CAP, SequenceConfig, TaskRef};
use crate::events::FolderEventRegistry;
use crate::operation::{Count, Operation, OperationKind, OperationSet};
use crate::pacing::{Checkpoint, Pacer};
use crate::selection::uncapped_count;
use crate::store::MailStore;
use crate::{Error, Result};

/// Name of the inbox monitor registered when a run starts.
pub const DEFAULT_INBOX_MONITOR: &str = "DefaultInboxMonitor";

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every group ran.
    Completed,
    /// The stop file ended the run early.
    Cancelled,
}

/// Checkpoint that logs pending folder events before pacing.
struct Pace<'a> {
    pacer: &'a Pacer,
    events: &'a FolderEventRegistry,
}

impl Checkpoint for Pace<'_> {
    fn checkpoint(&self, context: &str, sleep: Option<u64>) -> Result<()> {
        self.events.drain();
        self.pacer.checkpoint(context, sleep)
    }
}

/// Runs operation sequences against a mail store.
pub struct SequenceExecutor {
    store: Box<dyn MailStore>,
    pacer: Pacer,
    events: FolderEventRegistry,
    rng: StdRng,
    operations: OperationSet,
}

impl std::fmt::Debug for SequenceExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceExecutor")
            .field("store", &self.store.display_name())
            .field("pacer", &self.pacer)
            .field("events", &self.events)
            .field("operations", &self.operations.len())
            .finish_non_exhaustive()
    }
}

impl SequenceExecutor {
    /// Create an executor over `store`, watching `stop.txt` and seeded from entropy.
    #[must_use]
    pub fn new(store: Box<dyn MailStore>) -> Self {
        Self {
            store,
            pacer: Pacer::default(),
            events: FolderEventRegistry::new(),
            rng: StdRng::from_entropy(),
            operations: OperationSet::default(),
        }
    }

    /// Use a different pacer.
    #[must_use]
    pub fn with_pacer(mut self, pacer: Pacer) -> Self {
        self.pacer = pacer;
        self
    }

    /// Seed the random source for repeatable runs.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Replace the operation set tasks are resolved against.
    pub fn set_operations(&mut self, operations: OperationSet) {
        self.operations = operations;
    }

    /// Active folder subscriptions.
    #[must_use]
    pub const fn events(&self) -> &FolderEventRegistry {
        &self.events
    }

    /// Run every group of a sequence.
    ///
    /// A group whose operation file cannot be loaded is skipped. Folder
    /// subscriptions are dropped even when the run is cancelled.
    ///
    /// # Errors
    ///
    /// Task failures never surface here; only unexpected internal failures do.
    pub fn execute(&mut self, sequence: &SequenceConfig) -> Result<RunOutcome> {
        if sequence.disable_outlook_prompt {
            warn!("DisableOutlookPrompt is set but prompt suppression is not available, ignoring");
        }
        info!(
            store = %self.store.display_name(),
            groups = sequence.groups.len(),
            "Starting sequence"
        );

        let monitor = Operation::event_monitor(DEFAULT_INBOX_MONITOR, "olFolderInbox");
        let result = self
            .run_operation(&monitor)
            .and_then(|_| self.run_groups(&sequence.groups));

        match result {
            Ok(()) => {
                info!("Sequence completed");
                Ok(RunOutcome::Completed)
            }
            Err(Error::Cancelled) => {
                self.cleanup_after_iteration();
                info!("Sequence cancelled");
                Ok(RunOutcome::Cancelled)
            }
            Err(e) => {
                self.cleanup_after_iteration();
                Err(e)
            }
        }
    }

    fn run_groups(&mut self, groups: &[OperationGroup]) -> Result<()> {
        for group in groups {
            match config::load_operations(&group.operation_file) {
                Ok(operations) => self.operations = operations,
                Err(e) => {
                    error!(
                        group = %group.name,
                        file = %group.operation_file.display(),
                        error = %e,
                        "Skipping OperationGroup"
                    );
                    continue;
                }
            }

            for run in 1..=group.iterations {
                info!(group = %group.name, "Starting group run {run}");
                for task in &group.tasks {
                    self.process_task(task)?;
                }
                info!(group = %group.name, "Finished group run {run}");
                self.checkpoint(&group.name, group.sleep)?;
            }

            self.cleanup_after_iteration();
        }
        Ok(())
    }

    fn process_task(&mut self, task: &TaskRef) -> Result<()> {
        let runs = uncapped_count(task.iterations, RANDOM_COUNT_CAP, &mut self.rng);
        if task.iterations == Count::Random {
            info!(task = %task.name, "Randomly running the task {runs} times");
        }
        for run in 1..=runs {
            info!(task = %task.name, "Processing task run {run}");
            if self.execute_task(&task.name)? {
                info!(task = %task.name, "Finished processing task run {run}");
            } else {
                error!(task = %task.name, "Failed processing task");
            }
            self.checkpoint(&task.name, task.sleep)?;
        }
        Ok(())
    }

    /// Run the operation named `name` from the loaded operation set.
    ///
    /// Returns `Ok(false)` if no operation or more than one carries the name,
    /// or if the operation fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if the stop file is found mid-task.
    pub fn execute_task(&mut self, name: &str) -> Result<bool> {
        let operation = match self.operations.find(name).as_slice() {
            [operation] => (*operation).clone(),
            [] => {
                error!(task = name, "Unable to find matching task, skipping task");
                return Ok(false);
            }
            matches => {
                error!(
                    task = name,
                    matches = matches.len(),
                    "More than one operation has this name, skipping task"
                );
                return Ok(false);
            }
        };
        self.run_operation(&operation)
    }

    /// Run one operation, containing any failure other than cancellation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if the stop file is found mid-operation.
    pub fn run_operation(&mut self, operation: &Operation) -> Result<bool> {
        let name = operation.name();
        let common = &operation.common;
        info!(
            operation = name,
            kind = operation.kind.label(),
            count = %common.count,
            "Starting operation"
        );

        let result = match &operation.kind {
            OperationKind::MailSend(op) => self.mail_send(common, op),
            OperationKind::MailDelete(op) => self.mail_delete(common, op),
            OperationKind::MailReply(op) => self.mail_reply(common, op),
            OperationKind::MailForward(op) => self.mail_forward(common, op),
            OperationKind::MailMove(op) => self.mail_move(common, op),
            OperationKind::FolderCreate(op) => self.folder_create(common, op),
            OperationKind::FolderDelete(op) => self.folder_delete(common, op),
            OperationKind::EventMonitor(op) => self.event_monitor(common, op),
        };

        match result {
            Ok(ok) => Ok(ok),
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(e) => {
                error!(operation = name, error = %e, "Operation failed");
                Ok(false)
            }
        }
    }

    /// Drop every folder subscription.
    pub fn cleanup_after_iteration(&mut self) {
        self.events.drain();
        self.events.unregister_all();
    }

    fn checkpoint(&self, context: &str, sleep: Option<u64>) -> Result<()> {
        Pace {
            pacer: &self.pacer,
            events: &self.events,
        }
        .checkpoint(context, sleep)
    }
}
