//! # mailsim-core
//!
//! Operation execution engine for `MailSim` mailbox load simulation.
//!
//! This crate provides:
//! - Mail store capability traits and an in-memory store
//! - Typed operation model with XML loading and validation
//! - Random and ordered selection over shrinking candidate sets
//! - Recipient and attachment resolution
//! - Sequence execution with stop-file cancellation and pacing
//! - Folder new-item monitoring

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
mod error;
pub mod events;
pub mod executor;
pub mod operation;
pub mod pacing;
pub mod resolver;
pub mod selection;
pub mod store;

pub use config::{
    OperationGroup, ProviderKind, SequenceConfig, TaskRef, ValidationError, load_operations,
    load_sequence,
};
pub use error::{Error, Result};
pub use events::FolderEventRegistry;
pub use executor::{DEFAULT_INBOX_MONITOR, RunOutcome, SequenceExecutor, compose_text};
pub use operation::{Count, Operation, OperationKind, OperationSet};
pub use pacing::{Checkpoint, DEFAULT_STOP_FILE, Pacer};
pub use resolver::{resolve_attachments, resolve_recipients};
pub use selection::ParsedOperation;
pub use store::{
    AddressBook, ItemAddSink, ItemArrival, MailFolder, MailItem, MailStore, MemoryStore,
    StoreError, StoreResult, WellKnownFolder,
};
