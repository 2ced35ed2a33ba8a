//! Error types for the core library.

use thiserror::Error;

use crate::config::ValidationError;
use crate::store::StoreError;

/// Errors that can occur while loading or executing a sequence.
#[derive(Debug, Error)]
pub enum Error {
    /// A mail store call failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// XML deserialization error.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::DeError),

    /// JSON deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// One or more structural problems in a configuration document.
    #[error("Validation failed: {}", join_messages(.0))]
    Validation(Vec<ValidationError>),

    /// A folder reference did not resolve.
    #[error("Unable to retrieve folder {0}")]
    FolderNotFound(String),

    /// A task found nothing to act on.
    #[error("No candidates: {0}")]
    NoCandidates(String),

    /// Send or forward without any recipient.
    #[error("Recipient is not specified")]
    MissingRecipients,

    /// The address book query returned nobody to pick from.
    #[error("There is no user in the address book that matches the recipient criteria: {0}")]
    EmptyAddressPool(String),

    /// The configured provider is not part of this build.
    #[error("Provider not supported: {0}")]
    UnsupportedProvider(String),

    /// The stop file was detected at a checkpoint.
    #[error("Run cancelled by stop file")]
    Cancelled,
}

fn join_messages(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
