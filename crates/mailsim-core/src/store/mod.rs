//! Mailbox capability abstraction.
//!
//! The engine only ever talks to a mailbox through these traits. Each backend
//! (desktop object model, REST, SDK, in-memory) provides one implementation;
//! nothing in the executor depends on a concrete provider.

pub mod memory;

use std::path::Path;

pub use memory::MemoryStore;

/// Errors raised by mail store providers.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Connecting to the mailbox failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The referenced object no longer exists.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The provider rejected or failed the operation.
    #[error("Operation failed: {0}")]
    Operation(String),

    /// The provider does not implement this capability.
    #[error("Not supported by provider: {0}")]
    Unsupported(&'static str),
}

/// Result type for provider calls.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Mailbox folders addressable by symbolic name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WellKnownFolder {
    /// Inbox.
    Inbox,
    /// Deleted items.
    DeletedItems,
    /// Drafts.
    Drafts,
    /// Junk mail.
    Junk,
    /// Outbox.
    Outbox,
    /// Sent mail.
    SentMail,
}

impl WellKnownFolder {
    /// All well-known folders.
    pub const ALL: [Self; 6] = [
        Self::Inbox,
        Self::DeletedItems,
        Self::Drafts,
        Self::Junk,
        Self::Outbox,
        Self::SentMail,
    ];

    /// Parse a symbolic identifier such as `olFolderInbox`.
    ///
    /// Matching is case-insensitive. Returns `None` for anything else.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.identifier().eq_ignore_ascii_case(s.trim()))
    }

    /// Symbolic identifier used in operation files.
    #[must_use]
    pub const fn identifier(&self) -> &'static str {
        match self {
            Self::Inbox => "olFolderInbox",
            Self::DeletedItems => "olFolderDeletedItems",
            Self::Drafts => "olFolderDrafts",
            Self::Junk => "olFolderJunk",
            Self::Outbox => "olFolderOutbox",
            Self::SentMail => "olFolderSentMail",
        }
    }

    /// Display name of the folder in the mailbox.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Inbox => "Inbox",
            Self::DeletedItems => "Deleted Items",
            Self::Drafts => "Drafts",
            Self::Junk => "Junk Email",
            Self::Outbox => "Outbox",
            Self::SentMail => "Sent Items",
        }
    }
}

/// Notification pushed by a provider when an item lands in a monitored folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemArrival {
    /// A mail item arrived.
    Mail {
        /// Path of the monitored folder.
        folder: String,
        /// Sender display name.
        sender: String,
        /// Subject line.
        subject: String,
    },
    /// Something other than a mail item arrived (meeting request, report, ...).
    Other {
        /// Path of the monitored folder.
        folder: String,
        /// Provider-specific item kind.
        kind: String,
    },
}

/// Sink a provider pushes [`ItemArrival`] notifications into.
///
/// Providers may invoke it from their own event thread.
pub type ItemAddSink = crossbeam_channel::Sender<ItemArrival>;

/// A mailbox.
pub trait MailStore {
    /// Display name of the mailbox.
    fn display_name(&self) -> String;

    /// Top-level folder of the mailbox.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot reach the mailbox.
    fn root_folder(&self) -> StoreResult<Box<dyn MailFolder>>;

    /// Look up a well-known folder by its symbolic identifier.
    ///
    /// Returns `Ok(None)` when the identifier is not a supported well-known folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot reach the mailbox.
    fn default_folder(&self, name: &str) -> StoreResult<Option<Box<dyn MailFolder>>>;

    /// Create an unsent mail item owned by this mailbox.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot create the item.
    fn new_mail_item(&self) -> StoreResult<Box<dyn MailItem>>;

    /// Global address list, if the mailbox has one.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot reach the directory.
    fn global_address_list(&self) -> StoreResult<Option<Box<dyn AddressBook>>>;
}

/// A folder inside a mailbox.
pub trait MailFolder {
    /// Display name.
    fn name(&self) -> String;

    /// Full path, unique within the mailbox.
    fn folder_path(&self) -> String;

    /// Number of mail items in the folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be read.
    fn mail_items_count(&self) -> StoreResult<usize>;

    /// Number of immediate subfolders.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be read.
    fn sub_folders_count(&self) -> StoreResult<usize>;

    /// Immediate subfolders.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be read.
    fn sub_folders(&self) -> StoreResult<Vec<Box<dyn MailFolder>>>;

    /// Mail items whose subject contains `subject_filter` (case-insensitive),
    /// at most `max_count` of them. An empty filter matches everything.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be read.
    fn mail_items(&self, subject_filter: &str, max_count: usize)
    -> StoreResult<Vec<Box<dyn MailItem>>>;

    /// Create a subfolder.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider refuses the folder.
    fn add_sub_folder(&self, name: &str) -> StoreResult<Box<dyn MailFolder>>;

    /// Delete this folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be deleted.
    fn delete(&self) -> StoreResult<()>;

    /// Start pushing item-arrival notifications for this folder into `sink`.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot subscribe.
    fn register_item_add_handler(&self, sink: ItemAddSink) -> StoreResult<()>;

    /// Stop notifications previously started with
    /// [`register_item_add_handler`](Self::register_item_add_handler).
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot unsubscribe.
    fn unregister_item_add_handler(&self) -> StoreResult<()>;
}

/// A mail message, either stored in a folder or being composed.
pub trait MailItem {
    /// Subject line.
    fn subject(&self) -> String;

    /// Replace the subject line.
    fn set_subject(&mut self, subject: &str);

    /// Message body.
    fn body(&self) -> String;

    /// Replace the message body.
    fn set_body(&mut self, body: &str);

    /// Sender display name.
    fn sender_name(&self) -> String;

    /// Add a recipient address.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider rejects the address.
    fn add_recipient(&mut self, address: &str) -> StoreResult<()>;

    /// Attach a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be attached.
    fn add_attachment(&mut self, path: &Path) -> StoreResult<()>;

    /// Attach another message.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be attached.
    fn attach_item(&mut self, item: &dyn MailItem) -> StoreResult<()>;

    /// Send the message.
    ///
    /// # Errors
    ///
    /// Returns an error if submission fails.
    fn send(&mut self) -> StoreResult<()>;

    /// Delete the message.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be deleted.
    fn delete(&self) -> StoreResult<()>;

    /// Move the message into `destination`.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be moved.
    fn move_to(&self, destination: &dyn MailFolder) -> StoreResult<()>;

    /// Create a reply addressed to the sender, or to everyone when `reply_all`.
    ///
    /// # Errors
    ///
    /// Returns an error if the reply cannot be created.
    fn reply(&self, reply_all: bool) -> StoreResult<Box<dyn MailItem>>;

    /// Create a forward of this message.
    ///
    /// # Errors
    ///
    /// Returns an error if the forward cannot be created.
    fn forward(&self) -> StoreResult<Box<dyn MailItem>>;

    /// Whether every recipient resolves.
    fn validate_recipients(&self) -> bool;
}

/// Address book of a mailbox.
pub trait AddressBook {
    /// SMTP addresses of users whose name contains `filter` (all users when `None`),
    /// at most `max_count` of them.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be queried.
    fn users(&self, filter: Option<&str>, max_count: usize) -> StoreResult<Vec<String>>;

    /// SMTP addresses of the members of a distribution list, at most `max_count`.
    /// Nested lists are not expanded. An unknown list yields an empty vector.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be queried.
    fn dl_members(&self, list_name: &str, max_count: usize) -> StoreResult<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_known_roundtrip() {
        for folder in WellKnownFolder::ALL {
            assert_eq!(WellKnownFolder::parse(folder.identifier()), Some(folder));
        }
    }

    #[test]
    fn test_well_known_case_insensitive() {
        assert_eq!(
            WellKnownFolder::parse("OLFOLDERINBOX"),
            Some(WellKnownFolder::Inbox)
        );
        assert_eq!(WellKnownFolder::parse("Inbox"), None);
        assert_eq!(WellKnownFolder::parse(""), None);
    }
}
