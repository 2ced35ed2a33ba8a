//! Folder new-item subscriptions.
//!
//! Providers push [`ItemArrival`] notifications into a channel, possibly from
//! their own event thread; the executor drains and logs them between
//! iterations.

use crossbeam_channel::{Receiver, Sender};
use tracing::{error, info, warn};

use crate::Result;
use crate::store::{ItemArrival, MailFolder};

struct Registration {
    operation: String,
    path: String,
    folder: Box<dyn MailFolder>,
}

/// Active folder subscriptions, at most one per folder.
pub struct FolderEventRegistry {
    registrations: Vec<Registration>,
    sender: Sender<ItemArrival>,
    receiver: Receiver<ItemArrival>,
}

impl Default for FolderEventRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FolderEventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FolderEventRegistry")
            .field("folders", &self.folders())
            .field("pending", &self.receiver.len())
            .finish()
    }
}

impl FolderEventRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            registrations: Vec::new(),
            sender,
            receiver,
        }
    }

    /// Number of active registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Paths of the registered folders, in registration order.
    #[must_use]
    pub fn folders(&self) -> Vec<String> {
        self.registrations.iter().map(|r| r.path.clone()).collect()
    }

    /// Whether a folder path is registered.
    #[must_use]
    pub fn is_registered(&self, path: &str) -> bool {
        self.registrations.iter().any(|r| r.path == path)
    }

    /// Subscribe to new items in `folder`.
    ///
    /// Returns `Ok(false)` without subscribing again if the folder is already
    /// registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider refuses the subscription.
    pub fn register(&mut self, operation: &str, folder: Box<dyn MailFolder>) -> Result<bool> {
        let path = folder.folder_path();
        if let Some(existing) = self.registrations.iter().find(|r| r.path == path) {
            warn!(
                operation,
                folder = %path,
                registered_by = %existing.operation,
                "Folder is already being monitored"
            );
            return Ok(false);
        }
        folder.register_item_add_handler(self.sender.clone())?;
        info!(operation, folder = %path, "Monitoring folder for new items");
        self.registrations.push(Registration {
            operation: operation.to_string(),
            path,
            folder,
        });
        Ok(true)
    }

    /// Drop every subscription. Failures are logged and do not stop the sweep.
    pub fn unregister_all(&mut self) {
        for registration in self.registrations.drain(..) {
            match registration.folder.unregister_item_add_handler() {
                Ok(()) => info!(
                    operation = %registration.operation,
                    folder = %registration.path,
                    "Stopped monitoring folder"
                ),
                Err(e) => error!(
                    operation = %registration.operation,
                    folder = %registration.path,
                    error = %e,
                    "Failed to stop monitoring folder"
                ),
            }
        }
    }

    /// Log every pending notification, returning how many there were.
    pub fn drain(&self) -> usize {
        let mut count = 0;
        for arrival in self.receiver.try_iter() {
            count += 1;
            match arrival {
                ItemArrival::Mail {
                    folder,
                    sender,
                    subject,
                } => info!(folder = %folder, "New item from {sender} with subject \"{subject}\""),
                ItemArrival::Other { folder, kind } => {
                    info!(folder = %folder, kind = %kind, "Event received with unknown item type");
                }
            }
        }
        count
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::{MailStore, MemoryStore};

    fn inbox(store: &MemoryStore) -> Box<dyn MailFolder> {
        store.default_folder("olFolderInbox").unwrap().unwrap()
    }

    #[test]
    fn test_register_is_idempotent() {
        let store = MemoryStore::new("Load User", "load@contoso.com");
        let mut registry = FolderEventRegistry::new();
        assert!(registry.register("Watch", inbox(&store)).unwrap());
        assert!(!registry.register("WatchAgain", inbox(&store)).unwrap());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.folders(), vec!["Inbox".to_string()]);
        assert_eq!(store.monitored_folders(), vec!["Inbox".to_string()]);
    }

    #[test]
    fn test_arrivals_are_drained() {
        let store = MemoryStore::new("Load User", "load@contoso.com");
        let mut registry = FolderEventRegistry::new();
        registry.register("Watch", inbox(&store)).unwrap();
        store.add_mail("Inbox", "First", "", "Alice").unwrap();
        store.add_mail("Inbox", "Second", "", "Bob").unwrap();
        store.add_mail("Drafts", "Ignored", "", "Carol").unwrap();
        assert_eq!(registry.drain(), 2);
        assert_eq!(registry.drain(), 0);
    }

    #[test]
    fn test_non_mail_arrivals_are_drained() {
        let store = MemoryStore::new("Load User", "load@contoso.com");
        let mut registry = FolderEventRegistry::new();
        registry.register("Watch", inbox(&store)).unwrap();
        store.deliver_other("Inbox", "MeetingRequest").unwrap();
        store.deliver_other("Drafts", "MeetingRequest").unwrap();
        store.add_mail("Inbox", "After", "", "Alice").unwrap();
        assert_eq!(registry.drain(), 2);

        let (tx, rx) = crossbeam_channel::unbounded();
        inbox(&store).register_item_add_handler(tx).unwrap();
        store.deliver_other("Inbox", "TaskRequest").unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            ItemArrival::Other {
                folder: "Inbox".to_string(),
                kind: "TaskRequest".to_string(),
            }
        );
    }

    #[test]
    fn test_unregister_all_clears_provider_handlers() {
        let store = MemoryStore::new("Load User", "load@contoso.com");
        let mut registry = FolderEventRegistry::new();
        registry.register("Watch", inbox(&store)).unwrap();
        let sent = store.default_folder("olFolderSentMail").unwrap().unwrap();
        registry.register("Sent", sent).unwrap();
        registry.unregister_all();
        assert!(registry.is_empty());
        assert!(store.monitored_folders().is_empty());
        store.add_mail("Inbox", "Late", "", "Alice").unwrap();
        assert_eq!(registry.drain(), 0);
    }
}
