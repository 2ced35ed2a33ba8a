//! Operation model types.

use std::path::PathBuf;

/// Candidate mails fetched per task when the operation file does not say.
pub const DEFAULT_MAIL_COUNT_FOR_RANDOMIZATION: usize = 1000;

/// Address book entries fetched for random recipients when the operation file does not say.
pub const DEFAULT_USER_COUNT_FOR_RANDOMIZATION: usize = 1000;

/// How many times an operation acts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Count {
    /// Exactly this many times (clamped to the candidate set where one exists).
    Fixed(u32),
    /// A random number of times, chosen per invocation.
    Random,
}

impl Default for Count {
    fn default() -> Self {
        Self::Fixed(1)
    }
}

impl Count {
    /// Parse a `Count` attribute.
    ///
    /// Absent or blank means one, `0` means random. Returns `None` for
    /// anything that is not a non-negative integer.
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Some(Self::default());
        };
        match raw.parse::<u32>().ok()? {
            0 => Some(Self::Random),
            n => Some(Self::Fixed(n)),
        }
    }

    /// Whether the count is chosen at random.
    #[must_use]
    pub const fn is_random(&self) -> bool {
        matches!(self, Self::Random)
    }
}

impl std::fmt::Display for Count {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fixed(n) => write!(f, "{n}"),
            Self::Random => write!(f, "random"),
        }
    }
}

/// Fields every operation has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationCommon {
    /// Unique name, referenced by sequence tasks.
    pub name: String,
    /// Iteration count.
    pub count: Count,
    /// Seconds to sleep after each iteration.
    pub sleep: Option<u64>,
}

impl OperationCommon {
    /// Common fields with a count of one and no sleep.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            count: Count::default(),
            sleep: None,
        }
    }
}

/// Recipients drawn at random from the address book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomRecipients {
    /// Number of recipients; zero picks a random number.
    pub count: u32,
    /// Draw from this distribution list instead of the whole address book.
    pub distribution_list: Option<String>,
    /// Upper bound on address book entries fetched before drawing.
    pub user_count_for_randomization: usize,
}

/// Who a message goes to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RecipientSpec {
    /// Nothing configured.
    #[default]
    None,
    /// Exactly these addresses, in order.
    Explicit(Vec<String>),
    /// Random address book entries.
    Random(RandomRecipients),
}

/// Files drawn at random from a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomAttachments {
    /// Number of files; zero picks a random number, possibly none.
    pub count: u32,
    /// Directory to draw from.
    pub directory: PathBuf,
}

/// What gets attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AttachmentSpec {
    /// No attachments.
    #[default]
    None,
    /// Exactly these files.
    Explicit(Vec<PathBuf>),
    /// Random files from a directory.
    Random(RandomAttachments),
}

/// Send new mail.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MailSendOp {
    /// Subject template.
    pub subject: Option<String>,
    /// Body template.
    pub body: Option<String>,
    /// Recipients.
    pub recipients: RecipientSpec,
    /// Attachments.
    pub attachments: AttachmentSpec,
}

/// Delete mail from a folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailDeleteOp {
    /// Well-known folder to delete from.
    pub folder: String,
    /// Subject substring filter; empty matches all.
    pub subject: String,
    /// Upper bound on candidate mails fetched.
    pub mail_count_for_randomization: usize,
}

/// Reply to mail in a folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailReplyOp {
    /// Well-known folder holding the mails to reply to.
    pub folder: String,
    /// Subject substring filter; empty matches all.
    pub subject: String,
    /// Reply to all recipients instead of only the sender.
    pub reply_all: bool,
    /// Body template prefixed to the quoted original.
    pub body: Option<String>,
    /// Attachments.
    pub attachments: AttachmentSpec,
    /// Upper bound on candidate mails fetched.
    pub mail_count_for_randomization: usize,
}

/// Forward mail from a folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailForwardOp {
    /// Well-known folder holding the mails to forward.
    pub folder: String,
    /// Subject substring filter; empty matches all.
    pub subject: String,
    /// Body template prefixed to the forwarded original.
    pub body: Option<String>,
    /// Recipients.
    pub recipients: RecipientSpec,
    /// Attachments.
    pub attachments: AttachmentSpec,
    /// Upper bound on candidate mails fetched.
    pub mail_count_for_randomization: usize,
}

/// Move mail between folders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMoveOp {
    /// Well-known source folder.
    pub source_folder: String,
    /// Well-known destination folder.
    pub destination_folder: String,
    /// Subject substring filter; empty matches all.
    pub subject: String,
    /// Upper bound on candidate mails fetched.
    pub mail_count_for_randomization: usize,
}

/// Create subfolders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderCreateOp {
    /// Well-known parent folder.
    pub folder_path: String,
    /// Name template of the new folders.
    pub folder_name: String,
}

/// Delete subfolders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderDeleteOp {
    /// Well-known parent folder.
    pub folder_path: String,
    /// Name substring filter; empty matches all subfolders.
    pub folder_name: String,
}

/// Watch a folder for new items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMonitorOp {
    /// Well-known folder to watch.
    pub folder: String,
}

/// Kind-specific part of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationKind {
    /// Send new mail.
    MailSend(MailSendOp),
    /// Delete mail.
    MailDelete(MailDeleteOp),
    /// Reply to mail.
    MailReply(MailReplyOp),
    /// Forward mail.
    MailForward(MailForwardOp),
    /// Move mail.
    MailMove(MailMoveOp),
    /// Create folders.
    FolderCreate(FolderCreateOp),
    /// Delete folders.
    FolderDelete(FolderDeleteOp),
    /// Monitor a folder.
    EventMonitor(EventMonitorOp),
}

impl OperationKind {
    /// Element name of this kind in operation files.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::MailSend(_) => "MailSend",
            Self::MailDelete(_) => "MailDelete",
            Self::MailReply(_) => "MailReply",
            Self::MailForward(_) => "MailForward",
            Self::MailMove(_) => "MailMove",
            Self::FolderCreate(_) => "FolderCreate",
            Self::FolderDelete(_) => "FolderDelete",
            Self::EventMonitor(_) => "EventMonitor",
        }
    }
}

/// One configured operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    /// Name, count and sleep.
    pub common: OperationCommon,
    /// What the operation does.
    pub kind: OperationKind,
}

impl Operation {
    /// Build an operation.
    #[must_use]
    pub const fn new(common: OperationCommon, kind: OperationKind) -> Self {
        Self { common, kind }
    }

    /// Event monitor on a well-known folder.
    #[must_use]
    pub fn event_monitor(name: impl Into<String>, folder: impl Into<String>) -> Self {
        Self::new(
            OperationCommon::named(name),
            OperationKind::EventMonitor(EventMonitorOp {
                folder: folder.into(),
            }),
        )
    }

    /// Operation name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.common.name
    }
}

/// All operations loaded from one operation file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationSet {
    operations: Vec<Operation>,
}

impl OperationSet {
    /// Wrap a list of operations. Duplicate names are kept.
    #[must_use]
    pub const fn new(operations: Vec<Operation>) -> Self {
        Self { operations }
    }

    /// Every operation whose name matches `name`, ignoring case.
    #[must_use]
    pub fn find(&self, name: &str) -> Vec<&Operation> {
        self.operations
            .iter()
            .filter(|op| op.common.name.eq_ignore_ascii_case(name))
            .collect()
    }

    /// Number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Iterate over the operations in file order.
    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.operations.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_parse() {
        assert_eq!(Count::parse(None), Some(Count::Fixed(1)));
        assert_eq!(Count::parse(Some("")), Some(Count::Fixed(1)));
        assert_eq!(Count::parse(Some("  ")), Some(Count::Fixed(1)));
        assert_eq!(Count::parse(Some("0")), Some(Count::Random));
        assert_eq!(Count::parse(Some(" 7 ")), Some(Count::Fixed(7)));
        assert_eq!(Count::parse(Some("-1")), None);
        assert_eq!(Count::parse(Some("many")), None);
    }

    #[test]
    fn test_find_is_case_insensitive() {
        let set = OperationSet::new(vec![
            Operation::event_monitor("WatchInbox", "olFolderInbox"),
            Operation::event_monitor("watchinbox", "olFolderSentMail"),
            Operation::event_monitor("Other", "olFolderInbox"),
        ]);
        assert_eq!(set.find("WATCHINBOX").len(), 2);
        assert_eq!(set.find("other").len(), 1);
        assert!(set.find("missing").is_empty());
    }

    #[test]
    fn test_kind_label() {
        let op = Operation::event_monitor("m", "olFolderInbox");
        assert_eq!(op.kind.label(), "EventMonitor");
        assert_eq!(op.name(), "m");
    }
}
