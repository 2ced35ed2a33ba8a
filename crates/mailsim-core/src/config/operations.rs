//! Operation file loading.
//!
//! ```xml
//! <MailSimOperations>
//!   <MailSend OperationName="SendHello" Count="2">
//!     <Subject>Hello</Subject>
//!     <Recipients>alice@contoso.com</Recipients>
//!     <RandomAttachments Count="0">C:\attachments</RandomAttachments>
//!   </MailSend>
//!   <MailDelete OperationName="CleanInbox" Count="0" Folder="olFolderInbox" Subject="" />
//! </MailSimOperations>
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use super::validation::{ValidationError, Validator};
use crate::operation::{
    AttachmentSpec, Count, DEFAULT_MAIL_COUNT_FOR_RANDOMIZATION,
    DEFAULT_USER_COUNT_FOR_RANDOMIZATION, EventMonitorOp, FolderCreateOp, FolderDeleteOp,
    MailDeleteOp, MailForwardOp, MailMoveOp, MailReplyOp, MailSendOp, Operation, OperationCommon,
    OperationKind, OperationSet, RandomAttachments, RandomRecipients, RecipientSpec,
};

#[derive(Debug, Deserialize)]
#[serde(rename = "MailSimOperations")]
struct OperationsXml {
    #[serde(rename = "$value", default)]
    items: Vec<OperationXml>,
}

#[derive(Debug, Deserialize)]
enum OperationXml {
    MailSend(MailSendXml),
    MailDelete(MailDeleteXml),
    MailReply(MailReplyXml),
    MailForward(MailForwardXml),
    MailMove(MailMoveXml),
    FolderCreate(FolderCreateXml),
    FolderDelete(FolderDeleteXml),
    EventMonitor(EventMonitorXml),
}

#[derive(Debug, Deserialize)]
struct RandomRecipientsXml {
    #[serde(rename = "@DistributionList")]
    distribution_list: Option<String>,
    #[serde(rename = "@UserCountForRandomization")]
    user_count_for_randomization: Option<String>,
    #[serde(rename = "$text")]
    count: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RandomAttachmentsXml {
    #[serde(rename = "@Count")]
    count: Option<String>,
    #[serde(rename = "$text")]
    directory: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MailSendXml {
    #[serde(rename = "@OperationName")]
    operation_name: Option<String>,
    #[serde(rename = "@Count")]
    count: Option<String>,
    #[serde(rename = "@Sleep")]
    sleep: Option<String>,
    #[serde(rename = "Subject")]
    subject: Option<String>,
    #[serde(rename = "Body")]
    body: Option<String>,
    #[serde(rename = "Recipients", default)]
    recipients: Vec<String>,
    #[serde(rename = "RandomRecipients", default)]
    random_recipients: Vec<RandomRecipientsXml>,
    #[serde(rename = "Attachments", default)]
    attachments: Vec<String>,
    #[serde(rename = "RandomAttachments", default)]
    random_attachments: Vec<RandomAttachmentsXml>,
}

#[derive(Debug, Deserialize)]
struct MailDeleteXml {
    #[serde(rename = "@OperationName")]
    operation_name: Option<String>,
    #[serde(rename = "@Count")]
    count: Option<String>,
    #[serde(rename = "@Sleep")]
    sleep: Option<String>,
    #[serde(rename = "@Folder")]
    folder: Option<String>,
    #[serde(rename = "@Subject")]
    subject: Option<String>,
    #[serde(rename = "@MailCountForRandomization")]
    mail_count_for_randomization: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MailReplyXml {
    #[serde(rename = "@OperationName")]
    operation_name: Option<String>,
    #[serde(rename = "@Count")]
    count: Option<String>,
    #[serde(rename = "@Sleep")]
    sleep: Option<String>,
    #[serde(rename = "@Folder")]
    folder: Option<String>,
    #[serde(rename = "@MailSubjectToReply")]
    subject: Option<String>,
    #[serde(rename = "@ReplyAll")]
    reply_all: Option<String>,
    #[serde(rename = "@MailCountForRandomization")]
    mail_count_for_randomization: Option<String>,
    #[serde(rename = "ReplyBody")]
    body: Option<String>,
    #[serde(rename = "Attachments", default)]
    attachments: Vec<String>,
    #[serde(rename = "RandomAttachments", default)]
    random_attachments: Vec<RandomAttachmentsXml>,
}

#[derive(Debug, Deserialize)]
struct MailForwardXml {
    #[serde(rename = "@OperationName")]
    operation_name: Option<String>,
    #[serde(rename = "@Count")]
    count: Option<String>,
    #[serde(rename = "@Sleep")]
    sleep: Option<String>,
    #[serde(rename = "@Folder")]
    folder: Option<String>,
    #[serde(rename = "@MailSubjectToForward")]
    subject: Option<String>,
    #[serde(rename = "@MailCountForRandomization")]
    mail_count_for_randomization: Option<String>,
    #[serde(rename = "ForwardBody")]
    body: Option<String>,
    #[serde(rename = "Recipients", default)]
    recipients: Vec<String>,
    #[serde(rename = "RandomRecipients", default)]
    random_recipients: Vec<RandomRecipientsXml>,
    #[serde(rename = "Attachments", default)]
    attachments: Vec<String>,
    #[serde(rename = "RandomAttachments", default)]
    random_attachments: Vec<RandomAttachmentsXml>,
}

#[derive(Debug, Deserialize)]
struct MailMoveXml {
    #[serde(rename = "@OperationName")]
    operation_name: Option<String>,
    #[serde(rename = "@Count")]
    count: Option<String>,
    #[serde(rename = "@Sleep")]
    sleep: Option<String>,
    #[serde(rename = "@SourceFolder")]
    source_folder: Option<String>,
    #[serde(rename = "@DestinationFolder")]
    destination_folder: Option<String>,
    #[serde(rename = "@Subject")]
    subject: Option<String>,
    #[serde(rename = "@MailCountForRandomization")]
    mail_count_for_randomization: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FolderCreateXml {
    #[serde(rename = "@OperationName")]
    operation_name: Option<String>,
    #[serde(rename = "@Count")]
    count: Option<String>,
    #[serde(rename = "@Sleep")]
    sleep: Option<String>,
    #[serde(rename = "@FolderPath")]
    folder_path: Option<String>,
    #[serde(rename = "@FolderName")]
    folder_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FolderDeleteXml {
    #[serde(rename = "@OperationName")]
    operation_name: Option<String>,
    #[serde(rename = "@Count")]
    count: Option<String>,
    #[serde(rename = "@Sleep")]
    sleep: Option<String>,
    #[serde(rename = "@FolderPath")]
    folder_path: Option<String>,
    #[serde(rename = "@FolderName")]
    folder_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventMonitorXml {
    #[serde(rename = "@OperationName")]
    operation_name: Option<String>,
    #[serde(rename = "@Count")]
    count: Option<String>,
    #[serde(rename = "@Sleep")]
    sleep: Option<String>,
    #[serde(rename = "@Folder")]
    folder: Option<String>,
}

/// Load and validate an operation file.
///
/// Relative attachment paths and directories are resolved against the
/// directory holding the operation file.
///
/// # Errors
///
/// Returns an error if the file is missing, is not an `.xml` file, does not
/// parse, or fails structural validation.
pub fn load_operations(path: &Path) -> crate::Result<OperationSet> {
    super::ensure_xml_file(path, "operation")?;
    let content = std::fs::read_to_string(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
    let set = parse_operations(&content, base_dir)?;
    debug!(file = %path.display(), operations = set.len(), "Loaded operation file");
    Ok(set)
}

/// Parse and validate operation XML.
///
/// # Errors
///
/// Returns an error if the XML does not parse or fails structural validation.
pub fn parse_operations(xml: &str, base_dir: &Path) -> crate::Result<OperationSet> {
    let raw: OperationsXml = quick_xml::de::from_str(xml)?;
    let mut v = Validator::default();
    let operations = raw
        .items
        .into_iter()
        .filter_map(|item| convert(&mut v, item))
        .map(|mut operation| {
            rebase_attachments(&mut operation.kind, base_dir);
            operation
        })
        .collect();
    v.finish(OperationSet::new(operations))
}

fn rebase_attachments(kind: &mut OperationKind, base_dir: &Path) {
    let spec = match kind {
        OperationKind::MailSend(op) => &mut op.attachments,
        OperationKind::MailReply(op) => &mut op.attachments,
        OperationKind::MailForward(op) => &mut op.attachments,
        _ => return,
    };
    match spec {
        AttachmentSpec::Explicit(paths) => {
            for path in paths {
                *path = base_dir.join(&*path);
            }
        }
        AttachmentSpec::Random(random) => random.directory = base_dir.join(&random.directory),
        AttachmentSpec::None => {}
    }
}

fn convert(v: &mut Validator, item: OperationXml) -> Option<Operation> {
    match item {
        OperationXml::MailSend(x) => {
            let common = common(v, "MailSend", x.operation_name, x.count, x.sleep)?;
            let recipients = recipients(v, &common.name, x.recipients, x.random_recipients);
            let attachments = attachments(v, &common.name, x.attachments, x.random_attachments);
            Some(Operation::new(
                common,
                OperationKind::MailSend(MailSendOp {
                    subject: x.subject,
                    body: x.body,
                    recipients,
                    attachments,
                }),
            ))
        }
        OperationXml::MailDelete(x) => {
            let common = common(v, "MailDelete", x.operation_name, x.count, x.sleep)?;
            let folder = v.required(&common.name, "Folder", x.folder.as_deref());
            let limit = mail_limit(v, &common.name, x.mail_count_for_randomization.as_deref());
            Some(Operation::new(
                common,
                OperationKind::MailDelete(MailDeleteOp {
                    folder,
                    subject: x.subject.unwrap_or_default(),
                    mail_count_for_randomization: limit,
                }),
            ))
        }
        OperationXml::MailReply(x) => {
            let common = common(v, "MailReply", x.operation_name, x.count, x.sleep)?;
            let folder = v.required(&common.name, "Folder", x.folder.as_deref());
            let reply_all = v.flag(&common.name, "ReplyAll", x.reply_all.as_deref());
            let limit = mail_limit(v, &common.name, x.mail_count_for_randomization.as_deref());
            let attachments = attachments(v, &common.name, x.attachments, x.random_attachments);
            Some(Operation::new(
                common,
                OperationKind::MailReply(MailReplyOp {
                    folder,
                    subject: x.subject.unwrap_or_default(),
                    reply_all,
                    body: x.body,
                    attachments,
                    mail_count_for_randomization: limit,
                }),
            ))
        }
        OperationXml::MailForward(x) => {
            let common = common(v, "MailForward", x.operation_name, x.count, x.sleep)?;
            let folder = v.required(&common.name, "Folder", x.folder.as_deref());
            let limit = mail_limit(v, &common.name, x.mail_count_for_randomization.as_deref());
            let recipients = recipients(v, &common.name, x.recipients, x.random_recipients);
            let attachments = attachments(v, &common.name, x.attachments, x.random_attachments);
            Some(Operation::new(
                common,
                OperationKind::MailForward(MailForwardOp {
                    folder,
                    subject: x.subject.unwrap_or_default(),
                    body: x.body,
                    recipients,
                    attachments,
                    mail_count_for_randomization: limit,
                }),
            ))
        }
        OperationXml::MailMove(x) => {
            let common = common(v, "MailMove", x.operation_name, x.count, x.sleep)?;
            let source_folder =
                v.required(&common.name, "SourceFolder", x.source_folder.as_deref());
            let destination_folder = v.required(
                &common.name,
                "DestinationFolder",
                x.destination_folder.as_deref(),
            );
            let limit = mail_limit(v, &common.name, x.mail_count_for_randomization.as_deref());
            Some(Operation::new(
                common,
                OperationKind::MailMove(MailMoveOp {
                    source_folder,
                    destination_folder,
                    subject: x.subject.unwrap_or_default(),
                    mail_count_for_randomization: limit,
                }),
            ))
        }
        OperationXml::FolderCreate(x) => {
            let common = common(v, "FolderCreate", x.operation_name, x.count, x.sleep)?;
            let folder_path = v.required(&common.name, "FolderPath", x.folder_path.as_deref());
            Some(Operation::new(
                common,
                OperationKind::FolderCreate(FolderCreateOp {
                    folder_path,
                    folder_name: x.folder_name.unwrap_or_default(),
                }),
            ))
        }
        OperationXml::FolderDelete(x) => {
            let common = common(v, "FolderDelete", x.operation_name, x.count, x.sleep)?;
            let folder_path = v.required(&common.name, "FolderPath", x.folder_path.as_deref());
            Some(Operation::new(
                common,
                OperationKind::FolderDelete(FolderDeleteOp {
                    folder_path,
                    folder_name: x.folder_name.unwrap_or_default(),
                }),
            ))
        }
        OperationXml::EventMonitor(x) => {
            let common = common(v, "EventMonitor", x.operation_name, x.count, x.sleep)?;
            let folder = v.required(&common.name, "Folder", x.folder.as_deref());
            Some(Operation::new(
                common,
                OperationKind::EventMonitor(EventMonitorOp { folder }),
            ))
        }
    }
}

fn common(
    v: &mut Validator,
    kind: &'static str,
    name: Option<String>,
    count: Option<String>,
    sleep: Option<String>,
) -> Option<OperationCommon> {
    let name = name.map(|n| n.trim().to_string()).unwrap_or_default();
    if name.is_empty() {
        v.push(ValidationError::EmptyOperationName { kind });
        return None;
    }
    let parsed_count = Count::parse(count.as_deref()).unwrap_or_else(|| {
        v.push(ValidationError::InvalidNumber {
            owner: name.clone(),
            field: "Count",
            value: count.unwrap_or_default(),
        });
        Count::default()
    });
    let sleep = v.number(&name, "Sleep", sleep.as_deref());
    Some(OperationCommon {
        name,
        count: parsed_count,
        sleep,
    })
}

fn mail_limit(v: &mut Validator, owner: &str, raw: Option<&str>) -> usize {
    v.number(owner, "MailCountForRandomization", raw)
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_MAIL_COUNT_FOR_RANDOMIZATION)
}

fn recipients(
    v: &mut Validator,
    owner: &str,
    explicit: Vec<String>,
    random: Vec<RandomRecipientsXml>,
) -> RecipientSpec {
    if !explicit.is_empty() && !random.is_empty() {
        v.push(ValidationError::ConflictingRecipients {
            operation: owner.to_string(),
        });
        return RecipientSpec::None;
    }
    if !explicit.is_empty() {
        return RecipientSpec::Explicit(
            explicit
                .into_iter()
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect(),
        );
    }
    let extra = random.len().saturating_sub(1);
    let Some(first) = random.into_iter().next() else {
        return RecipientSpec::None;
    };
    if extra > 0 {
        warn!(
            operation = owner,
            "More than 1 RandomRecipients is specified, using the first"
        );
    }
    RecipientSpec::Random(RandomRecipients {
        count: v
            .number(owner, "RandomRecipients", first.count.as_deref())
            .unwrap_or(0),
        distribution_list: first
            .distribution_list
            .map(|dl| dl.trim().to_string())
            .filter(|dl| !dl.is_empty()),
        user_count_for_randomization: v
            .number(
                owner,
                "UserCountForRandomization",
                first.user_count_for_randomization.as_deref(),
            )
            .filter(|n: &usize| *n > 0)
            .unwrap_or(DEFAULT_USER_COUNT_FOR_RANDOMIZATION),
    })
}

fn attachments(
    v: &mut Validator,
    owner: &str,
    explicit: Vec<String>,
    random: Vec<RandomAttachmentsXml>,
) -> AttachmentSpec {
    if !explicit.is_empty() && !random.is_empty() {
        v.push(ValidationError::ConflictingAttachments {
            operation: owner.to_string(),
        });
        return AttachmentSpec::None;
    }
    if !explicit.is_empty() {
        return AttachmentSpec::Explicit(
            explicit
                .iter()
                .map(|a| a.trim())
                .filter(|a| !a.is_empty())
                .map(PathBuf::from)
                .collect(),
        );
    }
    let extra = random.len().saturating_sub(1);
    let Some(first) = random.into_iter().next() else {
        return AttachmentSpec::None;
    };
    if extra > 0 {
        warn!(
            operation = owner,
            "More than 1 RandomAttachments is specified, using the first"
        );
    }
    let directory = v.required(owner, "RandomAttachments", first.directory.as_deref());
    AttachmentSpec::Random(RandomAttachments {
        count: v.number(owner, "Count", first.count.as_deref()).unwrap_or(0),
        directory: PathBuf::from(directory),
    })
}
