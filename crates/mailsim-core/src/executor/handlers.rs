//! One handler per operation kind.

use tracing::{info, warn};

use super::{Pace, SequenceExecutor};
use crate::config::RANDOM_COUNT_CAP;
use crate::operation::{
    Count, EventMonitorOp, FolderCreateOp, FolderDeleteOp, MailDeleteOp, MailForwardOp,
    MailMoveOp, MailReplyOp, MailSendOp, OperationCommon,
};
use crate::resolver::{resolve_attachments, resolve_recipients};
use crate::selection::{ParsedOperation, uncapped_count};
use crate::store::{MailFolder, MailItem, MailStore};
use crate::{Error, Result};

/// Subject used when an operation has no subject template.
pub const DEFAULT_SUBJECT: &str = "Default Subject";

/// Body used when an operation has no body template.
pub const DEFAULT_BODY: &str = "Default Body";

/// Local time stamp prefixed to generated subjects, bodies and folder names.
#[must_use]
pub fn timestamp() -> String {
    chrono::Local::now()
        .format("%Y-%m-%d %H:%M:%S%.9f")
        .to_string()
}

/// Build `"{timestamp} - {template}"`, falling back to `default` for a blank template.
#[must_use]
pub fn compose_text(timestamp: &str, template: Option<&str>, default: &str) -> String {
    let text = template.filter(|t| !t.is_empty()).unwrap_or(default);
    format!("{timestamp} - {text}")
}

fn resolve_folder(store: &dyn MailStore, name: &str) -> Result<Box<dyn MailFolder>> {
    store
        .default_folder(name)?
        .ok_or_else(|| Error::FolderNotFound(name.to_string()))
}

/// Fetch the mails of `folder` whose subject contains `subject`, exactly.
fn candidate_mails(
    folder: &dyn MailFolder,
    subject: &str,
    max_count: usize,
) -> Result<Vec<Box<dyn MailItem>>> {
    let mut items = folder.mail_items(subject, max_count)?;
    // Providers match case-insensitively.
    items.retain(|item| subject.is_empty() || item.subject().contains(subject));
    if items.is_empty() {
        return Err(Error::NoCandidates(format!(
            "no mail in {} with subject containing {subject:?}",
            folder.folder_path()
        )));
    }
    Ok(items)
}

fn add_attachments(
    item: &mut dyn MailItem,
    operation: &str,
    paths: &[std::path::PathBuf],
) -> Result<()> {
    for path in paths {
        info!(operation, "Attachment: {}", path.display());
        item.add_attachment(path)?;
    }
    Ok(())
}

fn add_recipients(item: &mut dyn MailItem, operation: &str, recipients: &[String]) -> Result<()> {
    if recipients.is_empty() {
        return Err(Error::MissingRecipients);
    }
    for recipient in recipients {
        info!(operation, "Recipient: {recipient}");
        item.add_recipient(recipient)?;
    }
    Ok(())
}

impl SequenceExecutor {
    pub(super) fn mail_send(&mut self, common: &OperationCommon, op: &MailSendOp) -> Result<bool> {
        let name = common.name.as_str();
        let Count::Fixed(iterations) = common.count else {
            return Err(Error::Config(format!(
                "{name}: Count is less than the minimum allowed value"
            )));
        };

        for iteration in 1..=iterations {
            info!(operation = name, "Starting iteration {iteration}");
            let recipients =
                resolve_recipients(name, &op.recipients, self.store.as_ref(), &mut self.rng)?;
            if recipients.is_empty() {
                return Err(Error::MissingRecipients);
            }
            let attachments = resolve_attachments(name, &op.attachments, &mut self.rng);

            let now = timestamp();
            let mut mail = self.store.new_mail_item()?;
            mail.set_subject(&compose_text(&now, op.subject.as_deref(), DEFAULT_SUBJECT));
            mail.set_body(&compose_text(&now, op.body.as_deref(), DEFAULT_BODY));
            info!(operation = name, "Subject: {}", mail.subject());
            add_recipients(mail.as_mut(), name, &recipients)?;
            add_attachments(mail.as_mut(), name, &attachments)?;
            mail.send()?;

            info!(operation = name, "Finished iteration {iteration}");
            self.checkpoint(name, common.sleep)?;
        }
        Ok(true)
    }

    pub(super) fn mail_delete(
        &mut self,
        common: &OperationCommon,
        op: &MailDeleteOp,
    ) -> Result<bool> {
        let folder = resolve_folder(self.store.as_ref(), &op.folder)?;
        let mails = candidate_mails(
            folder.as_ref(),
            &op.subject,
            op.mail_count_for_randomization,
        )?;
        let mut parsed = ParsedOperation::new(&common.name, common.count, mails, &mut self.rng);
        let pace = Pace {
            pacer: &self.pacer,
            events: &self.events,
        };
        parsed.iterate(&mut self.rng, &pace, common.sleep, |_, mails, index| {
            info!(operation = %common.name, "Deleting mail: {}", mails[index].subject());
            mails[index].delete()?;
            mails.remove(index);
            Ok(true)
        })
    }

    pub(super) fn mail_reply(
        &mut self,
        common: &OperationCommon,
        op: &MailReplyOp,
    ) -> Result<bool> {
        let folder = resolve_folder(self.store.as_ref(), &op.folder)?;
        let mails = candidate_mails(
            folder.as_ref(),
            &op.subject,
            op.mail_count_for_randomization,
        )?;
        let mut parsed = ParsedOperation::new(&common.name, common.count, mails, &mut self.rng);
        let pace = Pace {
            pacer: &self.pacer,
            events: &self.events,
        };
        let name = common.name.as_str();
        parsed.iterate(&mut self.rng, &pace, common.sleep, |rng, mails, index| {
            info!(
                operation = name,
                "Replying to mail: {}",
                mails[index].subject()
            );
            let mut reply = mails[index].reply(op.reply_all)?;
            let body =
                compose_text(&timestamp(), op.body.as_deref(), DEFAULT_BODY) + &reply.body();
            reply.set_body(&body);
            let attachments = resolve_attachments(name, &op.attachments, rng);
            add_attachments(reply.as_mut(), name, &attachments)?;
            reply.send()?;
            mails.remove(index);
            Ok(true)
        })
    }

    pub(super) fn mail_forward(
        &mut self,
        common: &OperationCommon,
        op: &MailForwardOp,
    ) -> Result<bool> {
        let folder = resolve_folder(self.store.as_ref(), &op.folder)?;
        let mails = candidate_mails(
            folder.as_ref(),
            &op.subject,
            op.mail_count_for_randomization,
        )?;
        let mut parsed = ParsedOperation::new(&common.name, common.count, mails, &mut self.rng);
        let pace = Pace {
            pacer: &self.pacer,
            events: &self.events,
        };
        let store = self.store.as_ref();
        let name = common.name.as_str();
        parsed.iterate(&mut self.rng, &pace, common.sleep, |rng, mails, index| {
            let recipients = resolve_recipients(name, &op.recipients, store, rng)?;
            if recipients.is_empty() {
                return Err(Error::MissingRecipients);
            }
            info!(
                operation = name,
                "Forwarding mail: {}",
                mails[index].subject()
            );
            let mut forward = mails[index].forward()?;
            let body =
                compose_text(&timestamp(), op.body.as_deref(), DEFAULT_BODY) + &forward.body();
            forward.set_body(&body);
            add_recipients(forward.as_mut(), name, &recipients)?;
            let attachments = resolve_attachments(name, &op.attachments, rng);
            add_attachments(forward.as_mut(), name, &attachments)?;
            forward.send()?;
            mails.remove(index);
            Ok(true)
        })
    }

    pub(super) fn mail_move(&mut self, common: &OperationCommon, op: &MailMoveOp) -> Result<bool> {
        let destination = resolve_folder(self.store.as_ref(), &op.destination_folder)?;
        let source = resolve_folder(self.store.as_ref(), &op.source_folder)?;
        let mails = candidate_mails(
            source.as_ref(),
            &op.subject,
            op.mail_count_for_randomization,
        )?;
        let mut parsed = ParsedOperation::new(&common.name, common.count, mails, &mut self.rng);
        let pace = Pace {
            pacer: &self.pacer,
            events: &self.events,
        };
        parsed.iterate(&mut self.rng, &pace, common.sleep, |_, mails, index| {
            info!(
                operation = %common.name,
                "Moving mail to {}: {}",
                destination.folder_path(),
                mails[index].subject()
            );
            mails[index].move_to(destination.as_ref())?;
            mails.remove(index);
            Ok(true)
        })
    }

    pub(super) fn folder_create(
        &mut self,
        common: &OperationCommon,
        op: &FolderCreateOp,
    ) -> Result<bool> {
        let name = common.name.as_str();
        let parent = resolve_folder(self.store.as_ref(), &op.folder_path)?;
        let iterations = uncapped_count(common.count, RANDOM_COUNT_CAP, &mut self.rng);
        if common.count.is_random() {
            info!(operation = name, "Randomly creating {iterations} folders");
        }

        for iteration in 1..=iterations {
            info!(operation = name, "Starting iteration {iteration}");
            let folder_name = compose_text(&timestamp(), Some(op.folder_name.as_str()), "");
            info!(operation = name, "Creating folder: {folder_name}");
            parent.add_sub_folder(&folder_name)?;
            info!(operation = name, "Finished iteration {iteration}");
            self.checkpoint(name, common.sleep)?;
        }
        Ok(true)
    }

    pub(super) fn folder_delete(
        &mut self,
        common: &OperationCommon,
        op: &FolderDeleteOp,
    ) -> Result<bool> {
        let parent = resolve_folder(self.store.as_ref(), &op.folder_path)?;
        let mut folders = parent.sub_folders()?;
        folders
            .retain(|folder| op.folder_name.is_empty() || folder.name().contains(&op.folder_name));
        if folders.is_empty() {
            return Err(Error::NoCandidates(format!(
                "no subfolder of {} with name containing {:?}",
                parent.folder_path(),
                op.folder_name
            )));
        }

        let mut parsed = ParsedOperation::new(&common.name, common.count, folders, &mut self.rng);
        let pace = Pace {
            pacer: &self.pacer,
            events: &self.events,
        };
        parsed.iterate(&mut self.rng, &pace, common.sleep, |_, folders, index| {
            info!(operation = %common.name, "Deleting folder: {}", folders[index].name());
            folders[index].delete()?;
            folders.remove(index);
            Ok(true)
        })
    }

    pub(super) fn event_monitor(
        &mut self,
        common: &OperationCommon,
        op: &EventMonitorOp,
    ) -> Result<bool> {
        let folder = resolve_folder(self.store.as_ref(), &op.folder)?;
        if !self.events.register(&common.name, folder)? {
            warn!(
                operation = %common.name,
                folder = %op.folder,
                "Event monitor already registered"
            );
        }
        self.checkpoint(&common.name, common.sleep)?;
        Ok(true)
    }
}
