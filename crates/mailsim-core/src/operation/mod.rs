//! Typed operation model.
//!
//! An operation file is a bag of named operations; a sequence task refers to
//! one of them by name. Each kind carries only the fields it needs.

mod model;

pub use model::{
    AttachmentSpec, Count, DEFAULT_MAIL_COUNT_FOR_RANDOMIZATION,
    DEFAULT_USER_COUNT_FOR_RANDOMIZATION, EventMonitorOp, FolderCreateOp, FolderDeleteOp,
    MailDeleteOp, MailForwardOp, MailMoveOp, MailReplyOp, MailSendOp, Operation, OperationCommon,
    OperationKind, OperationSet, RandomAttachments, RandomRecipients, RecipientSpec,
};
