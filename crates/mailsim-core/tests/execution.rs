//! End-to-end runs of the executor against the in-memory store.

#![allow(clippy::unwrap_used)]

use std::path::Path;
use std::time::Duration;

use mailsim_core::operation::{
    AttachmentSpec, Count, FolderCreateOp, FolderDeleteOp, MailDeleteOp, MailForwardOp,
    MailMoveOp, MailReplyOp, MailSendOp, OperationCommon, RandomAttachments, RecipientSpec,
};
use mailsim_core::{
    MemoryStore, Operation, OperationKind, OperationSet, Pacer, RunOutcome, SequenceExecutor,
    load_sequence,
};
use tempfile::TempDir;

const OWN_ADDRESS: &str = "load@contoso.com";

fn no_sleep(_: Duration) {}

fn executor(store: &MemoryStore, dir: &Path, seed: u64) -> SequenceExecutor {
    SequenceExecutor::new(Box::new(store.clone()))
        .with_pacer(Pacer::new(dir.join("stop.txt")).with_sleeper(no_sleep))
        .with_seed(seed)
}

fn store_with_inbox(subjects: &[&str]) -> MemoryStore {
    let store = MemoryStore::new("Load User", OWN_ADDRESS);
    for subject in subjects {
        store
            .add_mail("Inbox", subject, "original body", "alice@contoso.com")
            .unwrap();
    }
    store
}

fn common(name: &str, count: Count) -> OperationCommon {
    OperationCommon {
        name: name.to_string(),
        count,
        sleep: None,
    }
}

fn delete_op(name: &str, count: Count, subject: &str) -> Operation {
    Operation::new(
        common(name, count),
        OperationKind::MailDelete(MailDeleteOp {
            folder: "olFolderInbox".to_string(),
            subject: subject.to_string(),
            mail_count_for_randomization: 1000,
        }),
    )
}

#[test]
fn send_with_explicit_recipients() {
    let dir = TempDir::new().unwrap();
    let store = store_with_inbox(&[]);
    let mut exec = executor(&store, dir.path(), 1);
    exec.set_operations(OperationSet::new(vec![Operation::new(
        common("SendHello", Count::Fixed(1)),
        OperationKind::MailSend(MailSendOp {
            subject: Some("Hello".to_string()),
            body: None,
            recipients: RecipientSpec::Explicit(vec![
                "bob@contoso.com".to_string(),
                "carol@contoso.com".to_string(),
            ]),
            attachments: AttachmentSpec::None,
        }),
    )]));

    assert!(exec.execute_task("sendhello").unwrap());

    let sent = store.sent_messages();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].subject.ends_with(" - Hello"));
    assert!(sent[0].body.ends_with(" - Default Body"));
    assert_eq!(
        sent[0].recipients,
        vec!["bob@contoso.com", "carol@contoso.com"]
    );
    assert_eq!(store.subjects_in("Sent Items").len(), 1);
}

#[test]
fn send_without_recipients_fails() {
    let dir = TempDir::new().unwrap();
    let store = store_with_inbox(&[]);
    let mut exec = executor(&store, dir.path(), 1);
    exec.set_operations(OperationSet::new(vec![Operation::new(
        common("SendNobody", Count::Fixed(2)),
        OperationKind::MailSend(MailSendOp::default()),
    )]));

    assert!(!exec.execute_task("SendNobody").unwrap());
    assert!(store.sent_messages().is_empty());
}

#[test]
fn random_delete_removes_between_one_and_all() {
    let dir = TempDir::new().unwrap();
    let mut seen = std::collections::BTreeSet::new();
    for seed in 0..60 {
        let store = store_with_inbox(&["m1", "m2", "m3", "m4", "m5"]);
        let mut exec = executor(&store, dir.path(), seed);
        exec.set_operations(OperationSet::new(vec![delete_op("Clean", Count::Random, "")]));

        assert!(exec.execute_task("Clean").unwrap());

        let remaining = store.subjects_in("Inbox").len();
        let deleted = store.subjects_in("Deleted Items");
        assert!((1..=5).contains(&deleted.len()));
        assert_eq!(remaining + deleted.len(), 5);
        let mut unique = deleted.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), deleted.len());
        seen.insert(deleted.len());
    }
    assert_eq!(seen.len(), 5, "expected every count in 1..=5, saw {seen:?}");
}

#[test]
fn ordered_delete_consumes_from_the_end() {
    let dir = TempDir::new().unwrap();
    let store = store_with_inbox(&["first", "second", "third"]);
    let mut exec = executor(&store, dir.path(), 1);
    exec.set_operations(OperationSet::new(vec![delete_op("Clean", Count::Fixed(2), "")]));

    assert!(exec.execute_task("Clean").unwrap());

    assert_eq!(store.subjects_in("Inbox"), vec!["first"]);
    assert_eq!(store.subjects_in("Deleted Items"), vec!["third", "second"]);
}

#[test]
fn delete_count_is_clamped_to_candidates() {
    let dir = TempDir::new().unwrap();
    let store = store_with_inbox(&["Report A", "report B", "Other"]);
    let mut exec = executor(&store, dir.path(), 1);
    exec.set_operations(OperationSet::new(vec![delete_op("Clean", Count::Fixed(10), "Report")]));

    assert!(exec.execute_task("Clean").unwrap());

    assert_eq!(store.subjects_in("Deleted Items"), vec!["Report A"]);
    assert_eq!(store.subjects_in("Inbox"), vec!["report B", "Other"]);
}

#[test]
fn delete_with_no_match_fails() {
    let dir = TempDir::new().unwrap();
    let store = store_with_inbox(&["Other"]);
    let mut exec = executor(&store, dir.path(), 1);
    exec.set_operations(OperationSet::new(vec![delete_op("Clean", Count::Fixed(1), "Missing")]));

    assert!(!exec.execute_task("Clean").unwrap());
    assert_eq!(store.subjects_in("Inbox"), vec!["Other"]);
}

#[test]
fn move_to_unknown_destination_fetches_nothing() {
    let dir = TempDir::new().unwrap();
    let store = store_with_inbox(&["m1", "m2"]);
    let mut exec = executor(&store, dir.path(), 1);
    exec.set_operations(OperationSet::new(vec![Operation::new(
        common("Move", Count::Fixed(1)),
        OperationKind::MailMove(MailMoveOp {
            source_folder: "olFolderInbox".to_string(),
            destination_folder: "olFolderCalendar".to_string(),
            subject: String::new(),
            mail_count_for_randomization: 1000,
        }),
    )]));

    assert!(!exec.execute_task("Move").unwrap());
    assert_eq!(store.item_fetches(), 0);
    assert_eq!(store.subjects_in("Inbox").len(), 2);
}

#[test]
fn move_between_well_known_folders() {
    let dir = TempDir::new().unwrap();
    let store = store_with_inbox(&["keep", "spam offer", "spam deal"]);
    let mut exec = executor(&store, dir.path(), 1);
    exec.set_operations(OperationSet::new(vec![Operation::new(
        common("Junk", Count::Random),
        OperationKind::MailMove(MailMoveOp {
            source_folder: "olFolderInbox".to_string(),
            destination_folder: "olFolderJunk".to_string(),
            subject: "spam".to_string(),
            mail_count_for_randomization: 1000,
        }),
    )]));

    assert!(exec.execute_task("Junk").unwrap());

    let junk = store.subjects_in("Junk Email");
    assert!((1..=2).contains(&junk.len()));
    assert!(junk.iter().all(|s| s.starts_with("spam")));
    assert_eq!(store.subjects_in("Inbox").len() + junk.len(), 3);
}

#[test]
fn reply_prefixes_body_and_sends() {
    let dir = TempDir::new().unwrap();
    let store = store_with_inbox(&["Question"]);
    let mut exec = executor(&store, dir.path(), 1);
    exec.set_operations(OperationSet::new(vec![Operation::new(
        common("Reply", Count::Fixed(1)),
        OperationKind::MailReply(MailReplyOp {
            folder: "olFolderInbox".to_string(),
            subject: "Question".to_string(),
            reply_all: false,
            body: Some("Thanks".to_string()),
            attachments: AttachmentSpec::None,
            mail_count_for_randomization: 1000,
        }),
    )]));

    assert!(exec.execute_task("Reply").unwrap());

    let sent = store.sent_messages();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "RE: Question");
    assert!(sent[0].body.contains(" - Thanks"));
    assert!(sent[0].body.ends_with("original body"));
    assert_eq!(sent[0].recipients, vec!["alice@contoso.com"]);
}

#[test]
fn forward_requires_recipients() {
    let dir = TempDir::new().unwrap();
    let store = store_with_inbox(&["News"]);
    let forward = |name: &str, recipients: RecipientSpec| {
        Operation::new(
            common(name, Count::Fixed(1)),
            OperationKind::MailForward(MailForwardOp {
                folder: "olFolderInbox".to_string(),
                subject: String::new(),
                body: None,
                recipients,
                attachments: AttachmentSpec::None,
                mail_count_for_randomization: 1000,
            }),
        )
    };
    let mut exec = executor(&store, dir.path(), 1);
    exec.set_operations(OperationSet::new(vec![
        forward("NoOne", RecipientSpec::None),
        forward(
            "ToBob",
            RecipientSpec::Explicit(vec!["bob@contoso.com".to_string()]),
        ),
    ]));

    assert!(!exec.execute_task("NoOne").unwrap());
    assert!(store.sent_messages().is_empty());

    assert!(exec.execute_task("ToBob").unwrap());
    let sent = store.sent_messages();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "FW: News");
    assert!(sent[0].body.contains(" - Default Body"));
    assert_eq!(sent[0].recipients, vec!["bob@contoso.com"]);
}

#[test]
fn folder_create_and_delete() {
    let dir = TempDir::new().unwrap();
    let store = store_with_inbox(&[]);
    store.add_folder("Inbox/Keep").unwrap();
    let mut exec = executor(&store, dir.path(), 5);
    exec.set_operations(OperationSet::new(vec![
        Operation::new(
            common("Create", Count::Fixed(3)),
            OperationKind::FolderCreate(FolderCreateOp {
                folder_path: "olFolderInbox".to_string(),
                folder_name: "Load".to_string(),
            }),
        ),
        Operation::new(
            common("Delete", Count::Random),
            OperationKind::FolderDelete(FolderDeleteOp {
                folder_path: "olFolderInbox".to_string(),
                folder_name: "Load".to_string(),
            }),
        ),
    ]));

    assert!(exec.execute_task("Create").unwrap());
    let created: Vec<_> = store
        .sub_folder_names("Inbox")
        .into_iter()
        .filter(|name| name.ends_with(" - Load"))
        .collect();
    assert_eq!(created.len(), 3);

    assert!(exec.execute_task("Delete").unwrap());
    let names = store.sub_folder_names("Inbox");
    assert!(names.contains(&"Keep".to_string()));
    let left = names.iter().filter(|name| name.ends_with(" - Load")).count();
    assert!(left < 3);
}

#[test]
fn event_monitor_twice_registers_once() {
    let dir = TempDir::new().unwrap();
    let store = store_with_inbox(&[]);
    let mut exec = executor(&store, dir.path(), 1);
    exec.set_operations(OperationSet::new(vec![Operation::event_monitor(
        "WatchSent",
        "olFolderSentMail",
    )]));

    assert!(exec.execute_task("WatchSent").unwrap());
    assert!(exec.execute_task("WatchSent").unwrap());
    assert_eq!(exec.events().len(), 1);
    assert_eq!(store.monitored_folders(), vec!["Sent Items"]);
}

#[test]
fn duplicate_and_missing_names_are_skipped() {
    let dir = TempDir::new().unwrap();
    let store = store_with_inbox(&["m1", "m2"]);
    let mut exec = executor(&store, dir.path(), 1);
    exec.set_operations(OperationSet::new(vec![
        delete_op("Clean", Count::Fixed(1), ""),
        delete_op("CLEAN", Count::Fixed(1), ""),
    ]));

    assert!(!exec.execute_task("Clean").unwrap());
    assert!(!exec.execute_task("Nothing").unwrap());
    assert_eq!(store.subjects_in("Inbox").len(), 2);
}

const OPERATIONS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<MailSimOperations>
  <MailSend OperationName="SendToSelf" Count="2">
    <Subject>Load</Subject>
    <Recipients>load@contoso.com</Recipients>
  </MailSend>
  <MailDelete OperationName="DeleteLoad" Count="1" Folder="olFolderInbox" Subject="Load" />
  <EventMonitor OperationName="WatchInbox" Folder="olFolderInbox" />
</MailSimOperations>
"#;

fn write_run(dir: &Path, group_iterations: u32) -> std::path::PathBuf {
    std::fs::write(dir.join("operations.xml"), OPERATIONS).unwrap();
    let sequence = format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<MailSimSequence>
  <OperationGroup Name="Missing" OperationFile="missing.xml">
    <Task Name="SendToSelf" />
  </OperationGroup>
  <OperationGroup Name="Load" OperationFile="operations.xml" Iterations="{group_iterations}" Sleep="2">
    <Task Name="WatchInbox" />
    <Task Name="SendToSelf" />
    <Task Name="DeleteLoad" Iterations="2" />
  </OperationGroup>
</MailSimSequence>
"#
    );
    let path = dir.join("sequence.xml");
    std::fs::write(&path, sequence).unwrap();
    path
}

#[test]
fn sequence_runs_groups_and_cleans_up() {
    let dir = TempDir::new().unwrap();
    let path = write_run(dir.path(), 2);
    let config = load_sequence(&path).unwrap();
    let store = MemoryStore::new("Load User", OWN_ADDRESS);
    let pacer = Pacer::new(dir.path().join("stop.txt")).with_sleeper(no_sleep);
    let mut exec = SequenceExecutor::new(Box::new(store.clone()))
        .with_pacer(pacer)
        .with_seed(3);

    assert_eq!(exec.execute(&config).unwrap(), RunOutcome::Completed);

    // Two passes, each sending two mails to self and deleting two of the copies.
    assert_eq!(store.sent_messages().len(), 4);
    assert_eq!(store.subjects_in("Inbox").len(), 0);
    assert_eq!(store.subjects_in("Deleted Items").len(), 4);
    assert!(exec.events().is_empty());
    assert!(store.monitored_folders().is_empty());
}

#[test]
fn stop_file_cancels_cleanly() {
    let dir = TempDir::new().unwrap();
    let path = write_run(dir.path(), 5);
    std::fs::write(dir.path().join("stop.txt"), "").unwrap();
    let config = load_sequence(&path).unwrap();
    let store = MemoryStore::new("Load User", OWN_ADDRESS);
    let mut exec = executor(&store, dir.path(), 3);

    assert_eq!(exec.execute(&config).unwrap(), RunOutcome::Cancelled);

    // The default inbox monitor hits the first checkpoint, before any group runs.
    assert!(store.sent_messages().is_empty());
    assert!(exec.events().is_empty());
    assert!(store.monitored_folders().is_empty());
}

fn send_op(name: &str, attachments: AttachmentSpec) -> Operation {
    Operation::new(
        common(name, Count::Fixed(1)),
        OperationKind::MailSend(MailSendOp {
            subject: Some("Files".to_string()),
            body: None,
            recipients: RecipientSpec::Explicit(vec!["bob@contoso.com".to_string()]),
            attachments,
        }),
    )
}

#[test]
fn send_with_explicit_attachments() {
    let dir = TempDir::new().unwrap();
    let report = dir.path().join("report.txt");
    let notes = dir.path().join("notes.txt");
    std::fs::write(&report, "numbers").unwrap();
    std::fs::write(&notes, "words").unwrap();
    let store = store_with_inbox(&[]);
    let mut exec = executor(&store, dir.path(), 1);
    exec.set_operations(OperationSet::new(vec![send_op(
        "SendFiles",
        AttachmentSpec::Explicit(vec![report.clone(), notes.clone()]),
    )]));

    assert!(exec.execute_task("SendFiles").unwrap());

    let sent = store.sent_messages();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].attachments,
        vec![report.display().to_string(), notes.display().to_string()]
    );
}

#[test]
fn send_with_missing_attachment_fails() {
    let dir = TempDir::new().unwrap();
    let store = store_with_inbox(&[]);
    let mut exec = executor(&store, dir.path(), 1);
    exec.set_operations(OperationSet::new(vec![send_op(
        "SendMissing",
        AttachmentSpec::Explicit(vec![dir.path().join("missing.txt")]),
    )]));

    assert!(!exec.execute_task("SendMissing").unwrap());
    assert!(store.sent_messages().is_empty());
    assert!(store.subjects_in("Sent Items").is_empty());
}

#[test]
fn reply_with_random_attachments() {
    let dir = TempDir::new().unwrap();
    let files = dir.path().join("files");
    std::fs::create_dir(&files).unwrap();
    for name in ["a.txt", "b.txt", "c.txt"] {
        std::fs::write(files.join(name), name).unwrap();
    }
    let store = store_with_inbox(&["Question"]);
    let mut exec = executor(&store, dir.path(), 4);
    exec.set_operations(OperationSet::new(vec![Operation::new(
        common("Reply", Count::Fixed(1)),
        OperationKind::MailReply(MailReplyOp {
            folder: "olFolderInbox".to_string(),
            subject: "Question".to_string(),
            reply_all: false,
            body: None,
            attachments: AttachmentSpec::Random(RandomAttachments {
                count: 2,
                directory: files.clone(),
            }),
            mail_count_for_randomization: 1000,
        }),
    )]));

    assert!(exec.execute_task("Reply").unwrap());

    let sent = store.sent_messages();
    assert_eq!(sent.len(), 1);
    let mut attached = sent[0].attachments.clone();
    assert_eq!(attached.len(), 2);
    attached.sort();
    attached.dedup();
    assert_eq!(attached.len(), 2);
    assert!(attached.iter().all(|a| Path::new(a).parent() == Some(files.as_path())));
}

#[test]
fn random_folder_create_count_is_uniform() {
    let dir = TempDir::new().unwrap();
    let mut counts = Vec::new();
    for seed in 0..200 {
        let store = store_with_inbox(&[]);
        let mut exec = executor(&store, dir.path(), seed);
        exec.set_operations(OperationSet::new(vec![Operation::new(
            common("Create", Count::Random),
            OperationKind::FolderCreate(FolderCreateOp {
                folder_path: "olFolderInbox".to_string(),
                folder_name: "Load".to_string(),
            }),
        )]));

        assert!(exec.execute_task("Create").unwrap());
        counts.push(store.sub_folder_names("Inbox").len());
    }

    assert!(counts.iter().all(|n| (1..=100).contains(n)));
    assert!(counts.iter().any(|n| *n <= 10), "{counts:?}");
    assert!(counts.iter().any(|n| *n >= 90), "{counts:?}");
    let mean = counts.iter().sum::<usize>() as f64 / counts.len() as f64;
    assert!((42.5..=58.5).contains(&mean), "mean {mean}");
}

#[test]
fn random_send_count_fails_only_its_task() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("operations.xml"),
        r#"<MailSimOperations>
  <MailSend OperationName="BadSend" Count="0">
    <Recipients>bob@contoso.com</Recipients>
  </MailSend>
  <MailDelete OperationName="Clean" Count="1" Folder="olFolderInbox" />
</MailSimOperations>
"#,
    )
    .unwrap();
    let path = dir.path().join("sequence.xml");
    std::fs::write(
        &path,
        r#"<MailSimSequence>
  <OperationGroup Name="Mixed" OperationFile="operations.xml">
    <Task Name="BadSend" />
    <Task Name="Clean" />
  </OperationGroup>
</MailSimSequence>
"#,
    )
    .unwrap();
    let config = load_sequence(&path).unwrap();
    let store = store_with_inbox(&["m1"]);
    let mut exec = executor(&store, dir.path(), 1);

    assert_eq!(exec.execute(&config).unwrap(), RunOutcome::Completed);

    assert!(store.sent_messages().is_empty());
    assert!(store.subjects_in("Inbox").is_empty());
    assert_eq!(store.subjects_in("Deleted Items"), vec!["m1"]);
}
