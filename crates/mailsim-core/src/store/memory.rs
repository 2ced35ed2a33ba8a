//! In-process mail store.
//!
//! Backs dry runs of a sequence without a live mailbox and is the provider the
//! test-suite drives. State is shared between every handle handed out, so a
//! clone of the store observes all mutations made through the engine.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::rc::Rc;

use serde::Deserialize;

use super::{
    AddressBook, ItemAddSink, ItemArrival, MailFolder, MailItem, MailStore, StoreError,
    StoreResult, WellKnownFolder,
};

const PATH_SEPARATOR: char = '/';

/// A message submitted through [`MailItem::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Subject line.
    pub subject: String,
    /// Body text.
    pub body: String,
    /// Recipient addresses, in the order they were added.
    pub recipients: Vec<String>,
    /// Attachment names (file paths or attached message subjects).
    pub attachments: Vec<String>,
}

#[derive(Debug)]
struct FolderData {
    name: String,
    children: Vec<String>,
    items: Vec<u64>,
    sink: Option<ItemAddSink>,
}

impl FolderData {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            children: Vec::new(),
            items: Vec::new(),
            sink: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct MessageData {
    subject: String,
    body: String,
    sender: String,
    recipients: Vec<String>,
    attachments: Vec<String>,
    folder: Option<String>,
    sent: bool,
}

#[derive(Debug, Clone)]
struct DirectoryUser {
    name: String,
    address: String,
}

#[derive(Debug)]
struct MemoryState {
    display_name: String,
    address: String,
    folders: BTreeMap<String, FolderData>,
    messages: HashMap<u64, MessageData>,
    next_id: u64,
    sent: Vec<SentMessage>,
    users: Vec<DirectoryUser>,
    distribution_lists: Vec<(String, Vec<String>)>,
    item_fetches: usize,
}

impl MemoryState {
    fn folder(&self, path: &str) -> StoreResult<&FolderData> {
        self.folders
            .get(path)
            .ok_or_else(|| StoreError::NotFound(format!("folder {path}")))
    }

    fn folder_mut(&mut self, path: &str) -> StoreResult<&mut FolderData> {
        self.folders
            .get_mut(path)
            .ok_or_else(|| StoreError::NotFound(format!("folder {path}")))
    }

    fn message(&self, id: u64) -> StoreResult<&MessageData> {
        self.messages
            .get(&id)
            .ok_or_else(|| StoreError::NotFound(format!("mail item {id}")))
    }

    fn message_mut(&mut self, id: u64) -> StoreResult<&mut MessageData> {
        self.messages
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("mail item {id}")))
    }

    fn insert_message(&mut self, data: MessageData) -> u64 {
        self.next_id += 1;
        self.messages.insert(self.next_id, data);
        self.next_id
    }

    fn create_folder(&mut self, parent: &str, name: &str) -> StoreResult<String> {
        if name.is_empty() || name.contains(PATH_SEPARATOR) {
            return Err(StoreError::Operation(format!("invalid folder name {name:?}")));
        }
        let path = child_path(parent, name);
        let parent_data = self.folder_mut(parent)?;
        if parent_data.children.contains(&path) {
            return Err(StoreError::Operation(format!("folder {path} already exists")));
        }
        parent_data.children.push(path.clone());
        self.folders.insert(path.clone(), FolderData::new(name));
        Ok(path)
    }

    fn ensure_folder(&mut self, path: &str) -> StoreResult<()> {
        let mut current = String::new();
        for segment in path.split(PATH_SEPARATOR).filter(|s| !s.is_empty()) {
            let next = child_path(&current, segment);
            if !self.folders.contains_key(&next) {
                self.create_folder(&current, segment)?;
            }
            current = next;
        }
        Ok(())
    }

    /// Put a message into a folder and notify the folder's sink.
    fn file_into(&mut self, id: u64, path: &str) -> StoreResult<()> {
        let arrival = {
            let msg = self.message(id)?;
            ItemArrival::Mail {
                folder: path.to_string(),
                sender: msg.sender.clone(),
                subject: msg.subject.clone(),
            }
        };
        let folder = self.folder_mut(path)?;
        folder.items.push(id);
        if let Some(sink) = &folder.sink {
            // A dropped receiver only means nobody is listening any more.
            let _ = sink.send(arrival);
        }
        self.message_mut(id)?.folder = Some(path.to_string());
        Ok(())
    }

    fn unfile(&mut self, id: u64) -> StoreResult<()> {
        if let Some(path) = self.message(id)?.folder.clone() {
            self.folder_mut(&path)?.items.retain(|item| *item != id);
            self.message_mut(id)?.folder = None;
        }
        Ok(())
    }

    fn remove_folder_tree(&mut self, path: &str) {
        if let Some(data) = self.folders.remove(path) {
            for id in data.items {
                self.messages.remove(&id);
            }
            for child in data.children {
                self.remove_folder_tree(&child);
            }
        }
    }
}

fn child_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}{PATH_SEPARATOR}{name}")
    }
}

fn parent_path(path: &str) -> &str {
    path.rsplit_once(PATH_SEPARATOR).map_or("", |(parent, _)| parent)
}

/// Mail store kept entirely in memory.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    state: Rc<RefCell<MemoryState>>,
}

impl MemoryStore {
    /// Create a mailbox with the well-known folders and an empty address book.
    #[must_use]
    pub fn new(display_name: impl Into<String>, address: impl Into<String>) -> Self {
        let display_name = display_name.into();
        let mut folders = BTreeMap::new();
        let mut root = FolderData::new(&display_name);
        for well_known in WellKnownFolder::ALL {
            let name = well_known.display_name();
            root.children.push(name.to_string());
            folders.insert(name.to_string(), FolderData::new(name));
        }
        folders.insert(String::new(), root);

        Self {
            state: Rc::new(RefCell::new(MemoryState {
                display_name,
                address: address.into(),
                folders,
                messages: HashMap::new(),
                next_id: 0,
                sent: Vec::new(),
                users: Vec::new(),
                distribution_lists: Vec::new(),
                item_fetches: 0,
            })),
        }
    }

    /// Load a mailbox from a JSON fixture file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// describes an impossible folder layout.
    pub fn from_fixture_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_fixture_str(&content)
    }

    /// Load a mailbox from fixture JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid or a folder cannot be created.
    pub fn from_fixture_str(json: &str) -> crate::Result<Self> {
        let fixture: Fixture = serde_json::from_str(json)?;
        let store = Self::new(fixture.display_name, fixture.address);
        for folder in fixture.folders {
            store.add_folder(&folder.path)?;
            for mail in folder.mails {
                store.add_mail(&folder.path, &mail.subject, &mail.body, &mail.sender)?;
            }
        }
        for user in fixture.users {
            store.add_user(user.name, user.address);
        }
        for (name, members) in fixture.distribution_lists {
            store.add_distribution_list(name, members);
        }
        Ok(store)
    }

    /// Create a folder path, including any missing parents.
    ///
    /// # Errors
    ///
    /// Returns an error if a segment is not a valid folder name.
    pub fn add_folder(&self, path: &str) -> StoreResult<()> {
        self.state.borrow_mut().ensure_folder(path)
    }

    /// Deliver a mail into an existing folder and return its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder does not exist.
    pub fn add_mail(
        &self,
        folder: &str,
        subject: &str,
        body: &str,
        sender: &str,
    ) -> StoreResult<u64> {
        let mut state = self.state.borrow_mut();
        state.folder(folder)?;
        let recipient = state.address.clone();
        let id = state.insert_message(MessageData {
            subject: subject.to_string(),
            body: body.to_string(),
            sender: sender.to_string(),
            recipients: vec![recipient],
            sent: true,
            ..MessageData::default()
        });
        state.file_into(id, folder)?;
        Ok(id)
    }

    /// Deliver a non-mail item, such as a meeting request, into a folder.
    ///
    /// Only the folder's new-item subscriber sees it; nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder does not exist.
    pub fn deliver_other(&self, folder: &str, kind: &str) -> StoreResult<()> {
        let state = self.state.borrow();
        if let Some(sink) = &state.folder(folder)?.sink {
            let _ = sink.send(ItemArrival::Other {
                folder: folder.to_string(),
                kind: kind.to_string(),
            });
        }
        Ok(())
    }

    /// Add a user to the global address list.
    pub fn add_user(&self, name: impl Into<String>, address: impl Into<String>) {
        self.state.borrow_mut().users.push(DirectoryUser {
            name: name.into(),
            address: address.into(),
        });
    }

    /// Add a distribution list to the global address list.
    pub fn add_distribution_list(&self, name: impl Into<String>, members: Vec<String>) {
        self.state
            .borrow_mut()
            .distribution_lists
            .push((name.into(), members));
    }

    /// Every message sent so far.
    #[must_use]
    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.state.borrow().sent.clone()
    }

    /// Subjects of the mails in a folder, in folder order.
    #[must_use]
    pub fn subjects_in(&self, folder: &str) -> Vec<String> {
        let state = self.state.borrow();
        state.folders.get(folder).map_or_else(Vec::new, |data| {
            data.items
                .iter()
                .filter_map(|id| state.messages.get(id))
                .map(|msg| msg.subject.clone())
                .collect()
        })
    }

    /// Names of the immediate subfolders of a folder.
    #[must_use]
    pub fn sub_folder_names(&self, folder: &str) -> Vec<String> {
        let state = self.state.borrow();
        state.folders.get(folder).map_or_else(Vec::new, |data| {
            data.children
                .iter()
                .filter_map(|child| state.folders.get(child))
                .map(|child| child.name.clone())
                .collect()
        })
    }

    /// Paths of folders that currently have an item-add handler.
    #[must_use]
    pub fn monitored_folders(&self) -> Vec<String> {
        self.state
            .borrow()
            .folders
            .iter()
            .filter(|(_, data)| data.sink.is_some())
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// How many times mail items were enumerated from any folder.
    #[must_use]
    pub fn item_fetches(&self) -> usize {
        self.state.borrow().item_fetches
    }

    fn folder_handle(&self, path: &str) -> Box<dyn MailFolder> {
        Box::new(MemoryFolder {
            state: Rc::clone(&self.state),
            path: path.to_string(),
        })
    }
}

impl MailStore for MemoryStore {
    fn display_name(&self) -> String {
        self.state.borrow().display_name.clone()
    }

    fn root_folder(&self) -> StoreResult<Box<dyn MailFolder>> {
        Ok(self.folder_handle(""))
    }

    fn default_folder(&self, name: &str) -> StoreResult<Option<Box<dyn MailFolder>>> {
        let Some(well_known) = WellKnownFolder::parse(name) else {
            return Ok(None);
        };
        let path = well_known.display_name();
        if !self.state.borrow().folders.contains_key(path) {
            return Ok(None);
        }
        Ok(Some(self.folder_handle(path)))
    }

    fn new_mail_item(&self) -> StoreResult<Box<dyn MailItem>> {
        let mut state = self.state.borrow_mut();
        let sender = state.address.clone();
        let id = state.insert_message(MessageData {
            sender,
            ..MessageData::default()
        });
        Ok(Box::new(MemoryItem {
            state: Rc::clone(&self.state),
            id,
        }))
    }

    fn global_address_list(&self) -> StoreResult<Option<Box<dyn AddressBook>>> {
        Ok(Some(Box::new(MemoryAddressBook {
            state: Rc::clone(&self.state),
        })))
    }
}

struct MemoryFolder {
    state: Rc<RefCell<MemoryState>>,
    path: String,
}

impl MailFolder for MemoryFolder {
    fn name(&self) -> String {
        self.state
            .borrow()
            .folders
            .get(&self.path)
            .map(|data| data.name.clone())
            .unwrap_or_default()
    }

    fn folder_path(&self) -> String {
        self.path.clone()
    }

    fn mail_items_count(&self) -> StoreResult<usize> {
        Ok(self.state.borrow().folder(&self.path)?.items.len())
    }

    fn sub_folders_count(&self) -> StoreResult<usize> {
        Ok(self.state.borrow().folder(&self.path)?.children.len())
    }

    fn sub_folders(&self) -> StoreResult<Vec<Box<dyn MailFolder>>> {
        let state = self.state.borrow();
        Ok(state
            .folder(&self.path)?
            .children
            .iter()
            .map(|child| {
                Box::new(Self {
                    state: Rc::clone(&self.state),
                    path: child.clone(),
                }) as Box<dyn MailFolder>
            })
            .collect())
    }

    fn mail_items(
        &self,
        subject_filter: &str,
        max_count: usize,
    ) -> StoreResult<Vec<Box<dyn MailItem>>> {
        let mut state = self.state.borrow_mut();
        state.item_fetches += 1;
        let needle = subject_filter.to_lowercase();
        let folder = state.folder(&self.path)?;
        Ok(folder
            .items
            .iter()
            .filter(|id| {
                needle.is_empty()
                    || state
                        .messages
                        .get(*id)
                        .is_some_and(|msg| msg.subject.to_lowercase().contains(&needle))
            })
            .take(max_count)
            .map(|id| {
                Box::new(MemoryItem {
                    state: Rc::clone(&self.state),
                    id: *id,
                }) as Box<dyn MailItem>
            })
            .collect())
    }

    fn add_sub_folder(&self, name: &str) -> StoreResult<Box<dyn MailFolder>> {
        let path = self.state.borrow_mut().create_folder(&self.path, name)?;
        Ok(Box::new(Self {
            state: Rc::clone(&self.state),
            path,
        }))
    }

    fn delete(&self) -> StoreResult<()> {
        let is_protected = self.path.is_empty()
            || WellKnownFolder::ALL
                .iter()
                .any(|f| f.display_name() == self.path);
        if is_protected {
            return Err(StoreError::Operation(format!(
                "folder {} cannot be deleted",
                self.path
            )));
        }
        let mut state = self.state.borrow_mut();
        state.folder(&self.path)?;
        let parent = parent_path(&self.path).to_string();
        state
            .folder_mut(&parent)?
            .children
            .retain(|child| *child != self.path);
        state.remove_folder_tree(&self.path);
        Ok(())
    }

    fn register_item_add_handler(&self, sink: ItemAddSink) -> StoreResult<()> {
        self.state.borrow_mut().folder_mut(&self.path)?.sink = Some(sink);
        Ok(())
    }

    fn unregister_item_add_handler(&self) -> StoreResult<()> {
        self.state.borrow_mut().folder_mut(&self.path)?.sink = None;
        Ok(())
    }
}

struct MemoryItem {
    state: Rc<RefCell<MemoryState>>,
    id: u64,
}

impl MemoryItem {
    fn read<T>(&self, f: impl FnOnce(&MessageData) -> T) -> T {
        let state = self.state.borrow();
        match state.messages.get(&self.id) {
            Some(msg) => f(msg),
            None => f(&MessageData::default()),
        }
    }

    fn write(&self, f: impl FnOnce(&mut MessageData)) {
        if let Some(msg) = self.state.borrow_mut().messages.get_mut(&self.id) {
            f(msg);
        }
    }

    fn derive(&self, data: MessageData) -> Box<dyn MailItem> {
        let id = self.state.borrow_mut().insert_message(data);
        Box::new(Self {
            state: Rc::clone(&self.state),
            id,
        })
    }
}

impl MailItem for MemoryItem {
    fn subject(&self) -> String {
        self.read(|msg| msg.subject.clone())
    }

    fn set_subject(&mut self, subject: &str) {
        self.write(|msg| msg.subject = subject.to_string());
    }

    fn body(&self) -> String {
        self.read(|msg| msg.body.clone())
    }

    fn set_body(&mut self, body: &str) {
        self.write(|msg| msg.body = body.to_string());
    }

    fn sender_name(&self) -> String {
        self.read(|msg| msg.sender.clone())
    }

    fn add_recipient(&mut self, address: &str) -> StoreResult<()> {
        let mut state = self.state.borrow_mut();
        state.message_mut(self.id)?.recipients.push(address.to_string());
        Ok(())
    }

    fn add_attachment(&mut self, path: &Path) -> StoreResult<()> {
        if !path.is_file() {
            return Err(StoreError::NotFound(format!(
                "attachment {}",
                path.display()
            )));
        }
        let mut state = self.state.borrow_mut();
        state
            .message_mut(self.id)?
            .attachments
            .push(path.display().to_string());
        Ok(())
    }

    fn attach_item(&mut self, item: &dyn MailItem) -> StoreResult<()> {
        let name = format!("{}.msg", item.subject());
        let mut state = self.state.borrow_mut();
        state.message_mut(self.id)?.attachments.push(name);
        Ok(())
    }

    fn send(&mut self) -> StoreResult<()> {
        if !self.validate_recipients() {
            return Err(StoreError::Operation(
                "message has no valid recipients".to_string(),
            ));
        }
        let mut state = self.state.borrow_mut();
        let msg = state.message_mut(self.id)?;
        if msg.sent {
            return Err(StoreError::Operation("message was already sent".to_string()));
        }
        msg.sent = true;
        let record = SentMessage {
            subject: msg.subject.clone(),
            body: msg.body.clone(),
            recipients: msg.recipients.clone(),
            attachments: msg.attachments.clone(),
        };
        let to_self = record
            .recipients
            .iter()
            .any(|r| r.eq_ignore_ascii_case(&state.address));
        state.sent.push(record);
        state.file_into(self.id, WellKnownFolder::SentMail.display_name())?;

        if to_self {
            let mut copy = state.message(self.id)?.clone();
            copy.folder = None;
            let copy_id = state.insert_message(copy);
            state.file_into(copy_id, WellKnownFolder::Inbox.display_name())?;
        }
        Ok(())
    }

    fn delete(&self) -> StoreResult<()> {
        let mut state = self.state.borrow_mut();
        let deleted_items = WellKnownFolder::DeletedItems.display_name();
        let current = state.message(self.id)?.folder.clone();
        state.unfile(self.id)?;
        if current.as_deref() == Some(deleted_items) || current.is_none() {
            state.messages.remove(&self.id);
            Ok(())
        } else {
            state.file_into(self.id, deleted_items)
        }
    }

    fn move_to(&self, destination: &dyn MailFolder) -> StoreResult<()> {
        let path = destination.folder_path();
        let mut state = self.state.borrow_mut();
        state.folder(&path)?;
        state.unfile(self.id)?;
        state.file_into(self.id, &path)
    }

    fn reply(&self, reply_all: bool) -> StoreResult<Box<dyn MailItem>> {
        let (original, own_address) = {
            let state = self.state.borrow();
            (state.message(self.id)?.clone(), state.address.clone())
        };
        let mut recipients = vec![original.sender.clone()];
        if reply_all {
            recipients.extend(
                original
                    .recipients
                    .iter()
                    .filter(|r| !r.eq_ignore_ascii_case(&own_address))
                    .cloned(),
            );
        }
        Ok(self.derive(MessageData {
            subject: format!("RE: {}", original.subject),
            body: format!("\n\n{}", original.body),
            sender: own_address,
            recipients,
            ..MessageData::default()
        }))
    }

    fn forward(&self) -> StoreResult<Box<dyn MailItem>> {
        let (original, own_address) = {
            let state = self.state.borrow();
            (state.message(self.id)?.clone(), state.address.clone())
        };
        Ok(self.derive(MessageData {
            subject: format!("FW: {}", original.subject),
            body: format!("\n\n{}", original.body),
            sender: own_address,
            attachments: original.attachments,
            ..MessageData::default()
        }))
    }

    fn validate_recipients(&self) -> bool {
        self.read(|msg| {
            !msg.recipients.is_empty()
                && msg
                    .recipients
                    .iter()
                    .all(|r| r.contains('@') && !r.trim().is_empty())
        })
    }
}

struct MemoryAddressBook {
    state: Rc<RefCell<MemoryState>>,
}

impl AddressBook for MemoryAddressBook {
    fn users(&self, filter: Option<&str>, max_count: usize) -> StoreResult<Vec<String>> {
        let needle = filter.map(str::to_lowercase);
        Ok(self
            .state
            .borrow()
            .users
            .iter()
            .filter(|user| {
                needle.as_ref().is_none_or(|n| {
                    user.name.to_lowercase().contains(n) || user.address.to_lowercase().contains(n)
                })
            })
            .take(max_count)
            .map(|user| user.address.clone())
            .collect())
    }

    fn dl_members(&self, list_name: &str, max_count: usize) -> StoreResult<Vec<String>> {
        Ok(self
            .state
            .borrow()
            .distribution_lists
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(list_name))
            .map(|(_, members)| members.iter().take(max_count).cloned().collect())
            .unwrap_or_default())
    }
}

#[derive(Debug, Deserialize)]
struct Fixture {
    display_name: String,
    address: String,
    #[serde(default)]
    folders: Vec<FixtureFolder>,
    #[serde(default)]
    users: Vec<FixtureUser>,
    #[serde(default)]
    distribution_lists: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct FixtureFolder {
    path: String,
    #[serde(default)]
    mails: Vec<FixtureMail>,
}

#[derive(Debug, Deserialize)]
struct FixtureMail {
    subject: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    sender: String,
}

#[derive(Debug, Deserialize)]
struct FixtureUser {
    name: String,
    address: String,
}
