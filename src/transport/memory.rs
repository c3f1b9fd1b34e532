//! In-memory mailbox.
//!
//! Records every call it receives and can be told to fail specific
//! operations, which makes it the transport of choice for exercising the
//! executor's failure handling.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{TransportError, TransportErrorKind};
use crate::model::{FolderInfo, Message};

use super::{FetchFilter, Transport};

/// Transport operations, for call logs and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operation {
    Delimiter,
    ListFolders,
    Fetch,
    CreateFolder,
    Subscribe,
    RenameFolder,
    DeleteFolder,
    Move,
    Expunge,
}

/// One recorded call. `key` is the folder, or the message id for moves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub operation: Operation,
    pub key: String,
}

impl Call {
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// `true` for calls that change the mailbox.
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self.operation,
            Operation::Delimiter | Operation::ListFolders | Operation::Fetch
        )
    }
}

#[derive(Debug, Clone)]
struct Stored {
    message: Message,
    deleted: bool,
}

/// A mailbox held entirely in memory.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    delimiter: String,
    session: u64,
    folders: BTreeMap<String, Vec<Stored>>,
    subscriptions: BTreeSet<String>,
    failures: BTreeMap<(Operation, String), TransportErrorKind>,
    calls: Vec<Call>,
}

impl MemoryTransport {
    pub fn new(delimiter: &str) -> Self {
        Self {
            delimiter: delimiter.to_string(),
            session: 1,
            folders: BTreeMap::new(),
            subscriptions: BTreeSet::new(),
            failures: BTreeMap::new(),
            calls: Vec::new(),
        }
    }

    // ── Setup (not recorded) ────────────────────────────────────

    pub fn add_folder(&mut self, name: &str) {
        self.folders.entry(name.to_string()).or_default();
    }

    /// Store `message` in `folder`, creating the folder if needed.
    pub fn add_message(&mut self, folder: &str, mut message: Message) {
        message.folder = folder.to_string();
        self.folders.entry(folder.to_string()).or_default().push(Stored {
            message,
            deleted: false,
        });
    }

    /// Make `operation` on `key` fail with `kind` from now on.
    pub fn fail_on(&mut self, operation: Operation, key: &str, kind: TransportErrorKind) {
        self.failures.insert((operation, key.to_string()), kind);
    }

    /// Simulate a dropped and re-established connection.
    pub fn reconnect(&mut self) {
        self.session += 1;
    }

    pub fn set_delimiter(&mut self, delimiter: &str) {
        self.delimiter = delimiter.to_string();
    }

    // ── Inspection ──────────────────────────────────────────────

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn delimiter_lookups(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| c.operation == Operation::Delimiter)
            .count()
    }

    pub fn has_folder(&self, name: &str) -> bool {
        self.folders.contains_key(name)
    }

    pub fn folder_names(&self) -> Vec<&str> {
        self.folders.keys().map(String::as_str).collect()
    }

    pub fn is_subscribed(&self, name: &str) -> bool {
        self.subscriptions.contains(name)
    }

    /// Messages in `folder` not marked deleted.
    pub fn live_messages(&self, folder: &str) -> Vec<&Message> {
        self.folders
            .get(folder)
            .map(|msgs| msgs.iter().filter(|s| !s.deleted).map(|s| &s.message).collect())
            .unwrap_or_default()
    }

    // ── Internals ───────────────────────────────────────────────

    fn record(&mut self, operation: Operation, key: &str) -> Result<(), TransportError> {
        self.calls.push(Call {
            operation,
            key: key.to_string(),
        });
        match self.failures.get(&(operation, key.to_string())) {
            Some(&kind) => Err(TransportError::new(kind, key, "injected failure")),
            None => Ok(()),
        }
    }

    fn child_prefix(&self, name: &str) -> String {
        format!("{name}{}", self.delimiter)
    }

    fn has_children(&self, name: &str) -> bool {
        let prefix = self.child_prefix(name);
        self.folders.keys().any(|f| f.starts_with(&prefix))
    }
}

impl Transport for MemoryTransport {
    fn session_id(&self) -> u64 {
        self.session
    }

    fn hierarchy_delimiter(&mut self) -> Result<String, TransportError> {
        self.record(Operation::Delimiter, "")?;
        Ok(self.delimiter.clone())
    }

    fn list_folders(&mut self) -> Result<Vec<FolderInfo>, TransportError> {
        self.record(Operation::ListFolders, "")?;
        Ok(self
            .folders
            .iter()
            .map(|(name, msgs)| FolderInfo {
                name: name.clone(),
                message_count: msgs.iter().filter(|s| !s.deleted).count(),
            })
            .collect())
    }

    fn fetch(&mut self, folder: &str, filter: &FetchFilter) -> Result<Vec<Message>, TransportError> {
        self.record(Operation::Fetch, folder)?;
        let msgs = self
            .folders
            .get(folder)
            .ok_or_else(|| TransportError::not_found(folder))?;
        let live = msgs
            .iter()
            .filter(|s| !s.deleted)
            .map(|s| s.message.clone())
            .collect();
        Ok(filter.apply(live))
    }

    fn create_folder(&mut self, name: &str) -> Result<(), TransportError> {
        self.record(Operation::CreateFolder, name)?;
        if self.folders.contains_key(name) {
            return Err(TransportError::already_exists(name));
        }
        self.folders.insert(name.to_string(), Vec::new());
        Ok(())
    }

    fn subscribe(&mut self, name: &str) -> Result<(), TransportError> {
        self.record(Operation::Subscribe, name)?;
        if !self.folders.contains_key(name) {
            return Err(TransportError::not_found(name));
        }
        self.subscriptions.insert(name.to_string());
        Ok(())
    }

    fn rename_folder(&mut self, from: &str, to: &str) -> Result<(), TransportError> {
        self.record(Operation::RenameFolder, from)?;
        if !self.folders.contains_key(from) {
            return Err(TransportError::not_found(from));
        }
        if self.folders.contains_key(to) {
            return Err(TransportError::already_exists(to));
        }
        let prefix = self.child_prefix(from);
        let moving: Vec<String> = self
            .folders
            .keys()
            .filter(|f| f.as_str() == from || f.starts_with(&prefix))
            .cloned()
            .collect();
        for old in moving {
            let new = format!("{to}{}", &old[from.len()..]);
            if let Some(mut msgs) = self.folders.remove(&old) {
                for s in &mut msgs {
                    s.message.folder = new.clone();
                }
                self.folders.insert(new.clone(), msgs);
            }
            if self.subscriptions.remove(&old) {
                self.subscriptions.insert(new);
            }
        }
        Ok(())
    }

    fn delete_folder(&mut self, name: &str) -> Result<(), TransportError> {
        self.record(Operation::DeleteFolder, name)?;
        if !self.folders.contains_key(name) {
            return Err(TransportError::not_found(name));
        }
        if self.has_children(name) {
            return Err(TransportError::rejected(name, "folder has children"));
        }
        self.folders.remove(name);
        self.subscriptions.remove(name);
        Ok(())
    }

    fn move_message(&mut self, id: &str, source: &str, target: &str) -> Result<(), TransportError> {
        self.record(Operation::Move, id)?;
        if !self.folders.contains_key(target) {
            return Err(TransportError::not_found(target));
        }
        let stored = self
            .folders
            .get_mut(source)
            .and_then(|msgs| msgs.iter_mut().find(|s| s.message.id == id && !s.deleted))
            .ok_or_else(|| TransportError::not_found(source))?;
        stored.deleted = true;
        let copy = stored.message.clone();
        self.add_message(target, copy);
        Ok(())
    }

    fn expunge(&mut self, folder: &str) -> Result<(), TransportError> {
        self.record(Operation::Expunge, folder)?;
        let msgs = self
            .folders
            .get_mut(folder)
            .ok_or_else(|| TransportError::not_found(folder))?;
        msgs.retain(|s| !s.deleted);
        Ok(())
    }
}
