//! Local Maildir++ mailbox.
//!
//! The root directory is `INBOX`; every other folder `INBOX.A.B` lives in
//! the root as a `.A.B` subdirectory. Messages are files in `cur/` and
//! `new/`, named `<unique>:2,<flags>`. The unique part is the message id.
//!
//! A move copies the file into the target's `cur/` and adds the `T`
//! (trashed) flag to the source. Expunge deletes `T`-flagged files.

use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::TransportError;
use crate::model::{FolderInfo, Message};
use crate::parser::parse_message;

use super::{FetchFilter, Transport};

const INBOX: &str = "INBOX";
const DELIMITER: &str = ".";
const TRASHED: char = 'T';
const SUBSCRIPTIONS: &str = "subscriptions";

/// A Maildir++ tree on the local filesystem.
#[derive(Debug, Clone)]
pub struct MaildirTransport {
    root: PathBuf,
}

impl MaildirTransport {
    /// Open an existing Maildir. The root must contain `cur/`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, TransportError> {
        let root = root.into();
        if !root.join("cur").is_dir() {
            return Err(TransportError::not_found(root.display().to_string()));
        }
        Ok(Self { root })
    }

    /// Create the root layout if missing, then open it.
    pub fn init(root: impl Into<PathBuf>) -> Result<Self, TransportError> {
        let root = root.into();
        make_layout(&root).map_err(|e| TransportError::from_io(INBOX, &e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store a raw message in `folder`'s `new/` and return its id.
    pub fn deliver(&mut self, folder: &str, unique: &str, raw: &[u8]) -> Result<String, TransportError> {
        let dir = self.existing_dir(folder)?;
        let path = dir.join("new").join(unique);
        fs::write(&path, raw).map_err(|e| TransportError::from_io(folder, &e))?;
        Ok(unique.to_string())
    }

    fn folder_dir(&self, name: &str) -> Option<PathBuf> {
        if name.eq_ignore_ascii_case(INBOX) {
            return Some(self.root.clone());
        }
        let rest = name.strip_prefix(INBOX)?.strip_prefix(DELIMITER)?;
        if rest.is_empty() || rest.contains('/') {
            return None;
        }
        Some(self.root.join(format!(".{rest}")))
    }

    fn existing_dir(&self, name: &str) -> Result<PathBuf, TransportError> {
        match self.folder_dir(name) {
            Some(dir) if dir.join("cur").is_dir() => Ok(dir),
            _ => Err(TransportError::not_found(name)),
        }
    }

    /// Subfolder directory names, without the leading dot, sorted.
    fn subfolder_names(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(rest) = name.strip_prefix('.') {
                if !rest.is_empty() && rest != "." && entry.path().join("cur").is_dir() {
                    names.push(rest.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn find_message(&self, folder: &str, id: &str) -> Result<PathBuf, TransportError> {
        let dir = self.existing_dir(folder)?;
        let files = message_files(&dir).map_err(|e| TransportError::from_io(folder, &e))?;
        files
            .into_iter()
            .find(|p| unique_part(p) == id && !has_flag(p, TRASHED))
            .ok_or_else(|| TransportError::not_found(format!("{folder}/{id}")))
    }

    fn subscriptions_path(&self) -> PathBuf {
        self.root.join(SUBSCRIPTIONS)
    }

    fn read_subscriptions(&self) -> io::Result<Vec<String>> {
        match fs::read_to_string(self.subscriptions_path()) {
            Ok(s) => Ok(s.lines().map(str::to_string).filter(|l| !l.is_empty()).collect()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn write_subscriptions(&self, lines: &[String]) -> io::Result<()> {
        let mut content = lines.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        fs::write(self.subscriptions_path(), content)
    }

    /// Subscription entries are folder names without the `INBOX.` prefix.
    fn subscription_entry(name: &str) -> String {
        name.strip_prefix(INBOX)
            .and_then(|r| r.strip_prefix(DELIMITER))
            .unwrap_or(name)
            .to_string()
    }
}

impl Transport for MaildirTransport {
    fn session_id(&self) -> u64 {
        0
    }

    fn hierarchy_delimiter(&mut self) -> Result<String, TransportError> {
        Ok(DELIMITER.to_string())
    }

    fn list_folders(&mut self) -> Result<Vec<FolderInfo>, TransportError> {
        let io_err = |e: io::Error| TransportError::from_io(INBOX, &e);
        let mut folders = vec![FolderInfo {
            name: INBOX.to_string(),
            message_count: live_count(&self.root).map_err(io_err)?,
        }];
        for sub in self.subfolder_names().map_err(io_err)? {
            let dir = self.root.join(format!(".{sub}"));
            folders.push(FolderInfo {
                name: format!("{INBOX}{DELIMITER}{sub}"),
                message_count: live_count(&dir).map_err(io_err)?,
            });
        }
        Ok(folders)
    }

    fn fetch(&mut self, folder: &str, filter: &FetchFilter) -> Result<Vec<Message>, TransportError> {
        let dir = self.existing_dir(folder)?;
        let io_err = |e: io::Error| TransportError::from_io(folder, &e);
        let mut messages = Vec::new();
        for path in message_files(&dir).map_err(io_err)? {
            if has_flag(&path, TRASHED) {
                continue;
            }
            let raw = fs::read(&path).map_err(io_err)?;
            let mut message = parse_message(&raw, unique_part(&path), folder);
            if message.received == DateTime::UNIX_EPOCH {
                if let Ok(modified) = fs::metadata(&path).and_then(|m| m.modified()) {
                    message.received = DateTime::<Utc>::from(modified);
                }
            }
            messages.push(message);
        }
        debug!(folder, count = messages.len(), "Read maildir folder");
        Ok(filter.apply(messages))
    }

    fn create_folder(&mut self, name: &str) -> Result<(), TransportError> {
        let dir = self
            .folder_dir(name)
            .ok_or_else(|| TransportError::rejected(name, "not a Maildir++ folder name"))?;
        if dir.join("cur").is_dir() {
            return Err(TransportError::already_exists(name));
        }
        make_layout(&dir).map_err(|e| TransportError::from_io(name, &e))?;
        fs::write(dir.join("maildirfolder"), b"").map_err(|e| TransportError::from_io(name, &e))
    }

    fn subscribe(&mut self, name: &str) -> Result<(), TransportError> {
        self.existing_dir(name)?;
        let entry = Self::subscription_entry(name);
        let current = self
            .read_subscriptions()
            .map_err(|e| TransportError::from_io(name, &e))?;
        if current.contains(&entry) {
            return Ok(());
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.subscriptions_path())
            .map_err(|e| TransportError::from_io(name, &e))?;
        writeln!(file, "{entry}").map_err(|e| TransportError::from_io(name, &e))
    }

    fn rename_folder(&mut self, from: &str, to: &str) -> Result<(), TransportError> {
        if from.eq_ignore_ascii_case(INBOX) {
            return Err(TransportError::rejected(from, "INBOX cannot be renamed"));
        }
        self.existing_dir(from)?;
        let target = self
            .folder_dir(to)
            .ok_or_else(|| TransportError::rejected(to, "not a Maildir++ folder name"))?;
        if target.exists() {
            return Err(TransportError::already_exists(to));
        }

        let old = Self::subscription_entry(from);
        let new = Self::subscription_entry(to);
        let child_prefix = format!("{old}{DELIMITER}");
        let io_err = |e: io::Error| TransportError::from_io(from, &e);

        for sub in self.subfolder_names().map_err(io_err)? {
            let renamed = if sub == old {
                new.clone()
            } else if let Some(rest) = sub.strip_prefix(&child_prefix) {
                format!("{new}{DELIMITER}{rest}")
            } else {
                continue;
            };
            fs::rename(
                self.root.join(format!(".{sub}")),
                self.root.join(format!(".{renamed}")),
            )
            .map_err(io_err)?;
        }

        let subs: Vec<String> = self
            .read_subscriptions()
            .map_err(io_err)?
            .into_iter()
            .map(|s| {
                if s == old {
                    new.clone()
                } else if let Some(rest) = s.strip_prefix(&child_prefix) {
                    format!("{new}{DELIMITER}{rest}")
                } else {
                    s
                }
            })
            .collect();
        self.write_subscriptions(&subs).map_err(io_err)
    }

    fn delete_folder(&mut self, name: &str) -> Result<(), TransportError> {
        if name.eq_ignore_ascii_case(INBOX) {
            return Err(TransportError::rejected(name, "INBOX cannot be deleted"));
        }
        let dir = self.existing_dir(name)?;
        let entry = Self::subscription_entry(name);
        let child_prefix = format!("{entry}{DELIMITER}");
        let io_err = |e: io::Error| TransportError::from_io(name, &e);
        if self
            .subfolder_names()
            .map_err(io_err)?
            .iter()
            .any(|s| s.starts_with(&child_prefix))
        {
            return Err(TransportError::rejected(name, "folder has children"));
        }
        fs::remove_dir_all(&dir).map_err(io_err)?;

        let subs: Vec<String> = self
            .read_subscriptions()
            .map_err(io_err)?
            .into_iter()
            .filter(|s| *s != entry)
            .collect();
        self.write_subscriptions(&subs).map_err(io_err)
    }

    fn move_message(&mut self, id: &str, source: &str, target: &str) -> Result<(), TransportError> {
        let target_dir = self.existing_dir(target)?;
        let path = self.find_message(source, id)?;
        let file_name = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .ok_or_else(|| TransportError::not_found(format!("{source}/{id}")))?;
        let dest_name = if file_name.contains(":2,") {
            file_name
        } else {
            format!("{file_name}:2,")
        };
        fs::copy(&path, target_dir.join("cur").join(dest_name))
            .map_err(|e| TransportError::from_io(target, &e))?;
        set_flag(&path, TRASHED).map_err(|e| TransportError::from_io(source, &e))?;
        Ok(())
    }

    fn expunge(&mut self, folder: &str) -> Result<(), TransportError> {
        let dir = self.existing_dir(folder)?;
        let io_err = |e: io::Error| TransportError::from_io(folder, &e);
        let mut removed = 0usize;
        for path in message_files(&dir).map_err(io_err)? {
            if has_flag(&path, TRASHED) {
                fs::remove_file(&path).map_err(io_err)?;
                removed += 1;
            }
        }
        debug!(folder, removed, "Expunged");
        Ok(())
    }
}

fn make_layout(dir: &Path) -> io::Result<()> {
    for sub in ["cur", "new", "tmp"] {
        fs::create_dir_all(dir.join(sub))?;
    }
    Ok(())
}

/// Files in `cur/` and `new/`, sorted by path.
fn message_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for sub in ["cur", "new"] {
        let path = dir.join(sub);
        if !path.is_dir() {
            continue;
        }
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.path());
            }
        }
    }
    files.sort();
    Ok(files)
}

fn live_count(dir: &Path) -> io::Result<usize> {
    Ok(message_files(dir)?
        .iter()
        .filter(|p| !has_flag(p, TRASHED))
        .count())
}

fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|f| f.to_str()).unwrap_or_default()
}

fn unique_part(path: &Path) -> &str {
    let name = file_name(path);
    name.split_once(':').map_or(name, |(unique, _)| unique)
}

fn has_flag(path: &Path, flag: char) -> bool {
    file_name(path)
        .rsplit_once(":2,")
        .is_some_and(|(_, flags)| flags.contains(flag))
}

/// Add `flag` to the file's info suffix, keeping flags sorted.
fn set_flag(path: &Path, flag: char) -> io::Result<PathBuf> {
    let name = file_name(path);
    let (base, flags) = match name.rsplit_once(":2,") {
        Some((base, flags)) => (base, flags),
        None => (name, ""),
    };
    let mut chars: Vec<char> = flags.chars().collect();
    if !chars.contains(&flag) {
        chars.push(flag);
    }
    chars.sort_unstable();
    let new_name = format!("{base}:2,{}", chars.into_iter().collect::<String>());
    let new_path = path.with_file_name(new_name);
    fs::rename(path, &new_path)?;
    Ok(new_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportErrorKind;

    const RAW: &[u8] = b"From: Billing <billing@shop.example>\r\n\
Subject: Invoice 42\r\n\
Date: Mon, 4 Mar 2024 10:00:00 +0000\r\n\
Message-ID: <inv42@shop.example>\r\n\
\r\n\
Your invoice is attached.\r\n";

    fn mailbox() -> (tempfile::TempDir, MaildirTransport) {
        let dir = tempfile::tempdir().unwrap();
        let t = MaildirTransport::init(dir.path()).unwrap();
        (dir, t)
    }

    #[test]
    fn test_open_requires_layout() {
        let dir = tempfile::tempdir().unwrap();
        assert!(MaildirTransport::open(dir.path()).is_err());
        MaildirTransport::init(dir.path()).unwrap();
        assert!(MaildirTransport::open(dir.path()).is_ok());
    }

    #[test]
    fn test_list_and_fetch() {
        let (_dir, mut t) = mailbox();
        t.deliver("INBOX", "1700000000.1.host", RAW).unwrap();
        t.create_folder("INBOX.Archive").unwrap();

        let folders = t.list_folders().unwrap();
        assert_eq!(folders.len(), 2);
        assert_eq!(folders[0].name, "INBOX");
        assert_eq!(folders[0].message_count, 1);
        assert_eq!(folders[1].name, "INBOX.Archive");

        let msgs = t.fetch("INBOX", &FetchFilter::latest(10)).unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].id, "1700000000.1.host");
        assert_eq!(msgs[0].subject, "Invoice 42");
        assert_eq!(msgs[0].folder, "INBOX");
    }

    #[test]
    fn test_create_existing_folder() {
        let (dir, mut t) = mailbox();
        t.create_folder("INBOX.A").unwrap();
        assert!(dir.path().join(".A").join("maildirfolder").exists());
        assert_eq!(
            t.create_folder("INBOX.A").unwrap_err().kind,
            TransportErrorKind::AlreadyExists
        );
        assert_eq!(
            t.create_folder("Elsewhere").unwrap_err().kind,
            TransportErrorKind::Rejected
        );
    }

    #[test]
    fn test_move_marks_source_then_expunge() {
        let (_dir, mut t) = mailbox();
        t.deliver("INBOX", "m1", RAW).unwrap();
        t.create_folder("INBOX.Bills").unwrap();

        t.move_message("m1", "INBOX", "INBOX.Bills").unwrap();
        assert_eq!(t.list_folders().unwrap()[0].message_count, 0);
        assert_eq!(message_files(t.root()).unwrap().len(), 1);

        let moved = t.fetch("INBOX.Bills", &FetchFilter::latest(10)).unwrap();
        assert_eq!(moved[0].id, "m1");

        t.expunge("INBOX").unwrap();
        assert!(message_files(t.root()).unwrap().is_empty());
    }

    #[test]
    fn test_move_missing_message() {
        let (_dir, mut t) = mailbox();
        t.create_folder("INBOX.A").unwrap();
        assert_eq!(
            t.move_message("nope", "INBOX", "INBOX.A").unwrap_err().kind,
            TransportErrorKind::NotFound
        );
    }

    #[test]
    fn test_rename_with_children_and_subscriptions() {
        let (dir, mut t) = mailbox();
        t.create_folder("INBOX.Category_Bills & Co").unwrap();
        t.create_folder("INBOX.Category_Bills & Co.2024").unwrap();
        t.subscribe("INBOX.Category_Bills & Co").unwrap();

        t.rename_folder("INBOX.Category_Bills & Co", "INBOX.Category_Bills_Co")
            .unwrap();
        let names: Vec<String> = t.list_folders().unwrap().into_iter().map(|f| f.name).collect();
        assert_eq!(
            names,
            vec!["INBOX", "INBOX.Category_Bills_Co", "INBOX.Category_Bills_Co.2024"]
        );
        let subs = fs::read_to_string(dir.path().join(SUBSCRIPTIONS)).unwrap();
        assert_eq!(subs, "Category_Bills_Co\n");
    }

    #[test]
    fn test_delete_rules() {
        let (_dir, mut t) = mailbox();
        t.create_folder("INBOX.A").unwrap();
        t.create_folder("INBOX.A.B").unwrap();
        assert_eq!(t.delete_folder("INBOX.A").unwrap_err().kind, TransportErrorKind::Rejected);
        assert_eq!(t.delete_folder("INBOX").unwrap_err().kind, TransportErrorKind::Rejected);
        t.delete_folder("INBOX.A.B").unwrap();
        t.delete_folder("INBOX.A").unwrap();
        assert_eq!(t.list_folders().unwrap().len(), 1);
    }

    #[test]
    fn test_subscribe_is_idempotent() {
        let (dir, mut t) = mailbox();
        t.create_folder("INBOX.SPAM").unwrap();
        t.subscribe("INBOX.SPAM").unwrap();
        t.subscribe("INBOX.SPAM").unwrap();
        let subs = fs::read_to_string(dir.path().join(SUBSCRIPTIONS)).unwrap();
        assert_eq!(subs, "SPAM\n");
    }

    #[test]
    fn test_set_flag_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x:2,S");
        fs::write(&path, b"").unwrap();
        let new = set_flag(&path, 'F').unwrap();
        assert_eq!(file_name(&new), "x:2,FS");
        assert!(!has_flag(&new, TRASHED));
    }
}
