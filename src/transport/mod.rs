//! Mailbox access.
//!
//! The pipeline only sees a mailbox through [`Transport`]. Reading the
//! state a run needs happens once, up front, in [`collect_snapshot`].

pub mod maildir;
pub mod memory;

use std::collections::HashSet;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Result, TransportError};
use crate::model::{CategoryFolder, FolderInfo, FolderListing, Message};
use crate::organize::conversation::{collect_ids, history_folders};
use crate::organize::naming::{is_category_folder, reference_folders};
use crate::organize::MailboxSnapshot;

/// Which messages a fetch returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchFilter {
    /// Keep at most this many, the most recent ones.
    pub limit: usize,
    /// Keep only messages received on or after this day (UTC).
    pub since: Option<NaiveDate>,
}

impl FetchFilter {
    pub fn latest(limit: usize) -> Self {
        Self { limit, since: None }
    }

    /// Filter for the folder being triaged. `since_date` wins over `since_days`.
    pub fn from_config(config: &Config, today: NaiveDate) -> Result<Self> {
        let since = match config.since_date()? {
            Some(date) => Some(date),
            None => config
                .fetch
                .since_days
                .map(|days| today - Duration::days(i64::from(days))),
        };
        Ok(Self {
            limit: config.fetch.limit,
            since,
        })
    }

    /// Apply to an unordered batch. The result is ordered oldest first
    /// (ties by id) and holds the `limit` most recent matches.
    pub fn apply(&self, mut messages: Vec<Message>) -> Vec<Message> {
        if let Some(since) = self.since {
            messages.retain(|m| m.received.date_naive() >= since);
        }
        messages.sort_by(|a, b| a.received.cmp(&b.received).then_with(|| a.id.cmp(&b.id)));
        let excess = messages.len().saturating_sub(self.limit);
        messages.drain(..excess);
        messages
    }
}

/// A mailbox session.
///
/// Mutating methods are only ever called by the executor on a live run.
pub trait Transport {
    /// Identifies the current connection; changes after a reconnect.
    fn session_id(&self) -> u64;

    /// The hierarchy separator used in folder names.
    fn hierarchy_delimiter(&mut self) -> std::result::Result<String, TransportError>;

    fn list_folders(&mut self) -> std::result::Result<Vec<FolderInfo>, TransportError>;

    fn fetch(
        &mut self,
        folder: &str,
        filter: &FetchFilter,
    ) -> std::result::Result<Vec<Message>, TransportError>;

    /// Fails with `AlreadyExists` if the folder is already there.
    fn create_folder(&mut self, name: &str) -> std::result::Result<(), TransportError>;

    fn subscribe(&mut self, name: &str) -> std::result::Result<(), TransportError>;

    fn rename_folder(&mut self, from: &str, to: &str) -> std::result::Result<(), TransportError>;

    fn delete_folder(&mut self, name: &str) -> std::result::Result<(), TransportError>;

    /// Copy the message to `target` and mark the original deleted. The
    /// original is only removed by [`Transport::expunge`].
    fn move_message(
        &mut self,
        id: &str,
        source: &str,
        target: &str,
    ) -> std::result::Result<(), TransportError>;

    /// Permanently remove messages marked deleted in `folder`.
    fn expunge(&mut self, folder: &str) -> std::result::Result<(), TransportError>;
}

/// Remembers the hierarchy delimiter for the session it was read in.
///
/// A long-lived process that reconnects gets a new session id, and the
/// delimiter is read again.
#[derive(Debug, Default)]
pub struct DelimiterCache {
    cached: Option<(u64, String)>,
}

impl DelimiterCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, transport: &mut dyn Transport) -> std::result::Result<String, TransportError> {
        let session = transport.session_id();
        if let Some((id, delim)) = &self.cached {
            if *id == session {
                return Ok(delim.clone());
            }
        }
        let delim = transport.hierarchy_delimiter()?;
        debug!(session, delimiter = %delim, "Resolved hierarchy delimiter");
        self.cached = Some((session, delim.clone()));
        Ok(delim)
    }
}

/// Read everything a run needs: the messages to triage and the
/// surrounding mailbox state.
///
/// Failure to read the triaged folder or the folder list is an error.
/// Unreadable reference, category, or Sent/Drafts folders are logged and
/// treated as empty.
pub fn collect_snapshot(
    transport: &mut dyn Transport,
    delimiters: &mut DelimiterCache,
    config: &Config,
    now: DateTime<Utc>,
) -> Result<(Vec<Message>, MailboxSnapshot)> {
    let delimiter = delimiters.get(transport)?;
    let listing = FolderListing {
        delimiter,
        folders: transport.list_folders()?,
    };

    let filter = FetchFilter::from_config(config, now.date_naive())?;
    let messages = transport.fetch(&config.fetch.folder, &filter)?;
    info!(folder = %config.fetch.folder, count = messages.len(), "Fetched messages");

    let mut snapshot = MailboxSnapshot::new(listing.clone());

    for name in listing.names().filter(|n| is_category_folder(n, &listing)) {
        let samples = read_or_empty(
            transport,
            name,
            &FetchFilter::latest(config.category.sample_limit),
        );
        snapshot.categories.push(CategoryFolder {
            name: name.to_string(),
            message_count: listing.get(name).map_or(0, |f| f.message_count),
            samples,
        });
    }

    for name in reference_folders(&listing) {
        if name == config.fetch.folder {
            continue;
        }
        let refs = read_or_empty(
            transport,
            &name,
            &FetchFilter::latest(config.spam.cross_sample_limit),
        );
        snapshot.spam_references.extend(refs);
    }

    if config.conversation.enabled {
        let since = now.date_naive() - Duration::days(i64::from(config.conversation.history_days));
        let filter = FetchFilter {
            limit: config.conversation.history_limit,
            since: Some(since),
        };
        let mut ids: HashSet<String> = HashSet::new();
        for name in history_folders(&listing) {
            ids.extend(collect_ids(&read_or_empty(transport, &name, &filter)));
        }
        snapshot.history_ids = ids;
    }

    debug!(
        categories = snapshot.categories.len(),
        references = snapshot.spam_references.len(),
        history_ids = snapshot.history_ids.len(),
        "Snapshot collected"
    );
    Ok((messages, snapshot))
}

fn read_or_empty(transport: &mut dyn Transport, folder: &str, filter: &FetchFilter) -> Vec<Message> {
    match transport.fetch(folder, filter) {
        Ok(messages) => messages,
        Err(e) => {
            warn!(folder = %folder, error = %e, "Could not read folder; treating as empty");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use memory::MemoryTransport;

    fn at(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_filter_limit_keeps_most_recent() {
        let msgs: Vec<Message> = (1..=5)
            .map(|d| Message::new(format!("m{d}"), "INBOX").with_received(at(d)))
            .collect();
        let out = FetchFilter::latest(2).apply(msgs);
        let ids: Vec<&str> = out.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m4", "m5"]);
    }

    #[test]
    fn test_filter_since() {
        let msgs: Vec<Message> = (1..=5)
            .map(|d| Message::new(format!("m{d}"), "INBOX").with_received(at(d)))
            .collect();
        let filter = FetchFilter {
            limit: 100,
            since: NaiveDate::from_ymd_opt(2024, 3, 4),
        };
        assert_eq!(filter.apply(msgs).len(), 2);
    }

    #[test]
    fn test_filter_from_config() {
        let mut cfg = Config::default();
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        assert_eq!(
            FetchFilter::from_config(&cfg, today).unwrap().since,
            NaiveDate::from_ymd_opt(2024, 3, 3)
        );
        cfg.fetch.since_date = Some("2024-01-01".into());
        assert_eq!(
            FetchFilter::from_config(&cfg, today).unwrap().since,
            NaiveDate::from_ymd_opt(2024, 1, 1)
        );
        cfg.fetch.since_date = None;
        cfg.fetch.since_days = None;
        assert_eq!(FetchFilter::from_config(&cfg, today).unwrap().since, None);
    }

    #[test]
    fn test_delimiter_cached_per_session() {
        let mut t = MemoryTransport::new("/");
        let mut cache = DelimiterCache::new();
        assert_eq!(cache.get(&mut t).unwrap(), "/");
        assert_eq!(cache.get(&mut t).unwrap(), "/");
        assert_eq!(t.delimiter_lookups(), 1);

        t.reconnect();
        t.set_delimiter(".");
        assert_eq!(cache.get(&mut t).unwrap(), ".");
        assert_eq!(t.delimiter_lookups(), 2);
    }

    #[test]
    fn test_collect_snapshot() {
        let mut t = MemoryTransport::new(".");
        for f in ["INBOX", "INBOX.Category_Bills", "INBOX.Spam", "Sent"] {
            t.add_folder(f);
        }
        t.add_message("INBOX", Message::new("1", "INBOX").with_received(at(9)));
        t.add_message("INBOX", Message::new("old", "INBOX").with_received(at(1)));
        t.add_message(
            "INBOX.Category_Bills",
            Message::new("c1", "INBOX.Category_Bills").with_received(at(5)),
        );
        t.add_message("INBOX.Spam", Message::new("s1", "INBOX.Spam").with_received(at(5)));
        t.add_message(
            "Sent",
            Message::new("x1", "Sent")
                .with_message_id("<mine@me.example>")
                .with_received(at(8)),
        );

        let mut cache = DelimiterCache::new();
        let (messages, snap) =
            collect_snapshot(&mut t, &mut cache, &Config::default(), at(10)).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "1");
        assert_eq!(snap.categories.len(), 1);
        assert_eq!(snap.categories[0].samples.len(), 1);
        assert_eq!(snap.spam_references.len(), 1);
        assert!(snap.history_ids.contains("mine@me.example"));
        assert!(t.calls().iter().all(|c| !c.is_mutation()));
    }

    #[test]
    fn test_unreadable_reference_folder_is_empty() {
        let mut t = MemoryTransport::new(".");
        t.add_folder("INBOX");
        t.add_folder("Trash");
        t.fail_on(
            memory::Operation::Fetch,
            "Trash",
            crate::error::TransportErrorKind::Rejected,
        );
        let mut cache = DelimiterCache::new();
        let (_, snap) = collect_snapshot(&mut t, &mut cache, &Config::default(), at(10)).unwrap();
        assert!(snap.spam_references.is_empty());
    }

    #[test]
    fn test_category_folders_are_only_categories() {
        let mut t = MemoryTransport::new(".");
        t.add_folder("INBOX");
        t.add_message(
            "INBOX.Category_Cabin",
            Message::new("c1", "INBOX.Category_Cabin").with_received(at(8)),
        );
        t.add_message(
            "INBOX.Category_Presentation",
            Message::new("p1", "INBOX.Category_Presentation")
                .with_message_id("<deck@them.example>")
                .with_received(at(8)),
        );

        let mut cache = DelimiterCache::new();
        let (_, snap) = collect_snapshot(&mut t, &mut cache, &Config::default(), at(10)).unwrap();
        assert_eq!(snap.categories.len(), 2);
        assert!(snap.spam_references.is_empty());
        assert!(snap.history_ids.is_empty());
    }
}
