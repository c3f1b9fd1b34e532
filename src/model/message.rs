//! The immutable per-run message record.

use chrono::{DateTime, Utc};

use super::address::EmailAddress;

/// One fetched message.
///
/// Built once per run from a transport fetch and never mutated by the
/// pipeline. `id` is unique within its folder and is what the transport
/// accepts for `move`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    /// Transport-level identifier (UID, Maildir unique name, …).
    pub id: String,

    /// Folder the message was fetched from.
    pub folder: String,

    /// Sender (`From:`). Empty when the header is missing.
    pub sender: EmailAddress,

    /// Decoded subject line. Empty when the header is missing.
    pub subject: String,

    /// Plain-text body (from `text/plain`, or stripped from HTML).
    pub body: String,

    /// Received/`Date:` timestamp. Falls back to the Unix epoch.
    pub received: DateTime<Utc>,

    /// The `Message-ID` header value without angle brackets.
    pub message_id: String,

    /// The `In-Reply-To` header value, if present.
    pub in_reply_to: Option<String>,

    /// Message-IDs from the `References` header.
    pub references: Vec<String>,
}

impl Message {
    /// Start a message with only an id and folder; the remaining fields
    /// are empty and can be filled with the `with_*` builders.
    pub fn new(id: impl Into<String>, folder: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            folder: folder.into(),
            sender: EmailAddress::default(),
            subject: String::new(),
            body: String::new(),
            received: DateTime::UNIX_EPOCH,
            message_id: String::new(),
            in_reply_to: None,
            references: Vec::new(),
        }
    }

    pub fn with_sender(mut self, raw: &str) -> Self {
        self.sender = EmailAddress::parse(raw);
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_received(mut self, received: DateTime<Utc>) -> Self {
        self.received = received;
        self
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = message_id.into();
        self
    }

    pub fn with_in_reply_to(mut self, in_reply_to: impl Into<String>) -> Self {
        self.in_reply_to = Some(in_reply_to.into());
        self
    }

    /// Subject and body joined by a space; the text every stage compares.
    pub fn text(&self) -> String {
        format!("{} {}", self.subject, self.body)
    }
}

/// Order messages most recent first, ties by id, and keep the first `limit`.
///
/// This is the one sampling rule used wherever a bounded reference set is
/// drawn from a folder, so the same snapshot always yields the same sample.
pub fn most_recent(mut messages: Vec<Message>, limit: usize) -> Vec<Message> {
    messages.sort_by(|a, b| b.received.cmp(&a.received).then_with(|| a.id.cmp(&b.id)));
    messages.truncate(limit);
    messages
}
