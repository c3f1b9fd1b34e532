//! Active-conversation filter.
//!
//! A message that answers, or is referenced by, something the user sent
//! or drafted belongs to an ongoing thread and stays where it is.

use std::collections::HashSet;

use crate::model::{FolderListing, Message};

use super::naming::{is_category_folder, is_history_folder};

/// Maximum Sent/Drafts folders scanned per run.
pub const MAX_HISTORY_FOLDERS: usize = 4;

/// Sent/Drafts folders to scan, in listing order. Category folders are
/// never history.
pub fn history_folders(listing: &FolderListing) -> Vec<String> {
    listing
        .names()
        .filter(|n| is_history_folder(n) && !is_category_folder(n, listing))
        .take(MAX_HISTORY_FOLDERS)
        .map(str::to_string)
        .collect()
}

/// Canonical form of a Message-ID: no angle brackets or surrounding space.
pub fn normalize_id(id: &str) -> String {
    id.trim().trim_start_matches('<').trim_end_matches('>').trim().to_string()
}

/// Message-IDs of the user's own messages.
pub fn collect_ids<'a>(messages: impl IntoIterator<Item = &'a Message>) -> HashSet<String> {
    messages
        .into_iter()
        .map(|m| normalize_id(&m.message_id))
        .filter(|id| !id.is_empty())
        .collect()
}

/// `true` if `message` shares a Message-ID with the user's history,
/// through its own id, `In-Reply-To`, or `References`.
pub fn is_active(message: &Message, history: &HashSet<String>) -> bool {
    if history.is_empty() {
        return false;
    }
    std::iter::once(message.message_id.as_str())
        .chain(message.in_reply_to.as_deref())
        .chain(message.references.iter().map(String::as_str))
        .map(normalize_id)
        .any(|id| !id.is_empty() && history.contains(&id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FolderInfo;

    #[test]
    fn test_history_folders_capped() {
        let listing = FolderListing {
            delimiter: ".".into(),
            folders: ["INBOX", "Sent", "Drafts", "Sent.2023", "Sent.2022", "Sent.2021"]
                .iter()
                .map(|n| FolderInfo {
                    name: n.to_string(),
                    message_count: 1,
                })
                .collect(),
        };
        assert_eq!(
            history_folders(&listing),
            vec!["Sent", "Drafts", "Sent.2023", "Sent.2022"]
        );
    }

    #[test]
    fn test_history_folders_skip_categories() {
        let listing = FolderListing {
            delimiter: ".".into(),
            folders: [
                "INBOX",
                "INBOX.Category_Presentation",
                "INBOX.Category_Drafting",
                "Sent",
            ]
            .iter()
            .map(|n| FolderInfo {
                name: n.to_string(),
                message_count: 3,
            })
            .collect(),
        };
        assert_eq!(history_folders(&listing), vec!["Sent"]);
    }

    #[test]
    fn test_reply_to_sent_message_is_active() {
        let sent = Message::new("s1", "Sent").with_message_id("<abc@me.example>");
        let history = collect_ids([&sent]);
        let reply = Message::new("1", "INBOX")
            .with_message_id("xyz@them.example")
            .with_in_reply_to("abc@me.example");
        assert!(is_active(&reply, &history));
    }

    #[test]
    fn test_references_match() {
        let history: HashSet<String> = ["root@me.example".to_string()].into();
        let mut m = Message::new("1", "INBOX").with_message_id("n@them.example");
        m.references = vec!["other@x".into(), "<root@me.example>".into()];
        assert!(is_active(&m, &history));
    }

    #[test]
    fn test_unrelated_is_not_active() {
        let history: HashSet<String> = ["root@me.example".to_string()].into();
        let m = Message::new("1", "INBOX").with_message_id("n@them.example");
        assert!(!is_active(&m, &history));
        assert!(!is_active(&Message::new("2", "INBOX"), &history));
    }
}
