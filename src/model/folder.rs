//! Mailbox folders as seen at the start of a run.

use super::message::Message;

/// One folder from the transport's folder list.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FolderInfo {
    /// Full hierarchical name, e.g. `INBOX.Category_Invoices`.
    pub name: String,
    /// Number of live (not deleted) messages.
    pub message_count: usize,
}

/// The folder list together with the hierarchy delimiter.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FolderListing {
    pub delimiter: String,
    pub folders: Vec<FolderInfo>,
}

impl FolderListing {
    pub fn get(&self, name: &str) -> Option<&FolderInfo> {
        self.folders.iter().find(|f| f.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.folders.iter().map(|f| f.name.as_str())
    }

    /// Last hierarchy segment of `name`.
    pub fn leaf<'a>(&self, name: &'a str) -> &'a str {
        if self.delimiter.is_empty() {
            return name;
        }
        name.rsplit(self.delimiter.as_str()).next().unwrap_or(name)
    }

    /// Everything before the last delimiter, or `None` for a top-level name.
    pub fn parent<'a>(&self, name: &'a str) -> Option<&'a str> {
        if self.delimiter.is_empty() {
            return None;
        }
        name.rsplit_once(self.delimiter.as_str()).map(|(p, _)| p)
    }

    /// `true` if any other folder is nested below `name`.
    pub fn has_children(&self, name: &str) -> bool {
        let prefix = format!("{name}{}", self.delimiter);
        self.folders.iter().any(|f| f.name.starts_with(&prefix))
    }

    /// Join a parent and a leaf with the delimiter.
    pub fn join(&self, parent: &str, leaf: &str) -> String {
        format!("{parent}{}{leaf}", self.delimiter)
    }

    /// Nesting depth (number of delimiters).
    pub fn depth(&self, name: &str) -> usize {
        if self.delimiter.is_empty() {
            0
        } else {
            name.matches(self.delimiter.as_str()).count()
        }
    }
}

/// An existing category folder with its bounded reference sample.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryFolder {
    pub name: String,
    pub message_count: usize,
    /// Most recent messages, capped by `category.sample_limit`.
    pub samples: Vec<Message>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(names: &[&str]) -> FolderListing {
        FolderListing {
            delimiter: ".".into(),
            folders: names
                .iter()
                .map(|n| FolderInfo {
                    name: n.to_string(),
                    message_count: 0,
                })
                .collect(),
        }
    }

    #[test]
    fn test_leaf_and_parent() {
        let l = listing(&["INBOX", "INBOX.Category_Bills"]);
        assert_eq!(l.leaf("INBOX.Category_Bills"), "Category_Bills");
        assert_eq!(l.parent("INBOX.Category_Bills"), Some("INBOX"));
        assert_eq!(l.parent("INBOX"), None);
        assert_eq!(l.depth("INBOX.Category_Bills"), 1);
    }

    #[test]
    fn test_has_children() {
        let l = listing(&["INBOX.Category_A", "INBOX.Category_A.Old", "INBOX.Category_AB"]);
        assert!(l.has_children("INBOX.Category_A"));
        assert!(!l.has_children("INBOX.Category_AB"));
    }
}
