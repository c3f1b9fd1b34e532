//! Core data model: messages, sender addresses, per-message verdicts, and folders.

pub mod address;
pub mod folder;
pub mod message;
pub mod verdict;

pub use address::EmailAddress;
pub use folder::{CategoryFolder, FolderInfo, FolderListing};
pub use message::Message;
pub use verdict::{ContentAssessment, SpamVerdict};
