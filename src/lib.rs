//! `mailtriage` — unsupervised email triage.
//!
//! Fetched messages are screened for spam and thin content, grouped by
//! TF-IDF similarity, and routed to existing or newly created category
//! folders. Planning is pure ([`organize::run`]); only
//! [`organize::apply`] touches the mailbox, and never under dry-run.

pub mod config;
pub mod error;
pub mod model;
pub mod organize;
pub mod parser;
pub mod text;
pub mod transport;
