//! Email parsing: raw message bytes into the pipeline's [`crate::model::Message`].

pub mod message;

pub use message::{html_to_text, parse_message};
