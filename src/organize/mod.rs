//! Triage pipeline: from fetched messages to an applied folder plan.
//!
//! [`plan::run`] is pure and decides everything; [`executor::apply`] is the
//! only place the mailbox is mutated.

pub mod category;
pub mod cleanup;
pub mod cluster;
pub mod conversation;
pub mod cross_spam;
pub mod executor;
pub mod gate;
pub mod naming;
pub mod plan;
pub mod report;
pub mod spam;

pub use executor::{apply, ActionStatus, ExecutionReport};
pub use plan::{run, Action, ActionPlan, Disposition, MailboxSnapshot};
pub use report::{summarize, Summary};
