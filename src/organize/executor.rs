//! Applying an [`ActionPlan`] to a mailbox.
//!
//! Under dry-run every action is logged and nothing reaches the
//! transport. Live, actions run in plan order:
//!
//! - a folder that fails to be created or renamed makes every later
//!   subscribe and move into it a skip, not a failure of the run;
//! - a failed subscribe is logged and does not block moves;
//! - `EXPUNGE` runs only if every move was applied;
//! - a transient transport error stops the run, marks the remaining
//!   actions skipped, and returns [`TriageError::RunAborted`]. Nothing
//!   already applied is rolled back.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::{Result, TransportError, TransportErrorKind, TriageError};
use crate::transport::Transport;

use super::plan::{Action, ActionPlan};

/// Terminal state of one planned action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ActionStatus {
    /// Dry-run: computed and logged, never issued.
    LoggedOnly,
    Applied,
    /// The mailbox was already in the requested state.
    AlreadySatisfied,
    Failed(String),
    Skipped(String),
}

impl ActionStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Applied | Self::AlreadySatisfied)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionOutcome {
    #[serde(flatten)]
    pub action: Action,
    #[serde(flatten)]
    pub status: ActionStatus,
}

/// Per-action result of [`apply`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionReport {
    pub dry_run: bool,
    pub outcomes: Vec<ActionOutcome>,
}

impl ExecutionReport {
    fn count(&self, pred: impl Fn(&ActionStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }

    pub fn applied(&self) -> usize {
        self.count(ActionStatus::is_ok)
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, ActionStatus::Failed(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, ActionStatus::Skipped(_)))
    }

    /// Moves that did not happen because of a failure or skip.
    pub fn messages_not_moved(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.action.is_move())
            .filter(|o| matches!(o.status, ActionStatus::Failed(_) | ActionStatus::Skipped(_)))
            .count()
    }
}

/// Apply `plan` to `transport`.
pub fn apply(plan: &ActionPlan, transport: &mut dyn Transport, dry_run: bool) -> Result<ExecutionReport> {
    apply_with_progress(plan, transport, dry_run, |_| {})
}

/// Like [`apply`], calling `on_action` after each action is decided.
pub fn apply_with_progress(
    plan: &ActionPlan,
    transport: &mut dyn Transport,
    dry_run: bool,
    mut on_action: impl FnMut(&ActionOutcome),
) -> Result<ExecutionReport> {
    let mut report = ExecutionReport {
        dry_run,
        outcomes: Vec::with_capacity(plan.actions.len()),
    };

    if dry_run {
        for action in &plan.actions {
            info!(dry_run = true, action = %action, "Would apply");
            let outcome = ActionOutcome {
                action: action.clone(),
                status: ActionStatus::LoggedOnly,
            };
            on_action(&outcome);
            report.outcomes.push(outcome);
        }
        return Ok(report);
    }

    let mut state = LiveState::default();
    let mut abort: Option<TransportError> = None;

    for action in &plan.actions {
        let status = if abort.is_some() {
            ActionStatus::Skipped("run aborted".into())
        } else {
            match state.execute(action, transport) {
                Ok(status) => status,
                Err(e) => {
                    error!(action = %action, error = %e, "Transient transport error; aborting run");
                    let status = ActionStatus::Failed(e.to_string());
                    abort = Some(e);
                    status
                }
            }
        };
        let outcome = ActionOutcome {
            action: action.clone(),
            status,
        };
        on_action(&outcome);
        report.outcomes.push(outcome);
    }

    info!(
        applied = report.applied(),
        failed = report.failed(),
        skipped = report.skipped(),
        "Plan applied"
    );

    match abort {
        Some(source) => Err(TriageError::RunAborted {
            report: Box::new(report),
            source,
        }),
        None => Ok(report),
    }
}

/// What the executor has learned so far in a live run.
#[derive(Debug, Default)]
struct LiveState {
    /// Folders that could not be created or renamed into.
    unavailable: HashSet<String>,
    /// A move was not applied; expunging is no longer safe.
    incomplete_moves: bool,
}

impl LiveState {
    /// Run one action. `Err` only for transient errors.
    fn execute(
        &mut self,
        action: &Action,
        transport: &mut dyn Transport,
    ) -> std::result::Result<ActionStatus, TransportError> {
        match action {
            Action::CreateFolder { folder } => match transport.create_folder(folder) {
                Ok(()) => Ok(ActionStatus::Applied),
                Err(e) if e.kind == TransportErrorKind::AlreadyExists => {
                    Ok(ActionStatus::AlreadySatisfied)
                }
                Err(e) => {
                    self.unavailable.insert(folder.clone());
                    self.fail(action, e)
                }
            },
            Action::Subscribe { folder } => {
                if self.unavailable.contains(folder) {
                    return Ok(ActionStatus::Skipped(format!("'{folder}' is unavailable")));
                }
                match transport.subscribe(folder) {
                    Ok(()) => Ok(ActionStatus::Applied),
                    Err(e) => self.fail(action, e),
                }
            }
            Action::RenameFolder { from, to } => match transport.rename_folder(from, to) {
                Ok(()) => Ok(ActionStatus::Applied),
                Err(e) => {
                    self.unavailable.insert(to.clone());
                    self.fail(action, e)
                }
            },
            Action::DeleteFolder { folder } => match transport.delete_folder(folder) {
                Ok(()) => Ok(ActionStatus::Applied),
                Err(e) if e.kind == TransportErrorKind::NotFound => {
                    Ok(ActionStatus::AlreadySatisfied)
                }
                Err(e) => self.fail(action, e),
            },
            Action::Move {
                message_id,
                source,
                target,
                ..
            } => {
                if self.unavailable.contains(target) {
                    self.incomplete_moves = true;
                    warn!(id = %message_id, target = %target, "Target folder unavailable; message left in place");
                    return Ok(ActionStatus::Skipped(format!("'{target}' is unavailable")));
                }
                match transport.move_message(message_id, source, target) {
                    Ok(()) => Ok(ActionStatus::Applied),
                    Err(e) => {
                        self.incomplete_moves = true;
                        self.fail(action, e)
                    }
                }
            }
            Action::Expunge { folder } => {
                if self.incomplete_moves {
                    warn!(folder = %folder, "Not every move succeeded; skipping expunge");
                    return Ok(ActionStatus::Skipped("not every move succeeded".into()));
                }
                match transport.expunge(folder) {
                    Ok(()) => Ok(ActionStatus::Applied),
                    Err(e) => self.fail(action, e),
                }
            }
        }
    }

    /// Record a per-action failure, or escalate a transient one.
    fn fail(
        &mut self,
        action: &Action,
        e: TransportError,
    ) -> std::result::Result<ActionStatus, TransportError> {
        if e.is_transient() {
            if action.is_move() {
                self.incomplete_moves = true;
            }
            return Err(e);
        }
        warn!(action = %action, error = %e, "Action failed; continuing");
        Ok(ActionStatus::Failed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::organize::plan::MoveReason;
    use crate::transport::memory::{MemoryTransport, Operation};

    fn mv(id: &str, target: &str) -> Action {
        Action::Move {
            message_id: id.into(),
            source: "INBOX".into(),
            target: target.into(),
            reason: MoveReason::Category,
        }
    }

    fn plan(actions: Vec<Action>) -> ActionPlan {
        ActionPlan {
            actions,
            messages: Vec::new(),
            clusters: Vec::new(),
            spam_folder: None,
        }
    }

    fn mailbox() -> MemoryTransport {
        let mut t = MemoryTransport::new(".");
        t.add_folder("INBOX");
        for id in ["1", "2"] {
            t.add_message("INBOX", crate::model::Message::new(id, "INBOX"));
        }
        t
    }

    fn standard_plan() -> ActionPlan {
        plan(vec![
            Action::CreateFolder {
                folder: "INBOX.Category_A".into(),
            },
            Action::Subscribe {
                folder: "INBOX.Category_A".into(),
            },
            mv("1", "INBOX.Category_A"),
            mv("2", "INBOX.Category_A"),
            Action::Expunge {
                folder: "INBOX".into(),
            },
        ])
    }

    #[test]
    fn test_dry_run_makes_no_calls() {
        let mut t = mailbox();
        let report = apply(&standard_plan(), &mut t, true).unwrap();
        assert!(report
            .outcomes
            .iter()
            .all(|o| o.status == ActionStatus::LoggedOnly));
        assert!(t.calls().is_empty());
        assert_eq!(t.live_messages("INBOX").len(), 2);
    }

    #[test]
    fn test_live_run_applies_everything() {
        let mut t = mailbox();
        let report = apply(&standard_plan(), &mut t, false).unwrap();
        assert_eq!(report.applied(), 5);
        assert!(t.live_messages("INBOX").is_empty());
        assert_eq!(t.live_messages("INBOX.Category_A").len(), 2);
    }

    #[test]
    fn test_existing_folder_is_already_satisfied() {
        let mut t = mailbox();
        t.add_folder("INBOX.Category_A");
        let report = apply(&standard_plan(), &mut t, false).unwrap();
        assert_eq!(report.outcomes[0].status, ActionStatus::AlreadySatisfied);
        assert_eq!(report.failed(), 0);
    }

    #[test]
    fn test_create_failure_skips_cluster_and_expunge() {
        let mut t = mailbox();
        t.fail_on(Operation::CreateFolder, "INBOX.Category_A", TransportErrorKind::Rejected);
        let report = apply(&standard_plan(), &mut t, false).unwrap();
        assert!(matches!(report.outcomes[0].status, ActionStatus::Failed(_)));
        assert!(matches!(report.outcomes[1].status, ActionStatus::Skipped(_)));
        assert!(matches!(report.outcomes[2].status, ActionStatus::Skipped(_)));
        assert!(matches!(report.outcomes[4].status, ActionStatus::Skipped(_)));
        assert_eq!(report.messages_not_moved(), 2);
        assert_eq!(t.live_messages("INBOX").len(), 2);
    }

    #[test]
    fn test_subscribe_failure_does_not_block_moves() {
        let mut t = mailbox();
        t.fail_on(Operation::Subscribe, "INBOX.Category_A", TransportErrorKind::Rejected);
        let report = apply(&standard_plan(), &mut t, false).unwrap();
        assert!(matches!(report.outcomes[1].status, ActionStatus::Failed(_)));
        assert_eq!(report.outcomes[2].status, ActionStatus::Applied);
        assert_eq!(report.outcomes[4].status, ActionStatus::Applied);
    }

    #[test]
    fn test_move_failure_blocks_expunge() {
        let mut t = mailbox();
        t.fail_on(Operation::Move, "2", TransportErrorKind::Rejected);
        let report = apply(&standard_plan(), &mut t, false).unwrap();
        assert_eq!(report.outcomes[2].status, ActionStatus::Applied);
        assert!(matches!(report.outcomes[3].status, ActionStatus::Failed(_)));
        assert!(matches!(report.outcomes[4].status, ActionStatus::Skipped(_)));
        assert!(!t.calls().iter().any(|c| c.operation() == Operation::Expunge));
    }

    #[test]
    fn test_transient_error_aborts_run() {
        let mut t = mailbox();
        t.fail_on(Operation::Move, "1", TransportErrorKind::Transient);
        let err = apply(&standard_plan(), &mut t, false).unwrap_err();
        let TriageError::RunAborted { report, source } = err else {
            panic!("expected RunAborted");
        };
        assert!(source.is_transient());
        assert_eq!(report.outcomes[0].status, ActionStatus::Applied);
        assert!(matches!(report.outcomes[2].status, ActionStatus::Failed(_)));
        assert!(matches!(report.outcomes[3].status, ActionStatus::Skipped(_)));
        assert!(matches!(report.outcomes[4].status, ActionStatus::Skipped(_)));
        // The folder created before the failure stays.
        assert!(t.has_folder("INBOX.Category_A"));
    }

    #[test]
    fn test_failed_rename_skips_moves_into_new_name() {
        let mut t = mailbox();
        t.add_folder("INBOX.Category_[A]");
        t.fail_on(Operation::RenameFolder, "INBOX.Category_[A]", TransportErrorKind::Rejected);
        let p = plan(vec![
            Action::RenameFolder {
                from: "INBOX.Category_[A]".into(),
                to: "INBOX.Category_A".into(),
            },
            mv("1", "INBOX.Category_A"),
        ]);
        let report = apply(&p, &mut t, false).unwrap();
        assert!(matches!(report.outcomes[1].status, ActionStatus::Skipped(_)));
    }

    #[test]
    fn test_progress_callback_sees_every_action() {
        let mut t = mailbox();
        let mut seen = 0;
        apply_with_progress(&standard_plan(), &mut t, true, |_| seen += 1).unwrap();
        assert_eq!(seen, 5);
    }
}
