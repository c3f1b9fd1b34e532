//! Run summary: counts per verdict, for humans and for JSON.

use std::fmt::Write as _;

use serde::Serialize;

use crate::model::SpamVerdict;

use super::executor::{ActionStatus, ExecutionReport};
use super::plan::{Action, ActionPlan, Disposition, UnclusteredReason};

/// Counts describing one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub messages: usize,
    pub spam_local: usize,
    pub spam_cross_folder: usize,
    pub low_content: usize,
    pub clustered: usize,
    /// Clusters routed to an existing category folder.
    pub reused_categories: usize,
    /// Clusters that get a new category folder.
    pub new_categories: usize,
    pub unclustered: usize,
    /// Of `unclustered`, left in place as part of an active conversation.
    pub active_conversation: usize,
    /// Messages whose move failed or was skipped after an error.
    pub skipped_due_to_error: usize,
    pub folders_deleted: usize,
    pub folders_renamed: usize,
}

impl Summary {
    pub fn spam(&self) -> usize {
        self.spam_local + self.spam_cross_folder
    }
}

/// Count the plan's verdicts, and with `execution`, the moves that did not happen.
pub fn summarize(plan: &ActionPlan, execution: Option<&ExecutionReport>) -> Summary {
    let mut s = Summary {
        messages: plan.messages.len(),
        ..Summary::default()
    };

    for outcome in &plan.messages {
        match &outcome.disposition {
            Disposition::Spam {
                verdict: SpamVerdict::CrossFolderSimilarity { .. },
            } => s.spam_cross_folder += 1,
            Disposition::Spam { .. } => s.spam_local += 1,
            Disposition::Insufficient { .. } => s.low_content += 1,
            Disposition::Clustered { .. } => s.clustered += 1,
            Disposition::Unclustered { reason } => {
                s.unclustered += 1;
                if *reason == UnclusteredReason::ActiveConversation {
                    s.active_conversation += 1;
                }
            }
        }
    }

    s.new_categories = plan.clusters.iter().filter(|c| c.is_new_folder()).count();
    s.reused_categories = plan.clusters.len() - s.new_categories;

    for action in &plan.actions {
        match action {
            Action::DeleteFolder { .. } => s.folders_deleted += 1,
            Action::RenameFolder { .. } => s.folders_renamed += 1,
            _ => {}
        }
    }

    if let Some(report) = execution {
        s.skipped_due_to_error = report.messages_not_moved();
    }
    s
}

/// Two-column table, one line per count.
pub fn render_table(summary: &Summary) -> String {
    let rows = [
        ("Messages", summary.messages),
        ("Spam (local rules)", summary.spam_local),
        ("Spam (cross-folder)", summary.spam_cross_folder),
        ("Low content", summary.low_content),
        ("Clustered", summary.clustered),
        ("Reused categories", summary.reused_categories),
        ("New categories", summary.new_categories),
        ("Unclustered", summary.unclustered),
        ("  active conversation", summary.active_conversation),
        ("Skipped due to error", summary.skipped_due_to_error),
        ("Folders deleted", summary.folders_deleted),
        ("Folders renamed", summary.folders_renamed),
    ];
    let mut out = String::new();
    for (label, count) in rows {
        let _ = writeln!(out, "  {label:<24} {count:>6}");
    }
    out
}

/// One line per action with its status, for the dry-run listing.
pub fn render_actions(report: &ExecutionReport) -> String {
    let mut out = String::new();
    for (i, o) in report.outcomes.iter().enumerate() {
        let status = match &o.status {
            ActionStatus::LoggedOnly => "planned".to_string(),
            ActionStatus::Applied => "applied".to_string(),
            ActionStatus::AlreadySatisfied => "already done".to_string(),
            ActionStatus::Failed(e) => format!("FAILED: {e}"),
            ActionStatus::Skipped(why) => format!("skipped: {why}"),
        };
        let _ = writeln!(out, "  {:>4}  {:<14} {}", i + 1, status, o.action);
    }
    out
}

/// Everything a run produced, as serialized by `--json`.
#[derive(Debug, Serialize)]
pub struct RunOutput<'a> {
    pub summary: Summary,
    pub plan: &'a ActionPlan,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution: Option<&'a ExecutionReport>,
}
