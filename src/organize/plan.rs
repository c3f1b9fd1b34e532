//! The pure planning entry point.
//!
//! [`run`] turns a batch of fetched messages and a snapshot of the
//! mailbox into an [`ActionPlan`]: an ordered list of folder mutations
//! plus the verdict reached for every message. Planning never touches
//! the mailbox and has no notion of dry-run, so the plan for a given
//! snapshot is the same whether it is later applied or only logged.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::model::{
    CategoryFolder, ContentAssessment, EmailAddress, FolderListing, Message, SpamVerdict,
};
use crate::text::{build_vectorizer, SparseVector};

use super::category::{match_category, CategoryDecision, CategoryMatch, CategoryProfile};
use super::cleanup::{plan_cleanup, CleanupPlan};
use super::naming::{derive_category_leaf, disambiguate, spam_destination, INBOX};
use super::{cluster, conversation, cross_spam, gate, spam};

/// Mailbox state read once at the start of a run.
#[derive(Debug, Clone)]
pub struct MailboxSnapshot {
    /// Every folder with its delimiter and message counts.
    pub listing: FolderListing,
    /// Existing category folders with their reference samples.
    pub categories: Vec<CategoryFolder>,
    /// Messages from spam/trash folders for the cross-folder check.
    pub spam_references: Vec<Message>,
    /// Message-IDs found in Sent/Drafts.
    pub history_ids: HashSet<String>,
}

impl MailboxSnapshot {
    /// A snapshot with only a folder list.
    pub fn new(listing: FolderListing) -> Self {
        Self {
            listing,
            categories: Vec::new(),
            spam_references: Vec::new(),
            history_ids: HashSet::new(),
        }
    }
}

/// Why a message is being moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveReason {
    Spam,
    Category,
}

/// One planned mailbox mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    CreateFolder {
        folder: String,
    },
    Subscribe {
        folder: String,
    },
    RenameFolder {
        from: String,
        to: String,
    },
    DeleteFolder {
        folder: String,
    },
    Move {
        message_id: String,
        source: String,
        target: String,
        reason: MoveReason,
    },
    Expunge {
        folder: String,
    },
}

impl Action {
    pub fn is_move(&self) -> bool {
        matches!(self, Self::Move { .. })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateFolder { folder } => write!(f, "CREATE_FOLDER {folder}"),
            Self::Subscribe { folder } => write!(f, "SUBSCRIBE {folder}"),
            Self::RenameFolder { from, to } => write!(f, "RENAME_FOLDER {from} -> {to}"),
            Self::DeleteFolder { folder } => write!(f, "DELETE_FOLDER {folder}"),
            Self::Move {
                message_id,
                source,
                target,
                reason,
            } => write!(f, "MOVE {source}/{message_id} -> {target} ({reason:?})"),
            Self::Expunge { folder } => write!(f, "EXPUNGE {folder}"),
        }
    }
}

/// Why an eligible message was left in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnclusteredReason {
    /// Not similar enough to a group large enough to act on.
    BelowThreshold,
    /// Part of a thread the user took part in.
    ActiveConversation,
}

/// Where a message ended up. Exactly one per input message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "disposition", rename_all = "snake_case")]
pub enum Disposition {
    Spam { verdict: SpamVerdict },
    Insufficient { assessment: ContentAssessment },
    Clustered { cluster: usize },
    Unclustered { reason: UnclusteredReason },
}

/// The decision for one input message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageOutcome {
    pub id: String,
    pub folder: String,
    pub subject: String,
    #[serde(flatten)]
    pub disposition: Disposition,
}

/// How a cluster's target folder was chosen.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolution {
    /// Routed to an existing category folder.
    Reused { matched: CategoryMatch },
    /// A new category folder is created. `best` is the closest existing
    /// category, which scored below the threshold.
    Created { best: Option<CategoryMatch> },
}

/// One cluster and the folder it goes to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterPlan {
    /// Message ids, in input order.
    pub members: Vec<String>,
    pub fraction: f64,
    pub target: String,
    pub resolution: Resolution,
}

impl ClusterPlan {
    pub fn is_new_folder(&self) -> bool {
        matches!(self.resolution, Resolution::Created { .. })
    }
}

/// The full result of planning.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionPlan {
    pub actions: Vec<Action>,
    pub messages: Vec<MessageOutcome>,
    pub clusters: Vec<ClusterPlan>,
    /// Folder spam is moved to, if any spam was found.
    pub spam_folder: Option<String>,
}

impl ActionPlan {
    pub fn moves(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter().filter(|a| a.is_move())
    }
}

/// Plan a run.
///
/// Stages run strictly in order, each on what the previous one left:
/// content gate, local spam rules, active-conversation filter,
/// cross-folder spam, vectorization, clustering, and category matching.
/// Cleanup is planned from the folder list alone and its actions come
/// first.
pub fn run(messages: &[Message], snapshot: &MailboxSnapshot, config: &Config) -> ActionPlan {
    let listing = &snapshot.listing;
    let cleanup = plan_cleanup(listing, &config.category);

    let assessments: Vec<ContentAssessment> = messages
        .iter()
        .map(|m| gate::assess(m, &config.content))
        .collect();
    let mut dispositions: Vec<Option<Disposition>> = messages
        .iter()
        .map(|m| spam::classify(m).map(|verdict| Disposition::Spam { verdict }))
        .collect();

    let active: Vec<bool> = messages
        .iter()
        .map(|m| config.conversation.enabled && conversation::is_active(m, &snapshot.history_ids))
        .collect();

    // Cross-folder check: sufficient, not locally flagged, not in a thread.
    let cross_idx: Vec<usize> = (0..messages.len())
        .filter(|&i| dispositions[i].is_none() && assessments[i].is_sufficient() && !active[i])
        .collect();
    let candidates: Vec<&Message> = cross_idx.iter().map(|&i| &messages[i]).collect();
    let verdicts = cross_spam::detect(
        &candidates,
        &snapshot.spam_references,
        &config.spam,
        &config.vectorizer,
    );
    for (&i, verdict) in cross_idx.iter().zip(verdicts) {
        if let Some(verdict) = verdict {
            dispositions[i] = Some(Disposition::Spam { verdict });
        }
    }

    let mut eligible: Vec<usize> = Vec::new();
    for (i, message) in messages.iter().enumerate() {
        if dispositions[i].is_some() {
            continue;
        }
        if !assessments[i].is_sufficient() {
            dispositions[i] = Some(Disposition::Insufficient {
                assessment: assessments[i],
            });
        } else if active[i] {
            debug!(id = %message.id, "Active conversation; leaving in place");
            dispositions[i] = Some(Disposition::Unclustered {
                reason: UnclusteredReason::ActiveConversation,
            });
        } else {
            eligible.push(i);
        }
    }

    let texts: Vec<String> = eligible.iter().map(|&i| messages[i].text()).collect();
    let vectorizer = build_vectorizer(&texts, &config.vectorizer);
    let vectors = vectorizer.transform_all(&texts);
    let clusters = cluster::cluster(&vectors, &config.clustering);

    let mut profiles: Vec<CategoryProfile> = snapshot
        .categories
        .iter()
        .filter_map(|cat| {
            let target = cleanup.resolve(&cat.name)?;
            Some(CategoryProfile::new(
                cat,
                target,
                &vectorizer,
                config.category.sample_limit,
            ))
        })
        .collect();
    profiles.sort_by(|a, b| a.name.cmp(&b.name));

    // Names freed by cleanup deletes can be taken again.
    let mut taken: HashSet<String> = listing
        .names()
        .filter(|n| !cleanup.deleted.contains(*n))
        .map(str::to_lowercase)
        .collect();
    taken.extend(cleanup.renamed.values().map(|n| n.to_lowercase()));

    let mut cluster_plans = Vec::with_capacity(clusters.len());
    for (ci, c) in clusters.iter().enumerate() {
        let members: Vec<&Message> = c.members.iter().map(|&k| &messages[eligible[k]]).collect();
        let centroid = SparseVector::centroid(c.members.iter().map(|&k| &vectors[k]));
        let senders: Vec<&EmailAddress> = members.iter().map(|m| &m.sender).collect();

        let (target, resolution) =
            match match_category(&centroid, &senders, &profiles, &config.category) {
                CategoryDecision::Reuse(matched) => {
                    (matched.folder.clone(), Resolution::Reused { matched })
                }
                CategoryDecision::New { best } => {
                    let subjects: Vec<&str> =
                        members.iter().map(|m| m.subject.as_str()).collect();
                    let leaf = derive_category_leaf(
                        &subjects,
                        &vectorizer,
                        &centroid,
                        &listing.delimiter,
                    );
                    let name = disambiguate(&listing.join(INBOX, &leaf), &taken);
                    taken.insert(name.to_lowercase());
                    (name, Resolution::Created { best })
                }
            };
        debug!(cluster = ci, size = c.size(), target = %target, "Cluster resolved");

        for &k in &c.members {
            dispositions[eligible[k]] = Some(Disposition::Clustered { cluster: ci });
        }
        cluster_plans.push(ClusterPlan {
            members: members.iter().map(|m| m.id.clone()).collect(),
            fraction: c.fraction,
            target,
            resolution,
        });
    }

    let outcomes: Vec<MessageOutcome> = messages
        .iter()
        .zip(dispositions)
        .map(|(m, d)| MessageOutcome {
            id: m.id.clone(),
            folder: m.folder.clone(),
            subject: m.subject.clone(),
            disposition: d.unwrap_or(Disposition::Unclustered {
                reason: UnclusteredReason::BelowThreshold,
            }),
        })
        .collect();

    let (actions, spam_folder) = build_actions(messages, &outcomes, &cluster_plans, cleanup, listing);

    info!(
        messages = messages.len(),
        eligible = eligible.len(),
        clusters = cluster_plans.len(),
        actions = actions.len(),
        "Plan ready"
    );

    ActionPlan {
        actions,
        messages: outcomes,
        clusters: cluster_plans,
        spam_folder,
    }
}

/// Order: cleanup, spam folder setup, spam moves, per-cluster folder
/// setup and moves, then one expunge per source folder.
///
/// An empty folder that cleanup would delete but a new cluster targets
/// is kept instead of being deleted and created again.
fn build_actions(
    messages: &[Message],
    outcomes: &[MessageOutcome],
    clusters: &[ClusterPlan],
    cleanup: CleanupPlan,
    listing: &FolderListing,
) -> (Vec<Action>, Option<String>) {
    let revived: HashSet<&str> = clusters
        .iter()
        .filter(|c| c.is_new_folder() && cleanup.deleted.contains(&c.target))
        .map(|c| c.target.as_str())
        .collect();
    let mut actions: Vec<Action> = cleanup
        .actions
        .into_iter()
        .filter(|a| {
            !matches!(a, Action::DeleteFolder { folder } if revived.contains(folder.as_str()))
        })
        .collect();
    let mut sources: Vec<String> = Vec::new();
    let mut push_move = |actions: &mut Vec<Action>, m: &Message, target: &str, reason| {
        if m.folder == target {
            return;
        }
        if !sources.contains(&m.folder) {
            sources.push(m.folder.clone());
        }
        actions.push(Action::Move {
            message_id: m.id.clone(),
            source: m.folder.clone(),
            target: target.to_string(),
            reason,
        });
    };

    let spam: Vec<&Message> = messages
        .iter()
        .zip(outcomes)
        .filter(|(_, o)| matches!(o.disposition, Disposition::Spam { .. }))
        .map(|(m, _)| m)
        .collect();

    let spam_folder = if spam.is_empty() {
        None
    } else {
        let (folder, create) = spam_destination(listing);
        if create {
            actions.push(Action::CreateFolder {
                folder: folder.clone(),
            });
            actions.push(Action::Subscribe {
                folder: folder.clone(),
            });
        }
        for &m in &spam {
            push_move(&mut actions, m, &folder, MoveReason::Spam);
        }
        Some(folder)
    };

    for (ci, c) in clusters.iter().enumerate() {
        if c.is_new_folder() {
            if !revived.contains(c.target.as_str()) {
                actions.push(Action::CreateFolder {
                    folder: c.target.clone(),
                });
            }
            actions.push(Action::Subscribe {
                folder: c.target.clone(),
            });
        }
        let in_cluster = Disposition::Clustered { cluster: ci };
        for (m, _) in messages
            .iter()
            .zip(outcomes)
            .filter(|(_, o)| o.disposition == in_cluster)
        {
            push_move(&mut actions, m, &c.target, MoveReason::Category);
        }
    }

    for folder in sources {
        actions.push(Action::Expunge { folder });
    }
    (actions, spam_folder)
}
