//! Pre-pass over existing category folders.
//!
//! Empty leaf category folders are deleted when enabled, and category
//! folders whose leaf uses characters outside the safe set are renamed
//! to their sanitized form. Folders with children are left alone.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::debug;

use crate::config::CategoryConfig;
use crate::model::FolderListing;

use super::naming::{category_leaf, disambiguate, is_category_folder, is_safe_segment};
use super::plan::Action;

/// Cleanup decisions and their effect on folder names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanupPlan {
    /// Actions to run before any message is moved.
    pub actions: Vec<Action>,
    /// Old name → new name for migrated folders.
    pub renamed: BTreeMap<String, String>,
    /// Folders that will be deleted.
    pub deleted: BTreeSet<String>,
}

impl CleanupPlan {
    /// Name a folder will have once cleanup has run, or `None` if it is deleted.
    pub fn resolve<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        if self.deleted.contains(name) {
            return None;
        }
        Some(self.renamed.get(name).map(String::as_str).unwrap_or(name))
    }
}

/// Plan cleanup for every category folder in `listing`.
pub fn plan_cleanup(listing: &FolderListing, config: &CategoryConfig) -> CleanupPlan {
    let mut plan = CleanupPlan::default();
    let mut taken: HashSet<String> = listing.names().map(str::to_lowercase).collect();

    let mut names: Vec<&str> = listing
        .names()
        .filter(|n| is_category_folder(n, listing))
        .collect();
    names.sort_unstable();

    for name in names {
        if listing.has_children(name) {
            debug!(folder = name, "Category folder has children; leaving it");
            continue;
        }
        let empty = listing.get(name).is_some_and(|f| f.message_count == 0);

        if empty && config.cleanup_empty_folders {
            plan.actions.push(Action::DeleteFolder {
                folder: name.to_string(),
            });
            plan.deleted.insert(name.to_string());
            continue;
        }

        let leaf = listing.leaf(name);
        if is_safe_segment(leaf) {
            continue;
        }
        let Some(parent) = listing.parent(name) else {
            continue;
        };
        let base = listing.join(parent, &category_leaf(leaf, &listing.delimiter));
        let target = disambiguate(&base, &taken);
        taken.insert(target.to_lowercase());

        plan.actions.push(Action::RenameFolder {
            from: name.to_string(),
            to: target.clone(),
        });
        plan.actions.push(Action::Subscribe {
            folder: target.clone(),
        });
        plan.renamed.insert(name.to_string(), target);
    }

    debug!(
        deleted = plan.deleted.len(),
        renamed = plan.renamed.len(),
        "Cleanup planned"
    );
    plan
}
