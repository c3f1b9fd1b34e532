//! Matching clusters against existing category folders.
//!
//! A cluster is scored against each category as
//! `content * (1 - sender_weight) + sender_overlap * sender_weight`, where
//! `content` is the mean cosine similarity between the cluster centroid
//! and each sampled category message, and `sender_overlap` is the share
//! of the cluster's distinct senders whose address or domain also sends
//! to the category.

use std::collections::{BTreeSet, HashSet};

use tracing::debug;

use crate::config::CategoryConfig;
use crate::model::message::most_recent;
use crate::model::{CategoryFolder, EmailAddress};
use crate::text::{SparseVector, Vectorizer};

/// A category folder projected into the run's feature space.
#[derive(Debug, Clone)]
pub struct CategoryProfile {
    /// Folder the cluster would be moved to.
    pub name: String,
    vectors: Vec<SparseVector>,
    sender_keys: HashSet<String>,
}

impl CategoryProfile {
    /// Build a profile from the most recent `sample_limit` messages of
    /// `folder`, stored under `target_name`.
    pub fn new(
        folder: &CategoryFolder,
        target_name: impl Into<String>,
        vectorizer: &Vectorizer,
        sample_limit: usize,
    ) -> Self {
        let samples = most_recent(folder.samples.clone(), sample_limit);
        Self {
            name: target_name.into(),
            vectors: samples.iter().map(|m| vectorizer.transform(&m.text())).collect(),
            sender_keys: samples
                .iter()
                .flat_map(|m| m.sender.identity_keys())
                .collect(),
        }
    }

    pub fn sample_count(&self) -> usize {
        self.vectors.len()
    }
}

/// Score of one cluster against one category.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CategoryMatch {
    pub folder: String,
    pub content_similarity: f64,
    pub sender_overlap: f64,
    pub score: f64,
}

/// Mean cosine similarity of `centroid` to each sample; 0.0 with no samples.
fn content_similarity(centroid: &SparseVector, profile: &CategoryProfile) -> f64 {
    if profile.vectors.is_empty() {
        return 0.0;
    }
    let total: f64 = profile.vectors.iter().map(|v| centroid.cosine(v)).sum();
    total / profile.vectors.len() as f64
}

/// Share of distinct cluster senders known to the category.
fn sender_overlap(senders: &[&EmailAddress], profile: &CategoryProfile) -> f64 {
    let distinct: BTreeSet<String> = senders
        .iter()
        .filter(|s| !s.is_empty())
        .map(|s| s.normalized())
        .collect();
    if distinct.is_empty() {
        return 0.0;
    }
    let known = distinct
        .iter()
        .filter(|addr| {
            EmailAddress::new("", addr.as_str())
                .identity_keys()
                .iter()
                .any(|k| profile.sender_keys.contains(k))
        })
        .count();
    known as f64 / distinct.len() as f64
}

/// Score a cluster against one category.
pub fn score(
    centroid: &SparseVector,
    senders: &[&EmailAddress],
    profile: &CategoryProfile,
    config: &CategoryConfig,
) -> CategoryMatch {
    let content = content_similarity(centroid, profile);
    let overlap = sender_overlap(senders, profile);
    CategoryMatch {
        folder: profile.name.clone(),
        content_similarity: content,
        sender_overlap: overlap,
        score: content * (1.0 - config.sender_weight) + overlap * config.sender_weight,
    }
}

/// Highest-scoring category, regardless of threshold. Ties go to the
/// earliest profile.
pub fn best_match(
    centroid: &SparseVector,
    senders: &[&EmailAddress],
    profiles: &[CategoryProfile],
    config: &CategoryConfig,
) -> Option<CategoryMatch> {
    let mut best: Option<CategoryMatch> = None;
    for profile in profiles {
        let m = score(centroid, senders, profile, config);
        debug!(
            folder = %m.folder,
            content = m.content_similarity,
            senders = m.sender_overlap,
            score = m.score,
            "Category candidate"
        );
        if best.as_ref().is_none_or(|b| m.score > b.score) {
            best = Some(m);
        }
    }
    best
}

/// Outcome of matching a cluster against the existing categories.
#[derive(Debug, Clone, PartialEq)]
pub enum CategoryDecision {
    /// The best category reached `match_similarity`.
    Reuse(CategoryMatch),
    /// No category qualified; `best` is the closest one, if any exist.
    New { best: Option<CategoryMatch> },
}

/// Decide whether a cluster reuses a category: the best score must
/// reach `match_similarity`.
pub fn match_category(
    centroid: &SparseVector,
    senders: &[&EmailAddress],
    profiles: &[CategoryProfile],
    config: &CategoryConfig,
) -> CategoryDecision {
    match best_match(centroid, senders, profiles, config) {
        Some(m) if m.score >= config.match_similarity => CategoryDecision::Reuse(m),
        best => CategoryDecision::New { best },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VectorizerConfig;
    use crate::model::Message;
    use crate::text::build_vectorizer;

    fn folder(name: &str, samples: &[(&str, &str)]) -> CategoryFolder {
        CategoryFolder {
            name: name.into(),
            message_count: samples.len(),
            samples: samples
                .iter()
                .enumerate()
                .map(|(i, (from, text))| {
                    Message::new(i.to_string(), name)
                        .with_sender(from)
                        .with_subject("")
                        .with_body(*text)
                })
                .collect(),
        }
    }

    #[test]
    fn test_sender_overlap_by_address_and_domain() {
        let vec = build_vectorizer(&["a"], &VectorizerConfig::default());
        let cat = folder(
            "INBOX.Category_Bills",
            &[("billing@shop.example", "x"), ("ops@power.example", "y")],
        );
        let profile = CategoryProfile::new(&cat, &cat.name, &vec, 50);
        let a = EmailAddress::parse("billing@shop.example");
        let b = EmailAddress::parse("noreply@power.example");
        let c = EmailAddress::parse("friend@else.example");
        assert_eq!(sender_overlap(&[&a, &b], &profile), 1.0);
        assert_eq!(sender_overlap(&[&a, &a, &c], &profile), 0.5);
        assert_eq!(sender_overlap(&[], &profile), 0.0);
    }

    #[test]
    fn test_combined_score_formula() {
        let corpus = ["invoice payment due", "invoice payment due", "team lunch friday"];
        let vec = build_vectorizer(&corpus, &VectorizerConfig::default());
        let cat = folder(
            "INBOX.Category_Invoices",
            &[("billing@shop.example", "invoice payment due")],
        );
        let profile = CategoryProfile::new(&cat, &cat.name, &vec, 50);
        let centroid = vec.transform("invoice payment due");
        let sender = EmailAddress::parse("billing@shop.example");
        let cfg = CategoryConfig::default();
        let m = score(&centroid, &[&sender], &profile, &cfg);
        assert!((m.content_similarity - 1.0).abs() < 1e-9);
        assert_eq!(m.sender_overlap, 1.0);
        assert!((m.score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_below_threshold_is_no_match() {
        let corpus = ["invoice payment due", "team lunch friday"];
        let vec = build_vectorizer(&corpus, &VectorizerConfig::default());
        let cat = folder("INBOX.Category_Lunch", &[("a@b.example", "team lunch friday")]);
        let profile = CategoryProfile::new(&cat, &cat.name, &vec, 50);
        let centroid = vec.transform("invoice payment due");
        let sender = EmailAddress::parse("billing@shop.example");
        let cfg = CategoryConfig::default();
        match match_category(&centroid, &[&sender], &[profile], &cfg) {
            CategoryDecision::New { best: Some(best) } => {
                assert_eq!(best.folder, "INBOX.Category_Lunch");
                assert!(best.score < cfg.match_similarity);
            }
            other => panic!("expected a new category, got {other:?}"),
        }
    }

    #[test]
    fn test_best_of_several() {
        let corpus = ["invoice payment due", "team lunch friday"];
        let vec = build_vectorizer(&corpus, &VectorizerConfig::default());
        let lunch = folder("INBOX.Category_Lunch", &[("a@b.example", "team lunch friday")]);
        let bills = folder("INBOX.Category_Bills", &[("c@d.example", "invoice payment due")]);
        let profiles = vec![
            CategoryProfile::new(&lunch, &lunch.name, &vec, 50),
            CategoryProfile::new(&bills, &bills.name, &vec, 50),
        ];
        let centroid = vec.transform("invoice payment");
        match match_category(&centroid, &[], &profiles, &CategoryConfig::default()) {
            CategoryDecision::Reuse(m) => assert_eq!(m.folder, "INBOX.Category_Bills"),
            other => panic!("expected reuse, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_category_scores_zero() {
        let vec = build_vectorizer(&["invoice"], &VectorizerConfig::default());
        let empty = folder("INBOX.Category_Empty", &[]);
        let profile = CategoryProfile::new(&empty, &empty.name, &vec, 50);
        assert_eq!(profile.sample_count(), 0);
        let m = score(&vec.transform("invoice"), &[], &profile, &CategoryConfig::default());
        assert_eq!(m.score, 0.0);
    }

    #[test]
    fn test_sample_limit_caps_profile() {
        let vec = build_vectorizer(&["a"], &VectorizerConfig::default());
        let cat = folder(
            "INBOX.Category_X",
            &[("a@x.example", "one"), ("b@x.example", "two"), ("c@x.example", "three")],
        );
        assert_eq!(CategoryProfile::new(&cat, &cat.name, &vec, 2).sample_count(), 2);
    }

    #[test]
    fn test_no_categories_means_new() {
        let vec = build_vectorizer(&["invoice"], &VectorizerConfig::default());
        let decision = match_category(&vec.transform("invoice"), &[], &[], &CategoryConfig::default());
        assert_eq!(decision, CategoryDecision::New { best: None });
    }
}
