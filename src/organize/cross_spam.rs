//! Cross-folder spam detection.
//!
//! Candidates are compared with a bounded sample of messages already
//! sitting in spam/trash folders. The sample is the most recent
//! `cross_sample_limit` references (ties by id), so a given mailbox
//! snapshot always yields the same verdicts.

use tracing::{debug, info};

use crate::config::{SpamConfig, VectorizerConfig};
use crate::model::message::most_recent;
use crate::model::{Message, SpamVerdict};
use crate::text::build_vectorizer;

/// Deterministic reference sample drawn from the pooled reference folders.
pub fn sample_references(references: &[Message], limit: usize) -> Vec<Message> {
    most_recent(references.to_vec(), limit)
}

/// Score every candidate against the reference sample.
///
/// Returns one entry per candidate, in order: a
/// [`SpamVerdict::CrossFolderSimilarity`] when the best cosine similarity
/// to any reference reaches `cross_similarity`, otherwise `None`. With no
/// references this is a no-op.
pub fn detect(
    candidates: &[&Message],
    references: &[Message],
    spam: &SpamConfig,
    vectorizer: &VectorizerConfig,
) -> Vec<Option<SpamVerdict>> {
    let sample = sample_references(references, spam.cross_sample_limit);
    if sample.is_empty() || candidates.is_empty() {
        return vec![None; candidates.len()];
    }

    // References and candidates share one vocabulary.
    let corpus: Vec<String> = sample
        .iter()
        .map(Message::text)
        .chain(candidates.iter().map(|m| m.text()))
        .collect();
    let vec = build_vectorizer(&corpus, vectorizer);
    let (ref_texts, cand_texts) = corpus.split_at(sample.len());
    let ref_vectors = vec.transform_all(ref_texts);

    let verdicts: Vec<Option<SpamVerdict>> = cand_texts
        .iter()
        .zip(candidates)
        .map(|(text, message)| {
            let v = vec.transform(text);
            let best = ref_vectors
                .iter()
                .map(|r| v.cosine(r))
                .fold(0.0_f64, f64::max);
            if best >= spam.cross_similarity {
                debug!(id = %message.id, score = best, "Similar to spam/trash reference");
                Some(SpamVerdict::CrossFolderSimilarity { score: best })
            } else {
                None
            }
        })
        .collect();

    info!(
        references = sample.len(),
        candidates = candidates.len(),
        flagged = verdicts.iter().filter(|v| v.is_some()).count(),
        "Cross-folder spam check"
    );
    verdicts
}
