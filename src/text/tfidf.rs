//! Bag-of-words TF-IDF vectorizer.
//!
//! Fitting is deterministic: the vocabulary is the `max_features` most
//! frequent terms of the corpus (ties broken lexicographically) and
//! columns are assigned in lexicographic term order, so the same corpus
//! and settings always give the same feature space.
//!
//! Weights use the smoothed inverse document frequency
//! `ln((1 + n) / (1 + df)) + 1` on raw term counts, and every vector is
//! scaled to unit length.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::debug;

use crate::config::{StopwordsMode, VectorizerConfig};

use super::stopwords::is_stopword;
use super::vector::SparseVector;

/// Split text into lower-cased word tokens of two or more characters.
///
/// A word is a maximal run of alphanumeric characters or `_`.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| w.chars().count() >= 2)
        .map(str::to_lowercase)
        .collect()
}

/// A fitted vectorizer. Immutable once built; pass it by reference to
/// every stage that needs the shared feature space.
#[derive(Debug, Clone)]
pub struct Vectorizer {
    terms: Vec<String>,
    columns: HashMap<String, usize>,
    idf: Vec<f64>,
    stopwords: StopwordsMode,
}

/// Fit a vectorizer over `corpus`.
pub fn build_vectorizer<S: AsRef<str>>(corpus: &[S], config: &VectorizerConfig) -> Vectorizer {
    let mut term_freq: HashMap<String, usize> = HashMap::new();
    let mut doc_freq: HashMap<String, usize> = HashMap::new();

    for doc in corpus {
        let mut seen: HashSet<String> = HashSet::new();
        for token in tokenize(doc.as_ref()) {
            if is_stopword(config.stopwords, &token) {
                continue;
            }
            *term_freq.entry(token.clone()).or_default() += 1;
            seen.insert(token);
        }
        for token in seen {
            *doc_freq.entry(token).or_default() += 1;
        }
    }

    let mut ranked: Vec<(String, usize)> = term_freq.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(config.max_features);

    let selected: BTreeSet<String> = ranked.into_iter().map(|(t, _)| t).collect();
    let n = corpus.len() as f64;
    let terms: Vec<String> = selected.into_iter().collect();
    let idf = terms
        .iter()
        .map(|t| {
            let df = doc_freq.get(t).copied().unwrap_or(0) as f64;
            ((1.0 + n) / (1.0 + df)).ln() + 1.0
        })
        .collect();
    let columns = terms
        .iter()
        .enumerate()
        .map(|(i, t)| (t.clone(), i))
        .collect();

    debug!(
        documents = corpus.len(),
        vocabulary = terms.len(),
        "Fitted vectorizer"
    );

    Vectorizer {
        terms,
        columns,
        idf,
        stopwords: config.stopwords,
    }
}

impl Vectorizer {
    /// Number of columns in the feature space.
    pub fn vocabulary_size(&self) -> usize {
        self.terms.len()
    }

    /// Term for a column index.
    pub fn term(&self, column: usize) -> Option<&str> {
        self.terms.get(column).map(String::as_str)
    }

    /// Project `text` into the fitted feature space.
    ///
    /// Terms outside the vocabulary are ignored; text with no known terms
    /// yields an empty vector.
    pub fn transform(&self, text: &str) -> SparseVector {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for token in tokenize(text) {
            if is_stopword(self.stopwords, &token) {
                continue;
            }
            if let Some(&col) = self.columns.get(&token) {
                *counts.entry(col).or_default() += 1.0;
            }
        }
        let pairs = counts
            .into_iter()
            .map(|(col, tf)| (col, tf * self.idf[col]))
            .collect();
        SparseVector::from_pairs(pairs).normalized()
    }

    pub fn transform_all<S: AsRef<str>>(&self, texts: &[S]) -> Vec<SparseVector> {
        texts.iter().map(|t| self.transform(t.as_ref())).collect()
    }

    /// Highest-weight term of `vector`, ties broken lexicographically.
    pub fn top_term(&self, vector: &SparseVector) -> Option<&str> {
        vector
            .entries()
            .iter()
            .max_by(|a, b| {
                a.1.total_cmp(&b.1)
                    .then_with(|| self.terms[b.0].cmp(&self.terms[a.0]))
            })
            .and_then(|&(col, _)| self.term(col))
    }
}
