//! Text features: tokenization, stop words, TF-IDF vectorization, and
//! sparse-vector similarity.

pub mod stopwords;
pub mod tfidf;
pub mod vector;

pub use tfidf::{build_vectorizer, tokenize, Vectorizer};
pub use vector::SparseVector;
