//! Stop-word lists selectable through `vectorizer.stopwords`.

use std::collections::HashSet;
use std::sync::LazyLock;

use crate::config::StopwordsMode;

/// A standard English stop-word list.
const ENGLISH: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "either",
    "else", "etc", "ever", "every", "few", "for", "from", "further", "get", "had", "has", "have",
    "having", "he", "her", "here", "hers", "herself", "him", "himself", "his", "how", "however",
    "if", "in", "into", "is", "it", "its", "itself", "just", "least", "less", "may", "me",
    "might", "more", "most", "much", "must", "my", "myself", "neither", "no", "nor", "not", "now",
    "of", "off", "often", "on", "once", "only", "or", "other", "otherwise", "our", "ours",
    "ourselves", "out", "over", "own", "per", "please", "rather", "same", "shall", "she",
    "should", "since", "so", "some", "such", "than", "that", "the", "their", "theirs", "them",
    "themselves", "then", "there", "thereby", "therefore", "these", "they", "this", "those",
    "though", "through", "thus", "to", "too", "under", "until", "up", "upon", "us", "very", "via",
    "was", "we", "well", "were", "what", "whatever", "when", "whence", "whenever", "where",
    "whereas", "whether", "which", "while", "who", "whoever", "whole", "whom", "whose", "why",
    "will", "with", "within", "without", "would", "yet", "you", "your", "yours", "yourself",
    "yourselves",
];

static ENGLISH_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| ENGLISH.iter().copied().collect());

/// `true` if `word` (already lower-cased) is dropped under `mode`.
pub fn is_stopword(mode: StopwordsMode, word: &str) -> bool {
    match mode {
        StopwordsMode::None => false,
        StopwordsMode::English => ENGLISH_SET.contains(word),
    }
}
