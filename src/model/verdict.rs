//! Per-message verdicts produced by the gating and spam stages.

/// Result of the content sufficiency gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ContentAssessment {
    /// Characters of subject + body, whitespace-trimmed.
    pub char_count: usize,
    /// Whitespace-delimited tokens of subject + body.
    pub token_count: usize,
    /// `true` if the message is too text-poor to vectorize.
    pub insufficient: bool,
}

impl ContentAssessment {
    pub fn is_sufficient(&self) -> bool {
        !self.insufficient
    }
}

/// Spam classification outcome. A message carries at most one.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpamVerdict {
    /// Matched a local rule; `rule` names which one.
    LocalHeuristic { rule: String },
    /// Too similar to a message already in a spam/trash folder.
    CrossFolderSimilarity { score: f64 },
}

impl std::fmt::Display for SpamVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LocalHeuristic { rule } => write!(f, "local heuristic ({rule})"),
            Self::CrossFolderSimilarity { score } => {
                write!(f, "cross-folder similarity ({score:.2})")
            }
        }
    }
}
