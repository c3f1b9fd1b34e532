//! Local, rule-based spam detection.
//!
//! Two tiers: strong content patterns flag a message on their own; weak
//! subject/sender signals are scored and flag it only when at least
//! [`WEAK_SIGNAL_THRESHOLD`] of them fire together.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{Message, SpamVerdict};

/// Weak signals needed before a message is flagged.
pub const WEAK_SIGNAL_THRESHOLD: usize = 2;

const SUSPICIOUS_TLDS: &[&str] = &[
    ".xyz", ".top", ".club", ".work", ".click", ".link", ".pw", ".gq", ".tk", ".ml", ".info",
];

static CONTENT_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("pharmacy", r"viagra|cialis|pharmacy"),
        ("prize", r"winner|congratulations|you won"),
        ("urgency", r"click here now|act now|limited time"),
        ("too_good", r"100% free|risk free|satisfaction guaranteed"),
        ("easy_money", r"make money fast|earn extra cash"),
        ("advance_fee", r"nigerian prince|inheritance|lottery"),
        ("bulk_mail", r"unsubscribe|opt-out"),
        ("generic_greeting", r"dear friend|dear sir/madam"),
        ("symbols", r"!!!|₹|\$\$\$"),
    ]
    .into_iter()
    .map(|(name, pattern)| {
        let re = Regex::new(&format!("(?i){pattern}")).expect("valid spam pattern");
        (name, re)
    })
    .collect()
});

/// Classify `message` with the local rules.
///
/// Returns `None` when no rule fires so the cross-folder detector still
/// gets a chance. Works on headers alone, so it applies to messages the
/// content gate rejected too.
pub fn classify(message: &Message) -> Option<SpamVerdict> {
    let text = message.text();
    if let Some((name, _)) = CONTENT_PATTERNS.iter().find(|(_, re)| re.is_match(&text)) {
        return Some(SpamVerdict::LocalHeuristic {
            rule: (*name).to_string(),
        });
    }

    let signals = weak_signals(message);
    if signals.len() >= WEAK_SIGNAL_THRESHOLD {
        return Some(SpamVerdict::LocalHeuristic {
            rule: signals.join("+"),
        });
    }
    None
}

/// Names of the weak subject/sender signals that fire for `message`.
fn weak_signals(message: &Message) -> Vec<&'static str> {
    let mut fired = Vec::new();

    let subject = message.subject.as_str();
    let len = subject.chars().count();
    if len >= 5 {
        let upper = subject.chars().filter(|c| c.is_uppercase()).count();
        if upper as f64 / len as f64 > 0.7 {
            fired.push("shouting_subject");
        }
    }

    let (Some(local), Some(domain)) = (message.sender.local_part(), message.sender.domain()) else {
        return fired;
    };

    if SUSPICIOUS_TLDS.iter().any(|tld| domain.ends_with(tld)) {
        fired.push("suspicious_tld");
    }

    let local_len = local.chars().count();
    let digits = local.chars().filter(|c| c.is_ascii_digit()).count();
    if local_len >= 8 && digits as f64 / local_len as f64 > 0.5 {
        fired.push("numeric_sender");
    }

    let vowels = local
        .chars()
        .filter(|c| matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u'))
        .count();
    if local_len >= 10 && vowels <= 1 {
        fired.push("random_sender");
    }

    fired
}
