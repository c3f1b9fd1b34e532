//! Content sufficiency gate.

use crate::config::ContentConfig;
use crate::model::{ContentAssessment, Message};

/// Decide whether `message` carries enough text to be vectorized.
///
/// Pure: the result depends only on the message and the thresholds.
/// A message is insufficient if its trimmed subject + body is shorter
/// than `min_chars` characters or has fewer than `min_tokens`
/// whitespace-delimited tokens. With `require_headers`, a missing sender
/// or subject also makes it insufficient.
pub fn assess(message: &Message, config: &ContentConfig) -> ContentAssessment {
    let text = message.text();
    let text = text.trim();
    let char_count = text.chars().count();
    let token_count = text.split_whitespace().count();

    let too_short = char_count < config.min_chars || token_count < config.min_tokens;
    let malformed =
        config.require_headers && (message.sender.is_empty() || message.subject.trim().is_empty());

    ContentAssessment {
        char_count,
        token_count,
        insufficient: too_short || malformed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(subject: &str, body: &str) -> Message {
        Message::new("1", "INBOX")
            .with_sender("a@example.com")
            .with_subject(subject)
            .with_body(body)
    }

    #[test]
    fn test_short_body_is_insufficient() {
        let cfg = ContentConfig::default();
        let a = assess(&msg("Hi", "0123456789"), &cfg);
        assert!(a.insufficient);
        assert_eq!(a.char_count, 13);
        assert_eq!(a.token_count, 2);
    }

    #[test]
    fn test_long_body_is_sufficient() {
        let cfg = ContentConfig::default();
        let a = assess(
            &msg("Invoice", "Your monthly invoice for March is ready to download."),
            &cfg,
        );
        assert!(a.is_sufficient());
    }

    #[test]
    fn test_few_tokens_is_insufficient() {
        let cfg = ContentConfig::default();
        let a = assess(
            &msg("Supercalifragilistic", "expialidocious-antidisestablishmentarianism"),
            &cfg,
        );
        assert!(a.char_count >= cfg.min_chars);
        assert!(a.insufficient);
    }

    #[test]
    fn test_missing_sender_is_insufficient() {
        let cfg = ContentConfig::default();
        let m = Message::new("1", "INBOX")
            .with_subject("Invoice")
            .with_body("Your monthly invoice for March is ready to download.");
        assert!(assess(&m, &cfg).insufficient);

        let lenient = ContentConfig {
            require_headers: false,
            ..ContentConfig::default()
        };
        assert!(assess(&m, &lenient).is_sufficient());
    }

    #[test]
    fn test_empty_message() {
        let a = assess(&Message::new("1", "INBOX"), &ContentConfig::default());
        assert_eq!(a.char_count, 0);
        assert!(a.insufficient);
    }

    #[test]
    fn test_assess_is_pure() {
        let cfg = ContentConfig::default();
        let m = msg("Weekly report", "Numbers are up across every region this week.");
        assert_eq!(assess(&m, &cfg), assess(&m.clone(), &cfg));
    }
}
