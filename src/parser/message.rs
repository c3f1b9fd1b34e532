//! Raw RFC 5322 bytes → [`Message`].
//!
//! Uses `mail-parser` for headers, charsets and MIME structure. Parsing is
//! total: a message that cannot be parsed still yields a [`Message`] with
//! whatever could be recovered, so a broken mail never aborts a batch.

use chrono::{DateTime, Utc};
use mail_parser::{HeaderValue, MessageParser};

use crate::model::{EmailAddress, Message};

/// Parse a complete raw message (headers + body).
///
/// `id` and `folder` come from the transport; everything else is read
/// from the message itself.
pub fn parse_message(raw: &[u8], id: &str, folder: &str) -> Message {
    let mut message = Message::new(id, folder);

    let Some(parsed) = MessageParser::default().parse(raw) else {
        message.body = extract_body_fallback(raw);
        return message;
    };

    message.subject = parsed.subject().unwrap_or_default().trim().to_string();

    if let Some(addr) = parsed.from().and_then(|a| a.first()) {
        message.sender = EmailAddress::new(
            addr.name().unwrap_or_default(),
            addr.address().unwrap_or_default(),
        );
    }

    if let Some(date) = parsed.date() {
        message.received =
            DateTime::<Utc>::from_timestamp(date.to_timestamp(), 0).unwrap_or(DateTime::UNIX_EPOCH);
    }

    message.message_id = parsed.message_id().unwrap_or_default().to_string();
    message.in_reply_to = header_ids(parsed.in_reply_to()).into_iter().next();
    message.references = header_ids(parsed.references());

    message.body = parsed
        .body_text(0)
        .map(|s| s.into_owned())
        .or_else(|| parsed.body_html(0).map(|html| html_to_text(&html)))
        .unwrap_or_default();

    message
}

/// Message-ids from an `In-Reply-To` / `References` header.
fn header_ids(value: &HeaderValue<'_>) -> Vec<String> {
    match value {
        HeaderValue::Text(s) => vec![s.to_string()],
        HeaderValue::TextList(list) => list.iter().map(|s| s.to_string()).collect(),
        _ => Vec::new(),
    }
}

/// Everything after the first blank line, for messages `mail-parser` rejects.
fn extract_body_fallback(data: &[u8]) -> String {
    let text = String::from_utf8_lossy(data);
    if let Some(pos) = text.find("\r\n\r\n") {
        text[pos + 4..].to_string()
    } else if let Some(pos) = text.find("\n\n") {
        text[pos + 2..].to_string()
    } else {
        String::new()
    }
}

/// Reduce an HTML body to the words a reader would see.
///
/// Scripts and styles are dropped, block tags become line breaks, all
/// other tags are stripped and common entities decoded.
pub fn html_to_text(html: &str) -> String {
    let mut text = remove_tag_block(html, "script");
    text = remove_tag_block(&text, "style");

    for tag in ["br", "br/", "br /", "p", "div", "tr", "li"] {
        text = text.replace(&format!("<{tag}>"), "\n");
        text = text.replace(&format!("</{tag}>"), "\n");
    }

    let mut stripped = String::with_capacity(text.len());
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => stripped.push(ch),
            _ => {}
        }
    }

    let decoded = stripped
        .replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    decoded
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Remove an entire tag block (e.g. `<script>…</script>`), case-insensitively.
fn remove_tag_block(html: &str, tag: &str) -> String {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let mut result = String::with_capacity(html.len());
    let mut remaining = html;

    while let Some(start) = remaining.to_ascii_lowercase().find(&open) {
        result.push_str(&remaining[..start]);
        let after = &remaining[start..];
        match after.to_ascii_lowercase().find(&close) {
            Some(end) => remaining = &after[end + close.len()..],
            None => {
                remaining = "";
                break;
            }
        }
    }
    result.push_str(remaining);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &[u8] = b"From: Billing Team <billing@shop.example>\r\n\
Subject: Invoice 2024-03 ready\r\n\
Date: Mon, 04 Mar 2024 10:00:00 +0000\r\n\
Message-ID: <inv-1@shop.example>\r\n\
In-Reply-To: <req-9@me.example>\r\n\
References: <req-1@me.example> <req-9@me.example>\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Your invoice for March is attached.\r\n";

    #[test]
    fn test_parse_headers_and_body() {
        let m = parse_message(RAW, "42", "INBOX");
        assert_eq!(m.id, "42");
        assert_eq!(m.folder, "INBOX");
        assert_eq!(m.subject, "Invoice 2024-03 ready");
        assert_eq!(m.sender.address, "billing@shop.example");
        assert_eq!(m.sender.display_name, "Billing Team");
        assert_eq!(m.message_id, "inv-1@shop.example");
        assert_eq!(m.in_reply_to.as_deref(), Some("req-9@me.example"));
        assert_eq!(m.references.len(), 2);
        assert!(m.body.contains("invoice for March"));
        assert_eq!(m.received.to_rfc3339(), "2024-03-04T10:00:00+00:00");
    }

    #[test]
    fn test_missing_headers_are_empty() {
        let m = parse_message(b"\r\nJust a body\r\n", "1", "INBOX");
        assert!(m.sender.is_empty());
        assert_eq!(m.subject, "");
    }

    #[test]
    fn test_html_only_body_is_converted() {
        let raw = b"From: a@b.example\r\nSubject: Hi\r\nContent-Type: text/html\r\n\r\n<p>Hello <b>world</b></p>";
        let m = parse_message(raw, "1", "INBOX");
        assert!(m.body.contains("Hello"));
        assert!(m.body.contains("world"));
        assert!(!m.body.contains("<p>"));
    }

    #[test]
    fn test_html_to_text_entities() {
        assert_eq!(html_to_text("Tom &amp; Jerry &lt;3&gt;"), "Tom & Jerry <3>");
    }

    #[test]
    fn test_remove_tag_block_uppercase() {
        assert_eq!(remove_tag_block("a<STYLE>p{}</STYLE>b", "style"), "ab");
    }
}
