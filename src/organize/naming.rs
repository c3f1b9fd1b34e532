//! Folder naming: sanitization, recognition, and category name derivation.

use std::collections::{BTreeMap, HashSet};

use crate::model::FolderListing;
use crate::text::{SparseVector, Vectorizer};

/// Leaf prefix marking a category folder.
pub const CATEGORY_PREFIX: &str = "Category_";

/// Root under which new category folders are created.
pub const INBOX: &str = "INBOX";

/// `true` for characters allowed in a folder segment.
fn is_safe_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

/// ASCII replacement for common accented Latin letters.
fn fold_char(c: char) -> Option<&'static str> {
    let s = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ą' | 'ā' => "a",
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' | 'Ą' | 'Ā' => "A",
        'ç' | 'ć' | 'č' => "c",
        'Ç' | 'Ć' | 'Č' => "C",
        'ď' => "d",
        'Ď' => "D",
        'è' | 'é' | 'ê' | 'ë' | 'ę' | 'ě' | 'ē' => "e",
        'È' | 'É' | 'Ê' | 'Ë' | 'Ę' | 'Ě' | 'Ē' => "E",
        'ì' | 'í' | 'î' | 'ï' | 'ī' => "i",
        'Ì' | 'Í' | 'Î' | 'Ï' | 'Ī' => "I",
        'ł' => "l",
        'Ł' => "L",
        'ñ' | 'ń' | 'ň' => "n",
        'Ñ' | 'Ń' | 'Ň' => "N",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' => "o",
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' | 'Ō' => "O",
        'ř' => "r",
        'Ř' => "R",
        'ś' | 'š' | 'ş' => "s",
        'Ś' | 'Š' | 'Ş' => "S",
        'ß' => "ss",
        'ť' => "t",
        'Ť' => "T",
        'ù' | 'ú' | 'û' | 'ü' | 'ů' | 'ū' => "u",
        'Ù' | 'Ú' | 'Û' | 'Ü' | 'Ů' | 'Ū' => "U",
        'ý' | 'ÿ' => "y",
        'Ý' => "Y",
        'ź' | 'ż' | 'ž' => "z",
        'Ź' | 'Ż' | 'Ž' => "Z",
        _ => return None,
    };
    Some(s)
}

/// Make one folder segment safe for any hierarchy delimiter.
///
/// Accented letters are folded to ASCII and other non-ASCII characters
/// dropped. Whitespace, the delimiter, and anything outside
/// `[A-Za-z0-9._-]` become `_`; runs of `_` collapse and leading or
/// trailing `_` are trimmed. An empty result becomes `Category`.
///
/// Idempotent, and the output never contains the delimiter.
pub fn sanitize(segment: &str, delimiter: &str) -> String {
    let mut folded = String::with_capacity(segment.len());
    for c in segment.chars() {
        if c.is_ascii() {
            folded.push(c);
        } else if let Some(ascii) = fold_char(c) {
            folded.push_str(ascii);
        }
    }

    let mut out = String::with_capacity(folded.len());
    for c in folded.chars() {
        let keep = is_safe_char(c) && !delimiter.contains(c);
        let c = if keep { c } else { '_' };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }

    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "Category".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `true` if `segment` is non-empty and only uses `[A-Za-z0-9._-]`.
pub fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty() && segment.chars().all(is_safe_char)
}

/// `true` if `name` is a category folder: below `INBOX` with a leaf
/// starting with `Category_` (any case).
pub fn is_category_folder(name: &str, listing: &FolderListing) -> bool {
    let Some(parent) = listing.parent(name) else {
        return false;
    };
    let root = parent.split(listing.delimiter.as_str()).next().unwrap_or(parent);
    root.eq_ignore_ascii_case(INBOX) && has_category_prefix(listing.leaf(name))
}

fn has_category_prefix(leaf: &str) -> bool {
    leaf.get(..CATEGORY_PREFIX.len())
        .is_some_and(|p| p.eq_ignore_ascii_case(CATEGORY_PREFIX))
}

/// `true` for a spam/junk folder.
pub fn is_spam_folder(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.contains("spam") || lower.contains("junk")
}

/// `true` for a trash/deleted-items folder.
pub fn is_trash_folder(name: &str) -> bool {
    let lower = name.to_lowercase();
    ["trash", "deleted", "bin", "kosz"]
        .iter()
        .any(|k| lower.contains(k))
}

/// `true` for a Sent or Drafts folder.
pub fn is_history_folder(name: &str) -> bool {
    let lower = name.to_lowercase();
    ["sent", "wysłane", "wyslane", "drafts", "draft", "robocze"]
        .iter()
        .any(|k| lower.contains(k))
}

/// Where spam goes: the first existing spam/junk folder, or
/// `INBOX<delim>SPAM`. The flag is `true` if the folder must be created.
/// Category folders never qualify, whatever their leaf says.
pub fn spam_destination(listing: &FolderListing) -> (String, bool) {
    match listing
        .names()
        .find(|n| is_spam_folder(n) && !is_category_folder(n, listing))
    {
        Some(existing) => (existing.to_string(), false),
        None => (listing.join(INBOX, "SPAM"), true),
    }
}

/// Folders whose messages are cross-folder spam references.
/// Category folders are excluded.
pub fn reference_folders(listing: &FolderListing) -> Vec<String> {
    listing
        .names()
        .filter(|n| !is_category_folder(n, listing))
        .filter(|n| is_spam_folder(n) || is_trash_folder(n))
        .map(str::to_string)
        .collect()
}

/// Sanitized category leaf, with the `Category_` prefix ensured.
pub fn category_leaf(raw: &str, delimiter: &str) -> String {
    let safe = sanitize(raw, delimiter);
    if has_category_prefix(&safe) {
        safe
    } else {
        sanitize(&format!("{CATEGORY_PREFIX}{safe}"), delimiter)
    }
}

/// First free name among `base`, `base_2`, `base_3`, …
///
/// `taken` holds lower-cased names; comparison ignores case so two
/// folders never differ only by case.
pub fn disambiguate(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(&base.to_lowercase()) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{base}_{n}"))
        .find(|candidate| !taken.contains(&candidate.to_lowercase()))
        .unwrap_or_else(|| base.to_string())
}

/// Derive a category leaf from a cluster.
///
/// Uses the most frequent subject word longer than three characters
/// (ties lexicographic), else the highest-weight centroid term, else
/// `Misc`.
pub fn derive_category_leaf(
    subjects: &[&str],
    vectorizer: &Vectorizer,
    centroid: &SparseVector,
    delimiter: &str,
) -> String {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for subject in subjects {
        for word in subject.split_whitespace() {
            let word = word
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if word.chars().count() > 3 {
                *counts.entry(word).or_default() += 1;
            }
        }
    }

    // BTreeMap iterates lexicographically; keep the first maximum.
    let mut best: Option<(&str, usize)> = None;
    for (word, &n) in &counts {
        if best.is_none_or(|(_, top)| n > top) {
            best = Some((word.as_str(), n));
        }
    }

    let stem = best
        .map(|(w, _)| w)
        .or_else(|| vectorizer.top_term(centroid))
        .unwrap_or("misc");
    category_leaf(&format!("{CATEGORY_PREFIX}{}", capitalize(stem)), delimiter)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
