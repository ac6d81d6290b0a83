//! Text normalization for noisy OCR output.
//!
//! Everything here is deterministic and allocation-light. The same functions
//! are applied to both sides of every comparison so OCR noise in the query and
//! formatting noise in Reddit content are reduced symmetrically.

/// Maximum number of keywords kept by [`extract_keywords`].
pub const MAX_KEYWORDS: usize = 6;

/// Longest identifier Reddit accepts for usernames; subreddit names are shorter.
pub const MAX_IDENTIFIER_LEN: usize = 25;

/// Usernames the vision step emits when it could not read a real one.
const GENERIC_USERNAMES: &[&str] = &["redacted", "deleted", "[deleted]", "unknown"];

/// Common English words that carry no search signal.
///
/// Stored in punctuation-stripped form since they are compared after stripping.
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "her", "was",
    "one", "our", "out", "has", "him", "his", "how", "its", "may", "who", "did", "get", "she",
    "too", "use", "this", "that", "with", "have", "from", "they", "been", "were", "what",
    "when", "your", "will", "would", "there", "their", "them", "then", "than", "into", "just",
    "about", "could", "should", "which", "these", "those", "some", "being", "does", "doing",
    "im", "ive", "dont", "also", "very", "here",
];

fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(&token)
}

/// Lowercase, drop punctuation and collapse whitespace.
///
/// Characters that are neither alphanumeric nor whitespace are removed outright,
/// so "don't" becomes "dont" rather than two tokens.
pub fn normalize_text(text: &str) -> String {
    let stripped: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Reduce free text to at most six significant keywords, in original order.
///
/// Tokens of two characters or fewer and stop words are dropped. Returns an
/// empty string when nothing significant remains; callers treat that as "this
/// query variant cannot be built".
pub fn extract_keywords(text: &str) -> String {
    normalize_text(text)
        .split(' ')
        .filter(|token| token.chars().count() > 2)
        .filter(|token| !is_stop_word(token))
        .take(MAX_KEYWORDS)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether a username is one of the placeholders for "could not be read".
pub fn is_generic_username(username: &str) -> bool {
    let lowered = strip_prefix_marker(username.trim()).to_lowercase();
    GENERIC_USERNAMES.contains(&lowered.as_str())
}

/// Make a username or subreddit name safe to embed in a Reddit URL.
///
/// Drops a leading `u/` or `r/` marker, keeps only `[A-Za-z0-9_-]` and caps the
/// length. Returns `None` when nothing usable is left.
pub fn sanitize_identifier(raw: &str) -> Option<String> {
    let cleaned: String = strip_prefix_marker(raw.trim())
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .take(MAX_IDENTIFIER_LEN)
        .collect();

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

fn strip_prefix_marker(value: &str) -> &str {
    let value = value.strip_prefix('/').unwrap_or(value);
    for marker in ["u/", "U/", "r/", "R/"] {
        if let Some(rest) = value.strip_prefix(marker) {
            return rest;
        }
    }
    value
}

/// First `max_chars` characters of the normalized text.
pub fn normalized_prefix(text: &str, max_chars: usize) -> String {
    normalize_text(text).chars().take(max_chars).collect()
}
