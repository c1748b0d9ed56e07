//! Partial-marker overlap detection.
//!
//! When the tail of a buffer could be the beginning of a marker that has not
//! fully arrived yet, that tail must be held back instead of being forwarded.

/// Longest suffix of `text` that is a proper prefix of any candidate.
///
/// Only suffixes starting on a char boundary are considered. The result is
/// always smaller than the longest candidate, so the amount of withheld text
/// is bounded by the marker set and not by the buffer size.
pub fn compute_overlap_length<S: AsRef<str>>(text: &str, candidates: &[S]) -> usize {
    candidates
        .iter()
        .map(|candidate| overlap_with(text, candidate.as_ref()))
        .max()
        .unwrap_or(0)
}

fn overlap_with(text: &str, candidate: &str) -> usize {
    let max_len = text.len().min(candidate.len().saturating_sub(1));
    let text_bytes = text.as_bytes();
    let candidate_bytes = candidate.as_bytes();

    for len in (1..=max_len).rev() {
        let start = text.len() - len;
        if !text.is_char_boundary(start) {
            continue;
        }
        if candidate_bytes.starts_with(&text_bytes[start..]) {
            return len;
        }
    }
    0
}

/// Length of a trailing `[name` that could still become a bracket call.
///
/// The name may be empty (a lone `[`) but not longer than `max_name_len`
/// word characters. Only that many characters from the end are inspected.
pub fn bracket_call_overlap(text: &str, max_name_len: usize) -> usize {
    let mut name_len = 0;
    for (idx, ch) in text.char_indices().rev() {
        if ch == '[' {
            return text.len() - idx;
        }
        if !is_word_char(ch) || name_len == max_name_len {
            return 0;
        }
        name_len += 1;
    }
    0
}

/// Matches the regex `\w` class
pub(crate) fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}
