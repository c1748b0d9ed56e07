use chrono::Utc;
use rand::Rng;

const CALL_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const CALL_ID_SUFFIX_LEN: usize = 7;

/// Generate a tool call id of the form `call_<unix millis>_<7 chars of [a-z0-9]>`
pub fn generate_call_id() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..CALL_ID_SUFFIX_LEN)
        .map(|_| CALL_ID_ALPHABET[rng.random_range(0..CALL_ID_ALPHABET.len())] as char)
        .collect();

    format!("call_{}_{}", Utc::now().timestamp_millis(), suffix)
}

/// Largest char boundary of `text` that is <= `index`
pub fn floor_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }

    let mut idx = index;
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Strip one pair of matching surrounding quotes (`"..."` or `'...'`)
pub fn strip_matching_quotes(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' || first == b'\'') && first == last {
            return &value[1..value.len() - 1];
        }
    }
    value
}
