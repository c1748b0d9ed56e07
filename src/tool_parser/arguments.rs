//! Incremental extraction of the `"arguments"` value from a growing fence body.
//!
//! The fence text only ever grows while a fence is open. The scan state
//! remembers how far it has looked, so every call touches only the newly
//! appended bytes and the deltas concatenate to exactly the value a one-shot
//! extraction would return.

use std::sync::LazyLock;

use regex::Regex;

use crate::tool_parser::helpers::floor_char_boundary;

/// How far back the key search restarts after a miss, so a key split across
/// chunks is still found.
pub const ARGUMENT_KEY_WINDOW: usize = 32;

static ARGUMENTS_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""arguments"\s*:"#).expect("Valid regex pattern"));

const NAME_KEY: &str = "\"name\"";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum ValueShape {
    #[default]
    Container,
    String,
    Scalar,
}

/// Resumable scan state for one tool call's arguments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgumentsStreamState {
    /// Where the next key search starts
    pub search_from: usize,
    /// Byte offset just past the key's colon, once the key is found
    pub value_start_index: Option<usize>,
    /// Next byte to scan
    pub parse_index: usize,
    /// The first non-whitespace byte of the value has been seen
    pub started: bool,
    /// Bracket depth of the value
    pub depth: u32,
    pub in_string: bool,
    pub escaped: bool,
    /// The value is closed; every later call yields ""
    pub complete: bool,
    shape: ValueShape,
}

impl ArgumentsStreamState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next slice of the argument value available in `text`.
    ///
    /// `text` must be the same growing string on every call.
    pub fn next_delta<'a>(&mut self, text: &'a str) -> &'a str {
        extract_argument_delta(text, self)
    }
}

/// Return the newly available part of the `"arguments"` value in `text`
pub fn extract_argument_delta<'a>(text: &'a str, state: &mut ArgumentsStreamState) -> &'a str {
    extract_argument_delta_with_window(text, state, ARGUMENT_KEY_WINDOW)
}

/// Same as [`extract_argument_delta`] with a custom key search window
pub fn extract_argument_delta_with_window<'a>(
    text: &'a str,
    state: &mut ArgumentsStreamState,
    window: usize,
) -> &'a str {
    if state.complete {
        return "";
    }

    if state.value_start_index.is_none() && !locate_key(text, state, window) {
        return "";
    }

    let bytes = text.as_bytes();
    let mut i = state.parse_index;

    let delta_start = if state.started {
        i
    } else {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        state.parse_index = i;
        if i >= bytes.len() {
            return "";
        }

        state.started = true;
        state.shape = match bytes[i] {
            b'{' | b'[' => {
                state.depth = 1;
                ValueShape::Container
            }
            b'"' => {
                state.in_string = true;
                ValueShape::String
            }
            _ => ValueShape::Scalar,
        };
        let start = i;
        i += 1;
        start
    };

    let mut end = bytes.len();
    while i < bytes.len() {
        let byte = bytes[i];
        i += 1;

        if state.escaped {
            state.escaped = false;
            continue;
        }

        if state.in_string {
            match byte {
                b'\\' => state.escaped = true,
                b'"' => {
                    state.in_string = false;
                    if state.shape == ValueShape::String {
                        state.complete = true;
                        end = i;
                        break;
                    }
                }
                _ => {}
            }
            continue;
        }

        match state.shape {
            ValueShape::Container => match byte {
                b'"' => state.in_string = true,
                b'{' | b'[' => state.depth += 1,
                b'}' | b']' => {
                    state.depth = state.depth.saturating_sub(1);
                    if state.depth == 0 {
                        state.complete = true;
                        end = i;
                        break;
                    }
                }
                _ => {}
            },
            ValueShape::Scalar => {
                if matches!(byte, b',' | b'}' | b']') || byte.is_ascii_whitespace() {
                    state.complete = true;
                    end = i - 1;
                    break;
                }
            }
            ValueShape::String => {}
        }
    }

    state.parse_index = end;
    &text[delta_start..end]
}

fn locate_key(text: &str, state: &mut ArgumentsStreamState, window: usize) -> bool {
    let from = floor_char_boundary(text, state.search_from);
    match ARGUMENTS_KEY.find_at(text, from) {
        Some(found) => {
            state.value_start_index = Some(found.end());
            state.parse_index = found.end();
            true
        }
        None => {
            let restart = floor_char_boundary(text, text.len().saturating_sub(window));
            state.search_from = state.search_from.max(restart);
            false
        }
    }
}

/// One-shot extraction: the full `"arguments"` value, if one has started
pub fn extract_arguments(text: &str) -> Option<&str> {
    let mut state = ArgumentsStreamState::new();
    let value = extract_argument_delta(text, &mut state);
    state.started.then_some(value)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum NamePhase {
    #[default]
    Key,
    Colon,
    Open,
    /// Inside the name string, which opened at this offset
    Value(usize),
}

/// Resumable search for the `"name"` string of a partial tool call object
#[derive(Debug, Clone, Default)]
pub struct NameScanState {
    search_from: usize,
    phase: NamePhase,
    escaped: bool,
    found: bool,
}

impl NameScanState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn found(&self) -> bool {
        self.found
    }

    /// Restart the key search at `offset`, dropping any partial match before it
    pub fn skip_to(&mut self, offset: usize) {
        if offset > self.search_from {
            self.search_from = offset;
            self.phase = NamePhase::Key;
            self.escaped = false;
        }
    }
}

/// Find the tool name in a partial fence body.
///
/// Only the region before `limit` is searched, which keeps `"name"` keys
/// nested inside the arguments value out of reach. The scan resumes where
/// the previous call stopped, even inside an unfinished name string. Returns
/// the name once, the first time it is complete.
pub fn extract_tool_name(text: &str, limit: usize, state: &mut NameScanState) -> Option<String> {
    if state.found {
        return None;
    }

    let region = &text[..floor_char_boundary(text, limit)];
    let bytes = region.as_bytes();
    let mut i = state.search_from.min(bytes.len());

    loop {
        match state.phase {
            NamePhase::Key => {
                let from = floor_char_boundary(region, i);
                match region[from..].find(NAME_KEY) {
                    Some(pos) => {
                        i = from + pos + NAME_KEY.len();
                        state.phase = NamePhase::Colon;
                    }
                    None => {
                        // A key split across chunks may still be arriving
                        let tail = region.len().saturating_sub(NAME_KEY.len() - 1);
                        state.search_from = floor_char_boundary(region, tail).max(from);
                        return None;
                    }
                }
            }
            NamePhase::Colon | NamePhase::Open => {
                while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
                if i >= bytes.len() {
                    state.search_from = i;
                    return None;
                }

                state.phase = match (state.phase, bytes[i]) {
                    (NamePhase::Colon, b':') => NamePhase::Open,
                    (NamePhase::Open, b'"') => NamePhase::Value(i),
                    _ => NamePhase::Key,
                };
                if state.phase != NamePhase::Key {
                    i += 1;
                }
            }
            NamePhase::Value(open) => {
                while i < bytes.len() {
                    let byte = bytes[i];
                    i += 1;
                    if state.escaped {
                        state.escaped = false;
                    } else if byte == b'\\' {
                        state.escaped = true;
                    } else if byte == b'"' {
                        state.found = true;
                        return serde_json::from_str::<String>(&region[open..i]).ok();
                    }
                }
                state.search_from = i;
                return None;
            }
        }
    }
}
