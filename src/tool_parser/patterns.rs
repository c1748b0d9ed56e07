//! Fence marker catalog.
//!
//! Literal patterns are searched as plain substrings. The bracket call
//! `[name(...)]` has no fixed start marker and is found with a regex scan.

use regex::Regex;
use serde::Serialize;

use crate::{
    config::{FenceConfig, FencePatternConfig},
    tool_parser::{
        helpers::floor_char_boundary,
        overlap::{bracket_call_overlap, compute_overlap_length, is_word_char},
    },
};

pub const MARKDOWN_END: &str = "```";
pub const XML_START: &str = "<tool_call>";
pub const XML_END: &str = "</tool_call>";
pub const BRACKET_CALL_END: &str = ")]";

/// Markdown fence spellings, in declaration order
pub const MARKDOWN_STARTS: [&str; 3] = ["```tool_call", "```tool-call", "```toolcall"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Literal,
    BracketCall,
}

/// A start/end marker pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FencePattern {
    pub start: String,
    pub end: String,
    /// Prepended to the fence content when rebuilding the body for the parser
    pub reconstruct_prefix: String,
    pub kind: PatternKind,
    /// Swallow a single `\n` directly after the start marker
    pub consume_newline: bool,
}

impl FencePattern {
    pub fn literal(
        start: impl Into<String>,
        end: impl Into<String>,
        reconstruct_prefix: impl Into<String>,
    ) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            reconstruct_prefix: reconstruct_prefix.into(),
            kind: PatternKind::Literal,
            consume_newline: false,
        }
    }

    pub fn markdown(start: &str) -> Self {
        Self {
            start: start.to_string(),
            end: MARKDOWN_END.to_string(),
            reconstruct_prefix: format!("{}\n", start),
            kind: PatternKind::Literal,
            consume_newline: true,
        }
    }

    pub fn xml() -> Self {
        Self::literal(XML_START, XML_END, XML_START)
    }

    /// Pattern for a bracket call whose name has already been matched
    pub fn bracket_call(name: &str) -> Self {
        let start = format!("[{}(", name);
        Self {
            reconstruct_prefix: start.clone(),
            start,
            end: BRACKET_CALL_END.to_string(),
            kind: PatternKind::BracketCall,
            consume_newline: false,
        }
    }

    /// Call name for bracket-call patterns
    pub fn bracket_name(&self) -> Option<&str> {
        match self.kind {
            PatternKind::BracketCall => self
                .start
                .strip_prefix('[')
                .and_then(|rest| rest.strip_suffix('(')),
            PatternKind::Literal => None,
        }
    }
}

impl From<&FencePatternConfig> for FencePattern {
    fn from(config: &FencePatternConfig) -> Self {
        Self {
            start: config.start.clone(),
            end: config.end.clone(),
            reconstruct_prefix: config
                .reconstruct_prefix
                .clone()
                .unwrap_or_else(|| config.start.clone()),
            kind: PatternKind::Literal,
            consume_newline: config.consume_newline,
        }
    }
}

/// Earliest start marker found in a buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternMatch<'a> {
    Literal {
        offset: usize,
        pattern: &'a FencePattern,
    },
    BracketCall {
        offset: usize,
        /// Length of the matched `[name(`
        len: usize,
        name: &'a str,
    },
}

impl PatternMatch<'_> {
    pub fn offset(&self) -> usize {
        match self {
            PatternMatch::Literal { offset, .. } | PatternMatch::BracketCall { offset, .. } => {
                *offset
            }
        }
    }
}

/// The set of patterns a detector recognizes, fixed at construction
#[derive(Debug, Clone)]
pub struct FencePatternTable {
    literals: Vec<FencePattern>,
    start_markers: Vec<String>,
    bracket_call: Option<Regex>,
    max_bracket_name_len: usize,
}

impl FencePatternTable {
    pub fn new(
        literals: Vec<FencePattern>,
        bracket_calls: bool,
        max_bracket_name_len: usize,
    ) -> Self {
        let start_markers = literals.iter().map(|p| p.start.clone()).collect();
        let bracket_call = bracket_calls
            .then(|| Regex::new(r"\[(\w+)\(").expect("Valid regex pattern"));

        Self {
            literals,
            start_markers,
            bracket_call,
            max_bracket_name_len,
        }
    }

    /// Markdown spellings, XML tags and bracket calls
    pub fn builtin() -> Self {
        Self::from_config(&FenceConfig::default())
    }

    pub fn from_config(config: &FenceConfig) -> Self {
        Self::new(
            config.patterns.iter().map(FencePattern::from).collect(),
            config.bracket_calls,
            config.max_bracket_name_len,
        )
    }

    pub fn literals(&self) -> &[FencePattern] {
        &self.literals
    }

    pub fn bracket_calls_enabled(&self) -> bool {
        self.bracket_call.is_some()
    }

    /// Find the earliest start marker in `text`.
    ///
    /// Ties at the same offset go to the earliest declared literal, and any
    /// literal beats a bracket call.
    pub fn find_earliest<'a>(&'a self, text: &'a str) -> Option<PatternMatch<'a>> {
        self.find_earliest_from(text, 0, &mut StartHints::default())
    }

    /// Earliest start marker at or after `from`, resuming earlier searches.
    ///
    /// `text` may only have grown since the previous call with the same
    /// `hints`, and `from` may only have moved forward. Under that contract
    /// every byte is searched a bounded number of times per pattern.
    pub fn find_earliest_from<'a>(
        &'a self,
        text: &'a str,
        from: usize,
        hints: &mut StartHints,
    ) -> Option<PatternMatch<'a>> {
        if hints.literals.len() != self.literals.len() {
            hints.literals = vec![SearchHint::default(); self.literals.len()];
        }

        let mut best: Option<PatternMatch<'a>> = None;

        for (pattern, hint) in self.literals.iter().zip(hints.literals.iter_mut()) {
            let found = hint.resolve(text, from, |start| {
                match text[start..].find(pattern.start.as_str()) {
                    Some(pos) => SearchHint::At {
                        offset: start + pos,
                        len: pattern.start.len(),
                    },
                    None => {
                        let tail = pattern.start.len().saturating_sub(1);
                        SearchHint::NotBefore(text.len().saturating_sub(tail).max(start))
                    }
                }
            });
            if let Some((offset, _)) = found {
                if best.as_ref().is_none_or(|b| offset < b.offset()) {
                    best = Some(PatternMatch::Literal { offset, pattern });
                }
            }
        }

        if let Some(regex) = &self.bracket_call {
            let found = hints.bracket.resolve(text, from, |start| {
                match regex.find_at(text, start) {
                    Some(m) => SearchHint::At {
                        offset: m.start(),
                        len: m.len(),
                    },
                    None => SearchHint::NotBefore(open_bracket_tail(text, start)),
                }
            });
            if let Some((offset, len)) = found {
                if best.as_ref().is_none_or(|b| offset < b.offset()) {
                    best = Some(PatternMatch::BracketCall {
                        offset,
                        len,
                        name: &text[offset + 1..offset + len - 1],
                    });
                }
            }
        }

        best
    }

    /// How much of the tail of `text` could still turn into a start marker
    pub fn start_overlap(&self, text: &str) -> usize {
        let literal = compute_overlap_length(text, &self.start_markers);
        if self.bracket_calls_enabled() {
            literal.max(bracket_call_overlap(text, self.max_bracket_name_len))
        } else {
            literal
        }
    }
}

/// Resume point of one pattern's search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchHint {
    /// Earliest occurrence from the last search start
    At { offset: usize, len: usize },
    /// No occurrence starts before this offset
    NotBefore(usize),
}

impl Default for SearchHint {
    fn default() -> Self {
        SearchHint::NotBefore(0)
    }
}

impl SearchHint {
    /// Occurrence at or after `from`, searching only what is not yet known
    fn resolve(
        &mut self,
        text: &str,
        from: usize,
        search: impl FnOnce(usize) -> SearchHint,
    ) -> Option<(usize, usize)> {
        let start = match *self {
            SearchHint::At { offset, len } if offset >= from => return Some((offset, len)),
            SearchHint::At { .. } => from,
            SearchHint::NotBefore(pos) => floor_char_boundary(text, pos.max(from)),
        };

        *self = search(start);
        match *self {
            SearchHint::At { offset, len } => Some((offset, len)),
            SearchHint::NotBefore(_) => None,
        }
    }

    fn shift(&mut self, by: usize) {
        *self = match *self {
            SearchHint::At { offset, len } if offset >= by => SearchHint::At {
                offset: offset - by,
                len,
            },
            SearchHint::At { .. } => SearchHint::NotBefore(0),
            SearchHint::NotBefore(pos) => SearchHint::NotBefore(pos.saturating_sub(by)),
        };
    }
}

/// Per-detector search state for [`FencePatternTable::find_earliest_from`]
#[derive(Debug, Clone, Default)]
pub struct StartHints {
    literals: Vec<SearchHint>,
    bracket: SearchHint,
}

impl StartHints {
    /// The first `by` bytes of the searched text were dropped
    pub fn shift(&mut self, by: usize) {
        for hint in &mut self.literals {
            hint.shift(by);
        }
        self.bracket.shift(by);
    }
}

/// Offset of a trailing `[word` that a later `(` could still complete,
/// else the end of `text`
fn open_bracket_tail(text: &str, floor: usize) -> usize {
    let trimmed = text[floor..].trim_end_matches(is_word_char);
    if trimmed.ends_with('[') {
        floor + trimmed.len() - 1
    } else {
        text.len()
    }
}

impl Default for FencePatternTable {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table() {
        let table = FencePatternTable::builtin();
        let starts: Vec<&str> = table.literals().iter().map(|p| p.start.as_str()).collect();
        assert_eq!(
            starts,
            vec!["```tool_call", "```tool-call", "```toolcall", "<tool_call>"]
        );
        assert!(table.bracket_calls_enabled());
    }

    #[test]
    fn test_find_earliest_by_offset() {
        let table = FencePatternTable::builtin();
        let text = "abc <tool_call> then ```tool_call";
        match table.find_earliest(text) {
            Some(PatternMatch::Literal { offset, pattern }) => {
                assert_eq!(offset, 4);
                assert_eq!(pattern.start, "<tool_call>");
            }
            other => panic!("unexpected match: {:?}", other),
        }
    }

    #[test]
    fn test_find_earliest_bracket_call() {
        let table = FencePatternTable::builtin();
        let text = "see [search(query=\"x\")] and <tool_call>";
        match table.find_earliest(text) {
            Some(PatternMatch::BracketCall { offset, len, name }) => {
                assert_eq!(offset, 4);
                assert_eq!(len, "[search(".len());
                assert_eq!(name, "search");
            }
            other => panic!("unexpected match: {:?}", other),
        }
    }

    #[test]
    fn test_literal_wins_tie_against_bracket_call() {
        let literal = FencePattern::literal("[tool(", ")]", "[tool(");
        let table = FencePatternTable::new(vec![literal], true, 64);
        match table.find_earliest("x [tool(a=1)]") {
            Some(PatternMatch::Literal { offset, pattern }) => {
                assert_eq!(offset, 2);
                assert_eq!(pattern.start, "[tool(");
            }
            other => panic!("unexpected match: {:?}", other),
        }
    }

    #[test]
    fn test_bracket_calls_disabled() {
        let table = FencePatternTable::new(vec![FencePattern::xml()], false, 64);
        assert!(table.find_earliest("[search(q=1)]").is_none());
        assert_eq!(table.start_overlap("text [sea"), 0);
    }

    #[test]
    fn test_start_overlap() {
        let table = FencePatternTable::builtin();
        assert_eq!(table.start_overlap("hello ``"), 2);
        assert_eq!(table.start_overlap("hello [get_we"), 7);
        assert_eq!(table.start_overlap("hello"), 0);
    }

    #[test]
    fn test_find_earliest_from_resumes_on_growing_text() {
        let table = FencePatternTable::builtin();
        let mut hints = StartHints::default();
        let mut text = String::from("ab <tool");
        assert!(table.find_earliest_from(&text, 0, &mut hints).is_none());

        text.push_str("_call> [sea");
        match table.find_earliest_from(&text, 0, &mut hints) {
            Some(PatternMatch::Literal { offset, pattern }) => {
                assert_eq!(offset, 3);
                assert_eq!(pattern.start, "<tool_call>");
            }
            other => panic!("unexpected match: {:?}", other),
        }

        // Past the literal only the split bracket call remains
        let from = text.find(' ').unwrap() + "<tool_call>".len() + 1;
        assert!(table.find_earliest_from(&text, from, &mut hints).is_none());
        text.push_str("rch(q=1)]");
        match table.find_earliest_from(&text, from, &mut hints) {
            Some(PatternMatch::BracketCall { offset, name, .. }) => {
                assert_eq!(offset, 15);
                assert_eq!(name, "search");
            }
            other => panic!("unexpected match: {:?}", other),
        }
    }

    #[test]
    fn test_find_earliest_from_skips_consumed_matches() {
        let table = FencePatternTable::builtin();
        let mut hints = StartHints::default();
        let text = "<tool_call>a</tool_call> <tool_call>b";
        assert_eq!(
            table
                .find_earliest_from(text, 0, &mut hints)
                .map(|m| m.offset()),
            Some(0)
        );
        assert_eq!(
            table
                .find_earliest_from(text, 24, &mut hints)
                .map(|m| m.offset()),
            Some(25)
        );
    }

    #[test]
    fn test_hints_follow_dropped_prefix() {
        let table = FencePatternTable::builtin();
        let mut hints = StartHints::default();
        let mut text = String::from("xxxx <tool_call>");
        assert_eq!(
            table
                .find_earliest_from(&text, 2, &mut hints)
                .map(|m| m.offset()),
            Some(5)
        );

        text.drain(..4);
        hints.shift(4);
        assert_eq!(
            table
                .find_earliest_from(&text, 0, &mut hints)
                .map(|m| m.offset()),
            Some(1)
        );
    }

    #[test]
    fn test_open_bracket_tail() {
        assert_eq!(open_bracket_tail("see [sea", 0), 4);
        assert_eq!(open_bracket_tail("see [sea", 5), 8);
        assert_eq!(open_bracket_tail("see [a b", 0), 8);
        assert_eq!(open_bracket_tail("x [", 0), 2);
    }

    #[test]
    fn test_bracket_pattern_name() {
        let pattern = FencePattern::bracket_call("search");
        assert_eq!(pattern.start, "[search(");
        assert_eq!(pattern.reconstruct_prefix, "[search(");
        assert_eq!(pattern.end, ")]");
        assert_eq!(pattern.bracket_name(), Some("search"));
        assert_eq!(FencePattern::xml().bracket_name(), None);
    }
}
