//! Streaming fence detector.
//!
//! Text arrives in fragments with arbitrary boundaries. Everything that
//! cannot be part of a marker is handed back immediately, and at most one
//! marker length is ever withheld. Resolved text is skipped with a cursor
//! rather than cut out of the buffer, and marker searches resume where they
//! stopped, so a whole stream costs linear work no matter how it was chunked
//! or how many fences one chunk holds.

use tracing::debug;

use crate::{
    config::FenceConfig,
    tool_parser::{
        overlap::compute_overlap_length,
        patterns::{FencePattern, FencePatternTable, PatternMatch, StartHints},
        types::{CompletedFence, DetectStep},
    },
};

pub struct StreamingFenceDetector {
    table: FencePatternTable,
    /// Received input; `buffer[cursor..]` is the unresolved tail
    buffer: String,
    /// Bytes of `buffer` already handed out
    cursor: usize,
    /// Resume points of the start marker searches
    hints: StartHints,
    /// Pattern of the open fence, `None` outside fences
    active_pattern: Option<FencePattern>,
    /// Content of the open fence seen so far
    fence_accumulator: String,
    /// Start marker text exactly as it arrived, kept for flushing
    raw_open: String,
}

impl StreamingFenceDetector {
    /// Create a detector for the built-in pattern set
    pub fn new() -> Self {
        Self::with_table(FencePatternTable::builtin())
    }

    pub fn with_table(table: FencePatternTable) -> Self {
        Self {
            table,
            buffer: String::new(),
            cursor: 0,
            hints: StartHints::default(),
            active_pattern: None,
            fence_accumulator: String::new(),
            raw_open: String::new(),
        }
    }

    pub fn from_config(config: &FenceConfig) -> Self {
        Self::with_table(FencePatternTable::from_config(config))
    }

    pub fn add_chunk(&mut self, chunk: &str) {
        self.compact();
        self.buffer.push_str(chunk);
    }

    pub fn has_content(&self) -> bool {
        self.cursor < self.buffer.len()
    }

    pub fn in_fence(&self) -> bool {
        self.active_pattern.is_some()
    }

    pub fn active_pattern(&self) -> Option<&FencePattern> {
        self.active_pattern.as_ref()
    }

    /// Content of the open fence so far. Only ever grows while the fence is open.
    pub fn fence_text(&self) -> &str {
        &self.fence_accumulator
    }

    /// Text currently withheld
    pub fn pending(&self) -> &str {
        &self.buffer[self.cursor..]
    }

    pub fn patterns(&self) -> &FencePatternTable {
        &self.table
    }

    /// Advance the state machine by one transition.
    ///
    /// Returns `None` when nothing more can be decided without further input.
    /// Callers drive it with `while let Some(step) = detector.detect_step()`.
    pub fn detect_step(&mut self) -> Option<DetectStep> {
        if !self.has_content() {
            return None;
        }

        if self.active_pattern.is_some() {
            self.step_in_fence()
        } else {
            self.step_outside_fence()
        }
    }

    fn step_outside_fence(&mut self) -> Option<DetectStep> {
        let found = self
            .table
            .find_earliest_from(&self.buffer, self.cursor, &mut self.hints)
            .map(|found| match found {
                PatternMatch::Literal { offset, pattern } => {
                    (offset, pattern.start.len(), pattern.clone())
                }
                PatternMatch::BracketCall { offset, len, name } => {
                    (offset, len, FencePattern::bracket_call(name))
                }
            });

        let Some((offset, marker_len, pattern)) = found else {
            let pending = self.pending();
            let len = pending.len() - self.table.start_overlap(pending);
            return self.take_text(len).map(DetectStep::Text);
        };

        let mut consumed = offset + marker_len;
        if pattern.consume_newline {
            if consumed == self.buffer.len() {
                // The optional newline may still arrive; only the text before
                // the marker can be released for now.
                return self.take_text(offset - self.cursor).map(DetectStep::Text);
            }
            if self.buffer.as_bytes()[consumed] == b'\n' {
                consumed += 1;
            }
        }

        let text_before = self.buffer[self.cursor..offset].to_string();
        self.raw_open = self.buffer[offset..consumed].to_string();
        self.cursor = consumed;
        self.fence_accumulator.clear();

        debug!(start = %pattern.start, "Entering tool call fence");
        self.active_pattern = Some(pattern.clone());

        Some(DetectStep::FenceStart {
            text_before,
            pattern,
        })
    }

    fn step_in_fence(&mut self) -> Option<DetectStep> {
        let end_marker = self.active_pattern.as_ref()?.end.as_str();
        let tail = &self.buffer[self.cursor..];

        match tail.find(end_marker) {
            Some(pos) => {
                let end_len = end_marker.len();
                self.fence_accumulator.push_str(&tail[..pos]);
                self.cursor += pos + end_len;

                let pattern = self.active_pattern.take()?;
                let completed = CompletedFence::new(pattern, &self.fence_accumulator);
                self.fence_accumulator.clear();
                self.raw_open.clear();

                debug!(
                    end = %completed.pattern.end,
                    body_len = completed.body.len(),
                    "Tool call fence complete"
                );
                Some(DetectStep::FenceEnd(completed))
            }
            None => {
                let len = tail.len() - compute_overlap_length(tail, &[end_marker]);
                let text = self.take_text(len)?;
                self.fence_accumulator.push_str(&text);
                Some(DetectStep::FenceContent(text))
            }
        }
    }

    /// Hand out the next `len` unresolved bytes, `None` if that is nothing
    fn take_text(&mut self, len: usize) -> Option<String> {
        if len == 0 {
            return None;
        }
        let text = self.buffer[self.cursor..self.cursor + len].to_string();
        self.cursor += len;
        Some(text)
    }

    /// Drop the handed-out prefix once it is at least half the buffer, so
    /// each byte is moved a bounded number of times
    fn compact(&mut self) {
        if self.cursor == 0 || self.cursor * 2 < self.buffer.len() {
            return;
        }
        self.buffer.drain(..self.cursor);
        self.hints.shift(self.cursor);
        self.cursor = 0;
    }

    /// Flush everything still held at end of stream.
    ///
    /// An unterminated fence comes back as the literal text that arrived,
    /// start marker included, so no input is lost.
    pub fn finish(&mut self) -> String {
        let mut flushed = String::new();
        if self.active_pattern.take().is_some() {
            debug!("Stream ended inside a tool call fence, flushing as text");
            flushed.push_str(&self.raw_open);
            flushed.push_str(&self.fence_accumulator);
        }
        flushed.push_str(self.pending());

        self.reset();
        flushed
    }

    /// Drop all state so the detector can serve a new stream
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.cursor = 0;
        self.hints = StartHints::default();
        self.active_pattern = None;
        self.fence_accumulator.clear();
        self.raw_open.clear();
    }
}

impl Default for StreamingFenceDetector {
    fn default() -> Self {
        Self::new()
    }
}
