use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tool_parser::patterns::FencePattern;

/// Tool call extracted from model output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParsedToolCall {
    /// Explicit id from the source, or a generated `call_<millis>_<random7>`
    pub tool_call_id: String,
    /// Name of the function to call
    pub tool_name: String,
    /// Arguments, usually a JSON object. A string that was not valid JSON is kept raw.
    pub args: Value,
}

/// Result of parsing a complete fence body or a whole response
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ParsedResponse {
    /// Calls in source order
    pub tool_calls: Vec<ParsedToolCall>,
    /// Input with all matched fences removed, newline runs collapsed and trimmed
    pub text_content: String,
}

/// Fence closed by the detector
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedFence {
    /// Pattern that opened the fence
    pub pattern: FencePattern,
    /// `reconstruct_prefix + content + end`, ready for the parser
    pub body: String,
    content_start: usize,
    content_end: usize,
}

impl CompletedFence {
    pub(crate) fn new(pattern: FencePattern, content: &str) -> Self {
        let mut body = String::with_capacity(
            pattern.reconstruct_prefix.len() + content.len() + pattern.end.len(),
        );
        body.push_str(&pattern.reconstruct_prefix);
        let content_start = body.len();
        body.push_str(content);
        let content_end = body.len();
        body.push_str(&pattern.end);

        Self {
            pattern,
            body,
            content_start,
            content_end,
        }
    }

    /// Text that arrived between the start and end markers.
    ///
    /// This is the same text the detector exposed through `fence_text()` while
    /// the fence was open, so argument extraction state stays valid against it.
    pub fn content(&self) -> &str {
        &self.body[self.content_start..self.content_end]
    }
}

/// One transition of the streaming fence detector
#[derive(Debug, Clone, PartialEq)]
pub enum DetectStep {
    /// Plain text outside any fence, safe to forward
    Text(String),
    /// A start marker was consumed
    FenceStart {
        /// Plain text that preceded the marker
        text_before: String,
        /// Pattern that matched; for bracket calls this carries the call name
        pattern: FencePattern,
    },
    /// Live text inside the open fence
    FenceContent(String),
    /// The end marker was consumed
    FenceEnd(CompletedFence),
}
