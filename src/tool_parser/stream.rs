//! Event driver tying detector, argument extractor and parser together.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::{
    config::FenceConfig,
    tool_parser::{
        arguments::{
            extract_argument_delta_with_window, extract_tool_name, ArgumentsStreamState,
            NameScanState,
        },
        detector::StreamingFenceDetector,
        errors::ParserResult,
        helpers::generate_call_id,
        parser::ToolCallParser,
        patterns::PatternKind,
        traits::ToolParser,
        types::DetectStep,
    },
};

/// Consumer-facing events produced from a generation stream
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    TextDelta {
        text: String,
    },
    ToolInputStart {
        id: String,
        kind: PatternKind,
        /// Known up front only for bracket calls
        tool_name: Option<String>,
    },
    ToolInputName {
        id: String,
        tool_name: String,
    },
    ToolInputDelta {
        id: String,
        delta: String,
    },
    ToolInputEnd {
        id: String,
    },
    ToolCall {
        id: String,
        tool_name: String,
        args: Value,
    },
}

/// What to do with fences that hold more than one call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StreamPolicy {
    #[default]
    AllCalls,
    /// Emit only the first call of each fence
    FirstCallOnly,
}

/// Per-fence state, dropped when the fence closes or the stream ends
struct ActiveCall {
    id: String,
    kind: PatternKind,
    arguments: ArgumentsStreamState,
    name_scan: NameScanState,
}

impl ActiveCall {
    fn advance(&mut self, text: &str, key_window: usize, events: &mut Vec<StreamEvent>) {
        if self.kind != PatternKind::Literal {
            return;
        }

        let delta = extract_argument_delta_with_window(text, &mut self.arguments, key_window);

        if !self.name_scan.found() {
            // Never inside the arguments value
            let limit = if self.arguments.complete {
                self.name_scan.skip_to(self.arguments.parse_index);
                text.len()
            } else {
                self.arguments.value_start_index.unwrap_or(text.len())
            };
            if let Some(tool_name) = extract_tool_name(text, limit, &mut self.name_scan) {
                events.push(StreamEvent::ToolInputName {
                    id: self.id.clone(),
                    tool_name,
                });
            }
        }

        if !delta.is_empty() {
            events.push(StreamEvent::ToolInputDelta {
                id: self.id.clone(),
                delta: delta.to_string(),
            });
        }
    }
}

/// Streams a generation into text and tool call events.
///
/// One instance per generation stream; nothing is shared between instances.
pub struct ToolCallStream<P: ToolParser = ToolCallParser> {
    detector: StreamingFenceDetector,
    parser: P,
    policy: StreamPolicy,
    key_window: usize,
    active: Option<ActiveCall>,
}

impl ToolCallStream<ToolCallParser> {
    /// Stream with the built-in pattern set
    pub fn new() -> Self {
        Self::with_parts(StreamingFenceDetector::new(), ToolCallParser::new())
    }

    pub fn from_config(config: &FenceConfig) -> ParserResult<Self> {
        config.validate()?;
        let mut stream = Self::with_parts(
            StreamingFenceDetector::from_config(config),
            ToolCallParser::from_config(config)?,
        );
        stream.key_window = config.argument_key_window;
        Ok(stream)
    }
}

impl Default for ToolCallStream<ToolCallParser> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: ToolParser> ToolCallStream<P> {
    pub fn with_parts(detector: StreamingFenceDetector, parser: P) -> Self {
        Self {
            detector,
            parser,
            policy: StreamPolicy::default(),
            key_window: crate::tool_parser::arguments::ARGUMENT_KEY_WINDOW,
            active: None,
        }
    }

    pub fn with_policy(mut self, policy: StreamPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn in_tool_call(&self) -> bool {
        self.active.is_some()
    }

    /// Feed one fragment of generated text
    pub fn push(&mut self, chunk: &str) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        self.detector.add_chunk(chunk);
        while let Some(step) = self.detector.detect_step() {
            self.handle_step(step, &mut events);
        }
        events
    }

    /// End of stream: flush withheld text. An unterminated fence closes its
    /// tool input and comes out as literal text.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        let flushed = self.detector.finish();
        if let Some(active) = self.active.take() {
            debug!(id = %active.id, "Stream ended inside a tool call");
            events.push(StreamEvent::ToolInputEnd { id: active.id });
        }
        push_text(&mut events, flushed);
        events
    }

    pub fn reset(&mut self) {
        self.detector.reset();
        self.active = None;
    }

    fn handle_step(&mut self, step: DetectStep, events: &mut Vec<StreamEvent>) {
        match step {
            DetectStep::Text(text) => push_text(events, text),
            DetectStep::FenceStart {
                text_before,
                pattern,
            } => {
                push_text(events, text_before);
                let id = generate_call_id();
                events.push(StreamEvent::ToolInputStart {
                    id: id.clone(),
                    kind: pattern.kind,
                    tool_name: pattern.bracket_name().map(str::to_string),
                });
                self.active = Some(ActiveCall {
                    id,
                    kind: pattern.kind,
                    arguments: ArgumentsStreamState::new(),
                    name_scan: NameScanState::new(),
                });
            }
            DetectStep::FenceContent(_) => {
                if let Some(active) = self.active.as_mut() {
                    active.advance(self.detector.fence_text(), self.key_window, events);
                }
            }
            DetectStep::FenceEnd(completed) => {
                let Some(mut active) = self.active.take() else {
                    push_text(events, completed.body);
                    return;
                };
                active.advance(completed.content(), self.key_window, events);
                events.push(StreamEvent::ToolInputEnd {
                    id: active.id.clone(),
                });

                let parsed = self.parser.parse_complete(&completed.body);
                if parsed.tool_calls.is_empty() {
                    debug!(id = %active.id, "Fence held no decodable tool call");
                    push_text(events, completed.body);
                    return;
                }

                let limit = match self.policy {
                    StreamPolicy::AllCalls => usize::MAX,
                    StreamPolicy::FirstCallOnly => 1,
                };
                let mut first_id = Some(active.id);
                for call in parsed.tool_calls.into_iter().take(limit) {
                    events.push(StreamEvent::ToolCall {
                        id: first_id.take().unwrap_or_else(generate_call_id),
                        tool_name: call.tool_name,
                        args: call.args,
                    });
                }
            }
        }
    }
}

fn push_text(events: &mut Vec<StreamEvent>, text: String) {
    if !text.is_empty() {
        events.push(StreamEvent::TextDelta { text });
    }
}
