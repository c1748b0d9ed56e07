//! Shared helpers for the integration tests

#![allow(dead_code)]

use serde_json::Value;
use sgl_tool_fence::tool_parser::{StreamEvent, ToolCallStream, ToolParser};

/// Split input into fixed-size char chunks
pub fn chunks_of(input: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = input.chars().collect();
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}

/// Split input at structurally interesting characters, like tokens tend to
pub fn create_strategic_chunks(input: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for ch in input.chars() {
        current.push(ch);
        let should_break = matches!(ch, '"' | ':' | ',' | '{' | '}' | '[' | ']' | '`' | '<' | '>')
            || current.len() >= 5;
        if should_break {
            chunks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Push every chunk then finish, collecting all events
pub fn run_stream<P, I, S>(stream: &mut ToolCallStream<P>, chunks: I) -> Vec<StreamEvent>
where
    P: ToolParser,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut events = Vec::new();
    for chunk in chunks {
        events.extend(stream.push(chunk.as_ref()));
    }
    events.extend(stream.finish());
    events
}

pub fn stream_text(events: &[StreamEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::TextDelta { text } => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

pub fn stream_deltas(events: &[StreamEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::ToolInputDelta { delta, .. } => Some(delta.as_str()),
            _ => None,
        })
        .collect()
}

pub fn stream_calls(events: &[StreamEvent]) -> Vec<(String, Value)> {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::ToolCall {
                tool_name, args, ..
            } => Some((tool_name.clone(), args.clone())),
            _ => None,
        })
        .collect()
}
