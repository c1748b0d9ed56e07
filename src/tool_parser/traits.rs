use crate::tool_parser::types::ParsedResponse;

/// Final-stage parser applied to complete fence bodies
pub trait ToolParser: Send + Sync {
    /// Parse complete tool calls from final output.
    /// Never fails: undecodable candidates are skipped.
    fn parse_complete(&self, output: &str) -> ParsedResponse;

    /// Check if text contains tool calls in this parser's format
    fn has_tool_markers(&self, text: &str) -> bool;
}
