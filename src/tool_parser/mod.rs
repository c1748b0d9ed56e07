/// Tool call extraction from streamed model output
///
/// Text fragments go through the `StreamingFenceDetector`, which forwards plain
/// text as soon as it cannot be part of a marker and collects fenced regions.
/// While a fence is open the argument extractor yields incremental argument
/// text; once it closes the `ToolCallParser` turns the body into tool calls.
// Core modules
pub mod errors;
pub mod helpers;
pub mod traits;
pub mod types;

// Scanning
pub mod arguments;
pub mod detector;
pub mod overlap;
pub mod patterns;

// Parsing and event driving
pub mod parser;
pub mod stream;


// Re-export types used outside this module
pub use arguments::{extract_argument_delta, extract_arguments, ArgumentsStreamState};
pub use detector::StreamingFenceDetector;
pub use errors::{ParserError, ParserResult};
pub use overlap::compute_overlap_length;
pub use parser::ToolCallParser;
pub use patterns::{FencePattern, FencePatternTable, PatternKind, PatternMatch, StartHints};
pub use stream::{StreamEvent, StreamPolicy, ToolCallStream};
pub use traits::ToolParser;
pub use types::{CompletedFence, DetectStep, ParsedResponse, ParsedToolCall};
