use thiserror::Error;

use crate::config::ConfigError;

/// Result type for tool parser operations
pub type ParserResult<T> = Result<T, ParserError>;

/// Errors that can occur while decoding tool calls.
///
/// None of these reach the consumer of a stream: candidates that fail to
/// decode are logged and skipped.
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("Parsing failed: {0}")]
    ParsingFailed(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("Tool call has no name")]
    MissingName,

    #[error("Invalid fence pattern: {0}")]
    InvalidPattern(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
