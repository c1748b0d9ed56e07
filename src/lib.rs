pub mod config;
pub mod observability;
pub mod tool_parser;
