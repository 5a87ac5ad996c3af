use thiserror::Error;

use crate::{config::ConfigError, tool_parser::types::StreamingParseResult};

/// Result type for tool parser operations
pub type ParserResult<T> = Result<T, ParserError>;

/// Errors that can occur during tool parsing
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),

    /// The undecided tail grew past the configured limit. Fatal to the turn only.
    ///
    /// `emitted` holds the output decided by the failing invocation before the
    /// buffer was discarded.
    #[error("Pending buffer exceeded limit: {len} bytes > {limit} bytes")]
    BufferLimitExceeded {
        limit: usize,
        len: usize,
        emitted: Box<StreamingParseResult>,
    },

    #[error("Tool catalog is empty")]
    EmptyToolCatalog,

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid parameter schema for tool '{tool}': {reason}")]
    InvalidSchema { tool: String, reason: String },

    #[error("Invalid parser configuration: {0}")]
    Config(#[from] ConfigError),
}
