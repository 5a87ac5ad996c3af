//! DeepSeek tool-call parsing.
//!
//! Extracts structured function calls from DeepSeek V3/V3.1 model output, in
//! one shot or incrementally from a token stream, and builds the grammars
//! that constrain a model to emit that format.

pub mod config;
pub mod logging;
pub mod protocols;
pub mod tool_parser;

pub use config::{ParserConfig, ParserConfigBuilder};
pub use tool_parser::{
    DeepSeekParser, Dialect, MarkerTable, ParserError, ParserResult, StreamingParseResult,
    ToolCall, ToolCallItem, ToolParser,
};
