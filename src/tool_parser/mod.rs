/// Tool parser module for handling function/tool calls in model outputs
///
/// This module provides infrastructure for parsing DeepSeek tool calls, both
/// from complete responses and from token streams, and for building the
/// grammars that constrain a model to the same format.
// Core modules
pub mod constraints;
pub mod ebnf;
pub mod errors;
pub mod markers;
pub mod partial_json;
pub mod state;
pub mod traits;
pub mod types;

// Parser implementations
pub mod parsers;

// Re-export types used outside this module
pub use constraints::{build_tool_call_constraint, ToolCallConstraint};
pub use ebnf::{EbnfComposer, EbnfFormat};
pub use errors::{ParserError, ParserResult};
pub use markers::{Dialect, MarkerTable};
pub use parsers::DeepSeekParser;
pub use traits::ToolParser;
pub use types::{FunctionCall, StreamingParseResult, ToolCall, ToolCallItem};
