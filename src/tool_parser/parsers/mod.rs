/// Parser implementations for the DeepSeek call formats
///
/// One table-driven parser covers every dialect; see [`crate::tool_parser::markers`].
pub mod deepseek;

// Shared helpers and utilities
pub mod helpers;

pub use deepseek::{DeepSeekParser, DEFAULT_MAX_BUFFER_BYTES};
