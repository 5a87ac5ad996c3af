use serde::{Deserialize, Serialize};

/// Parsed tool call from model output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Function call details
    pub function: FunctionCall,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// Function call within a tool call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    /// Name of the function to call
    pub name: String,
    /// Arguments as JSON string
    pub arguments: String,
}

/// Result of a streaming parse operation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamingParseResult {
    /// Normal text that's not part of tool calls
    pub normal_text: String,
    /// Tool call items parsed from the chunk
    pub calls: Vec<ToolCallItem>,
}

impl StreamingParseResult {
    /// True when the invocation produced nothing for the host
    pub fn is_empty(&self) -> bool {
        self.normal_text.is_empty() && self.calls.is_empty()
    }

    /// Append another result, preserving emission order
    pub fn extend(&mut self, other: StreamingParseResult) {
        self.normal_text.push_str(&other.normal_text);
        self.calls.extend(other.calls);
    }
}

/// One streamed fragment of a tool call
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallItem {
    /// Tool index in the array
    pub tool_index: usize,
    /// Tool name (only present on first chunk)
    pub name: Option<String>,
    /// Incremental JSON arguments
    pub parameters: String,
}
