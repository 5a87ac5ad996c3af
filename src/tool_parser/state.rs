use crate::tool_parser::{
    partial_json::JsonCompleteness,
    types::{ToolCall, ToolCallItem},
};

/// Where the scanner stands in the unconsumed buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanPhase {
    /// Plain text; looking for a section or call opening marker
    #[default]
    Text,
    /// Inside the call section, between calls
    BetweenCalls,
    /// After `call_begin`, expecting the literal that precedes the name
    CallPrefix,
    /// Reading the function name up to its terminator
    InName,
    /// Streaming the arguments
    InArguments,
    /// Arguments finalized early; skipping to the end of the call
    AwaitingEnd,
}

/// Per-turn streaming state owned by one parser instance
#[derive(Debug, Clone, Default)]
pub struct StreamState {
    /// Undecided tail of the input
    pub buffer: String,
    /// Current scan phase
    pub phase: ScanPhase,
    /// Index of the call being streamed, if any
    pub current_tool_id: Option<usize>,
    /// Index the next call will receive
    pub next_tool_index: usize,
    /// Name of the call being streamed
    pub current_name: String,
    /// Whether the name delta for the current call has been sent
    pub name_sent: bool,
    /// Raw argument text already streamed for the current call
    pub streamed_args: String,
    /// Completeness of `streamed_args`
    pub args_json: JsonCompleteness,
    /// Finalized calls of this turn
    pub completed_tools: Vec<ToolCall>,
}

impl StreamState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything for reuse on a new turn
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Remove the first `len` bytes of the buffer
    pub fn consume(&mut self, len: usize) {
        let len = len.min(self.buffer.len());
        self.buffer.drain(..len);
    }

    /// Open a new call and produce its name delta
    pub fn begin_call(&mut self, name: &str) -> ToolCallItem {
        let index = self.next_tool_index;
        self.next_tool_index += 1;
        self.current_tool_id = Some(index);
        self.current_name = name.to_string();
        self.name_sent = true;
        self.streamed_args.clear();
        self.args_json = JsonCompleteness::new();

        ToolCallItem {
            tool_index: index,
            name: Some(name.to_string()),
            parameters: String::new(),
        }
    }

    /// Record an argument diff for the current call and produce its delta
    pub fn push_args_diff(&mut self, diff: &str) -> Option<ToolCallItem> {
        let index = self.current_tool_id?;
        if diff.is_empty() {
            return None;
        }
        self.streamed_args.push_str(diff);
        self.args_json.feed(diff);

        Some(ToolCallItem {
            tool_index: index,
            name: None,
            parameters: diff.to_string(),
        })
    }

    /// Store the finished call and clear per-call state
    pub fn finish_call(&mut self, arguments: String) {
        let name = std::mem::take(&mut self.current_name);
        self.completed_tools.push(ToolCall::new(name, arguments));
        self.clear_current_call();
    }

    /// Forget the current call without recording it
    pub fn abandon_call(&mut self) {
        self.current_name.clear();
        self.clear_current_call();
    }

    fn clear_current_call(&mut self) {
        self.current_tool_id = None;
        self.name_sent = false;
        self.streamed_args.clear();
        self.args_json = JsonCompleteness::new();
    }
}
