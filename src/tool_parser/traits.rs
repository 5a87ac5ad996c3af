use std::collections::BTreeSet;

use serde_json::json;

use crate::{
    protocols::common::Tool,
    tool_parser::{
        ebnf::{EbnfComposer, EbnfFormat},
        errors::ParserResult,
        types::{StreamingParseResult, ToolCall},
    },
};

/// Core trait for all tool parsers
///
/// One instance holds the streaming state of one model turn. Every method is
/// synchronous and returns immediately, including on malformed input.
pub trait ToolParser: Send + Sync {
    /// Parse complete tool calls from final output
    /// Returns (remaining_normal_text, tool_calls) tuple
    fn parse_complete(&self, output: &str) -> ParserResult<(String, Vec<ToolCall>)>;

    /// Parse tool calls from model output (streaming)
    ///
    /// # Arguments
    /// * `chunk` - New text chunk from model output
    ///
    /// Only content that was not returned by an earlier call is returned.
    fn parse_incremental(&mut self, chunk: &str) -> ParserResult<StreamingParseResult>;

    /// Flush whatever was withheld waiting for more input.
    /// Call once after the last chunk of the turn.
    fn finish(&mut self) -> ParserResult<StreamingParseResult> {
        Ok(StreamingParseResult::default())
    }

    /// Check if text contains tool calls in this parser's format
    fn has_tool_markers(&self, text: &str) -> bool;

    /// Calls finalized so far in this turn, with their full arguments
    fn completed_tool_calls(&self) -> &[ToolCall];

    /// Reset the parser state for reuse across requests.
    fn reset(&mut self) {}

    /// Literal framing of this parser's format, for grammar construction
    fn ebnf_format(&self) -> EbnfFormat;

    /// Build an EBNF grammar that only admits well-formed calls to `tools`
    fn build_ebnf(&self, tools: &[Tool]) -> ParserResult<String> {
        EbnfComposer::build_ebnf(tools, &self.ebnf_format())
    }

    /// Build xgrammar structural tag for this parser's format.
    ///
    /// # Arguments
    /// * `tools` - List of available tools
    /// * `at_least_one` - Require at least one tool call (for tool_choice="required")
    /// * `stop_after_first` - Stop after first tool call (for parallel_tool_calls=false)
    ///
    /// # Returns
    /// JSON string of structural tag in xgrammar `triggered_tags` format
    fn build_structural_tag(
        &self,
        tools: &[Tool],
        at_least_one: bool,
        stop_after_first: bool,
    ) -> ParserResult<String> {
        let mut tags = Vec::new();
        let mut triggers = BTreeSet::new();

        for tool in tools {
            let name = &tool.function.name;
            let (begin, end, trigger) = self.get_format_info(name);

            tags.push(json!({
                "format": "tag",
                "begin": begin,
                "content": {
                    "format": "json_schema",
                    "schema": tool.function.parameters.clone()
                },
                "end": end
            }));

            triggers.insert(trigger);
        }

        let structural_tag = json!({
            "format": "triggered_tags",
            "triggers": triggers.into_iter().collect::<Vec<_>>(),
            "tags": tags,
            "at_least_one": at_least_one,
            "stop_after_first": stop_after_first
        });

        Ok(serde_json::to_string(&structural_tag)?)
    }

    /// Get format-specific begin/end/trigger patterns for a tool.
    ///
    /// # Returns
    /// Tuple of (begin, end, trigger)
    fn get_format_info(&self, tool_name: &str) -> (String, String, String);
}
