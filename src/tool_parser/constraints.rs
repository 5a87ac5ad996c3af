//! Tool call constraint generation for constrained decoding
//!
//! Maps a request's `tool_choice` to the grammar artifact a constrained decoder
//! should enforce: a structural tag when calls are optional, an EBNF grammar
//! when at least one call is mandatory.

use crate::{
    protocols::common::{Tool, ToolChoice, ToolChoiceValue},
    tool_parser::{
        ebnf::EbnfComposer,
        errors::{ParserError, ParserResult},
        traits::ToolParser,
    },
};

/// Constraint to hand to the decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCallConstraint {
    /// xgrammar `triggered_tags` JSON document
    StructuralTag(String),
    /// EBNF grammar text
    Ebnf(String),
}

impl ToolCallConstraint {
    /// Constraint kind as named by the decoder API
    pub fn kind(&self) -> &'static str {
        match self {
            ToolCallConstraint::StructuralTag(_) => "structural_tag",
            ToolCallConstraint::Ebnf(_) => "ebnf",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            ToolCallConstraint::StructuralTag(value) | ToolCallConstraint::Ebnf(value) => value,
        }
    }
}

/// Build tool call constraint based on tool_choice
///
/// # Arguments
/// * `parser` - Parser whose format the output must follow
/// * `tools` - List of available tools
/// * `tool_choice` - Tool choice setting from request
/// * `parallel_tool_calls` - Whether more than one call may be emitted
///
/// # Returns
/// * `Ok(Some(constraint))` - Constraint to apply
/// * `Ok(None)` - No constraint needed
pub fn build_tool_call_constraint(
    parser: &dyn ToolParser,
    tools: &[Tool],
    tool_choice: &Option<ToolChoice>,
    parallel_tool_calls: bool,
) -> ParserResult<Option<ToolCallConstraint>> {
    if tools.is_empty() {
        return Ok(None);
    }
    let Some(choice) = tool_choice.as_ref() else {
        return Ok(None);
    };

    match choice {
        ToolChoice::Value(ToolChoiceValue::None) => Ok(None),

        // Calls are optional: only constrain text after the trigger
        ToolChoice::Value(ToolChoiceValue::Auto) => {
            let tag = parser.build_structural_tag(tools, false, !parallel_tool_calls)?;
            Ok(Some(ToolCallConstraint::StructuralTag(tag)))
        }

        ToolChoice::Value(ToolChoiceValue::Required) => {
            let grammar = required_grammar(parser, tools, parallel_tool_calls)?;
            Ok(Some(ToolCallConstraint::Ebnf(grammar)))
        }

        ToolChoice::Function { function, .. } => {
            let Some(tool) = tools.iter().find(|t| t.function.name == function.name) else {
                return Err(ParserError::UnknownTool(function.name.clone()));
            };
            let grammar = required_grammar(parser, std::slice::from_ref(tool), false)?;
            Ok(Some(ToolCallConstraint::Ebnf(grammar)))
        }
    }
}

fn required_grammar(
    parser: &dyn ToolParser,
    tools: &[Tool],
    parallel_tool_calls: bool,
) -> ParserResult<String> {
    let mut format = parser.ebnf_format();
    format.allow_multiple &= parallel_tool_calls;
    EbnfComposer::build_ebnf(tools, &format)
}
