//! Tests for tool_choice driven constraint selection

use sgl_function_call::{
    protocols::common::{FunctionChoice, ToolChoice, ToolChoiceValue},
    tool_parser::{
        build_tool_call_constraint, DeepSeekParser, ParserError, ToolCallConstraint,
    },
};

mod common;
use common::create_test_tools;

#[test]
fn test_no_choice_or_none_means_no_constraint() {
    let parser = DeepSeekParser::v31();
    let tools = create_test_tools();

    assert_eq!(build_tool_call_constraint(&parser, &tools, &None, true).unwrap(), None);
    let none = Some(ToolChoice::Value(ToolChoiceValue::None));
    assert_eq!(build_tool_call_constraint(&parser, &tools, &none, true).unwrap(), None);
}

#[test]
fn test_empty_tools_means_no_constraint() {
    let parser = DeepSeekParser::v31();
    let required = Some(ToolChoice::Value(ToolChoiceValue::Required));
    assert_eq!(build_tool_call_constraint(&parser, &[], &required, true).unwrap(), None);
}

#[test]
fn test_auto_uses_structural_tag() {
    let parser = DeepSeekParser::new();
    let tools = create_test_tools();
    let auto = Some(ToolChoice::default());

    let constraint = build_tool_call_constraint(&parser, &tools, &auto, false)
        .unwrap()
        .unwrap();
    assert_eq!(constraint.kind(), "structural_tag");

    let tag: serde_json::Value = serde_json::from_str(constraint.value()).unwrap();
    assert_eq!(tag["at_least_one"], false);
    assert_eq!(tag["stop_after_first"], true);
}

#[test]
fn test_required_uses_ebnf() {
    let parser = DeepSeekParser::v31();
    let tools = create_test_tools();
    let required = Some(ToolChoice::Value(ToolChoiceValue::Required));

    let Some(ToolCallConstraint::Ebnf(parallel)) =
        build_tool_call_constraint(&parser, &tools, &required, true).unwrap()
    else {
        panic!("expected an EBNF constraint");
    };
    assert!(parallel.lines().next().unwrap().contains("function_call*"));

    let Some(ToolCallConstraint::Ebnf(single)) =
        build_tool_call_constraint(&parser, &tools, &required, false).unwrap()
    else {
        panic!("expected an EBNF constraint");
    };
    assert!(!single.lines().next().unwrap().contains('*'));
}

#[test]
fn test_named_function_restricts_grammar() {
    let parser = DeepSeekParser::v31();
    let tools = create_test_tools();
    let choice = Some(ToolChoice::Function {
        tool_type: "function".to_string(),
        function: FunctionChoice {
            name: "translate".to_string(),
        },
    });

    let constraint = build_tool_call_constraint(&parser, &tools, &choice, true)
        .unwrap()
        .unwrap();
    assert_eq!(constraint.kind(), "ebnf");
    assert!(constraint.value().contains("function_call ::= call_translate\n"));
    assert!(!constraint.value().contains("call_search"));
}

#[test]
fn test_named_function_must_exist() {
    let parser = DeepSeekParser::v31();
    let choice = Some(ToolChoice::Function {
        tool_type: "function".to_string(),
        function: FunctionChoice {
            name: "missing".to_string(),
        },
    });
    assert!(matches!(
        build_tool_call_constraint(&parser, &create_test_tools(), &choice, true),
        Err(ParserError::UnknownTool(name)) if name == "missing"
    ));
}
