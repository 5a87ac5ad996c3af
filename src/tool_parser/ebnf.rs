//! EBNF grammar construction for constrained decoding.
//!
//! Produces grammars in the `::=` dialect understood by xgrammar. Every tool
//! becomes one alternative of `function_call`; its arguments rule is derived
//! from the tool's JSON schema so required keys must appear and values follow
//! their declared types.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::{
    protocols::common::Tool,
    tool_parser::{
        errors::{ParserError, ParserResult},
        markers::MarkerTable,
    },
};

/// Placeholder replaced by the tool name in [`EbnfFormat::call_begin_template`]
pub const NAME_PLACEHOLDER: &str = "{name}";

/// Nesting limit for schema translation; deeper schemas accept any value
const MAX_SCHEMA_DEPTH: usize = 16;

const BASE_RULES: &str = r#"basic_any ::= basic_number | basic_string | basic_boolean | basic_null | basic_array | basic_object
basic_integer ::= ("0" | "-"? [1-9] [0-9]*) ".0"?
basic_number ::= ("0" | "-"? [1-9] [0-9]*) ("." [0-9]+)? ([eE] [+-]? [0-9]+)?
basic_string ::= (([\"] basic_string_1 [\"]))
basic_string_1 ::= "" | [^"\\\x00-\x1F] basic_string_1 | "\\" escape basic_string_1
escape ::= ["\\/bfnrt] | "u" [A-Fa-f0-9] [A-Fa-f0-9] [A-Fa-f0-9] [A-Fa-f0-9]
basic_boolean ::= "true" | "false"
basic_null ::= "null"
basic_array ::= "[" ("" | ws basic_any (ws "," ws basic_any)*) ws "]"
basic_object ::= "{" ("" | ws basic_string ws ":" ws basic_any ( ws "," ws basic_string ws ":" ws basic_any)*) ws "}"
ws ::= [ \n\t]*
"#;

/// Literal framing of one dialect, as seen by the grammar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EbnfFormat {
    /// Emitted once before the first call
    pub sequence_start: String,
    /// Emitted once after the last call
    pub sequence_end: String,
    /// Text before the arguments; `{name}` is replaced by the tool name
    pub call_begin_template: String,
    /// Text after the arguments
    pub call_end: String,
    /// Text between consecutive calls (may be empty)
    pub call_separator: String,
    /// Whether more than one call is allowed per turn
    pub allow_multiple: bool,
}

impl EbnfFormat {
    pub fn from_markers(markers: &MarkerTable, allow_multiple: bool) -> Self {
        Self {
            sequence_start: markers.calls_begin.clone(),
            sequence_end: markers.calls_end.clone(),
            call_begin_template: markers.render_call_begin(NAME_PLACEHOLDER),
            call_end: markers.render_call_end(),
            call_separator: markers.call_separator.clone(),
            allow_multiple,
        }
    }
}

/// Stateless grammar builder
pub struct EbnfComposer;

impl EbnfComposer {
    /// Build the complete grammar for `tools` framed by `format`
    pub fn build_ebnf(tools: &[Tool], format: &EbnfFormat) -> ParserResult<String> {
        if tools.is_empty() {
            return Err(ParserError::EmptyToolCatalog);
        }

        let mut used_names = HashSet::new();
        let mut call_rules = Vec::with_capacity(tools.len());
        let mut body = String::new();

        for (index, tool) in tools.iter().enumerate() {
            let name = &tool.function.name;
            if name.trim().is_empty() {
                return Err(ParserError::InvalidSchema {
                    tool: name.clone(),
                    reason: "tool name is empty".to_string(),
                });
            }

            let rule_suffix = unique_rule_suffix(name, index, &mut used_names);
            let call_rule = format!("call_{}", rule_suffix);
            let args_rule = format!("arguments_{}", rule_suffix);

            let begin = format.call_begin_template.replace(NAME_PLACEHOLDER, name);
            body.push_str(&format!(
                "{} ::= {} {} {}\n",
                call_rule,
                literal(&begin),
                args_rule,
                literal(&format.call_end)
            ));
            body.push_str(&format!(
                "{} ::= {}\n",
                args_rule,
                arguments_expr(&tool.function.parameters, 0)
            ));

            call_rules.push(call_rule);
        }

        let mut grammar = String::with_capacity(body.len() + BASE_RULES.len() + 256);
        grammar.push_str(&root_rule(format));
        grammar.push('\n');
        grammar.push_str(&format!("function_call ::= {}\n", call_rules.join(" | ")));
        grammar.push_str(&body);
        grammar.push_str(BASE_RULES);

        Ok(grammar)
    }
}

fn root_rule(format: &EbnfFormat) -> String {
    let mut parts = Vec::new();
    if !format.sequence_start.is_empty() {
        parts.push(literal(&format.sequence_start));
    }
    parts.push("function_call".to_string());
    if format.allow_multiple {
        if format.call_separator.is_empty() {
            parts.push("function_call*".to_string());
        } else {
            parts.push(format!(
                "( {} function_call )*",
                literal(&format.call_separator)
            ));
        }
    }
    if !format.sequence_end.is_empty() {
        parts.push(literal(&format.sequence_end));
    }
    format!("root ::= {}", parts.join(" "))
}

/// Rule-name-safe suffix for a tool, unique within one grammar
fn unique_rule_suffix(name: &str, index: usize, used: &mut HashSet<String>) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if used.insert(sanitized.clone()) {
        return sanitized;
    }
    let mut n = index;
    loop {
        let candidate = format!("{}_{}", sanitized, n);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Quote text as an EBNF string literal
pub fn literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Literal for the JSON encoding of a value
fn json_literal(value: &Value) -> String {
    literal(&value.to_string())
}

/// Arguments are always a JSON object
fn arguments_expr(schema: &Value, depth: usize) -> String {
    match schema.as_object() {
        Some(obj) if obj.get("properties").map_or(false, Value::is_object) => {
            object_expr(obj, depth)
        }
        _ => "basic_object".to_string(),
    }
}

fn value_expr(schema: &Value, depth: usize) -> String {
    if depth > MAX_SCHEMA_DEPTH {
        return "basic_any".to_string();
    }
    let Some(obj) = schema.as_object() else {
        return "basic_any".to_string();
    };

    if let Some(constant) = obj.get("const") {
        return json_literal(constant);
    }

    if let Some(Value::Array(values)) = obj.get("enum") {
        if !values.is_empty() {
            let alts: Vec<String> = values.iter().map(json_literal).collect();
            return group(&alts);
        }
    }

    for key in ["anyOf", "oneOf"] {
        if let Some(Value::Array(branches)) = obj.get(key) {
            if !branches.is_empty() {
                let alts: Vec<String> = branches
                    .iter()
                    .map(|branch| value_expr(branch, depth + 1))
                    .collect();
                return group(&alts);
            }
        }
    }

    match obj.get("type") {
        Some(Value::String(ty)) => type_expr(ty, obj, depth),
        Some(Value::Array(types)) => {
            let alts: Vec<String> = types
                .iter()
                .filter_map(Value::as_str)
                .map(|ty| type_expr(ty, obj, depth))
                .collect();
            if alts.is_empty() {
                "basic_any".to_string()
            } else {
                group(&alts)
            }
        }
        _ if obj.get("properties").map_or(false, Value::is_object) => object_expr(obj, depth),
        _ => "basic_any".to_string(),
    }
}

fn type_expr(ty: &str, obj: &Map<String, Value>, depth: usize) -> String {
    match ty {
        "string" => "basic_string".to_string(),
        "integer" => "basic_integer".to_string(),
        "number" => "basic_number".to_string(),
        "boolean" => "basic_boolean".to_string(),
        "null" => "basic_null".to_string(),
        "array" => match obj.get("items") {
            Some(items) if items.is_object() => {
                let item = value_expr(items, depth + 1);
                format!(
                    r#"( "[" ws ( {item} ( ws "," ws {item} )* )? ws "]" )"#,
                    item = item
                )
            }
            _ => "basic_array".to_string(),
        },
        "object" => {
            if obj.get("properties").map_or(false, Value::is_object) {
                object_expr(obj, depth)
            } else {
                "basic_object".to_string()
            }
        }
        _ => "basic_any".to_string(),
    }
}

/// Object with declared properties: required keys first, then optional keys
fn object_expr(obj: &Map<String, Value>, depth: usize) -> String {
    let empty = Map::new();
    let properties = obj
        .get("properties")
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let required: Vec<&str> = obj
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let any = Value::Null;
    let mut required_pairs = Vec::new();
    let mut optional_pairs = Vec::new();

    for (key, prop_schema) in properties {
        let pair = pair_expr(key, prop_schema, depth);
        if required.contains(&key.as_str()) {
            required_pairs.push(pair);
        } else {
            optional_pairs.push(pair);
        }
    }
    // Required names without a declared schema accept any value
    for name in &required {
        if !properties.contains_key(*name) {
            required_pairs.push(pair_expr(name, &any, depth));
        }
    }

    if required_pairs.is_empty() && optional_pairs.is_empty() {
        return "basic_object".to_string();
    }

    let members = if required_pairs.is_empty() {
        // Any subset of optional keys, in declared order
        let alts: Vec<String> = (0..optional_pairs.len())
            .map(|first| {
                let mut seq = optional_pairs[first].clone();
                for pair in &optional_pairs[first + 1..] {
                    seq.push_str(&format!(r#" ( ws "," ws {} )?"#, pair));
                }
                seq
            })
            .collect();
        format!("{}?", group(&alts))
    } else {
        let mut seq = required_pairs.join(r#" ws "," ws "#);
        for pair in &optional_pairs {
            seq.push_str(&format!(r#" ( ws "," ws {} )?"#, pair));
        }
        seq
    };

    format!(r#"( "{{" ws {} ws "}}" )"#, members)
}

fn pair_expr(key: &str, schema: &Value, depth: usize) -> String {
    format!(
        r#"{} ws ":" ws {}"#,
        json_literal(&Value::String(key.to_string())),
        value_expr(schema, depth + 1)
    )
}

fn group(alts: &[String]) -> String {
    if alts.len() == 1 {
        alts[0].clone()
    } else {
        format!("( {} )", alts.join(" | "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn weather_tool() -> Tool {
        Tool::function(
            "get_weather",
            Some("Get weather of a city".to_string()),
            json!({
                "type": "object",
                "properties": {
                    "city": {"type": "string"},
                    "unit": {"type": "string", "enum": ["celsius", "fahrenheit"]}
                },
                "required": ["city"]
            }),
        )
    }

    fn v31_format() -> EbnfFormat {
        EbnfFormat::from_markers(&MarkerTable::deepseek_v31(), true)
    }

    #[test]
    fn test_literal_escaping() {
        assert_eq!(literal("a\"b"), r#""a\"b""#);
        assert_eq!(literal("line\n```"), r#""line\n```""#);
        assert_eq!(literal("back\\slash"), r#""back\\slash""#);
    }

    #[test]
    fn test_root_with_empty_separator() {
        let grammar = EbnfComposer::build_ebnf(&[weather_tool()], &v31_format()).unwrap();
        assert!(grammar.starts_with(
            "root ::= \"<｜tool▁calls▁begin｜>\" function_call function_call* \"<｜tool▁calls▁end｜>\"\n"
        ));
    }

    #[test]
    fn test_root_with_separator_and_single_call() {
        let mut format = v31_format();
        format.call_separator = "\n".to_string();
        let grammar = EbnfComposer::build_ebnf(&[weather_tool()], &format).unwrap();
        assert!(grammar.contains(r#"( "\n" function_call )*"#));

        format.allow_multiple = false;
        let grammar = EbnfComposer::build_ebnf(&[weather_tool()], &format).unwrap();
        let root = grammar.lines().next().unwrap();
        assert!(!root.contains('*'));
    }

    #[test]
    fn test_required_and_optional_properties() {
        let grammar = EbnfComposer::build_ebnf(&[weather_tool()], &v31_format()).unwrap();
        let args = grammar
            .lines()
            .find(|line| line.starts_with("arguments_get_weather ::="))
            .unwrap();
        assert!(args.contains(r#""\"city\"" ws ":" ws basic_string"#));
        assert!(args.contains(
            r#"( ws "," ws "\"unit\"" ws ":" ws ( "\"celsius\"" | "\"fahrenheit\"" ) )?"#
        ));
    }

    #[test]
    fn test_optional_only_object_allows_empty() {
        let tool = Tool::function(
            "opts",
            None,
            json!({"type": "object", "properties": {"a": {"type": "integer"}, "b": {"type": "boolean"}}}),
        );
        let grammar = EbnfComposer::build_ebnf(&[tool], &v31_format()).unwrap();
        let args = grammar
            .lines()
            .find(|line| line.starts_with("arguments_opts ::="))
            .unwrap();
        assert!(args.contains(" | "));
        assert!(args.contains(")? ws \"}\""));
    }

    #[test]
    fn test_schema_without_properties_uses_basic_object() {
        let tool = Tool::function("free", None, json!({"type": "object"}));
        let grammar = EbnfComposer::build_ebnf(&[tool], &v31_format()).unwrap();
        assert!(grammar.contains("arguments_free ::= basic_object\n"));
    }

    #[test]
    fn test_typed_array_and_nested_object() {
        let tool = Tool::function(
            "batch",
            None,
            json!({
                "type": "object",
                "properties": {
                    "ids": {"type": "array", "items": {"type": "integer"}},
                    "filter": {
                        "type": "object",
                        "properties": {"active": {"type": "boolean"}},
                        "required": ["active"]
                    },
                    "note": {"type": ["string", "null"]}
                },
                "required": ["ids", "filter"]
            }),
        );
        let grammar = EbnfComposer::build_ebnf(&[tool], &v31_format()).unwrap();
        assert!(grammar.contains(r#"basic_integer ( ws "," ws basic_integer )*"#));
        assert!(grammar.contains(r#""\"active\"" ws ":" ws basic_boolean"#));
        assert!(grammar.contains("( basic_string | basic_null )"));
    }

    #[test]
    fn test_rule_names_are_sanitized_and_unique() {
        let tools = vec![
            Tool::function("fetch-url", None, json!({"type": "object"})),
            Tool::function("fetch.url", None, json!({"type": "object"})),
        ];
        let grammar = EbnfComposer::build_ebnf(&tools, &v31_format()).unwrap();
        assert!(grammar.contains("function_call ::= call_fetch_url | call_fetch_url_1\n"));
        assert!(grammar.contains("<｜tool▁call▁begin｜>fetch-url<｜tool▁sep｜>"));
        assert!(grammar.contains("<｜tool▁call▁begin｜>fetch.url<｜tool▁sep｜>"));
    }

    #[test]
    fn test_rule_name_fallback_skips_taken_names() {
        let tools = vec![
            Tool::function("x", None, json!({"type": "object"})),
            Tool::function("x_2", None, json!({"type": "object"})),
            Tool::function("x", None, json!({"type": "object"})),
        ];
        let grammar = EbnfComposer::build_ebnf(&tools, &v31_format()).unwrap();
        assert!(grammar.contains("function_call ::= call_x | call_x_2 | call_x_3\n"));
        assert_eq!(grammar.matches("call_x_2 ::=").count(), 1);
        assert_eq!(grammar.matches("call_x_3 ::=").count(), 1);
    }

    #[test]
    fn test_empty_catalog_is_error() {
        assert!(matches!(
            EbnfComposer::build_ebnf(&[], &v31_format()),
            Err(ParserError::EmptyToolCatalog)
        ));
    }

    #[test]
    fn test_const_and_any_of() {
        let tool = Tool::function(
            "mode",
            None,
            json!({
                "type": "object",
                "properties": {
                    "version": {"const": 2},
                    "target": {"anyOf": [{"type": "string"}, {"type": "integer"}]}
                },
                "required": ["version", "target"]
            }),
        );
        let grammar = EbnfComposer::build_ebnf(&[tool], &v31_format()).unwrap();
        assert!(grammar.contains(r#""\"version\"" ws ":" ws "2""#));
        assert!(grammar.contains("( basic_string | basic_integer )"));
    }
}
