// These helpers are shared by several test crates
#![allow(dead_code)]

use std::collections::BTreeMap;

use serde_json::json;
use sgl_function_call::{
    protocols::common::{Function, Tool},
    tool_parser::{StreamingParseResult, ToolParser},
};

pub const CALLS_BEGIN: &str = "<｜tool▁calls▁begin｜>";
pub const CALLS_END: &str = "<｜tool▁calls▁end｜>";
pub const CALL_BEGIN: &str = "<｜tool▁call▁begin｜>";
pub const CALL_END: &str = "<｜tool▁call▁end｜>";
pub const TOOL_SEP: &str = "<｜tool▁sep｜>";

pub const MARKERS: [&str; 5] = [CALLS_BEGIN, CALLS_END, CALL_BEGIN, CALL_END, TOOL_SEP];

/// Render one V3 call
pub fn v3_call(name: &str, args: &str) -> String {
    format!(
        "{}function{}{}\n```json\n{}\n```{}",
        CALL_BEGIN, TOOL_SEP, name, args, CALL_END
    )
}

/// Render one V3.1 call
pub fn v31_call(name: &str, args: &str) -> String {
    format!("{}{}{}{}{}", CALL_BEGIN, name, TOOL_SEP, args, CALL_END)
}

/// Wrap rendered calls into a call section
pub fn section(calls: &[String]) -> String {
    format!("{}{}{}", CALLS_BEGIN, calls.concat(), CALLS_END)
}

/// Everything a host sees for one streamed turn
#[derive(Debug, Default)]
pub struct StreamOutcome {
    pub normal_text: String,
    pub results: Vec<StreamingParseResult>,
    /// tool_index -> (name, concatenated parameter diffs)
    pub calls: BTreeMap<usize, (String, String)>,
    /// tool_index -> number of deltas carrying a name
    pub name_deltas: BTreeMap<usize, usize>,
}

/// Feed `chunks` in order, then finish the turn
pub fn stream_chunks<P: ToolParser + ?Sized>(parser: &mut P, chunks: &[&str]) -> StreamOutcome {
    let mut outcome = StreamOutcome::default();
    for chunk in chunks {
        let result = parser.parse_incremental(chunk).unwrap();
        record(&mut outcome, result);
    }
    let tail = parser.finish().unwrap();
    record(&mut outcome, tail);
    outcome
}

fn record(outcome: &mut StreamOutcome, result: StreamingParseResult) {
    outcome.normal_text.push_str(&result.normal_text);
    for item in &result.calls {
        let entry = outcome.calls.entry(item.tool_index).or_default();
        if let Some(name) = &item.name {
            assert!(
                entry.1.is_empty(),
                "name delta for call {} arrived after its arguments",
                item.tool_index
            );
            entry.0 = name.clone();
            *outcome.name_deltas.entry(item.tool_index).or_default() += 1;
        }
        entry.1.push_str(&item.parameters);
    }
    outcome.results.push(result);
}

/// Split `text` at the given byte offsets, snapped to char boundaries
pub fn split_at_offsets<'a>(text: &'a str, offsets: &[usize]) -> Vec<&'a str> {
    let mut cuts: Vec<usize> = offsets
        .iter()
        .map(|&o| {
            let mut o = o.min(text.len());
            while !text.is_char_boundary(o) {
                o -= 1;
            }
            o
        })
        .collect();
    cuts.sort_unstable();
    cuts.dedup();

    let mut pieces = Vec::new();
    let mut start = 0;
    for cut in cuts {
        pieces.push(&text[start..cut]);
        start = cut;
    }
    pieces.push(&text[start..]);
    pieces
}

pub fn assert_no_markers(text: &str) {
    for marker in MARKERS {
        assert!(!text.contains(marker), "marker {:?} leaked into {:?}", marker, text);
    }
}

pub fn create_test_tools() -> Vec<Tool> {
    vec![
        Tool {
            tool_type: "function".to_string(),
            function: Function {
                name: "search".to_string(),
                description: Some("Search for information".to_string()),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "query": {"type": "string"}
                    },
                    "required": ["query"]
                }),
                strict: None,
            },
        },
        Tool {
            tool_type: "function".to_string(),
            function: Function {
                name: "get_weather".to_string(),
                description: Some("Get weather information".to_string()),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "location": {"type": "string"},
                        "units": {"type": "string", "enum": ["celsius", "fahrenheit"]}
                    },
                    "required": ["location"]
                }),
                strict: None,
            },
        },
        Tool {
            tool_type: "function".to_string(),
            function: Function {
                name: "calculate".to_string(),
                description: Some("Perform calculations".to_string()),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "x": {"type": "number"},
                        "y": {"type": "number"}
                    }
                }),
                strict: None,
            },
        },
        Tool {
            tool_type: "function".to_string(),
            function: Function {
                name: "translate".to_string(),
                description: Some("Translate text".to_string()),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "text": {"type": "string"},
                        "target_lang": {"type": "string"}
                    },
                    "required": ["text", "target_lang"]
                }),
                strict: None,
            },
        },
    ]
}
