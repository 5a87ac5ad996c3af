use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::{
    config::{ConfigValidator, ParserConfig},
    tool_parser::{
        ebnf::EbnfFormat,
        errors::{ParserError, ParserResult},
        markers::MarkerTable,
        parsers::helpers::{
            find_first, is_token_prefix, partial_token_len, partial_tokens_len, snippet,
            strip_tokens,
        },
        partial_json::{argument_diff, is_complete_json},
        state::{ScanPhase, StreamState},
        traits::ToolParser,
        types::{StreamingParseResult, ToolCall},
    },
};

/// Default cap on the undecided streaming tail
pub const DEFAULT_MAX_BUFFER_BYTES: usize = 1 << 20;

/// Compiled call pattern of one marker table, shared by every parser using it
#[derive(Debug)]
pub(crate) struct CallPatterns {
    markers: MarkerTable,
    /// One complete call anchored at the start of the haystack
    call: Regex,
}

impl CallPatterns {
    fn compile(markers: MarkerTable) -> ParserResult<Self> {
        let name_prefix = match markers.name_prefix_trimmed() {
            "" => String::new(),
            prefix => format!(r"{}\s*", regex::escape(prefix)),
        };
        let args_suffix = match markers.args_suffix_trimmed() {
            "" => String::new(),
            suffix => format!(r"(?:{})?\s*", regex::escape(suffix)),
        };
        let name_stops: String = markers
            .name_stop_chars()
            .iter()
            .map(|c| regex::escape(&c.to_string()))
            .collect();
        let pattern = format!(
            r"(?s)\A\s*{begin}\s*{prefix}(?P<name>[^{stops}]*?)\s*{name_suffix}\s*(?P<args>.*?)\s*{args_suffix}{end}",
            begin = regex::escape(&markers.call_begin),
            prefix = name_prefix,
            stops = name_stops,
            name_suffix = regex::escape(markers.name_suffix_trimmed()),
            args_suffix = args_suffix,
            end = regex::escape(&markers.call_end),
        );
        let call = Regex::new(&pattern)?;
        Ok(Self { markers, call })
    }
}

static DEEPSEEK_V3_PATTERNS: Lazy<Arc<CallPatterns>> = Lazy::new(|| {
    Arc::new(CallPatterns::compile(MarkerTable::deepseek_v3()).expect("Valid regex pattern"))
});

static DEEPSEEK_V31_PATTERNS: Lazy<Arc<CallPatterns>> = Lazy::new(|| {
    Arc::new(CallPatterns::compile(MarkerTable::deepseek_v31()).expect("Valid regex pattern"))
});

/// Outcome of one scan step
enum Scan {
    /// State advanced; scan again
    Continue,
    /// Nothing more can be decided from the buffer in this invocation
    Pause,
}

/// DeepSeek format parser for tool calls
///
/// Handles both DeepSeek layouts through a [`MarkerTable`]:
/// - V3: `<｜tool▁calls▁begin｜><｜tool▁call▁begin｜>function<｜tool▁sep｜>{name}\n```json\n{args}\n```<｜tool▁call▁end｜><｜tool▁calls▁end｜>`
/// - V3.1: `<｜tool▁calls▁begin｜><｜tool▁call▁begin｜>{name}<｜tool▁sep｜>{args}<｜tool▁call▁end｜><｜tool▁calls▁end｜>`
///
/// Features:
/// - Unicode token delimiters, never surfaced as plain text
/// - Whitespace tolerant headers
/// - Support for multiple sequential tool calls
/// - Incremental argument streaming with early finalization on complete JSON
///
/// One instance serves one turn; call [`ToolParser::reset`] before reuse.
pub struct DeepSeekParser {
    patterns: Arc<CallPatterns>,
    state: StreamState,
    max_buffer_bytes: usize,
    allow_multiple_calls: bool,
}

impl DeepSeekParser {
    /// Create a new DeepSeek V3 parser
    pub fn new() -> Self {
        Self::from_patterns(Arc::clone(&DEEPSEEK_V3_PATTERNS))
    }

    /// Create a new DeepSeek V3.1 parser
    pub fn v31() -> Self {
        Self::from_patterns(Arc::clone(&DEEPSEEK_V31_PATTERNS))
    }

    /// Create a parser for an arbitrary marker table
    pub fn with_markers(markers: MarkerTable) -> ParserResult<Self> {
        markers.validate()?;
        if markers == DEEPSEEK_V3_PATTERNS.markers {
            return Ok(Self::new());
        }
        if markers == DEEPSEEK_V31_PATTERNS.markers {
            return Ok(Self::v31());
        }
        Ok(Self::from_patterns(Arc::new(CallPatterns::compile(markers)?)))
    }

    /// Create a parser from a validated configuration
    pub fn from_config(config: &ParserConfig) -> ParserResult<Self> {
        ConfigValidator::validate(config)?;
        let mut parser = Self::with_markers(config.effective_markers())?;
        parser.max_buffer_bytes = config.max_buffer_bytes;
        parser.allow_multiple_calls = config.allow_multiple_calls;
        Ok(parser)
    }

    fn from_patterns(patterns: Arc<CallPatterns>) -> Self {
        Self {
            patterns,
            state: StreamState::new(),
            max_buffer_bytes: DEFAULT_MAX_BUFFER_BYTES,
            allow_multiple_calls: true,
        }
    }

    /// Marker table driving this parser
    pub fn markers(&self) -> &MarkerTable {
        &self.patterns.markers
    }

    /// Current scan phase
    pub fn phase(&self) -> ScanPhase {
        self.state.phase
    }

    /// Bytes currently withheld
    pub fn pending_len(&self) -> usize {
        self.state.buffer.len()
    }

    /// Parse arguments into canonical JSON, keeping the raw text when invalid
    fn canonical_arguments(markers: &MarkerTable, raw: &str) -> Result<String, serde_json::Error> {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => Ok(value.to_string()),
            Err(e) => {
                tracing::warn!(
                    format = %markers.format_name,
                    raw = %snippet(raw),
                    error = %e,
                    "Failed to parse tool call arguments"
                );
                Err(e)
            }
        }
    }

    fn scan_text(&mut self, markers: &MarkerTable, out: &mut StreamingParseResult) -> Scan {
        let tokens = markers.tokens();
        let buffer = &self.state.buffer;

        if let Some((idx, token)) = find_first(buffer, &markers.opening_tokens()) {
            out.normal_text
                .push_str(strip_tokens(&buffer[..idx], &tokens).trim_end());
            self.state.phase = if token == markers.calls_begin {
                ScanPhase::BetweenCalls
            } else {
                ScanPhase::CallPrefix
            };
            self.state.consume(idx + token.len());
            return Scan::Continue;
        }

        // Withhold a partial marker and the whitespace that may precede it
        let hold = partial_tokens_len(buffer, &tokens);
        let region = &buffer[..buffer.len() - hold];
        let emit_len = region.trim_end().len();
        out.normal_text
            .push_str(&strip_tokens(&region[..emit_len], &tokens));
        self.state.consume(emit_len);
        Scan::Pause
    }

    fn scan_between_calls(&mut self, markers: &MarkerTable) -> Scan {
        let buffer = &self.state.buffer;
        let rest = buffer.trim_start();
        let skipped = buffer.len() - rest.len();

        if rest.is_empty() {
            return Scan::Pause;
        }
        if rest.starts_with(&markers.call_begin) {
            self.state.consume(skipped + markers.call_begin.len());
            self.state.phase = ScanPhase::CallPrefix;
            return Scan::Continue;
        }
        if rest.starts_with(&markers.calls_end) {
            self.state.consume(skipped + markers.calls_end.len());
            self.state.phase = ScanPhase::Text;
            return Scan::Continue;
        }
        if is_token_prefix(rest, &markers.call_begin) || is_token_prefix(rest, &markers.calls_end)
        {
            return Scan::Pause;
        }

        // Section left without its closer; the rest is plain text
        self.state.phase = ScanPhase::Text;
        Scan::Continue
    }

    fn scan_call_prefix(&mut self, markers: &MarkerTable) -> Scan {
        let prefix = markers.name_prefix_trimmed();
        if prefix.is_empty() {
            self.state.phase = ScanPhase::InName;
            return Scan::Continue;
        }

        let buffer = &self.state.buffer;
        let rest = buffer.trim_start();
        let skipped = buffer.len() - rest.len();

        if rest.starts_with(prefix) {
            self.state.consume(skipped + prefix.len());
            self.state.phase = ScanPhase::InName;
            return Scan::Continue;
        }
        if rest.is_empty() || prefix.starts_with(rest) {
            return Scan::Pause;
        }

        tracing::warn!(
            format = %markers.format_name,
            raw = %snippet(rest),
            "Malformed tool call header - skipping call"
        );
        self.state.phase = ScanPhase::AwaitingEnd;
        Scan::Continue
    }

    fn scan_name(&mut self, markers: &MarkerTable, out: &mut StreamingParseResult) -> Scan {
        let suffix = markers.name_suffix_trimmed();
        let stops = markers.name_stop_chars();
        let buffer = &self.state.buffer;

        let Some(pos) = buffer.find(suffix) else {
            return match buffer.find(stops.as_slice()) {
                Some(i) if !is_token_prefix(&buffer[i..], suffix) => {
                    self.skip_malformed_name(markers);
                    Scan::Continue
                }
                _ => Scan::Pause,
            };
        };

        let name = buffer[..pos].trim();
        if name.is_empty() || name.contains(stops.as_slice()) {
            self.skip_malformed_name(markers);
            return Scan::Continue;
        }

        let name = name.to_string();
        self.state.consume(pos + suffix.len());
        self.state.phase = ScanPhase::InArguments;
        out.calls.push(self.state.begin_call(&name));
        tracing::debug!(format = %markers.format_name, name = %name, "Tool call started");

        // The name delta closes this invocation
        Scan::Pause
    }

    fn skip_malformed_name(&mut self, markers: &MarkerTable) {
        tracing::warn!(
            format = %markers.format_name,
            raw = %snippet(&self.state.buffer),
            "Invalid tool name - skipping call"
        );
        self.state.phase = ScanPhase::AwaitingEnd;
    }

    fn scan_arguments(&mut self, markers: &MarkerTable, out: &mut StreamingParseResult) -> Scan {
        let buffer = &self.state.buffer;

        if let Some((pos, token)) = find_first(buffer, &markers.argument_boundaries()) {
            let raw = closed_arguments(&buffer[..pos], markers).to_string();
            if token == markers.call_end {
                let consumed = pos + token.len();
                self.complete_call(markers, raw, out);
                self.state.consume(consumed);
                self.state.phase = ScanPhase::BetweenCalls;
            } else {
                // Another marker cut the call short; resume scanning at it
                self.interrupt_call(markers, raw, out);
                self.state.consume(pos);
                self.state.phase = ScanPhase::AwaitingEnd;
            }
            return Scan::Continue;
        }

        let visible = buffer.trim_start();
        let observed = open_arguments(visible, markers).to_string();
        let observed_end = buffer.len() - visible.len() + observed.len();

        // The buffer only grows while a call is open and its undecided tail is
        // withheld, so observed arguments always extend the streamed prefix.
        let diff = argument_diff(&self.state.streamed_args, &observed).map(str::to_string);
        debug_assert!(diff.is_some(), "streamed arguments regressed");
        let Some(diff) = diff else {
            self.abandon_regressed(markers, observed);
            return Scan::Continue;
        };
        if let Some(item) = self.state.push_args_diff(&diff) {
            out.calls.push(item);
        }

        if self.state.args_json.is_complete() {
            self.finalize_call(markers, observed);
            self.state.consume(observed_end);
            self.state.phase = ScanPhase::AwaitingEnd;
            return Scan::Continue;
        }

        Scan::Pause
    }

    /// Emit the last diff of a closed call and record it
    fn complete_call(&mut self, markers: &MarkerTable, raw: String, out: &mut StreamingParseResult) {
        let diff = argument_diff(&self.state.streamed_args, &raw).map(str::to_string);
        debug_assert!(diff.is_some(), "closed arguments regressed");
        match diff {
            Some(diff) => {
                if let Some(item) = self.state.push_args_diff(&diff) {
                    out.calls.push(item);
                }
                self.finalize_call(markers, raw);
            }
            None => self.abandon_regressed(markers, raw),
        }
    }

    /// Close a call whose `call_end` never came because another marker did
    ///
    /// Complete JSON arguments still make a call; anything else is dropped.
    fn interrupt_call(&mut self, markers: &MarkerTable, raw: String, out: &mut StreamingParseResult) {
        if is_complete_json(&raw) {
            self.complete_call(markers, raw, out);
            return;
        }
        tracing::warn!(
            format = %markers.format_name,
            raw = %snippet(&raw),
            name = %self.state.current_name,
            "Tool call interrupted by another marker - dropping call"
        );
        self.state.abandon_call();
    }

    fn finalize_call(&mut self, markers: &MarkerTable, raw: String) {
        let arguments = Self::canonical_arguments(markers, &raw).unwrap_or(raw);
        tracing::debug!(
            format = %markers.format_name,
            name = %self.state.current_name,
            "Tool call completed"
        );
        self.state.finish_call(arguments);
    }

    fn abandon_regressed(&mut self, markers: &MarkerTable, observed: String) {
        tracing::warn!(
            format = %markers.format_name,
            raw = %snippet(&observed),
            streamed = %snippet(&self.state.streamed_args),
            "Corrupt tool call stream: arguments no longer extend the streamed prefix"
        );
        self.state.abandon_call();
        self.state.phase = ScanPhase::AwaitingEnd;
    }

    fn scan_awaiting_end(&mut self, markers: &MarkerTable) -> Scan {
        let targets = markers.argument_boundaries();
        let buffer = &self.state.buffer;

        match find_first(buffer, &targets) {
            Some((pos, token)) => {
                self.state.phase = if token == markers.call_end || token == markers.calls_begin {
                    ScanPhase::BetweenCalls
                } else if token == markers.call_begin {
                    ScanPhase::CallPrefix
                } else {
                    ScanPhase::Text
                };
                self.state.consume(pos + token.len());
                Scan::Continue
            }
            None => {
                let discard = buffer.len() - partial_tokens_len(buffer, &targets);
                self.state.consume(discard);
                Scan::Pause
            }
        }
    }

    /// Hand back `result`, or fail the turn when the undecided tail is too long
    fn check_buffer_limit(
        &mut self,
        result: StreamingParseResult,
    ) -> ParserResult<StreamingParseResult> {
        let len = self.state.buffer.len();
        if len <= self.max_buffer_bytes {
            return Ok(result);
        }

        tracing::warn!(
            format = %self.patterns.markers.format_name,
            len,
            limit = self.max_buffer_bytes,
            "Pending buffer exceeded limit - discarding"
        );
        self.state.buffer.clear();
        if self.state.current_tool_id.is_some() {
            self.state.abandon_call();
        }
        self.state.phase = ScanPhase::Text;
        Err(ParserError::BufferLimitExceeded {
            limit: self.max_buffer_bytes,
            len,
            emitted: Box::new(result),
        })
    }
}

impl Default for DeepSeekParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Arguments of a call whose `call_end` has been seen
fn closed_arguments<'a>(region: &'a str, markers: &MarkerTable) -> &'a str {
    let args = region.trim();
    match markers.args_suffix_trimmed() {
        "" => args,
        suffix => args.strip_suffix(suffix).map_or(args, str::trim_end),
    }
}

/// Longest prefix of still-open arguments that cannot turn into a closer
fn open_arguments<'a>(visible: &'a str, markers: &MarkerTable) -> &'a str {
    let mut args = visible.trim_end();
    let cut = partial_tokens_len(args, &markers.argument_boundaries());
    args = args[..args.len() - cut].trim_end();

    match markers.args_suffix_trimmed() {
        "" => args,
        suffix => match args.strip_suffix(suffix) {
            Some(stripped) => stripped.trim_end(),
            None => {
                let cut = partial_token_len(args, suffix);
                args[..args.len() - cut].trim_end()
            }
        },
    }
}

impl ToolParser for DeepSeekParser {
    fn parse_complete(&self, text: &str) -> ParserResult<(String, Vec<ToolCall>)> {
        let markers = &self.patterns.markers;
        let tokens = markers.tokens();

        if !self.has_tool_markers(text) {
            return Ok((strip_tokens(text, &tokens).into_owned(), vec![]));
        }

        let mut normal_text = String::new();
        let mut tools = Vec::new();
        let mut matched_any = false;
        let mut pos = 0;

        while pos < text.len() {
            let rest = &text[pos..];
            let Some((idx, token)) = find_first(rest, &markers.opening_tokens()) else {
                normal_text.push_str(&strip_tokens(rest, &tokens));
                break;
            };
            normal_text.push_str(strip_tokens(&rest[..idx], &tokens).trim_end());

            let section_start = pos + idx;
            let mut cursor = if token == markers.calls_begin {
                section_start + token.len()
            } else {
                section_start
            };

            loop {
                if let Some(captures) = self.patterns.call.captures(&text[cursor..]) {
                    let name = captures.name("name").map_or("", |m| m.as_str().trim());
                    let args = captures.name("args");
                    let body = args.map_or("", |m| m.as_str());

                    // Another marker inside the body cut this call short
                    if let Some((cut, _)) = find_first(body, &markers.interrupting_tokens()) {
                        let raw = closed_arguments(&body[..cut], markers);
                        if !name.is_empty() && is_complete_json(raw) {
                            matched_any = true;
                            if let Ok(arguments) = Self::canonical_arguments(markers, raw) {
                                tools.push(ToolCall::new(name, arguments));
                            }
                        } else {
                            tracing::warn!(
                                format = %markers.format_name,
                                raw = %snippet(raw),
                                "Tool call interrupted by another marker - dropping call"
                            );
                        }
                        cursor += args.map_or(0, |m| m.start()) + cut;
                        continue;
                    }

                    matched_any = true;
                    let raw = body.trim();
                    if name.is_empty() {
                        tracing::warn!(
                            format = %markers.format_name,
                            raw = %snippet(raw),
                            "Invalid tool name - skipping call"
                        );
                    } else if let Ok(arguments) = Self::canonical_arguments(markers, raw) {
                        tools.push(ToolCall::new(name, arguments));
                    }
                    cursor += captures.get(0).map_or(0, |m| m.end());
                    continue;
                }

                // Skip a call that does not match the layout, up to its end or
                // the next call
                let remainder = &text[cursor..];
                let Some(body) = remainder.trim_start().strip_prefix(markers.call_begin.as_str())
                else {
                    break;
                };
                let body_start = cursor + remainder.len() - body.len();
                let Some((end, token)) =
                    find_first(body, &[markers.call_end.as_str(), markers.call_begin.as_str()])
                else {
                    break;
                };
                tracing::warn!(
                    format = %markers.format_name,
                    raw = %snippet(&body[..end]),
                    "Malformed tool call - skipping"
                );
                cursor = body_start + end;
                if token == markers.call_end {
                    cursor += token.len();
                }
            }

            let remainder = &text[cursor..];
            let trimmed = remainder.trim_start();
            if let Some(after) = trimmed.strip_prefix(markers.calls_end.as_str()) {
                pos = text.len() - after.len();
            } else if trimmed.is_empty() {
                break;
            } else if cursor == section_start {
                pos = section_start + token.len();
            } else {
                pos = cursor;
            }
        }

        if !matched_any {
            tracing::warn!(
                format = %markers.format_name,
                raw = %snippet(text),
                "Tool call markers present but no call could be matched"
            );
            return Ok((strip_tokens(text, &tokens).into_owned(), vec![]));
        }

        Ok((normal_text, tools))
    }

    fn parse_incremental(&mut self, chunk: &str) -> ParserResult<StreamingParseResult> {
        self.state.buffer.push_str(chunk);

        let patterns = Arc::clone(&self.patterns);
        let markers = &patterns.markers;
        let mut result = StreamingParseResult::default();

        loop {
            let step = match self.state.phase {
                ScanPhase::Text => self.scan_text(markers, &mut result),
                ScanPhase::BetweenCalls => self.scan_between_calls(markers),
                ScanPhase::CallPrefix => self.scan_call_prefix(markers),
                ScanPhase::InName => self.scan_name(markers, &mut result),
                ScanPhase::InArguments => self.scan_arguments(markers, &mut result),
                ScanPhase::AwaitingEnd => self.scan_awaiting_end(markers),
            };
            if let Scan::Pause = step {
                break;
            }
        }

        self.check_buffer_limit(result)
    }

    fn finish(&mut self) -> ParserResult<StreamingParseResult> {
        // Decide everything still decidable before flushing
        let mut result = StreamingParseResult::default();
        loop {
            let step = self.parse_incremental("")?;
            if step.is_empty() {
                break;
            }
            result.extend(step);
        }

        let patterns = Arc::clone(&self.patterns);
        let markers = &patterns.markers;
        let pending = std::mem::take(&mut self.state.buffer);

        match self.state.phase {
            ScanPhase::Text => {
                result
                    .normal_text
                    .push_str(&strip_tokens(&pending, &markers.tokens()));
            }
            ScanPhase::BetweenCalls => {
                if !pending.trim().is_empty() {
                    result
                        .normal_text
                        .push_str(&strip_tokens(&pending, &markers.tokens()));
                }
            }
            ScanPhase::CallPrefix | ScanPhase::InName | ScanPhase::InArguments => {
                tracing::warn!(
                    format = %markers.format_name,
                    raw = %snippet(&pending),
                    name = %self.state.current_name,
                    "Stream ended inside a tool call - dropping unterminated call"
                );
                self.state.abandon_call();
            }
            ScanPhase::AwaitingEnd => {}
        }

        self.state.phase = ScanPhase::Text;
        Ok(result)
    }

    fn has_tool_markers(&self, text: &str) -> bool {
        let markers = &self.patterns.markers;
        text.contains(&markers.calls_begin) || text.contains(&markers.call_begin)
    }

    fn completed_tool_calls(&self) -> &[ToolCall] {
        &self.state.completed_tools
    }

    fn reset(&mut self) {
        self.state.reset();
    }

    fn ebnf_format(&self) -> EbnfFormat {
        EbnfFormat::from_markers(&self.patterns.markers, self.allow_multiple_calls)
    }

    fn get_format_info(&self, tool_name: &str) -> (String, String, String) {
        let markers = &self.patterns.markers;
        (
            markers.render_call_begin(tool_name),
            markers.render_call_end(),
            markers.call_begin.clone(),
        )
    }
}
