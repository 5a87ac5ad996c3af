//! Marker-token vocabularies for the DeepSeek tool-call dialects.
//!
//! DeepSeek V3 and V3.1 share the same special tokens but lay a call out
//! differently. Both layouts are described by one [`MarkerTable`]:
//!
//! ```text
//! {calls_begin}
//!   {call_begin}{name_prefix}NAME{name_suffix}ARGS{args_suffix}{call_end}
//!   ...
//! {calls_end}
//! ```
//!
//! The strings are stored in their canonical rendered form (what the chat
//! template emits). Matching is whitespace tolerant around the name and the
//! arguments, so only the trimmed form of each literal is required to appear.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, ConfigResult};

/// Built-in dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Dialect {
    /// `function<｜tool▁sep｜>{name}` followed by a fenced json block
    #[default]
    #[serde(rename = "deepseekv3")]
    DeepSeekV3,
    /// `{name}<｜tool▁sep｜>{args}` with bare JSON arguments
    #[serde(rename = "deepseekv31")]
    DeepSeekV31,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::DeepSeekV3 => "deepseekv3",
            Dialect::DeepSeekV31 => "deepseekv31",
        }
    }

    pub fn markers(&self) -> MarkerTable {
        match self {
            Dialect::DeepSeekV3 => MarkerTable::deepseek_v3(),
            Dialect::DeepSeekV31 => MarkerTable::deepseek_v31(),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Marker vocabulary and call layout of one dialect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerTable {
    /// Name used in log events
    pub format_name: String,
    /// Opens the section holding all calls of a turn
    pub calls_begin: String,
    /// Closes the section
    pub calls_end: String,
    /// Opens one call
    pub call_begin: String,
    /// Closes one call
    pub call_end: String,
    /// Separator token inside a call header
    pub tool_sep: String,
    /// Literal between `call_begin` and the function name (may be empty)
    #[serde(default)]
    pub name_prefix: String,
    /// Literal that terminates the function name
    pub name_suffix: String,
    /// Literal between the arguments and `call_end` (may be empty)
    #[serde(default)]
    pub args_suffix: String,
    /// Separator rendered between consecutive calls
    #[serde(default)]
    pub call_separator: String,
}

impl MarkerTable {
    pub fn deepseek_v3() -> Self {
        Self {
            format_name: Dialect::DeepSeekV3.as_str().to_string(),
            calls_begin: "<｜tool▁calls▁begin｜>".to_string(),
            calls_end: "<｜tool▁calls▁end｜>".to_string(),
            call_begin: "<｜tool▁call▁begin｜>".to_string(),
            call_end: "<｜tool▁call▁end｜>".to_string(),
            tool_sep: "<｜tool▁sep｜>".to_string(),
            name_prefix: "function<｜tool▁sep｜>".to_string(),
            name_suffix: "\n```json\n".to_string(),
            args_suffix: "\n```".to_string(),
            call_separator: String::new(),
        }
    }

    pub fn deepseek_v31() -> Self {
        Self {
            format_name: Dialect::DeepSeekV31.as_str().to_string(),
            calls_begin: "<｜tool▁calls▁begin｜>".to_string(),
            calls_end: "<｜tool▁calls▁end｜>".to_string(),
            call_begin: "<｜tool▁call▁begin｜>".to_string(),
            call_end: "<｜tool▁call▁end｜>".to_string(),
            tool_sep: "<｜tool▁sep｜>".to_string(),
            name_prefix: String::new(),
            name_suffix: "<｜tool▁sep｜>".to_string(),
            args_suffix: String::new(),
            call_separator: String::new(),
        }
    }

    /// Every reserved token; none of them may reach the user as plain text
    pub fn tokens(&self) -> [&str; 5] {
        [
            &self.calls_begin,
            &self.calls_end,
            &self.call_begin,
            &self.call_end,
            &self.tool_sep,
        ]
    }

    /// Tokens that open call syntax when seen in plain text
    pub fn opening_tokens(&self) -> [&str; 2] {
        [&self.calls_begin, &self.call_begin]
    }

    /// Markers that end the arguments of an open call, `call_end` first
    pub fn argument_boundaries(&self) -> [&str; 4] {
        [
            &self.call_end,
            &self.call_begin,
            &self.calls_begin,
            &self.calls_end,
        ]
    }

    /// Markers that may not appear inside the arguments of a call
    pub fn interrupting_tokens(&self) -> [&str; 3] {
        [&self.call_begin, &self.calls_begin, &self.calls_end]
    }

    /// Lead characters of the call markers; a function name never contains them
    pub fn name_stop_chars(&self) -> Vec<char> {
        let mut stops: Vec<char> = [&self.call_begin, &self.call_end]
            .iter()
            .filter_map(|token| token.trim_start().chars().next())
            .collect();
        stops.dedup();
        stops
    }

    pub(crate) fn name_prefix_trimmed(&self) -> &str {
        self.name_prefix.trim()
    }

    pub(crate) fn name_suffix_trimmed(&self) -> &str {
        self.name_suffix.trim()
    }

    pub(crate) fn args_suffix_trimmed(&self) -> &str {
        self.args_suffix.trim()
    }

    /// Rendered text that precedes the arguments of a call to `name`
    pub fn render_call_begin(&self, name: &str) -> String {
        format!(
            "{}{}{}{}",
            self.call_begin, self.name_prefix, name, self.name_suffix
        )
    }

    /// Rendered text that follows the arguments of a call
    pub fn render_call_end(&self) -> String {
        format!("{}{}", self.args_suffix, self.call_end)
    }

    /// Check the table can drive a parser
    pub fn validate(&self) -> ConfigResult<()> {
        let required = [
            ("calls_begin", &self.calls_begin),
            ("calls_end", &self.calls_end),
            ("call_begin", &self.call_begin),
            ("call_end", &self.call_end),
            ("tool_sep", &self.tool_sep),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingRequired {
                    field: format!("markers.{}", field),
                });
            }
        }

        if self.name_suffix_trimmed().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "markers.name_suffix".to_string(),
                value: format!("{:?}", self.name_suffix),
                reason: "the function name needs a non-whitespace terminator".to_string(),
            });
        }

        let tokens = self.tokens();
        for (i, a) in tokens.iter().enumerate() {
            for b in tokens.iter().skip(i + 1) {
                if a == b {
                    return Err(ConfigError::InvalidValue {
                        field: "markers".to_string(),
                        value: a.to_string(),
                        reason: "marker tokens must be distinct".to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Length in bytes of the longest marker token
    pub fn longest_token_len(&self) -> usize {
        self.tokens().iter().map(|t| t.len()).max().unwrap_or(0)
    }
}

impl Default for MarkerTable {
    fn default() -> Self {
        Self::deepseek_v3()
    }
}
