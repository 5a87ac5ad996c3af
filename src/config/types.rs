use serde::{Deserialize, Serialize};

use super::{ConfigResult, ConfigValidator};
use crate::tool_parser::markers::{Dialect, MarkerTable};

/// Parser configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Built-in dialect, used when no custom marker table is given
    #[serde(default)]
    pub dialect: Dialect,
    /// Custom marker table overriding the dialect's built-in one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markers: Option<MarkerTable>,
    /// Upper bound for the undecided streaming tail, in bytes
    #[serde(default = "default_max_buffer_bytes")]
    pub max_buffer_bytes: usize,
    /// Whether grammars admit more than one call per turn
    #[serde(default = "default_allow_multiple_calls")]
    pub allow_multiple_calls: bool,
}

fn default_max_buffer_bytes() -> usize {
    1 << 20
}

fn default_allow_multiple_calls() -> bool {
    true
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            markers: None,
            max_buffer_bytes: default_max_buffer_bytes(),
            allow_multiple_calls: default_allow_multiple_calls(),
        }
    }
}

impl ParserConfig {
    /// Load and validate a configuration from YAML text
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let config: ParserConfig = serde_yaml::from_str(yaml)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Marker table in effect: the custom one if set, else the dialect's
    pub fn effective_markers(&self) -> MarkerTable {
        self.markers
            .clone()
            .unwrap_or_else(|| self.dialect.markers())
    }
}
