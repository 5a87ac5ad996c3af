use super::{ConfigResult, ConfigValidator, ParserConfig};
use crate::tool_parser::markers::{Dialect, MarkerTable};

/// Builder for ParserConfig that wraps the config itself
#[derive(Debug, Clone, Default)]
pub struct ParserConfigBuilder {
    config: ParserConfig,
}

impl ParserConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder from an existing configuration (takes ownership)
    pub fn from_config(config: ParserConfig) -> Self {
        Self { config }
    }

    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.config.dialect = dialect;
        self
    }

    /// Use a custom marker table instead of the dialect's
    pub fn markers(mut self, markers: MarkerTable) -> Self {
        self.config.markers = Some(markers);
        self
    }

    pub fn max_buffer_bytes(mut self, limit: usize) -> Self {
        self.config.max_buffer_bytes = limit;
        self
    }

    pub fn allow_multiple_calls(mut self, allow: bool) -> Self {
        self.config.allow_multiple_calls = allow;
        self
    }

    /// Build the configuration with validation
    pub fn build(self) -> ConfigResult<ParserConfig> {
        self.build_with_validation(true)
    }

    /// Build the configuration with optional validation
    pub fn build_with_validation(self, validate: bool) -> ConfigResult<ParserConfig> {
        if validate {
            ConfigValidator::validate(&self.config)?;
        }
        Ok(self.config)
    }
}
