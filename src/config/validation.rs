use super::*;
use crate::tool_parser::markers::MarkerTable;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &ParserConfig) -> ConfigResult<()> {
        let markers = config.effective_markers();
        markers.validate()?;
        Self::validate_buffer_limit(config.max_buffer_bytes, &markers)?;
        Ok(())
    }

    fn validate_buffer_limit(limit: usize, markers: &MarkerTable) -> ConfigResult<()> {
        if limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_buffer_bytes".to_string(),
                value: limit.to_string(),
                reason: "Must be > 0".to_string(),
            });
        }
        let longest = markers.longest_token_len();
        if limit < longest {
            return Err(ConfigError::IncompatibleConfig {
                reason: format!(
                    "max_buffer_bytes ({}) cannot hold the longest marker of '{}' ({} bytes)",
                    limit, markers.format_name, longest
                ),
            });
        }
        Ok(())
    }
}
