use std::collections::HashSet;

use super::*;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &FenceConfig) -> ConfigResult<()> {
        Self::validate_patterns(config)?;

        if config.argument_key_window == 0 {
            return Err(ConfigError::InvalidValue {
                field: "argument_key_window".to_string(),
                value: "0".to_string(),
                reason: "Must be at least 1".to_string(),
            });
        }

        if config.bracket_calls && config.max_bracket_name_len == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_bracket_name_len".to_string(),
                value: "0".to_string(),
                reason: "Must be at least 1 when bracket calls are enabled".to_string(),
            });
        }

        Ok(())
    }

    fn validate_patterns(config: &FenceConfig) -> ConfigResult<()> {
        if config.patterns.is_empty() && !config.bracket_calls {
            return Err(ConfigError::ValidationFailed {
                reason: "No fence patterns configured and bracket calls disabled".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for (i, pattern) in config.patterns.iter().enumerate() {
            if pattern.start.is_empty() {
                return Err(ConfigError::MissingRequired {
                    field: format!("patterns[{}].start", i),
                });
            }
            if pattern.end.is_empty() {
                return Err(ConfigError::MissingRequired {
                    field: format!("patterns[{}].end", i),
                });
            }
            if !seen.insert(pattern.start.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: format!("patterns[{}].start", i),
                    value: pattern.start.clone(),
                    reason: "Duplicate start marker".to_string(),
                });
            }
        }

        Ok(())
    }
}
