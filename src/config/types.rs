use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{ConfigResult, ConfigValidator, FenceConfigBuilder};
use crate::tool_parser::patterns::{MARKDOWN_END, MARKDOWN_STARTS, XML_END, XML_START};

/// Fence recognition settings, fixed for the lifetime of a detector
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FenceConfig {
    /// Literal marker pairs, earlier entries win ties
    pub patterns: Vec<FencePatternConfig>,
    /// Recognize `[name(key=value, ...)]` calls
    pub bracket_calls: bool,
    /// Accept `parameters` when a call has no `arguments`
    pub parameters_alias: bool,
    /// Bytes re-searched for a split `"arguments":` key
    pub argument_key_window: usize,
    /// Longest `[name` tail withheld while waiting for `(`
    pub max_bracket_name_len: usize,
}

impl Default for FenceConfig {
    fn default() -> Self {
        Self {
            patterns: default_patterns(),
            bracket_calls: true,
            parameters_alias: true,
            argument_key_window: 32,
            max_bracket_name_len: 64,
        }
    }
}

impl FenceConfig {
    pub fn builder() -> FenceConfigBuilder {
        FenceConfigBuilder::new()
    }

    pub fn validate(&self) -> ConfigResult<()> {
        ConfigValidator::validate(self)
    }

    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }
}

/// One literal start/end marker pair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FencePatternConfig {
    pub start: String,
    pub end: String,
    /// Defaults to `start`
    #[serde(default)]
    pub reconstruct_prefix: Option<String>,
    /// Swallow a single newline after the start marker
    #[serde(default)]
    pub consume_newline: bool,
}

impl FencePatternConfig {
    pub fn markdown(start: &str) -> Self {
        Self {
            start: start.to_string(),
            end: MARKDOWN_END.to_string(),
            reconstruct_prefix: Some(format!("{}\n", start)),
            consume_newline: true,
        }
    }

    pub fn xml() -> Self {
        Self {
            start: XML_START.to_string(),
            end: XML_END.to_string(),
            reconstruct_prefix: None,
            consume_newline: false,
        }
    }
}

pub fn markdown_patterns() -> Vec<FencePatternConfig> {
    MARKDOWN_STARTS
        .iter()
        .map(|start| FencePatternConfig::markdown(start))
        .collect()
}

pub fn default_patterns() -> Vec<FencePatternConfig> {
    let mut patterns = markdown_patterns();
    patterns.push(FencePatternConfig::xml());
    patterns
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FenceConfig::default();
        assert_eq!(config.patterns.len(), 4);
        assert!(config.bracket_calls);
        assert!(config.parameters_alias);
        assert_eq!(config.argument_key_window, 32);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = FenceConfig::from_json_str(r#"{"bracket_calls": false}"#).unwrap();
        assert!(!config.bracket_calls);
        assert_eq!(config.patterns, default_patterns());
        assert_eq!(config.max_bracket_name_len, 64);
    }

    #[test]
    fn test_custom_patterns_from_json() {
        let json = r#"{
            "patterns": [{"start": "<fn>", "end": "</fn>"}],
            "parameters_alias": false
        }"#;
        let config = FenceConfig::from_json_str(json).unwrap();
        assert_eq!(config.patterns.len(), 1);
        assert_eq!(config.patterns[0].reconstruct_prefix, None);
        assert!(!config.patterns[0].consume_newline);
        assert!(!config.parameters_alias);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            FenceConfig::from_json_str("{not json"),
            Err(crate::config::ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fence.json");
        std::fs::write(&path, r#"{"argument_key_window": 64}"#).unwrap();
        let config = FenceConfig::from_json_file(&path).unwrap();
        assert_eq!(config.argument_key_window, 64);

        assert!(matches!(
            FenceConfig::from_json_file(dir.path().join("missing.json")),
            Err(crate::config::ConfigError::Io(_))
        ));
    }
}
