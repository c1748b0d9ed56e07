use super::{markdown_patterns, ConfigResult, FenceConfig, FencePatternConfig};

/// Builder for FenceConfig that wraps the config itself
#[derive(Debug, Clone, Default)]
pub struct FenceConfigBuilder {
    config: FenceConfig,
}

impl FenceConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership
    pub fn from_config(config: FenceConfig) -> Self {
        Self { config }
    }

    // ==================== Pattern Set ====================

    /// Only the markdown spellings; bracket calls off
    pub fn markdown_only(mut self) -> Self {
        self.config.patterns = markdown_patterns();
        self.config.bracket_calls = false;
        self
    }

    /// Only `<tool_call>` tags; bracket calls off
    pub fn xml_only(mut self) -> Self {
        self.config.patterns = vec![FencePatternConfig::xml()];
        self.config.bracket_calls = false;
        self
    }

    pub fn patterns(mut self, patterns: Vec<FencePatternConfig>) -> Self {
        self.config.patterns = patterns;
        self
    }

    pub fn with_pattern(
        mut self,
        start: impl Into<String>,
        end: impl Into<String>,
        reconstruct_prefix: Option<&str>,
        consume_newline: bool,
    ) -> Self {
        self.config.patterns.push(FencePatternConfig {
            start: start.into(),
            end: end.into(),
            reconstruct_prefix: reconstruct_prefix.map(str::to_string),
            consume_newline,
        });
        self
    }

    pub fn bracket_calls(mut self, enabled: bool) -> Self {
        self.config.bracket_calls = enabled;
        self
    }

    // ==================== Parsing ====================

    pub fn parameters_alias(mut self, enabled: bool) -> Self {
        self.config.parameters_alias = enabled;
        self
    }

    pub fn argument_key_window(mut self, window: usize) -> Self {
        self.config.argument_key_window = window;
        self
    }

    pub fn max_bracket_name_len(mut self, len: usize) -> Self {
        self.config.max_bracket_name_len = len;
        self
    }

    // ==================== Build ====================

    pub fn build(self) -> ConfigResult<FenceConfig> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Skip validation
    pub fn build_unchecked(self) -> FenceConfig {
        self.config
    }
}
