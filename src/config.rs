//! Configuration for the transcription pipeline.
//!
//! Every knob lives in [`PipelineConfig`], built via its
//! [`PipelineConfigBuilder`]. The config carries no credentials and no client
//! handle: the transcription client is constructed once at startup and passed
//! to [`crate::convert::Pipeline::new`] next to this struct.

use crate::error::ScribeError;
use serde::{Deserialize, Serialize};

/// Default cap on simultaneously in-flight transcription calls.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Default model when the provider is resolved from the environment.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Configuration for one pipeline instance.
///
/// # Example
/// ```rust
/// use pagescribe::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .concurrency(4)
///     .max_tokens(2000)
///     .build()
///     .unwrap();
/// assert_eq!(config.concurrency, 4);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Upper bound on concurrent transcription calls. Default: 10.
    ///
    /// The effective value for a document is `min(concurrency, page_count)`.
    pub concurrency: usize,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 2000.
    ///
    /// Caps the longest edge regardless of physical page size so a poster-sized
    /// page cannot exhaust memory or exceed the provider's upload limit.
    pub max_rendered_pixels: u32,

    /// Response-size ceiling per page, in tokens. Default: 4000.
    pub max_tokens: usize,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Per-call timeout in seconds. Default: 60.
    ///
    /// Bounds how long one hung request can hold a concurrency slot.
    pub api_timeout_secs: u64,

    /// Provider name (e.g. "openai", "anthropic"). If None, auto-detected.
    pub provider_name: Option<String>,

    /// Model identifier. If None, [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// Custom system instruction. If None, [`crate::prompts::SYSTEM_PROMPT`].
    pub system_prompt: Option<String>,

    /// Tidy successful transcriptions with [`crate::pipeline::postprocess`]. Default: true.
    pub clean_output: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            max_rendered_pixels: 2000,
            max_tokens: 4000,
            temperature: 0.1,
            api_timeout_secs: 60,
            provider_name: None,
            model: None,
            system_prompt: None,
            clean_output: true,
        }
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn clean_output(mut self, v: bool) -> Self {
        self.config.clean_output = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, ScribeError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(ScribeError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(ScribeError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if !(0.0..=2.0).contains(&c.temperature) {
            return Err(ScribeError::InvalidConfig(format!(
                "Temperature must be 0.0–2.0, got {}",
                c.temperature
            )));
        }
        if c.api_timeout_secs == 0 {
            return Err(ScribeError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = PipelineConfig::default();
        assert_eq!(c.concurrency, 10);
        assert_eq!(c.max_tokens, 4000);
        assert_eq!(c.api_timeout_secs, 60);
        assert!(c.clean_output);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let err = PipelineConfig::builder().concurrency(0).build().unwrap_err();
        assert!(matches!(err, ScribeError::InvalidConfig(_)));
    }

    #[test]
    fn out_of_range_temperature_is_rejected() {
        assert!(PipelineConfig::builder().temperature(2.5).build().is_err());
        assert!(PipelineConfig::builder().temperature(-0.1).build().is_err());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(PipelineConfig::builder().api_timeout_secs(0).build().is_err());
    }
}
