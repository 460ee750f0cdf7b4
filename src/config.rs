//! Configuration types for image-to-Perseus question extraction.
//!
//! All pipeline behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Upload credentials are kept apart in
//! [`crate::pipeline::upload::UploadConfig`] so extract-only runs never need
//! them.

use crate::error::McqError;
use crate::pipeline::perseus::HintConfig;
use crate::pipeline::reshape::{ReshapeConfig, COMBINATOR_OPTIONS};
use crate::pipeline::validate::ValidationRules;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Model used when neither the caller nor the environment names one.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Configuration for an extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_mcq::{ExtractionConfig, ValidationRules};
///
/// let config = ExtractionConfig::builder()
///     .model("gpt-4o")
///     .validation(ValidationRules::display())
///     .concurrency(4)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// LLM model identifier, e.g. "gpt-4o", "claude-sonnet-4-20250514".
    /// If None, [`DEFAULT_MODEL`] or `EDGEQUAKE_MODEL` applies.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the environment decides.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the model may generate per image. Default: 2000.
    ///
    /// A page with a dozen questions fits comfortably; if a reply is cut off
    /// the normaliser will fail and the raw text is kept for recovery.
    pub max_tokens: usize,

    /// Retry attempts on a failed or timed-out extraction call. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout for the model in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Longest edge, in pixels, of images sent to the model. Default: 2000.
    pub max_image_dimension: u32,

    /// Images processed at once. Default: 1.
    ///
    /// Uploads for one image always run in question order; raise this only
    /// when the CMS tolerates interleaved inserts across exercises.
    pub concurrency: usize,

    /// Custom system prompt. If None, uses
    /// [`crate::prompts::DEFAULT_EXTRACTION_PROMPT`].
    pub prompt: Option<String>,

    /// Option-count range a question must satisfy. Default: exactly 4.
    pub validation: ValidationRules,

    /// Heuristics applied before validation.
    pub reshape: ReshapeConfig,

    /// Hint texts placed in every document.
    pub hints: HintConfig,

    /// Per-image progress events. Default: none.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 2000,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            download_timeout_secs: 120,
            max_image_dimension: 2000,
            concurrency: 1,
            prompt: None,
            validation: ValidationRules::default(),
            reshape: ReshapeConfig::default(),
            hints: HintConfig::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_image_dimension", &self.max_image_dimension)
            .field("concurrency", &self.concurrency)
            .field("prompt", &self.prompt.as_ref().map(|p| p.len()))
            .field("validation", &self.validation)
            .field("reshape", &self.reshape)
            .field("hints", &self.hints.hints.len())
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn max_image_dimension(mut self, px: u32) -> Self {
        self.config.max_image_dimension = px.max(100);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn validation(mut self, rules: ValidationRules) -> Self {
        self.config.validation = rules;
        self
    }

    pub fn numbered_reflow(mut self, enabled: bool) -> Self {
        self.config.reshape.numbered_reflow = enabled;
        self
    }

    pub fn which_of_the_above(mut self, enabled: bool) -> Self {
        self.config.reshape.which_of_the_above = enabled;
        self
    }

    pub fn which_of_the_above_answer(mut self, index: usize) -> Self {
        self.config.reshape.which_of_the_above_answer = Some(index);
        self
    }

    pub fn hints(mut self, hints: Vec<String>) -> Self {
        self.config.hints = HintConfig::new(hints);
        self
    }

    pub fn progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.config.progress_callback = Some(callback);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, McqError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(McqError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(McqError::InvalidConfig("API timeout must be ≥ 1s".into()));
        }
        if c.max_tokens == 0 {
            return Err(McqError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        let rules = c.validation;
        if rules.min_options < 2 || rules.min_options > rules.max_options {
            return Err(McqError::InvalidConfig(format!(
                "option range must satisfy 2 ≤ min ≤ max, got {}–{}",
                rules.min_options, rules.max_options
            )));
        }
        if let Some(answer) = c.reshape.which_of_the_above_answer {
            if answer >= COMBINATOR_OPTIONS.len() {
                return Err(McqError::InvalidConfig(format!(
                    "which-of-the-above answer must be 0–{}, got {}",
                    COMBINATOR_OPTIONS.len() - 1,
                    answer
                )));
            }
        }
        if matches!(&c.prompt, Some(p) if p.trim().is_empty()) {
            return Err(McqError::InvalidConfig("prompt must not be blank".into()));
        }
        Ok(self.config)
    }
}
