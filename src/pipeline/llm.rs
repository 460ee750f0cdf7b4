//! Extraction client: send one image to the vision model and return its reply.
//!
//! The request is a system message (the extraction prompt, or the caller's
//! override) followed by a user turn carrying a short instruction and the
//! image. The reply text is returned verbatim; interpreting it is the
//! normaliser's job.
//!
//! ## Retry Strategy
//!
//! Each call is bounded by `api_timeout_secs`. A failed or timed-out call is
//! retried up to `max_retries` times with exponential backoff
//! (`retry_backoff_ms * 2^(attempt-1)`): 500 ms → 1 s → 2 s by default.
//! Extraction has no side effects, so retrying is always safe.

use crate::config::ExtractionConfig;
use crate::error::ItemError;
use crate::prompts::{DEFAULT_EXTRACTION_PROMPT, USER_INSTRUCTION};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// A successful model reply.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Attempts beyond the first.
    pub retries: u32,
    pub duration_ms: u64,
}

/// Ask the model for every MCQ in `image`.
///
/// `source_name` only labels logs and errors.
pub async fn extract_questions(
    provider: &Arc<dyn LLMProvider>,
    source_name: &str,
    image: ImageData,
    config: &ExtractionConfig,
) -> Result<Extraction, ItemError> {
    let start = Instant::now();
    let messages = build_messages(image, config);
    let options = build_options(config);
    let call_timeout = Duration::from_secs(config.api_timeout_secs);

    let mut last_err: Option<String> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config.retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "{}: retry {}/{} after {}ms",
                source_name, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match timeout(call_timeout, provider.chat(&messages, Some(&options))).await {
            Ok(Ok(response)) => {
                let duration = start.elapsed();
                debug!(
                    "{}: {} input tokens, {} output tokens, {:?}",
                    source_name, response.prompt_tokens, response.completion_tokens, duration
                );
                return Ok(Extraction {
                    text: response.content,
                    input_tokens: response.prompt_tokens as u64,
                    output_tokens: response.completion_tokens as u64,
                    retries: attempt,
                    duration_ms: duration.as_millis() as u64,
                });
            }
            Ok(Err(e)) => {
                let err_msg = e.to_string();
                warn!("{}: attempt {} failed: {}", source_name, attempt + 1, err_msg);
                last_err = Some(err_msg);
            }
            Err(_) => {
                let err_msg = format!("timed out after {}s", config.api_timeout_secs);
                warn!("{}: attempt {} {}", source_name, attempt + 1, err_msg);
                last_err = Some(err_msg);
            }
        }
    }

    Err(ItemError::ExtractionTransport {
        source_name: source_name.to_string(),
        retries: config.max_retries,
        detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
    })
}

/// System prompt plus one user turn with the image attached.
pub fn build_messages(image: ImageData, config: &ExtractionConfig) -> Vec<ChatMessage> {
    let system_prompt = config.prompt.as_deref().unwrap_or(DEFAULT_EXTRACTION_PROMPT);
    vec![
        ChatMessage::system(system_prompt),
        ChatMessage::user_with_images(USER_INSTRUCTION, vec![image]),
    ]
}

/// Build `CompletionOptions` from the extraction config.
fn build_options(config: &ExtractionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}
