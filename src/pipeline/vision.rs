//! Field extraction: ask a vision model one question about one page image.
//!
//! The scan loop in [`super::scan`] only sees the [`VisionModel`] trait.
//! [`ProviderVisionModel`] makes exactly one call per page and propagates
//! any failure; there is no retry.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

/// A vision-capable model that answers `prompt` about `image`.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Return the model's raw textual answer. `page` is for error context.
    async fn answer(
        &self,
        page: usize,
        prompt: &str,
        image: ImageData,
    ) -> Result<String, ExtractError>;
}

/// [`VisionModel`] backed by an `edgequake-llm` provider.
///
/// The provider carries its own credential, so constructing one is the
/// point where a missing API key surfaces.
pub struct ProviderVisionModel {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl ProviderVisionModel {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ExtractionConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
        }
    }
}

#[async_trait]
impl VisionModel for ProviderVisionModel {
    async fn answer(
        &self,
        page: usize,
        prompt: &str,
        image: ImageData,
    ) -> Result<String, ExtractError> {
        let start = Instant::now();
        let messages = vec![ChatMessage::user_with_images(prompt, vec![image])];

        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| {
                error!("Page {}: vision call failed: {}", page, e);
                ExtractError::LlmApiError {
                    page,
                    message: e.to_string(),
                }
            })?;

        debug!(
            "Page {}: {} input tokens, {} output tokens, {:?}",
            page,
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        Ok(response.content)
    }
}

/// Build `CompletionOptions` from the extraction config.
fn build_options(config: &ExtractionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_defaults() {
        let config = ExtractionConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.0));
        assert_eq!(opts.max_tokens, Some(2048));
    }

    #[test]
    fn build_options_follow_config() {
        let config = ExtractionConfig::builder()
            .temperature(0.3)
            .max_tokens(512)
            .build()
            .unwrap();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.3));
        assert_eq!(opts.max_tokens, Some(512));
    }
}
