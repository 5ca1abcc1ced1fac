//! Configuration for statement extraction.
//!
//! All tunables live in [`ExtractionConfig`], built via its
//! [`ExtractionConfigBuilder`]. The only secret the pipeline needs is the
//! vision provider credential; it is read once when the provider is created
//! (see [`crate::extract::Extractor::from_config`]) and then lives inside the
//! provider object, never in process-wide state.

use crate::error::ExtractError;
use crate::pipeline::scan::DEFAULT_EARLY_STOP_INDEX;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Provider used when none is configured.
pub const DEFAULT_PROVIDER: &str = "openai";

/// Configuration for one or more extraction runs.
///
/// # Example
/// ```rust
/// use statement_extract::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .model("gpt-4o")
///     .early_stop_index(5)
///     .build()
///     .unwrap();
/// assert_eq!(config.early_stop_index, 5);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Vision model identifier. Default: `gpt-4o-mini`.
    pub model: Option<String>,

    /// Provider name passed to the provider factory (e.g. "openai",
    /// "anthropic", "gemini", "ollama"). `None` means `openai`.
    pub provider_name: Option<String>,

    /// Pre-constructed provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens the model may generate per page. Default: 2048.
    pub max_tokens: usize,

    /// Longest rendered page edge in pixels. Default: 2000.
    pub max_rendered_pixels: u32,

    /// JPEG quality for page images sent to the model (1–100). Default: 85.
    pub jpeg_quality: u8,

    /// Page-index ceiling for the holdings scan. Default: 7.
    ///
    /// Once a non-empty answer is recorded on a page at or past this index
    /// the scan stops, even if candidate pages remain.
    pub early_stop_index: usize,

    /// PDF user password for encrypted statements.
    pub password: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 2048,
            max_rendered_pixels: 2000,
            jpeg_quality: 85,
            early_stop_index: DEFAULT_EARLY_STOP_INDEX,
            password: None,
            download_timeout_secs: 120,
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
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("early_stop_index", &self.early_stop_index)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
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

    /// The model id that will actually be requested.
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    /// The provider name that will actually be used.
    pub fn provider_or_default(&self) -> &str {
        self.provider_name.as_deref().unwrap_or(DEFAULT_PROVIDER)
    }
}

/// Builder for [`ExtractionConfig`].
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl fmt::Debug for ExtractionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
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

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q;
        self
    }

    pub fn early_stop_index(mut self, index: usize) -> Self {
        self.config.early_stop_index = index;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.jpeg_quality == 0 || c.jpeg_quality > 100 {
            return Err(ExtractError::InvalidConfig(format!(
                "JPEG quality must be 1–100, got {}",
                c.jpeg_quality
            )));
        }
        if c.max_tokens == 0 {
            return Err(ExtractError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if let Some(model) = &c.model {
            if model.trim().is_empty() {
                return Err(ExtractError::InvalidConfig("model must not be empty".into()));
            }
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ExtractionConfig::default();
        assert_eq!(c.model_or_default(), "gpt-4o-mini");
        assert_eq!(c.provider_or_default(), "openai");
        assert_eq!(c.early_stop_index, 7);
        assert_eq!(c.jpeg_quality, 85);
        assert!(c.progress_callback.is_none());
    }

    #[test]
    fn builder_clamps() {
        let c = ExtractionConfig::builder()
            .temperature(5.0)
            .max_rendered_pixels(10)
            .build()
            .unwrap();
        assert_eq!(c.temperature, 2.0);
        assert_eq!(c.max_rendered_pixels, 100);
    }

    #[test]
    fn builder_rejects_bad_jpeg_quality() {
        let err = ExtractionConfig::builder().jpeg_quality(0).build().unwrap_err();
        assert!(matches!(err, ExtractError::InvalidConfig(_)));
        assert!(ExtractionConfig::builder().jpeg_quality(101).build().is_err());
        assert!(ExtractionConfig::builder().jpeg_quality(100).build().is_ok());
    }

    #[test]
    fn builder_rejects_blank_model() {
        assert!(ExtractionConfig::builder().model("  ").build().is_err());
    }

    #[test]
    fn debug_redacts_password() {
        let c = ExtractionConfig::builder().password("hunter2").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("<redacted>"));
    }
}
