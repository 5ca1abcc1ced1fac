//! Extraction entry points and the pipeline orchestrator.
//!
//! [`Extractor`] owns the four collaborators (text extraction, entity
//! recognition, rasterisation, vision model) and runs one document through
//! them. It is built once, either from an [`ExtractionConfig`] or from
//! explicit collaborators, and can be shared across runs (the web form keeps
//! one behind an `Arc`). The vision provider and the credential it carries
//! belong to the `Extractor`, not to the process.
//!
//! The free functions [`extract`], [`extract_from_bytes`], [`extract_sync`]
//! and [`inspect`] cover the common one-shot cases.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::output::{HoldingRecord, PipelineOutput, RelevanceReport};
use crate::pipeline::entities::{EntityCategory, EntityRecognizer, RelevantPages, RuleBasedRecognizer};
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::normalize::normalize_records;
use crate::pipeline::render::{PageRasterizer, PdfiumRasterizer};
use crate::pipeline::scan::{PageScanner, StopPolicy, DEFAULT_EARLY_STOP_INDEX};
use crate::pipeline::text::{PageTexts, PdfiumTextExtractor, TextExtractor};
use crate::pipeline::vision::{ProviderVisionModel, VisionModel};
use crate::progress::ProgressCallback;
use crate::prompts::{
    multiple_objects_prompt, single_entity_prompt, HOLDINGS_LABEL, OWNER_NAME_LABEL,
    PORTFOLIO_VALUE_LABEL,
};
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Runs the statement pipeline over one document at a time.
pub struct Extractor {
    text: Arc<dyn TextExtractor>,
    rasterizer: Arc<dyn PageRasterizer>,
    recognizer: Arc<dyn EntityRecognizer>,
    vision: Arc<dyn VisionModel>,
    early_stop_index: usize,
    jpeg_quality: u8,
    download_timeout_secs: u64,
    progress: Option<ProgressCallback>,
}

impl Extractor {
    /// Assemble an extractor from explicit collaborators with default
    /// tuning (early-stop index 7, JPEG quality 85).
    pub fn new(
        text: Arc<dyn TextExtractor>,
        rasterizer: Arc<dyn PageRasterizer>,
        recognizer: Arc<dyn EntityRecognizer>,
        vision: Arc<dyn VisionModel>,
    ) -> Self {
        let defaults = ExtractionConfig::default();
        Self {
            text,
            rasterizer,
            recognizer,
            vision,
            early_stop_index: DEFAULT_EARLY_STOP_INDEX,
            jpeg_quality: defaults.jpeg_quality,
            download_timeout_secs: defaults.download_timeout_secs,
            progress: None,
        }
    }

    /// Build the production extractor: pdfium for text and pages, the
    /// rule-based recogniser, and a vision provider from `config`.
    ///
    /// Fails with [`ExtractError::ProviderNotConfigured`] when the provider's
    /// API key is missing, before any document is opened.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ExtractError> {
        let provider = resolve_provider(config)?;
        info!(
            "Using provider {} with model {}",
            config.provider_or_default(),
            config.model_or_default()
        );

        let vision = ProviderVisionModel::new(provider, config);
        Ok(Self::new(
            Arc::new(PdfiumTextExtractor::new(config.password.clone())),
            Arc::new(PdfiumRasterizer::new(
                config.max_rendered_pixels,
                config.password.clone(),
            )),
            Arc::new(RuleBasedRecognizer),
            Arc::new(vision),
        )
        .with_tuning(config))
    }

    /// Copy the non-collaborator settings from `config`.
    pub fn with_tuning(mut self, config: &ExtractionConfig) -> Self {
        self.early_stop_index = config.early_stop_index;
        self.jpeg_quality = config.jpeg_quality;
        self.download_timeout_secs = config.download_timeout_secs;
        self.progress = config.progress_callback.clone();
        self
    }

    pub fn with_early_stop_index(mut self, index: usize) -> Self {
        self.early_stop_index = index;
        self
    }

    pub fn with_progress(mut self, cb: ProgressCallback) -> Self {
        self.progress = Some(cb);
        self
    }

    /// Run the full pipeline on a local PDF.
    pub async fn run(&self, pdf_path: &Path) -> Result<PipelineOutput, ExtractError> {
        let total_start = Instant::now();
        info!("Extracting statement fields from {}", pdf_path.display());

        // ── Step 1: Text layer ──────────────────────────────────────────────
        let texts = self.text.extract_text(pdf_path).await?;
        info!("PDF has {} pages", texts.len());
        if let Some(ref cb) = self.progress {
            cb.on_document_loaded(texts.len());
        }

        // ── Step 2: Relevance ───────────────────────────────────────────────
        let relevant = self.relevant_pages(&texts)?;

        // ── Step 3: Rasterise every page ────────────────────────────────────
        let render_start = Instant::now();
        let images = self.rasterizer.rasterize(pdf_path).await?;
        debug!("Rendered {} pages in {:?}", images.len(), render_start.elapsed());

        let scanner = PageScanner::new(self.vision.as_ref(), &images, self.jpeg_quality)
            .with_progress(self.progress.as_ref());

        // ── Step 4: Owner name ──────────────────────────────────────────────
        let owner = scanner
            .scan(
                relevant.for_category(EntityCategory::Person),
                &single_entity_prompt(OWNER_NAME_LABEL),
                EntityCategory::Person,
                StopPolicy::FirstAnswer,
                OWNER_NAME_LABEL,
            )
            .await?;

        // ── Step 5: Portfolio value ─────────────────────────────────────────
        let value = scanner
            .scan(
                relevant.for_category(EntityCategory::Money),
                &single_entity_prompt(PORTFOLIO_VALUE_LABEL),
                EntityCategory::Money,
                StopPolicy::FirstAnswer,
                PORTFOLIO_VALUE_LABEL,
            )
            .await?;

        // ── Step 6: Holdings ────────────────────────────────────────────────
        let holding_answers = scanner
            .scan(
                relevant.for_category(EntityCategory::Money),
                &multiple_objects_prompt(HOLDINGS_LABEL),
                EntityCategory::Money,
                StopPolicy::PageCeiling(self.early_stop_index),
                HOLDINGS_LABEL,
            )
            .await?;

        let mut holdings: Vec<HoldingRecord> = Vec::new();
        for result in &holding_answers {
            match normalize_records(&result.answer) {
                Some(records) => {
                    debug!("Page {}: {} holding record(s)", result.page, records.len());
                    holdings.extend(records);
                }
                None => debug!("Page {}: holdings answer skipped", result.page),
            }
        }

        // ── Step 7: Assemble ────────────────────────────────────────────────
        let output = PipelineOutput {
            account_owner_name: owner.first().map(|r| r.answer.trim().to_string()),
            portfolio_value: value.first().map(|r| r.answer.trim().to_string()),
            holdings,
        };

        info!(
            "Extraction complete: owner {}, value {}, {} holding(s) in {:?}",
            if output.account_owner_name.is_some() { "found" } else { "missing" },
            if output.portfolio_value.is_some() { "found" } else { "missing" },
            output.holdings.len(),
            total_start.elapsed()
        );
        Ok(output)
    }

    /// Resolve `input` (path or URL) and run the pipeline on it.
    pub async fn run_input(&self, input_str: &str) -> Result<PipelineOutput, ExtractError> {
        let resolved = input::resolve_input(input_str, self.download_timeout_secs).await?;
        self.run(resolved.path()).await
    }

    /// Run the pipeline on an in-memory PDF.
    pub async fn run_bytes(&self, bytes: &[u8]) -> Result<PipelineOutput, ExtractError> {
        let resolved: ResolvedInput = input::resolve_bytes(bytes)?;
        // `resolved` keeps the temp file alive until the run finishes
        self.run(resolved.path()).await
    }

    /// Text extraction and relevance only; the vision model is never called.
    pub async fn relevance(&self, pdf_path: &Path) -> Result<RelevanceReport, ExtractError> {
        let texts = self.text.extract_text(pdf_path).await?;
        let relevant = self.relevant_pages(&texts)?;
        Ok(RelevanceReport {
            page_count: texts.len(),
            person_pages: relevant.person,
            money_pages: relevant.money,
        })
    }

    fn relevant_pages(&self, texts: &PageTexts) -> Result<RelevantPages, ExtractError> {
        let relevant = RelevantPages::detect(texts, self.recognizer.as_ref())?;
        if let Some(ref cb) = self.progress {
            cb.on_relevance_computed(&relevant.person, &relevant.money);
        }
        Ok(relevant)
    }
}

/// Extract the three statement fields from a PDF file or URL.
///
/// The provider is resolved first, so a missing API key fails before the
/// document is downloaded or opened.
///
/// # Example
/// ```rust,no_run
/// use statement_extract::{extract, ExtractionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let output = extract("statement.pdf", &ExtractionConfig::default()).await?;
/// println!("{}", serde_json::to_string_pretty(&output)?);
/// # Ok(())
/// # }
/// ```
pub async fn extract(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<PipelineOutput, ExtractError> {
    let extractor = Extractor::from_config(config)?;
    extractor.run_input(input_str.as_ref()).await
}

/// Extract from PDF bytes held in memory.
///
/// The bytes are written to a managed temp file that is removed on return.
pub async fn extract_from_bytes(
    bytes: &[u8],
    config: &ExtractionConfig,
) -> Result<PipelineOutput, ExtractError> {
    let extractor = Extractor::from_config(config)?;
    extractor.run_bytes(bytes).await
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<PipelineOutput, ExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(input_str, config))
}

/// Report which pages would be scanned, without calling the vision model.
///
/// Does not require an LLM provider or API key.
pub async fn inspect(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<RelevanceReport, ExtractError> {
    let resolved = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    let text = PdfiumTextExtractor::new(config.password.clone());
    let texts = text.extract_text(resolved.path()).await?;
    let relevant = RelevantPages::detect(&texts, &RuleBasedRecognizer)?;

    Ok(RelevanceReport {
        page_count: texts.len(),
        person_pages: relevant.person,
        money_pages: relevant.money,
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Environment variable holding the API key for a named provider, if the
/// provider needs one.
fn credential_env(provider_name: &str) -> Option<&'static str> {
    match provider_name.to_ascii_lowercase().as_str() {
        "openai" => Some("OPENAI_API_KEY"),
        "anthropic" => Some("ANTHROPIC_API_KEY"),
        "gemini" => Some("GEMINI_API_KEY"),
        _ => None,
    }
}

/// Fail unless the credential for `provider_name` is present and non-empty.
fn check_credential(
    provider_name: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ExtractError> {
    let Some(var) = credential_env(provider_name) else {
        return Ok(());
    };
    match lookup(var) {
        Some(key) if !key.trim().is_empty() => Ok(()),
        _ => {
            error!("{} is not set; refusing to start", var);
            Err(ExtractError::ProviderNotConfigured {
                provider: provider_name.to_string(),
                hint: format!("Set {var} to the API key for the vision model."),
            })
        }
    }
}

/// Resolve the vision provider.
///
/// A pre-built `config.provider` is used as-is. Otherwise the named provider
/// (default `openai`) is created through [`ProviderFactory`] after its API
/// key has been checked.
fn resolve_provider(config: &ExtractionConfig) -> Result<Arc<dyn LLMProvider>, ExtractError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let name = config.provider_or_default();
    check_credential(name, |var| std::env::var(var).ok())?;

    let model = config.model_or_default();
    ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        error!("Could not create provider {}: {}", name, e);
        ExtractError::ProviderNotConfigured {
            provider: name.to_string(),
            hint: format!("{e}"),
        }
    })
}
