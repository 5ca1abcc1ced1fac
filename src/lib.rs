//! # statement-extract
//!
//! Pull the account owner, the portfolio value and the list of holdings out
//! of a financial-statement PDF with a Vision Language Model (VLM).
//!
//! Statements are often scans, so the text layer alone is unreliable for the
//! actual values. It is good enough, though, to tell which pages mention a
//! person or an amount of money. Only those pages are shown to the VLM, one
//! at a time, and each scan stops as soon as it has what it needs.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     resolve local file, URL download or uploaded bytes
//!  ├─ 2. Text      per-page text layer via pdfium
//!  ├─ 3. Entities  PERSON / MONEY relevance per page
//!  ├─ 4. Render    rasterise pages via pdfium (spawn_blocking)
//!  ├─ 5. Scan      owner (first answer), value (first answer),
//!  │               holdings (until the page-index ceiling)
//!  ├─ 6. Normalize fenced JSON list → holding records
//!  └─ 7. Output    [owner name, portfolio value, holdings]
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use statement_extract::{extract, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Requires OPENAI_API_KEY for the default provider.
//!     let config = ExtractionConfig::default();
//!     let output = extract("statement.pdf", &config).await?;
//!     println!("owner: {:?}", output.account_owner_name);
//!     println!("value: {:?}", output.portfolio_value);
//!     println!("{} holdings", output.holdings.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `statement-extract` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `server` | on      | Enables [`server`], the HTML upload form and JSON endpoint (axum + tower-http) |
//!
//! Disable both when using only the library:
//! ```toml
//! statement-extract = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::ExtractError;
pub use extract::{extract, extract_from_bytes, extract_sync, inspect, Extractor};
pub use output::{ExtractionResult, FieldValue, HoldingRecord, OutputEntry, PipelineOutput, RelevanceReport};
pub use pipeline::entities::{EntityCategory, EntityRecognizer, RuleBasedRecognizer};
pub use pipeline::render::PageRasterizer;
pub use pipeline::scan::{PageScanner, StopPolicy, DEFAULT_EARLY_STOP_INDEX};
pub use pipeline::text::TextExtractor;
pub use pipeline::vision::VisionModel;
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
