//! CLI binary for statement-extract.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use statement_extract::{
    inspect, ExtractionConfig, ExtractionProgressCallback, Extractor, FieldValue,
    PipelineOutput, ProgressCallback, RelevanceReport,
};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner plus one log line per model call.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        Self::with_bar(ProgressBar::new_spinner())
    }

    fn with_bar(bar: ProgressBar) -> Arc<Self> {
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }

    fn finish(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

/// Await `work`, then take the spinner down whether it succeeded or not.
async fn with_spinner<T>(
    spinner: Option<&CliProgressCallback>,
    work: impl Future<Output = Result<T>>,
) -> Result<T> {
    let result = work.await;
    if let Some(s) = spinner {
        s.finish();
    }
    result
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_document_loaded(&self, page_count: usize) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Loaded {page_count} pages"))
        ));
        self.bar.set_message("Finding relevant pages…");
    }

    fn on_relevance_computed(&self, person_pages: &[usize], money_pages: &[usize]) {
        self.bar.println(format!(
            "  {} PERSON {:?}  MONEY {:?}",
            dim("relevant"),
            person_pages,
            money_pages
        ));
        self.bar.set_message("Rendering pages…");
    }

    fn on_scan_start(&self, target: &str, candidates: usize) {
        self.bar.set_prefix(target.to_string());
        self.bar.set_message(format!("{candidates} candidate page(s)"));
    }

    fn on_page_start(&self, _target: &str, page: usize) {
        self.bar.set_message(format!("page {page}"));
    }

    fn on_page_answer(&self, target: &str, page: usize, answer_len: usize) {
        self.bar.println(format!(
            "  {} {:<38} page {:>3}  {}",
            green("✓"),
            target,
            page,
            dim(&format!("{answer_len} chars"))
        ));
    }

    fn on_page_empty(&self, target: &str, page: usize) {
        self.bar.println(format!(
            "  {} {:<38} page {:>3}  {}",
            dim("·"),
            target,
            page,
            dim("nothing")
        ));
    }

    fn on_scan_complete(&self, target: &str, results: usize) {
        if target == statement_extract::prompts::HOLDINGS_LABEL {
            self.bar.finish_and_clear();
        } else {
            self.bar.set_message(format!("{results} answer(s)"));
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract owner, value and holdings
  statement-extract statement.pdf

  # JSON output
  statement-extract --json statement.pdf > fields.json

  # Which pages would be sent to the model (no API key needed)
  statement-extract --inspect-only statement.pdf

  # Scan holdings further into long statements
  statement-extract --early-stop-index 20 statement.pdf

  # Run the upload form on port 8000
  statement-extract --serve 127.0.0.1:8000

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key (required for the default provider)
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  RUST_LOG                Override log filter
"#;

/// Extract owner, portfolio value and holdings from statement PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "statement-extract",
    version,
    about = "Extract owner, portfolio value and holdings from statement PDFs using Vision LLMs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    #[arg(required_unless_present = "serve")]
    input: Option<String>,

    /// Output the three fields as JSON.
    #[arg(long, env = "STATEMENT_EXTRACT_JSON")]
    json: bool,

    /// Print the relevant pages only; no model calls.
    #[arg(long)]
    inspect_only: bool,

    /// Serve the upload form on this address instead of processing a file.
    #[arg(long, value_name = "ADDR", env = "STATEMENT_EXTRACT_SERVE")]
    serve: Option<SocketAddr>,

    /// Vision model ID (default gpt-4o-mini).
    #[arg(long, env = "STATEMENT_EXTRACT_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama.
    #[arg(long, env = "STATEMENT_EXTRACT_PROVIDER")]
    provider: Option<String>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "STATEMENT_EXTRACT_PASSWORD")]
    password: Option<String>,

    /// Stop the holdings scan after an answer on this page index or later.
    #[arg(long, env = "STATEMENT_EXTRACT_EARLY_STOP_INDEX", default_value_t = 7)]
    early_stop_index: usize,

    /// Longest rendered page edge in pixels.
    #[arg(long, env = "STATEMENT_EXTRACT_MAX_PIXELS", default_value_t = 2000)]
    max_pixels: u32,

    /// JPEG quality (1–100) for page images.
    #[arg(long, env = "STATEMENT_EXTRACT_JPEG_QUALITY", default_value_t = 85,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "STATEMENT_EXTRACT_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Max LLM output tokens per page.
    #[arg(long, env = "STATEMENT_EXTRACT_MAX_TOKENS", default_value_t = 2048)]
    max_tokens: usize,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "STATEMENT_EXTRACT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Disable progress output.
    #[arg(long, env = "STATEMENT_EXTRACT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "STATEMENT_EXTRACT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "STATEMENT_EXTRACT_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner replaces INFO logs; the server has no spinner.
    let show_progress =
        !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only && cli.serve.is_none();
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let spinner = show_progress.then(CliProgressCallback::new);
    let progress_cb = spinner.clone().map(|s| s as ProgressCallback);
    let config = build_config(&cli, progress_cb)?;

    // ── Server mode ──────────────────────────────────────────────────────
    if let Some(addr) = cli.serve {
        return serve(addr, &config).await;
    }

    let input = cli.input.as_deref().context("missing INPUT")?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let report = inspect(input, &config)
            .await
            .context("Failed to inspect PDF")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("Failed to serialize report")?
            );
        } else {
            print_report(input, &report);
        }
        return Ok(());
    }

    // ── Run extraction ───────────────────────────────────────────────────
    let output = with_spinner(spinner.as_deref(), async {
        let extractor = Extractor::from_config(&config).context("Vision provider unavailable")?;
        extractor.run_input(input).await.context("Extraction failed")
    })
    .await?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        print_output(&output)?;
    }

    Ok(())
}

#[cfg(feature = "server")]
async fn serve(addr: SocketAddr, config: &ExtractionConfig) -> Result<()> {
    let extractor = Extractor::from_config(config).context("Vision provider unavailable")?;
    statement_extract::server::serve(addr, Arc::new(extractor))
        .await
        .with_context(|| format!("Server on {addr} failed"))
}

#[cfg(not(feature = "server"))]
async fn serve(_addr: SocketAddr, _config: &ExtractionConfig) -> Result<()> {
    anyhow::bail!("--serve requires the `server` feature")
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .max_rendered_pixels(cli.max_pixels)
        .jpeg_quality(cli.jpeg_quality)
        .early_stop_index(cli.early_stop_index)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_report(input: &str, report: &RelevanceReport) {
    println!("File:          {}", input);
    println!("Pages:         {}", report.page_count);
    println!("PERSON pages:  {:?}", report.person_pages);
    println!("MONEY pages:   {:?}", report.money_pages);
}

fn print_output(output: &PipelineOutput) -> Result<()> {
    for entry in output.entries() {
        match entry.value {
            FieldValue::Text(text) => {
                let shown = if text.is_empty() { dim("(not found)") } else { text };
                println!("{}: {}", bold(entry.label), shown);
            }
            FieldValue::Records(records) => {
                println!("{}: {}", bold(entry.label), records.len());
                for record in &records {
                    let line = serde_json::to_string(record).context("Failed to serialise holding")?;
                    println!("  {line}");
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spinner_is_cleared_when_extraction_fails() {
        let spinner = CliProgressCallback::with_bar(ProgressBar::hidden());
        let result: Result<()> =
            with_spinner(Some(spinner.as_ref()), async { anyhow::bail!("no pages") }).await;
        assert!(result.is_err());
        assert!(spinner.bar.is_finished());
    }

    #[tokio::test]
    async fn spinner_already_finished_by_holdings_scan() {
        let spinner = CliProgressCallback::with_bar(ProgressBar::hidden());
        spinner.on_scan_complete(statement_extract::prompts::HOLDINGS_LABEL, 2);
        let value = with_spinner(Some(spinner.as_ref()), async { Ok(3) }).await.unwrap();
        assert_eq!(value, 3);
        assert!(spinner.bar.is_finished());
    }
}
