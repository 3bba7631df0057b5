//! CLI binary for pagescribe.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig`, runs one job and prints a summary.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pagescribe::{
    JobProgressCallback, JobReport, Pipeline, PipelineConfig, ProgressCallback,
    DEFAULT_CONCURRENCY,
};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── Progress bar ─────────────────────────────────────────────────────────────

/// Renders job events with indicatif. Pages finish out of order, so each
/// page's start time is tracked by page number.
struct CliProgress {
    bar: ProgressBar,
    started: Mutex<HashMap<usize, Instant>>,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Extracting");
        bar.set_message("reading pages…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Mutex::new(HashMap::new()),
        })
    }

    fn elapsed_secs(&self, page_num: usize) -> f64 {
        self.started
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&page_num))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl JobProgressCallback for CliProgress {
    fn on_job_start(&self, total_pages: usize) {
        self.bar.set_length(total_pages as u64);
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} pages  \
                 ⏱ {elapsed_precise}  ETA {eta_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        self.bar.set_prefix("Transcribing");
        self.bar.reset_eta();
    }

    fn on_page_start(&self, page_num: usize, _total_pages: usize) {
        if let Ok(mut m) = self.started.lock() {
            m.insert(page_num, Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total_pages: usize, content_len: usize) {
        let secs = self.elapsed_secs(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            page_num,
            total_pages,
            dim(&format!("{content_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total_pages: usize, error: String) {
        let secs = self.elapsed_secs(page_num);
        let msg = match error.char_indices().nth(80) {
            Some((cut, _)) => format!("{}…", &error[..cut]),
            None => error,
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total_pages,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_job_complete(&self, _total_pages: usize, _succeeded_pages: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Transcribe to document.md next to the input
  pagescribe document.pdf

  # Explicit output path, five pages at a time
  pagescribe scan.pdf -o notes/scan.md --concurrency 5

  # Another provider / model
  pagescribe --provider anthropic --model claude-sonnet-4-20250514 paper.pdf

  # Machine-readable report on stdout
  pagescribe --json --no-progress report.pdf > report.json

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key (default provider)
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama, …)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium; without it the system library is
                          used, and when none is found pages are split with lopdf
  RUST_LOG                Override the log filter
"#;

/// Transcribe PDF documents to Markdown with a vision LLM, page by page.
#[derive(Parser, Debug)]
#[command(
    name = "pagescribe",
    version,
    about = "Transcribe PDF documents to Markdown with a vision LLM, page by page",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF file to transcribe.
    input: PathBuf,

    /// Markdown output path. Defaults to the input path with a `.md` extension.
    #[arg(short, long, env = "PAGESCRIBE_OUTPUT")]
    output: Option<PathBuf>,

    /// LLM provider: openai, anthropic, gemini, azure, ollama, …
    #[arg(long, env = "PAGESCRIBE_PROVIDER")]
    provider: Option<String>,

    /// Vision model ID (default: gpt-4o).
    #[arg(long, env = "PAGESCRIBE_MODEL")]
    model: Option<String>,

    /// Maximum number of pages transcribed concurrently.
    #[arg(short, long, env = "PAGESCRIBE_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Longest edge, in pixels, of each rendered page.
    #[arg(long, env = "PAGESCRIBE_MAX_PIXELS", default_value_t = 2000)]
    max_pixels: u32,

    /// Max LLM output tokens per page.
    #[arg(long, env = "PAGESCRIBE_MAX_TOKENS", default_value_t = 4000)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PAGESCRIBE_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Per-page LLM call timeout in seconds.
    #[arg(long, env = "PAGESCRIBE_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Text file replacing the built-in system prompt.
    #[arg(long, env = "PAGESCRIBE_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Keep transcriptions exactly as returned by the model.
    #[arg(long, env = "PAGESCRIBE_NO_CLEAN")]
    no_clean: bool,

    /// Print the job report as JSON on stdout.
    #[arg(long, env = "PAGESCRIBE_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "PAGESCRIBE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PAGESCRIBE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PAGESCRIBE_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless --verbose is set.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    let config = build_config(&cli).await?;
    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&cli.input));

    let mut pipeline = Pipeline::from_config(config).context("Failed to set up the pipeline")?;
    if show_progress {
        pipeline = pipeline.with_progress(CliProgress::new() as ProgressCallback);
    }

    let report = pipeline
        .process(&cli.input, &output)
        .await
        .with_context(|| format!("Failed to transcribe {}", cli.input.display()))?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&report);
    }

    Ok(())
}

/// Map CLI args onto the config builder.
async fn build_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .concurrency(cli.concurrency)
        .max_rendered_pixels(cli.max_pixels)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .api_timeout_secs(cli.api_timeout)
        .clean_output(!cli.no_clean);

    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {}", path.display()))?;
        builder = builder.system_prompt(prompt);
    }

    builder.build().context("Invalid configuration")
}

/// `report.pdf` → `report.md`, in the same directory.
fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("md")
}

fn print_summary(report: &JobReport) {
    let stats = &report.stats;
    let mark = if stats.failed_pages == 0 {
        green("✔")
    } else if stats.succeeded_pages == 0 {
        red("✘")
    } else {
        yellow("⚠")
    };

    eprintln!(
        "{}  {}/{} pages  {}ms  →  {}",
        mark,
        stats.succeeded_pages,
        stats.total_pages,
        stats.total_duration_ms,
        bold(&report.output_path.display().to_string()),
    );
    if stats.failed_pages > 0 {
        eprintln!(
            "   {} pages carry an inline error marker",
            red(&stats.failed_pages.to_string())
        );
    }
    eprintln!(
        "   {} tokens in  /  {} tokens out  ({})",
        dim(&stats.total_input_tokens.to_string()),
        dim(&stats.total_output_tokens.to_string()),
        dim(&stats.extraction_strategy),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn output_defaults_next_to_input() {
        assert_eq!(
            default_output_path(Path::new("/tmp/docs/report.pdf")),
            PathBuf::from("/tmp/docs/report.md")
        );
        assert_eq!(
            default_output_path(Path::new("scan")),
            PathBuf::from("scan.md")
        );
    }

    #[test]
    fn flags_map_onto_config() {
        let cli = Cli::parse_from([
            "pagescribe",
            "in.pdf",
            "--concurrency",
            "3",
            "--api-timeout",
            "15",
            "--no-clean",
            "--model",
            "gpt-4o-mini",
        ]);
        let config = tokio_test::block_on(build_config(&cli)).unwrap();
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.api_timeout_secs, 15);
        assert!(!config.clean_output);
        assert_eq!(config.model.as_deref(), Some("gpt-4o-mini"));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let cli = Cli::parse_from(["pagescribe", "in.pdf", "--concurrency", "0"]);
        assert!(tokio_test::block_on(build_config(&cli)).is_err());
    }
}
