//! Upload server for pagescribe.
//!
//! Serves the routes in `pagescribe::server` on one address, with a single
//! pipeline shared by every request.

use anyhow::{Context, Result};
use clap::Parser;
use pagescribe::server::{self, AppState, ServerConfig, DEFAULT_MAX_UPLOAD_BYTES};
use pagescribe::{Pipeline, PipelineConfig, DEFAULT_CONCURRENCY};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Web front-end: upload a PDF, download its Markdown transcription.
#[derive(Parser, Debug)]
#[command(name = "pagescribe-server", version)]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "PAGESCRIBE_BIND", default_value = "127.0.0.1:5000")]
    bind: SocketAddr,

    /// Folder receiving uploaded PDFs.
    #[arg(long, env = "PAGESCRIBE_UPLOAD_FOLDER", default_value = "static/uploads")]
    upload_folder: PathBuf,

    /// Folder receiving Markdown outputs.
    #[arg(long, env = "PAGESCRIBE_OUTPUT_FOLDER", default_value = "static/output")]
    output_folder: PathBuf,

    /// Largest accepted request body, in bytes.
    #[arg(long, env = "PAGESCRIBE_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: usize,

    /// LLM provider: openai, anthropic, gemini, azure, ollama, …
    #[arg(long, env = "PAGESCRIBE_PROVIDER")]
    provider: Option<String>,

    /// Vision model ID (default: gpt-4o).
    #[arg(long, env = "PAGESCRIBE_MODEL")]
    model: Option<String>,

    /// Maximum number of pages transcribed concurrently per upload.
    #[arg(long, env = "PAGESCRIBE_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Per-page LLM call timeout in seconds.
    #[arg(long, env = "PAGESCRIBE_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PAGESCRIBE_VERBOSE")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let mut builder = PipelineConfig::builder()
        .concurrency(args.concurrency)
        .api_timeout_secs(args.api_timeout);
    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref model) = args.model {
        builder = builder.model(model);
    }
    let config = builder.build().context("Invalid configuration")?;
    let pipeline = Pipeline::from_config(config).context("Failed to set up the pipeline")?;

    let state = AppState::new(
        pipeline,
        ServerConfig {
            upload_folder: args.upload_folder.clone(),
            output_folder: args.output_folder.clone(),
            max_upload_bytes: args.max_upload_bytes,
        },
    );
    state
        .ensure_folders()
        .await
        .context("Failed to create upload/output folders")?;

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;
    info!(
        "Listening on http://{} (uploads: {}, outputs: {})",
        args.bind,
        args.upload_folder.display(),
        args.output_folder.display()
    );

    axum::serve(listener, server::router(state).into_make_service())
        .await
        .context("Server error")?;
    Ok(())
}
