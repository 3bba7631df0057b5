//! # pagescribe
//!
//! Transcribe PDF documents into Markdown with a vision language model, one
//! page at a time.
//!
//! Each page is extracted as a standalone image (or, as a fallback, a
//! single-page PDF), sent to the model with a fixed transcription prompt, and
//! the per-page answers are stitched back together in page order. Pages are
//! transcribed concurrently under a fixed cap; a page that fails costs that
//! page only and shows up as an inline error marker in its own section.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     existence, permission and %PDF magic check
//!  ├─ 2. Extract   pdfium → PNG per page, else lopdf → single-page PDF
//!  ├─ 3. Dispatch  ≤ C concurrent vision calls, one tokio task per page
//!  ├─ 4. Clean     fence stripping and whitespace normalisation
//!  └─ 5. Assemble  sort by page, `## Page n` sections, atomic write
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pagescribe::{Pipeline, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let pipeline = Pipeline::from_config(PipelineConfig::default())?;
//!     let report = pipeline.process("document.pdf", "document.md").await?;
//!     eprintln!(
//!         "{}/{} pages transcribed",
//!         report.stats.succeeded_pages, report.stats.total_pages
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | The `pagescribe` binary (clap + anyhow + indicatif + tracing-subscriber) |
//! | `server` | off     | The `pagescribe-server` upload service (axum) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pagescribe = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PipelineConfig, PipelineConfigBuilder, DEFAULT_CONCURRENCY, DEFAULT_MODEL};
pub use convert::{process_pdf, JobState, Pipeline};
pub use error::{PageError, ScribeError, ERROR_MARKER_PREFIX};
pub use output::{JobReport, JobStats, PageResult, PageStatus};
pub use pipeline::extract::{ExtractionStrategy, PageExtractor, PagePayload, PdfSplitter, PdfiumRasterizer};
pub use pipeline::transcribe::{Transcriber, Transcription, VisionTranscriber};
pub use progress::{JobProgressCallback, NoopProgressCallback, ProgressCallback};
