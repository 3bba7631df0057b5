//! Job runner: one document through extract → dispatch → assemble.
//!
//! ## Job lifecycle
//!
//! ```text
//! Idle ─▶ Extracting ─▶ Dispatching ─▶ Assembling ─▶ Done
//!             │                             │
//!             └──────────▶ Failed ◀─────────┘
//! ```
//!
//! Only extraction and the final write can fail a job. Dispatching never does:
//! per-page failures are data inside [`PageResult`], rendered inline.
//!
//! A [`Pipeline`] holds no per-document state, so one instance can serve many
//! documents, concurrently if the caller wants.

use crate::config::PipelineConfig;
use crate::error::ScribeError;
use crate::output::{JobReport, JobStats, PageResult};
use crate::pipeline::assemble::{assemble, render_markdown, write_output};
use crate::pipeline::dispatch::{dispatch, DispatchOptions};
use crate::pipeline::extract::{Extraction, PageExtractor};
use crate::pipeline::input;
use crate::pipeline::transcribe::{Transcriber, VisionTranscriber};
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Stage of a single document job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Idle,
    Extracting,
    Dispatching,
    Assembling,
    Done,
    Failed,
}

impl JobState {
    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Idle, Extracting)
                | (Extracting, Dispatching)
                | (Extracting, Failed)
                | (Dispatching, Assembling)
                | (Assembling, Done)
                | (Assembling, Failed)
        )
    }
}

/// Tracks and logs the lifecycle of one job.
struct Job {
    input: PathBuf,
    state: JobState,
}

impl Job {
    fn new(input: &Path) -> Self {
        Self {
            input: input.to_path_buf(),
            state: JobState::Idle,
        }
    }

    fn advance(&mut self, next: JobState) {
        debug_assert!(
            self.state.can_transition(next),
            "illegal job transition {:?} → {:?}",
            self.state,
            next
        );
        debug!("{}: {:?} → {:?}", self.input.display(), self.state, next);
        self.state = next;
    }
}

/// The transcription pipeline: an extractor, a transcriber and a config.
#[derive(Clone)]
pub struct Pipeline {
    extractor: PageExtractor,
    transcriber: Arc<dyn Transcriber>,
    config: PipelineConfig,
    progress: Option<ProgressCallback>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("extractor", &self.extractor)
            .field("transcriber", &"<dyn Transcriber>")
            .field("config", &self.config)
            .field("progress", &self.progress.as_ref().map(|_| "<dyn JobProgressCallback>"))
            .finish()
    }
}

impl Pipeline {
    /// Assemble a pipeline from explicitly constructed parts.
    pub fn new(
        extractor: PageExtractor,
        transcriber: Arc<dyn Transcriber>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            extractor,
            transcriber,
            config,
            progress: None,
        }
    }

    /// Default extraction chain plus a vision transcriber resolved from
    /// `config` and the environment.
    pub fn from_config(config: PipelineConfig) -> Result<Self, ScribeError> {
        let transcriber = VisionTranscriber::from_config(&config)?;
        let extractor = PageExtractor::with_default_strategies(config.max_rendered_pixels);
        Ok(Self::new(extractor, Arc::new(transcriber), config))
    }

    /// Receive per-page progress events.
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Transcribe the PDF at `input` and write the Markdown to `output`.
    ///
    /// # Returns
    /// `Ok(JobReport)` whenever a document was written, even if some pages
    /// failed (their sections carry an inline error marker; see
    /// `report.stats.failed_pages`).
    ///
    /// # Errors
    /// Only job-level failures: unreadable or non-PDF input, zero pages,
    /// every extraction strategy failing, or an unwritable output. Nothing is
    /// written at `output` in these cases.
    pub async fn process(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<JobReport, ScribeError> {
        let input = input.as_ref();
        let output = output.as_ref();
        info!("Starting job: {} → {}", input.display(), output.display());

        let mut job = Job::new(input);
        let result = self.run(&mut job, input, output).await;

        if let Err(ref e) = result {
            error!("Job failed for {}: {}", input.display(), e);
            job.advance(JobState::Failed);
        }
        result
    }

    /// Transcribe an in-memory PDF and write the Markdown to `output`.
    ///
    /// The bytes are spilled to a managed [`tempfile`] that is removed when
    /// the job finishes, whatever its outcome.
    pub async fn process_bytes(
        &self,
        bytes: &[u8],
        output: impl AsRef<Path>,
    ) -> Result<JobReport, ScribeError> {
        let mut tmp = tempfile::Builder::new()
            .suffix(".pdf")
            .tempfile()
            .map_err(|e| ScribeError::Internal(format!("tempfile: {e}")))?;
        tmp.write_all(bytes)
            .map_err(|e| ScribeError::Internal(format!("tempfile write: {e}")))?;

        self.process(tmp.path(), output).await
    }

    /// Blocking wrapper around [`Pipeline::process`].
    ///
    /// Creates a temporary tokio runtime internally; do not call from inside
    /// an async context.
    pub fn process_sync(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<JobReport, ScribeError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| ScribeError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.process(input, output))
    }

    async fn run(
        &self,
        job: &mut Job,
        input: &Path,
        output: &Path,
    ) -> Result<JobReport, ScribeError> {
        let total_start = Instant::now();

        // ── Extract ──────────────────────────────────────────────────────
        job.advance(JobState::Extracting);
        let extract_start = Instant::now();
        let Extraction { strategy, pages } = self.extract(input).await?;
        let extract_duration_ms = extract_start.elapsed().as_millis() as u64;
        let total_pages = pages.len();
        info!(
            "Extracted {} pages with {} in {}ms",
            total_pages, strategy, extract_duration_ms
        );

        if let Some(ref cb) = self.progress {
            cb.on_job_start(total_pages);
        }

        // ── Dispatch ─────────────────────────────────────────────────────
        job.advance(JobState::Dispatching);
        let dispatch_start = Instant::now();
        let results = dispatch(
            Arc::clone(&self.transcriber),
            pages,
            DispatchOptions::from(&self.config),
            self.progress.clone(),
        )
        .await;
        let dispatch_duration_ms = dispatch_start.elapsed().as_millis() as u64;

        // ── Assemble ─────────────────────────────────────────────────────
        job.advance(JobState::Assembling);
        let pages = assemble(results, total_pages)?;
        let markdown = render_markdown(&pages);
        write_output(output, &markdown).await?;

        let stats = compute_stats(
            &pages,
            strategy,
            extract_duration_ms,
            dispatch_duration_ms,
            total_start.elapsed().as_millis() as u64,
        );

        if let Some(ref cb) = self.progress {
            cb.on_job_complete(stats.total_pages, stats.succeeded_pages);
        }

        info!(
            "Job complete: {}/{} pages transcribed, {}ms total → {}",
            stats.succeeded_pages,
            stats.total_pages,
            stats.total_duration_ms,
            output.display()
        );
        job.advance(JobState::Done);

        Ok(JobReport {
            output_path: output.to_path_buf(),
            markdown,
            pages,
            stats,
        })
    }

    async fn extract(&self, input: &Path) -> Result<Extraction, ScribeError> {
        input::validate_pdf(input)?;
        self.extractor.extract(input).await
    }
}

fn compute_stats(
    pages: &[PageResult],
    extraction_strategy: String,
    extract_duration_ms: u64,
    dispatch_duration_ms: u64,
    total_duration_ms: u64,
) -> JobStats {
    let succeeded = pages.iter().filter(|p| p.is_ok()).count();
    JobStats {
        total_pages: pages.len(),
        succeeded_pages: succeeded,
        failed_pages: pages.len() - succeeded,
        extraction_strategy,
        total_input_tokens: pages.iter().map(|p| p.input_tokens as u64).sum(),
        total_output_tokens: pages.iter().map(|p| p.output_tokens as u64).sum(),
        extract_duration_ms,
        dispatch_duration_ms,
        total_duration_ms,
    }
}

/// Transcribe `input` to `output` with a pipeline built from `config`.
///
/// Convenience for one-off calls; long-running hosts should build one
/// [`Pipeline`] at startup and reuse it.
pub async fn process_pdf(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: PipelineConfig,
) -> Result<JobReport, ScribeError> {
    Pipeline::from_config(config)?.process(input, output).await
}
