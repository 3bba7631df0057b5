//! Parallel dispatcher: fan every page out to the transcriber with bounded
//! concurrency and collect one result per page.
//!
//! Each page runs on its own tokio task so a slow request never holds up its
//! siblings. `buffer_unordered(C)` only pulls the next payload (and spawns its
//! task) when one of the C slots frees up, which keeps at most C calls in
//! flight. Every task hands its [`PageResult`] back through its join handle;
//! there is no shared, locked result collection.
//!
//! Results come back in completion order. Sorting is the assembler's job.

use crate::config::PipelineConfig;
use crate::error::PageError;
use crate::output::PageResult;
use crate::pipeline::extract::PagePayload;
use crate::pipeline::transcribe::{transcribe_page, Transcriber};
use crate::progress::ProgressCallback;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Knobs the dispatcher needs from [`PipelineConfig`].
#[derive(Debug, Clone, Copy)]
pub struct DispatchOptions {
    /// Concurrency cap; the effective value is `min(cap, page_count)`.
    pub concurrency: usize,
    /// Per-call timeout.
    pub timeout: Duration,
    /// Run [`crate::pipeline::postprocess`] on successful pages.
    pub clean_output: bool,
}

impl From<&PipelineConfig> for DispatchOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            concurrency: config.concurrency,
            timeout: Duration::from_secs(config.api_timeout_secs),
            clean_output: config.clean_output,
        }
    }
}

impl DispatchOptions {
    /// Concurrency actually used for a document of `page_count` pages.
    pub fn effective_concurrency(&self, page_count: usize) -> usize {
        self.concurrency.min(page_count).max(1)
    }
}

/// Transcribe every page, at most `min(concurrency, pages.len())` at a time.
///
/// Returns exactly one result per input payload, in completion order. Never
/// fails and never returns early: error pages and even panicking tasks
/// become error-status results.
pub async fn dispatch(
    transcriber: Arc<dyn Transcriber>,
    pages: Vec<PagePayload>,
    options: DispatchOptions,
    progress: Option<ProgressCallback>,
) -> Vec<PageResult> {
    let total_pages = pages.len();
    if total_pages == 0 {
        return Vec::new();
    }

    let concurrency = options.effective_concurrency(total_pages);
    info!(
        "Dispatching {} pages with concurrency {}",
        total_pages, concurrency
    );

    let DispatchOptions {
        timeout,
        clean_output,
        ..
    } = options;

    stream::iter(pages.into_iter().map(|page| {
        let page_num = page.page_num;
        let transcriber = Arc::clone(&transcriber);
        let task_progress = progress.clone();
        let progress = progress.clone();

        let handle = tokio::spawn(async move {
            if let Some(ref cb) = task_progress {
                cb.on_page_start(page_num, total_pages);
            }
            let result = transcribe_page(transcriber.as_ref(), page, timeout, clean_output).await;
            if let Some(ref cb) = task_progress {
                match result.error() {
                    None => cb.on_page_complete(page_num, total_pages, result.content.len()),
                    Some(e) => cb.on_page_error(page_num, total_pages, e.to_string()),
                }
            }
            result
        });

        async move {
            match handle.await {
                Ok(result) => result,
                Err(join_err) => {
                    let error = PageError::Panicked {
                        page: page_num,
                        detail: join_err.to_string(),
                    };
                    warn!("{}", error);
                    if let Some(ref cb) = progress {
                        cb.on_page_error(page_num, total_pages, error.to_string());
                    }
                    PageResult::failed(error)
                }
            }
        }
    }))
    .buffer_unordered(concurrency)
    .collect()
    .await
}
