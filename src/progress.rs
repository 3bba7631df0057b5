//! Progress-callback trait for per-page job events.
//!
//! Inject an [`Arc<dyn JobProgressCallback>`] via
//! [`crate::convert::Pipeline::with_progress`] to receive events as the
//! dispatcher works through a document. The trait is `Send + Sync` because
//! page events fire from concurrently running tokio tasks.
//!
//! # Example
//!
//! ```rust
//! use pagescribe::JobProgressCallback;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl JobProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize, content_len: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Page {}/{} done ({} bytes)", page_num, total_pages, content_len);
//!     }
//! }
//! ```

use std::sync::Arc;

/// Called by the pipeline as it processes each page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Page events may arrive concurrently and in any order;
/// implementations must synchronise their own state (`Mutex`, atomics).
pub trait JobProgressCallback: Send + Sync {
    /// Called once after extraction, before any page is dispatched.
    fn on_job_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before the transcription request is sent for a page.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page is transcribed successfully.
    fn on_page_complete(&self, page_num: usize, total_pages: usize, content_len: usize) {
        let _ = (page_num, total_pages, content_len);
    }

    /// Called when a page ends with an error result.
    ///
    /// `error` is owned so implementations can move it into spawned tasks.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: String) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after every page has a result.
    fn on_job_complete(&self, total_pages: usize, success_count: usize) {
        let _ = (total_pages, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl JobProgressCallback for NoopProgressCallback {}

/// Shared handle type stored by the pipeline.
pub type ProgressCallback = Arc<dyn JobProgressCallback>;
