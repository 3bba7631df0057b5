//! Result types produced by the pipeline.

use crate::error::PageError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome of transcribing one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageStatus {
    Ok,
    Error(PageError),
}

/// The transcription (or error marker) for a single page.
///
/// Created exactly once per extracted page and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-indexed page number.
    pub page_num: usize,
    /// Transcribed Markdown, or the inline error marker when `status` is an error.
    pub content: String,
    pub status: PageStatus,
    pub input_tokens: usize,
    pub output_tokens: usize,
    /// Wall-clock time spent on this page's call.
    pub duration_ms: u64,
}

impl PageResult {
    /// A successful page.
    pub fn ok(page_num: usize, content: impl Into<String>) -> Self {
        Self {
            page_num,
            content: content.into(),
            status: PageStatus::Ok,
            input_tokens: 0,
            output_tokens: 0,
            duration_ms: 0,
        }
    }

    /// A failed page; the content becomes the error's visible marker.
    pub fn failed(error: PageError) -> Self {
        Self {
            page_num: error.page(),
            content: error.marker(),
            status: PageStatus::Error(error),
            input_tokens: 0,
            output_tokens: 0,
            duration_ms: 0,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.status, PageStatus::Ok)
    }

    pub fn error(&self) -> Option<&PageError> {
        match &self.status {
            PageStatus::Ok => None,
            PageStatus::Error(e) => Some(e),
        }
    }
}

/// Aggregate statistics for one job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobStats {
    pub total_pages: usize,
    pub succeeded_pages: usize,
    pub failed_pages: usize,
    /// Name of the extraction strategy that produced the pages.
    pub extraction_strategy: String,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub extract_duration_ms: u64,
    pub dispatch_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything a completed job produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    /// Where the Markdown was written.
    pub output_path: PathBuf,
    /// The assembled document, identical to the file contents.
    pub markdown: String,
    /// Per-page results in ascending page order.
    pub pages: Vec<PageResult>,
    pub stats: JobStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_result_carries_marker_and_page() {
        let r = PageResult::failed(PageError::EmptyResponse { page: 9 });
        assert_eq!(r.page_num, 9);
        assert!(!r.is_ok());
        assert!(r.content.starts_with(crate::error::ERROR_MARKER_PREFIX));
        assert_eq!(r.error(), Some(&PageError::EmptyResponse { page: 9 }));
    }

    #[test]
    fn page_result_json_shape() {
        let json = serde_json::to_value(PageResult::ok(1, "Hello")).unwrap();
        assert_eq!(json["page_num"], 1);
        assert_eq!(json["content"], "Hello");
        assert_eq!(json["status"], "Ok");
    }
}
