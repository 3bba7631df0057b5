//! Error types for the pagescribe library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ScribeError`] — **Fatal**: the job cannot produce a document at all
//!   (unreadable input, zero pages, every extraction strategy failed, output
//!   not writable). Returned as `Err(ScribeError)` from
//!   [`crate::convert::Pipeline::process`].
//!
//! * [`PageError`] — **Non-fatal**: a single page could not be transcribed.
//!   Stored inside [`crate::output::PageResult`] and rendered inline in the
//!   final document, so one bad page never aborts its siblings.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pagescribe library.
#[derive(Debug, Error)]
pub enum ScribeError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// The document parsed but has no pages to transcribe.
    #[error("PDF '{path}' has no pages")]
    EmptyDocument { path: PathBuf },

    /// Every extraction strategy failed on this document.
    #[error("Could not extract pages from '{path}':\n{}", format_attempts(.attempts))]
    ExtractionFailed {
        path: PathBuf,
        /// `(strategy name, reason)` for each strategy, in the order tried.
        attempts: Vec<(String, String)>,
    },

    /// A single strategy could not read the document. Collected into
    /// [`ScribeError::ExtractionFailed`] by the extractor.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn format_attempts(attempts: &[(String, String)]) -> String {
    if attempts.is_empty() {
        return "  (no extraction strategy configured)".to_string();
    }
    attempts
        .iter()
        .map(|(name, reason)| format!("  {name}: {reason}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A non-fatal error for a single page.
///
/// The overall job continues; the page's section in the output carries
/// [`PageError::marker`] instead of a transcription.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The provider returned an error (transport, auth, HTTP status, body).
    #[error("Page {page}: transcription service error: {detail}")]
    Service { page: usize, detail: String },

    /// The provider answered but with no text.
    #[error("Page {page}: transcription service returned an empty response")]
    EmptyResponse { page: usize },

    /// The call did not finish within the per-call timeout.
    #[error("Page {page}: transcription timed out after {secs}s")]
    Timeout { page: usize, secs: u64 },

    /// The task carrying this page panicked.
    #[error("Page {page}: transcription task panicked: {detail}")]
    Panicked { page: usize, detail: String },

    /// The payload's format cannot be sent to a vision model.
    #[error("Page {page}: {mime} payloads are not accepted by vision models")]
    UnsupportedPayload { page: usize, mime: String },
}

impl PageError {
    /// The page this error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::Service { page, .. }
            | PageError::EmptyResponse { page }
            | PageError::Timeout { page, .. }
            | PageError::Panicked { page, .. }
            | PageError::UnsupportedPayload { page, .. } => *page,
        }
    }

    /// Short description without the `Page N:` prefix.
    pub fn detail(&self) -> String {
        match self {
            PageError::Service { detail, .. } => detail.clone(),
            PageError::EmptyResponse { .. } => "empty response".to_string(),
            PageError::Timeout { secs, .. } => format!("timed out after {secs}s"),
            PageError::Panicked { detail, .. } => format!("task panicked: {detail}"),
            PageError::UnsupportedPayload { mime, .. } => format!(
                "page is {mime}, which vision models cannot read; \
                 install pdfium (PDFIUM_LIB_PATH) or use a PDF-capable provider"
            ),
        }
    }

    /// The inline text that replaces the transcription in the output.
    ///
    /// Italic and prefixed with [`ERROR_MARKER_PREFIX`] so both readers and
    /// downstream tooling can spot it.
    pub fn marker(&self) -> String {
        format!("{ERROR_MARKER_PREFIX} {}: {}*", self.page(), self.detail())
    }
}

/// Prefix shared by every inline error marker.
pub const ERROR_MARKER_PREFIX: &str = "*Error transcribing page";
