//! Pipeline stages for page-by-page transcription.
//!
//! Each submodule implements exactly one step, so each is testable on its own
//! and the job runner in [`crate::convert`] only wires them together.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ dispatch ──▶ transcribe ──▶ assemble
//! (%PDF?)   (pages)     (fan-out)    (VLM, ×C)      (sort, render, write)
//! ```
//!
//! 1. [`input`]      — reject missing, unreadable or non-PDF inputs early
//! 2. [`extract`]    — ordered strategy chain: pdfium PNGs, else lopdf split
//! 3. [`encode`]     — PNG/base64 encoding for the multimodal request body
//! 4. [`dispatch`]   — bounded fan-out over tokio tasks, completion-order fan-in
//! 5. [`transcribe`] — one vision call per page under the no-throw contract
//! 6. [`postprocess`] — deterministic tidy of each transcription
//! 7. [`assemble`]   — sort, verify 1..N, render sections, atomic write

pub mod assemble;
pub mod dispatch;
pub mod encode;
pub mod extract;
pub mod input;
pub mod postprocess;
pub mod transcribe;
