//! Document assembly: sort page results and render the final Markdown.
//!
//! The rendered document depends only on the set of results, never on the
//! order they arrived in:
//!
//! ```text
//! ## Page 1\n\n<content>\n\n---\n\n
//! ## Page 2\n\n<content>\n\n---\n\n
//! ```
//!
//! Error pages keep their section; the inline marker is the section body.

use crate::error::ScribeError;
use crate::output::PageResult;
use std::path::Path;
use tracing::debug;

/// Sort results by page number and check they cover exactly `1..=expected_pages`.
pub fn assemble(
    mut results: Vec<PageResult>,
    expected_pages: usize,
) -> Result<Vec<PageResult>, ScribeError> {
    results.sort_by_key(|r| r.page_num);

    if results.len() != expected_pages {
        return Err(ScribeError::Internal(format!(
            "expected {} page results, got {}",
            expected_pages,
            results.len()
        )));
    }
    for (i, r) in results.iter().enumerate() {
        if r.page_num != i + 1 {
            return Err(ScribeError::Internal(format!(
                "page results are not contiguous: expected page {}, found page {}",
                i + 1,
                r.page_num
            )));
        }
    }

    Ok(results)
}

/// Render sorted page results as one Markdown document.
pub fn render_markdown(pages: &[PageResult]) -> String {
    let body_len: usize = pages.iter().map(|p| p.content.len() + 24).sum();
    let mut out = String::with_capacity(body_len);
    for page in pages {
        out.push_str(&format!("## Page {}\n\n", page.page_num));
        out.push_str(&page.content);
        out.push_str("\n\n---\n\n");
    }
    out
}

/// Write `markdown` to `path` atomically (temp file + rename).
///
/// Parent directories are created as needed. A half-written file is never
/// left at `path`.
pub async fn write_output(path: &Path, markdown: &str) -> Result<(), ScribeError> {
    let write_failed = |source: std::io::Error| ScribeError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(write_failed)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, markdown)
        .await
        .map_err(write_failed)?;

    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_failed(e));
    }

    debug!("Wrote {} bytes to {}", markdown.len(), path.display());
    Ok(())
}
