//! HTTP upload service around [`Pipeline`].
//!
//! | Route | Behaviour |
//! |-------|-----------|
//! | `GET /` | upload form |
//! | `POST /upload` | multipart field `file`; transcribe and report the download link |
//! | `GET /download/{filename}` | Markdown output as an attachment |
//! | `GET /view_markdown/{filename}` | Markdown output as `{"content": …}` |
//!
//! Every error body is `{"error": "<message>"}`. Upload validation problems
//! answer 400, a failed job 500, a missing output 404. Uploads are processed
//! inline: the response is sent once the Markdown file exists.

use crate::convert::Pipeline;
use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Multipart, Path as UrlPath, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Default request body limit for uploads (64 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Where uploads and outputs live on disk.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub upload_folder: PathBuf,
    pub output_folder: PathBuf,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            upload_folder: PathBuf::from("static/uploads"),
            output_folder: PathBuf::from("static/output"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
    config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(pipeline: Pipeline, config: ServerConfig) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            config: Arc::new(config),
        }
    }

    /// Create the upload and output folders if they are missing.
    pub async fn ensure_folders(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.config.upload_folder).await?;
        tokio::fs::create_dir_all(&self.config.output_folder).await
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let limit = state.config.max_upload_bytes;
    Router::new()
        .route("/", get(index))
        .route("/upload", post(upload))
        .route("/download/{filename}", get(download))
        .route("/view_markdown/{filename}", get(view_markdown))
        .layer(DefaultBodyLimit::max(limit))
        .with_state(state)
}

// ── Errors ───────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: "File not found".to_string(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::not_found(),
            _ => Self::internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    success: bool,
    message: &'static str,
    output_file: String,
}

struct UploadedPdf {
    filename: String,
    bytes: Vec<u8>,
}

async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let pdf = read_pdf_field(&mut multipart).await?;

    let id = Uuid::new_v4();
    let safe_name = match secure_filename(&pdf.filename) {
        name if name.is_empty() => "upload.pdf".to_string(),
        name => name,
    };
    let stem = Path::new(&safe_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("upload")
        .to_string();

    let pdf_path = state.config.upload_folder.join(format!("{id}_{safe_name}"));
    let output_name = format!("{stem}_{id}.md");
    let output_path = state.config.output_folder.join(&output_name);

    tokio::fs::write(&pdf_path, &pdf.bytes).await.map_err(|e| {
        error!("Failed to store upload {}: {}", pdf_path.display(), e);
        ApiError::internal(e.to_string())
    })?;
    info!(
        "Stored upload {} ({} bytes) as {}",
        pdf.filename,
        pdf.bytes.len(),
        pdf_path.display()
    );

    match state.pipeline.process(&pdf_path, &output_path).await {
        Ok(report) => {
            info!(
                "Upload {} transcribed: {}/{} pages",
                safe_name, report.stats.succeeded_pages, report.stats.total_pages
            );
            Ok(Json(UploadResponse {
                success: true,
                message: "PDF processed successfully",
                output_file: format!("/download/{output_name}"),
            }))
        }
        Err(e) => {
            warn!("Upload {} failed: {}", safe_name, e);
            Err(ApiError::internal(e.to_string()))
        }
    }
}

/// Pull the `file` field out of the form, applying the upload checks in order:
/// present, named, `.pdf`.
async fn read_pdf_field(multipart: &mut Multipart) -> Result<UploadedPdf, ApiError> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err(ApiError::bad_request("No file part")),
            Err(err) => {
                warn!("Failed to read multipart payload: {}", err);
                return Err(ApiError {
                    status: err.status(),
                    message: err.body_text(),
                });
            }
        };

        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        if filename.is_empty() {
            return Err(ApiError::bad_request("No selected file"));
        }
        if !filename.to_lowercase().ends_with(".pdf") {
            return Err(ApiError::bad_request(
                "Invalid file format. Please upload a PDF file.",
            ));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|err| ApiError {
                status: err.status(),
                message: err.body_text(),
            })?
            .to_vec();

        return Ok(UploadedPdf { filename, bytes });
    }
}

async fn download(
    State(state): State<AppState>,
    UrlPath(filename): UrlPath<String>,
) -> Result<Response, ApiError> {
    let name = bare_filename(&filename).ok_or_else(ApiError::not_found)?;
    let bytes = tokio::fs::read(state.config.output_folder.join(name))
        .await
        .map_err(ApiError::from_io)?;

    let mut response = Response::new(Body::from(bytes));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/markdown; charset=utf-8"),
    );
    let safe_name = name.replace('"', "'");
    if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{safe_name}\"")) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}

async fn view_markdown(
    State(state): State<AppState>,
    UrlPath(filename): UrlPath<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let name = bare_filename(&filename).ok_or_else(ApiError::not_found)?;
    let content = tokio::fs::read_to_string(state.config.output_folder.join(name))
        .await
        .map_err(ApiError::from_io)?;
    Ok(Json(json!({ "content": content })))
}

// ── Filenames ────────────────────────────────────────────────────────────

/// Reduce an uploaded filename to a safe ASCII name.
///
/// Directory parts are dropped, whitespace becomes `_`, anything outside
/// `[A-Za-z0-9._-]` is removed, and leading or trailing `.`/`_` are trimmed.
/// May return an empty string.
pub fn secure_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    cleaned.trim_matches(['.', '_']).to_string()
}

/// Accept only names that stay inside the output folder.
fn bare_filename(name: &str) -> Option<&str> {
    let trimmed = name.trim();
    let is_bare = !trimmed.is_empty()
        && trimmed != "."
        && trimmed != ".."
        && !trimmed.contains(['/', '\\', '\0']);
    is_bare.then_some(trimmed)
}

const INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>pagescribe</title>
  <style>
    body { font-family: system-ui, sans-serif; max-width: 48rem; margin: 3rem auto; padding: 0 1rem; }
    pre { white-space: pre-wrap; background: #f6f8fa; padding: 1rem; border-radius: 6px; }
    .error { color: #b00020; }
  </style>
</head>
<body>
  <h1>PDF to Markdown</h1>
  <form id="upload" enctype="multipart/form-data">
    <input type="file" name="file" accept="application/pdf,.pdf">
    <button type="submit">Transcribe</button>
  </form>
  <p id="status"></p>
  <pre id="preview" hidden></pre>
  <script>
    const form = document.getElementById("upload");
    const status = document.getElementById("status");
    const preview = document.getElementById("preview");
    form.addEventListener("submit", async (event) => {
      event.preventDefault();
      status.className = "";
      status.textContent = "Processing…";
      preview.hidden = true;
      const response = await fetch("/upload", { method: "POST", body: new FormData(form) });
      const body = await response.json();
      if (!response.ok) {
        status.className = "error";
        status.textContent = body.error;
        return;
      }
      status.innerHTML = `${body.message}: <a href="${body.output_file}">download</a>`;
      const name = body.output_file.split("/").pop();
      const view = await (await fetch(`/view_markdown/${encodeURIComponent(name)}`)).json();
      preview.textContent = view.content;
      preview.hidden = false;
    });
  </script>
</body>
</html>
"#;
