//! Whole-job tests with fake extraction strategies and fake transcribers.
//!
//! No pdfium library and no network access are needed: documents are either
//! fakes behind a `%PDF` stub file or small PDFs built with lopdf.

use async_trait::async_trait;
use lopdf::{dictionary, Document, Object};
use pagescribe::{
    ExtractionStrategy, JobProgressCallback, PageError, PageExtractor, PagePayload, PdfSplitter,
    Pipeline, PipelineConfig, ScribeError, Transcriber, Transcription, ERROR_MARKER_PREFIX,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

// ── Fakes ────────────────────────────────────────────────────────────────────

/// Yields `count` one-byte image payloads without reading the file.
struct FakePages {
    count: usize,
}

impl ExtractionStrategy for FakePages {
    fn name(&self) -> &str {
        "fake"
    }

    fn extract(&self, _path: &Path) -> Result<Vec<PagePayload>, ScribeError> {
        Ok((1..=self.count)
            .map(|n| PagePayload::new(n, vec![n as u8], "image/png"))
            .collect())
    }
}

/// Always refuses the document.
struct Unavailable;

impl ExtractionStrategy for Unavailable {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn extract(&self, _path: &Path) -> Result<Vec<PagePayload>, ScribeError> {
        Err(ScribeError::Internal("renderer not installed".into()))
    }
}

/// Answers per page after a per-page delay.
#[derive(Default)]
struct Scripted {
    replies: HashMap<usize, Result<String, String>>,
    delays_ms: HashMap<usize, u64>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl Scripted {
    fn reply(mut self, page: usize, text: &str) -> Self {
        self.replies.insert(page, Ok(text.to_string()));
        self
    }

    fn fail(mut self, page: usize, detail: &str) -> Self {
        self.replies.insert(page, Err(detail.to_string()));
        self
    }

    fn delay(mut self, page: usize, ms: u64) -> Self {
        self.delays_ms.insert(page, ms);
        self
    }
}

#[async_trait]
impl Transcriber for Scripted {
    async fn transcribe(&self, page: &PagePayload) -> Result<Transcription, PageError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.delays_ms.get(&page.page_num).copied().unwrap_or(10);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.replies.get(&page.page_num) {
            Some(Ok(text)) => Ok(Transcription::new(text.clone())),
            Some(Err(detail)) => Err(PageError::Service {
                page: page.page_num,
                detail: detail.clone(),
            }),
            None => Ok(Transcription::new(format!(
                "page {} ({}, {} bytes)",
                page.page_num,
                page.mime_type,
                page.bytes.len()
            ))),
        }
    }
}

/// Records the order pages complete in.
#[derive(Default)]
struct Recorder {
    started_with: AtomicUsize,
    finished: Mutex<Vec<usize>>,
    errors: Mutex<Vec<usize>>,
    completed_jobs: AtomicUsize,
}

impl JobProgressCallback for Recorder {
    fn on_job_start(&self, total_pages: usize) {
        self.started_with.store(total_pages, Ordering::SeqCst);
    }

    fn on_page_complete(&self, page_num: usize, _total: usize, _len: usize) {
        self.finished.lock().unwrap().push(page_num);
    }

    fn on_page_error(&self, page_num: usize, _total: usize, _error: String) {
        self.errors.lock().unwrap().push(page_num);
        self.finished.lock().unwrap().push(page_num);
    }

    fn on_job_complete(&self, _total: usize, _ok: usize) {
        self.completed_jobs.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn pipeline(
    strategies: Vec<Arc<dyn ExtractionStrategy>>,
    transcriber: Arc<dyn Transcriber>,
    concurrency: usize,
) -> Pipeline {
    let config = PipelineConfig::builder()
        .concurrency(concurrency)
        .api_timeout_secs(5)
        .build()
        .unwrap();
    Pipeline::new(PageExtractor::new(strategies), transcriber, config)
}

/// A file that passes the `%PDF` check; the fake strategies never parse it.
fn pdf_stub(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("input.pdf");
    std::fs::write(&path, b"%PDF-1.4\n%stub\n").unwrap();
    path
}

/// A real PDF with `pages` blank pages.
fn blank_pdf(dir: &TempDir, pages: usize) -> PathBuf {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let kids: Vec<Object> = (0..pages)
        .map(|_| {
            Object::Reference(doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }))
        })
        .collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let path = dir.path().join("blank.pdf");
    doc.save(&path).unwrap();
    path
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn three_pages_finishing_out_of_order_render_in_page_order() {
    let dir = TempDir::new().unwrap();
    let input = pdf_stub(&dir);
    let output = dir.path().join("out.md");

    // Completion order is 3, 1, 2.
    let transcriber = Scripted::default()
        .reply(1, "Text A")
        .reply(2, "Text B")
        .reply(3, "Text C")
        .delay(1, 60)
        .delay(2, 150)
        .delay(3, 0);
    let recorder = Arc::new(Recorder::default());
    let pipeline = pipeline(
        vec![Arc::new(FakePages { count: 3 })],
        Arc::new(transcriber),
        10,
    )
    .with_progress(recorder.clone());

    let report = assert_ok!(pipeline.process(&input, &output).await);

    let expected = "## Page 1\n\nText A\n\n---\n\n\
                    ## Page 2\n\nText B\n\n---\n\n\
                    ## Page 3\n\nText C\n\n---\n\n";
    assert_eq!(report.markdown, expected);
    assert_eq!(std::fs::read_to_string(&output).unwrap(), expected);
    assert_eq!(*recorder.finished.lock().unwrap(), vec![3, 1, 2]);
    assert_eq!(recorder.started_with.load(Ordering::SeqCst), 3);
    assert_eq!(recorder.completed_jobs.load(Ordering::SeqCst), 1);
    assert_eq!(report.stats.succeeded_pages, 3);
    assert_eq!(report.stats.extraction_strategy, "fake");
}

#[tokio::test]
async fn failing_page_keeps_its_section_with_a_marker() {
    let dir = TempDir::new().unwrap();
    let input = pdf_stub(&dir);
    let output = dir.path().join("out.md");

    let transcriber = Scripted::default()
        .reply(1, "One")
        .fail(2, "429 rate limited")
        .reply(3, "Three");
    let recorder = Arc::new(Recorder::default());
    let pipeline = pipeline(
        vec![Arc::new(FakePages { count: 3 })],
        Arc::new(transcriber),
        2,
    )
    .with_progress(recorder.clone());

    let report = assert_ok!(pipeline.process(&input, &output).await);

    assert_eq!(report.pages.len(), 3);
    assert_eq!(report.stats.failed_pages, 1);
    assert_eq!(*recorder.errors.lock().unwrap(), vec![2]);

    let written = std::fs::read_to_string(&output).unwrap();
    assert!(written.contains("## Page 1\n\nOne\n\n---\n\n"));
    assert!(written.contains(&format!(
        "## Page 2\n\n{ERROR_MARKER_PREFIX} 2: 429 rate limited*\n\n---\n\n"
    )));
    assert!(written.contains("## Page 3\n\nThree\n\n---\n\n"));
    assert_eq!(written.matches("## Page ").count(), 3);
}

#[tokio::test]
async fn every_page_failing_still_writes_a_document() {
    let dir = TempDir::new().unwrap();
    let input = pdf_stub(&dir);
    let output = dir.path().join("out.md");

    let transcriber = Scripted::default().fail(1, "down").fail(2, "down");
    let pipeline = pipeline(
        vec![Arc::new(FakePages { count: 2 })],
        Arc::new(transcriber),
        4,
    );

    let report = assert_ok!(pipeline.process(&input, &output).await);
    assert_eq!(report.stats.succeeded_pages, 0);
    assert_eq!(
        report.markdown.matches(ERROR_MARKER_PREFIX).count(),
        2,
        "{}",
        report.markdown
    );
    assert!(output.exists());
}

#[tokio::test]
async fn empty_document_fails_without_output() {
    let dir = TempDir::new().unwrap();
    let input = pdf_stub(&dir);
    let output = dir.path().join("out.md");

    let transcriber = Arc::new(Scripted::default());
    let pipeline = pipeline(
        vec![Arc::new(FakePages { count: 0 })],
        transcriber.clone(),
        4,
    );

    let err = assert_err!(pipeline.process(&input, &output).await);
    assert!(matches!(err, ScribeError::EmptyDocument { .. }), "{err}");
    assert!(!output.exists());
    assert_eq!(transcriber.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unwritable_output_fails_the_job() {
    let dir = TempDir::new().unwrap();
    let input = pdf_stub(&dir);
    // A non-empty directory sits where the Markdown file should go.
    let output = dir.path().join("taken");
    std::fs::create_dir(&output).unwrap();
    std::fs::write(output.join("keep.txt"), "occupied").unwrap();

    let transcriber = Arc::new(Scripted::default());
    let pipeline = pipeline(
        vec![Arc::new(FakePages { count: 2 })],
        transcriber.clone(),
        2,
    );

    let err = assert_err!(pipeline.process(&input, &output).await);
    match err {
        ScribeError::OutputWriteFailed { ref path, .. } => assert_eq!(path, &output),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(transcriber.calls.load(Ordering::SeqCst), 2);
    assert!(output.is_dir());
    assert!(output.join("keep.txt").exists());
    assert!(!dir.path().join("taken.tmp").exists());
}

#[tokio::test]
async fn unparsable_document_fails_without_output() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("broken.pdf");
    std::fs::write(&input, b"%PDF-1.7\nthis is not a real cross-reference table").unwrap();
    let output = dir.path().join("out.md");

    let pipeline = pipeline(
        vec![Arc::new(Unavailable), Arc::new(PdfSplitter)],
        Arc::new(Scripted::default()),
        4,
    );

    let err = assert_err!(pipeline.process(&input, &output).await);
    match err {
        ScribeError::ExtractionFailed { attempts, .. } => {
            let names: Vec<&str> = attempts.iter().map(|(name, _)| name.as_str()).collect();
            assert_eq!(names, vec!["unavailable", "lopdf"]);
        }
        other => panic!("expected ExtractionFailed, got {other:?}"),
    }
    assert!(!output.exists());
}

#[tokio::test]
async fn non_pdf_input_is_rejected_before_extraction() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("notes.pdf");
    std::fs::write(&input, b"just some text").unwrap();
    let output = dir.path().join("out.md");

    let pipeline = pipeline(
        vec![Arc::new(FakePages { count: 2 })],
        Arc::new(Scripted::default()),
        4,
    );

    let err = assert_err!(pipeline.process(&input, &output).await);
    assert!(matches!(err, ScribeError::NotAPdf { .. }), "{err}");
    assert!(!output.exists());
}

#[tokio::test]
async fn missing_input_is_reported() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.md");
    let pipeline = pipeline(
        vec![Arc::new(FakePages { count: 1 })],
        Arc::new(Scripted::default()),
        1,
    );

    let err = assert_err!(pipeline.process(dir.path().join("nope.pdf"), &output).await);
    assert!(matches!(err, ScribeError::FileNotFound { .. }), "{err}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn in_flight_calls_never_exceed_the_cap() {
    let dir = TempDir::new().unwrap();
    let input = pdf_stub(&dir);
    let output = dir.path().join("out.md");

    let mut transcriber = Scripted::default();
    for page in 1..=20 {
        transcriber = transcriber.delay(page, 15);
    }
    let transcriber = Arc::new(transcriber);
    let pipeline = pipeline(
        vec![Arc::new(FakePages { count: 20 })],
        transcriber.clone(),
        4,
    );

    let report = assert_ok!(pipeline.process(&input, &output).await);

    assert_eq!(report.pages.len(), 20);
    assert_eq!(transcriber.calls.load(Ordering::SeqCst), 20);
    let peak = transcriber.peak.load(Ordering::SeqCst);
    assert!(peak <= 4, "peak in-flight calls was {peak}");
}

#[tokio::test]
async fn output_is_identical_whatever_the_completion_order() {
    let dir = TempDir::new().unwrap();
    let input = pdf_stub(&dir);

    let fast_first = Scripted::default().delay(1, 0).delay(2, 20).delay(3, 40).delay(4, 60);
    let slow_first = Scripted::default().delay(1, 60).delay(2, 40).delay(3, 20).delay(4, 0);

    let mut rendered = Vec::new();
    for (i, transcriber) in [fast_first, slow_first].into_iter().enumerate() {
        let output = dir.path().join(format!("out_{i}.md"));
        let pipeline = pipeline(
            vec![Arc::new(FakePages { count: 4 })],
            Arc::new(transcriber),
            4,
        );
        assert_ok!(pipeline.process(&input, &output).await);
        rendered.push(std::fs::read(&output).unwrap());
    }

    assert_eq!(rendered[0], rendered[1]);
}

#[tokio::test]
async fn falls_back_to_page_splitting() {
    let dir = TempDir::new().unwrap();
    let input = blank_pdf(&dir, 3);
    let output = dir.path().join("out.md");

    let pipeline = pipeline(
        vec![Arc::new(Unavailable), Arc::new(PdfSplitter)],
        Arc::new(Scripted::default()),
        3,
    );

    let report = assert_ok!(pipeline.process(&input, &output).await);

    assert_eq!(report.stats.extraction_strategy, "lopdf");
    assert_eq!(report.pages.len(), 3);
    for (i, page) in report.pages.iter().enumerate() {
        assert_eq!(page.page_num, i + 1);
        assert!(
            page.content.starts_with(&format!("page {} (application/pdf", i + 1)),
            "{}",
            page.content
        );
    }
}

#[tokio::test]
async fn in_memory_documents_are_processed() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("nested/bytes.md");

    let pipeline = pipeline(
        vec![Arc::new(FakePages { count: 1 })],
        Arc::new(Scripted::default().reply(1, "```markdown\n# Title\n```")),
        1,
    );

    let report = assert_ok!(pipeline.process_bytes(b"%PDF-1.4\n", &output).await);
    assert_eq!(report.markdown, "## Page 1\n\n# Title\n\n---\n\n");
    assert!(output.exists());
}

#[test]
fn blocking_wrapper_runs_a_job() {
    let dir = TempDir::new().unwrap();
    let input = pdf_stub(&dir);
    let output = dir.path().join("sync.md");

    let pipeline = pipeline(
        vec![Arc::new(FakePages { count: 2 })],
        Arc::new(Scripted::default().reply(1, "a").reply(2, "b")),
        2,
    );

    let report = assert_ok!(pipeline.process_sync(&input, &output));
    assert_eq!(
        report.markdown,
        "## Page 1\n\na\n\n---\n\n## Page 2\n\nb\n\n---\n\n"
    );
}
