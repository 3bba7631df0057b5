//! Page extraction: PDF → ordered, independent page payloads.
//!
//! ## Strategy chain
//!
//! Extraction is an ordered list of [`ExtractionStrategy`] values. The first
//! strategy that yields pages numbered exactly `1..=N` wins; a failure falls
//! through to the next one. The default chain is:
//!
//! 1. [`PdfiumRasterizer`] — renders every page to a PNG with pdfium. Best
//!    input for a vision model, but needs the pdfium shared library.
//! 2. [`PdfSplitter`] — pure Rust (lopdf): one single-page PDF per page.
//!    Works without pdfium and still keeps page count and order.
//!
//! A document with zero pages stops the chain immediately: another strategy
//! would not find more pages, and transcribing nothing is a job failure.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a C++ library with thread-local state and rendering is CPU-bound;
//! lopdf parsing is synchronous too. The whole chain runs on the blocking pool
//! so tokio worker threads never stall.

use crate::error::ScribeError;
use crate::pipeline::encode;
use pdfium_render::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One page's binary content plus its position in the document.
pub struct PagePayload {
    /// 1-indexed page number.
    pub page_num: usize,
    pub bytes: Vec<u8>,
    /// MIME type of `bytes`, e.g. `image/png`.
    pub mime_type: &'static str,
}

impl PagePayload {
    pub fn new(page_num: usize, bytes: Vec<u8>, mime_type: &'static str) -> Self {
        Self {
            page_num,
            bytes,
            mime_type,
        }
    }
}

impl fmt::Debug for PagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PagePayload")
            .field("page_num", &self.page_num)
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

/// One way of turning a document into page payloads.
///
/// Implementations are synchronous; [`PageExtractor`] calls them from the
/// blocking thread pool.
pub trait ExtractionStrategy: Send + Sync {
    /// Short name used in logs and in [`ScribeError::ExtractionFailed`].
    fn name(&self) -> &str;

    /// Produce one payload per page, numbered from 1 in source order.
    fn extract(&self, path: &Path) -> Result<Vec<PagePayload>, ScribeError>;
}

/// Pages produced by a successful extraction.
#[derive(Debug)]
pub struct Extraction {
    /// Name of the strategy that succeeded.
    pub strategy: String,
    pub pages: Vec<PagePayload>,
}

/// Runs the strategy chain.
#[derive(Clone)]
pub struct PageExtractor {
    strategies: Vec<Arc<dyn ExtractionStrategy>>,
}

impl PageExtractor {
    /// An extractor trying `strategies` in order.
    pub fn new(strategies: Vec<Arc<dyn ExtractionStrategy>>) -> Self {
        Self { strategies }
    }

    /// pdfium rasterisation first, lopdf page splitting second.
    pub fn with_default_strategies(max_rendered_pixels: u32) -> Self {
        Self::new(vec![
            Arc::new(PdfiumRasterizer::from_env(max_rendered_pixels)),
            Arc::new(PdfSplitter),
        ])
    }

    /// Names of the configured strategies, in order.
    pub fn strategy_names(&self) -> Vec<String> {
        self.strategies.iter().map(|s| s.name().to_string()).collect()
    }

    /// Extract every page of the document at `path`.
    ///
    /// # Errors
    /// - [`ScribeError::EmptyDocument`] when a strategy reads zero pages
    /// - [`ScribeError::ExtractionFailed`] when every strategy fails
    pub async fn extract(&self, path: &Path) -> Result<Extraction, ScribeError> {
        let strategies = self.strategies.clone();
        let path = path.to_path_buf();

        tokio::task::spawn_blocking(move || run_chain(&strategies, &path))
            .await
            .map_err(|e| ScribeError::Internal(format!("Extraction task panicked: {}", e)))?
    }
}

impl fmt::Debug for PageExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageExtractor")
            .field("strategies", &self.strategy_names())
            .finish()
    }
}

fn run_chain(
    strategies: &[Arc<dyn ExtractionStrategy>],
    path: &Path,
) -> Result<Extraction, ScribeError> {
    let mut attempts = Vec::with_capacity(strategies.len());

    for strategy in strategies {
        let name = strategy.name().to_string();
        debug!("Extracting {} with {}", path.display(), name);

        match strategy.extract(path) {
            Ok(pages) if pages.is_empty() => {
                return Err(ScribeError::EmptyDocument {
                    path: path.to_path_buf(),
                });
            }
            Ok(pages) => match check_numbering(&pages) {
                Ok(()) => {
                    info!("Extracted {} pages with {}", pages.len(), name);
                    return Ok(Extraction {
                        strategy: name,
                        pages,
                    });
                }
                Err(reason) => {
                    warn!("Strategy {} produced bad page numbering: {}", name, reason);
                    attempts.push((name, reason));
                }
            },
            Err(e) => {
                warn!("Strategy {} failed: {}", name, e);
                attempts.push((name, e.to_string()));
            }
        }
    }

    Err(ScribeError::ExtractionFailed {
        path: path.to_path_buf(),
        attempts,
    })
}

/// Pages must be numbered 1..=N in order.
fn check_numbering(pages: &[PagePayload]) -> Result<(), String> {
    for (i, page) in pages.iter().enumerate() {
        if page.page_num != i + 1 {
            return Err(format!(
                "expected page {} at position {}, found page {}",
                i + 1,
                i,
                page.page_num
            ));
        }
    }
    Ok(())
}

// ── pdfium ───────────────────────────────────────────────────────────────

/// Rasterise each page to PNG via pdfium.
///
/// The longest edge is capped at `max_rendered_pixels`: an A0 poster at
/// 150 DPI would otherwise produce a 12,000 × 17,000 px image.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    max_rendered_pixels: u32,
    library_path: Option<PathBuf>,
}

impl PdfiumRasterizer {
    /// Bind to `library_path`, or to the system pdfium when `None`.
    pub fn new(max_rendered_pixels: u32, library_path: Option<PathBuf>) -> Self {
        Self {
            max_rendered_pixels,
            library_path,
        }
    }

    /// Honour `PDFIUM_LIB_PATH` when set.
    pub fn from_env(max_rendered_pixels: u32) -> Self {
        let library_path = std::env::var_os("PDFIUM_LIB_PATH")
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        Self::new(max_rendered_pixels, library_path)
    }

    fn bind(&self) -> Result<Pdfium, ScribeError> {
        let bindings = match &self.library_path {
            Some(lib) => Pdfium::bind_to_library(lib),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| {
            ScribeError::Internal(format!(
                "Failed to bind to pdfium library: {:?} (set PDFIUM_LIB_PATH=/path/to/libpdfium)",
                e
            ))
        })?;
        Ok(Pdfium::new(bindings))
    }
}

impl ExtractionStrategy for PdfiumRasterizer {
    fn name(&self) -> &str {
        "pdfium"
    }

    fn extract(&self, path: &Path) -> Result<Vec<PagePayload>, ScribeError> {
        let pdfium = self.bind()?;

        let document =
            pdfium
                .load_pdf_from_file(path, None)
                .map_err(|e| ScribeError::CorruptPdf {
                    path: path.to_path_buf(),
                    detail: format!("{:?}", e),
                })?;

        let pages = document.pages();
        info!("PDF loaded: {} pages", pages.len());

        let px = self.max_rendered_pixels as i32;
        let render_config = PdfRenderConfig::new()
            .set_target_width(px)
            .set_maximum_height(px);

        let mut payloads = Vec::with_capacity(pages.len() as usize);

        for (idx, page) in pages.iter().enumerate() {
            let page_num = idx + 1;
            let bitmap = page
                .render_with_config(&render_config)
                .map_err(|e| ScribeError::CorruptPdf {
                    path: path.to_path_buf(),
                    detail: format!("rasterisation failed for page {}: {:?}", page_num, e),
                })?;

            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                page_num,
                image.width(),
                image.height()
            );

            let png = encode::encode_png(&image).map_err(|e| ScribeError::CorruptPdf {
                path: path.to_path_buf(),
                detail: format!("PNG encoding failed for page {}: {}", page_num, e),
            })?;

            payloads.push(PagePayload::new(page_num, png, "image/png"));
        }

        Ok(payloads)
    }
}

// ── lopdf ────────────────────────────────────────────────────────────────

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITED_PAGE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Deepest page tree walked when resolving inherited attributes.
const MAX_TREE_DEPTH: usize = 64;

/// Split the document into one single-page PDF per page.
///
/// Each output is built from its page and the objects that page references,
/// so the total work follows the sum of the page closures rather than
/// `pages × document size`. Resources shared by several pages are copied
/// into each of them.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfSplitter;

impl ExtractionStrategy for PdfSplitter {
    fn name(&self) -> &str {
        "lopdf"
    }

    fn extract(&self, path: &Path) -> Result<Vec<PagePayload>, ScribeError> {
        let corrupt = |detail: String| ScribeError::CorruptPdf {
            path: path.to_path_buf(),
            detail,
        };

        let document = lopdf::Document::load(path).map_err(|e| corrupt(e.to_string()))?;
        let pages = document.get_pages();
        info!("PDF parsed: {} pages", pages.len());

        let mut payloads = Vec::with_capacity(pages.len());

        for (idx, (&number, &page_id)) in pages.iter().enumerate() {
            let mut single = single_page(&document, page_id)
                .map_err(|e| corrupt(format!("failed to split page {}: {}", number, e)))?;

            let mut buf = Vec::new();
            single
                .save_to(&mut buf)
                .map_err(|e| corrupt(format!("failed to write page {}: {}", number, e)))?;

            debug!(
                "Split page {} → {} objects, {} bytes",
                idx + 1,
                single.objects.len(),
                buf.len()
            );
            payloads.push(PagePayload::new(idx + 1, buf, "application/pdf"));
        }

        Ok(payloads)
    }
}

/// Build a one-page document from `page_id` and everything it reaches.
///
/// `Parent` links are not followed; inherited attributes are copied onto the
/// page instead, and the page gets a fresh single-kid page tree.
fn single_page(
    source: &lopdf::Document,
    page_id: lopdf::ObjectId,
) -> lopdf::Result<lopdf::Document> {
    use lopdf::{dictionary, Object};

    let mut page = source.get_dictionary(page_id)?.clone();
    for key in INHERITED_PAGE_KEYS {
        if !page.has(key) {
            if let Some(value) = inherited(source, &page, key) {
                page.set(key.to_vec(), value);
            }
        }
    }
    page.remove(b"Parent");

    let mut single = lopdf::Document::with_version(source.version.clone());
    let mut pending = Vec::new();
    push_dict_references(&page, &mut pending);

    let mut seen = std::collections::BTreeSet::from([page_id]);
    while let Some(id) = pending.pop() {
        if !seen.insert(id) {
            continue;
        }
        // A dangling reference reads as null; leave it dangling.
        let Some(object) = source.objects.get(&id) else {
            continue;
        };
        push_references(object, &mut pending);
        single.objects.insert(id, object.clone());
    }

    single.max_id = source.max_id;
    let pages_id = single.new_object_id();
    page.set("Parent", pages_id);
    single.objects.insert(page_id, Object::Dictionary(page));
    single.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );
    let catalog_id = single.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    single.trailer.set("Root", catalog_id);

    Ok(single)
}

/// Nearest ancestor's value for an inheritable page attribute.
fn inherited(
    source: &lopdf::Document,
    page: &lopdf::Dictionary,
    key: &[u8],
) -> Option<lopdf::Object> {
    let mut parent = page.get(b"Parent").and_then(lopdf::Object::as_reference).ok();
    for _ in 0..MAX_TREE_DEPTH {
        let node = source.get_dictionary(parent?).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        parent = node.get(b"Parent").and_then(lopdf::Object::as_reference).ok();
    }
    None
}

fn push_references(object: &lopdf::Object, out: &mut Vec<lopdf::ObjectId>) {
    match object {
        lopdf::Object::Reference(id) => out.push(*id),
        lopdf::Object::Array(items) => items.iter().for_each(|item| push_references(item, out)),
        lopdf::Object::Dictionary(dict) => push_dict_references(dict, out),
        lopdf::Object::Stream(stream) => push_dict_references(&stream.dict, out),
        _ => {}
    }
}

/// Like [`push_references`], skipping `Parent` so the walk stays off the page tree.
fn push_dict_references(dict: &lopdf::Dictionary, out: &mut Vec<lopdf::ObjectId>) {
    for (key, value) in dict.iter() {
        if key.as_slice() != b"Parent" {
            push_references(value, out);
        }
    }
}
