//! Payload encoding: rendered page → PNG bytes → base64 `ImageData`.
//!
//! PNG is lossless; text crispness matters far more than file size for
//! transcription accuracy. `detail: "high"` asks GPT-4-class models to use the
//! full tile budget so fine print and small tables survive.

use crate::pipeline::extract::PagePayload;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rendered page as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Wrap a payload as a base64 attachment for the vision request.
pub fn to_image_data(page: &PagePayload) -> ImageData {
    let b64 = STANDARD.encode(&page.bytes);
    debug!(
        "Page {}: {} bytes → {} bytes base64 ({})",
        page.page_num,
        page.bytes.len(),
        b64.len(),
        page.mime_type
    );
    ImageData::new(b64, page.mime_type).with_detail("high")
}
