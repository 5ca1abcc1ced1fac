//! Image encoding: `DynamicImage` → base64 JPEG wrapped in `ImageData`.
//!
//! The JPEG encoder rejects alpha and pdfium renders RGBA, so every page is
//! flattened to RGB first. Images are sent with `detail: "high"`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use tracing::debug;

/// Encode a rendered page as a base64 JPEG ready for the vision model.
pub fn encode_page(img: &DynamicImage, quality: u8) -> Result<ImageData, image::ImageError> {
    let rgb = img.to_rgb8();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality).encode_image(&rgb)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded image → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/jpeg").with_detail("high"))
}
