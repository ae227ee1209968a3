//! Image encoding for the vision tier: `DynamicImage` → PNG → base64 `ImageData`.
//!
//! PNG is lossless; JPEG artefacts around small print (`°C`, `≤ 10 ufc/g`)
//! are exactly what makes a vision model misread a data sheet.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised page as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!("Encoded page image → {} bytes PNG", buf.len());
    Ok(buf)
}

/// Wrap PNG bytes as a base64 image attachment with `detail: "high"`.
pub fn png_image_data(png: &[u8]) -> ImageData {
    ImageData::new(STANDARD.encode(png), "image/png").with_detail("high")
}
