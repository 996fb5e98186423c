//! Image encoding: page file → base64 `ImageData` for the multimodal request.
//!
//! Formats every vision API accepts (JPEG, PNG, WEBP, GIF) are sent as-is
//! with their own MIME type, so phone photos are not inflated by a PNG
//! re-encode. BMP and TIFF scans are decoded and re-encoded as PNG.
//! `detail: "high"` keeps small print such as passport numbers readable.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Encoding a page for the request failed.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("cannot read '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// Encode an in-memory page as a base64 PNG.
pub fn encode_page(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded image → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

/// Encode the page image stored at `path`.
pub fn encode_file(path: &Path) -> Result<ImageData, EncodeError> {
    let bytes = std::fs::read(path).map_err(|source| EncodeError::Read {
        path: path.display().to_string(),
        source,
    })?;
    encode_bytes(&bytes)
}

/// Encode raw image bytes, passing API-native formats through untouched.
pub fn encode_bytes(bytes: &[u8]) -> Result<ImageData, EncodeError> {
    let format = image::guess_format(bytes)?;
    match api_mime_type(format) {
        Some(mime) => {
            let b64 = STANDARD.encode(bytes);
            debug!("Encoded {:?} page → {} bytes base64", format, b64.len());
            Ok(ImageData::new(b64, mime).with_detail("high"))
        }
        None => {
            let img = image::load_from_memory_with_format(bytes, format)?;
            Ok(encode_page(&img)?)
        }
    }
}

/// MIME type for formats the vision APIs accept directly.
fn api_mime_type(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::Png => Some("image/png"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Gif => Some("image/gif"),
        _ => None,
    }
}
