use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, ImageError};

use crate::raster::Raster;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug)]
pub enum CodecError {
    Image(ImageError),
    Base64(base64::DecodeError),
    Json(serde_json::Error),
    InvalidDataUrl(String),
    Io(std::io::Error),
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecError::Image(e) => write!(f, "Image error: {}", e),
            CodecError::Base64(e) => write!(f, "Base64 error: {}", e),
            CodecError::Json(e) => write!(f, "JSON error: {}", e),
            CodecError::InvalidDataUrl(e) => write!(f, "Invalid data URL: {}", e),
            CodecError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for CodecError {}

impl From<ImageError> for CodecError {
    fn from(e: ImageError) -> Self {
        CodecError::Image(e)
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(e: serde_json::Error) -> Self {
        CodecError::Json(e)
    }
}

impl From<std::io::Error> for CodecError {
    fn from(e: std::io::Error) -> Self {
        CodecError::Io(e)
    }
}

impl From<base64::DecodeError> for CodecError {
    fn from(e: base64::DecodeError) -> Self {
        CodecError::Base64(e)
    }
}

// ============================================================================
// PNG
// ============================================================================

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

pub fn encode_png(raster: &Raster) -> Result<Vec<u8>, CodecError> {
    let (w, h) = raster.dimensions();
    let mut buf = Vec::with_capacity(raster.memory_bytes() / 4);
    PngEncoder::new(&mut buf).write_image(raster.as_raw(), w, h, ColorType::Rgba8)?;
    Ok(buf)
}

/// Decode any format the `image` features enable into RGBA8.
pub fn decode_image(bytes: &[u8]) -> Result<Raster, CodecError> {
    let img = image::load_from_memory(bytes)?;
    Ok(Raster::from_rgba_image(img.to_rgba8()))
}

pub fn load_image(path: &Path) -> Result<Raster, CodecError> {
    decode_image(&std::fs::read(path)?)
}

pub fn save_png(raster: &Raster, path: &Path) -> Result<(), CodecError> {
    std::fs::write(path, encode_png(raster)?)?;
    Ok(())
}

// ============================================================================
// DATA URLS
// ============================================================================

/// `data:image/png;base64,...` for a raster.
pub fn to_data_url(raster: &Raster) -> Result<String, CodecError> {
    let png = encode_png(raster)?;
    Ok(format!("{}{}", PNG_DATA_URL_PREFIX, STANDARD.encode(png)))
}

/// Accepts a base64 data URL of any image MIME type, or bare base64.
pub fn from_data_url(url: &str) -> Result<Raster, CodecError> {
    let url = url.trim();
    let payload = match url.strip_prefix("data:") {
        Some(rest) => {
            let (header, data) = rest
                .split_once(',')
                .ok_or_else(|| CodecError::InvalidDataUrl("missing ',' separator".into()))?;
            if !header.ends_with(";base64") {
                return Err(CodecError::InvalidDataUrl(format!(
                    "unsupported encoding '{}'",
                    header
                )));
            }
            data
        }
        None => url,
    };
    let bytes = STANDARD.decode(payload)?;
    decode_image(&bytes)
}
