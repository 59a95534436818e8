//! Image field resolution: remote URL reference vs inline base64 blob.
//!
//! Inline blobs must be a complete, intact container: the format is sniffed from magic
//! bytes and the whole image is decoded, so truncated data and bad chunk checksums are
//! rejected. Remote URLs are handed to the transport untouched.

use crate::relay::message::ImageSegment;
use crate::relay::RelayError;
use base64::Engine;
use image::{ImageFormat, ImageReader};
use std::io::Cursor;

/// Outcome of inspecting a push request's `image` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedImage {
    /// `http://` or `https://` reference, passed through as-is.
    Remote(String),
    /// Decoded bytes that parse as a known image container.
    Inline {
        data: Vec<u8>,
        format: ImageFormat,
        width: u32,
        height: u32,
    },
    /// Neither a URL nor a valid inline image; the reason is for logs only.
    Invalid(String),
}

impl ResolvedImage {
    /// Turn the resolution into a segment, narrowing every invalid case to
    /// [`RelayError::UnsupportedImageFormat`].
    pub fn into_segment(self) -> Result<ImageSegment, RelayError> {
        match self {
            ResolvedImage::Remote(url) => Ok(ImageSegment::Url(url)),
            ResolvedImage::Inline { data, format, .. } => Ok(ImageSegment::Bytes { data, format }),
            ResolvedImage::Invalid(reason) => Err(RelayError::UnsupportedImageFormat(reason)),
        }
    }
}

pub fn is_remote_reference(field: &str) -> bool {
    field.starts_with("http://") || field.starts_with("https://")
}

/// Classify and, for inline blobs, validate an image field.
pub fn resolve_image(field: &str) -> ResolvedImage {
    if is_remote_reference(field) {
        return ResolvedImage::Remote(field.to_string());
    }
    let compact: String = field.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let data = match base64::engine::general_purpose::STANDARD.decode(compact.as_bytes()) {
        Ok(d) => d,
        Err(e) => return ResolvedImage::Invalid(format!("base64 decode: {}", e)),
    };
    match inspect(&data) {
        Ok((format, width, height)) => ResolvedImage::Inline {
            data,
            format,
            width,
            height,
        },
        Err(reason) => ResolvedImage::Invalid(reason),
    }
}

fn inspect(data: &[u8]) -> Result<(ImageFormat, u32, u32), String> {
    if data.is_empty() {
        return Err("empty image data".to_string());
    }
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| format!("guess format: {}", e))?;
    let format = reader
        .format()
        .ok_or_else(|| "unrecognized image format".to_string())?;
    let decoded = reader
        .decode()
        .map_err(|e| format!("decode {:?}: {}", format, e))?;
    let (width, height) = (decoded.width(), decoded.height());
    if width == 0 || height == 0 {
        return Err(format!("{:?} image has zero dimension", format));
    }
    Ok((format, width, height))
}
