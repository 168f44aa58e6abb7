//! Image input handling for portfolio items.
//!
//! An item's `img` field holds exactly one of two representations: an
//! embedded `data:` URI built from uploaded bytes, or a plain external URL.
//! Embedded payloads are capped before they ever reach a store operation.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use thiserror::Error;

/// Prefix that marks an embedded image, as opposed to a linked URL.
pub const EMBEDDED_PREFIX: &str = "data:";

/// Largest accepted embedded image payload, in bytes.
pub const MAX_EMBEDDED_BYTES: usize = 500_000;

/// Errors from image input validation.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Image too large ({size} bytes). Please use an image smaller than 500KB.")]
    TooLarge { size: usize },

    #[error("Image data is empty")]
    Empty,
}

/// How an `img` value is represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    /// Inline `data:` URI.
    Embedded,
    /// External URL.
    Linked,
}

/// Classify an `img` value by its prefix.
pub fn image_kind(img: &str) -> ImageKind {
    if img.starts_with(EMBEDDED_PREFIX) {
        ImageKind::Embedded
    } else {
        ImageKind::Linked
    }
}

/// Convert uploaded bytes into an embeddable `data:` URI.
///
/// Rejects payloads over [`MAX_EMBEDDED_BYTES`] before any encoding work, so
/// an oversized upload never produces a partial item.
pub fn embed_bytes(bytes: &[u8], mime: &str) -> Result<String, ImageError> {
    if bytes.is_empty() {
        return Err(ImageError::Empty);
    }
    if bytes.len() > MAX_EMBEDDED_BYTES {
        return Err(ImageError::TooLarge { size: bytes.len() });
    }
    Ok(format!("{EMBEDDED_PREFIX}{mime};base64,{}", BASE64.encode(bytes)))
}
