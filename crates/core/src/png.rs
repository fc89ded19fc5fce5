//! PNG payload validation.
//!
//! The service rejects anything that is not a PNG, so submissions are
//! checked locally before any bytes go over the wire.

use crate::error::CoreError;

/// The eight-byte signature every PNG file starts with.
pub const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a];

/// MIME type attached to the uploaded image part.
pub const PNG_MIME: &str = "image/png";

/// Returns `true` if `bytes` starts with the PNG signature.
pub fn is_png(bytes: &[u8]) -> bool {
    bytes.starts_with(&PNG_SIGNATURE)
}

/// Validate that `bytes` is a PNG payload.
pub fn validate_png(bytes: &[u8]) -> Result<(), CoreError> {
    if bytes.is_empty() {
        return Err(CoreError::Validation("Image payload is empty".into()));
    }
    if !is_png(bytes) {
        return Err(CoreError::Validation("File is not a PNG image".into()));
    }
    Ok(())
}
