use crate::models::Dimensions;
use anyhow::{Result, anyhow};
use std::io::Cursor;
use url::Url;

/// Schemes a platform picker is known to hand out.
pub const KNOWN_HANDLE_SCHEMES: &[&str] = &["file", "content", "ph", "assets-library", "blob"];

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validates an asset handle returned by a media picker.
///
/// A handle must be a non-empty absolute URI with a known scheme and
/// something to point at (a host or a non-root path).
pub fn validate_asset_handle(handle: &str) -> Result<Url> {
    if handle.trim().is_empty() {
        return Err(anyhow!(ValidationError {
            code: "EMPTY_HANDLE",
            message: "Asset handle is empty".to_string(),
        }));
    }

    let url = Url::parse(handle).map_err(|e| {
        anyhow!(ValidationError {
            code: "MALFORMED_HANDLE",
            message: format!("'{}' is not a valid URI: {}", handle, e),
        })
    })?;

    if !KNOWN_HANDLE_SCHEMES.contains(&url.scheme()) {
        return Err(anyhow!(ValidationError {
            code: "UNSUPPORTED_SCHEME",
            message: format!("Scheme '{}' is not an asset handle", url.scheme()),
        }));
    }

    let has_host = url.host_str().map(|h| !h.is_empty()).unwrap_or(false);
    let has_path = !matches!(url.path(), "" | "/");
    if !has_host && !has_path {
        return Err(anyhow!(ValidationError {
            code: "MALFORMED_HANDLE",
            message: format!("'{}' does not reference a resource", handle),
        }));
    }

    Ok(url)
}

/// Validates asset size against maximum limit
pub fn validate_asset_size(size: usize, max_size: usize) -> Result<()> {
    if size == 0 {
        return Err(anyhow!(ValidationError {
            code: "EMPTY_ASSET",
            message: "Asset contains no data".to_string(),
        }));
    }
    if size > max_size {
        return Err(anyhow!(ValidationError {
            code: "ASSET_TOO_LARGE",
            message: format!(
                "Asset size {} bytes exceeds maximum allowed {} bytes ({} MB)",
                size,
                max_size,
                max_size / 1024 / 1024
            ),
        }));
    }
    Ok(())
}

/// Detected MIME type and canonical extension of image content.
pub fn detect_image_type(bytes: &[u8]) -> Option<(&'static str, &'static str)> {
    infer::get(bytes)
        .filter(|kind| kind.matcher_type() == infer::MatcherType::Image)
        .map(|kind| (kind.mime_type(), kind.extension()))
}

/// Reads image dimensions from the header without decoding pixels.
pub fn probe_dimensions(bytes: &[u8]) -> Option<Dimensions> {
    let reader = image::io::Reader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?;
    let (width, height) = reader.into_dimensions().ok()?;
    Some(Dimensions { width, height })
}
