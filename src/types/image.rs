//! Uploaded images and the limits they are checked against

use crate::{Result, SkaldError};

/// Content types accepted for extraction.
pub const SUPPORTED_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/gif"];

/// Default maximum image size: 10 MiB.
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Default maximum number of images in one batch.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 10;

/// A single image submitted for text extraction.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub data: Vec<u8>,
    pub filename: Option<String>,
    pub content_type: String,
}

impl ImageUpload {
    /// Create an upload from raw bytes and a declared content type.
    pub fn new(data: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            filename: None,
            content_type: content_type.into(),
        }
    }

    /// Attach the client-supplied filename.
    pub fn filename(mut self, name: impl Into<String>) -> Self {
        self.filename = Some(name.into());
        self
    }

    /// Content type without parameters, lowercased (`"image/PNG; q=1"` → `"image/png"`).
    pub fn media_type(&self) -> String {
        self.content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
    }

    /// Check the upload against `limits`.
    ///
    /// Returns `UnsupportedMediaType`, `PayloadTooLarge` or `InvalidInput`
    /// (empty body) so callers can tell bad input apart from throttling and
    /// recognition failures.
    pub fn validate(&self, limits: &UploadLimits) -> Result<()> {
        let media_type = self.media_type();
        if !SUPPORTED_CONTENT_TYPES.contains(&media_type.as_str()) {
            return Err(SkaldError::UnsupportedMediaType(format!(
                "please upload a JPG/JPEG/PNG/GIF image, found: {}",
                self.content_type
            )));
        }
        if self.data.len() > limits.max_bytes {
            return Err(SkaldError::PayloadTooLarge {
                size: self.data.len(),
                limit: limits.max_bytes,
            });
        }
        if self.data.is_empty() {
            return Err(SkaldError::InvalidInput("image is empty".to_string()));
        }
        Ok(())
    }
}

/// Size limits applied to uploads before any cache or provider access.
///
/// ```rust
/// # use skald::UploadLimits;
/// let limits = UploadLimits::new().max_bytes(5 * 1024 * 1024).max_batch_size(4);
/// assert_eq!(limits.max_batch_size, 4);
/// ```
#[derive(Debug, Clone)]
pub struct UploadLimits {
    /// Maximum size of a single image. Default: 10 MiB.
    pub max_bytes: usize,
    /// Maximum number of images in one batch request. Default: 10.
    pub max_batch_size: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_IMAGE_BYTES,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }
}

impl UploadLimits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum size of a single image.
    pub fn max_bytes(mut self, n: usize) -> Self {
        self.max_bytes = n;
        self
    }

    /// Set the maximum number of images per batch.
    pub fn max_batch_size(mut self, n: usize) -> Self {
        self.max_batch_size = n;
        self
    }
}
