//! Public types for the Skald API.

mod extraction;
mod image;

pub use extraction::{
    BatchItem, Extraction, HealthStatus, ImageMetadata, NO_TEXT_MESSAGE, Recognition,
};
pub use image::{
    DEFAULT_MAX_BATCH_SIZE, DEFAULT_MAX_IMAGE_BYTES, ImageUpload, SUPPORTED_CONTENT_TYPES,
    UploadLimits,
};
