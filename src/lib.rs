//! Skald - caching, rate-limited gateway for OCR text extraction
//!
//! Skald sits in front of a text-recognition provider (Google Cloud Vision
//! by default) and makes it safe to expose: every client is held to a
//! per-operation request quota, identical images are recognized once and
//! served from a bounded, expiring cache afterwards, and concurrent
//! requests for the same image share a single provider call.
//!
//! # Example
//!
//! ```rust,no_run
//! use skald::{CacheConfig, ImageUpload, Skald};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> skald::Result<()> {
//!     let extractor = Skald::builder()
//!         .google_vision("your-api-key")
//!         .cache(CacheConfig::new().max_size(500).ttl(Duration::from_secs(600)))
//!         .build()?;
//!
//!     let bytes = std::fs::read("receipt.png").expect("readable image");
//!     let image = ImageUpload::new(bytes, "image/png").filename("receipt.png");
//!     let extraction = extractor.extract("203.0.113.7", image).await?;
//!
//!     println!("{} (confidence {:.2})", extraction.text, extraction.confidence);
//!     Ok(())
//! }
//! ```
//!
//! # Custom recognizers
//!
//! Anything implementing [`Recognizer`] can be plugged in with
//! [`SkaldBuilder::recognizer`]; the cache, quotas and de-duplication apply
//! unchanged.

pub mod cache;
pub mod error;
pub mod fingerprint;
pub mod gateway;
pub mod governor;
pub mod providers;
#[cfg(feature = "server")]
pub mod server;
pub mod singleflight;
pub mod telemetry;
pub mod text;
pub mod types;

// Re-export main types at crate root
pub use cache::{CacheConfig, CacheStats, ResultCache};
pub use error::{RecognitionError, Result, SkaldError};
pub use fingerprint::Fingerprint;
pub use gateway::{Extractor, Skald, SkaldBuilder};
pub use governor::{Operation, RateGovernor, RateLimit, RateLimitConfig};
pub use providers::Recognizer;

#[cfg(feature = "google-vision")]
pub use providers::GoogleVisionClient;

// Re-export all types
pub use types::{
    BatchItem, Extraction, HealthStatus, ImageMetadata, ImageUpload, NO_TEXT_MESSAGE, Recognition,
    UploadLimits,
};

/// Crate version, reported by the server binary.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
