//! Text recognition providers.
//!
//! [`Recognizer`] is the boundary the extractor calls through; the
//! concrete clients live behind cargo features.

pub mod traits;
#[cfg(feature = "google-vision")]
pub mod vision;

pub use traits::Recognizer;
#[cfg(feature = "google-vision")]
pub use vision::GoogleVisionClient;
