//! The outbound recognition boundary.
//!
//! The [`Extractor`](crate::Extractor) never talks to a provider directly;
//! it calls a [`Recognizer`]. Implementations wrap one external text
//! recognition service and report failures as ordinary errors. Timeouts
//! and de-duplication are applied by the caller, so implementations should
//! not retry on their own: every call may be billed.
//!
//! # Example
//!
//! ```ignore
//! struct Fixed;
//!
//! #[async_trait]
//! impl Recognizer for Fixed {
//!     fn name(&self) -> &str { "fixed" }
//!     async fn recognize(&self, _image: &[u8]) -> Result<Recognition> {
//!         Ok(Recognition::new("hello", 1.0))
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::Result;
use crate::types::Recognition;

/// A text recognition provider.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Provider name for logging and metrics.
    fn name(&self) -> &str;

    /// Recognize the text in an encoded image (JPEG, PNG or GIF bytes).
    async fn recognize(&self, image: &[u8]) -> Result<Recognition>;
}
