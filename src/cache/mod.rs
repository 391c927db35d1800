//! Caching subsystem.
//!
//! - [`result::ResultCache`] — bounded LRU + TTL store of successful
//!   recognitions keyed on image [`Fingerprint`](crate::Fingerprint).
//!   Consulted by the [`Extractor`](crate::Extractor) before any provider
//!   call. See [`result`] module docs for eviction and expiry semantics.

pub mod result;

pub use result::{CacheConfig, CacheStats, DEFAULT_MAX_SIZE, DEFAULT_TTL, ResultCache};
