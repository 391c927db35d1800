//! Skald error types

use std::time::Duration;

use crate::governor::Operation;

/// Skald error types
#[derive(Debug, thiserror::Error)]
pub enum SkaldError {
    // Throttling
    #[error("rate limited for {operation}, retry after {retry_after:?}")]
    RateLimited {
        operation: Operation,
        retry_after: Option<Duration>,
    },

    // Recognition outcome (never cached)
    #[error("text recognition failed: {0}")]
    RecognitionFailed(#[from] RecognitionError),

    // Input errors
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("payload too large: {size} bytes exceeds the limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    // Configuration errors
    #[error("no recognizer configured")]
    NoRecognizer,

    #[error("configuration error: {0}")]
    Configuration(String),

    // Provider/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("empty response from provider")]
    EmptyResponse,

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SkaldError {
    /// Whether this is a throttling outcome rather than a failure.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SkaldError::RateLimited { .. })
    }

    /// Whether the caller supplied input that can never succeed as sent.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            SkaldError::InvalidInput(_)
                | SkaldError::UnsupportedMediaType(_)
                | SkaldError::PayloadTooLarge { .. }
        )
    }

    /// Time the caller should wait before retrying, when known.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SkaldError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Why a single recognition attempt failed.
///
/// Cloneable so that every caller waiting on the same in-flight attempt
/// receives the identical outcome.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecognitionError {
    /// The provider answered with an error (detail preserved for the caller).
    #[error("provider error: {0}")]
    Provider(String),

    /// The provider did not answer within the configured timeout.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The recognition task ended without producing an outcome.
    #[error("recognition task aborted")]
    Aborted,
}

/// Result type alias for Skald operations
pub type Result<T> = std::result::Result<T, SkaldError>;
