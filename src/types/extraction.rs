//! Recognition results and extraction outcomes

use serde::{Deserialize, Serialize};

use crate::Result;

/// Text returned in place of an empty recognition.
pub const NO_TEXT_MESSAGE: &str = "No text found in the image.";

/// Raw output of one successful provider call.
///
/// This is the value the result cache stores. It is immutable once
/// produced; the cache hands out shared read-only views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recognition {
    /// Full text as reported by the provider.
    pub text: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Provider-specific payload, kept for callers that need more detail.
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl Recognition {
    pub fn new(text: impl Into<String>, confidence: f64) -> Self {
        Self {
            text: text.into(),
            confidence,
            raw: serde_json::Value::Null,
        }
    }

    /// Attach the provider payload.
    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw = raw;
        self
    }
}

/// Metadata describing the submitted image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub content_type: String,
    pub size_bytes: usize,
    /// Hex SHA-256 of the image bytes.
    pub fingerprint: String,
}

/// Outcome of extracting text from one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    /// `false` when the image contained no recognizable text.
    pub success: bool,
    pub text: String,
    pub confidence: f64,
    pub processing_time_ms: u64,
    /// Whether the result was served from the cache.
    pub cached: bool,
    pub metadata: ImageMetadata,
}

/// Per-image outcome within a batch.
#[derive(Debug)]
pub struct BatchItem {
    pub filename: Option<String>,
    pub outcome: Result<Extraction>,
}

impl BatchItem {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Health check response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub message: String,
}

impl HealthStatus {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            message: "Service is up and running.".to_string(),
        }
    }
}
