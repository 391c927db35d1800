//! Google Cloud Vision client for document text detection.
//!
//! Uses the `images:annotate` REST endpoint with the
//! `DOCUMENT_TEXT_DETECTION` feature, which reports per-word confidences.
//! See: <https://cloud.google.com/vision/docs/reference/rest/v1/images/annotate>

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::Recognizer;
use crate::text::confidence_score;
use crate::{Recognition, Result, SkaldError};

/// Default base URL for the Cloud Vision API
pub const DEFAULT_BASE_URL: &str = "https://vision.googleapis.com";

const FEATURE_DOCUMENT_TEXT: &str = "DOCUMENT_TEXT_DETECTION";

/// Client for the Google Cloud Vision API, authenticated with an API key.
#[derive(Clone)]
pub struct GoogleVisionClient {
    api_key: String,
    http: Client,
    base_url: String,
}

impl GoogleVisionClient {
    /// Create a new client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a client with a custom base URL (for testing with wiremock).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("failed to build HTTP client");

        Self {
            api_key: api_key.into(),
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Detect document text in an encoded image.
    ///
    /// The returned [`Recognition::raw`] is the provider's per-image
    /// response object.
    pub async fn detect_text(&self, image: &[u8]) -> Result<Recognition> {
        let url = format!("{}/v1/images:annotate", self.base_url);

        let request = AnnotateRequest {
            requests: vec![AnnotateImageRequest {
                image: ImageContent {
                    content: STANDARD.encode(image),
                },
                features: vec![Feature {
                    kind: FEATURE_DOCUMENT_TEXT,
                }],
            }],
        };

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| SkaldError::Http(e.to_string()))?;

        let response = check_status(response).await?;

        let body: AnnotateResponse = response
            .json()
            .await
            .map_err(|e| SkaldError::Http(e.to_string()))?;

        let raw = body
            .responses
            .into_iter()
            .next()
            .ok_or(SkaldError::EmptyResponse)?;
        let annotation: ImageAnnotation = serde_json::from_value(raw.clone())?;

        if let Some(error) = annotation.error.filter(|e| !e.message.is_empty()) {
            return Err(SkaldError::Api {
                status: 500,
                message: format!("Error from Vision API: {}", error.message),
            });
        }

        let document = annotation.full_text_annotation.unwrap_or_default();
        let word_confidences: Vec<f64> = document
            .pages
            .iter()
            .flat_map(|page| &page.blocks)
            .flat_map(|block| &block.paragraphs)
            .flat_map(|paragraph| &paragraph.words)
            .map(|word| word.confidence)
            .collect();
        let confidence = confidence_score(&document.text, &word_confidences);

        debug!(
            chars = document.text.len(),
            words = word_confidences.len(),
            confidence,
            "vision text detection complete"
        );

        Ok(Recognition::new(document.text, confidence).with_raw(raw))
    }
}

/// Check response status and map to the appropriate error, reading the
/// provider's error message from the body when present.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let message = response
        .json::<ErrorEnvelope>()
        .await
        .ok()
        .map(|envelope| envelope.error.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("Vision API error: {status}"));

    match status.as_u16() {
        401 | 403 => Err(SkaldError::AuthenticationFailed),
        429 => Err(SkaldError::Api {
            status: 429,
            message: match retry_after {
                Some(after) => format!("{message} (retry after {after}s)"),
                None => message,
            },
        }),
        code => Err(SkaldError::Api {
            status: code,
            message,
        }),
    }
}

#[derive(Serialize)]
struct AnnotateRequest {
    requests: Vec<AnnotateImageRequest>,
}

#[derive(Serialize)]
struct AnnotateImageRequest {
    image: ImageContent,
    features: Vec<Feature>,
}

#[derive(Serialize)]
struct ImageContent {
    content: String,
}

#[derive(Serialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageAnnotation {
    #[serde(default)]
    full_text_annotation: Option<TextAnnotation>,
    #[serde(default)]
    error: Option<Status>,
}

#[derive(Deserialize, Default)]
struct TextAnnotation {
    #[serde(default)]
    text: String,
    #[serde(default)]
    pages: Vec<Page>,
}

#[derive(Deserialize)]
struct Page {
    #[serde(default)]
    blocks: Vec<Block>,
}

#[derive(Deserialize)]
struct Block {
    #[serde(default)]
    paragraphs: Vec<Paragraph>,
}

#[derive(Deserialize)]
struct Paragraph {
    #[serde(default)]
    words: Vec<Word>,
}

#[derive(Deserialize)]
struct Word {
    #[serde(default)]
    confidence: f64,
}

#[derive(Deserialize)]
struct Status {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: Status,
}

// ============================================================================
// Recognizer implementation
// ============================================================================

#[async_trait]
impl Recognizer for GoogleVisionClient {
    fn name(&self) -> &str {
        "google_vision"
    }

    async fn recognize(&self, image: &[u8]) -> Result<Recognition> {
        self.detect_text(image).await
    }
}
