//! Wiremock integration tests for GoogleVisionClient.
//!
//! These tests verify correct HTTP interaction and error handling using mocked responses.
#![cfg(feature = "google-vision")]

use std::sync::Arc;

use skald::{GoogleVisionClient, ImageUpload, RateLimit, RateLimitConfig, Skald, SkaldError};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn annotation(text: &str, confidences: &[f64]) -> serde_json::Value {
    let words: Vec<_> = confidences
        .iter()
        .map(|c| serde_json::json!({ "confidence": c }))
        .collect();
    serde_json::json!({
        "responses": [{
            "fullTextAnnotation": {
                "text": text,
                "pages": [{ "blocks": [{ "paragraphs": [{ "words": words }] }] }]
            }
        }]
    })
}

/// Test successful text detection.
#[tokio::test]
async fn test_detect_text_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/images:annotate"))
        .and(query_param("key", "test_key"))
        .and(body_partial_json(serde_json::json!({
            "requests": [{
                "image": { "content": "aW1hZ2U=" },
                "features": [{ "type": "DOCUMENT_TEXT_DETECTION" }]
            }]
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(annotation("Hello World Text\n", &[0.9, 0.8, 0.0])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = GoogleVisionClient::with_base_url("test_key", mock_server.uri());
    let recognition = client
        .detect_text(b"image")
        .await
        .expect("detect_text should succeed");

    assert_eq!(recognition.text, "Hello World Text\n");
    // Mean of the non-zero word confidences
    assert!((recognition.confidence - 0.85).abs() < 1e-9);
    assert!(recognition.raw.get("fullTextAnnotation").is_some());
}

/// Short text halves the score.
#[tokio::test]
async fn test_short_text_confidence() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/images:annotate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(annotation("Hi", &[0.8])))
        .mount(&mock_server)
        .await;

    let client = GoogleVisionClient::with_base_url("k", mock_server.uri());
    let recognition = client.detect_text(b"img").await.unwrap();
    assert!((recognition.confidence - 0.4).abs() < 1e-9);
}

/// An image without text yields an empty recognition.
#[tokio::test]
async fn test_no_text_detected() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/images:annotate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "responses": [{}]
        })))
        .mount(&mock_server)
        .await;

    let client = GoogleVisionClient::with_base_url("k", mock_server.uri());
    let recognition = client.detect_text(b"img").await.unwrap();
    assert_eq!(recognition.text, "");
    assert_eq!(recognition.confidence, 0.0);
}

/// Test 403 response maps to AuthenticationFailed.
#[tokio::test]
async fn test_auth_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/images:annotate"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "error": { "code": 403, "message": "API key not valid." }
        })))
        .mount(&mock_server)
        .await;

    let client = GoogleVisionClient::with_base_url("bad_key", mock_server.uri());
    let err = client.detect_text(b"img").await.unwrap_err();
    assert!(matches!(err, SkaldError::AuthenticationFailed));
}

/// Test 429 response carries the provider's retry hint.
#[tokio::test]
async fn test_provider_quota_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/images:annotate"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "30")
                .set_body_json(serde_json::json!({
                    "error": { "code": 429, "message": "Quota exceeded." }
                })),
        )
        .mount(&mock_server)
        .await;

    let client = GoogleVisionClient::with_base_url("k", mock_server.uri());
    match client.detect_text(b"img").await.unwrap_err() {
        SkaldError::Api { status, message } => {
            assert_eq!(status, 429);
            assert!(message.contains("Quota exceeded."), "{message}");
            assert!(message.contains("retry after 30s"), "{message}");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

/// Test 500 without a JSON body.
#[tokio::test]
async fn test_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/images:annotate"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&mock_server)
        .await;

    let client = GoogleVisionClient::with_base_url("k", mock_server.uri());
    let err = client.detect_text(b"img").await.unwrap_err();
    assert!(matches!(err, SkaldError::Api { status: 500, .. }));
}

/// Per-image errors inside a 200 response are failures.
#[tokio::test]
async fn test_per_image_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/images:annotate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "responses": [{ "error": { "code": 3, "message": "Bad image data." } }]
        })))
        .mount(&mock_server)
        .await;

    let client = GoogleVisionClient::with_base_url("k", mock_server.uri());
    match client.detect_text(b"img").await.unwrap_err() {
        SkaldError::Api { message, .. } => {
            assert_eq!(message, "Error from Vision API: Bad image data.");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

/// An empty `responses` array is an empty response.
#[tokio::test]
async fn test_empty_responses() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/images:annotate"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "responses": [] })),
        )
        .mount(&mock_server)
        .await;

    let client = GoogleVisionClient::with_base_url("k", mock_server.uri());
    let err = client.detect_text(b"img").await.unwrap_err();
    assert!(matches!(err, SkaldError::EmptyResponse));
}

/// End to end through the extractor: the provider is called once per image.
#[tokio::test]
async fn test_extractor_caches_vision_results() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/images:annotate"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(annotation("Total: 42.00\r\n\r\n\r\nThanks", &[0.95, 0.9])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let extractor = Arc::new(
        Skald::builder()
            .google_vision("k")
            .google_vision_url(mock_server.uri())
            .rate_limits(RateLimitConfig::new().extract(RateLimit::per_minute(100)))
            .build()
            .unwrap(),
    );

    let image = || ImageUpload::new(b"receipt bytes".to_vec(), "image/jpeg");
    let first = extractor.extract("c1", image()).await.unwrap();
    let second = extractor.extract("c1", image()).await.unwrap();

    assert_eq!(first.text, "Total: 42.00\n\nThanks");
    assert!(!first.cached);
    assert!(second.cached);
    assert_eq!(extractor.recognizer_name(), "google_vision");
    // `expect(1)` is verified when the mock server drops
}
