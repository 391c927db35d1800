use std::time::Duration;

use skald::{Operation, RecognitionError, Result, SkaldError};

#[test]
fn test_error_display() {
    let err = SkaldError::UnsupportedMediaType("application/pdf".to_string());
    assert!(err.to_string().contains("application/pdf"));

    let err = SkaldError::PayloadTooLarge {
        size: 11,
        limit: 10,
    };
    assert!(err.to_string().contains("11"));
    assert!(err.to_string().contains("10"));
}

#[test]
fn test_result_alias() {
    fn returns_error() -> Result<()> {
        Err(SkaldError::NoRecognizer)
    }
    assert!(returns_error().is_err());
}

#[test]
fn rate_limited_classification() {
    let err = SkaldError::RateLimited {
        operation: Operation::BatchExtract,
        retry_after: Some(Duration::from_secs(12)),
    };
    assert!(err.is_rate_limited());
    assert!(!err.is_invalid_input());
    assert_eq!(err.retry_after(), Some(Duration::from_secs(12)));
    assert!(err.to_string().contains("batch_extract"));
}

#[test]
fn invalid_input_classification() {
    assert!(SkaldError::InvalidInput("empty".into()).is_invalid_input());
    assert!(SkaldError::UnsupportedMediaType("text/plain".into()).is_invalid_input());
    assert!(SkaldError::PayloadTooLarge { size: 2, limit: 1 }.is_invalid_input());

    assert!(!SkaldError::NoRecognizer.is_invalid_input());
    assert!(!SkaldError::Http("reset".into()).is_invalid_input());
    assert!(!SkaldError::from(RecognitionError::Aborted).is_invalid_input());
}

#[test]
fn retry_after_only_for_throttling() {
    assert_eq!(SkaldError::AuthenticationFailed.retry_after(), None);
    assert_eq!(
        SkaldError::Api {
            status: 429,
            message: "quota".into()
        }
        .retry_after(),
        None
    );
}

#[test]
fn recognition_error_converts() {
    let err: SkaldError = RecognitionError::Timeout(Duration::from_secs(30)).into();
    assert!(matches!(
        err,
        SkaldError::RecognitionFailed(RecognitionError::Timeout(_))
    ));
    assert!(err.to_string().contains("timed out"));
}

#[test]
fn recognition_error_is_shareable() {
    let original = RecognitionError::Provider("upstream 503".into());
    let copy = original.clone();
    assert_eq!(original, copy);
}

#[test]
fn json_error_converts() {
    let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{not json");
    let err: SkaldError = parse.unwrap_err().into();
    assert!(matches!(err, SkaldError::Json(_)));
}
