//! Extractor - gates, caches and de-duplicates calls to the recognizer
//!
//! Every request walks the same path:
//!
//! 1. **Rate check.** The client's quota for the operation is consulted
//!    first. A denial ends the request with [`SkaldError::RateLimited`];
//!    nothing is hashed and the cache is not touched.
//! 2. **Validation.** Content type and size are checked against
//!    [`UploadLimits`].
//! 3. **Cache lookup.** The image is fingerprinted and the cache consulted.
//!    A hit is returned as stored, with no provider call.
//! 4. **Recognition.** On a miss, one recognition per fingerprint runs at a
//!    time. Concurrent callers for the same image wait on that one attempt
//!    and all see its outcome. A success is cached before anyone is
//!    answered; a failure or timeout is reported but never cached.
//!
//! Recognition runs as a detached task: a caller that goes away does not
//! cancel work other callers may be waiting on.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheStats, ResultCache};
use crate::fingerprint::Fingerprint;
use crate::governor::{Operation, RateGovernor};
use crate::providers::Recognizer;
use crate::singleflight::{Flight, SingleFlight};
use crate::telemetry;
use crate::text::clean_text;
use crate::types::{
    BatchItem, Extraction, HealthStatus, ImageMetadata, ImageUpload, NO_TEXT_MESSAGE, Recognition,
    UploadLimits,
};
use crate::{RecognitionError, Result, SkaldError};

/// Outcome of one recognition attempt, shared by every waiter.
type Attempt = std::result::Result<Arc<Recognition>, RecognitionError>;

/// Entry point for text extraction.
///
/// Owns the cache and governor for the lifetime of the service; share it
/// between request handlers behind an `Arc`.
pub struct Extractor {
    recognizer: Arc<dyn Recognizer>,
    cache: Arc<ResultCache>,
    governor: Arc<RateGovernor>,
    flights: Arc<SingleFlight<Fingerprint, Attempt>>,
    limits: UploadLimits,
    timeout: Duration,
}

impl Extractor {
    pub(crate) fn new(
        recognizer: Arc<dyn Recognizer>,
        cache: Arc<ResultCache>,
        governor: Arc<RateGovernor>,
        limits: UploadLimits,
        timeout: Duration,
    ) -> Self {
        Self {
            recognizer,
            cache,
            governor,
            flights: Arc::new(SingleFlight::new()),
            limits,
            timeout,
        }
    }

    /// Extract text from a single image on behalf of `client`.
    #[instrument(skip(self, image), fields(operation = "extract", size = image.data.len()))]
    pub async fn extract(&self, client: &str, image: ImageUpload) -> Result<Extraction> {
        self.governor.check(client, Operation::Extract)?;
        self.extract_admitted(image).await
    }

    /// Extract text from several images on behalf of `client`.
    ///
    /// The batch consumes one unit of the batch quota. Each image is then
    /// processed independently and concurrently; the returned items are in
    /// input order and a failed image does not affect the others.
    #[instrument(skip(self, images), fields(operation = "batch_extract", batch_size = images.len()))]
    pub async fn batch_extract(
        &self,
        client: &str,
        images: Vec<ImageUpload>,
    ) -> Result<Vec<BatchItem>> {
        self.governor.check(client, Operation::BatchExtract)?;

        if images.is_empty() {
            return Err(SkaldError::InvalidInput(
                "batch contains no images".to_string(),
            ));
        }
        if images.len() > self.limits.max_batch_size {
            return Err(SkaldError::InvalidInput(format!(
                "batch of {} images exceeds the limit of {}",
                images.len(),
                self.limits.max_batch_size
            )));
        }

        let items = images.into_iter().map(|image| async move {
            let filename = image.filename.clone();
            let outcome = self.extract_admitted(image).await;
            BatchItem { filename, outcome }
        });
        Ok(join_all(items).await)
    }

    /// Report liveness; consumes the client's health-check quota.
    pub fn health(&self, client: &str) -> Result<HealthStatus> {
        self.governor.check(client, Operation::Health)?;
        Ok(HealthStatus::ok())
    }

    /// Cache size and limits for monitoring.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop every cached result.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn governor(&self) -> &Arc<RateGovernor> {
        &self.governor
    }

    pub fn upload_limits(&self) -> &UploadLimits {
        &self.limits
    }

    /// Name of the configured recognizer.
    pub fn recognizer_name(&self) -> &str {
        self.recognizer.name()
    }

    /// Everything after the rate check.
    async fn extract_admitted(&self, image: ImageUpload) -> Result<Extraction> {
        let started = Instant::now();
        image.validate(&self.limits)?;

        let content_type = image.media_type();
        let ImageUpload { data, filename, .. } = image;
        let fingerprint = Fingerprint::of(&data);
        let metadata = ImageMetadata {
            filename,
            content_type,
            size_bytes: data.len(),
            fingerprint: fingerprint.to_hex(),
        };

        if let Some(hit) = self.cache.get(&fingerprint) {
            return Ok(to_extraction(&hit, true, metadata, started));
        }

        let work = recognize_and_store(
            Arc::clone(&self.recognizer),
            Arc::clone(&self.cache),
            fingerprint,
            data,
            self.timeout,
        );
        let flight = self
            .flights
            .run(fingerprint, || self.cache.peek(&fingerprint).map(Ok), work)
            .await;

        let (attempt, cached) = match flight {
            Flight::Leader(attempt) => (attempt, false),
            Flight::Follower(attempt) => {
                debug!(%fingerprint, "joined in-flight recognition");
                metrics::counter!(telemetry::INFLIGHT_JOINS_TOTAL).increment(1);
                (attempt, false)
            }
            Flight::Settled(attempt) => (Some(attempt), true),
        };

        let recognition = attempt.unwrap_or(Err(RecognitionError::Aborted))?;
        Ok(to_extraction(&recognition, cached, metadata, started))
    }
}

/// One bounded provider call; a success is cached before it is returned.
async fn recognize_and_store(
    recognizer: Arc<dyn Recognizer>,
    cache: Arc<ResultCache>,
    fingerprint: Fingerprint,
    data: Vec<u8>,
    timeout: Duration,
) -> Attempt {
    let provider = recognizer.name().to_owned();
    let start = Instant::now();
    let outcome = tokio::time::timeout(timeout, recognizer.recognize(&data)).await;
    let elapsed = start.elapsed();

    metrics::histogram!(telemetry::RECOGNITION_DURATION_SECONDS, "provider" => provider.clone())
        .record(elapsed.as_secs_f64());

    let (status, attempt) = match outcome {
        Ok(Ok(recognition)) => {
            let recognition = Arc::new(recognition);
            cache.put(fingerprint, Arc::clone(&recognition));
            info!(
                %fingerprint,
                provider = %provider,
                elapsed_ms = elapsed.as_millis() as u64,
                confidence = recognition.confidence,
                "recognition complete"
            );
            ("ok", Ok(recognition))
        }
        Ok(Err(e)) => {
            warn!(%fingerprint, provider = %provider, error = %e, "recognition failed");
            ("error", Err(RecognitionError::Provider(e.to_string())))
        }
        Err(_) => {
            warn!(
                %fingerprint,
                provider = %provider,
                timeout_ms = timeout.as_millis() as u64,
                "recognition timed out"
            );
            ("timeout", Err(RecognitionError::Timeout(timeout)))
        }
    };

    metrics::counter!(telemetry::RECOGNITIONS_TOTAL,
        "provider" => provider,
        "status" => status,
    )
    .increment(1);
    attempt
}

fn to_extraction(
    recognition: &Recognition,
    cached: bool,
    metadata: ImageMetadata,
    started: Instant,
) -> Extraction {
    let text = clean_text(&recognition.text);
    let processing_time_ms = started.elapsed().as_millis() as u64;

    if text.is_empty() {
        return Extraction {
            success: false,
            text: NO_TEXT_MESSAGE.to_string(),
            confidence: 0.0,
            processing_time_ms,
            cached,
            metadata,
        };
    }

    Extraction {
        success: true,
        text,
        confidence: recognition.confidence,
        processing_time_ms,
        cached,
        metadata,
    }
}
