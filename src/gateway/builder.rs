//! Builder for configuring extractor instances

use std::sync::Arc;
use std::time::Duration;

use super::Extractor;
use crate::cache::{CacheConfig, ResultCache};
use crate::governor::{RateGovernor, RateLimitConfig};
use crate::providers::Recognizer;
use crate::types::UploadLimits;
use crate::{Result, SkaldError};

/// Default bound on a single recognizer call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Main entry point for creating extractor instances.
pub struct Skald;

impl Skald {
    /// Create a new builder for configuring the extractor.
    pub fn builder() -> SkaldBuilder {
        SkaldBuilder::new()
    }
}

/// Builder for configuring extractor instances.
pub struct SkaldBuilder {
    recognizer: Option<Arc<dyn Recognizer>>,
    #[cfg(feature = "google-vision")]
    google_vision_key: Option<String>,
    #[cfg(feature = "google-vision")]
    google_vision_url: Option<String>,
    cache: CacheConfig,
    rate_limits: RateLimitConfig,
    upload_limits: UploadLimits,
    timeout: Duration,
}

impl SkaldBuilder {
    pub fn new() -> Self {
        Self {
            recognizer: None,
            #[cfg(feature = "google-vision")]
            google_vision_key: None,
            #[cfg(feature = "google-vision")]
            google_vision_url: None,
            cache: CacheConfig::default(),
            rate_limits: RateLimitConfig::default(),
            upload_limits: UploadLimits::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Use a custom recognizer. Takes precedence over provider shortcuts.
    pub fn recognizer(mut self, recognizer: Arc<dyn Recognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    /// Configure the Google Cloud Vision provider.
    #[cfg(feature = "google-vision")]
    pub fn google_vision(mut self, api_key: impl Into<String>) -> Self {
        self.google_vision_key = Some(api_key.into());
        self
    }

    /// Override the Google Cloud Vision endpoint (proxies, testing).
    #[cfg(feature = "google-vision")]
    pub fn google_vision_url(mut self, url: impl Into<String>) -> Self {
        self.google_vision_url = Some(url.into());
        self
    }

    /// Configure the result cache.
    pub fn cache(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    /// Configure per-operation rate limits.
    pub fn rate_limits(mut self, config: RateLimitConfig) -> Self {
        self.rate_limits = config;
        self
    }

    /// Configure upload size limits.
    pub fn upload_limits(mut self, limits: UploadLimits) -> Self {
        self.upload_limits = limits;
        self
    }

    /// Bound every recognizer call (default: 30s). A call that exceeds it
    /// fails and is not cached.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn resolve_recognizer(&mut self) -> Option<Arc<dyn Recognizer>> {
        if let Some(recognizer) = self.recognizer.take() {
            return Some(recognizer);
        }

        #[cfg(feature = "google-vision")]
        if let Some(key) = self.google_vision_key.take() {
            let client = match self.google_vision_url.take() {
                Some(url) => crate::providers::GoogleVisionClient::with_base_url(key, url),
                None => crate::providers::GoogleVisionClient::new(key),
            };
            return Some(Arc::new(client));
        }

        None
    }

    /// Build the extractor.
    ///
    /// Fails with [`SkaldError::NoRecognizer`] when no provider was
    /// configured, and with [`SkaldError::Configuration`] for limits that
    /// could never admit work. When a sweep interval is configured this
    /// must run inside a tokio runtime.
    pub fn build(mut self) -> Result<Extractor> {
        let recognizer = self.resolve_recognizer().ok_or(SkaldError::NoRecognizer)?;

        if self.cache.max_size == 0 {
            return Err(SkaldError::Configuration(
                "cache max_size must be at least 1".to_string(),
            ));
        }
        if self.cache.ttl.is_zero() {
            return Err(SkaldError::Configuration(
                "cache ttl must be non-zero".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(SkaldError::Configuration(
                "recognizer timeout must be non-zero".to_string(),
            ));
        }
        if self.upload_limits.max_batch_size == 0 {
            return Err(SkaldError::Configuration(
                "max_batch_size must be at least 1".to_string(),
            ));
        }

        let cache = Arc::new(ResultCache::new(&self.cache));
        if let Some(every) = self.cache.sweep_interval.filter(|d| !d.is_zero()) {
            if tokio::runtime::Handle::try_current().is_err() {
                return Err(SkaldError::Configuration(
                    "cache sweeping requires a tokio runtime".to_string(),
                ));
            }
            cache.spawn_sweeper(every);
        }

        let governor = Arc::new(RateGovernor::new(self.rate_limits));

        Ok(Extractor::new(
            recognizer,
            cache,
            governor,
            self.upload_limits,
            self.timeout,
        ))
    }
}

impl Default for SkaldBuilder {
    fn default() -> Self {
        Self::new()
    }
}
