//! Bounded result cache for successful recognitions.
//!
//! [`ResultCache`] maps image [`Fingerprint`]s to the [`Recognition`] the
//! provider returned for them. Only successful recognitions are stored; a
//! failed or timed-out attempt never reaches the cache, so a transient
//! provider problem cannot poison an image for the TTL period.
//!
//! # Eviction
//!
//! Two independent limits apply:
//!
//! - **Capacity.** At most `max_size` entries are held. Inserting into a
//!   full cache evicts exactly one entry, the least recently used. Both
//!   `get` hits and `put` count as a use.
//! - **TTL.** Every entry expires `ttl` after it was (re-)inserted. Reads do
//!   not extend the lifetime. Expired entries are treated as absent and are
//!   purged lazily when an operation observes them.
//!
//! Lazy expiry alone can leave expired-but-unread entries resident until
//! capacity pressure evicts them. Capacity bounds the worst case; when
//! memory should be returned sooner, [`ResultCache::spawn_sweeper`] runs a
//! periodic purge.
//!
//! # Clock
//!
//! Timestamps are [`tokio::time::Instant`], so tests running on a paused
//! tokio runtime can drive expiry with `tokio::time::advance`.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use lru::LruCache;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::fingerprint::Fingerprint;
use crate::telemetry;
use crate::types::Recognition;

/// Default maximum number of cached results.
pub const DEFAULT_MAX_SIZE: usize = 1_000;

/// Default time-to-live for cached results (1 hour).
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Configuration for the result cache.
///
/// ```rust
/// # use skald::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_size(5_000)
///     .ttl(Duration::from_secs(600))
///     .sweep_interval(Duration::from_secs(60));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached entries. Default: 1,000.
    pub max_size: usize,
    /// Time-to-live for cached entries. Default: 1 hour.
    pub ttl: Duration,
    /// Period of the background expiry sweep. Default: none (lazy expiry only).
    pub sweep_interval: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            ttl: DEFAULT_TTL,
            sweep_interval: None,
        }
    }
}

impl CacheConfig {
    /// Create a new config with the default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of cached entries.
    pub fn max_size(mut self, n: usize) -> Self {
        self.max_size = n;
        self
    }

    /// Set the time-to-live for cached entries.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Enable a periodic background purge of expired entries.
    pub fn sweep_interval(mut self, every: Duration) -> Self {
        self.sweep_interval = Some(every);
        self
    }
}

/// Point-in-time view of the cache for monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Resident entries, including expired ones not yet observed.
    pub size: usize,
    pub max_size: usize,
    pub ttl_seconds: u64,
}

#[derive(Debug)]
struct CacheEntry {
    value: Arc<Recognition>,
    created_at: Instant,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// In-memory LRU + TTL store keyed on image fingerprint.
///
/// Every read-modify-write happens under one mutex; operations are short
/// and never call out to the provider.
pub struct ResultCache {
    entries: Mutex<LruCache<Fingerprint, CacheEntry>>,
    max_size: usize,
    ttl: Duration,
}

impl ResultCache {
    /// Create a cache with the given configuration.
    ///
    /// A `max_size` of zero is raised to one; the builder rejects it before
    /// it gets here.
    pub fn new(config: &CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            max_size: capacity.get(),
            ttl: config.ttl,
        }
    }

    fn entries(&self) -> MutexGuard<'_, LruCache<Fingerprint, CacheEntry>> {
        // Critical sections cannot leave the map half-updated, so a panic in
        // another holder does not invalidate it.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a cached result, marking it most recently used.
    ///
    /// Returns `None` when absent or expired; an expired entry is removed.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<Arc<Recognition>> {
        let now = Instant::now();
        let mut entries = self.entries();

        let Some(expired) = entries.peek(fingerprint).map(|entry| entry.is_expired(now)) else {
            drop(entries);
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
            return None;
        };

        if expired {
            entries.pop(fingerprint);
            drop(entries);
            debug!(%fingerprint, "cache entry expired");
            metrics::counter!(telemetry::CACHE_EXPIRATIONS_TOTAL).increment(1);
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
            return None;
        }

        let (value, created_at) = entries
            .get(fingerprint)
            .map(|entry| (Arc::clone(&entry.value), entry.created_at))?;
        drop(entries);
        debug!(
            %fingerprint,
            age_ms = now.duration_since(created_at).as_millis() as u64,
            "cache hit"
        );
        metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
        Some(value)
    }

    /// Look up a live result without touching recency or metrics.
    pub fn peek(&self, fingerprint: &Fingerprint) -> Option<Arc<Recognition>> {
        let now = Instant::now();
        self.entries()
            .peek(fingerprint)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| Arc::clone(&entry.value))
    }

    /// Insert or overwrite a result.
    ///
    /// Overwriting resets the entry's TTL and makes it most recently used.
    /// Inserting a new key into a full cache evicts exactly one entry.
    pub fn put(&self, fingerprint: Fingerprint, value: Arc<Recognition>) {
        let created_at = Instant::now();
        let entry = CacheEntry {
            value,
            created_at,
            expires_at: created_at + self.ttl,
        };

        let displaced = self.entries().push(fingerprint, entry);
        if let Some((evicted, _)) = displaced {
            if evicted != fingerprint {
                debug!(%evicted, "evicted least recently used cache entry");
                metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL).increment(1);
            }
        }
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of size and limits.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.len(),
            max_size: self.max_size,
            // Rounded up so a sub-second TTL never reports as zero.
            ttl_seconds: self.ttl.as_secs() + u64::from(self.ttl.subsec_nanos() > 0),
        }
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries().clear();
    }

    /// Remove every expired entry, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries();
        let expired: Vec<Fingerprint> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(fingerprint, _)| *fingerprint)
            .collect();
        for fingerprint in &expired {
            entries.pop(fingerprint);
        }
        drop(entries);

        if !expired.is_empty() {
            metrics::counter!(telemetry::CACHE_EXPIRATIONS_TOTAL).increment(expired.len() as u64);
        }
        expired.len()
    }

    /// Spawn a task that purges expired entries every `every`.
    ///
    /// The task holds only a weak reference and exits once the cache is
    /// dropped. Must be called from within a tokio runtime.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let cache = Arc::downgrade(self);
        let every = every.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                let purged = cache.purge_expired();
                if purged > 0 {
                    debug!(purged, "swept expired cache entries");
                }
            }
        })
    }
}
