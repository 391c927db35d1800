//! Per-client request rate governance.
//!
//! [`RateGovernor`] counts requests per `(client, operation)` in fixed
//! windows. Each [`Operation`] has its own quota, so exhausting the
//! extraction quota leaves the batch quota untouched.
//!
//! # Window semantics
//!
//! A window opens on the first request a client makes for an operation.
//! Once `window` has elapsed since it opened, the next request starts a
//! fresh window with a count of one. This is a plain reset-based counter:
//! a client can send up to twice its quota across a window boundary.
//!
//! # Retention
//!
//! Windows are held in a bounded `moka` cache (`max_clients` entries) with
//! a time-to-idle equal to the longest configured window. A window idle for
//! that long would be reset on its next use anyway, so dropping it is not
//! observable; under a churning client population memory stays bounded.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::telemetry;
use crate::{Result, SkaldError};

/// Default number of `(client, operation)` windows retained.
pub const DEFAULT_MAX_CLIENTS: u64 = 10_000;

/// A logical operation with its own quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Health,
    Extract,
    BatchExtract,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Health => "health",
            Operation::Extract => "extract",
            Operation::BatchExtract => "batch_extract",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quota for one operation: at most `limit` requests per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub limit: u32,
    pub window: Duration,
}

impl RateLimit {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }

    /// `limit` requests per minute.
    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }
}

/// Quotas for every operation plus retention bounds.
///
/// ```rust
/// # use skald::{RateLimit, RateLimitConfig};
/// let config = RateLimitConfig::new()
///     .extract(RateLimit::per_minute(20))
///     .max_clients(50_000);
/// assert_eq!(config.extract.limit, 20);
/// assert_eq!(config.health.limit, 10);
/// ```
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Default: 10 per minute.
    pub health: RateLimit,
    /// Default: 5 per minute.
    pub extract: RateLimit,
    /// Default: 5 per minute.
    pub batch_extract: RateLimit,
    /// Maximum number of `(client, operation)` windows retained. Default: 10,000.
    pub max_clients: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            health: RateLimit::per_minute(10),
            extract: RateLimit::per_minute(5),
            batch_extract: RateLimit::per_minute(5),
            max_clients: DEFAULT_MAX_CLIENTS,
        }
    }
}

impl RateLimitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn health(mut self, limit: RateLimit) -> Self {
        self.health = limit;
        self
    }

    pub fn extract(mut self, limit: RateLimit) -> Self {
        self.extract = limit;
        self
    }

    pub fn batch_extract(mut self, limit: RateLimit) -> Self {
        self.batch_extract = limit;
        self
    }

    pub fn max_clients(mut self, n: u64) -> Self {
        self.max_clients = n;
        self
    }

    /// Quota for `operation`.
    pub fn limit_for(&self, operation: Operation) -> RateLimit {
        match operation {
            Operation::Health => self.health,
            Operation::Extract => self.extract,
            Operation::BatchExtract => self.batch_extract,
        }
    }

    fn longest_window(&self) -> Duration {
        [self.health, self.extract, self.batch_extract]
            .iter()
            .map(|l| l.window)
            .max()
            .unwrap_or_default()
    }
}

#[derive(Debug)]
struct RateWindow {
    window_start: Instant,
    count: u32,
}

impl RateWindow {
    fn is_elapsed(&self, now: Instant, window: Duration) -> bool {
        now.duration_since(self.window_start) >= window
    }
}

type WindowKey = (String, Operation);

/// Fixed-window request counter keyed on client and operation.
pub struct RateGovernor {
    config: RateLimitConfig,
    windows: moka::sync::Cache<WindowKey, Arc<Mutex<RateWindow>>>,
}

impl RateGovernor {
    /// Create a governor with the given quotas.
    pub fn new(config: RateLimitConfig) -> Self {
        // LRU rather than TinyLFU admission: a new client's window must
        // always be retained, or its count would restart on every request.
        let mut builder = moka::sync::Cache::builder()
            .max_capacity(config.max_clients)
            .eviction_policy(moka::policy::EvictionPolicy::lru());
        let idle = config.longest_window();
        if !idle.is_zero() {
            builder = builder.time_to_idle(idle);
        }
        Self {
            windows: builder.build(),
            config,
        }
    }

    /// Configured quotas.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Admit one request if `client` is under quota for `operation`.
    ///
    /// Returns `true` and counts the request, or `false` without counting it.
    pub fn allow(&self, client: &str, operation: Operation) -> bool {
        self.admit(client, operation).is_ok()
    }

    /// Like [`allow`](Self::allow), but a rejection is a
    /// [`SkaldError::RateLimited`] carrying the time left in the window.
    pub fn check(&self, client: &str, operation: Operation) -> Result<()> {
        self.admit(client, operation)
            .map_err(|retry_after| SkaldError::RateLimited {
                operation,
                retry_after: Some(retry_after),
            })
    }

    /// Requests counted in the client's current window (0 if none is open).
    pub fn count(&self, client: &str, operation: Operation) -> u32 {
        let window = self.config.limit_for(operation).window;
        let Some(state) = self.windows.get(&(client.to_owned(), operation)) else {
            return 0;
        };
        let state = state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.is_elapsed(Instant::now(), window) {
            0
        } else {
            state.count
        }
    }

    /// Number of `(client, operation)` windows currently retained.
    ///
    /// Flushes moka's pending evictions first, so the figure reflects the
    /// `max_clients` bound and the idle timeout.
    pub fn tracked_windows(&self) -> u64 {
        self.windows.run_pending_tasks();
        self.windows.entry_count()
    }

    /// Forget every window.
    pub fn reset(&self) {
        self.windows.invalidate_all();
    }

    /// Increment-and-check under the window's lock. On rejection returns the
    /// time until the window resets.
    fn admit(&self, client: &str, operation: Operation) -> std::result::Result<(), Duration> {
        let RateLimit { limit, window } = self.config.limit_for(operation);
        let now = Instant::now();

        let state = self.windows.get_with((client.to_owned(), operation), || {
            Arc::new(Mutex::new(RateWindow {
                window_start: now,
                count: 0,
            }))
        });
        let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);

        if state.is_elapsed(now, window) {
            debug!(client, %operation, "rate window reset");
            state.window_start = now;
            state.count = 0;
        }

        if state.count < limit {
            state.count += 1;
            return Ok(());
        }

        let retry_after = (state.window_start + window).saturating_duration_since(now);
        drop(state);
        warn!(
            client,
            %operation,
            limit,
            retry_after_ms = retry_after.as_millis() as u64,
            "rate limit exceeded"
        );
        metrics::counter!(telemetry::RATE_LIMITED_TOTAL, "operation" => operation.as_str())
            .increment(1);
        Err(retry_after)
    }
}
