//! Telemetry metric name constants.
//!
//! Centralised metric names for skald operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `skald_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `provider` — recognizer name (e.g. "google_vision")
//! - `operation` — governed operation ("health", "extract", "batch_extract")
//! - `status` — outcome: "ok", "error" or "timeout"

/// Total result cache hits.
pub const CACHE_HITS_TOTAL: &str = "skald_cache_hits_total";

/// Total result cache misses (absent or expired).
pub const CACHE_MISSES_TOTAL: &str = "skald_cache_misses_total";

/// Total entries evicted to make room under capacity pressure.
pub const CACHE_EVICTIONS_TOTAL: &str = "skald_cache_evictions_total";

/// Total entries dropped because their TTL had passed.
pub const CACHE_EXPIRATIONS_TOTAL: &str = "skald_cache_expirations_total";

/// Total requests rejected by the rate governor.
///
/// Labels: `operation`.
pub const RATE_LIMITED_TOTAL: &str = "skald_rate_limited_total";

/// Total recognition attempts sent to a provider.
///
/// Labels: `provider`, `status` ("ok" | "error" | "timeout").
pub const RECOGNITIONS_TOTAL: &str = "skald_recognitions_total";

/// Recognition call duration in seconds.
///
/// Labels: `provider`.
pub const RECOGNITION_DURATION_SECONDS: &str = "skald_recognition_duration_seconds";

/// Total callers that attached to an already in-flight recognition.
pub const INFLIGHT_JOINS_TOTAL: &str = "skald_inflight_joins_total";
