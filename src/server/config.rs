//! Configuration loading for skaldd.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.skald/config.toml` (user)
//! 3. `/etc/skald/config.toml` (system)
//!
//! Without an explicit path and without either file, built-in defaults apply.
//!
//! Secrets are loaded separately with mandatory permission checks:
//! 1. `~/.skald/secrets.toml` (user, must be 0600)
//! 2. `/etc/skald/secrets.toml` (system, must be 0600)

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::{CacheConfig, DEFAULT_MAX_SIZE, DEFAULT_TTL};
use crate::governor::{RateLimit, RateLimitConfig};
use crate::types::{DEFAULT_MAX_BATCH_SIZE, DEFAULT_MAX_IMAGE_BYTES, UploadLimits};
use crate::{Result, SkaldError};

/// Environment variable consulted when no secrets file provides a key.
pub const GOOGLE_VISION_API_KEY_ENV: &str = "GOOGLE_VISION_API_KEY";

/// Server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub rate_limits: RateLimitsSection,
    #[serde(default)]
    pub recognizer: RecognizerSection,
}

/// Server network configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 0.0.0.0:6969).
    #[serde(default = "default_address")]
    pub address: String,
    /// Take the client key from the first `X-Forwarded-For` hop instead of
    /// the peer address. Only enable behind a proxy that sets the header.
    #[serde(default)]
    pub trust_forwarded_for: bool,
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            trust_forwarded_for: false,
            limits: LimitsConfig::default(),
        }
    }
}

fn default_address() -> String {
    "0.0.0.0:6969".to_string()
}

/// Upload limits.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Largest accepted image in bytes (default: 10 MiB).
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// Most images accepted in one batch (default: 10).
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
            max_batch_size: default_max_batch_size(),
        }
    }
}

fn default_max_upload_bytes() -> usize {
    DEFAULT_MAX_IMAGE_BYTES
}

fn default_max_batch_size() -> usize {
    DEFAULT_MAX_BATCH_SIZE
}

/// Result cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_cache_max_size")]
    pub max_size: usize,
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    /// Background purge interval; unset means expiry is lazy only.
    #[serde(default)]
    pub sweep_interval_secs: Option<u64>,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            max_size: default_cache_max_size(),
            ttl_secs: default_cache_ttl_secs(),
            sweep_interval_secs: None,
        }
    }
}

fn default_cache_max_size() -> usize {
    DEFAULT_MAX_SIZE
}

fn default_cache_ttl_secs() -> u64 {
    DEFAULT_TTL.as_secs()
}

/// Per-operation quotas.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitsSection {
    #[serde(default = "default_max_clients")]
    pub max_clients: u64,
    #[serde(default = "default_health_limit")]
    pub health: LimitSection,
    #[serde(default = "default_extract_limit")]
    pub extract: LimitSection,
    #[serde(default = "default_batch_limit")]
    pub batch_extract: LimitSection,
}

impl Default for RateLimitsSection {
    fn default() -> Self {
        Self {
            max_clients: default_max_clients(),
            health: default_health_limit(),
            extract: default_extract_limit(),
            batch_extract: default_batch_limit(),
        }
    }
}

/// One quota: `limit` requests per `window_secs`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LimitSection {
    pub limit: u32,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

fn default_max_clients() -> u64 {
    RateLimitConfig::default().max_clients
}

fn default_window_secs() -> u64 {
    60
}

fn default_health_limit() -> LimitSection {
    LimitSection {
        limit: 10,
        window_secs: default_window_secs(),
    }
}

fn default_extract_limit() -> LimitSection {
    LimitSection {
        limit: 5,
        window_secs: default_window_secs(),
    }
}

fn default_batch_limit() -> LimitSection {
    LimitSection {
        limit: 5,
        window_secs: default_window_secs(),
    }
}

/// Recognizer call settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RecognizerSection {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Override for the Vision API endpoint.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for RecognizerSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            base_url: None,
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided, must exist)
    /// 2. `~/.skald/config.toml`
    /// 3. `/etc/skald/config.toml`
    /// 4. Built-in defaults
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Config::default()),
        }
    }

    /// Read and parse one config file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            SkaldError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            SkaldError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(SkaldError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".skald").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        let system_config = PathBuf::from("/etc/skald/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    pub fn cache_config(&self) -> CacheConfig {
        let mut config = CacheConfig::new()
            .max_size(self.cache.max_size)
            .ttl(Duration::from_secs(self.cache.ttl_secs));
        if let Some(secs) = self.cache.sweep_interval_secs {
            config = config.sweep_interval(Duration::from_secs(secs));
        }
        config
    }

    pub fn rate_limit_config(&self) -> RateLimitConfig {
        let limits = &self.rate_limits;
        RateLimitConfig::new()
            .health(limits.health.into())
            .extract(limits.extract.into())
            .batch_extract(limits.batch_extract.into())
            .max_clients(limits.max_clients)
    }

    pub fn upload_limits(&self) -> UploadLimits {
        UploadLimits::new()
            .max_bytes(self.server.limits.max_upload_bytes)
            .max_batch_size(self.server.limits.max_batch_size)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.recognizer.timeout_secs)
    }
}

impl From<LimitSection> for RateLimit {
    fn from(section: LimitSection) -> Self {
        RateLimit::new(section.limit, Duration::from_secs(section.window_secs))
    }
}

/// Secrets configuration (API keys).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub google_vision: Option<ApiKeySecret>,
}

/// A single API key secret.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeySecret {
    pub api_key: String,
}

impl Secrets {
    /// Load secrets from the standard locations with permission checks.
    ///
    /// Returns empty secrets if no file exists (the key may come from the
    /// environment).
    pub fn load() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".skald").join("secrets.toml");
            if user_secrets.exists() {
                return Self::load_from_file(&user_secrets);
            }
        }

        let system_secrets = PathBuf::from("/etc/skald/secrets.toml");
        if system_secrets.exists() {
            return Self::load_from_file(&system_secrets);
        }

        Ok(Secrets::default())
    }

    /// Read one secrets file after checking its permissions.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        Self::check_permissions(path)?;
        let content = fs::read_to_string(path).map_err(|e| {
            SkaldError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            SkaldError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            SkaldError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        // Reject if group or other bits are set
        if mode & 0o077 != 0 {
            return Err(SkaldError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// Vision API key, falling back to `GOOGLE_VISION_API_KEY`.
    pub fn google_vision_key(&self) -> Option<String> {
        self.google_vision
            .as_ref()
            .map(|s| s.api_key.clone())
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(GOOGLE_VISION_API_KEY_ENV).ok())
            .filter(|k| !k.is_empty())
    }
}
