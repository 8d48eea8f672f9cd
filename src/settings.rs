//! Runtime settings.
//!
//! Settings come from, in increasing precedence: built-in defaults, an
//! optional TOML or JSON file, and `PETSHIELD_*` environment variables
//! (including ones loaded from a `.env` file).

use crate::error::{ShieldError, ShieldResult};
use petshield_cache::ResultCacheConfig;
use petshield_policy::FileFormat;
use petshield_ratelimit::RateLimitConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "PETSHIELD_";

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line human readable output
    Pretty,
    /// Single-line human readable output
    Compact,
    /// One JSON object per event
    #[default]
    Json,
}

impl LogFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Some(LogFormat::Pretty),
            "compact" => Some(LogFormat::Compact),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogSettings {
    /// Filter directive, e.g. `info` or `petshield_cache=debug`
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheSettings {
    pub max_size: usize,
    pub ttl_ms: u64,
    pub cleanup_interval_ms: u64,
    pub cleanup_batch_size: usize,
    /// Fixed instance id; a random one is generated when absent
    pub instance_id: Option<String>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_size: 1000,
            ttl_ms: 300_000,
            cleanup_interval_ms: 60_000,
            cleanup_batch_size: 256,
            instance_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RateLimitSettings {
    pub max_violations: u64,
    pub window_ms: u64,
    pub query_timeout_ms: u64,
    pub enabled: bool,
    pub bypass_users: Vec<String>,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_violations: 10,
            window_ms: 3_600_000,
            query_timeout_ms: 2_000,
            enabled: true,
            bypass_users: Vec::new(),
        }
    }
}

/// Top-level settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShieldSettings {
    pub cache: CacheSettings,
    pub rate_limit: RateLimitSettings,
    pub logging: LogSettings,
    /// Policy document; the built-in policies are used when absent
    pub policy_path: Option<PathBuf>,
}

impl ShieldSettings {
    /// Load settings: `.env`, then the optional file, then the process
    /// environment. The result is validated.
    pub fn load(path: Option<&Path>) -> ShieldResult<Self> {
        if let Ok(env_file) = dotenvy::dotenv() {
            debug!(path = %env_file.display(), "Loaded .env file");
        }

        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env(std::env::vars())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse a TOML or JSON file, chosen by extension.
    pub fn from_file(path: impl AsRef<Path>) -> ShieldResult<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ShieldError::config("No file extension found"))?;
        let format = FileFormat::from_extension(ext)
            .ok_or_else(|| ShieldError::config(format!("Unsupported format: {}", ext)))?;

        let content = std::fs::read_to_string(path).map_err(|e| {
            ShieldError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content, format)
    }

    pub fn parse(content: &str, format: FileFormat) -> ShieldResult<Self> {
        match format {
            FileFormat::Json => serde_json::from_str(content)
                .map_err(|e| ShieldError::config(format!("JSON parse error: {}", e))),
            FileFormat::Toml => toml::from_str(content)
                .map_err(|e| ShieldError::config(format!("TOML parse error: {}", e))),
        }
    }

    /// Apply `PETSHIELD_*` overrides from the given variables. Unrelated
    /// variables are ignored; unparseable values are an error.
    pub fn apply_env<I>(&mut self, vars: I) -> ShieldResult<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };

            match name {
                "CACHE_MAX_SIZE" => self.cache.max_size = parse_number(&key, &value)?,
                "CACHE_TTL_MS" => self.cache.ttl_ms = parse_number(&key, &value)?,
                "CACHE_CLEANUP_INTERVAL_MS" => {
                    self.cache.cleanup_interval_ms = parse_number(&key, &value)?
                }
                "CACHE_INSTANCE_ID" => self.cache.instance_id = Some(value),
                "RATE_LIMIT_MAX_VIOLATIONS" => {
                    self.rate_limit.max_violations = parse_number(&key, &value)?
                }
                "RATE_LIMIT_WINDOW_MS" => self.rate_limit.window_ms = parse_number(&key, &value)?,
                "RATE_LIMIT_ENABLED" => {
                    self.rate_limit.enabled = value
                        .trim()
                        .parse()
                        .map_err(|_| ShieldError::config(format!("{} must be true or false", key)))?
                }
                "LOG_LEVEL" => self.logging.level = value,
                "LOG_FORMAT" => {
                    self.logging.format = LogFormat::parse(&value).ok_or_else(|| {
                        ShieldError::config(format!("{} must be pretty, compact or json", key))
                    })?
                }
                "POLICY_PATH" => self.policy_path = Some(PathBuf::from(value)),
                _ => continue,
            }
            debug!(variable = %key, "Applied environment override");
        }
        Ok(())
    }

    /// Reject zero limits. Invalid settings are fatal at startup.
    pub fn validate(&self) -> ShieldResult<()> {
        let checks = [
            (self.cache.max_size == 0, "cache.maxSize"),
            (self.cache.ttl_ms == 0, "cache.ttlMs"),
            (self.cache.cleanup_interval_ms == 0, "cache.cleanupIntervalMs"),
            (self.cache.cleanup_batch_size == 0, "cache.cleanupBatchSize"),
            (self.rate_limit.max_violations == 0, "rateLimit.maxViolations"),
            (self.rate_limit.window_ms == 0, "rateLimit.windowMs"),
            (self.rate_limit.query_timeout_ms == 0, "rateLimit.queryTimeoutMs"),
        ];
        if let Some((_, field)) = checks.iter().find(|(zero, _)| *zero) {
            return Err(ShieldError::config(format!("{} must be greater than 0", field)));
        }
        Ok(())
    }

    pub fn cache_config(&self) -> ResultCacheConfig {
        let mut config = ResultCacheConfig::new()
            .with_max_size(self.cache.max_size)
            .with_ttl(Duration::from_millis(self.cache.ttl_ms))
            .with_cleanup_interval(Duration::from_millis(self.cache.cleanup_interval_ms))
            .with_cleanup_batch_size(self.cache.cleanup_batch_size);
        if let Some(id) = &self.cache.instance_id {
            config = config.with_instance_id(id.clone());
        }
        config
    }

    pub fn rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            max_violations: self.rate_limit.max_violations,
            window: Duration::from_millis(self.rate_limit.window_ms),
            query_timeout: Duration::from_millis(self.rate_limit.query_timeout_ms),
            enabled: self.rate_limit.enabled,
            bypass_users: self.rate_limit.bypass_users.clone(),
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> ShieldResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ShieldError::config(format!("{} must be a non-negative integer", key)))
}
