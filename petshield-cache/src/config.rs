//! Cache configuration types.

use crate::error::{CacheError, CacheResult};
use std::time::Duration;

/// Result cache configuration.
#[derive(Debug, Clone)]
pub struct ResultCacheConfig {
    /// Maximum number of entries held at once
    pub max_size: usize,

    /// Entries older than this are treated as absent
    pub ttl: Duration,

    /// Period of the background expiry sweep
    pub cleanup_interval: Duration,

    /// Entries examined per lock acquisition during a sweep
    pub cleanup_batch_size: usize,

    /// Identifies this process on the invalidation bus
    pub instance_id: String,
}

impl ResultCacheConfig {
    /// Create a configuration with the default limits and a fresh instance id.
    ///
    /// # Examples
    ///
    /// ```
    /// use petshield_cache::ResultCacheConfig;
    /// use std::time::Duration;
    ///
    /// let config = ResultCacheConfig::new()
    ///     .with_max_size(500)
    ///     .with_ttl(Duration::from_secs(60));
    /// assert!(config.validate().is_ok());
    /// ```
    pub fn new() -> Self {
        Self {
            max_size: 1000,
            ttl: Duration::from_secs(300),
            cleanup_interval: Duration::from_secs(60),
            cleanup_batch_size: 256,
            instance_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Set the capacity.
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Set the entry time-to-live.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the sweep interval.
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Set the sweep batch size.
    pub fn with_cleanup_batch_size(mut self, batch_size: usize) -> Self {
        self.cleanup_batch_size = batch_size;
        self
    }

    /// Set the instance id.
    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = instance_id.into();
        self
    }

    /// Check limits. Invalid configuration is fatal at startup.
    pub fn validate(&self) -> CacheResult<()> {
        if self.max_size == 0 {
            return Err(CacheError::Config("max_size must be greater than zero".into()));
        }
        if self.ttl.is_zero() {
            return Err(CacheError::Config("ttl must be greater than zero".into()));
        }
        if self.cleanup_interval.is_zero() {
            return Err(CacheError::Config(
                "cleanup_interval must be greater than zero".into(),
            ));
        }
        if self.cleanup_batch_size == 0 {
            return Err(CacheError::Config(
                "cleanup_batch_size must be greater than zero".into(),
            ));
        }
        if self.instance_id.trim().is_empty() {
            return Err(CacheError::Config("instance_id must not be empty".into()));
        }
        Ok(())
    }
}

impl Default for ResultCacheConfig {
    fn default() -> Self {
        Self::new()
    }
}
