//! Rate limiter configuration and builder

use crate::ViolationRateLimiter;
use crate::error::{RateLimitError, RateLimitResult};
use petshield_audit::AuditStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Configuration for the violation rate limiter
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Violations within the window at which a user is refused
    pub max_violations: u64,
    /// Trailing window counted against the audit log
    pub window: Duration,
    /// Upper bound on the audit log query
    pub query_timeout: Duration,
    /// When false every check passes
    pub enabled: bool,
    /// Users that are never limited
    pub bypass_users: Vec<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_violations: 10,
            window: Duration::from_secs(60 * 60),
            query_timeout: Duration::from_secs(2),
            enabled: true,
            bypass_users: Vec::new(),
        }
    }
}

impl RateLimitConfig {
    /// Check if a user should bypass rate limiting
    pub fn should_bypass(&self, user_id: &str) -> bool {
        self.bypass_users.iter().any(|u| u == user_id)
    }

    /// Validate limits
    pub fn validate(&self) -> RateLimitResult<()> {
        if self.max_violations == 0 {
            return Err(RateLimitError::config("max_violations must be greater than 0"));
        }
        if self.window.is_zero() {
            return Err(RateLimitError::config("window must be greater than 0"));
        }
        if chrono::Duration::from_std(self.window).is_err() {
            return Err(RateLimitError::config("window is too large"));
        }
        if self.query_timeout.is_zero() {
            return Err(RateLimitError::config("query_timeout must be greater than 0"));
        }
        Ok(())
    }
}

/// Builder for creating a ViolationRateLimiter
pub struct RateLimiterBuilder {
    store: Option<Arc<dyn AuditStore>>,
    config: RateLimitConfig,
}

impl RateLimiterBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            store: None,
            config: RateLimitConfig::default(),
        }
    }

    /// Set the audit store violations are counted in
    pub fn store(mut self, store: Arc<dyn AuditStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: RateLimitConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_violations(mut self, max: u64) -> Self {
        self.config.max_violations = max;
        self
    }

    pub fn window(mut self, window: Duration) -> Self {
        self.config.window = window;
        self
    }

    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.config.query_timeout = timeout;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// Add a bypass user
    pub fn bypass_user(mut self, user_id: impl Into<String>) -> Self {
        self.config.bypass_users.push(user_id.into());
        self
    }

    /// Add multiple bypass users
    pub fn bypass_users(mut self, users: Vec<String>) -> Self {
        self.config.bypass_users.extend(users);
        self
    }

    /// Build the rate limiter
    pub fn build(self) -> RateLimitResult<ViolationRateLimiter> {
        let store = self
            .store
            .ok_or_else(|| RateLimitError::config("an audit store is required"))?;
        self.config.validate()?;

        debug!(
            max_violations = self.config.max_violations,
            window = ?self.config.window,
            enabled = self.config.enabled,
            "Building violation rate limiter"
        );

        Ok(ViolationRateLimiter::new(store, self.config))
    }
}

impl Default for RateLimiterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use petshield_audit::MemoryAuditStore;

    #[test]
    fn test_defaults() {
        let config = RateLimitConfig::default();
        assert_eq!(config.max_violations, 10);
        assert_eq!(config.window, Duration::from_secs(3600));
        assert!(config.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_should_bypass() {
        let config = RateLimitConfig {
            bypass_users: vec!["admin".to_string()],
            ..Default::default()
        };
        assert!(config.should_bypass("admin"));
        assert!(!config.should_bypass("bob"));
    }

    #[test]
    fn test_builder_requires_store() {
        let result = RateLimiterBuilder::new().build();
        assert!(matches!(result, Err(RateLimitError::ConfigError(_))));
    }

    #[test]
    fn test_builder_rejects_zero_limits() {
        let store = Arc::new(MemoryAuditStore::new());
        assert!(RateLimiterBuilder::new()
            .store(store.clone())
            .max_violations(0)
            .build()
            .is_err());
        assert!(RateLimiterBuilder::new()
            .store(store)
            .window(Duration::ZERO)
            .build()
            .is_err());
    }

    #[test]
    fn test_builder() {
        let limiter = RateLimiterBuilder::new()
            .store(Arc::new(MemoryAuditStore::new()))
            .max_violations(3)
            .window(Duration::from_secs(60))
            .bypass_user("admin")
            .build()
            .unwrap();

        assert_eq!(limiter.config().max_violations, 3);
        assert!(limiter.config().should_bypass("admin"));
    }
}
