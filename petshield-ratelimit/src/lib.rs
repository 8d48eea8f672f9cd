//! # Petshield Rate Limiting
//!
//! Per-user abuse limiting derived from the audit log.
//!
//! No counters are kept in memory. Each check counts the user's
//! `security.violation` events in the trailing window, so every instance
//! sharing an audit store sees the same total.
//!
//! The limiter **fails open**: if the count query fails or exceeds its
//! timeout, the user is allowed and a warning is logged.
//!
//! ## Quick Start
//!
//! ```rust
//! use petshield_audit::MemoryAuditStore;
//! use petshield_ratelimit::ViolationRateLimiter;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let limiter = ViolationRateLimiter::builder()
//!     .store(Arc::new(MemoryAuditStore::new()))
//!     .max_violations(10)
//!     .window(Duration::from_secs(3600))
//!     .build()
//!     .unwrap();
//!
//! let status = limiter.check("user-123").await;
//! assert!(!status.is_exceeded);
//! assert_eq!(status.remaining(), 10);
//! # });
//! ```

pub mod config;
pub mod error;

pub use config::{RateLimitConfig, RateLimiterBuilder};
pub use error::{RateLimitError, RateLimitResult};

use chrono::{DateTime, Utc};
use petshield_audit::AuditStore;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Outcome of a rate limit check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatus {
    /// Violations counted in the window
    pub violation_count: u64,
    /// Whether new requests from the user are refused
    pub is_exceeded: bool,
    /// End of the window that started now
    pub reset_time: DateTime<Utc>,
    /// Configured maximum
    pub limit: u64,
    /// The count could not be read and the user was allowed anyway
    pub fail_open: bool,
}

impl RateLimitStatus {
    fn counted(violation_count: u64, limit: u64, reset_time: DateTime<Utc>) -> Self {
        Self {
            violation_count,
            is_exceeded: violation_count >= limit,
            reset_time,
            limit,
            fail_open: false,
        }
    }

    fn allowed(limit: u64, reset_time: DateTime<Utc>, fail_open: bool) -> Self {
        Self {
            violation_count: 0,
            is_exceeded: false,
            reset_time,
            limit,
            fail_open,
        }
    }

    /// Violations left before the user is refused
    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.violation_count)
    }
}

/// Rate limiter counting violations in an [`AuditStore`]
pub struct ViolationRateLimiter {
    store: Arc<dyn AuditStore>,
    config: RateLimitConfig,
}

impl ViolationRateLimiter {
    /// Create a limiter. Prefer [`ViolationRateLimiter::builder`], which
    /// validates the configuration.
    pub fn new(store: Arc<dyn AuditStore>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    /// Create a new builder
    pub fn builder() -> RateLimiterBuilder {
        RateLimiterBuilder::new()
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Check a user against the limit. Never fails.
    pub async fn check(&self, user_id: &str) -> RateLimitStatus {
        let now = Utc::now();
        let window = chrono::Duration::from_std(self.config.window)
            .unwrap_or_else(|_| chrono::Duration::hours(1));
        let reset_time = now
            .checked_add_signed(window)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let limit = self.config.max_violations;

        if !self.config.enabled || self.config.should_bypass(user_id) {
            trace!(user_id = %user_id, "Rate limit bypassed");
            return RateLimitStatus::allowed(limit, reset_time, false);
        }

        let start = now
            .checked_sub_signed(window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let query = self.store.count_by_user_and_window(user_id, start, now);

        match tokio::time::timeout(self.config.query_timeout, query).await {
            Ok(Ok(count)) => {
                let status = RateLimitStatus::counted(count, limit, reset_time);
                if status.is_exceeded {
                    warn!(
                        user_id = %user_id,
                        violations = count,
                        limit = limit,
                        "Violation rate limit exceeded"
                    );
                } else {
                    debug!(
                        user_id = %user_id,
                        violations = count,
                        remaining = status.remaining(),
                        "Violation rate limit checked"
                    );
                }
                status
            }
            Ok(Err(e)) => {
                warn!(
                    user_id = %user_id,
                    error = %e,
                    "Violation count query failed, failing open"
                );
                RateLimitStatus::allowed(limit, reset_time, true)
            }
            Err(_) => {
                warn!(
                    user_id = %user_id,
                    timeout = ?self.config.query_timeout,
                    "Violation count query timed out, failing open"
                );
                RateLimitStatus::allowed(limit, reset_time, true)
            }
        }
    }
}
