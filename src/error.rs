//! Error types for petshield

use petshield_cache::CacheError;
use petshield_policy::PolicyError;
use petshield_ratelimit::{RateLimitError, RateLimitStatus};
use thiserror::Error;

/// Result type for petshield operations
pub type ShieldResult<T> = Result<T, ShieldError>;

/// Errors surfaced to callers.
///
/// Everything except [`ShieldError::RateLimited`] is a startup or
/// administration error; runtime degradations are handled internally.
#[derive(Debug, Error)]
pub enum ShieldError {
    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Rate limit error: {0}")]
    RateLimit(#[from] RateLimitError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(
        "User {user_id} exceeded the violation limit ({} of {})",
        status.violation_count,
        status.limit
    )]
    RateLimited {
        user_id: String,
        status: RateLimitStatus,
    },
}

impl ShieldError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}
