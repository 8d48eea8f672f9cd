// Petshield - cached, audited markup sanitization for pet card content
//
// This library sanitizes user supplied markup under per content type
// policies, records what was removed and why, caches results across
// requests and refuses users who keep submitting malicious content.

//! # Quick Start
//!
//! ```rust
//! use petshield::prelude::*;
//!
//! # tokio_test::block_on(async {
//! let coordinator = SanitizationCoordinator::builder().build().unwrap();
//!
//! let options = SanitizeOptions::new(ContentType::PetCardMetadata).user("alice");
//! let result = coordinator
//!     .sanitize("Fluffy<script>alert(1)</script>", &options)
//!     .await
//!     .unwrap();
//!
//! assert_eq!(result.sanitized_content, "Fluffy");
//! assert!(!result.is_valid);
//! # });
//! ```

pub mod coordinator;
pub mod error;
pub mod logging;
pub mod settings;

pub use coordinator::{CoordinatorBuilder, SanitizationCoordinator, SanitizeOptions};
pub use error::{ShieldError, ShieldResult};
pub use settings::{CacheSettings, LogFormat, LogSettings, RateLimitSettings, ShieldSettings};

// Re-export member crates
pub use petshield_audit;
pub use petshield_cache;
pub use petshield_policy;
pub use petshield_ratelimit;
pub use petshield_xss;

pub use petshield_policy::{ContentType, PolicyDocument};
pub use petshield_xss::{SanitizedResult, SecurityViolation, Severity, ViolationType};

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        ContentType, PolicyDocument, SanitizationCoordinator, SanitizeOptions, SanitizedResult,
        SecurityViolation, Severity, ShieldError, ShieldResult, ShieldSettings, ViolationType,
    };
    pub use petshield_audit::{AuditEvent, AuditEventType, AuditStore, FileAuditStore, MemoryAuditStore};
    pub use petshield_cache::{InvalidationBus, LocalBus, ResultCache, ResultCacheConfig};
    pub use petshield_ratelimit::{RateLimitConfig, RateLimitStatus, ViolationRateLimiter};
    pub use petshield_xss::{AmmoniaEnforcer, Enforcer};

    #[cfg(feature = "redis")]
    pub use petshield_cache::RedisBus;
}
