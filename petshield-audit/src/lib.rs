//! # Petshield Audit
//!
//! Audit trail for sanitization requests.
//!
//! Every request produces one `content.sanitized` event and one
//! `security.violation` event per detected violation, including on cache
//! hits. The rate limiter derives its per-user window from the violation
//! events, so the [`AuditStore`] is the single source of truth across
//! instances.
//!
//! ## Quick Start
//!
//! ```rust
//! use petshield_audit::*;
//! use chrono::{Duration, Utc};
//!
//! # tokio_test::block_on(async {
//! let store = MemoryAuditStore::new();
//! store
//!     .append(&AuditEvent::new(AuditEventType::SecurityViolation).user("bob"))
//!     .await
//!     .unwrap();
//!
//! let now = Utc::now();
//! let count = store
//!     .count_by_user_and_window("bob", now - Duration::hours(1), now)
//!     .await
//!     .unwrap();
//! assert_eq!(count, 1);
//! # });
//! ```

pub mod error;
pub mod event;
pub mod store;

pub use error::{AuditResult, AuditStoreError};
pub use event::{AuditEvent, AuditEventType, AuditSeverity};
pub use store::{AuditStore, FileAuditStore, MemoryAuditStore};
