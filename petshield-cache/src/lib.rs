//! # Petshield Cache
//!
//! Bounded cache of sanitization results.
//!
//! - **Keyed** by content type, content hash, options hash and a
//!   configuration version, so bumping the version invalidates everything
//!   without touching entries
//! - **Bounded** by `max_size` with least-recently-accessed eviction
//! - **Expiring** lazily on read and through a periodic background sweep
//! - **Shared** across processes through an [`InvalidationBus`]:
//!   [`LocalBus`] in-process, `RedisBus` with the `redis` feature
//!
//! ## Quick Start
//!
//! ```rust
//! use petshield_cache::{CacheOptions, ResultCache, ResultCacheConfig};
//! use petshield_policy::ContentType;
//! use petshield_xss::SanitizedResult;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let cache = ResultCache::new(ResultCacheConfig::new().with_max_size(100)).unwrap();
//! let options = CacheOptions::new();
//! let result = SanitizedResult::new("Rex", "Rex", vec![], vec![], Duration::ZERO);
//!
//! cache.set("Rex", &options, ContentType::PetCardMetadata, result);
//! assert!(cache.get("Rex", &options, ContentType::PetCardMetadata).is_some());
//!
//! cache.bump_version().await;
//! assert!(cache.get("Rex", &options, ContentType::PetCardMetadata).is_none());
//! # }
//! ```

pub mod bus;
pub mod config;
pub mod error;
pub mod key;
pub mod result_cache;
pub mod stats;

#[cfg(feature = "redis")]
pub use bus::RedisBus;
pub use bus::{InvalidationAction, InvalidationBus, InvalidationEvent, InvalidationParams, LocalBus};
pub use config::ResultCacheConfig;
pub use error::{CacheError, CacheResult};
pub use key::{CacheKey, CacheOptions, options_hash, sha256_hex};
pub use result_cache::{CacheEntry, ResultCache};
pub use stats::CacheStats;
