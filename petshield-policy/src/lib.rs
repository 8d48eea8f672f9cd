//! Versioned sanitization policies for petshield.
//!
//! A policy document maps each reserved content type (`defaultPolicy`,
//! `userProfiles`, `petCardMetadata`, `comments`, `socialSharing`) to an
//! allow-list of tags, attributes and URL schemes, plus global performance
//! thresholds. The [`PolicyStore`] holds the current document as an immutable
//! snapshot and replaces it atomically.
//!
//! # Example
//!
//! ```
//! use petshield_policy::*;
//!
//! let store = PolicyStore::builtin();
//! let pet = store.policy_for(ContentType::PetCardMetadata);
//! assert!(pet.allows_tag("b"));
//!
//! let doc = PolicyLoader::new(FileFormat::Json)
//!     .parse(r#"{"comments": {"allowedTags": ["p"]}}"#)
//!     .unwrap();
//! assert_eq!(store.replace(doc).unwrap(), 2);
//! ```

pub mod content_type;
pub mod document;
pub mod error;
pub mod loader;
pub mod store;
pub mod validation;

pub use content_type::ContentType;
pub use document::{ContentPolicy, PerformanceThresholds, PolicyDocument};
pub use error::{PolicyError, Result};
pub use loader::{FileFormat, PolicyLoader};
pub use store::{PolicySnapshot, PolicyStore};
pub use validation::{DISCARDED_CONTENT_TAGS, PolicyValidator, Validate};
