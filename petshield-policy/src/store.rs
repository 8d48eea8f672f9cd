//! Versioned policy store with atomic whole-document replacement.

use crate::content_type::ContentType;
use crate::document::{ContentPolicy, PolicyDocument};
use crate::validation::Validate;
use crate::Result;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Immutable view of the policy document at one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicySnapshot {
    /// Monotonically increasing document version
    pub version: u64,
    /// The document itself
    pub document: PolicyDocument,
}

impl PolicySnapshot {
    /// Resolve the policy for a content type.
    pub fn policy_for(&self, content_type: ContentType) -> &ContentPolicy {
        self.document.policy_for(content_type)
    }
}

/// Holds the current policy document.
///
/// Readers clone an `Arc` to a complete snapshot; [`PolicyStore::replace`]
/// builds a new snapshot and swaps the pointer under a short write lock, so a
/// reader never observes a partially applied update.
#[derive(Debug)]
pub struct PolicyStore {
    current: RwLock<Arc<PolicySnapshot>>,
}

impl PolicyStore {
    /// Create a store at version 1, validating the document first.
    pub fn new(document: PolicyDocument) -> Result<Self> {
        document.validate()?;
        Ok(Self {
            current: RwLock::new(Arc::new(PolicySnapshot {
                version: 1,
                document,
            })),
        })
    }

    /// Create a store holding the built-in document.
    pub fn builtin() -> Self {
        Self {
            current: RwLock::new(Arc::new(PolicySnapshot {
                version: 1,
                document: PolicyDocument::builtin(),
            })),
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<PolicySnapshot> {
        self.current.read().clone()
    }

    /// Current version.
    pub fn version(&self) -> u64 {
        self.current.read().version
    }

    /// Policy for a content type in the current snapshot.
    pub fn policy_for(&self, content_type: ContentType) -> ContentPolicy {
        self.current.read().policy_for(content_type).clone()
    }

    /// Slow-request threshold of the current snapshot.
    pub fn max_processing_time(&self) -> Duration {
        let ms = self
            .current
            .read()
            .document
            .performance_thresholds
            .max_processing_time_ms;
        Duration::from_millis(ms)
    }

    /// Replace the whole document, returning the new version.
    ///
    /// Invalid documents are rejected and leave the current snapshot in place.
    pub fn replace(&self, document: PolicyDocument) -> Result<u64> {
        document.validate()?;

        let mut current = self.current.write();
        let version = current.version + 1;
        *current = Arc::new(PolicySnapshot { version, document });
        drop(current);

        info!(version, "Policy document replaced");
        Ok(version)
    }
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PolicyError;

    #[test]
    fn test_new_store_starts_at_version_one() {
        let store = PolicyStore::new(PolicyDocument::builtin()).unwrap();
        assert_eq!(store.version(), 1);
    }

    #[test]
    fn test_replace_bumps_version() {
        let store = PolicyStore::builtin();
        let mut doc = PolicyDocument::builtin();
        doc.comments = None;

        assert_eq!(store.replace(doc.clone()).unwrap(), 2);
        assert_eq!(store.replace(doc).unwrap(), 3);
        assert_eq!(
            store.policy_for(ContentType::Comments),
            store.policy_for(ContentType::Default)
        );
    }

    #[test]
    fn test_invalid_replace_keeps_snapshot() {
        let store = PolicyStore::builtin();
        let before = store.snapshot();

        let mut doc = PolicyDocument::builtin();
        doc.performance_thresholds.max_processing_time_ms = 0;

        assert!(matches!(
            store.replace(doc),
            Err(PolicyError::ValidationError(_))
        ));
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_replace() {
        let store = PolicyStore::builtin();
        let old = store.snapshot();

        let mut doc = PolicyDocument::builtin();
        doc.default_policy.allowed_tags = vec!["p".to_string()];
        store.replace(doc).unwrap();

        assert_eq!(old.version, 1);
        assert_ne!(old.document.default_policy.allowed_tags, vec!["p".to_string()]);
        assert_eq!(store.snapshot().version, 2);
    }

    #[test]
    fn test_concurrent_readers_see_complete_snapshots() {
        let store = Arc::new(PolicyStore::builtin());
        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                for i in 0..50u64 {
                    let mut doc = PolicyDocument::builtin();
                    doc.performance_thresholds.max_processing_time_ms = i + 1;
                    store.replace(doc).unwrap();
                }
            })
        };

        for _ in 0..200 {
            let snap = store.snapshot();
            // Version n always carries threshold n - 1 (or the builtin at 1).
            if snap.version > 1 {
                assert_eq!(
                    snap.document.performance_thresholds.max_processing_time_ms,
                    snap.version - 1
                );
            }
        }

        writer.join().unwrap();
        assert_eq!(store.version(), 51);
    }
}
