//! Cache key derivation.

use crate::error::CacheResult;
use petshield_policy::ContentType;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Request-independent options that take part in the cache key.
///
/// A `BTreeMap` so the serialized form is sorted by key.
pub type CacheOptions = BTreeMap<String, String>;

/// Hex-encoded SHA-256 digest.
pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(data.as_ref()))
}

/// Hash of the sorted options.
pub fn options_hash(options: &CacheOptions) -> CacheResult<String> {
    let canonical = serde_json::to_string(options)?;
    Ok(sha256_hex(canonical))
}

/// Deterministic key for a cached result.
///
/// Formats as `{contentType}:{sha256(content)}:{optionsHash}:v{version}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub content_type: ContentType,
    pub content_hash: String,
    pub options_hash: String,
    pub version: u64,
}

impl CacheKey {
    pub fn new(
        content_type: ContentType,
        content: &str,
        options_hash: impl Into<String>,
        version: u64,
    ) -> Self {
        Self {
            content_type,
            content_hash: sha256_hex(content),
            options_hash: options_hash.into(),
            version,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:v{}",
            self.content_type.policy_key(),
            self.content_hash,
            self.options_hash,
            self.version
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(pairs: &[(&str, &str)]) -> CacheOptions {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_options_hash_ignores_insertion_order() {
        let a = options(&[("contentType", "comments"), ("mode", "strict")]);
        let b = options(&[("mode", "strict"), ("contentType", "comments")]);
        assert_eq!(options_hash(&a).unwrap(), options_hash(&b).unwrap());
    }

    #[test]
    fn test_key_format() {
        let hash = options_hash(&CacheOptions::new()).unwrap();
        let key = CacheKey::new(ContentType::Comments, "", hash.clone(), 3);

        assert_eq!(
            key.to_string(),
            format!(
                "comments:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855:{}:v3",
                hash
            )
        );
    }

    #[test]
    fn test_version_changes_key() {
        let a = CacheKey::new(ContentType::Default, "x", "h", 1);
        let b = CacheKey::new(ContentType::Default, "x", "h", 2);
        assert_ne!(a.to_string(), b.to_string());
    }
}
