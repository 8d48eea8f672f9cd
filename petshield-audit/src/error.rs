//! Audit store errors

use thiserror::Error;

/// Audit store errors
#[derive(Debug, Error)]
pub enum AuditStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Audit store unavailable: {0}")]
    Unavailable(String),
}

pub type AuditResult<T> = std::result::Result<T, AuditStoreError>;
