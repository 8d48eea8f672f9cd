// Error types for policy management

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Failed to load policy document: {0}")]
    LoadError(String),

    #[error("Failed to parse policy document: {0}")]
    ParseError(String),

    #[error("Invalid policy: {0}")]
    ValidationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PolicyError>;
