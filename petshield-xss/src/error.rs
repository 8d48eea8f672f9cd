use thiserror::Error;

#[derive(Error, Debug)]
pub enum XssError {
    #[error("Enforcement failed: {0}")]
    EnforcementFailed(String),

    #[error("Invalid enforcement configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, XssError>;
