//! Error types for step guards

use cdp_adapter::PageError;
use thiserror::Error;

/// Gate error enumeration
#[derive(Debug, Error, Clone)]
pub enum GateError {
    /// The page could not be read, so the guard could not be verified
    #[error("guard could not read the page: {0}")]
    Page(#[from] PageError),

    /// A restriction phrase supplied at runtime is unusable
    #[error("invalid restriction phrase: {0}")]
    InvalidPhrase(String),
}

impl GateError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            GateError::Page(err) => err.is_retryable(),
            GateError::InvalidPhrase(_) => false,
        }
    }

    /// Get error severity (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            GateError::Page(err) => err.severity().max(1),
            GateError::InvalidPhrase(_) => 2,
        }
    }
}
