use cdp_adapter::PageError;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum ExtractError {
    #[error("invoice page could not be read: {0}")]
    Page(#[from] PageError),
}

impl ExtractError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ExtractError::Page(err) => err.is_retryable(),
        }
    }
}
