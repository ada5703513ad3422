use thiserror::Error;

/// Errors surfaced by a page controller.
#[derive(Debug, Error, Clone)]
pub enum PageError {
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("element {0} is no longer attached to the page")]
    ElementDetached(String),

    #[error("script evaluation failed: {0}")]
    Script(String),

    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("cdp i/o failure: {0}")]
    Cdp(String),

    #[error("artifact write failed: {0}")]
    Io(String),
}

impl PageError {
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        PageError::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, PageError::Timeout { .. } | PageError::Cdp(_))
    }

    /// Get error severity (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            PageError::Launch(_) => 3,
            PageError::Cdp(_) | PageError::Navigation(_) => 2,
            PageError::Timeout { .. } | PageError::ElementDetached(_) | PageError::Script(_) => 1,
            _ => 0,
        }
    }
}

impl From<chromiumoxide::error::CdpError> for PageError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        PageError::Cdp(err.to_string())
    }
}
