//! Error types for the selector cascade

use cdp_adapter::PageError;
use renew_core_types::StepName;
use thiserror::Error;

use crate::types::NotFoundDiagnostic;

/// Locator error enumeration
#[derive(Debug, Error, Clone)]
pub enum LocatorError {
    /// No strategy produced an actionable element
    #[error("no actionable '{step}' element: {diagnostic}")]
    ElementNotFound {
        step: StepName,
        diagnostic: NotFoundDiagnostic,
    },

    /// Configured override could not be parsed
    #[error("invalid selector override for '{step}': {reason}")]
    InvalidOverride { step: String, reason: String },

    /// Page communication error
    #[error("page error: {0}")]
    Page(#[from] PageError),
}

impl LocatorError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            LocatorError::Page(err) => err.is_retryable(),
            _ => false,
        }
    }

    /// Get error severity (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            LocatorError::Page(err) => err.severity(),
            LocatorError::InvalidOverride { .. } => 2,
            LocatorError::ElementNotFound { .. } => 1,
        }
    }

    /// Diagnostic attached to a not-found error.
    pub fn diagnostic(&self) -> Option<&NotFoundDiagnostic> {
        match self {
            LocatorError::ElementNotFound { diagnostic, .. } => Some(diagnostic),
            _ => None,
        }
    }
}
