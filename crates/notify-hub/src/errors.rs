use std::path::PathBuf;

use thiserror::Error;

/// Delivery failures. Callers log these; they never abort a run.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook rejected the message with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("attachment {path:?} could not be read: {reason}")]
    Attachment { path: PathBuf, reason: String },
}

impl NotifyError {
    pub fn is_retryable(&self) -> bool {
        match self {
            NotifyError::Http(err) => err.is_timeout() || err.is_connect(),
            NotifyError::Status { status, .. } => *status == 429 || *status >= 500,
            NotifyError::Attachment { .. } => false,
        }
    }
}
