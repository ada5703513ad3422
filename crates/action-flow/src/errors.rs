//! Flow execution error types

use thiserror::Error;

/// Errors raised inside the flow. None of them escapes
/// [`crate::WorkflowEngine::run`]; they are logged or folded into the run outcome.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Screenshot could not be written
    #[error("artifact '{label}' could not be saved: {reason}")]
    Artifact { label: String, reason: String },
}
