//! Renewal workflow engine.
//!
//! [`WorkflowEngine`] walks the portal through Renew, Create Invoice and Pay,
//! applying the restriction, challenge and payment guards at each step.
//! [`StatusAggregator`] owns the run record and emits the final summary.

pub mod aggregator;
pub mod artifacts;
pub mod engine;
pub mod errors;
pub mod pause;
pub mod types;

pub use aggregator::StatusAggregator;
pub use artifacts::ArtifactRecorder;
pub use engine::WorkflowEngine;
pub use errors::FlowError;
pub use pause::{NoPause, PauseHook};
pub use types::{EngineOptions, WorkflowState};
