//! Shared primitives for the renew-pilot workflow crates.
//!
//! Everything that crosses a crate boundary lives here: the step names of the
//! fixed Renew → Create Invoice → Pay sequence, the run record owned by the
//! workflow engine, monetary amounts, and operator notification events.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

pub mod amount;
pub mod event;
pub mod run;

pub use amount::{AmountSource, MonetaryAmount};
pub use event::{EventField, NotificationEvent, StatusLevel};
pub use run::{RunReason, RunStatus, StepOutcome, StepStatus, WorkflowRun};

/// Raised when a run is asked to leave a terminal state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RunStateError {
    #[error("run {run_id} already finished as {status}")]
    AlreadyFinished { run_id: String, status: RunStatus },

    #[error("a run cannot be finished as pending")]
    PendingIsNotTerminal,
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// First eight characters, used in log lines and notification footers.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(8);
        &self.0[..end]
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The three clickable steps of the renewal sequence.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum StepName {
    Renew,
    CreateInvoice,
    Pay,
}

impl StepName {
    /// Key used in configuration maps and reason codes.
    pub fn key(&self) -> &'static str {
        match self {
            StepName::Renew => "renew",
            StepName::CreateInvoice => "create_invoice",
            StepName::Pay => "pay",
        }
    }

    /// Human label for notifications.
    pub fn label(&self) -> &'static str {
        match self {
            StepName::Renew => "Renew",
            StepName::CreateInvoice => "Create invoice",
            StepName::Pay => "Pay",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "renew" => Some(StepName::Renew),
            "create_invoice" | "create-invoice" | "invoice" => Some(StepName::CreateInvoice),
            "pay" => Some(StepName::Pay),
            _ => None,
        }
    }

    /// Steps in execution order.
    pub fn sequence() -> [StepName; 3] {
        [StepName::Renew, StepName::CreateInvoice, StepName::Pay]
    }

    /// Step that follows this one, if any.
    pub fn next(&self) -> Option<StepName> {
        match self {
            StepName::Renew => Some(StepName::CreateInvoice),
            StepName::CreateInvoice => Some(StepName::Pay),
            StepName::Pay => None,
        }
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_keys_round_trip_through_from_key() {
        for step in StepName::sequence() {
            assert_eq!(StepName::from_key(step.key()), Some(step));
        }
        assert_eq!(StepName::from_key("Create-Invoice"), Some(StepName::CreateInvoice));
        assert_eq!(StepName::from_key("checkout"), None);
    }

    #[test]
    fn sequence_is_linked() {
        assert_eq!(StepName::Renew.next(), Some(StepName::CreateInvoice));
        assert_eq!(StepName::CreateInvoice.next(), Some(StepName::Pay));
        assert_eq!(StepName::Pay.next(), None);
    }

    #[test]
    fn run_id_short_form() {
        let id = RunId("0123456789abcdef".to_string());
        assert_eq!(id.short(), "01234567");
        assert_eq!(RunId("abc".to_string()).short(), "abc");
    }
}
