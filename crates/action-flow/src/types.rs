//! Workflow states and engine options

use std::fmt;
use std::time::Duration;

use renew_core_types::RunReason;

/// States of one renewal run.
///
/// `Challenged`, `Completed` and `Aborted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Idle,
    Challenged,
    AwaitingRenew,
    AwaitingInvoice,
    AwaitingPay,
    Completed(RunReason),
    Aborted(RunReason),
}

impl WorkflowState {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowState::Idle => "idle",
            WorkflowState::Challenged => "challenged",
            WorkflowState::AwaitingRenew => "awaiting_renew",
            WorkflowState::AwaitingInvoice => "awaiting_invoice",
            WorkflowState::AwaitingPay => "awaiting_pay",
            WorkflowState::Completed(_) => "completed",
            WorkflowState::Aborted(_) => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal_reason().is_some()
    }

    /// Reason recorded on the run when this state ends it.
    pub fn terminal_reason(&self) -> Option<RunReason> {
        match self {
            WorkflowState::Challenged => Some(RunReason::ChallengeDetected),
            WorkflowState::Completed(reason) | WorkflowState::Aborted(reason) => Some(*reason),
            _ => None,
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.terminal_reason() {
            Some(reason) if !matches!(self, WorkflowState::Challenged) => {
                write!(f, "{}({})", self.name(), reason.code())
            }
            _ => f.write_str(self.name()),
        }
    }
}

/// Knobs for one engine.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Continue past restriction messages, reporting them as warnings.
    pub bypass_restriction: bool,
    /// Operator allows paying a positive amount.
    pub confirm_payment: bool,
    pub navigation_timeout: Duration,
    /// Upper bound for the post-navigation network-idle wait.
    pub navigation_idle_cap: Duration,
    pub navigation_fallback: Duration,
    /// Network-idle wait after a click.
    pub settle_timeout: Duration,
    /// Fixed delay used when the page never goes idle.
    pub fallback_delay: Duration,
    /// Characters of page content kept after a click.
    pub snippet_len: usize,
    /// Characters of that snippet written to the log.
    pub log_snippet_len: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            bypass_restriction: false,
            confirm_payment: false,
            navigation_timeout: Duration::from_millis(60_000),
            navigation_idle_cap: Duration::from_millis(60_000),
            navigation_fallback: Duration::from_millis(2_000),
            settle_timeout: Duration::from_millis(8_000),
            fallback_delay: Duration::from_millis(1_200),
            snippet_len: 1_200,
            log_snippet_len: 800,
        }
    }
}

impl EngineOptions {
    /// Idle wait after navigation: the navigation timeout, capped.
    pub fn navigation_idle_timeout(&self) -> Duration {
        self.navigation_timeout.min(self.navigation_idle_cap)
    }
}
