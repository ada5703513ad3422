//! Run record for one execution of the renewal sequence.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::{MonetaryAmount, RunId, RunStateError, StepName};

/// Overall status of a run. Moves from `Pending` to a terminal value exactly once.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum RunStatus {
    Pending,
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Pending)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a run reached its terminal state.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum RunReason {
    /// Bot-verification interstitial in front of the portal.
    ChallengeDetected,
    /// No actionable element for the step after the full cascade.
    ElementNotFound(StepName),
    /// Restriction message rendered before the renew click.
    RenewalRestrictedBeforeClick,
    /// Restriction message rendered after the renew click.
    RenewalRestrictedAfterClick,
    /// Invoice amount could not be located.
    AmountUnknown,
    /// Non-zero invoice without payment confirmation.
    PaymentRequired,
    /// Browser interaction failed and the next step could not be evaluated.
    InteractionError(StepName),
    /// Invoice total was zero; pay step skipped.
    FreeInvoice,
    /// Pay click went through.
    Paid,
}

impl RunReason {
    /// Stable machine code, e.g. `element_not_found:renew`.
    pub fn code(&self) -> String {
        match self {
            RunReason::ChallengeDetected => "challenge_detected".to_string(),
            RunReason::ElementNotFound(step) => format!("element_not_found:{}", step.key()),
            RunReason::RenewalRestrictedBeforeClick => "renewal_restricted_before_click".to_string(),
            RunReason::RenewalRestrictedAfterClick => "renewal_restricted_after_click".to_string(),
            RunReason::AmountUnknown => "amount_unknown".to_string(),
            RunReason::PaymentRequired => "payment_required".to_string(),
            RunReason::InteractionError(step) => format!("interaction_error:{}", step.key()),
            RunReason::FreeInvoice => "free_invoice".to_string(),
            RunReason::Paid => "paid".to_string(),
        }
    }

    /// Terminal status this reason implies.
    pub fn status(&self) -> RunStatus {
        match self {
            RunReason::FreeInvoice | RunReason::Paid => RunStatus::Success,
            _ => RunStatus::Failed,
        }
    }
}

impl fmt::Display for RunReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

#[cfg(feature = "serde-full")]
impl serde::Serialize for RunReason {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.code())
    }
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StepStatus {
    Passed,
    Failed,
    /// A guard matched but an explicit override let the run continue.
    Bypassed,
    Skipped,
}

/// One entry of `WorkflowRun::steps_completed`.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize))]
#[derive(Clone, Debug)]
pub struct StepOutcome {
    /// Checkpoint label, e.g. `renew` or `restriction_check_after`.
    pub label: String,
    pub step: Option<StepName>,
    pub status: StepStatus,
    pub detail: Option<String>,
    pub url: Option<String>,
    pub artifact: Option<PathBuf>,
    pub at: DateTime<Utc>,
}

impl StepOutcome {
    fn new(label: impl Into<String>, status: StepStatus) -> Self {
        Self {
            label: label.into(),
            step: None,
            status,
            detail: None,
            url: None,
            artifact: None,
            at: Utc::now(),
        }
    }

    pub fn passed(label: impl Into<String>) -> Self {
        Self::new(label, StepStatus::Passed)
    }

    pub fn failed(label: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(label, StepStatus::Failed).with_detail(detail)
    }

    pub fn bypassed(label: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(label, StepStatus::Bypassed).with_detail(detail)
    }

    pub fn skipped(label: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(label, StepStatus::Skipped).with_detail(detail)
    }

    pub fn with_step(mut self, step: StepName) -> Self {
        self.step = Some(step);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_artifact(mut self, artifact: Option<PathBuf>) -> Self {
        self.artifact = artifact;
        self
    }
}

/// Outcome record of a single run.
///
/// `status` and `reason` are only reachable through [`WorkflowRun::finish`],
/// which refuses a second terminal transition.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize))]
#[derive(Clone, Debug)]
pub struct WorkflowRun {
    pub run_id: RunId,
    status: RunStatus,
    reason: Option<RunReason>,
    pub amount: Option<MonetaryAmount>,
    pub url: String,
    pub steps_completed: Vec<StepOutcome>,
    pub started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl WorkflowRun {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            run_id: RunId::new(),
            status: RunStatus::Pending,
            reason: None,
            amount: None,
            url: url.into(),
            steps_completed: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn reason(&self) -> Option<RunReason> {
        self.reason
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn record(&mut self, outcome: StepOutcome) {
        self.steps_completed.push(outcome);
    }

    /// Move the run into its terminal state; the status follows from `reason`.
    pub fn finish(&mut self, reason: RunReason) -> Result<RunStatus, RunStateError> {
        let status = reason.status();
        if status == RunStatus::Pending {
            return Err(RunStateError::PendingIsNotTerminal);
        }
        if self.is_terminal() {
            return Err(RunStateError::AlreadyFinished {
                run_id: self.run_id.to_string(),
                status: self.status,
            });
        }
        self.status = status;
        self.reason = Some(reason);
        self.finished_at = Some(Utc::now());
        Ok(status)
    }

    /// Labels of the recorded checkpoints, in order.
    pub fn step_labels(&self) -> Vec<&str> {
        self.steps_completed
            .iter()
            .map(|outcome| outcome.label.as_str())
            .collect()
    }

    pub fn elapsed_ms(&self) -> i64 {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_is_monotonic() {
        let mut run = WorkflowRun::new("https://portal.example/service/1/manage");
        assert_eq!(run.status(), RunStatus::Pending);

        assert_eq!(run.finish(RunReason::PaymentRequired), Ok(RunStatus::Failed));
        assert_eq!(run.reason(), Some(RunReason::PaymentRequired));
        assert!(run.finished_at().is_some());

        let second = run.finish(RunReason::Paid);
        assert!(matches!(second, Err(RunStateError::AlreadyFinished { .. })));
        assert_eq!(run.status(), RunStatus::Failed);
        assert_eq!(run.reason(), Some(RunReason::PaymentRequired));
    }

    #[test]
    fn reason_codes() {
        assert_eq!(
            RunReason::ElementNotFound(StepName::Pay).code(),
            "element_not_found:pay"
        );
        assert!(RunReason::RenewalRestrictedBeforeClick
            .code()
            .starts_with("renewal_restricted_before"));
        assert_eq!(RunReason::FreeInvoice.status(), RunStatus::Success);
        assert_eq!(RunReason::AmountUnknown.status(), RunStatus::Failed);
    }

    #[test]
    fn records_steps_in_order() {
        let mut run = WorkflowRun::new("https://portal.example");
        run.record(StepOutcome::passed("challenge_check"));
        run.record(StepOutcome::passed("renew").with_step(StepName::Renew));
        assert_eq!(run.step_labels(), vec!["challenge_check", "renew"]);
    }
}
