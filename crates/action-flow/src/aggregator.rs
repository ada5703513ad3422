//! Run outcome accumulation and the terminal summary.

use std::path::PathBuf;
use std::sync::Arc;

use notify_hub::{Notification, NotifierHub};
use renew_core_types::{
    MonetaryAmount, NotificationEvent, RunReason, RunStatus, StatusLevel, StepOutcome, StepStatus,
    WorkflowRun,
};
use tracing::{error, info, warn};

/// Owns the in-flight [`WorkflowRun`] and talks to the notifier hub.
///
/// Intermediate events go out as they happen; [`StatusAggregator::finalize`]
/// closes the run and emits exactly one summary.
pub struct StatusAggregator {
    run: WorkflowRun,
    hub: Arc<NotifierHub>,
    last_artifact: Option<PathBuf>,
}

impl StatusAggregator {
    pub fn new(url: impl Into<String>, hub: Arc<NotifierHub>) -> Self {
        Self {
            run: WorkflowRun::new(url),
            hub,
            last_artifact: None,
        }
    }

    pub fn run(&self) -> &WorkflowRun {
        &self.run
    }

    pub fn record(&mut self, outcome: StepOutcome) {
        if outcome.artifact.is_some() {
            self.last_artifact = outcome.artifact.clone();
        }
        info!(
            run_id = %self.run.run_id.short(),
            checkpoint = %outcome.label,
            status = ?outcome.status,
            detail = outcome.detail.as_deref().unwrap_or(""),
            "checkpoint recorded"
        );
        self.run.record(outcome);
    }

    pub fn set_amount(&mut self, amount: Option<MonetaryAmount>) {
        self.run.amount = amount;
    }

    /// Screenshot referenced by the summary, unless a later one replaces it.
    pub fn attach(&mut self, artifact: Option<PathBuf>) {
        if artifact.is_some() {
            self.last_artifact = artifact;
        }
    }

    /// Send an intermediate event; returns how many sinks accepted it.
    pub async fn emit(&self, event: NotificationEvent) -> usize {
        let mut event = event.with_run_id(self.run.run_id.short());
        if event.url.is_none() {
            event.url = Some(self.run.url.clone());
        }
        self.hub.notify(&Notification::Event(event)).await
    }

    pub fn summary_event(&self) -> NotificationEvent {
        let reason = self.run.reason();
        let mut event = match self.run.status() {
            RunStatus::Success => NotificationEvent::new(
                "Renewal completed",
                describe(reason, self.run.amount.as_ref()),
                StatusLevel::Success,
            ),
            _ => NotificationEvent::failure(
                "Renewal failed",
                describe(reason, self.run.amount.as_ref()),
            ),
        }
        .with_url(self.run.url.clone())
        .with_amount(self.run.amount.clone())
        .with_run_id(self.run.run_id.short())
        .with_field("Steps", self.run.step_labels().join(", "))
        .with_field("Elapsed", format!("{} ms", self.run.elapsed_ms()))
        .with_attachment(self.last_artifact.clone())
        .as_summary();

        if let Some(reason) = reason {
            event = event.with_reason(reason);
        }
        if let Some(detail) = self
            .run
            .steps_completed
            .iter()
            .rev()
            .find(|outcome| outcome.status == StepStatus::Failed)
            .and_then(|outcome| outcome.detail.as_deref())
        {
            event = event.with_field("Detail", detail);
        }
        event
    }

    /// Close the run with `reason` and deliver the summary.
    ///
    /// The status is logged before delivery so a failing sink cannot hide it.
    pub async fn finalize(mut self, reason: RunReason) -> WorkflowRun {
        if let Err(err) = self.run.finish(reason) {
            error!(run_id = %self.run.run_id.short(), %err, "run already finalized");
        }

        let status = self.run.status();
        let code = self.run.reason().map(|reason| reason.code()).unwrap_or_default();
        let amount = self.run.amount.as_ref().map(|amount| amount.to_string());
        match status {
            RunStatus::Success => info!(
                run_id = %self.run.run_id.short(),
                status = %status,
                reason = %code,
                amount = ?amount,
                elapsed_ms = self.run.elapsed_ms(),
                "renewal run finished"
            ),
            _ => warn!(
                run_id = %self.run.run_id.short(),
                status = %status,
                reason = %code,
                amount = ?amount,
                elapsed_ms = self.run.elapsed_ms(),
                "renewal run finished"
            ),
        }

        let summary = self.summary_event();
        let delivered = self.hub.notify(&Notification::Event(summary)).await;
        if delivered == 0 && self.hub.sink_count() > 0 {
            warn!(
                run_id = %self.run.run_id.short(),
                status = %status,
                "summary not delivered to any sink; run status stands"
            );
        }
        self.run
    }
}

fn describe(reason: Option<RunReason>, amount: Option<&MonetaryAmount>) -> String {
    let Some(reason) = reason else {
        return "Run ended without a recorded reason.".to_string();
    };
    match reason {
        RunReason::Paid => match amount {
            Some(amount) => format!("Invoice of {} paid.", amount),
            None => "Invoice paid.".to_string(),
        },
        RunReason::FreeInvoice => "Invoice total is zero; no payment needed.".to_string(),
        RunReason::ChallengeDetected => {
            "A bot verification page blocks the portal; manual action needed.".to_string()
        }
        RunReason::ElementNotFound(step) => {
            format!("No actionable '{}' element was found.", step.label())
        }
        RunReason::RenewalRestrictedBeforeClick => {
            "The portal refuses renewal for now (message shown before clicking Renew).".to_string()
        }
        RunReason::RenewalRestrictedAfterClick => {
            "The portal refuses renewal for now (message shown after clicking Renew).".to_string()
        }
        RunReason::AmountUnknown => {
            "The invoice amount could not be read; payment was not attempted.".to_string()
        }
        RunReason::PaymentRequired => match amount {
            Some(amount) => format!(
                "Invoice requires a payment of {}; rerun with payment confirmation to pay.",
                amount
            ),
            None => "Invoice requires a payment; rerun with payment confirmation to pay.".to_string(),
        },
        RunReason::InteractionError(step) => {
            format!("Browser interaction failed at '{}'.", step.label())
        }
    }
}
