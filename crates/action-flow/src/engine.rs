//! Renewal workflow state machine.

use std::sync::Arc;

use action_gate::{
    ChallengeDetector, PaymentDecision, PaymentGate, RestrictionDetector, RestrictionMatch,
};
use action_locator::{LocatorError, ResolutionResult, SelectorResolver};
use cdp_adapter::{click_with_fallback, settle, PageController, PageError};
use notify_hub::NotifierHub;
use perceiver_amount::{AmountExtraction, AmountExtractor};
use renew_core_types::{
    MonetaryAmount, NotificationEvent, RunReason, RunStatus, StepName, StepOutcome, WorkflowRun,
};
use tracing::{debug, info, warn};

use crate::aggregator::StatusAggregator;
use crate::artifacts::ArtifactRecorder;
use crate::pause::{NoPause, PauseHook};
use crate::types::{EngineOptions, WorkflowState};

/// Where the restriction check runs relative to the renew click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Checkpoint {
    BeforeClick,
    AfterClick,
}

impl Checkpoint {
    fn label(&self) -> &'static str {
        match self {
            Checkpoint::BeforeClick => "restriction_check_before",
            Checkpoint::AfterClick => "restriction_check_after",
        }
    }

    fn reason(&self) -> RunReason {
        match self {
            Checkpoint::BeforeClick => RunReason::RenewalRestrictedBeforeClick,
            Checkpoint::AfterClick => RunReason::RenewalRestrictedAfterClick,
        }
    }
}

/// Drives one page through Renew, Create Invoice and Pay.
///
/// Steps run strictly in sequence and every guard resolves before the next
/// step starts. [`WorkflowEngine::run`] never fails: guard failures and
/// interaction errors end in a terminal state recorded on the returned run.
pub struct WorkflowEngine {
    resolver: SelectorResolver,
    restriction: RestrictionDetector,
    challenge: ChallengeDetector,
    extractor: AmountExtractor,
    gate: PaymentGate,
    options: EngineOptions,
    hub: Arc<NotifierHub>,
    artifacts: ArtifactRecorder,
    pause: Arc<dyn PauseHook>,
}

impl WorkflowEngine {
    pub fn new(resolver: SelectorResolver, options: EngineOptions, hub: Arc<NotifierHub>) -> Self {
        Self {
            resolver,
            restriction: RestrictionDetector::new(),
            challenge: ChallengeDetector::new(),
            extractor: AmountExtractor::new(),
            gate: PaymentGate::new(options.confirm_payment),
            options,
            hub,
            artifacts: ArtifactRecorder::disabled(),
            pause: Arc::new(NoPause),
        }
    }

    pub fn with_artifacts(mut self, artifacts: ArtifactRecorder) -> Self {
        self.artifacts = artifacts;
        self
    }

    pub fn with_pause_hook(mut self, pause: Arc<dyn PauseHook>) -> Self {
        self.pause = pause;
        self
    }

    pub fn with_restriction_detector(mut self, detector: RestrictionDetector) -> Self {
        self.restriction = detector;
        self
    }

    pub fn with_extractor(mut self, extractor: AmountExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Execute one run against `page`, starting by loading `url`.
    pub async fn run(&self, page: &dyn PageController, url: &str) -> WorkflowRun {
        let mut aggregator = StatusAggregator::new(url, self.hub.clone());
        info!(
            run_id = %aggregator.run().run_id.short(),
            url,
            bypass_restriction = self.options.bypass_restriction,
            confirm_payment = self.options.confirm_payment,
            "renewal run started"
        );

        let mut state = WorkflowState::Idle;
        let reason = loop {
            let next = match state {
                WorkflowState::Idle => self.open(page, url, &mut aggregator).await,
                WorkflowState::AwaitingRenew => self.renew(page, &mut aggregator).await,
                WorkflowState::AwaitingInvoice => self.create_invoice(page, &mut aggregator).await,
                WorkflowState::AwaitingPay => self.pay(page, &mut aggregator).await,
                WorkflowState::Challenged => break RunReason::ChallengeDetected,
                WorkflowState::Completed(reason) | WorkflowState::Aborted(reason) => break reason,
            };
            debug!(from = %state, to = %next, "state transition");
            state = next;
        };
        debug!(state = %state, "terminal state reached");

        if reason.status() == RunStatus::Failed {
            let label = format!("aborted-{}", reason.code());
            let artifact = self.artifacts.capture(page, &label).await;
            aggregator.attach(artifact);
        }

        aggregator.finalize(reason).await
    }

    async fn open(
        &self,
        page: &dyn PageController,
        url: &str,
        aggregator: &mut StatusAggregator,
    ) -> WorkflowState {
        self.pause.before_step("navigate").await;

        match page.goto(url, self.options.navigation_timeout).await {
            Ok(()) => aggregator.record(StepOutcome::passed("navigate").with_url(url)),
            Err(err) => {
                warn!(url, %err, "navigation failed; checking the page anyway");
                aggregator.record(StepOutcome::failed("navigate", err.to_string()).with_url(url));
            }
        }
        let idle = settle(
            page,
            self.options.navigation_idle_timeout(),
            self.options.navigation_fallback,
        )
        .await;
        debug!(idle, "page settled after navigation");
        if let Ok(current) = page.url().await {
            info!(url = %current, "manage page loaded");
        }

        match self.challenge.detect(page).await {
            Ok(Some(hit)) => {
                aggregator.record(StepOutcome::failed("challenge_check", hit.fingerprint));
                WorkflowState::Challenged
            }
            Ok(None) => {
                aggregator.record(StepOutcome::passed("challenge_check"));
                WorkflowState::AwaitingRenew
            }
            Err(err) => {
                warn!(%err, "challenge check failed; continuing");
                aggregator.record(StepOutcome::skipped("challenge_check", err.to_string()));
                WorkflowState::AwaitingRenew
            }
        }
    }

    async fn renew(
        &self,
        page: &dyn PageController,
        aggregator: &mut StatusAggregator,
    ) -> WorkflowState {
        self.pause.before_step(StepName::Renew.key()).await;

        let resolution = match self.locate(StepName::Renew, page, aggregator).await {
            Ok(resolution) => resolution,
            Err(WorkflowState::Aborted(RunReason::ElementNotFound(step))) => {
                // Restricted portals hide or disable Renew; the restriction is the cause.
                return match self
                    .restriction_guard(page, aggregator, Checkpoint::BeforeClick)
                    .await
                {
                    Some(
                        restricted @ WorkflowState::Aborted(RunReason::RenewalRestrictedBeforeClick),
                    ) => restricted,
                    _ => WorkflowState::Aborted(RunReason::ElementNotFound(step)),
                };
            }
            Err(state) => return state,
        };

        if let Some(state) = self
            .restriction_guard(page, aggregator, Checkpoint::BeforeClick)
            .await
        {
            return state;
        }

        let clicked = self.click_through(page, &resolution, aggregator).await;

        if let Some(state) = self
            .restriction_guard(page, aggregator, Checkpoint::AfterClick)
            .await
        {
            return state;
        }

        if clicked.is_err() {
            // Only go on when the invoice step is still reachable.
            return match self.resolver.resolve(StepName::CreateInvoice, page).await {
                Ok(_) => {
                    info!("renew click failed but the invoice step is reachable; continuing");
                    WorkflowState::AwaitingInvoice
                }
                Err(_) => WorkflowState::Aborted(RunReason::InteractionError(StepName::Renew)),
            };
        }
        WorkflowState::AwaitingInvoice
    }

    async fn create_invoice(
        &self,
        page: &dyn PageController,
        aggregator: &mut StatusAggregator,
    ) -> WorkflowState {
        self.pause.before_step(StepName::CreateInvoice.key()).await;

        let resolution = match self.locate(StepName::CreateInvoice, page, aggregator).await {
            Ok(resolution) => resolution,
            Err(state) => return state,
        };
        let clicked = self.click_through(page, &resolution, aggregator).await;
        let snippet = clicked.as_ref().ok().cloned();

        let amount = self.read_amount(page, snippet.as_deref(), aggregator).await;
        aggregator.set_amount(amount.clone());

        if clicked.is_err() {
            // The amount is informational only once the click failed.
            return match amount {
                Some(_) => WorkflowState::Aborted(RunReason::InteractionError(StepName::CreateInvoice)),
                None => WorkflowState::Aborted(RunReason::AmountUnknown),
            };
        }

        match self.gate.evaluate(amount.as_ref()) {
            PaymentDecision::Free => {
                aggregator.record(StepOutcome::passed("payment_gate").with_detail("free"));
                WorkflowState::Completed(RunReason::FreeInvoice)
            }
            PaymentDecision::Proceed => {
                aggregator.record(StepOutcome::passed("payment_gate").with_detail("confirmed"));
                WorkflowState::AwaitingPay
            }
            PaymentDecision::Blocked(reason) => {
                aggregator.record(StepOutcome::failed("payment_gate", reason.code()));
                WorkflowState::Aborted(reason)
            }
        }
    }

    async fn pay(&self, page: &dyn PageController, aggregator: &mut StatusAggregator) -> WorkflowState {
        self.pause.before_step(StepName::Pay.key()).await;

        let resolution = match self.locate(StepName::Pay, page, aggregator).await {
            Ok(resolution) => resolution,
            Err(state) => return state,
        };
        match self.click_through(page, &resolution, aggregator).await {
            Ok(_) => WorkflowState::Completed(RunReason::Paid),
            Err(_) => WorkflowState::Aborted(RunReason::InteractionError(StepName::Pay)),
        }
    }

    /// Resolve `step`, recording a failed checkpoint and the abort state when it cannot.
    async fn locate(
        &self,
        step: StepName,
        page: &dyn PageController,
        aggregator: &mut StatusAggregator,
    ) -> Result<ResolutionResult, WorkflowState> {
        match self.resolver.resolve(step, page).await {
            Ok(resolution) => Ok(resolution),
            Err(LocatorError::ElementNotFound { diagnostic, .. }) => {
                warn!(step = %step, signal = diagnostic.signal(), %diagnostic, "element not found");
                aggregator.record(
                    StepOutcome::failed(step.key(), diagnostic.to_string()).with_step(step),
                );
                Err(WorkflowState::Aborted(RunReason::ElementNotFound(step)))
            }
            Err(err) => {
                warn!(step = %step, severity = err.severity(), %err, "element resolution failed");
                aggregator.record(StepOutcome::failed(step.key(), err.to_string()).with_step(step));
                Err(WorkflowState::Aborted(RunReason::InteractionError(step)))
            }
        }
    }

    /// Click, let the page settle, and capture what it shows afterwards.
    ///
    /// Returns the post-click content snippet.
    async fn click_through(
        &self,
        page: &dyn PageController,
        resolution: &ResolutionResult,
        aggregator: &mut StatusAggregator,
    ) -> Result<String, PageError> {
        let step = resolution.step;
        info!(
            step = %step,
            strategy = resolution.strategy.name(),
            element = %resolution.element.describe(),
            "clicking"
        );
        if let Err(err) = click_with_fallback(page, &resolution.element).await {
            warn!(step = %step, retryable = err.is_retryable(), %err, "click failed");
            aggregator.record(StepOutcome::failed(step.key(), err.to_string()).with_step(step));
            return Err(err);
        }

        settle(page, self.options.settle_timeout, self.options.fallback_delay).await;
        let url = page.url().await.unwrap_or_default();
        let snippet = match page.content().await {
            Ok(content) => content.chars().take(self.options.snippet_len).collect::<String>(),
            Err(err) => {
                debug!(%err, "content unavailable after click");
                String::new()
            }
        };
        let logged: String = snippet.chars().take(self.options.log_snippet_len).collect();
        debug!(step = %step, url = %url, snippet = %logged, "page after click");

        let artifact = self.artifacts.capture(page, step.key()).await;
        aggregator.record(
            StepOutcome::passed(step.key())
                .with_step(step)
                .with_detail(format!("via {}", resolution.strategy.name()))
                .with_url(url.clone())
                .with_artifact(artifact.clone()),
        );
        aggregator
            .emit(
                NotificationEvent::info(format!("{} clicked", step.label()), format!("Now at {}", url))
                    .with_url(url)
                    .with_attachment(artifact),
            )
            .await;
        Ok(snippet)
    }

    /// `None` when the run should go on; the terminal state otherwise.
    async fn restriction_guard(
        &self,
        page: &dyn PageController,
        aggregator: &mut StatusAggregator,
        checkpoint: Checkpoint,
    ) -> Option<WorkflowState> {
        let found = match self.restriction.detect(page).await {
            Ok(found) => found,
            Err(err) => {
                warn!(checkpoint = checkpoint.label(), %err, "restriction check failed");
                aggregator.record(
                    StepOutcome::failed(checkpoint.label(), err.to_string()).with_step(StepName::Renew),
                );
                return Some(WorkflowState::Aborted(RunReason::InteractionError(StepName::Renew)));
            }
        };

        let evidence = match found {
            RestrictionMatch {
                matched: true,
                evidence: Some(evidence),
            } => evidence,
            _ => {
                aggregator.record(StepOutcome::passed(checkpoint.label()).with_step(StepName::Renew));
                return None;
            }
        };

        if !self.options.bypass_restriction {
            warn!(checkpoint = checkpoint.label(), %evidence, "renewal restricted");
            aggregator.record(
                StepOutcome::failed(checkpoint.label(), evidence.to_string()).with_step(StepName::Renew),
            );
            return Some(WorkflowState::Aborted(checkpoint.reason()));
        }

        warn!(checkpoint = checkpoint.label(), %evidence, "renewal restricted; bypass requested, continuing");
        aggregator.record(
            StepOutcome::bypassed(checkpoint.label(), evidence.to_string()).with_step(StepName::Renew),
        );
        aggregator
            .emit(
                NotificationEvent::warning(
                    "Renewal restriction bypassed",
                    format!("Restriction message {} ignored on operator request.", evidence),
                )
                .with_reason(checkpoint.reason()),
            )
            .await;
        None
    }

    async fn read_amount(
        &self,
        page: &dyn PageController,
        snippet: Option<&str>,
        aggregator: &mut StatusAggregator,
    ) -> Option<MonetaryAmount> {
        match self.extractor.extract(page, snippet).await {
            Ok(AmountExtraction::Resolved(amount)) => {
                aggregator.record(
                    StepOutcome::passed("amount")
                        .with_step(StepName::CreateInvoice)
                        .with_detail(amount.to_string()),
                );
                Some(amount)
            }
            Ok(AmountExtraction::Unresolved { tried }) => {
                let tried: Vec<&str> = tried.iter().map(|source| source.name()).collect();
                warn!(tried = ?tried, "invoice amount unresolved");
                aggregator.record(
                    StepOutcome::failed("amount", format!("unresolved after {}", tried.join(", ")))
                        .with_step(StepName::CreateInvoice),
                );
                None
            }
            Err(err) => {
                warn!(retryable = err.is_retryable(), %err, "amount extraction failed");
                aggregator.record(
                    StepOutcome::failed("amount", err.to_string()).with_step(StepName::CreateInvoice),
                );
                None
            }
        }
    }
}
