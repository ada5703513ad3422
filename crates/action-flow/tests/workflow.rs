use std::sync::Arc;
use std::time::Duration;

use action_flow::{ArtifactRecorder, EngineOptions, PauseHook, WorkflowEngine};
use action_locator::SelectorResolver;
use async_trait::async_trait;
use cdp_adapter::fixture::{ClickFailure, FixtureElement, FixtureState, ScriptedPage};
use notify_hub::{Notification, NotificationSink, NotifierHub, NotifyError};
use parking_lot::Mutex;
use renew_core_types::{
    NotificationEvent, RunReason, RunStatus, StatusLevel, StepName, StepStatus, WorkflowRun,
};
use rust_decimal::Decimal;

const MANAGE_URL: &str = "https://portal.example/service/manage/7";

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<NotificationEvent>>,
}

impl RecordingSink {
    fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().clone()
    }

    fn summaries(&self) -> Vec<NotificationEvent> {
        self.events().into_iter().filter(|event| event.summary).collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        if let Notification::Event(event) = notification {
            self.events.lock().push(event.clone());
        }
        Ok(())
    }
}

#[derive(Default)]
struct RecordingPause {
    labels: Mutex<Vec<String>>,
}

#[async_trait]
impl PauseHook for RecordingPause {
    async fn before_step(&self, label: &str) {
        self.labels.lock().push(label.to_string());
    }
}

fn manage_page(text: &str) -> FixtureState {
    FixtureState::new("manage", MANAGE_URL)
        .title("Service management")
        .text(text)
        .element(FixtureElement::link("Support"))
        .element(FixtureElement::button("Renouveler").navigates_to("renew"))
}

fn renew_page(text: &str) -> FixtureState {
    FixtureState::new("renew", "https://portal.example/service/renew/7")
        .title("Renewal")
        .text(text)
        .element(FixtureElement::button("Create Invoice").navigates_to("invoice"))
}

fn invoice_page(text: &str, total: Option<&str>) -> FixtureState {
    let mut state = FixtureState::new("invoice", "https://portal.example/invoice/42")
        .title("Invoice #42")
        .text(text);
    if let Some(total) = total {
        state = state
            .element(FixtureElement::row(&["Sous-total", "10,00 €"]))
            .element(FixtureElement::row(&["Total", total]));
    }
    state
        .element(FixtureElement::button("Pay now").navigates_to("paid"))
}

fn paid_page() -> FixtureState {
    FixtureState::new("paid", "https://portal.example/invoice/42/paid").text("Payment received")
}

fn portal(manage_text: &str, total: Option<&str>) -> ScriptedPage {
    ScriptedPage::new(vec![
        manage_page(manage_text),
        renew_page("Choose your renewal period"),
        invoice_page("Your invoice is ready", total),
        paid_page(),
    ])
}

fn options() -> EngineOptions {
    EngineOptions {
        navigation_timeout: Duration::from_millis(200),
        navigation_fallback: Duration::from_millis(5),
        settle_timeout: Duration::from_millis(50),
        fallback_delay: Duration::from_millis(5),
        ..EngineOptions::default()
    }
}

fn engine(options: EngineOptions) -> (WorkflowEngine, Arc<RecordingSink>) {
    let hub = Arc::new(NotifierHub::new());
    let sink = Arc::new(RecordingSink::default());
    hub.register_sink(sink.clone());
    let resolver = SelectorResolver::new(Duration::from_millis(30));
    (WorkflowEngine::new(resolver, options, hub), sink)
}

fn assert_finished(run: &WorkflowRun) {
    assert_ne!(run.status(), RunStatus::Pending);
    assert!(run.finished_at().is_some());
    assert!(run.reason().is_some());
}

#[tokio::test]
async fn restriction_before_click_fails_the_run() {
    let page = portal("Renewal Restricted: you may renew 3 days before expiry.", Some("0,00 €"));
    let (engine, sink) = engine(options());

    let run = engine.run(&page, MANAGE_URL).await;

    assert_finished(&run);
    assert_eq!(run.status(), RunStatus::Failed);
    assert!(run
        .reason()
        .unwrap()
        .code()
        .starts_with("renewal_restricted_before"));
    assert!(page.clicks().is_empty());

    let summaries = sink.summaries();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].level, StatusLevel::Failure);
    assert_eq!(summaries[0].reason, Some(RunReason::RenewalRestrictedBeforeClick));
}

#[tokio::test]
async fn restriction_wins_over_a_disabled_renew_button() {
    let page = ScriptedPage::new(vec![
        FixtureState::new("manage", MANAGE_URL)
            .text("Renewal Restricted: you may renew 3 days before expiry.")
            .element(FixtureElement::button("Renouveler").disabled()),
        renew_page(""),
    ]);
    let (engine, sink) = engine(options());

    let run = engine.run(&page, MANAGE_URL).await;

    assert_eq!(run.status(), RunStatus::Failed);
    assert_eq!(run.reason(), Some(RunReason::RenewalRestrictedBeforeClick));
    assert!(page.clicks().is_empty());
    assert_eq!(
        sink.summaries()[0].reason,
        Some(RunReason::RenewalRestrictedBeforeClick)
    );
}

#[tokio::test]
async fn restriction_after_click_is_caught() {
    let page = ScriptedPage::new(vec![
        manage_page(""),
        renew_page("You can only renew your free service 1 day before it expires."),
        invoice_page("", Some("0,00 €")),
    ]);
    let (engine, _sink) = engine(options());

    let run = engine.run(&page, MANAGE_URL).await;

    assert_eq!(run.reason(), Some(RunReason::RenewalRestrictedAfterClick));
    assert_eq!(page.clicks(), vec!["Renouveler".to_string()]);
    assert_eq!(
        run.step_labels(),
        vec![
            "navigate",
            "challenge_check",
            "restriction_check_before",
            "renew",
            "restriction_check_after"
        ]
    );
}

#[tokio::test]
async fn bypassed_restriction_continues_with_a_warning() {
    let page = ScriptedPage::new(vec![
        manage_page("Renewal restricted until 2026-11-01"),
        renew_page(""),
        invoice_page("Montant : gratuit", None),
    ]);
    let (engine, sink) = engine(EngineOptions {
        bypass_restriction: true,
        ..options()
    });

    let run = engine.run(&page, MANAGE_URL).await;

    assert_eq!(run.status(), RunStatus::Success);
    assert_eq!(run.reason(), Some(RunReason::FreeInvoice));
    assert!(run
        .steps_completed
        .iter()
        .any(|step| step.label == "restriction_check_before" && step.status == StepStatus::Bypassed));

    let warnings: Vec<_> = sink
        .events()
        .into_iter()
        .filter(|event| event.level == StatusLevel::Warning)
        .collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].reason, Some(RunReason::RenewalRestrictedBeforeClick));
    assert!(!warnings[0].summary);
}

#[tokio::test]
async fn positive_amount_without_confirmation_never_pays() {
    let page = portal("", Some("12,50 €"));
    let (engine, sink) = engine(options());

    let run = engine.run(&page, MANAGE_URL).await;

    assert_finished(&run);
    assert_eq!(run.reason(), Some(RunReason::PaymentRequired));
    assert_eq!(run.amount.as_ref().unwrap().value, Decimal::new(1250, 2));
    assert!(!page.clicks().contains(&"Pay now".to_string()));
    assert_eq!(page.current_state(), "invoice");

    let summary = sink.summaries().pop().unwrap();
    assert_eq!(summary.amount.unwrap().value, Decimal::new(1250, 2));
}

fn invoice_with_container(rows: &[[&str; 2]]) -> ScriptedPage {
    let mut invoice = FixtureState::new("invoice", "https://portal.example/invoice/42")
        .title("Invoice #42")
        .text("Your invoice is ready");
    for row in rows {
        invoice = invoice.element(FixtureElement::row(row));
    }
    invoice = invoice
        .element(FixtureElement::new("span", "12,50 €").class("invoice-amount"))
        .element(FixtureElement::button("Pay now").navigates_to("paid"));
    ScriptedPage::new(vec![manage_page(""), renew_page(""), invoice, paid_page()])
}

#[tokio::test]
async fn day_count_next_to_due_label_is_not_a_free_invoice() {
    let page = invoice_with_container(&[["Due in", "0 days"]]);
    let (engine, _sink) = engine(options());

    let run = engine.run(&page, MANAGE_URL).await;

    assert_eq!(run.status(), RunStatus::Failed);
    assert_eq!(run.reason(), Some(RunReason::PaymentRequired));
    assert_eq!(run.amount.as_ref().unwrap().value, Decimal::new(1250, 2));
    assert!(!page.clicks().contains(&"Pay now".to_string()));
}

#[tokio::test]
async fn due_date_row_is_not_an_amount() {
    let page = invoice_with_container(&[["Due date", "05/11/2024"], ["Due date", "05.11.2024"]]);
    let (engine, _sink) = engine(options());

    let run = engine.run(&page, MANAGE_URL).await;

    assert_eq!(run.reason(), Some(RunReason::PaymentRequired));
    let amount = run.amount.as_ref().unwrap();
    assert_eq!(amount.value, Decimal::new(1250, 2));
    assert_eq!(amount.raw_text, "12,50 €");
}

#[tokio::test]
async fn confirmed_payment_clicks_pay() {
    let page = portal("", Some("12,50 €"));
    let (engine, sink) = engine(EngineOptions {
        confirm_payment: true,
        ..options()
    });

    let run = engine.run(&page, MANAGE_URL).await;

    assert_eq!(run.status(), RunStatus::Success);
    assert_eq!(run.reason(), Some(RunReason::Paid));
    assert_eq!(
        page.clicks(),
        vec![
            "Renouveler".to_string(),
            "Create Invoice".to_string(),
            "Pay now".to_string()
        ]
    );
    assert_eq!(page.current_state(), "paid");

    let summary = sink.summaries().pop().unwrap();
    assert_eq!(summary.level, StatusLevel::Success);
    assert_eq!(summary.title, "Renewal completed");
}

#[tokio::test]
async fn free_invoice_skips_the_pay_step() {
    let page = ScriptedPage::new(vec![
        manage_page(""),
        renew_page(""),
        invoice_page("Renouvellement gratuit", None),
    ]);
    let (engine, _sink) = engine(EngineOptions {
        confirm_payment: true,
        ..options()
    });

    let run = engine.run(&page, MANAGE_URL).await;

    assert_eq!(run.reason(), Some(RunReason::FreeInvoice));
    assert!(run.amount.as_ref().unwrap().is_zero());
    assert!(!page.clicks().contains(&"Pay now".to_string()));
}

#[tokio::test]
async fn unresolved_amount_aborts_before_payment() {
    let page = portal("", None);
    let (engine, _sink) = engine(EngineOptions {
        confirm_payment: true,
        ..options()
    });

    let run = engine.run(&page, MANAGE_URL).await;

    assert_eq!(run.status(), RunStatus::Failed);
    assert_eq!(run.reason(), Some(RunReason::AmountUnknown));
    assert!(run.amount.is_none());
    assert!(!page.clicks().contains(&"Pay now".to_string()));
}

#[tokio::test]
async fn challenge_is_terminal_even_with_bypass() {
    let page = ScriptedPage::single(
        FixtureState::new("challenge", MANAGE_URL)
            .title("Just a moment...")
            .element(FixtureElement::button("Renouveler")),
    );
    let (engine, _sink) = engine(EngineOptions {
        bypass_restriction: true,
        ..options()
    });

    let run = engine.run(&page, MANAGE_URL).await;

    assert_eq!(run.reason(), Some(RunReason::ChallengeDetected));
    assert_eq!(run.status(), RunStatus::Failed);
    assert!(page.clicks().is_empty());
}

#[tokio::test]
async fn missing_renew_element_reports_the_signal() {
    let page = ScriptedPage::single(
        FixtureState::new("manage", MANAGE_URL)
            .text("Service active until 2026-12-31")
            .element(FixtureElement::link("Support")),
    );
    let (engine, sink) = engine(options());

    let run = engine.run(&page, MANAGE_URL).await;

    assert_eq!(run.reason(), Some(RunReason::ElementNotFound(StepName::Renew)));
    let failed = run
        .steps_completed
        .iter()
        .find(|step| step.label == "renew")
        .unwrap();
    assert_eq!(failed.status, StepStatus::Failed);
    assert!(failed.detail.as_deref().unwrap().starts_with("word_absent"));

    let summary = sink.summaries().pop().unwrap();
    assert!(summary
        .fields
        .iter()
        .any(|field| field.name == "Detail" && field.value.starts_with("word_absent")));
}

#[tokio::test]
async fn pay_click_failure_is_an_interaction_error() {
    let page = portal("", Some("12,50 €")).fail_click("Pay now", ClickFailure::Always);
    let (engine, _sink) = engine(EngineOptions {
        confirm_payment: true,
        ..options()
    });

    let run = engine.run(&page, MANAGE_URL).await;

    assert_eq!(run.reason(), Some(RunReason::InteractionError(StepName::Pay)));
    assert_eq!(page.current_state(), "invoice");
}

#[tokio::test]
async fn native_click_failure_falls_back_to_script() {
    let page = portal("", Some("0,00 €")).fail_click("Renouveler", ClickFailure::Native);
    let (engine, _sink) = engine(options());

    let run = engine.run(&page, MANAGE_URL).await;

    assert_eq!(run.reason(), Some(RunReason::FreeInvoice));
    assert_eq!(page.clicks()[0], "Renouveler");
}

#[tokio::test]
async fn failed_renew_click_stops_when_invoice_is_unreachable() {
    let page = portal("", Some("0,00 €")).fail_click("Renouveler", ClickFailure::Always);
    let (engine, _sink) = engine(options());

    let run = engine.run(&page, MANAGE_URL).await;

    assert_eq!(run.reason(), Some(RunReason::InteractionError(StepName::Renew)));
    assert!(page.clicks().is_empty());
}

#[tokio::test]
async fn navigation_failure_and_busy_network_do_not_stop_the_run() {
    let page = portal("", Some("0,00 €")).fail_navigation().never_idle();
    let (engine, _sink) = engine(options());

    let run = engine.run(&page, MANAGE_URL).await;

    assert_eq!(run.reason(), Some(RunReason::FreeInvoice));
    assert_eq!(run.steps_completed[0].label, "navigate");
    assert_eq!(run.steps_completed[0].status, StepStatus::Failed);
}

#[tokio::test]
async fn screenshots_are_attached_to_events() {
    let dir = tempfile::tempdir().unwrap();
    let page = portal("", Some("12,50 €"));
    let (engine, sink) = engine(options());
    let engine = engine.with_artifacts(ArtifactRecorder::new(dir.path()));

    let run = engine.run(&page, MANAGE_URL).await;

    assert_eq!(run.reason(), Some(RunReason::PaymentRequired));
    // renew, create_invoice, then the abort capture
    assert_eq!(page.screenshots().len(), 3);
    let clicked: Vec<_> = sink
        .events()
        .into_iter()
        .filter(|event| event.level == StatusLevel::Info)
        .collect();
    assert_eq!(clicked.len(), 2);
    assert!(clicked.iter().all(|event| event.attachments.len() == 1));

    let summary = sink.summaries().pop().unwrap();
    let attached = summary.attachments.first().unwrap();
    assert!(attached
        .file_name()
        .unwrap()
        .to_string_lossy()
        .ends_with("aborted-payment_required.png"));
}

#[tokio::test]
async fn pause_hook_runs_before_each_step() {
    let pause = Arc::new(RecordingPause::default());
    let page = portal("", Some("12,50 €"));
    let (engine, _sink) = engine(EngineOptions {
        confirm_payment: true,
        ..options()
    });
    let engine = engine.with_pause_hook(pause.clone());

    engine.run(&page, MANAGE_URL).await;

    assert_eq!(
        pause.labels.lock().as_slice(),
        ["navigate", "renew", "create_invoice", "pay"]
    );
}
