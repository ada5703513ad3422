use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use action_flow::{ArtifactRecorder, EngineOptions, PauseHook, WorkflowEngine};
use action_locator::SelectorResolver;
use anyhow::{Context, Result};
use async_trait::async_trait;
use cdp_adapter::{settle, BrowserSession, ChromiumPage, PageController, SessionConfig};
use notify_hub::{DiscordWebhookSink, LogSink, NotifierHub};
use renew_core_types::WorkflowRun;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::cli::env::CliArgs;
use crate::config::Config;

/// Network-idle wait after the first navigation never exceeds this.
const NAVIGATION_IDLE_CAP: Duration = Duration::from_millis(60_000);
const NAVIGATION_FALLBACK: Duration = Duration::from_millis(2_000);

/// Waits for Enter on stdin before each step.
pub struct StdinPause;

#[async_trait]
impl PauseHook for StdinPause {
    async fn before_step(&self, label: &str) {
        eprintln!("Paused before '{}'. Press Enter to continue...", label);
        let mut line = String::new();
        let mut reader = BufReader::new(tokio::io::stdin());
        if let Err(err) = reader.read_line(&mut line).await {
            warn!(%err, "could not read from stdin; continuing");
        }
    }
}

pub fn engine_options(args: &CliArgs, config: &Config) -> EngineOptions {
    EngineOptions {
        bypass_restriction: args.bypass_restriction,
        confirm_payment: args.confirm_payment,
        navigation_timeout: Duration::from_millis(args.timeout_ms),
        navigation_idle_cap: NAVIGATION_IDLE_CAP,
        navigation_fallback: NAVIGATION_FALLBACK,
        settle_timeout: Duration::from_millis(config.timeouts.settle_ms),
        fallback_delay: Duration::from_millis(config.timeouts.fallback_delay_ms),
        ..EngineOptions::default()
    }
}

/// Notifier hub with the webhook sink when configured, the log sink otherwise.
pub fn build_hub(config: &Config) -> Result<Arc<NotifierHub>> {
    let hub = Arc::new(NotifierHub::new());
    match config.webhook() {
        Some(url) => {
            let sink = DiscordWebhookSink::new(url).context("Failed to build webhook client")?;
            hub.register_sink(Arc::new(sink));
        }
        None => {
            info!("no discord_webhook configured; notifications go to the log");
            hub.register_sink(Arc::new(LogSink));
        }
    }
    Ok(hub)
}

/// Launch the browser, do what `args` asks, and always close the browser.
pub async fn cmd_run(args: &CliArgs, config: &Config) -> Result<()> {
    let manage_url = config.manage_url()?.to_string();
    let workflow = args.runs_workflow();
    info!(workflow, url = %manage_url, "starting");

    let session_config = SessionConfig {
        headless: !args.headful,
        user_agent: config.http.user_agent.clone(),
        ..SessionConfig::default()
    };
    let mut session = BrowserSession::launch(&session_config)
        .await
        .context("Failed to launch browser")?;

    let result = drive(&session, args, config, workflow, &manage_url).await;

    if let Err(err) = session.close().await {
        warn!(%err, "browser did not close cleanly");
    }
    result
}

async fn drive(
    session: &BrowserSession,
    args: &CliArgs,
    config: &Config,
    workflow: bool,
    manage_url: &str,
) -> Result<()> {
    let page = session
        .new_page(config.http.user_agent.as_deref())
        .await
        .context("Failed to open a page")?;

    if args.use_config_cookies {
        inject_cookies(&page, config).await?;
    }

    // The workflow navigates by itself; otherwise load the page here.
    let run = if workflow {
        Some(run_workflow(&page, args, config, manage_url).await?)
    } else {
        open(&page, args, manage_url).await;
        None
    };

    report_page(&page).await;
    print_cookies(&page).await?;
    if let Some(run) = run {
        print_run(&run)?;
    }
    Ok(())
}

async fn inject_cookies(page: &ChromiumPage, config: &Config) -> Result<()> {
    let cookies = config.site_cookies()?;
    if cookies.is_empty() {
        warn!("--use-config-cookies given but no cookies are configured");
        return Ok(());
    }
    page.set_cookies(&cookies)
        .await
        .context("Failed to inject cookies")?;
    let names: Vec<&str> = cookies.iter().map(|cookie| cookie.name.as_str()).collect();
    info!(cookies = ?names, "injected config cookies");
    Ok(())
}

async fn open(page: &dyn PageController, args: &CliArgs, url: &str) {
    let timeout = Duration::from_millis(args.timeout_ms);
    if let Err(err) = page.goto(url, timeout).await {
        warn!(url, %err, "navigation failed");
    }
    settle(page, timeout.min(NAVIGATION_IDLE_CAP), NAVIGATION_FALLBACK).await;
}

async fn report_page(page: &dyn PageController) {
    let title = page.title().await.unwrap_or_default();
    let url = page.url().await.unwrap_or_default();
    info!(title = %title, url = %url, "page loaded");
}

/// Session cookies as `{"cookies": {name: value}}` on stdout.
async fn print_cookies(page: &ChromiumPage) -> Result<()> {
    let cookies: BTreeMap<String, String> = page
        .cookies()
        .await
        .context("Failed to read cookies")?
        .into_iter()
        .collect();
    println!("{}", serde_json::to_string_pretty(&json!({ "cookies": cookies }))?);
    Ok(())
}

async fn run_workflow(
    page: &ChromiumPage,
    args: &CliArgs,
    config: &Config,
    url: &str,
) -> Result<WorkflowRun> {
    let resolver = SelectorResolver::new(Duration::from_millis(config.timeouts.element_ms))
        .with_config_overrides(&config.selectors)
        .context("Invalid selector override")?;
    let hub = build_hub(config)?;

    let mut engine = WorkflowEngine::new(resolver, engine_options(args, config), hub);
    if args.screenshots {
        engine = engine.with_artifacts(ArtifactRecorder::new(&config.paths.screenshot_dir));
    }
    if args.pause {
        engine = engine.with_pause_hook(Arc::new(StdinPause));
    }

    Ok(engine.run(page, url).await)
}

/// Full run record on stdout for scripting.
fn print_run(run: &WorkflowRun) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(run)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn options_follow_flags_and_config() {
        let args = CliArgs::parse_from(["renew-pilot", "--confirm-payment", "--timeout-ms", "90000"]);
        let mut config = Config::default();
        config.timeouts.settle_ms = 3_000;

        let options = engine_options(&args, &config);
        assert!(options.confirm_payment);
        assert!(!options.bypass_restriction);
        assert_eq!(options.navigation_idle_timeout(), Duration::from_secs(60));
        assert_eq!(options.settle_timeout, Duration::from_millis(3_000));
        assert_eq!(options.fallback_delay, Duration::from_millis(1_200));
    }

    #[test]
    fn log_sink_without_webhook() {
        let hub = build_hub(&Config::default()).unwrap();
        assert_eq!(hub.sink_count(), 1);
    }
}
