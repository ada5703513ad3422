//! The page controller seam and the bounded-wait helpers built on it.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::element::{ElementHandle, ElementSnapshot};
use crate::error::PageError;
use crate::scripts;
use crate::selector::Selector;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Load milestones a caller can wait for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    DomContentLoaded,
    Load,
    NetworkIdle,
}

impl LoadState {
    pub fn name(&self) -> &'static str {
        match self {
            LoadState::DomContentLoaded => "domcontentloaded",
            LoadState::Load => "load",
            LoadState::NetworkIdle => "networkidle",
        }
    }
}

/// Everything the workflow needs from a browser page.
///
/// Every waiting call takes an explicit timeout; implementations must never
/// block past it.
#[async_trait]
pub trait PageController: Send + Sync {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), PageError>;

    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration)
        -> Result<(), PageError>;

    async fn wait_for_timeout(&self, duration: Duration) {
        sleep(duration).await;
    }

    async fn url(&self) -> Result<String, PageError>;

    async fn title(&self) -> Result<String, PageError>;

    /// Serialized HTML of the document.
    async fn content(&self) -> Result<String, PageError>;

    /// Rendered text of the body.
    async fn visible_text(&self) -> Result<String, PageError>;

    /// All elements matching `selector`, in document order.
    async fn query_all(&self, selector: &Selector) -> Result<Vec<ElementSnapshot>, PageError>;

    async fn query_selector(
        &self,
        selector: &Selector,
    ) -> Result<Option<ElementSnapshot>, PageError> {
        Ok(self.query_all(selector).await?.into_iter().next())
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), PageError>;

    /// Evaluate `script` (a function expression) with `arg` as its single argument.
    async fn evaluate(&self, script: &str, arg: Value) -> Result<Value, PageError>;

    async fn screenshot(&self, path: &Path, full_page: bool) -> Result<(), PageError>;
}

/// Poll `selector` until an element satisfying `accept` shows up or `timeout` elapses.
///
/// Returns `Ok(None)` on timeout; query errors other than timeouts propagate.
pub async fn wait_for_match<F>(
    page: &dyn PageController,
    selector: &Selector,
    timeout: Duration,
    accept: F,
) -> Result<Option<ElementSnapshot>, PageError>
where
    F: Fn(&ElementSnapshot) -> bool + Send + Sync,
{
    let deadline = Instant::now() + timeout;
    loop {
        let found = page
            .query_all(selector)
            .await?
            .into_iter()
            .find(|element| accept(element));
        if found.is_some() {
            return Ok(found);
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        sleep(POLL_INTERVAL.min(deadline - now)).await;
    }
}

/// Wait for network idle; on timeout or error fall back to a fixed delay.
///
/// Returns whether the page actually reached idle.
pub async fn settle(page: &dyn PageController, timeout: Duration, fallback: Duration) -> bool {
    match page
        .wait_for_load_state(LoadState::NetworkIdle, timeout)
        .await
    {
        Ok(()) => true,
        Err(err) => {
            debug!(%err, fallback_ms = fallback.as_millis() as u64, "network idle not reached; using fixed delay");
            page.wait_for_timeout(fallback).await;
            false
        }
    }
}

/// Native click, then a script-driven `el.click()` if the native one fails.
pub async fn click_with_fallback(
    page: &dyn PageController,
    element: &ElementSnapshot,
) -> Result<(), PageError> {
    match page.click(&element.handle).await {
        Ok(()) => Ok(()),
        Err(native) => {
            warn!(element = %element.describe(), %native, "native click failed; retrying via script");
            let clicked = page
                .evaluate(
                    scripts::CLICK_BY_HANDLE,
                    json!({ "handle": element.handle.0 }),
                )
                .await?;
            if clicked.as_bool().unwrap_or(false) {
                Ok(())
            } else {
                Err(PageError::ElementDetached(element.handle.0.clone()))
            }
        }
    }
}
