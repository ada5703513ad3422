//! Chromium-backed implementation of [`PageController`].

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::CookieParam as CdpCookieParam;
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};
use url::Url;
use which::which;

use crate::element::{ElementHandle, ElementSnapshot};
use crate::error::PageError;
use crate::page::{LoadState, PageController};
use crate::scripts;
use crate::selector::Selector;

/// Quiet window used to decide that the network went idle.
const IDLE_WINDOW: Duration = Duration::from_millis(500);

/// Launch options for a browser session.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub headless: bool,
    pub executable: Option<PathBuf>,
    pub args: Vec<String>,
    pub user_agent: Option<String>,
    pub launch_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            headless: true,
            executable: detect_chrome_executable(),
            args: vec![
                "--no-sandbox".to_string(),
                "--disable-blink-features=AutomationControlled".to_string(),
                "--disable-dev-shm-usage".to_string(),
                "--no-first-run".to_string(),
            ],
            user_agent: None,
            launch_timeout: Duration::from_secs(20),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Cookie injected into the page before navigation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieParam {
    pub name: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl CookieParam {
    /// Cookie scoped to the host of `base_url` with path `/`.
    pub fn for_site(
        name: impl Into<String>,
        value: impl Into<String>,
        base_url: &str,
    ) -> Result<Self, PageError> {
        let parsed = Url::parse(base_url)
            .map_err(|err| PageError::Navigation(format!("invalid base url '{}': {}", base_url, err)))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| PageError::Navigation(format!("base url '{}' has no host", base_url)))?;
        Ok(Self {
            name: name.into(),
            value: value.into(),
            domain: Some(host.to_string()),
            path: Some("/".to_string()),
        })
    }
}

/// A launched browser. Dropping it stops the CDP handler task; call
/// [`BrowserSession::close`] to also shut Chromium down cleanly.
pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    closed: bool,
}

impl BrowserSession {
    pub async fn launch(config: &SessionConfig) -> Result<Self, PageError> {
        let mut builder = BrowserConfig::builder()
            .request_timeout(config.request_timeout)
            .launch_timeout(config.launch_timeout)
            .args(config.args.clone());

        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &config.executable {
            builder = builder.chrome_executable(executable);
        }

        let browser_config = builder.build().map_err(PageError::Launch)?;
        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|err| PageError::Launch(err.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(%err, "cdp handler reported an error");
                }
            }
        });

        info!(headless = config.headless, "browser session launched");
        Ok(Self {
            browser,
            handler,
            closed: false,
        })
    }

    pub async fn new_page(&self, user_agent: Option<&str>) -> Result<ChromiumPage, PageError> {
        let page = self.browser.new_page("about:blank").await?;
        if let Some(user_agent) = user_agent {
            page.set_user_agent(user_agent).await?;
        }
        Ok(ChromiumPage { page })
    }

    /// Close the browser and wait for the process to exit.
    pub async fn close(&mut self) -> Result<(), PageError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let result = self.browser.close().await.map(|_| ());
        if let Err(err) = self.browser.wait().await {
            warn!(%err, "browser process did not exit cleanly");
        }
        self.handler.abort();
        info!("browser session closed");
        result.map_err(PageError::from)
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

/// One tab driven over CDP.
pub struct ChromiumPage {
    page: Page,
}

impl ChromiumPage {
    pub async fn set_cookies(&self, cookies: &[CookieParam]) -> Result<(), PageError> {
        let params = cookies
            .iter()
            .map(|cookie| {
                let mut builder = CdpCookieParam::builder()
                    .name(cookie.name.clone())
                    .value(cookie.value.clone());
                if let Some(domain) = &cookie.domain {
                    builder = builder.domain(domain.clone());
                }
                if let Some(path) = &cookie.path {
                    builder = builder.path(path.clone());
                }
                builder.build().map_err(PageError::Cdp)
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.page.set_cookies(params).await?;
        Ok(())
    }

    /// Name/value pairs of the cookies visible to the page.
    pub async fn cookies(&self) -> Result<Vec<(String, String)>, PageError> {
        let cookies = self.page.get_cookies().await?;
        Ok(cookies
            .into_iter()
            .map(|cookie| (cookie.name, cookie.value))
            .collect())
    }
}

#[async_trait]
impl PageController for ChromiumPage {
    /// `Page.navigate`, then wait for `DOMContentLoaded` rather than `load`.
    async fn goto(&self, url: &str, deadline: Duration) -> Result<(), PageError> {
        debug!(url, "navigating");
        let started = Instant::now();
        let response = timeout(deadline, self.page.execute(NavigateParams::new(url)))
            .await
            .map_err(|_| PageError::timeout("goto", deadline.as_millis() as u64))?
            .map_err(|err| PageError::Navigation(err.to_string()))?;
        if let Some(error) = response.result.error_text.clone() {
            return Err(PageError::Navigation(format!("{}: {}", url, error)));
        }
        let remaining = deadline.saturating_sub(started.elapsed());
        self.wait_for_load_state(LoadState::DomContentLoaded, remaining)
            .await
    }

    async fn wait_for_load_state(
        &self,
        state: LoadState,
        deadline: Duration,
    ) -> Result<(), PageError> {
        let until = Instant::now() + deadline;
        let mut last_resources: Option<u64> = None;
        loop {
            // The execution context may be torn down mid-navigation; keep polling.
            let probe = match self.evaluate(scripts::LOAD_PROBE, Value::Null).await {
                Ok(value) => value,
                Err(err) => {
                    debug!(%err, "load probe failed");
                    Value::Null
                }
            };
            let ready = probe
                .get("ready")
                .and_then(Value::as_str)
                .unwrap_or("loading");
            let resources = probe.get("resources").and_then(Value::as_u64);

            let reached = match state {
                LoadState::DomContentLoaded => ready != "loading",
                LoadState::Load => ready == "complete",
                LoadState::NetworkIdle => {
                    ready == "complete" && resources.is_some() && last_resources == resources
                }
            };
            if reached {
                return Ok(());
            }
            last_resources = resources;

            if Instant::now() >= until {
                return Err(PageError::timeout(
                    format!("wait_for_load_state({})", state.name()),
                    deadline.as_millis() as u64,
                ));
            }
            sleep(IDLE_WINDOW).await;
        }
    }

    async fn url(&self) -> Result<String, PageError> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    async fn title(&self) -> Result<String, PageError> {
        Ok(self.page.get_title().await?.unwrap_or_default())
    }

    async fn content(&self) -> Result<String, PageError> {
        Ok(self.page.content().await?)
    }

    async fn visible_text(&self) -> Result<String, PageError> {
        let value = self.evaluate(scripts::VISIBLE_TEXT, Value::Null).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn query_all(&self, selector: &Selector) -> Result<Vec<ElementSnapshot>, PageError> {
        let spec = serde_json::to_value(selector).map_err(|err| PageError::InvalidSelector {
            selector: selector.to_string(),
            reason: err.to_string(),
        })?;
        let value = self.evaluate(scripts::QUERY_ELEMENTS, spec).await?;
        if value.is_null() {
            return Ok(Vec::new());
        }
        serde_json::from_value(value).map_err(|err| PageError::Script(err.to_string()))
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), PageError> {
        let css = format!("[{}=\"{}\"]", scripts::HANDLE_ATTR, element.0);
        let found = self
            .page
            .find_element(css)
            .await
            .map_err(|_| PageError::ElementDetached(element.0.clone()))?;
        found.click().await?;
        Ok(())
    }

    async fn evaluate(&self, script: &str, arg: Value) -> Result<Value, PageError> {
        let expression = format!("({})({})", script, arg);
        let params = EvaluateParams::builder()
            .expression(expression)
            .return_by_value(true)
            .build()
            .map_err(PageError::Script)?;
        let result = self
            .page
            .evaluate_expression(params)
            .await
            .map_err(|err| PageError::Script(err.to_string()))?;
        Ok(result.into_value::<Value>().unwrap_or(Value::Null))
    }

    async fn screenshot(&self, path: &Path, full_page: bool) -> Result<(), PageError> {
        let params = ScreenshotParams::builder().full_page(full_page).build();
        self.page
            .save_screenshot(params, path)
            .await
            .map_err(|err| PageError::Io(err.to_string()))?;
        Ok(())
    }
}

/// Locate a Chrome/Chromium binary: `RENEW_PILOT_CHROME`, then `PATH`.
pub fn detect_chrome_executable() -> Option<PathBuf> {
    if let Ok(raw) = env::var("RENEW_PILOT_CHROME") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            let candidate = PathBuf::from(trimmed);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    chrome_executable_names()
        .iter()
        .find_map(|name| which(name).ok())
}

fn chrome_executable_names() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &["chrome.exe", "chromium.exe", "msedge.exe"]
    }

    #[cfg(not(target_os = "windows"))]
    {
        &[
            "google-chrome-stable",
            "google-chrome",
            "chromium",
            "chromium-browser",
        ]
    }
}
