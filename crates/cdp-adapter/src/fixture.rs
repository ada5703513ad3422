//! In-memory page for tests.
//!
//! A [`ScriptedPage`] holds a list of named [`FixtureState`]s; clicking an
//! element declared with [`FixtureElement::navigates_to`] switches the page to
//! another state, which is enough to script the portal's Renew → Invoice → Pay
//! screens without a browser.
//!
//! CSS support is deliberately small: selector lists, and for each complex
//! selector only its last compound (`tag`, `.class`, `#id`, `[attr]`,
//! `[attr=v]`, `[attr*=v]`, `[attr^=v]`, `[attr$=v]`, `[attr~=v]`).

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::element::{ElementHandle, ElementSnapshot};
use crate::error::PageError;
use crate::page::{LoadState, PageController};
use crate::scripts;
use crate::selector::{normalize_text, Selector};

#[derive(Debug, Clone)]
pub struct FixtureElement {
    pub tag: String,
    pub text: String,
    pub attributes: BTreeMap<String, String>,
    pub cells: Vec<String>,
    pub visible: bool,
    pub enabled: bool,
    pub on_click: Option<String>,
}

impl FixtureElement {
    pub fn new(tag: &str, text: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            text: text.to_string(),
            attributes: BTreeMap::new(),
            cells: Vec::new(),
            visible: true,
            enabled: true,
            on_click: None,
        }
    }

    pub fn button(text: &str) -> Self {
        Self::new("button", text)
    }

    pub fn link(text: &str) -> Self {
        Self::new("a", text).attr("href", "#")
    }

    /// Table row whose cells are `cells`.
    pub fn row(cells: &[&str]) -> Self {
        let mut row = Self::new("tr", &cells.join(" "));
        row.cells = cells.iter().map(|cell| cell.to_string()).collect();
        row
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn class(mut self, class: &str) -> Self {
        let merged = match self.attributes.get("class") {
            Some(existing) => format!("{} {}", existing, class),
            None => class.to_string(),
        };
        self.attributes.insert("class".to_string(), merged);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn navigates_to(mut self, state: &str) -> Self {
        self.on_click = Some(state.to_string());
        self
    }

    fn to_html(&self) -> String {
        let attrs: String = self
            .attributes
            .iter()
            .map(|(name, value)| format!(" {}=\"{}\"", name, value))
            .collect();
        if self.cells.is_empty() {
            format!("<{tag}{attrs}>{text}</{tag}>", tag = self.tag, attrs = attrs, text = self.text)
        } else {
            let cells: String = self
                .cells
                .iter()
                .map(|cell| format!("<td>{}</td>", cell))
                .collect();
            format!("<{tag}{attrs}>{cells}</{tag}>", tag = self.tag, attrs = attrs, cells = cells)
        }
    }
}

#[derive(Debug, Clone)]
pub struct FixtureState {
    pub name: String,
    pub url: String,
    pub title: String,
    /// Free text rendered before the elements.
    pub body_text: String,
    /// Raw HTML returned by `content()`; generated from the elements when unset.
    pub html: Option<String>,
    pub elements: Vec<FixtureElement>,
}

impl FixtureState {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            title: String::new(),
            body_text: String::new(),
            html: None,
            elements: Vec::new(),
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.body_text = text.to_string();
        self
    }

    pub fn html(mut self, html: &str) -> Self {
        self.html = Some(html.to_string());
        self
    }

    pub fn element(mut self, element: FixtureElement) -> Self {
        self.elements.push(element);
        self
    }

    fn visible_text(&self) -> String {
        let mut parts = Vec::new();
        if !self.body_text.is_empty() {
            parts.push(self.body_text.clone());
        }
        parts.extend(
            self.elements
                .iter()
                .filter(|element| element.visible)
                .map(|element| element.text.clone()),
        );
        parts.join("\n")
    }

    fn content(&self) -> String {
        if let Some(html) = &self.html {
            return html.clone();
        }
        let body: String = self.elements.iter().map(FixtureElement::to_html).collect();
        format!(
            "<html><head><title>{}</title></head><body><p>{}</p>{}</body></html>",
            self.title, self.body_text, body
        )
    }
}

/// How a click on a given element misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickFailure {
    /// Native click fails, the script fallback works.
    Native,
    /// Both the native click and the script fallback fail.
    Always,
}

#[derive(Debug)]
struct Inner {
    states: Vec<FixtureState>,
    current: usize,
    clicks: Vec<String>,
    screenshots: Vec<PathBuf>,
    failures: HashMap<String, ClickFailure>,
    never_idle: bool,
    navigation_error: bool,
}

/// Scripted, deterministic [`PageController`].
#[derive(Debug)]
pub struct ScriptedPage {
    inner: Mutex<Inner>,
}

impl ScriptedPage {
    /// The first state is the one shown initially.
    pub fn new(states: Vec<FixtureState>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                states,
                current: 0,
                clicks: Vec::new(),
                screenshots: Vec::new(),
                failures: HashMap::new(),
                never_idle: false,
                navigation_error: false,
            }),
        }
    }

    pub fn single(state: FixtureState) -> Self {
        Self::new(vec![state])
    }

    /// Make clicks on the element whose text is `text` fail.
    pub fn fail_click(self, text: &str, failure: ClickFailure) -> Self {
        self.inner
            .lock()
            .failures
            .insert(text.to_lowercase(), failure);
        self
    }

    /// Network idle is never reached.
    pub fn never_idle(self) -> Self {
        self.inner.lock().never_idle = true;
        self
    }

    pub fn fail_navigation(self) -> Self {
        self.inner.lock().navigation_error = true;
        self
    }

    /// Texts of the elements clicked so far.
    pub fn clicks(&self) -> Vec<String> {
        self.inner.lock().clicks.clone()
    }

    pub fn screenshots(&self) -> Vec<PathBuf> {
        self.inner.lock().screenshots.clone()
    }

    pub fn current_state(&self) -> String {
        let inner = self.inner.lock();
        inner.states[inner.current].name.clone()
    }

    fn with_state<T>(&self, f: impl FnOnce(&FixtureState) -> T) -> T {
        let inner = self.inner.lock();
        f(&inner.states[inner.current])
    }

    fn perform_click(&self, handle: &ElementHandle, via_script: bool) -> Result<(), PageError> {
        let mut inner = self.inner.lock();
        let (state_idx, element_idx) =
            parse_handle(&handle.0).ok_or_else(|| PageError::ElementDetached(handle.0.clone()))?;
        if state_idx != inner.current {
            return Err(PageError::ElementDetached(handle.0.clone()));
        }
        let element = inner.states[state_idx]
            .elements
            .get(element_idx)
            .cloned()
            .ok_or_else(|| PageError::ElementDetached(handle.0.clone()))?;

        match inner.failures.get(&element.text.to_lowercase()) {
            Some(ClickFailure::Always) => {
                return Err(PageError::Cdp("click intercepted by overlay".to_string()))
            }
            Some(ClickFailure::Native) if !via_script => {
                return Err(PageError::Cdp("element is not clickable at point".to_string()))
            }
            _ => {}
        }

        inner.clicks.push(element.text.clone());
        if let Some(target) = &element.on_click {
            if let Some(next) = inner.states.iter().position(|state| &state.name == target) {
                inner.current = next;
            }
        }
        Ok(())
    }
}

fn parse_handle(handle: &str) -> Option<(usize, usize)> {
    let rest = handle.strip_prefix('s')?;
    let (state, element) = rest.split_once("-e")?;
    Some((state.parse().ok()?, element.parse().ok()?))
}

fn snapshot(state_idx: usize, element_idx: usize, element: &FixtureElement) -> ElementSnapshot {
    ElementSnapshot {
        handle: ElementHandle(format!("s{}-e{}", state_idx, element_idx)),
        tag: element.tag.clone(),
        text: normalize_text(&element.text),
        attributes: element.attributes.clone(),
        cells: element.cells.iter().map(|cell| normalize_text(cell)).collect(),
        visible: element.visible,
        enabled: element.enabled,
    }
}

#[async_trait]
impl PageController for ScriptedPage {
    async fn goto(&self, url: &str, _timeout: Duration) -> Result<(), PageError> {
        let mut inner = self.inner.lock();
        if inner.navigation_error {
            return Err(PageError::Navigation(format!("net::ERR_CONNECTION_RESET at {}", url)));
        }
        if let Some(idx) = inner.states.iter().position(|state| state.url == url) {
            inner.current = idx;
        }
        Ok(())
    }

    async fn wait_for_load_state(
        &self,
        state: LoadState,
        timeout: Duration,
    ) -> Result<(), PageError> {
        if state == LoadState::NetworkIdle && self.inner.lock().never_idle {
            return Err(PageError::timeout(
                "wait_for_load_state(networkidle)",
                timeout.as_millis() as u64,
            ));
        }
        Ok(())
    }

    async fn wait_for_timeout(&self, _duration: Duration) {
        tokio::task::yield_now().await;
    }

    async fn url(&self) -> Result<String, PageError> {
        Ok(self.with_state(|state| state.url.clone()))
    }

    async fn title(&self) -> Result<String, PageError> {
        Ok(self.with_state(|state| state.title.clone()))
    }

    async fn content(&self) -> Result<String, PageError> {
        Ok(self.with_state(FixtureState::content))
    }

    async fn visible_text(&self) -> Result<String, PageError> {
        Ok(self.with_state(FixtureState::visible_text))
    }

    async fn query_all(&self, selector: &Selector) -> Result<Vec<ElementSnapshot>, PageError> {
        let inner = self.inner.lock();
        let state_idx = inner.current;
        let state = &inner.states[state_idx];
        let css = match selector {
            Selector::Css { css } => Some(parse_selector_list(css)?),
            _ => None,
        };

        let mut found = Vec::new();
        for (idx, element) in state.elements.iter().enumerate() {
            let hit = match selector {
                Selector::Css { .. } => css
                    .as_ref()
                    .map(|list| list.iter().any(|compound| compound.matches(element)))
                    .unwrap_or(false),
                Selector::TextPattern { .. } | Selector::TextExact { .. } => {
                    selector.matches_text(&element.text)?
                }
                Selector::AttributeContains { prefix, needle } => {
                    let prefix = prefix.to_lowercase();
                    let needle = needle.to_lowercase();
                    element.attributes.iter().any(|(name, value)| {
                        name.starts_with(&prefix)
                            && (name.contains(&needle) || value.to_lowercase().contains(&needle))
                    })
                }
            };
            if hit {
                found.push(snapshot(state_idx, idx, element));
            }
        }
        Ok(found)
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), PageError> {
        self.perform_click(element, false)
    }

    async fn evaluate(&self, script: &str, arg: Value) -> Result<Value, PageError> {
        if script == scripts::CLICK_BY_HANDLE {
            let handle = arg
                .get("handle")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            return self
                .perform_click(&ElementHandle(handle), true)
                .map(|_| Value::Bool(true))
                .map_err(|err| PageError::Script(err.to_string()));
        }
        if script == scripts::VISIBLE_TEXT {
            return Ok(Value::String(self.with_state(FixtureState::visible_text)));
        }
        Err(PageError::Script("script not supported by the fixture page".to_string()))
    }

    async fn screenshot(&self, path: &Path, _full_page: bool) -> Result<(), PageError> {
        std::fs::write(path, b"fixture-screenshot").map_err(|err| PageError::Io(err.to_string()))?;
        self.inner.lock().screenshots.push(path.to_path_buf());
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Compound {
    tag: Option<String>,
    ids: Vec<String>,
    classes: Vec<String>,
    attrs: Vec<AttrTest>,
}

#[derive(Debug)]
struct AttrTest {
    name: String,
    op: Option<(String, String)>,
}

impl Compound {
    fn matches(&self, element: &FixtureElement) -> bool {
        if let Some(tag) = &self.tag {
            if tag != "*" && tag != &element.tag {
                return false;
            }
        }
        let classes: Vec<&str> = element
            .attributes
            .get("class")
            .map(|value| value.split_whitespace().collect())
            .unwrap_or_default();
        if !self.classes.iter().all(|class| classes.contains(&class.as_str())) {
            return false;
        }
        if !self
            .ids
            .iter()
            .all(|id| element.attributes.get("id") == Some(id))
        {
            return false;
        }
        self.attrs.iter().all(|test| {
            let Some(actual) = element.attributes.get(&test.name) else {
                return false;
            };
            match &test.op {
                None => true,
                Some((op, expected)) => match op.as_str() {
                    "=" => actual == expected,
                    "*=" => actual.contains(expected.as_str()),
                    "^=" => actual.starts_with(expected.as_str()),
                    "$=" => actual.ends_with(expected.as_str()),
                    "~=" => actual.split_whitespace().any(|word| word == expected),
                    _ => false,
                },
            }
        })
    }
}

fn parse_selector_list(css: &str) -> Result<Vec<Compound>, PageError> {
    css.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|complex| {
            let last = complex
                .rsplit(|c: char| c.is_whitespace() || c == '>' || c == '+' || c == '~')
                .find(|part| !part.is_empty())
                .unwrap_or(complex);
            parse_compound(last).map_err(|reason| PageError::InvalidSelector {
                selector: css.to_string(),
                reason,
            })
        })
        .collect()
}

fn parse_compound(input: &str) -> Result<Compound, String> {
    let mut compound = Compound::default();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    let read_ident = |start: usize| -> (String, usize) {
        let mut end = start;
        while end < chars.len()
            && (chars[end].is_alphanumeric() || chars[end] == '-' || chars[end] == '_' || chars[end] == '*')
        {
            end += 1;
        }
        (chars[start..end].iter().collect(), end)
    };

    while i < chars.len() {
        match chars[i] {
            '.' => {
                let (ident, end) = read_ident(i + 1);
                compound.classes.push(ident);
                i = end;
            }
            '#' => {
                let (ident, end) = read_ident(i + 1);
                compound.ids.push(ident);
                i = end;
            }
            '[' => {
                let close = chars[i..]
                    .iter()
                    .position(|c| *c == ']')
                    .map(|offset| i + offset)
                    .ok_or_else(|| "unterminated attribute selector".to_string())?;
                let body: String = chars[i + 1..close].iter().collect();
                compound.attrs.push(parse_attr(&body));
                i = close + 1;
            }
            ':' => {
                // Pseudo-classes are ignored.
                let (_, end) = read_ident(i + 1);
                i = end.max(i + 1);
            }
            _ => {
                let (ident, end) = read_ident(i);
                if ident.is_empty() {
                    return Err(format!("unexpected character '{}'", chars[i]));
                }
                compound.tag = Some(ident.to_ascii_lowercase());
                i = end;
            }
        }
    }
    Ok(compound)
}

fn parse_attr(body: &str) -> AttrTest {
    for op in ["*=", "^=", "$=", "~=", "="] {
        if let Some((name, value)) = body.split_once(op) {
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            return AttrTest {
                name: name.trim().to_ascii_lowercase(),
                op: Some((op.to_string(), value.to_string())),
            };
        }
    }
    AttrTest {
        name: body.trim().to_ascii_lowercase(),
        op: None,
    }
}
