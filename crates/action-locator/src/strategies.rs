//! Element resolution strategies
//!
//! Each strategy reports success or a miss as a value; the resolver walks
//! them in [`LocatorStrategy::fallback_chain`] order.

use std::time::Duration;

use async_trait::async_trait;
use cdp_adapter::{wait_for_match, ElementSnapshot, PageController, Selector};
use tracing::debug;

use crate::{errors::LocatorError, types::*};

/// Clickable elements the content scan inspects.
const SCAN_CANDIDATES: &str =
    "button, a, [role=button], [role=link], input[type=submit], input[type=button], [onclick], .btn";

/// Characters of context kept on each side of a scanned word.
const EXCERPT_RADIUS: usize = 60;

/// What a single strategy attempt produced.
#[derive(Debug, Clone)]
pub enum StrategyOutcome {
    Found(ElementSnapshot, Selector),
    Missed,
    /// Strategy has nothing to try for this step.
    NotApplicable,
    /// Miss, with page context for the operator.
    Diagnosed(NotFoundDiagnostic),
}

/// Strategy trait for element resolution
#[async_trait]
pub trait Strategy: Send + Sync {
    async fn attempt(
        &self,
        locator: &StepLocator,
        page: &dyn PageController,
        timeout: Duration,
    ) -> Result<StrategyOutcome, LocatorError>;

    fn strategy_type(&self) -> LocatorStrategy;

    fn name(&self) -> &'static str {
        self.strategy_type().name()
    }
}

async fn first_actionable(
    page: &dyn PageController,
    selector: &Selector,
    timeout: Duration,
) -> Result<StrategyOutcome, LocatorError> {
    let found = wait_for_match(page, selector, timeout, ElementSnapshot::is_actionable).await?;
    Ok(match found {
        Some(element) => StrategyOutcome::Found(element, selector.clone()),
        None => StrategyOutcome::Missed,
    })
}

/// Selector supplied by configuration.
pub struct ConfigOverrideStrategy;

#[async_trait]
impl Strategy for ConfigOverrideStrategy {
    async fn attempt(
        &self,
        locator: &StepLocator,
        page: &dyn PageController,
        timeout: Duration,
    ) -> Result<StrategyOutcome, LocatorError> {
        match &locator.override_selector {
            Some(selector) => first_actionable(page, selector, timeout).await,
            None => Ok(StrategyOutcome::NotApplicable),
        }
    }

    fn strategy_type(&self) -> LocatorStrategy {
        LocatorStrategy::ConfigOverride
    }
}

/// Built-in text regex for the step.
pub struct DefaultPatternStrategy;

#[async_trait]
impl Strategy for DefaultPatternStrategy {
    async fn attempt(
        &self,
        locator: &StepLocator,
        page: &dyn PageController,
        timeout: Duration,
    ) -> Result<StrategyOutcome, LocatorError> {
        first_actionable(page, &locator.default_pattern, timeout).await
    }

    fn strategy_type(&self) -> LocatorStrategy {
        LocatorStrategy::DefaultPattern
    }
}

/// Literal label variants, each compared against the whole element text.
pub struct TextVariantsStrategy;

impl TextVariantsStrategy {
    /// One anchored alternation so a single bounded wait covers every variant.
    pub fn selector(locator: &StepLocator) -> Option<Selector> {
        if locator.text_variants.is_empty() {
            return None;
        }
        let alternation = locator
            .text_variants
            .iter()
            .map(|variant| regex::escape(variant.trim()))
            .collect::<Vec<_>>()
            .join("|");
        Some(Selector::text_pattern(format!("^(?:{})$", alternation)))
    }
}

#[async_trait]
impl Strategy for TextVariantsStrategy {
    async fn attempt(
        &self,
        locator: &StepLocator,
        page: &dyn PageController,
        timeout: Duration,
    ) -> Result<StrategyOutcome, LocatorError> {
        match Self::selector(locator) {
            Some(selector) => first_actionable(page, &selector, timeout).await,
            None => Ok(StrategyOutcome::NotApplicable),
        }
    }

    fn strategy_type(&self) -> LocatorStrategy {
        LocatorStrategy::TextVariants
    }
}

/// Partial `data-*` attribute match.
pub struct AttributePatternStrategy;

#[async_trait]
impl Strategy for AttributePatternStrategy {
    async fn attempt(
        &self,
        locator: &StepLocator,
        page: &dyn PageController,
        timeout: Duration,
    ) -> Result<StrategyOutcome, LocatorError> {
        if locator.attribute_needles.is_empty() {
            return Ok(StrategyOutcome::NotApplicable);
        }
        // The strategy as a whole stays within one probe timeout.
        let share = timeout / locator.attribute_needles.len() as u32;
        for needle in &locator.attribute_needles {
            let selector = Selector::data_attribute(needle.clone());
            if let StrategyOutcome::Found(element, selector) =
                first_actionable(page, &selector, share).await?
            {
                return Ok(StrategyOutcome::Found(element, selector));
            }
        }
        Ok(StrategyOutcome::Missed)
    }

    fn strategy_type(&self) -> LocatorStrategy {
        LocatorStrategy::AttributePattern
    }
}

/// Page-wide scan: reads the visible text and looks for a clickable element
/// whose text, `value`, `aria-label` or `title` carries one of the step words.
pub struct ContentScanStrategy;

impl ContentScanStrategy {
    fn carries_word(element: &ElementSnapshot, word: &str) -> bool {
        let mut haystacks = vec![element.text.as_str()];
        for attribute in ["value", "aria-label", "title"] {
            if let Some(value) = element.attribute(attribute) {
                haystacks.push(value);
            }
        }
        haystacks
            .iter()
            .any(|haystack| haystack.to_lowercase().contains(word))
    }
}

#[async_trait]
impl Strategy for ContentScanStrategy {
    async fn attempt(
        &self,
        locator: &StepLocator,
        page: &dyn PageController,
        _timeout: Duration,
    ) -> Result<StrategyOutcome, LocatorError> {
        let text = page.visible_text().await?;
        let lowered = text.to_lowercase();

        let Some((word, position)) = locator.scan_words.iter().find_map(|word| {
            let word = word.to_lowercase();
            lowered.find(&word).map(|position| (word, position))
        }) else {
            debug!(step = %locator.step, "scan words absent from page text");
            return Ok(StrategyOutcome::Diagnosed(NotFoundDiagnostic {
                word_present: false,
                excerpt: Some(leading_excerpt(&text)),
                ..NotFoundDiagnostic::default()
            }));
        };

        let candidates = page.query_all(&Selector::css(SCAN_CANDIDATES)).await?;
        if let Some(element) = candidates
            .into_iter()
            .find(|element| element.is_actionable() && Self::carries_word(element, &word))
        {
            return Ok(StrategyOutcome::Found(element, Selector::css(SCAN_CANDIDATES)));
        }

        Ok(StrategyOutcome::Diagnosed(NotFoundDiagnostic {
            word_present: true,
            excerpt: Some(excerpt_around(&lowered, &text, position, word.len())),
            matched_word: Some(word),
            ..NotFoundDiagnostic::default()
        }))
    }

    fn strategy_type(&self) -> LocatorStrategy {
        LocatorStrategy::ContentScan
    }
}

fn leading_excerpt(text: &str) -> String {
    let collapsed = cdp_adapter::selector::normalize_text(text);
    collapsed.chars().take(EXCERPT_RADIUS * 2).collect()
}

/// Window of `text` around a byte range found in its lowercase copy.
///
/// Lowercasing can shift byte offsets for some scripts, so the window is
/// computed in characters on the lowercase copy and mapped back by index.
fn excerpt_around(lowered: &str, text: &str, position: usize, len: usize) -> String {
    let start_char = lowered[..position].chars().count();
    let word_chars = lowered[position..position + len].chars().count();
    let from = start_char.saturating_sub(EXCERPT_RADIUS);
    let to = start_char + word_chars + EXCERPT_RADIUS;
    let source: Vec<char> = if lowered.chars().count() == text.chars().count() {
        text.chars().collect()
    } else {
        lowered.chars().collect()
    };
    let window: String = source[from.min(source.len())..to.min(source.len())]
        .iter()
        .collect();
    cdp_adapter::selector::normalize_text(&window)
}
