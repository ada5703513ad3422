//! Selector resolver with fallback chain orchestration

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use cdp_adapter::{PageController, Selector};
use renew_core_types::StepName;
use tracing::{debug, info, warn};

use crate::{errors::LocatorError, strategies::*, types::*};

/// Maps a step to an actionable element by walking the strategy cascade.
///
/// The cascade is exhaustive per call: each strategy is tried once, bounded by
/// `probe_timeout`, and the first hit wins.
pub struct SelectorResolver {
    overrides: HashMap<StepName, Selector>,
    probe_timeout: Duration,
    strategies: Vec<Arc<dyn Strategy>>,
}

impl SelectorResolver {
    pub fn new(probe_timeout: Duration) -> Self {
        Self {
            overrides: HashMap::new(),
            probe_timeout,
            strategies: LocatorStrategy::fallback_chain()
                .into_iter()
                .map(strategy_for)
                .collect(),
        }
    }

    /// Parse `step → selector string` overrides from configuration.
    ///
    /// Unknown step keys are ignored with a warning; malformed selectors are
    /// rejected so a typo does not silently fall through to the defaults.
    pub fn with_config_overrides(
        mut self,
        raw: &BTreeMap<String, String>,
    ) -> Result<Self, LocatorError> {
        for (key, value) in raw {
            let Some(step) = StepName::from_key(key) else {
                warn!(key = %key, "ignoring selector override for unknown step");
                continue;
            };
            if value.trim().is_empty() {
                continue;
            }
            let selector = Selector::parse(value).map_err(|err| LocatorError::InvalidOverride {
                step: key.clone(),
                reason: err.to_string(),
            })?;
            debug!(step = %step, selector = %selector, "selector override configured");
            self.overrides.insert(step, selector);
        }
        Ok(self)
    }

    pub fn with_override(mut self, step: StepName, selector: Selector) -> Self {
        self.overrides.insert(step, selector);
        self
    }

    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    pub fn locator(&self, step: StepName) -> StepLocator {
        StepLocator::for_step(step).with_override(self.overrides.get(&step).cloned())
    }

    pub async fn resolve(
        &self,
        step: StepName,
        page: &dyn PageController,
    ) -> Result<ResolutionResult, LocatorError> {
        let locator = self.locator(step);
        info!(step = %step, "resolving element");

        let mut diagnostic = NotFoundDiagnostic::default();
        for strategy in &self.strategies {
            let strategy_type = strategy.strategy_type();
            debug!(step = %step, strategy = strategy.name(), "trying strategy");

            match strategy.attempt(&locator, page, self.probe_timeout).await {
                Ok(StrategyOutcome::Found(element, selector)) => {
                    info!(
                        step = %step,
                        strategy = strategy.name(),
                        element = %element.describe(),
                        "resolved element"
                    );
                    return Ok(ResolutionResult::new(step, element, strategy_type, selector));
                }
                Ok(StrategyOutcome::NotApplicable) => continue,
                Ok(StrategyOutcome::Missed) => {
                    debug!(step = %step, strategy = strategy.name(), "strategy found no actionable element");
                }
                Ok(StrategyOutcome::Diagnosed(found)) => {
                    let tried = std::mem::take(&mut diagnostic.strategies_tried);
                    diagnostic = found;
                    diagnostic.strategies_tried = tried;
                }
                Err(err) => {
                    warn!(step = %step, strategy = strategy.name(), %err, "strategy failed");
                }
            }
            diagnostic.strategies_tried.push(strategy_type);
        }

        warn!(step = %step, signal = diagnostic.signal(), "all strategies exhausted");
        Err(LocatorError::ElementNotFound { step, diagnostic })
    }
}

fn strategy_for(strategy_type: LocatorStrategy) -> Arc<dyn Strategy> {
    match strategy_type {
        LocatorStrategy::ConfigOverride => Arc::new(ConfigOverrideStrategy),
        LocatorStrategy::DefaultPattern => Arc::new(DefaultPatternStrategy),
        LocatorStrategy::TextVariants => Arc::new(TextVariantsStrategy),
        LocatorStrategy::AttributePattern => Arc::new(AttributePatternStrategy),
        LocatorStrategy::ContentScan => Arc::new(ContentScanStrategy),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_adapter::fixture::{FixtureElement, FixtureState, ScriptedPage};

    const PROBE: Duration = Duration::from_millis(20);

    fn page_with(elements: Vec<FixtureElement>, text: &str) -> ScriptedPage {
        let mut state = FixtureState::new("manage", "https://portal.example/service/7/manage").text(text);
        for element in elements {
            state = state.element(element);
        }
        ScriptedPage::single(state)
    }

    #[tokio::test]
    async fn default_pattern_wins_when_present() {
        let page = page_with(vec![FixtureElement::button("Renouveler le service")], "");
        let resolver = SelectorResolver::new(PROBE);
        let result = resolver.resolve(StepName::Renew, &page).await.unwrap();
        assert_eq!(result.strategy, LocatorStrategy::DefaultPattern);
        assert_eq!(result.element.text, "Renouveler le service");
    }

    #[tokio::test]
    async fn config_override_takes_priority() {
        let page = page_with(
            vec![
                FixtureElement::button("Renew"),
                FixtureElement::button("Extend plan").attr("id", "extend"),
            ],
            "",
        );
        let mut raw = BTreeMap::new();
        raw.insert("renew".to_string(), "css=#extend".to_string());
        let resolver = SelectorResolver::new(PROBE)
            .with_config_overrides(&raw)
            .unwrap();
        let result = resolver.resolve(StepName::Renew, &page).await.unwrap();
        assert_eq!(result.strategy, LocatorStrategy::ConfigOverride);
        assert_eq!(result.element.text, "Extend plan");
    }

    #[tokio::test]
    async fn third_strategy_resolves_when_only_it_matches() {
        // "Checkout" is only a literal variant; the default pattern needs "pay".
        let page = page_with(vec![FixtureElement::button("Checkout")], "Invoice #42");
        let resolver = SelectorResolver::new(PROBE);
        let result = resolver.resolve(StepName::Pay, &page).await.unwrap();
        assert_eq!(result.strategy, LocatorStrategy::TextVariants);
        assert_eq!(result.element.text, "Checkout");
    }

    #[tokio::test]
    async fn attribute_pattern_finds_icon_buttons() {
        let page = page_with(
            vec![FixtureElement::button("→").attr("data-action", "invoice-create")],
            "",
        );
        let resolver = SelectorResolver::new(PROBE);
        let result = resolver
            .resolve(StepName::CreateInvoice, &page)
            .await
            .unwrap();
        assert_eq!(result.strategy, LocatorStrategy::AttributePattern);
    }

    #[tokio::test]
    async fn not_found_reports_word_present_without_actionable_element() {
        let page = page_with(
            vec![FixtureElement::new("p", "Renew is unavailable for this plan")],
            "",
        );
        let resolver = SelectorResolver::new(PROBE);
        let err = resolver.resolve(StepName::Renew, &page).await.unwrap_err();
        let diagnostic = err.diagnostic().unwrap();
        assert!(diagnostic.word_present);
        assert_eq!(diagnostic.signal(), "word_present_not_actionable");
        assert!(diagnostic.excerpt.as_deref().unwrap().contains("Renew is unavailable"));
        // No override configured, so that strategy was never tried.
        assert_eq!(diagnostic.strategies_tried.len(), 4);
        assert!(!diagnostic
            .strategies_tried
            .contains(&LocatorStrategy::ConfigOverride));
    }

    #[tokio::test]
    async fn not_found_reports_word_absent() {
        let page = page_with(vec![FixtureElement::button("Logout")], "Dashboard");
        let resolver = SelectorResolver::new(PROBE);
        let err = resolver.resolve(StepName::Renew, &page).await.unwrap_err();
        let diagnostic = err.diagnostic().unwrap();
        assert!(!diagnostic.word_present);
        assert_eq!(diagnostic.signal(), "word_absent");
    }

    #[tokio::test]
    async fn hidden_matches_are_not_actionable() {
        let page = page_with(vec![FixtureElement::button("Renew").hidden()], "");
        let resolver = SelectorResolver::new(PROBE);
        assert!(resolver.resolve(StepName::Renew, &page).await.is_err());
    }

    #[test]
    fn malformed_override_is_rejected() {
        let mut raw = BTreeMap::new();
        raw.insert("pay".to_string(), "text=/(/".to_string());
        let result = SelectorResolver::new(PROBE).with_config_overrides(&raw);
        assert!(matches!(result, Err(LocatorError::InvalidOverride { .. })));
    }
}
