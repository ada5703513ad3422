//! Core types for the selector cascade

use std::fmt;

use cdp_adapter::{ElementSnapshot, Selector};
use renew_core_types::StepName;
use serde::{Deserialize, Serialize};

/// Locator strategy enumeration
///
/// Strategies in fallback order:
/// - ConfigOverride: selector supplied by configuration
/// - DefaultPattern: built-in text regex for the step
/// - TextVariants: literal label variants, compared whole
/// - AttributePattern: partial `data-*` attribute match
/// - ContentScan: page-wide word scan over clickable elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocatorStrategy {
    ConfigOverride,
    DefaultPattern,
    TextVariants,
    AttributePattern,
    ContentScan,
}

impl LocatorStrategy {
    /// Get strategy name as string
    pub fn name(&self) -> &'static str {
        match self {
            LocatorStrategy::ConfigOverride => "config-override",
            LocatorStrategy::DefaultPattern => "default-pattern",
            LocatorStrategy::TextVariants => "text-variants",
            LocatorStrategy::AttributePattern => "attribute-pattern",
            LocatorStrategy::ContentScan => "content-scan",
        }
    }

    /// Get all strategies in fallback order
    pub fn fallback_chain() -> Vec<LocatorStrategy> {
        vec![
            LocatorStrategy::ConfigOverride,
            LocatorStrategy::DefaultPattern,
            LocatorStrategy::TextVariants,
            LocatorStrategy::AttributePattern,
            LocatorStrategy::ContentScan,
        ]
    }
}

/// Everything the cascade knows about one step.
#[derive(Debug, Clone)]
pub struct StepLocator {
    pub step: StepName,
    pub default_pattern: Selector,
    pub override_selector: Option<Selector>,
    pub text_variants: Vec<String>,
    pub attribute_needles: Vec<String>,
    pub scan_words: Vec<String>,
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

impl StepLocator {
    /// Built-in vocabulary for a step (French portal with English fallbacks).
    pub fn for_step(step: StepName) -> Self {
        match step {
            StepName::Renew => Self {
                step,
                default_pattern: Selector::text_pattern("Renouvel|renouvel|Renew"),
                override_selector: None,
                text_variants: owned(&[
                    "Renew",
                    "Renouveler",
                    "Renouvellement",
                    "Renew service",
                    "Renew now",
                    "Extend",
                ]),
                attribute_needles: owned(&["renew", "renouvel"]),
                scan_words: owned(&["renouvel", "renew"]),
            },
            StepName::CreateInvoice => Self {
                step,
                default_pattern: Selector::text_pattern("Créer une facture|Create Invoice"),
                override_selector: None,
                text_variants: owned(&[
                    "Create Invoice",
                    "Créer une facture",
                    "Créer la facture",
                    "Generate invoice",
                    "Générer la facture",
                ]),
                attribute_needles: owned(&["invoice", "facture"]),
                scan_words: owned(&["facture", "invoice"]),
            },
            StepName::Pay => Self {
                step,
                default_pattern: Selector::text_pattern("Payer|Pay"),
                override_selector: None,
                text_variants: owned(&["Pay", "Payer", "Pay now", "Payer maintenant", "Checkout"]),
                attribute_needles: owned(&["pay", "checkout"]),
                scan_words: owned(&["payer", "pay"]),
            },
        }
    }

    pub fn with_override(mut self, selector: Option<Selector>) -> Self {
        self.override_selector = selector;
        self
    }
}

/// Winning element plus how it was found.
#[derive(Debug, Clone)]
pub struct ResolutionResult {
    pub step: StepName,
    pub element: ElementSnapshot,
    pub strategy: LocatorStrategy,
    pub selector: Selector,
}

impl ResolutionResult {
    pub fn new(
        step: StepName,
        element: ElementSnapshot,
        strategy: LocatorStrategy,
        selector: Selector,
    ) -> Self {
        Self {
            step,
            element,
            strategy,
            selector,
        }
    }
}

/// Context attached to a not-found outcome.
///
/// `word_present` separates "the page never mentions the step" from "the word
/// is on the page but nothing clickable carries it"; operators read those two
/// signals very differently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotFoundDiagnostic {
    pub word_present: bool,
    pub matched_word: Option<String>,
    pub excerpt: Option<String>,
    pub strategies_tried: Vec<LocatorStrategy>,
}

impl NotFoundDiagnostic {
    pub fn signal(&self) -> &'static str {
        if self.word_present {
            "word_present_not_actionable"
        } else {
            "word_absent"
        }
    }
}

impl fmt::Display for NotFoundDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.signal())?;
        if let Some(word) = &self.matched_word {
            write!(f, " (word '{}')", word)?;
        }
        if let Some(excerpt) = &self.excerpt {
            write!(f, ": \"{}\"", excerpt)?;
        }
        Ok(())
    }
}
