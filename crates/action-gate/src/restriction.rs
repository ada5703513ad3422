//! Business-rule block messages.
//!
//! The portal refuses early renewals with a banner, a toast or a modal. The
//! detector checks, in order and stopping at the first hit: the whole visible
//! text, common alert/notification/modal containers, then headings.

use std::fmt;

use cdp_adapter::{PageController, Selector};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::GateError;

static RESTRICTION_PHRASES: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "renewal restricted",
        "you can only renew your free service",
        "renewal is not available",
        "renewal not available yet",
        "too early to renew",
        "renouvellement restreint",
        "renouvellement impossible",
        "renouvellement non disponible",
        "vous ne pouvez renouveler",
        "vous ne pouvez pas encore renouveler",
        "trop tôt pour renouveler",
        "verlängerung nicht möglich",
        "renovación restringida",
    ]
});

const ALERT_CONTAINERS: &str = ".alert, .notification, .toast, [role=alert], .modal, [role=dialog], .swal2-popup, .flash-message";
const HEADINGS: &str = "h1, h2, h3, h4";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceSource {
    VisibleText,
    AlertContainer,
    Heading,
}

impl EvidenceSource {
    pub fn name(&self) -> &'static str {
        match self {
            EvidenceSource::VisibleText => "visible_text",
            EvidenceSource::AlertContainer => "alert_container",
            EvidenceSource::Heading => "heading",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestrictionEvidence {
    pub source: EvidenceSource,
    pub phrase: String,
}

impl fmt::Display for RestrictionEvidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' in {}", self.phrase, self.source.name())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestrictionMatch {
    pub matched: bool,
    pub evidence: Option<RestrictionEvidence>,
}

impl RestrictionMatch {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn hit(source: EvidenceSource, phrase: impl Into<String>) -> Self {
        Self {
            matched: true,
            evidence: Some(RestrictionEvidence {
                source,
                phrase: phrase.into(),
            }),
        }
    }
}

/// Scans rendered content for renewal block messages.
#[derive(Debug, Clone)]
pub struct RestrictionDetector {
    phrases: Vec<String>,
}

impl Default for RestrictionDetector {
    fn default() -> Self {
        Self {
            phrases: RESTRICTION_PHRASES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl RestrictionDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add operator-supplied phrases to the built-in set.
    pub fn with_phrases<I, S>(mut self, extra: I) -> Result<Self, GateError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for phrase in extra {
            let phrase = normalize(phrase.as_ref());
            if phrase.is_empty() {
                return Err(GateError::InvalidPhrase("empty phrase".to_string()));
            }
            if !self.phrases.contains(&phrase) {
                self.phrases.push(phrase);
            }
        }
        Ok(self)
    }

    /// First phrase contained in `text`, compared case-insensitively.
    pub fn match_text(&self, text: &str) -> Option<&str> {
        let haystack = normalize(text);
        self.phrases
            .iter()
            .find(|phrase| haystack.contains(phrase.as_str()))
            .map(String::as_str)
    }

    pub async fn detect(&self, page: &dyn PageController) -> Result<RestrictionMatch, GateError> {
        let text = page.visible_text().await?;
        if let Some(phrase) = self.match_text(&text) {
            info!(phrase, source = "visible_text", "restriction message detected");
            return Ok(RestrictionMatch::hit(EvidenceSource::VisibleText, phrase));
        }

        for (source, css) in [
            (EvidenceSource::AlertContainer, ALERT_CONTAINERS),
            (EvidenceSource::Heading, HEADINGS),
        ] {
            let elements = page.query_all(&Selector::css(css)).await?;
            for element in elements {
                if let Some(phrase) = self.match_text(&element.text) {
                    info!(phrase, source = source.name(), element = %element.describe(), "restriction message detected");
                    return Ok(RestrictionMatch::hit(source, phrase));
                }
            }
        }

        debug!("no restriction message on page");
        Ok(RestrictionMatch::none())
    }
}

fn normalize(text: &str) -> String {
    cdp_adapter::selector::normalize_text(text).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_adapter::fixture::{FixtureElement, FixtureState, ScriptedPage};

    #[tokio::test]
    async fn visible_text_is_checked_first() {
        let page = ScriptedPage::single(
            FixtureState::new("manage", "https://portal.example/manage")
                .text("Renewal  Restricted: you may renew 1 day before expiry")
                .element(FixtureElement::new("div", "Renouvellement impossible").class("alert")),
        );
        let found = RestrictionDetector::new().detect(&page).await.unwrap();
        assert!(found.matched);
        let evidence = found.evidence.unwrap();
        assert_eq!(evidence.source, EvidenceSource::VisibleText);
        assert_eq!(evidence.phrase, "renewal restricted");
    }

    #[tokio::test]
    async fn hidden_toast_is_found_through_its_container() {
        // Toasts are often rendered off-screen, so they never reach innerText.
        let page = ScriptedPage::single(
            FixtureState::new("manage", "https://portal.example/manage").element(
                FixtureElement::new("div", "Vous ne pouvez renouveler qu'à J-1")
                    .class("toast")
                    .hidden(),
            ),
        );
        let found = RestrictionDetector::new().detect(&page).await.unwrap();
        assert_eq!(
            found.evidence.map(|e| e.source),
            Some(EvidenceSource::AlertContainer)
        );
    }

    #[test]
    fn clean_page_has_no_match() {
        let page = ScriptedPage::single(
            FixtureState::new("manage", "https://portal.example/manage")
                .element(FixtureElement::new("h2", "Your service"))
                .element(FixtureElement::button("Renew")),
        );
        let found = tokio_test::block_on(RestrictionDetector::new().detect(&page)).unwrap();
        assert_eq!(found, RestrictionMatch::none());
    }

    #[test]
    fn extra_phrases_are_normalized() {
        let detector = RestrictionDetector::new()
            .with_phrases(["  Renewal   LOCKED "])
            .unwrap();
        assert_eq!(detector.match_text("renewal locked until friday"), Some("renewal locked"));
        assert!(RestrictionDetector::new().with_phrases([" "]).is_err());
    }
}
