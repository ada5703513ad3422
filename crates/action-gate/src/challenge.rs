//! Bot-verification interstitials.
//!
//! A challenge makes the underlying page unusable to automation. It is a
//! different signal from a business restriction and is never bypassable.

use cdp_adapter::PageController;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::GateError;

static CHALLENGE_FINGERPRINTS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "security verification",
        "cf_chl_prog",
        "cf-challenge",
        "challenges.cloudflare.com",
        "turnstile",
        "checking your browser",
        "verify you are human",
        "verify you're a human",
    ]
});

/// Matched only against the title; too common in ordinary markup otherwise.
static TITLE_FINGERPRINTS: Lazy<Vec<&'static str>> =
    Lazy::new(|| vec!["just a moment", "attention required"]);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeMatch {
    pub fingerprint: String,
    pub in_title: bool,
}

/// Returns the fingerprint that identifies a challenge page, if any.
pub fn detect_challenge(title: &str, html: &str) -> Option<ChallengeMatch> {
    let title_lower = title.to_lowercase();
    let html_lower = html.to_lowercase();

    if let Some(fingerprint) = TITLE_FINGERPRINTS
        .iter()
        .chain(CHALLENGE_FINGERPRINTS.iter())
        .find(|fingerprint| title_lower.contains(*fingerprint))
    {
        return Some(ChallengeMatch {
            fingerprint: fingerprint.to_string(),
            in_title: true,
        });
    }

    CHALLENGE_FINGERPRINTS
        .iter()
        .find(|fingerprint| html_lower.contains(*fingerprint))
        .map(|fingerprint| ChallengeMatch {
            fingerprint: fingerprint.to_string(),
            in_title: false,
        })
}

#[derive(Debug, Clone, Default)]
pub struct ChallengeDetector;

impl ChallengeDetector {
    pub fn new() -> Self {
        Self
    }

    pub async fn detect(
        &self,
        page: &dyn PageController,
    ) -> Result<Option<ChallengeMatch>, GateError> {
        let title = page.title().await?;
        let html = page.content().await?;
        let found = detect_challenge(&title, &html);
        match &found {
            Some(hit) => warn!(fingerprint = %hit.fingerprint, in_title = hit.in_title, "bot verification challenge detected"),
            None => debug!("no challenge fingerprint on page"),
        }
        Ok(found)
    }
}
