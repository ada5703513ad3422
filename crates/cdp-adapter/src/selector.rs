//! Element selectors understood by every page controller.

use std::fmt;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::PageError;

/// How to find elements on a page.
///
/// Configuration overrides use a Playwright-like string form, see
/// [`Selector::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Selector {
    /// Plain CSS selector.
    Css { css: String },

    /// Regular expression tested against the element's normalized text.
    TextPattern {
        pattern: String,
        case_insensitive: bool,
    },

    /// Normalized text equal to `text`, ignoring case.
    TextExact { text: String },

    /// Any attribute whose name starts with `prefix` and whose name or value
    /// contains `needle` (case-insensitive).
    AttributeContains { prefix: String, needle: String },
}

impl Selector {
    pub fn css(css: impl Into<String>) -> Self {
        Selector::Css { css: css.into() }
    }

    pub fn text_pattern(pattern: impl Into<String>) -> Self {
        Selector::TextPattern {
            pattern: pattern.into(),
            case_insensitive: true,
        }
    }

    pub fn text_exact(text: impl Into<String>) -> Self {
        Selector::TextExact { text: text.into() }
    }

    pub fn data_attribute(needle: impl Into<String>) -> Self {
        Selector::AttributeContains {
            prefix: "data-".to_string(),
            needle: needle.into(),
        }
    }

    /// Parse an override string.
    ///
    /// * `text=/Renew|Renouvel/i` → [`Selector::TextPattern`]
    /// * `text=Create Invoice` or `text="Create Invoice"` → [`Selector::TextExact`]
    /// * `css=button.renew` or anything else → [`Selector::Css`]
    pub fn parse(raw: &str) -> Result<Self, PageError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PageError::InvalidSelector {
                selector: raw.to_string(),
                reason: "empty selector".to_string(),
            });
        }

        if let Some(body) = trimmed.strip_prefix("text=") {
            let body = body.trim();
            if let Some(rest) = body.strip_prefix('/') {
                let Some(end) = rest.rfind('/') else {
                    return Err(PageError::InvalidSelector {
                        selector: raw.to_string(),
                        reason: "unterminated text pattern".to_string(),
                    });
                };
                let pattern = &rest[..end];
                let flags = &rest[end + 1..];
                let selector = Selector::TextPattern {
                    pattern: pattern.to_string(),
                    case_insensitive: flags.contains('i'),
                };
                selector.compile_pattern()?;
                return Ok(selector);
            }
            let text = body.trim_matches(|c| c == '"' || c == '\'');
            return Ok(Selector::text_exact(text));
        }

        if let Some(css) = trimmed.strip_prefix("css=") {
            return Ok(Selector::css(css.trim()));
        }

        Ok(Selector::css(trimmed))
    }

    /// Compiled regex for text patterns, `None` for other kinds.
    pub fn compile_pattern(&self) -> Result<Option<Regex>, PageError> {
        match self {
            Selector::TextPattern {
                pattern,
                case_insensitive,
            } => RegexBuilder::new(pattern)
                .case_insensitive(*case_insensitive)
                .build()
                .map(Some)
                .map_err(|err| PageError::InvalidSelector {
                    selector: self.to_string(),
                    reason: err.to_string(),
                }),
            _ => Ok(None),
        }
    }

    /// Whether a normalized text satisfies a text selector.
    ///
    /// Always false for CSS and attribute selectors.
    pub fn matches_text(&self, text: &str) -> Result<bool, PageError> {
        let normalized = normalize_text(text);
        match self {
            Selector::TextPattern { .. } => Ok(self
                .compile_pattern()?
                .map(|re| re.is_match(&normalized))
                .unwrap_or(false)),
            Selector::TextExact { text: expected } => {
                Ok(normalized.to_lowercase() == normalize_text(expected).to_lowercase())
            }
            _ => Ok(false),
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(
            self,
            Selector::TextPattern { .. } | Selector::TextExact { .. }
        )
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Css { css } => write!(f, "css={}", css),
            Selector::TextPattern {
                pattern,
                case_insensitive,
            } => write!(
                f,
                "text=/{}/{}",
                pattern,
                if *case_insensitive { "i" } else { "" }
            ),
            Selector::TextExact { text } => write!(f, "text=\"{}\"", text),
            Selector::AttributeContains { prefix, needle } => {
                write!(f, "[{}*~={}]", prefix, needle)
            }
        }
    }
}

/// Collapse whitespace runs (including non-breaking spaces) and trim.
pub fn normalize_text(text: &str) -> String {
    text.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_pattern_with_flags() {
        let selector = Selector::parse("text=/Renouvel|Renew/i").unwrap();
        assert_eq!(
            selector,
            Selector::TextPattern {
                pattern: "Renouvel|Renew".to_string(),
                case_insensitive: true,
            }
        );
        assert!(selector.matches_text("  RENEW  now").unwrap());
        assert!(!selector.matches_text("Pay").unwrap());
    }

    #[test]
    fn parses_exact_and_css_forms() {
        assert_eq!(
            Selector::parse("text=\"Create Invoice\"").unwrap(),
            Selector::text_exact("Create Invoice")
        );
        assert_eq!(
            Selector::parse("css=button.pay").unwrap(),
            Selector::css("button.pay")
        );
        assert_eq!(Selector::parse("#renew-btn").unwrap(), Selector::css("#renew-btn"));
    }

    #[test]
    fn rejects_bad_patterns() {
        assert!(Selector::parse("").is_err());
        assert!(Selector::parse("text=/unterminated").is_err());
        assert!(Selector::parse("text=/(/i").is_err());
    }

    #[test]
    fn exact_match_ignores_case_and_spacing() {
        let selector = Selector::text_exact("Create Invoice");
        assert!(selector.matches_text("create\u{a0} invoice").unwrap());
        assert!(!selector.matches_text("Create Invoice now").unwrap());
    }

    #[test]
    fn display_round_trips_text_pattern() {
        let selector = Selector::text_pattern("Payer|Pay");
        let reparsed = Selector::parse(&selector.to_string()).unwrap();
        assert_eq!(selector, reparsed);
    }
}
