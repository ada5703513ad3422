use std::fmt;

use rust_decimal::Decimal;

/// Which extraction heuristic produced an amount.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum AmountSource {
    FreePhrase,
    LabelledRow,
    AmountContainer,
    ProximityScan,
    PostClickSnippet,
}

impl AmountSource {
    pub fn name(&self) -> &'static str {
        match self {
            AmountSource::FreePhrase => "free-phrase",
            AmountSource::LabelledRow => "labelled-row",
            AmountSource::AmountContainer => "amount-container",
            AmountSource::ProximityScan => "proximity-scan",
            AmountSource::PostClickSnippet => "post-click-snippet",
        }
    }
}

/// A normalized monetary figure read from the invoice page.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonetaryAmount {
    /// Text the figure was parsed from, as rendered.
    pub raw_text: String,
    /// Value rounded to two decimal places.
    pub value: Decimal,
    /// ISO-like code (`EUR`, `USD`, `GBP`) when a symbol was present.
    pub currency: Option<String>,
    pub source: AmountSource,
}

impl MonetaryAmount {
    pub fn new(
        raw_text: impl Into<String>,
        value: Decimal,
        currency: Option<String>,
        source: AmountSource,
    ) -> Self {
        Self {
            raw_text: raw_text.into(),
            value: value.round_dp(2),
            currency,
            source,
        }
    }

    pub fn free(raw_text: impl Into<String>) -> Self {
        Self::new(raw_text, Decimal::new(0, 2), None, AmountSource::FreePhrase)
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }
}

impl fmt::Display for MonetaryAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.currency {
            Some(code) => write!(f, "{:.2} {}", self.value, code),
            None => write!(f, "{:.2}", self.value),
        }
    }
}
