//! Monetary token recognition and normalization.
//!
//! Separator rules: when both `,` and `.` appear, the last one is the decimal
//! separator and the other groups thousands. A single `,` or `.` followed by
//! exactly three digits groups thousands, otherwise it is decimal. Repeated
//! ones group thousands. Spaces, non-breaking spaces and currency symbols are
//! stripped before parsing. More than two decimals is not an amount.

use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;

static MONEY_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)(?P<pre>€|\$|£|\beur\b|\busd\b|\bgbp\b)?\s?",
        r"(?P<num>\b\d{1,3}(?:[ \x{00A0}\x{202F}.,]\d{3})+(?:[.,]\d{1,2})?\b|\b\d+(?:[.,]\d{1,2})?\b)",
        r"(?:\s?(?P<post>€|\$|£|\beur\b|\busd\b|\bgbp\b))?",
    ))
    .expect("money token regex is valid")
});

static FREE_PHRASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(gratuit\w*|gratis|kostenlos|free of charge|no charge|sans frais)\b")
        .expect("free phrase regex is valid")
});

/// A bare "free" is accepted only where a value is expected.
static FREE_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(free|gratuite?|gratis|offert|kostenlos)\s*$").expect("free value regex is valid")
});

/// One monetary-looking token found in a text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoneyToken {
    pub raw: String,
    /// Byte range of `raw` in the scanned text.
    pub start: usize,
    pub end: usize,
    pub value: Decimal,
    pub currency: Option<String>,
    pub has_decimals: bool,
}

impl MoneyToken {
    /// Carries a currency or a decimal part, so it is not a bare count or year.
    pub fn is_monetary(&self) -> bool {
        self.currency.is_some() || self.has_decimals
    }
}

/// Map a symbol or code to an ISO-like currency code.
pub fn currency_code(symbol: &str) -> Option<String> {
    let code = match symbol.trim().to_ascii_lowercase().as_str() {
        "€" | "eur" => "EUR",
        "$" | "usd" => "USD",
        "£" | "gbp" => "GBP",
        _ => return None,
    };
    Some(code.to_string())
}

/// Digits and separators of `raw` turned into a canonical `1234.56` string.
pub fn canonical_number(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let commas = cleaned.matches(',').count();
    let dots = cleaned.matches('.').count();
    let canonical = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(comma), Some(dot)) => {
            let (decimal, grouping) = if comma > dot { (',', '.') } else { ('.', ',') };
            let decimal_count = if decimal == ',' { commas } else { dots };
            if decimal_count > 1 {
                return None;
            }
            cleaned.replace(grouping, "").replace(decimal, ".")
        }
        (Some(at), None) => single_kind(&cleaned, ',', at, commas),
        (None, Some(at)) => single_kind(&cleaned, '.', at, dots),
        (None, None) => cleaned,
    };
    let canonical = canonical.trim_matches('.').to_string();
    if canonical.is_empty() {
        return None;
    }
    match canonical.split_once('.') {
        Some((_, decimals)) if decimals.len() > 2 => None,
        _ => Some(canonical),
    }
}

/// Only one kind of separator: `1,234` and `1.234` group thousands, `12,5`
/// and `12.50` carry decimals.
fn single_kind(cleaned: &str, separator: char, last: usize, count: usize) -> String {
    let digits_after = cleaned.len() - last - 1;
    if count == 1 && digits_after != 3 {
        cleaned.replace(separator, ".")
    } else {
        cleaned.replace(separator, "")
    }
}

/// Digits glued to the token by `.`, `,`, `/`, `-` or `:`, as in dates and times.
fn embedded_in_larger_figure(text: &str, start: usize, end: usize) -> bool {
    const GLUE: [char; 5] = ['.', ',', '/', '-', ':'];
    let mut before = text[..start].chars().rev();
    let glued_before = matches!(
        (before.next(), before.next()),
        (Some(glue), Some(digit)) if GLUE.contains(&glue) && digit.is_ascii_digit()
    );
    let mut after = text[end..].chars();
    let glued_after = matches!(
        (after.next(), after.next()),
        (Some(glue), Some(digit)) if GLUE.contains(&glue) && digit.is_ascii_digit()
    );
    glued_before || glued_after
}

/// Parse a rendered amount such as `"1 234,56€"` or `"$12.50"`.
pub fn parse_amount(raw: &str) -> Option<(Decimal, Option<String>)> {
    let canonical = canonical_number(raw)?;
    let value = Decimal::from_str(&canonical).ok()?;
    Some((value, detect_currency(raw)))
}

fn detect_currency(raw: &str) -> Option<String> {
    if raw.contains('€') {
        return currency_code("€");
    }
    if raw.contains('£') {
        return currency_code("£");
    }
    if raw.contains('$') {
        return currency_code("$");
    }
    let lowered = raw.to_ascii_lowercase();
    ["eur", "usd", "gbp"]
        .iter()
        .find(|code| lowered.contains(*code))
        .and_then(|code| currency_code(code))
}

/// All monetary-looking tokens of `text`, in order.
pub fn find_money_tokens(text: &str) -> Vec<MoneyToken> {
    MONEY_TOKEN
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let num = caps.name("num")?;
            if embedded_in_larger_figure(text, num.start(), num.end()) {
                return None;
            }
            let canonical = canonical_number(num.as_str())?;
            let value = Decimal::from_str(&canonical).ok()?;
            let currency = caps
                .name("pre")
                .or_else(|| caps.name("post"))
                .and_then(|m| currency_code(m.as_str()));
            let raw = whole.as_str();
            let trimmed_start = whole.start() + (raw.len() - raw.trim_start().len());
            Some(MoneyToken {
                raw: raw.trim().to_string(),
                start: trimmed_start,
                end: trimmed_start + raw.trim().len(),
                value,
                currency,
                has_decimals: canonical.contains('.'),
            })
        })
        .collect()
}

/// Page-level "this costs nothing" phrase, if any.
pub fn free_phrase(text: &str) -> Option<String> {
    FREE_PHRASE
        .find(text)
        .map(|m| m.as_str().to_string())
}

/// A value cell that reads as free rather than as a number.
pub fn is_free_value(text: &str) -> bool {
    FREE_VALUE.is_match(text)
}
