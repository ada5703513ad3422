//! Invoice amount extraction.

use cdp_adapter::{PageController, Selector};
use renew_core_types::{AmountSource, MonetaryAmount};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::errors::ExtractError;
use crate::normalize::{find_money_tokens, free_phrase, is_free_value, parse_amount, MoneyToken};
use crate::vocab::{label_positions, label_rank, MAX_LABEL_LEN};

const ROW_CONTAINERS: &str =
    "tr, dl, li, .row, .line, .invoice-line, .summary-row, .total-row, .d-flex, .flex";

const AMOUNT_CONTAINERS: &str = "[class*=amount], [class*=total], [class*=price], [class*=montant], [class*=prix], [id*=amount], [id*=total]";

/// Longest container text considered; longer ones are sections, not amounts.
const MAX_CONTAINER_TEXT: usize = 120;

/// Characters between a label and a figure for the proximity scan.
pub const DEFAULT_PROXIMITY_WINDOW: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmountExtraction {
    Resolved(MonetaryAmount),
    /// Nothing usable; never treated as zero.
    Unresolved { tried: Vec<AmountSource> },
}

impl AmountExtraction {
    pub fn amount(&self) -> Option<&MonetaryAmount> {
        match self {
            AmountExtraction::Resolved(amount) => Some(amount),
            AmountExtraction::Unresolved { .. } => None,
        }
    }

    pub fn into_amount(self) -> Option<MonetaryAmount> {
        match self {
            AmountExtraction::Resolved(amount) => Some(amount),
            AmountExtraction::Unresolved { .. } => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, AmountExtraction::Resolved(_))
    }
}

/// Reads the amount due from the invoice page.
///
/// Order: free phrase, labelled rows, amount containers, label proximity scan
/// over the visible text, then the post-click snippet. Reads only; calling it
/// twice on an unchanged page gives the same result.
#[derive(Debug, Clone)]
pub struct AmountExtractor {
    proximity_window: usize,
}

impl Default for AmountExtractor {
    fn default() -> Self {
        Self {
            proximity_window: DEFAULT_PROXIMITY_WINDOW,
        }
    }
}

impl AmountExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_proximity_window(mut self, chars: usize) -> Self {
        self.proximity_window = chars;
        self
    }

    pub async fn extract(
        &self,
        page: &dyn PageController,
        post_click_snippet: Option<&str>,
    ) -> Result<AmountExtraction, ExtractError> {
        let text = page.visible_text().await?;
        let mut tried = vec![AmountSource::FreePhrase];

        if let Some(phrase) = free_phrase(&text) {
            return Ok(self.resolved(MonetaryAmount::free(phrase)));
        }

        tried.push(AmountSource::LabelledRow);
        if let Some(amount) = self.from_labelled_rows(page).await? {
            return Ok(self.resolved(amount));
        }

        tried.push(AmountSource::AmountContainer);
        if let Some(amount) = self.from_containers(page).await? {
            return Ok(self.resolved(amount));
        }

        tried.push(AmountSource::ProximityScan);
        if let Some(amount) = self.scan_proximity(&text) {
            return Ok(self.resolved(amount));
        }

        if let Some(snippet) = post_click_snippet {
            tried.push(AmountSource::PostClickSnippet);
            if let Some(amount) = scan_snippet(snippet) {
                return Ok(self.resolved(amount));
            }
        }

        info!(tried = ?tried, "invoice amount unresolved");
        Ok(AmountExtraction::Unresolved { tried })
    }

    fn resolved(&self, amount: MonetaryAmount) -> AmountExtraction {
        info!(
            amount = %amount,
            raw = %amount.raw_text,
            source = amount.source.name(),
            "invoice amount resolved"
        );
        AmountExtraction::Resolved(amount)
    }

    async fn from_labelled_rows(
        &self,
        page: &dyn PageController,
    ) -> Result<Option<MonetaryAmount>, ExtractError> {
        let rows = page.query_all(&Selector::css(ROW_CONTAINERS)).await?;
        let mut best: Option<(u8, MonetaryAmount)> = None;

        for row in rows.iter().filter(|row| row.cells.len() >= 2) {
            for pair in row.cells.windows(2) {
                let (label, value) = (&pair[0], &pair[1]);
                let Some(rank) = label_rank(label) else {
                    continue;
                };
                let Some(amount) = row_value(value) else {
                    continue;
                };
                debug!(label = %label, value = %value, rank, "labelled amount row");
                if best.as_ref().map_or(true, |(best_rank, _)| rank < *best_rank) {
                    best = Some((rank, amount));
                }
            }
        }
        Ok(best.map(|(_, amount)| amount))
    }

    async fn from_containers(
        &self,
        page: &dyn PageController,
    ) -> Result<Option<MonetaryAmount>, ExtractError> {
        let elements = page.query_all(&Selector::css(AMOUNT_CONTAINERS)).await?;
        Ok(elements
            .iter()
            .filter(|element| element.text.chars().count() <= MAX_CONTAINER_TEXT)
            .find_map(|element| {
                // Bold titles and ids share these class names; a digit alone is not enough.
                let token = find_money_tokens(&element.text)
                    .into_iter()
                    .find(MoneyToken::is_monetary)?;
                debug!(element = %element.describe(), raw = %token.raw, "amount container");
                Some(token_amount(token, AmountSource::AmountContainer))
            }))
    }

    /// Monetary token closest to a total-like label within the window.
    pub fn scan_proximity(&self, text: &str) -> Option<MonetaryAmount> {
        let lowered = text.to_lowercase();
        let labels = label_positions(&lowered);
        if labels.is_empty() {
            return None;
        }

        let char_distance = |from: usize, to: usize| lowered[from..to].chars().count();
        find_money_tokens(&lowered)
            .into_iter()
            .filter(MoneyToken::is_monetary)
            .filter_map(|token| {
                let distance = labels
                    .iter()
                    .map(|&(start, end)| {
                        if end <= token.start {
                            char_distance(end, token.start)
                        } else if token.end <= start {
                            char_distance(token.end, start)
                        } else {
                            0
                        }
                    })
                    .min()?;
                (distance <= self.proximity_window).then_some((distance, token))
            })
            // min_by_key keeps the first of equal distances.
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, token)| token_amount(token, AmountSource::ProximityScan))
    }
}

/// Last resort: the first currency-marked figure of the post-click content.
pub fn scan_snippet(snippet: &str) -> Option<MonetaryAmount> {
    find_money_tokens(snippet)
        .into_iter()
        .find(|token| token.currency.is_some())
        .map(|token| token_amount(token, AmountSource::PostClickSnippet))
}

fn row_value(value: &str) -> Option<MonetaryAmount> {
    if value.chars().count() > MAX_LABEL_LEN {
        return None;
    }
    if is_free_value(value) {
        return Some(MonetaryAmount::new(
            value,
            Decimal::new(0, 2),
            None,
            AmountSource::LabelledRow,
        ));
    }
    // "Due in | 0 days" and "Due date | 05/11/2024" share the vocabulary.
    let token = find_money_tokens(value)
        .into_iter()
        .find(MoneyToken::is_monetary)?;
    Some(token_amount(token, AmountSource::LabelledRow))
}

fn token_amount(token: MoneyToken, source: AmountSource) -> MonetaryAmount {
    let currency = token
        .currency
        .clone()
        .or_else(|| parse_amount(&token.raw).and_then(|(_, currency)| currency));
    MonetaryAmount::new(token.raw, token.value, currency, source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_adapter::fixture::{FixtureElement, FixtureState, ScriptedPage};
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn invoice(elements: Vec<FixtureElement>, text: &str) -> ScriptedPage {
        let mut state = FixtureState::new("invoice", "https://portal.example/invoice/9").text(text);
        for element in elements {
            state = state.element(element);
        }
        ScriptedPage::single(state)
    }

    #[tokio::test]
    async fn free_phrase_short_circuits_without_numbers() {
        let page = invoice(vec![], "Votre renouvellement est gratuit.");
        let extraction = AmountExtractor::new().extract(&page, None).await.unwrap();
        let amount = extraction.amount().unwrap();
        assert_eq!(amount.value, dec("0.00"));
        assert_eq!(amount.source, AmountSource::FreePhrase);
    }

    #[tokio::test]
    async fn gratuitement_is_a_free_phrase() {
        let page = invoice(vec![], "Vous pouvez renouveler gratuitement votre service.");
        let amount = AmountExtractor::new()
            .extract(&page, None)
            .await
            .unwrap()
            .into_amount()
            .unwrap();
        assert!(amount.is_zero());
        assert_eq!(amount.source, AmountSource::FreePhrase);
    }

    #[tokio::test]
    async fn thousands_grouped_total_is_not_cut_to_cents() {
        let page = invoice(vec![FixtureElement::row(&["Total", "$1,234"])], "");
        let amount = AmountExtractor::new()
            .extract(&page, None)
            .await
            .unwrap()
            .into_amount()
            .unwrap();
        assert_eq!(amount.value, dec("1234"));
        assert_eq!(amount.currency.as_deref(), Some("USD"));
    }

    #[tokio::test]
    async fn total_row_beats_subtotal_row() {
        let page = invoice(
            vec![
                FixtureElement::row(&["Sous-total", "10,42 €"]),
                FixtureElement::row(&["TVA", "2,08 €"]),
                FixtureElement::row(&["Total", "12,50 €"]),
            ],
            "",
        );
        let amount = AmountExtractor::new()
            .extract(&page, None)
            .await
            .unwrap()
            .into_amount()
            .unwrap();
        assert_eq!(amount.value, dec("12.50"));
        assert_eq!(amount.currency.as_deref(), Some("EUR"));
        assert_eq!(amount.source, AmountSource::LabelledRow);
    }

    #[tokio::test]
    async fn bare_counts_in_labelled_rows_are_skipped() {
        let page = invoice(
            vec![
                FixtureElement::row(&["Due in", "0 days"]),
                FixtureElement::row(&["Due date", "05/11/2024"]),
                FixtureElement::row(&["Amount due", "12,50 €"]),
            ],
            "",
        );
        let amount = AmountExtractor::new()
            .extract(&page, None)
            .await
            .unwrap()
            .into_amount()
            .unwrap();
        assert_eq!(amount.value, dec("12.50"));
        assert_eq!(amount.raw_text, "12,50 €");
    }

    #[tokio::test]
    async fn free_value_cell_reads_as_zero() {
        let page = invoice(vec![FixtureElement::row(&["Amount due", "Free"])], "");
        let amount = AmountExtractor::new()
            .extract(&page, None)
            .await
            .unwrap()
            .into_amount()
            .unwrap();
        assert!(amount.is_zero());
    }

    #[tokio::test]
    async fn container_without_money_is_rejected() {
        let page = invoice(
            vec![
                FixtureElement::new("h1", "Invoice 2024").class("invoice-total-title"),
                FixtureElement::new("span", "1 234,56€").class("amount-value"),
            ],
            "",
        );
        let amount = AmountExtractor::new()
            .extract(&page, None)
            .await
            .unwrap()
            .into_amount()
            .unwrap();
        assert_eq!(amount.value, dec("1234.56"));
        assert_eq!(amount.source, AmountSource::AmountContainer);
    }

    #[test]
    fn proximity_picks_closest_figure() {
        let text = "Service fee 3,00 € was waived last month. Some notes about the plan \
                    and its options. Amount due: 9,99 € payable today.";
        let amount = AmountExtractor::new().scan_proximity(text).unwrap();
        assert_eq!(amount.value, dec("9.99"));
        assert_eq!(amount.source, AmountSource::ProximityScan);
    }

    #[test]
    fn proximity_respects_window() {
        let text = format!("Total {} 42,00 €", "-".repeat(100));
        assert!(AmountExtractor::new().scan_proximity(&text).is_none());
        assert!(AmountExtractor::new()
            .with_proximity_window(200)
            .scan_proximity(&text)
            .is_some());
    }

    #[tokio::test]
    async fn snippet_is_the_last_resort() {
        let page = invoice(vec![], "Invoice created.");
        let snippet = "<div>Invoice INV-2024-7 created</div><b>15,00 €</b>";
        let amount = AmountExtractor::new()
            .extract(&page, Some(snippet))
            .await
            .unwrap()
            .into_amount()
            .unwrap();
        assert_eq!(amount.value, dec("15.00"));
        assert_eq!(amount.source, AmountSource::PostClickSnippet);
    }

    #[tokio::test]
    async fn nothing_found_is_unresolved_not_zero() {
        let page = invoice(vec![FixtureElement::button("Pay")], "Invoice #42 created");
        let extraction = AmountExtractor::new().extract(&page, None).await.unwrap();
        assert!(!extraction.is_resolved());
        assert!(matches!(
            extraction,
            AmountExtraction::Unresolved { ref tried } if tried.len() == 4
        ));
    }

    #[tokio::test]
    async fn extraction_is_idempotent() {
        let page = invoice(vec![FixtureElement::row(&["Montant", "0,00 €"])], "");
        let extractor = AmountExtractor::new();
        let first = extractor.extract(&page, None).await.unwrap();
        let second = extractor.extract(&page, None).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.amount().unwrap().value, dec("0.00"));
    }
}
