//! Monetary amount extraction for invoice pages.
//!
//! [`AmountExtractor`] locates the figure due and [`normalize`] turns rendered
//! text such as `1 234,56 €` into a two-decimal value. An amount that cannot be
//! found is reported as unresolved, never as zero.

pub mod errors;
pub mod extractor;
pub mod normalize;
pub mod vocab;

pub use errors::ExtractError;
pub use extractor::{scan_snippet, AmountExtraction, AmountExtractor, DEFAULT_PROXIMITY_WINDOW};
pub use normalize::{find_money_tokens, parse_amount, MoneyToken};
