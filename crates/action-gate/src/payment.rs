//! Payment safety gate.
//!
//! Pay may run only when the amount is resolved and either zero or explicitly
//! confirmed by the operator. A zero amount never reaches the pay step at all.

use renew_core_types::{MonetaryAmount, RunReason};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentDecision {
    /// Nothing to pay; the run completes without the pay step.
    Free,
    /// Positive amount with confirmation granted.
    Proceed,
    /// Payment must not happen.
    Blocked(RunReason),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PaymentGate {
    confirmed: bool,
}

impl PaymentGate {
    pub fn new(confirmed: bool) -> Self {
        Self { confirmed }
    }

    pub fn confirmed(&self) -> bool {
        self.confirmed
    }

    pub fn evaluate(&self, amount: Option<&MonetaryAmount>) -> PaymentDecision {
        let decision = match amount {
            None => PaymentDecision::Blocked(RunReason::AmountUnknown),
            Some(amount) if amount.value.is_sign_negative() && !amount.is_zero() => {
                PaymentDecision::Blocked(RunReason::AmountUnknown)
            }
            Some(amount) if amount.is_zero() => PaymentDecision::Free,
            Some(_) if self.confirmed => PaymentDecision::Proceed,
            Some(_) => PaymentDecision::Blocked(RunReason::PaymentRequired),
        };
        info!(
            amount = %amount.map(|a| a.to_string()).unwrap_or_else(|| "unresolved".to_string()),
            confirmed = self.confirmed,
            ?decision,
            "payment gate evaluated"
        );
        decision
    }
}
