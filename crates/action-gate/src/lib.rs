//! Guards evaluated at workflow step boundaries
//!
//! - [`RestrictionDetector`]: business-rule block messages, bypassable with an audit trail
//! - [`ChallengeDetector`]: bot-verification interstitials, never bypassable
//! - [`PaymentGate`]: whether the pay step may run for a given amount

pub mod challenge;
pub mod errors;
pub mod payment;
pub mod restriction;

pub use challenge::{detect_challenge, ChallengeDetector, ChallengeMatch};
pub use errors::GateError;
pub use payment::{PaymentDecision, PaymentGate};
pub use restriction::{EvidenceSource, RestrictionDetector, RestrictionEvidence, RestrictionMatch};
