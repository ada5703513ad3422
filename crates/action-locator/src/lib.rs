//! Selector cascade for the renewal steps
//!
//! Resolves a logical step (`renew`, `create_invoice`, `pay`) to a concrete,
//! actionable element through an ordered list of strategies:
//!
//! 1. configuration override
//! 2. built-in text pattern
//! 3. literal text variants
//! 4. `data-*` attribute pattern
//! 5. full-content scan, which also explains a miss

pub mod errors;
pub mod resolver;
pub mod strategies;
pub mod types;

pub use errors::LocatorError;
pub use resolver::SelectorResolver;
pub use strategies::{Strategy, StrategyOutcome};
pub use types::{LocatorStrategy, NotFoundDiagnostic, ResolutionResult, StepLocator};
