//! renew-pilot library
//!
//! Exposes the CLI plumbing and configuration model for integration testing

pub mod cli;
pub mod config;

pub use config::{Config, ConfigError};
