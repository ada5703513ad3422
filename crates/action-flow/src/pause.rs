//! Step-by-step debugging hook.

use async_trait::async_trait;

/// Awaited before each step; the CLI uses it to wait for the operator.
#[async_trait]
pub trait PauseHook: Send + Sync {
    async fn before_step(&self, label: &str);
}

/// Never pauses.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPause;

#[async_trait]
impl PauseHook for NoPause {
    async fn before_step(&self, _label: &str) {}
}
