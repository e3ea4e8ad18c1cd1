//! Counter store port.

use async_trait::async_trait;

use crate::domain::{AdmissionDecision, PolicyConfig, RateLimitKey, WindowState};
use crate::error::RateLimitError;

/// Counter store - abstraction over sliding-window backends.
///
/// Implementations must make `record_hit` atomic per key: concurrent callers
/// each observe a distinct count.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Count one hit for `key` at `now_ms` and return the resulting window state.
    async fn record_hit(
        &self,
        key: &RateLimitKey,
        policy: &PolicyConfig,
        now_ms: u64,
    ) -> Result<WindowState, RateLimitError>;

    /// Count one hit and evaluate it against `policy`.
    ///
    /// Denied requests are still counted.
    async fn check_and_increment(
        &self,
        key: &RateLimitKey,
        policy: &PolicyConfig,
        now_ms: u64,
    ) -> Result<AdmissionDecision, RateLimitError> {
        let state = self.record_hit(key, policy, now_ms).await?;
        Ok(AdmissionDecision::evaluate(&state, policy, now_ms))
    }

    /// Short backend name for logs and health output.
    fn backend(&self) -> &'static str;
}
