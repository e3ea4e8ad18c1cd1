//! Remote-first counter store with per-call fallback to in-process counters.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use herbarium_core::RateLimitError;
use herbarium_core::domain::{PolicyConfig, RateLimitKey, WindowState};
use herbarium_core::ports::CounterStore;

use super::memory::InMemoryCounterStore;

/// Counter store that prefers a shared remote store.
///
/// Every call tries the remote store first, bounded by `timeout`. On error or
/// timeout that one call is served by the local store instead; the next call
/// tries the remote again. A timed-out increment is never retried, since it may
/// already have been applied remotely.
pub struct FallbackCounterStore {
    remote: Option<Arc<dyn CounterStore>>,
    local: Arc<InMemoryCounterStore>,
    timeout: Duration,
    fallbacks: AtomicU64,
}

impl FallbackCounterStore {
    pub fn new(
        remote: Option<Arc<dyn CounterStore>>,
        local: Arc<InMemoryCounterStore>,
        timeout: Duration,
    ) -> Self {
        if remote.is_none() {
            tracing::warn!(
                "Remote counter store not configured - rate limits are enforced per process only"
            );
        }

        Self {
            remote,
            local,
            timeout,
            fallbacks: AtomicU64::new(0),
        }
    }

    /// Store that only ever uses in-process counters.
    pub fn local_only(local: Arc<InMemoryCounterStore>) -> Self {
        Self::new(None, local, Duration::ZERO)
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Calls served locally because the remote store failed.
    pub fn fallback_count(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }

    pub fn local(&self) -> &Arc<InMemoryCounterStore> {
        &self.local
    }

    async fn try_remote(
        &self,
        remote: &dyn CounterStore,
        key: &RateLimitKey,
        policy: &PolicyConfig,
        now_ms: u64,
    ) -> Result<WindowState, RateLimitError> {
        tokio::time::timeout(self.timeout, remote.record_hit(key, policy, now_ms))
            .await
            .map_err(|_| RateLimitError::Timeout(self.timeout))?
    }
}

#[async_trait]
impl CounterStore for FallbackCounterStore {
    async fn record_hit(
        &self,
        key: &RateLimitKey,
        policy: &PolicyConfig,
        now_ms: u64,
    ) -> Result<WindowState, RateLimitError> {
        if let Some(remote) = &self.remote {
            match self.try_remote(remote.as_ref(), key, policy, now_ms).await {
                Ok(state) => return Ok(state),
                Err(e) => {
                    let total = self.fallbacks.fetch_add(1, Ordering::Relaxed) + 1;
                    tracing::warn!(
                        key = %key,
                        backend = remote.backend(),
                        error = %e,
                        fallbacks_total = total,
                        "Remote counter store failed, using in-process counters for this request"
                    );
                }
            }
        }

        self.local.record_hit(key, policy, now_ms).await
    }

    fn backend(&self) -> &'static str {
        match &self.remote {
            Some(remote) => remote.backend(),
            None => self.local.backend(),
        }
    }
}
