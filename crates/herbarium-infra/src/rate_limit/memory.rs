//! In-process sliding-window counters.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use herbarium_core::RateLimitError;
use herbarium_core::domain::{PolicyConfig, RateLimitKey, WindowState};
use herbarium_core::ports::CounterStore;

struct CounterEntry {
    state: WindowState,
    window_ms: u64,
}

/// In-memory counter store.
///
/// This is the fallback when Redis is unavailable or not configured.
/// Note: Counts are per-process, not shared across instances, so a fleet of N
/// processes admits up to N times the configured quota.
pub struct InMemoryCounterStore {
    windows: Mutex<HashMap<String, CounterEntry>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Drop every key whose windows can no longer affect an estimate.
    ///
    /// Returns the number of keys removed.
    pub async fn sweep_expired(&self, now_ms: u64) -> usize {
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|_, entry| !entry.state.is_expired(now_ms, entry.window_ms));
        before - windows.len()
    }

    /// Number of tracked keys.
    pub async fn len(&self) -> usize {
        self.windows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.windows.lock().await.is_empty()
    }
}

impl Default for InMemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn record_hit(
        &self,
        key: &RateLimitKey,
        policy: &PolicyConfig,
        now_ms: u64,
    ) -> Result<WindowState, RateLimitError> {
        // Lock held for the whole read-modify-write; no await inside.
        let mut windows = self.windows.lock().await;
        let entry = windows
            .entry(key.to_string())
            .or_insert_with(|| CounterEntry {
                state: WindowState::default(),
                window_ms: policy.window_ms,
            });

        if entry.window_ms != policy.window_ms || entry.state.is_expired(now_ms, policy.window_ms) {
            entry.state = WindowState::default();
            entry.window_ms = policy.window_ms;
        }

        entry.state.record_hit(now_ms, policy.window_ms);
        Ok(entry.state)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use herbarium_core::domain::CallerIdentity;

    const POLICY: PolicyConfig = PolicyConfig::new(10, 60_000);

    fn key(ip: &str) -> RateLimitKey {
        RateLimitKey::new(CallerIdentity::resolve(Some(ip), None), "default")
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_hits_admit_at_most_quota() {
        let store = Arc::new(InMemoryCounterStore::new());

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .check_and_increment(&key("10.0.0.1"), &POLICY, 5_000)
                        .await
                        .unwrap()
                        .allowed
                })
            })
            .collect();

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }

        assert_eq!(admitted, 10);
    }

    #[tokio::test]
    async fn test_previous_window_decays() {
        let store = InMemoryCounterStore::new();
        for _ in 0..10 {
            store.record_hit(&key("10.0.0.1"), &POLICY, 0).await.unwrap();
        }

        let decision = store
            .check_and_increment(&key("10.0.0.1"), &POLICY, 90_000)
            .await
            .unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.estimate, 6.0);
        assert_eq!(decision.reset_at_ms, 120_000);
    }

    #[tokio::test]
    async fn test_stale_state_resets_on_access() {
        let store = InMemoryCounterStore::new();
        for _ in 0..15 {
            store.record_hit(&key("10.0.0.1"), &POLICY, 0).await.unwrap();
        }

        let state = store.record_hit(&key("10.0.0.1"), &POLICY, 180_000).await.unwrap();
        assert_eq!(state, WindowState::new(0, 1, 180_000));
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired_keys() {
        let store = InMemoryCounterStore::new();
        store.record_hit(&key("10.0.0.1"), &POLICY, 0).await.unwrap();
        store.record_hit(&key("10.0.0.2"), &POLICY, 100_000).await.unwrap();
        assert_eq!(store.len().await, 2);

        let removed = store.sweep_expired(130_000).await;
        assert_eq!(removed, 1);
        assert_eq!(store.len().await, 1);

        let removed = store.sweep_expired(180_000).await;
        assert_eq!(removed, 1);
        assert!(store.is_empty().await);
    }
}
