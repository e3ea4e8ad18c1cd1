//! Admission controller - policy lookup, counting and the abuse check.

use std::sync::Arc;

use crate::domain::{AdmissionDecision, CallerIdentity, PolicyTable, RateLimitKey};
use crate::ports::{CounterStore, SecurityAlert};

/// Default estimated rate above which a caller is reported as abusive.
pub const DEFAULT_ABUSE_THRESHOLD: u64 = 1000;

/// Result of admitting one request.
#[derive(Debug, Clone)]
pub struct Admission {
    pub key: RateLimitKey,
    pub decision: AdmissionDecision,
    /// Set on the request that pushes the caller over the abuse threshold.
    pub alert: Option<SecurityAlert>,
}

/// Decides whether a caller may make a request right now.
///
/// Built once at startup and shared by every worker.
pub struct AdmissionController {
    policies: PolicyTable,
    store: Arc<dyn CounterStore>,
    abuse_threshold: u64,
}

impl AdmissionController {
    pub fn new(policies: PolicyTable, store: Arc<dyn CounterStore>, abuse_threshold: u64) -> Self {
        Self {
            policies,
            store,
            abuse_threshold,
        }
    }

    pub fn policies(&self) -> &PolicyTable {
        &self.policies
    }

    /// Count the request against its policy bucket and decide.
    ///
    /// Store failures fail open: the request is admitted with a full quota.
    pub async fn admit(&self, caller: CallerIdentity, path: &str, now_ms: u64) -> Admission {
        let matched = self.policies.resolve(path);
        let key = RateLimitKey::new(caller, matched.bucket);

        let decision = match self
            .store
            .check_and_increment(&key, &matched.policy, now_ms)
            .await
        {
            Ok(decision) => decision,
            Err(e) => {
                tracing::warn!(
                    key = %key,
                    backend = self.store.backend(),
                    error = %e,
                    "Counter store failed, failing open"
                );
                AdmissionDecision::fail_open(&matched.policy, now_ms)
            }
        };

        let alert = self.abuse_alert(&key, path, &decision, now_ms);

        Admission {
            key,
            decision,
            alert,
        }
    }

    /// Alert only on the request that crosses the threshold, not every one after it.
    fn abuse_alert(
        &self,
        key: &RateLimitKey,
        path: &str,
        decision: &AdmissionDecision,
        now_ms: u64,
    ) -> Option<SecurityAlert> {
        let threshold = self.abuse_threshold as f64;
        if decision.estimate <= threshold || decision.estimate - 1.0 > threshold {
            return None;
        }

        let request_count = decision.estimate.ceil() as u64;
        Some(SecurityAlert {
            kind: "rate_limit_abuse",
            message: format!(
                "Client {} exceeded {} requests per window on {}",
                key.caller(),
                self.abuse_threshold,
                key.bucket()
            ),
            client_id: key.caller().to_string(),
            request_count,
            endpoint: path.to_string(),
            timestamp_ms: now_ms,
        })
    }
}
