//! Application state - shared across all handlers and middleware.

use std::sync::Arc;

use herbarium_core::AdmissionController;
use herbarium_core::domain::PolicyTable;
use herbarium_core::ports::CounterStore;
use herbarium_infra::{FallbackCounterStore, InMemoryCounterStore};

#[cfg(feature = "redis")]
use herbarium_infra::RedisCounterStore;

use crate::config::AppConfig;
use crate::observability::AlertDispatcher;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub admission: Arc<AdmissionController>,
    /// Concrete handle on the counter store, for health reporting and the sweep.
    pub counters: Arc<FallbackCounterStore>,
    pub alerts: AlertDispatcher,
}

impl AppState {
    /// Build the application state with appropriate implementations.
    pub fn new(config: &AppConfig, policies: PolicyTable) -> Self {
        let local = Arc::new(InMemoryCounterStore::new());
        let counters = Arc::new(FallbackCounterStore::new(
            remote_store(config),
            local,
            config.rate_limit.store_timeout,
        ));

        let alerts = match &config.security_alert_url {
            Some(url) => AlertDispatcher::webhook(url.clone()),
            None => {
                tracing::info!("SECURITY_ALERT_URL not set. Security alerts are logged only.");
                AlertDispatcher::log_only()
            }
        };

        Self::from_parts(policies, counters, alerts, config.rate_limit.abuse_threshold)
    }

    pub fn from_parts(
        policies: PolicyTable,
        counters: Arc<FallbackCounterStore>,
        alerts: AlertDispatcher,
        abuse_threshold: u64,
    ) -> Self {
        let admission = Arc::new(AdmissionController::new(
            policies,
            counters.clone(),
            abuse_threshold,
        ));

        tracing::info!(
            backend = counters.backend(),
            policies = admission.policies().len(),
            abuse_threshold,
            "Application state initialized"
        );

        Self {
            admission,
            counters,
            alerts,
        }
    }
}

#[cfg(feature = "redis")]
fn remote_store(config: &AppConfig) -> Option<Arc<dyn CounterStore>> {
    let Some(redis) = config.redis.clone() else {
        tracing::warn!(
            "RATE_LIMIT_REDIS_URL/RATE_LIMIT_REDIS_TOKEN not set. Running on in-process counters."
        );
        return None;
    };

    match RedisCounterStore::new(redis) {
        Ok(store) => Some(Arc::new(store)),
        Err(e) => {
            tracing::error!(
                "Invalid Redis counter store configuration: {}. Using in-process counters.",
                e
            );
            None
        }
    }
}

#[cfg(not(feature = "redis"))]
fn remote_store(_config: &AppConfig) -> Option<Arc<dyn CounterStore>> {
    tracing::info!("Running without redis feature - using in-process counters");
    None
}
