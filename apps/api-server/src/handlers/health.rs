//! Health check endpoint.

use actix_web::{HttpResponse, web};

use herbarium_core::ports::CounterStore;
use herbarium_shared::dto::{HealthResponse, RateLimitStatus};

use crate::state::AppState;

/// Health check endpoint - returns server status and counter store health.
///
/// GET /api/health
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let counters = &state.counters;
    let rate_limit = RateLimitStatus {
        backend: counters.backend().to_string(),
        distributed: counters.has_remote(),
        fallback_events: counters.fallback_count(),
        local_keys: counters.local().len().await,
    };

    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        rate_limit,
    };

    HttpResponse::Ok().json(response)
}
