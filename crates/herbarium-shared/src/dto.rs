//! Data Transfer Objects - request/response types for the API and its collaborators.

use serde::{Deserialize, Serialize};

/// `GET /api/health` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
    pub rate_limit: RateLimitStatus,
}

/// Admission-control status as seen by operators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitStatus {
    /// Configured counter back end: `redis` or `memory`.
    pub backend: String,
    /// Whether counts are shared across instances.
    pub distributed: bool,
    /// Requests served by in-process counters because the remote store failed.
    pub fallback_events: u64,
    /// Keys currently held by the in-process store.
    pub local_keys: usize,
}

/// Payload POSTed to the security-alert endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityAlertPayload {
    #[serde(rename = "type")]
    pub alert_type: String,
    pub message: String,
    pub details: SecurityAlertDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityAlertDetails {
    pub client_id: String,
    pub request_count: u64,
    pub endpoint: String,
    /// RFC 3339 timestamp.
    pub timestamp: String,
}
