//! Error types for admission control.

use std::time::Duration;

use thiserror::Error;

/// Policy table misconfiguration. Always fatal at startup.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Policy table has no `default` entry")]
    MissingDefault,

    #[error("Policy key must not be empty")]
    EmptyKey,

    #[error("Policy `{0}` must have non-zero requests and window")]
    ZeroQuota(String),
}

/// Counter store failures. Never surfaced to callers.
#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),
}

/// Alert delivery failures. Logged and swallowed.
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("Failed to send alert: {0}")]
    SendError(String),
}
