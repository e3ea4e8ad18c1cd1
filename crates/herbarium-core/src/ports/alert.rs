//! Security alert port.

use async_trait::async_trait;

use crate::error::AlertError;

/// Notification that a caller crossed the abuse threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityAlert {
    pub kind: &'static str,
    pub message: String,
    pub client_id: String,
    pub request_count: u64,
    pub endpoint: String,
    /// Epoch milliseconds.
    pub timestamp_ms: u64,
}

/// Alert sender - delivers alerts to an external collaborator.
#[async_trait]
pub trait AlertSender: Send + Sync {
    async fn send(&self, alert: SecurityAlert) -> Result<(), AlertError>;
}
