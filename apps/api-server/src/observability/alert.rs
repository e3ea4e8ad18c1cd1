//! Security alert dispatch.
//!
//! Alerts are sent from detached tasks so the response path never waits on
//! the alert endpoint. Delivery failures are logged and dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use herbarium_core::AlertError;
use herbarium_core::ports::{AlertSender, SecurityAlert};
use herbarium_shared::dto::{SecurityAlertDetails, SecurityAlertPayload};

/// Convert a domain alert to the collaborator's wire format.
pub fn to_payload(alert: &SecurityAlert) -> SecurityAlertPayload {
    let timestamp = chrono::DateTime::from_timestamp_millis(alert.timestamp_ms as i64)
        .map(|t| t.to_rfc3339())
        .unwrap_or_default();

    SecurityAlertPayload {
        alert_type: alert.kind.to_string(),
        message: alert.message.clone(),
        details: SecurityAlertDetails {
            client_id: alert.client_id.clone(),
            request_count: alert.request_count,
            endpoint: alert.endpoint.clone(),
            timestamp,
        },
    }
}

/// Log alert sender - records alerts in the log (for development).
pub struct LogAlertSender;

#[async_trait::async_trait]
impl AlertSender for LogAlertSender {
    async fn send(&self, alert: SecurityAlert) -> Result<(), AlertError> {
        tracing::warn!(
            alert_type = alert.kind,
            client_id = %alert.client_id,
            request_count = alert.request_count,
            endpoint = %alert.endpoint,
            "SECURITY ALERT: {}",
            alert.message
        );
        Ok(())
    }
}

/// Webhook alert sender - POSTs alerts to the internal security endpoint.
pub struct WebhookAlertSender {
    url: String,
    client: reqwest::Client,
}

impl WebhookAlertSender {
    pub fn new(url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { url, client }
    }
}

#[async_trait::async_trait]
impl AlertSender for WebhookAlertSender {
    async fn send(&self, alert: SecurityAlert) -> Result<(), AlertError> {
        self.client
            .post(&self.url)
            .json(&to_payload(&alert))
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(|e| AlertError::SendError(e.to_string()))?;

        Ok(())
    }
}

/// Fire-and-forget front for an [`AlertSender`].
#[derive(Clone)]
pub struct AlertDispatcher {
    sender: Arc<dyn AlertSender>,
}

impl AlertDispatcher {
    pub fn new(sender: Arc<dyn AlertSender>) -> Self {
        Self { sender }
    }

    /// Dispatcher that only logs alerts.
    pub fn log_only() -> Self {
        Self::new(Arc::new(LogAlertSender))
    }

    /// Dispatcher that sends to a webhook.
    pub fn webhook(url: String) -> Self {
        Self::new(Arc::new(WebhookAlertSender::new(url)))
    }

    /// Send `alert` on a detached task.
    ///
    /// Callers are not expected to await the handle.
    pub fn dispatch(&self, alert: SecurityAlert) -> JoinHandle<()> {
        let sender = self.sender.clone();
        tokio::spawn(async move {
            let client_id = alert.client_id.clone();
            if let Err(e) = sender.send(alert).await {
                tracing::error!(client_id = %client_id, error = %e, "Failed to deliver security alert");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<SecurityAlert>>,
    }

    #[async_trait::async_trait]
    impl AlertSender for RecordingSender {
        async fn send(&self, alert: SecurityAlert) -> Result<(), AlertError> {
            self.sent.lock().unwrap().push(alert);
            Ok(())
        }
    }

    struct FailingSender;

    #[async_trait::async_trait]
    impl AlertSender for FailingSender {
        async fn send(&self, _alert: SecurityAlert) -> Result<(), AlertError> {
            Err(AlertError::SendError("endpoint down".to_string()))
        }
    }

    fn alert() -> SecurityAlert {
        SecurityAlert {
            kind: "rate_limit_abuse",
            message: "Client 10.0.0.1 exceeded 1000 requests per window on default".to_string(),
            client_id: "10.0.0.1".to_string(),
            request_count: 1001,
            endpoint: "/api/herbs".to_string(),
            timestamp_ms: 1_767_225_600_000,
        }
    }

    #[test]
    fn test_payload_conversion() {
        let payload = to_payload(&alert());
        assert_eq!(payload.alert_type, "rate_limit_abuse");
        assert_eq!(payload.details.request_count, 1001);
        assert_eq!(payload.details.timestamp, "2026-01-01T00:00:00+00:00");
    }

    #[tokio::test]
    async fn test_dispatch_delivers_in_background() {
        let sender = Arc::new(RecordingSender::default());
        let dispatcher = AlertDispatcher::new(sender.clone());

        dispatcher.dispatch(alert()).await.unwrap();

        assert_eq!(sender.sent.lock().unwrap().as_slice(), &[alert()]);
    }

    #[tokio::test]
    async fn test_delivery_failure_is_swallowed() {
        let dispatcher = AlertDispatcher::new(Arc::new(FailingSender));
        assert!(dispatcher.dispatch(alert()).await.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_webhook_is_swallowed() {
        let dispatcher = AlertDispatcher::webhook("http://127.0.0.1:1/alerts".to_string());
        assert!(dispatcher.dispatch(alert()).await.is_ok());
    }
}
