//! Push notification delivery for finished analyses.
//!
//! Delivery failures are logged by the caller and never change an
//! analysis outcome.

use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::config::NotifySection;
use crate::error::NotifyError;

/// One completion message. The selection id travels as a structured
/// field, not just body text, so clients can deep-link back to the
/// result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub selection_id: String,
}

/// Seam to the push delivery mechanism.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one message to a device.
    async fn notify(
        &self,
        device_token: &str,
        notification: &Notification,
    ) -> crate::error::Result<()>;
}

/// HTTP push gateway client (FCM-style legacy send endpoint).
#[derive(Debug)]
pub struct PushGateway {
    client: Client,
    gateway_url: String,
    server_key: String,
}

impl PushGateway {
    pub fn new(config: &NotifySection) -> Self {
        Self {
            client: Client::new(),
            gateway_url: config.gateway_url.clone(),
            server_key: config.server_key.clone(),
        }
    }
}

#[derive(Serialize)]
struct PushMessage<'a> {
    to: &'a str,
    notification: PushNotification<'a>,
    data: PushData<'a>,
}

#[derive(Serialize)]
struct PushNotification<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Serialize)]
struct PushData<'a> {
    selection_id: &'a str,
}

#[async_trait::async_trait]
impl Notifier for PushGateway {
    async fn notify(
        &self,
        device_token: &str,
        notification: &Notification,
    ) -> crate::error::Result<()> {
        let message = PushMessage {
            to: device_token,
            notification: PushNotification {
                title: &notification.title,
                body: &notification.body,
            },
            data: PushData {
                selection_id: &notification.selection_id,
            },
        };
        debug!(title = %notification.title, "Sending push notification");

        let response = self
            .client
            .post(&self.gateway_url)
            .header("Authorization", format!("key={}", self.server_key))
            .json(&message)
            .send()
            .await
            .map_err(|e| NotifyError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Gateway { status, body }.into());
        }
        Ok(())
    }
}

/// Notifier that drops everything; used when notifications are
/// disabled.
#[derive(Debug)]
pub struct NullNotifier;

#[async_trait::async_trait]
impl Notifier for NullNotifier {
    async fn notify(
        &self,
        _device_token: &str,
        _notification: &Notification,
    ) -> crate::error::Result<()> {
        Ok(())
    }
}

/// Pick the notifier implied by configuration.
pub fn create_notifier(config: &NotifySection) -> Box<dyn Notifier> {
    if config.enabled {
        Box::new(PushGateway::new(config))
    } else {
        Box::new(NullNotifier)
    }
}
