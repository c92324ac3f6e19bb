use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::notification::Notification;

/// Outbound push-notification provider.
#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), AppError>;
}

/// Used when no push provider is configured; records the push in the log only.
pub struct LogPushSender;

#[async_trait]
impl PushSender for LogPushSender {
    async fn send(&self, notification: &Notification) -> Result<(), AppError> {
        info!(
            recipient_id = %notification.recipient_id,
            order_id = %notification.order_id,
            title = %notification.title,
            "push notification (log only)"
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct PushPayload<'a> {
    recipient_id: Uuid,
    order_id: Uuid,
    title: &'a str,
    body: &'a str,
}

pub struct WebhookPushSender {
    client: reqwest::Client,
    url: String,
}

impl WebhookPushSender {
    pub fn new(url: impl Into<String>) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|err| AppError::Internal(format!("failed to build push client: {err}")))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl PushSender for WebhookPushSender {
    async fn send(&self, notification: &Notification) -> Result<(), AppError> {
        let payload = PushPayload {
            recipient_id: notification.recipient_id,
            order_id: notification.order_id,
            title: &notification.title,
            body: &notification.body,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|err| AppError::Internal(format!("push request failed: {err}")))?;

        if !response.status().is_success() {
            return Err(AppError::Internal(format!(
                "push provider returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}
