//! Outbound customer notifications.
//!
//! One [`Notifier`] is chosen at startup. Dispatch happens on a spawned task
//! and every failure stops at a `warn!`: a notification never changes the
//! outcome of the request that caused it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redeem_shared::notification::Notification;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("webhook request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("webhook answered {0}")]
    Status(reqwest::StatusCode),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, notification: &Notification) -> Result<(), NotifyError>;
}

/// Development notifier: renders and logs, sends nothing.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, to: &str, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            to,
            kind = %notification.kind(),
            subject = %notification.subject(),
            "notification"
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    to: &'a str,
    subject: String,
    #[serde(flatten)]
    notification: &'a Notification,
    html: String,
}

/// POSTs `{to, subject, type, data, html}` to a configured endpoint that
/// owns actual delivery.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, to: &str, notification: &Notification) -> Result<(), NotifyError> {
        let payload = WebhookPayload {
            to,
            subject: notification.subject(),
            notification,
            html: notification.render_html(),
        };

        let resp = self.client.post(&self.url).json(&payload).send().await?;
        if !resp.status().is_success() {
            return Err(NotifyError::Status(resp.status()));
        }
        Ok(())
    }
}

/// Fire and forget.
pub fn dispatch(notifier: Arc<dyn Notifier>, to: String, notification: Notification) {
    tokio::spawn(async move {
        if let Err(e) = notifier.send(&to, &notification).await {
            warn!(
                error = %e,
                kind = %notification.kind(),
                "notification dropped"
            );
        }
    });
}
