//! Webhook notifications
//!
//! Posts `{"id": ..., "status": ...}` to an instance's notification URL.
//! Delivery is best effort: it runs through [`BackgroundTasks`], is never
//! retried, and a failure only shows up in the logs.

use crate::core::tasks::BackgroundTasks;
use anyhow::Result;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Body sent to a notification URL
#[derive(Debug, Clone, Serialize)]
pub struct StatusNotification {
    pub id: Uuid,
    pub status: String,
}

/// Client for status webhooks
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    tasks: BackgroundTasks,
}

impl WebhookNotifier {
    pub fn new(tasks: BackgroundTasks) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(5)).build()?;
        Ok(Self { client, tasks })
    }

    /// Send a notification and wait for the response
    pub async fn send(&self, url: &str, id: Uuid, status: &str) -> Result<()> {
        let body = StatusNotification {
            id,
            status: status.to_string(),
        };

        tracing::debug!(url = %url, id = %id, status = %status, "sending status webhook");

        let response = self.client.post(url).json(&body).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("webhook answered {}", response.status());
        }

        Ok(())
    }

    /// Queue a notification in the background
    ///
    /// Does nothing when the instance has no notification URL.
    pub fn notify(&self, url: Option<&str>, id: Uuid, status: &str) -> Option<JoinHandle<()>> {
        let url = url.filter(|u| !u.is_empty())?.to_string();
        let status = status.to_string();
        let notifier = self.clone();

        Some(self.tasks.dispatch(format!("webhook:{}", id), async move {
            notifier.send(&url, id, &status).await
        }))
    }
}
