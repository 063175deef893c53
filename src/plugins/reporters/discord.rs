use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::sync::Mutex;
use std::time::Duration;

use crate::config::DiscordConfig;
use crate::models::{MonitorEvent, NotifyOn, StockStatus};
use crate::plugins::traits::ProgressReporter;
use crate::utils::error::AppError;

/// Posts a webhook embed when availability changes in a way the
/// configuration cares about. Delivery failures are logged, never raised.
pub struct DiscordReporter {
    client: Client,
    webhook_url: String,
    target_url: String,
    config: DiscordConfig,
    last_status: Mutex<Option<StockStatus>>,
}

impl DiscordReporter {
    /// Returns `None` when no webhook is configured.
    pub fn from_config(config: &DiscordConfig, target_url: &str) -> Result<Option<Self>, AppError> {
        let Some(webhook_url) = config.webhook_url.clone() else {
            return Ok(None);
        };

        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Some(Self {
            client,
            webhook_url,
            target_url: target_url.to_string(),
            config: config.clone(),
            last_status: Mutex::new(None),
        }))
    }

    fn should_notify(&self, status: StockStatus) -> bool {
        let previous = match self.last_status.lock() {
            Ok(mut guard) => guard.replace(status),
            Err(poisoned) => poisoned.into_inner().replace(status),
        };
        should_notify(self.config.notify_on, previous, status)
    }

    fn get_embed_color(status: StockStatus) -> u32 {
        match status {
            StockStatus::InStock => 0x00ff00,
            StockStatus::OutOfStock => 0xff3300,
            StockStatus::Unknown => 0x999999,
        }
    }

    fn create_webhook_payload(&self, status: StockStatus) -> serde_json::Value {
        let title = match status {
            StockStatus::InStock => "✅ Back in stock",
            StockStatus::OutOfStock => "❌ Out of stock",
            StockStatus::Unknown => "❔ Availability unknown",
        };

        let mut payload = json!({
            "username": self.config.username,
            "embeds": [{
                "title": title,
                "url": self.target_url,
                "description": self.target_url,
                "color": Self::get_embed_color(status),
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "footer": { "text": "Stock Watcher" }
            }]
        });

        if let Some(avatar_url) = &self.config.avatar_url {
            payload["avatar_url"] = json!(avatar_url);
        }
        if let Some(role) = &self.config.mention_role {
            payload["content"] = json!(format!("<@&{}>", role));
        }

        payload
    }

    async fn send(&self, payload: &serde_json::Value) -> Result<(), AppError> {
        let response = self.client.post(&self.webhook_url).json(payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Internal(format!("Discord webhook returned {}", status)));
        }
        Ok(())
    }
}

fn should_notify(notify_on: NotifyOn, previous: Option<StockStatus>, current: StockStatus) -> bool {
    match notify_on {
        NotifyOn::InStock => current.is_in_stock() && previous != Some(StockStatus::InStock),
        NotifyOn::AnyChange => match previous {
            Some(previous) => previous != current,
            None => current.is_in_stock(),
        },
    }
}

#[async_trait]
impl ProgressReporter for DiscordReporter {
    fn name(&self) -> &str {
        "discord"
    }

    async fn report(&self, event: &MonitorEvent) {
        let Some(status) = event.stock_status() else {
            return;
        };
        if !self.should_notify(status) {
            return;
        }

        let payload = self.create_webhook_payload(status);
        match self.send(&payload).await {
            Ok(()) => {
                tracing::info!("Discord notification sent for {} ({})", self.target_url, status)
            }
            Err(e) => tracing::warn!("Discord notification failed for {}: {}", self.target_url, e),
        }
    }
}
