// File: valwatch/src/notify.rs
//! Alert delivery: one dispatcher task drains the alert queue in enqueue
//! order and hands each message to every configured channel sender. A
//! failing channel is logged and skipped; it never blocks the others and
//! nothing is retried here, since the alarm engine re-evaluates on the
//! next health check.

use crate::alerts::AlertMsg;
use crate::config::Config;
use crate::constants::http;
use crate::errors::NotificationError;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const PAGERDUTY_URL: &str = "https://events.pagerduty.com/v2/enqueue";
const TELEGRAM_URL: &str = "https://api.telegram.org";

/// One notification channel. Implementations must be safe to call
/// sequentially from the single dispatcher task.
#[async_trait]
pub trait ChannelSender: Send + Sync {
    fn name(&self) -> &'static str;
    async fn send(&self, msg: &AlertMsg) -> Result<(), NotificationError>;
}

/// Human-readable alert line shared by the chat-style channels.
fn render(msg: &AlertMsg) -> String {
    if msg.resolved {
        format!("🟢 {}: resolved: {}", msg.chain_id, msg.message)
    } else {
        format!("🚨 {}: {}", msg.chain_id, msg.message)
    }
}

async fn post_json(
    client: &Client,
    channel: &'static str,
    url: &str,
    payload: serde_json::Value,
) -> Result<(), NotificationError> {
    let response = client
        .post(url)
        .json(&payload)
        .send()
        .await
        .map_err(|e| NotificationError::SendFailed {
            channel: channel.to_string(),
            reason: e.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(NotificationError::BadStatus {
            channel: channel.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(())
}

pub struct PagerdutySender {
    client: Client,
    routing_key: String,
    url: String,
}

#[async_trait]
impl ChannelSender for PagerdutySender {
    fn name(&self) -> &'static str {
        "pagerduty"
    }

    async fn send(&self, msg: &AlertMsg) -> Result<(), NotificationError> {
        let action = if msg.resolved { "resolve" } else { "trigger" };
        let payload = serde_json::json!({
            "routing_key": self.routing_key,
            "event_action": action,
            "dedup_key": format!("{}:{}", msg.chain_id, msg.category),
            "payload": {
                "summary": render(msg),
                "source": msg.chain_id,
                "severity": msg.severity.as_str(),
                "timestamp": Utc::now().to_rfc3339(),
            }
        });
        post_json(&self.client, self.name(), &self.url, payload).await
    }
}

pub struct DiscordSender {
    client: Client,
    webhook: String,
}

#[async_trait]
impl ChannelSender for DiscordSender {
    fn name(&self) -> &'static str {
        "discord"
    }

    async fn send(&self, msg: &AlertMsg) -> Result<(), NotificationError> {
        let payload = serde_json::json!({ "content": render(msg) });
        post_json(&self.client, self.name(), &self.webhook, payload).await
    }
}

pub struct TelegramSender {
    client: Client,
    base_url: String,
    api_key: String,
    channel: String,
}

#[async_trait]
impl ChannelSender for TelegramSender {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, msg: &AlertMsg) -> Result<(), NotificationError> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.api_key);
        let payload = serde_json::json!({
            "chat_id": self.channel,
            "text": render(msg),
        });
        post_json(&self.client, self.name(), &url, payload).await
    }
}

pub struct SlackSender {
    client: Client,
    webhook: String,
}

#[async_trait]
impl ChannelSender for SlackSender {
    fn name(&self) -> &'static str {
        "slack"
    }

    async fn send(&self, msg: &AlertMsg) -> Result<(), NotificationError> {
        let payload = serde_json::json!({ "text": render(msg) });
        post_json(&self.client, self.name(), &self.webhook, payload).await
    }
}

/// Generic webhook carrying the full structured alert.
pub struct WebhookSender {
    client: Client,
    url: String,
}

#[async_trait]
impl ChannelSender for WebhookSender {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn send(&self, msg: &AlertMsg) -> Result<(), NotificationError> {
        let payload = serde_json::json!({
            "chain_id": msg.chain_id,
            "category": msg.category.to_string(),
            "severity": msg.severity.as_str(),
            "message": msg.message,
            "resolved": msg.resolved,
            "timestamp": Utc::now(),
        });
        post_json(&self.client, self.name(), &self.url, payload).await
    }
}

/// Fans each queued alert out to every configured channel, sequentially,
/// with per-channel failure isolation.
pub struct Dispatcher {
    senders: Vec<Box<dyn ChannelSender>>,
}

impl Dispatcher {
    pub fn new(senders: Vec<Box<dyn ChannelSender>>) -> Self {
        Self { senders }
    }

    pub fn from_config(cfg: &Config) -> Self {
        let client = Client::builder()
            .timeout(http::NOTIFY_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client for notifications");

        let mut senders: Vec<Box<dyn ChannelSender>> = Vec::new();
        if cfg.pagerduty.enabled {
            senders.push(Box::new(PagerdutySender {
                client: client.clone(),
                routing_key: cfg.pagerduty.api_key.clone(),
                url: PAGERDUTY_URL.to_string(),
            }));
        }
        if cfg.discord.enabled {
            senders.push(Box::new(DiscordSender {
                client: client.clone(),
                webhook: cfg.discord.webhook.clone(),
            }));
        }
        if cfg.telegram.enabled {
            senders.push(Box::new(TelegramSender {
                client: client.clone(),
                base_url: TELEGRAM_URL.to_string(),
                api_key: cfg.telegram.api_key.clone(),
                channel: cfg.telegram.channel.clone(),
            }));
        }
        if cfg.slack.enabled {
            senders.push(Box::new(SlackSender {
                client: client.clone(),
                webhook: cfg.slack.webhook.clone(),
            }));
        }
        if cfg.webhook.enabled {
            senders.push(Box::new(WebhookSender {
                client,
                url: cfg.webhook.url.clone(),
            }));
        }

        info!("notification dispatcher ready: {} channels", senders.len());
        Self { senders }
    }

    /// Delivers one alert to every channel. Failures are logged at warning
    /// severity and never stop the remaining channels.
    pub async fn dispatch(&self, msg: &AlertMsg) {
        for sender in &self.senders {
            if let Err(e) = sender.send(msg).await {
                warn!(
                    chain = %msg.chain_id,
                    category = %msg.category,
                    "error sending alert to {}: {}",
                    sender.name(),
                    e
                );
            }
        }
    }

    /// Drains the alert queue until shutdown. Exactly one of these runs;
    /// dispatch order matches enqueue order.
    pub async fn run(self, mut rx: mpsc::Receiver<AlertMsg>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("alert dispatcher shutting down");
                    return;
                }
                msg = rx.recv() => {
                    match msg {
                        Some(msg) => self.dispatch(&msg).await,
                        None => return,
                    }
                }
            }
        }
    }
}
