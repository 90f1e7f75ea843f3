// File: valwatch/src/config/mod.rs
pub mod loader;
use crate::alerts::Severity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
pub use loader::ConfigLoader;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default)]
    pub enable_dashboard: bool,
    #[serde(default)]
    pub hide_logs: bool,
    #[serde(default)]
    pub prometheus_enabled: bool,
    #[serde(default = "default_node_down_minutes")]
    pub node_down_alert_minutes: i64,
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: u64,
    #[serde(default)]
    pub healthcheck: HealthcheckCfg,
    #[serde(default)]
    pub pagerduty: PagerdutyCfg,
    #[serde(default)]
    pub discord: DiscordCfg,
    #[serde(default)]
    pub telegram: TelegramCfg,
    #[serde(default)]
    pub slack: SlackCfg,
    #[serde(default)]
    pub webhook: WebhookCfg,
    #[serde(default)]
    pub chains: HashMap<String, ChainCfg>,
}

fn default_listen() -> String {
    "0.0.0.0:8888".to_string()
}

fn default_node_down_minutes() -> i64 {
    3
}

fn default_check_interval() -> u64 {
    crate::constants::monitor::DEFAULT_CHECK_INTERVAL_SECS
}

/// Dead-man's-switch pinger settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthcheckCfg {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub ping_url: String,
    #[serde(default = "default_ping_minutes")]
    pub ping_interval_minutes: u64,
}

fn default_ping_minutes() -> u64 {
    5
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PagerdutyCfg {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub api_key: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscordCfg {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub webhook: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramCfg {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub channel: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlackCfg {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub webhook: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookCfg {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainCfg {
    pub chain_id: String,
    /// Directory path override; falls back to the lowercase display name
    #[serde(default)]
    pub chain_name: Option<String>,
    /// Hex consensus address matched against block commit signatures
    pub validator_address: String,
    #[serde(default)]
    pub nodes: Vec<NodeCfg>,
    /// Fall back to the public RPC proxy when every configured node fails
    #[serde(default = "default_true")]
    pub public_fallback: bool,
    #[serde(default)]
    pub alerts: AlertsCfg,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeCfg {
    pub url: String,
    #[serde(default = "default_true")]
    pub alert_if_down: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsCfg {
    #[serde(default = "default_true")]
    pub stalled_enabled: bool,
    #[serde(default = "default_stalled_minutes")]
    pub stalled_minutes: i64,
    #[serde(default = "default_true")]
    pub consecutive_enabled: bool,
    #[serde(default = "default_consecutive_missed")]
    pub consecutive_missed: u32,
    #[serde(default = "default_critical")]
    pub consecutive_priority: Severity,
    #[serde(default)]
    pub percentage_enabled: bool,
    #[serde(default = "default_percentage")]
    pub percentage_missed: f64,
    #[serde(default = "default_warning")]
    pub percentage_priority: Severity,
    #[serde(default = "default_true")]
    pub alert_if_inactive: bool,
    /// Re-emit cadence for alarms that stay active; unset means never
    #[serde(default)]
    pub renotify_minutes: Option<u32>,
}

impl Default for AlertsCfg {
    fn default() -> Self {
        Self {
            stalled_enabled: true,
            stalled_minutes: default_stalled_minutes(),
            consecutive_enabled: true,
            consecutive_missed: default_consecutive_missed(),
            consecutive_priority: Severity::Critical,
            percentage_enabled: false,
            percentage_missed: default_percentage(),
            percentage_priority: Severity::Warning,
            alert_if_inactive: true,
            renotify_minutes: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_stalled_minutes() -> i64 {
    10
}

fn default_consecutive_missed() -> u32 {
    5
}

fn default_percentage() -> f64 {
    10.0
}

fn default_critical() -> Severity {
    Severity::Critical
}

fn default_warning() -> Severity {
    Severity::Warning
}

impl Config {
    /// Checks the loaded configuration. Returns the list of problems and
    /// whether any of them is fatal; fatal problems stop the process before
    /// any monitoring begins.
    pub fn validate(&self) -> (Vec<String>, bool) {
        let mut problems = Vec::new();
        let mut fatal = false;

        if self.chains.is_empty() {
            problems.push("no chains configured".to_string());
            fatal = true;
        }

        let mut seen_ids = std::collections::HashSet::new();
        for (name, chain) in &self.chains {
            if !chain.chain_id.trim().is_empty() && !seen_ids.insert(chain.chain_id.clone()) {
                problems.push(format!(
                    "chain '{}' duplicates chain_id {}; one watcher group per chain id",
                    name, chain.chain_id
                ));
                fatal = true;
            }
            if chain.chain_id.trim().is_empty() {
                problems.push(format!("chain '{}' has an empty chain_id", name));
                fatal = true;
            }
            if chain.validator_address.trim().is_empty() {
                problems.push(format!("chain '{}' has no validator_address", name));
                fatal = true;
            }
            if chain.nodes.is_empty() && !chain.public_fallback {
                problems.push(format!(
                    "chain '{}' has no nodes and public_fallback is disabled",
                    name
                ));
                fatal = true;
            }
            if chain.nodes.is_empty() && chain.public_fallback {
                problems.push(format!(
                    "chain '{}' has no nodes, relying on the public RPC proxy",
                    name
                ));
            }
        }

        if self.pagerduty.enabled && self.pagerduty.api_key.trim().is_empty() {
            problems.push("pagerduty is enabled but api_key is empty".to_string());
            fatal = true;
        }
        if self.discord.enabled && self.discord.webhook.trim().is_empty() {
            problems.push("discord is enabled but webhook is empty".to_string());
            fatal = true;
        }
        if self.telegram.enabled
            && (self.telegram.api_key.trim().is_empty() || self.telegram.channel.trim().is_empty())
        {
            problems.push("telegram is enabled but api_key or channel is empty".to_string());
            fatal = true;
        }
        if self.slack.enabled && self.slack.webhook.trim().is_empty() {
            problems.push("slack is enabled but webhook is empty".to_string());
            fatal = true;
        }
        if self.webhook.enabled && self.webhook.url.trim().is_empty() {
            problems.push("webhook is enabled but url is empty".to_string());
            fatal = true;
        }
        if self.healthcheck.enabled && self.healthcheck.ping_url.trim().is_empty() {
            problems.push("healthcheck is enabled but ping_url is empty".to_string());
            fatal = true;
        }
        if self.check_interval_seconds == 0 {
            problems.push("check_interval_seconds must be greater than zero".to_string());
            fatal = true;
        }
        if self.healthcheck.enabled && self.healthcheck.ping_interval_minutes == 0 {
            problems.push("healthcheck ping_interval_minutes must be greater than zero".to_string());
            fatal = true;
        }

        let any_channel = self.pagerduty.enabled
            || self.discord.enabled
            || self.telegram.enabled
            || self.slack.enabled
            || self.webhook.enabled;
        if !any_channel {
            problems.push("no notification channel is enabled, alerts will only be logged".to_string());
        }

        (problems, fatal)
    }

    /// Per-chain re-notify cadence, keyed by chain id.
    pub fn renotify_map(&self) -> HashMap<String, u32> {
        self.chains
            .values()
            .filter_map(|c| {
                c.alerts
                    .renotify_minutes
                    .map(|m| (c.chain_id.clone(), m))
            })
            .collect()
    }
}
