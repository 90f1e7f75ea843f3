// File: valwatch/src/alerts.rs
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

/// Alert severity, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    /// Wire value used by paging integrations
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

/// The condition a given alarm tracks. One active alarm may exist per
/// (chain, category) pair; `NodeDown` carries the endpoint URL so each
/// endpoint gets its own slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum AlertCategory {
    /// No new blocks observed for too long
    Stalled,

    /// Too many consecutive missed signatures
    ConsecutiveMissed,

    /// Missed share of the signing window above threshold
    PercentMissed,

    /// Validator absent from the active set
    Inactive,

    /// A single RPC endpoint is unreachable
    NodeDown(String),

    /// Every configured RPC endpoint is unreachable
    NoNodes,
}

impl fmt::Display for AlertCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertCategory::Stalled => write!(f, "stalled"),
            AlertCategory::ConsecutiveMissed => write!(f, "consecutive_missed"),
            AlertCategory::PercentMissed => write!(f, "percent_missed"),
            AlertCategory::Inactive => write!(f, "inactive"),
            AlertCategory::NodeDown(url) => write!(f, "node_down:{}", url),
            AlertCategory::NoNodes => write!(f, "no_nodes"),
        }
    }
}

/// A persisted alarm. Created on first trigger, marked inactive (not
/// removed) on resolution, and carried across restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alarm {
    pub chain_id: String,
    pub category: AlertCategory,
    pub severity: Severity,
    pub active: bool,
    pub first_triggered: DateTime<Utc>,
    pub last_notified: DateTime<Utc>,
}

/// Transient alert value handed to the dispatcher, consumed once.
#[derive(Debug, Clone)]
pub struct AlertMsg {
    pub chain_id: String,
    pub category: AlertCategory,
    pub severity: Severity,
    pub message: String,
    pub resolved: bool,
}

type AlarmKey = (String, AlertCategory);

/// Per (chain, category) alarm state machine. Entering the active state
/// emits exactly one triggered message; entering the inactive state emits
/// exactly one resolved message; everything in between is deduplicated.
pub struct AlertEngine {
    alarms: Mutex<HashMap<AlarmKey, Alarm>>,
    tx: mpsc::Sender<AlertMsg>,
    /// Optional re-notify cadence per chain, in minutes. Absent means an
    /// active alarm never re-emits.
    renotify: HashMap<String, u32>,
}

impl AlertEngine {
    pub fn new(tx: mpsc::Sender<AlertMsg>, renotify: HashMap<String, u32>) -> Self {
        Self {
            alarms: Mutex::new(HashMap::new()),
            tx,
            renotify,
        }
    }

    /// Evaluates a condition that is currently true. Emits a triggered
    /// message only on the inactive-to-active transition, or again when the
    /// chain's re-notify interval has elapsed while the alarm stays active.
    pub async fn trigger(
        &self,
        chain_id: &str,
        category: AlertCategory,
        severity: Severity,
        message: &str,
    ) {
        let now = Utc::now();
        let emit = {
            let mut alarms = self.alarms.lock().await;
            let key = (chain_id.to_string(), category.clone());
            match alarms.get_mut(&key) {
                Some(alarm) if alarm.active => {
                    match self.renotify.get(chain_id) {
                        Some(minutes)
                            if now - alarm.last_notified
                                >= ChronoDuration::minutes(i64::from(*minutes)) =>
                        {
                            alarm.last_notified = now;
                            alarm.severity = severity;
                            true
                        }
                        _ => {
                            debug!(chain = chain_id, category = %category, "alarm already active");
                            false
                        }
                    }
                }
                Some(alarm) => {
                    alarm.active = true;
                    alarm.severity = severity;
                    alarm.first_triggered = now;
                    alarm.last_notified = now;
                    true
                }
                None => {
                    alarms.insert(
                        key,
                        Alarm {
                            chain_id: chain_id.to_string(),
                            category: category.clone(),
                            severity,
                            active: true,
                            first_triggered: now,
                            last_notified: now,
                        },
                    );
                    true
                }
            }
        };

        if emit {
            self.emit(AlertMsg {
                chain_id: chain_id.to_string(),
                category,
                severity,
                message: message.to_string(),
                resolved: false,
            })
            .await;
        }
    }

    /// Evaluates a condition that is currently false. Emits a resolved
    /// message only on the active-to-inactive transition.
    pub async fn clear(&self, chain_id: &str, category: AlertCategory, message: &str) {
        let emit = {
            let mut alarms = self.alarms.lock().await;
            let key = (chain_id.to_string(), category.clone());
            match alarms.get_mut(&key) {
                Some(alarm) if alarm.active => {
                    alarm.active = false;
                    Some(alarm.severity)
                }
                _ => None,
            }
        };

        if let Some(severity) = emit {
            self.emit(AlertMsg {
                chain_id: chain_id.to_string(),
                category,
                severity,
                message: message.to_string(),
                resolved: true,
            })
            .await;
        }
    }

    /// Seeds the alarm set from a restored snapshot. Restored alarms are
    /// already-notified: no trigger message fires for them, but a later
    /// clear resolves them normally.
    pub async fn restore(&self, saved: Vec<Alarm>) {
        let mut alarms = self.alarms.lock().await;
        for alarm in saved {
            if !alarm.active {
                continue;
            }
            let key = (alarm.chain_id.clone(), alarm.category.clone());
            alarms.insert(key, alarm);
        }
    }

    /// The currently active alarms, for persistence.
    pub async fn snapshot(&self) -> Vec<Alarm> {
        let alarms = self.alarms.lock().await;
        alarms.values().filter(|a| a.active).cloned().collect()
    }

    async fn emit(&self, msg: AlertMsg) {
        if self.tx.send(msg).await.is_err() {
            warn!("alert queue closed, dropping alert");
        }
    }
}
