// File: valwatch/src/chain/health.rs
//! Periodic endpoint prober. Runs beside the stream loop on its own
//! timer, owns the node up/down flags, and raises the node-down,
//! no-nodes, and stalled alarms.

use crate::alerts::{AlertCategory, Severity};
use crate::chain::Chain;
use crate::feed::{ChainUpdate, LogLevel};
use crate::rpc;
use crate::run::App;
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

enum AlarmAction {
    Trigger(AlertCategory, Severity, String),
    Clear(AlertCategory, String),
}

pub struct HealthMonitor {
    app: Arc<App>,
    chain: Arc<Chain>,
}

impl HealthMonitor {
    pub fn new(app: Arc<App>, chain: Arc<Chain>) -> Self {
        Self { app, chain }
    }

    pub async fn run(self, cancel: CancellationToken) {
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.app.cfg.check_interval_seconds));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = interval.tick() => self.check_chain().await,
            }
        }
    }

    async fn check_chain(&self) {
        let urls: Vec<String> = {
            let state = self.chain.state.lock().await;
            state.nodes.iter().map(|n| n.url.clone()).collect()
        };
        if urls.is_empty() {
            return;
        }

        let probes = urls.iter().map(|url| self.probe(url.clone()));
        let results = join_all(probes).await;

        let chain_id = self.chain.chain_id().to_string();
        let now = Utc::now();
        let mut actions = Vec::new();

        let update = {
            let mut state = self.chain.state.lock().await;
            for (node, healthy) in state.nodes.iter_mut().zip(results.iter()) {
                if *healthy {
                    if node.down {
                        self.app.feeds.log(
                            LogLevel::Info,
                            format!("🟢 {}: node {} is back up", chain_id, node.url),
                        );
                    }
                    node.mark_up();
                    if node.alert_if_down {
                        actions.push(AlarmAction::Clear(
                            AlertCategory::NodeDown(node.url.clone()),
                            format!("RPC node {} is responding", node.url),
                        ));
                    }
                } else {
                    if !node.down {
                        self.app.feeds.log(
                            LogLevel::Warn,
                            format!("🔴 {}: node {} is down", chain_id, node.url),
                        );
                    }
                    node.mark_down(now);
                    if node.alert_if_down
                        && node.down_minutes(now) >= self.app.cfg.node_down_alert_minutes
                    {
                        actions.push(AlarmAction::Trigger(
                            AlertCategory::NodeDown(node.url.clone()),
                            Severity::Warning,
                            format!(
                                "RPC node {} has been down for {} minutes",
                                node.url,
                                node.down_minutes(now)
                            ),
                        ));
                    }
                }
            }

            if state.nodes.iter().all(|n| n.down) {
                actions.push(AlarmAction::Trigger(
                    AlertCategory::NoNodes,
                    Severity::Critical,
                    "no RPC endpoints are working".to_string(),
                ));
            } else {
                actions.push(AlarmAction::Clear(
                    AlertCategory::NoNodes,
                    "at least one RPC endpoint is working".to_string(),
                ));
            }

            let alerts_cfg = &self.chain.cfg.alerts;
            if alerts_cfg.stalled_enabled {
                if let Some(last) = state.last_block_time {
                    let stalled_for = (now - last).num_minutes();
                    if stalled_for >= alerts_cfg.stalled_minutes {
                        actions.push(AlarmAction::Trigger(
                            AlertCategory::Stalled,
                            Severity::Warning,
                            format!("no new blocks observed for {} minutes", stalled_for),
                        ));
                    } else {
                        actions.push(AlarmAction::Clear(
                            AlertCategory::Stalled,
                            "chain is producing blocks again".to_string(),
                        ));
                    }
                }
            }

            ChainUpdate {
                chain_id: chain_id.clone(),
                name: self.chain.name.clone(),
                height: state.last_block_height,
                last_block_at: state.last_block_time,
                nodes_up: state.nodes_up(),
                nodes_total: state.nodes.len(),
                window_len: state.window.len(),
                missed_in_window: state.window.missed(),
                consecutive_missed: state.window.consecutive_missed(),
                min_signed_per_window: state.min_signed_per_window,
                in_active_set: state.in_active_set,
            }
        };

        for action in actions {
            match action {
                AlarmAction::Trigger(category, severity, message) => {
                    self.app
                        .alerts
                        .trigger(&chain_id, category, severity, &message)
                        .await;
                }
                AlarmAction::Clear(category, message) => {
                    self.app.alerts.clear(&chain_id, category, &message).await;
                }
            }
        }

        self.app.feeds.update(update);
    }

    /// One endpoint probe: reachable, parseable, and not catching up.
    async fn probe(&self, url: String) -> bool {
        match rpc::fetch_status(&self.app.http, &url).await {
            Ok(status) => !status.sync_info.catching_up,
            Err(e) => {
                debug!(chain = self.chain.chain_id(), "probe of {} failed: {}", url, e);
                false
            }
        }
    }
}
