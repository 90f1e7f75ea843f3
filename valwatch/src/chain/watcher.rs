// File: valwatch/src/chain/watcher.rs
//! Per-chain watch loop: pick a reachable endpoint, load signing-window
//! parameters and validator info, then consume the NewBlock stream until
//! it fails. Failures sleep a fixed five seconds and start over; only the
//! shared shutdown signal ends the loop.

use crate::alerts::{AlertCategory, Severity};
use crate::cache::CacheKey;
use crate::chain::{BlockStatus, Chain};
use crate::constants::monitor;
use crate::feed::{ChainStats, ChainUpdate, LogLevel};
use crate::registry::check_chain_id;
use crate::rpc::{self, BlockEvent};
use crate::run::App;
use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct ChainWatcher {
    app: Arc<App>,
    chain: Arc<Chain>,
}

impl ChainWatcher {
    pub fn new(app: Arc<App>, chain: Arc<Chain>) -> Self {
        Self { app, chain }
    }

    pub async fn run(self, cancel: CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                return;
            }

            if let Err(e) = self.watch_once(&cancel).await {
                self.app.feeds.log(
                    LogLevel::Warn,
                    format!("🌀 {}: {}, restarting monitoring", self.chain.chain_id(), e),
                );
            } else {
                return; // clean exit, shutdown signalled
            }

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(monitor::RECONNECT_BACKOFF) => {}
            }
        }
    }

    async fn watch_once(&self, cancel: &CancellationToken) -> Result<()> {
        let url = self.connect().await?;
        self.load_directory_data().await;
        self.refresh_validator_membership(&url).await;
        self.consume_stream(&url, cancel).await
    }

    /// Finds a usable endpoint in failover order, falling back to the
    /// public RPC proxy when every configured node is out and the chain
    /// allows it.
    async fn connect(&self) -> Result<String> {
        let candidates: Vec<(usize, String)> = {
            let state = self.chain.state.lock().await;
            state
                .failover_order()
                .into_iter()
                .map(|i| (i, state.nodes[i].url.clone()))
                .collect()
        };

        for (idx, url) in candidates {
            match rpc::fetch_status(&self.app.http, &url).await {
                Ok(status) if status.sync_info.catching_up => {
                    debug!(chain = self.chain.chain_id(), "{} is catching up, skipping", url);
                }
                Ok(status) => {
                    debug!(
                        chain = self.chain.chain_id(),
                        "connected to {} ({}) at height {}",
                        url,
                        status.node_info.moniker,
                        status.height()
                    );
                    let mut state = self.chain.state.lock().await;
                    state.preferred = Some(idx);
                    return Ok(url);
                }
                Err(e) => {
                    debug!(chain = self.chain.chain_id(), "{} unreachable: {}", url, e);
                }
            }
        }

        if self.chain.cfg.public_fallback {
            let url = self
                .app
                .registry
                .lookup(self.chain.chain_id())
                .unwrap_or_else(|| {
                    self.app
                        .registry
                        .proxy_url_for_name(&self.chain.effective_chain_name())
                });
            if rpc::fetch_status(&self.app.http, &url).await.is_ok() {
                self.app.feeds.log(
                    LogLevel::Warn,
                    format!(
                        "{}: all configured nodes failed, using public proxy {}",
                        self.chain.chain_id(),
                        url
                    ),
                );
                return Ok(url);
            }
        }

        Err(anyhow!("no usable RPC endpoint"))
    }

    /// Loads the directory snapshot for this chain. A chain-id mismatch or
    /// fetch failure is a warning; monitoring runs without the snapshot.
    async fn load_directory_data(&self) {
        let chain_name = self.chain.effective_chain_name();
        let data = match self.app.registry.fetch_chain_data(&chain_name).await {
            Ok(data) => data,
            Err(e) => {
                debug!(chain = self.chain.chain_id(), "no directory data: {}", e);
                return;
            }
        };

        if let Err(e) = check_chain_id(self.chain.chain_id(), &data) {
            warn!(chain = self.chain.chain_id(), "{}", e);
            return;
        }

        let mut state = self.chain.state.lock().await;
        if let Some((window, min_signed)) = data.signing_window() {
            debug!(
                chain = self.chain.chain_id(),
                "signing window {} blocks, min signed {:.2}", window, min_signed
            );
            state.min_signed_per_window = min_signed;
        }
        state.directory = Some(data);
    }

    /// Refreshes active-set membership, reusing a cached validator set
    /// between reconnects. Errors keep the previous answer.
    async fn refresh_validator_membership(&self, url: &str) {
        let key = CacheKey::ValidatorSet(self.chain.chain_id().to_string());
        let validators = match self.app.validator_sets.get(&key).await {
            Some(validators) => validators,
            None => match rpc::fetch_validator_set(&self.app.http, url).await {
                Ok(validators) => {
                    self.app
                        .validator_sets
                        .set(key, validators.clone(), monitor::VALIDATOR_SET_TTL)
                        .await;
                    validators
                }
                Err(e) => {
                    warn!(chain = self.chain.chain_id(), "🛑 validator set fetch failed: {}", e);
                    return;
                }
            },
        };

        let address = self.chain.cfg.validator_address.to_uppercase();
        let in_set = validators.iter().any(|v| *v == address);
        {
            let mut state = self.chain.state.lock().await;
            state.in_active_set = in_set;
        }

        if self.chain.cfg.alerts.alert_if_inactive {
            if in_set {
                self.app
                    .alerts
                    .clear(
                        self.chain.chain_id(),
                        AlertCategory::Inactive,
                        "validator is in the active set",
                    )
                    .await;
            } else {
                self.app
                    .alerts
                    .trigger(
                        self.chain.chain_id(),
                        AlertCategory::Inactive,
                        Severity::Critical,
                        "validator is not in the active set",
                    )
                    .await;
            }
        }
    }

    /// Subscribes to NewBlock events and consumes them until the stream
    /// fails or shutdown is signalled. A silent stream beyond the read
    /// timeout counts as a failure.
    async fn consume_stream(&self, url: &str, cancel: &CancellationToken) -> Result<()> {
        let ws_url = rpc::ws_endpoint(url);
        let (mut ws, _) = connect_async(ws_url.as_str())
            .await
            .map_err(|e| anyhow!("websocket connect to {} failed: {}", ws_url, e))?;

        ws.send(Message::Text(rpc::subscribe_request()))
            .await
            .map_err(|e| anyhow!("subscribe failed: {}", e))?;

        debug!(chain = self.chain.chain_id(), "subscribed to block events on {}", ws_url);

        loop {
            let frame = tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = ws.close(None).await;
                    return Ok(());
                }
                frame = tokio::time::timeout(monitor::STREAM_READ_TIMEOUT, ws.next()) => frame,
            };

            let msg = match frame {
                Err(_) => bail!(
                    "no data for {}s on {}",
                    monitor::STREAM_READ_TIMEOUT.as_secs(),
                    ws_url
                ),
                Ok(None) => bail!("websocket closed by {}", ws_url),
                Ok(Some(Err(e))) => bail!("websocket error on {}: {}", ws_url, e),
                Ok(Some(Ok(msg))) => msg,
            };

            match msg {
                Message::Text(text) => {
                    if let Some(event) = rpc::parse_block_event(&text) {
                        self.apply_block(event).await;
                    }
                }
                Message::Ping(payload) => {
                    let _ = ws.send(Message::Pong(payload)).await;
                }
                Message::Close(_) => bail!("websocket closed by {}", ws_url),
                _ => {}
            }
        }
    }

    /// Records one observed block and re-evaluates the signing alarms.
    async fn apply_block(&self, event: BlockEvent) {
        let address = self.chain.cfg.validator_address.to_uppercase();
        let chain_id = self.chain.chain_id().to_string();
        let alerts_cfg = &self.chain.cfg.alerts;

        let (consecutive, percent, window_len, update, stats) = {
            let mut state = self.chain.state.lock().await;
            state.last_block_height = event.height;
            state.last_block_time = Some(Utc::now());

            // an inactive validator signs nothing; recording misses would
            // only produce noise on top of the inactive alarm
            if state.in_active_set {
                let status = if event.proposed_by(&address) {
                    BlockStatus::Proposed
                } else if event.signed_by(&address) {
                    BlockStatus::Signed
                } else {
                    BlockStatus::Missed
                };
                state.window.push(status);
            }

            (
                state.window.consecutive_missed(),
                state.window.missed_percent(),
                state.window.len(),
                ChainUpdate {
                    chain_id: chain_id.clone(),
                    name: self.chain.name.clone(),
                    height: event.height,
                    last_block_at: state.last_block_time,
                    nodes_up: state.nodes_up(),
                    nodes_total: state.nodes.len(),
                    window_len: state.window.len(),
                    missed_in_window: state.window.missed(),
                    consecutive_missed: state.window.consecutive_missed(),
                    min_signed_per_window: state.min_signed_per_window,
                    in_active_set: state.in_active_set,
                },
                ChainStats {
                    chain_id: chain_id.clone(),
                    height: event.height,
                    missed_blocks: state.window.missed(),
                    window_len: state.window.len(),
                },
            )
        };

        if alerts_cfg.consecutive_enabled {
            if consecutive >= alerts_cfg.consecutive_missed as usize {
                self.app
                    .alerts
                    .trigger(
                        &chain_id,
                        AlertCategory::ConsecutiveMissed,
                        alerts_cfg.consecutive_priority,
                        &format!("missed {} blocks in a row", consecutive),
                    )
                    .await;
            } else {
                self.app
                    .alerts
                    .clear(
                        &chain_id,
                        AlertCategory::ConsecutiveMissed,
                        "signing blocks again",
                    )
                    .await;
            }
        }

        if alerts_cfg.percentage_enabled && window_len >= monitor::MIN_WINDOW_SAMPLE {
            if percent >= alerts_cfg.percentage_missed {
                self.app
                    .alerts
                    .trigger(
                        &chain_id,
                        AlertCategory::PercentMissed,
                        alerts_cfg.percentage_priority,
                        &format!("missed {:.1}% of the signing window", percent),
                    )
                    .await;
            } else {
                self.app
                    .alerts
                    .clear(
                        &chain_id,
                        AlertCategory::PercentMissed,
                        "missed share of the window is back under threshold",
                    )
                    .await;
            }
        }

        self.app.feeds.update(update);
        self.app.feeds.stats(stats);
    }
}
