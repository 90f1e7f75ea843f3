// File: valwatch/src/run.rs
//! Wires the monitor together: one runtime object built at startup and
//! shared by reference, per-chain task groups, the single alert and log
//! drains, signal handling, and the best-effort state save on shutdown.

use crate::alerts::AlertEngine;
use crate::cache::{CacheKey, TtlCache};
use crate::chain::health::HealthMonitor;
use crate::chain::watcher::ChainWatcher;
use crate::chain::Chain;
use crate::config::Config;
use crate::constants::{http, monitor, queues, registry};
use crate::errors::ConfigError;
use crate::feed::{self, Feeds, LogBroadcaster};
use crate::notify::Dispatcher;
use crate::registry::ChainRegistry;
use crate::state::{self, SavedState};
use anyhow::Result;
use reqwest::Client;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Everything the monitoring tasks share, constructed once at startup and
/// passed by reference; no process-wide mutable state.
pub struct App {
    pub cfg: Arc<Config>,
    pub registry: ChainRegistry,
    pub alerts: AlertEngine,
    pub feeds: Feeds,
    pub chains: HashMap<String, Arc<Chain>>,
    pub cancel: CancellationToken,
    pub http: Client,
    pub validator_sets: TtlCache<CacheKey, Vec<String>>,
}

impl App {
    pub fn new(
        cfg: Arc<Config>,
        alert_tx: mpsc::Sender<crate::alerts::AlertMsg>,
        feeds: Feeds,
        cancel: CancellationToken,
    ) -> Self {
        let http = Client::builder()
            .timeout(http::RPC_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        let chains = cfg
            .chains
            .iter()
            .map(|(name, chain_cfg)| {
                let chain = Arc::new(Chain::new(name.clone(), chain_cfg.clone()));
                (chain_cfg.chain_id.clone(), chain)
            })
            .collect();

        let alerts = AlertEngine::new(alert_tx, cfg.renotify_map());

        Self {
            cfg,
            registry: ChainRegistry::new(),
            alerts,
            feeds,
            chains,
            cancel,
            http,
            validator_sets: TtlCache::new(),
        }
    }

    /// Seeds alarms, signing windows, and known-down nodes from a restored
    /// snapshot.
    pub async fn restore(&self, saved: &SavedState) {
        self.alerts.restore(saved.alarms.clone()).await;

        for (chain_id, chain) in &self.chains {
            let mut state = chain.state.lock().await;
            if let Some(blocks) = saved.blocks.get(chain_id) {
                state.window.restore(blocks);
            }
            if let Some(downs) = saved.nodes_down.get(chain_id) {
                for node in &mut state.nodes {
                    if let Some(since) = downs.get(&node.url) {
                        node.down = true;
                        node.down_since = Some(*since);
                    }
                }
            }
        }
    }

    /// Collects the state document under the alarm and chain locks.
    pub async fn snapshot(&self) -> SavedState {
        let mut saved = SavedState {
            alarms: self.alerts.snapshot().await,
            ..Default::default()
        };

        for (chain_id, chain) in &self.chains {
            let state = chain.state.lock().await;
            if !state.window.is_empty() {
                saved.blocks.insert(chain_id.clone(), state.window.as_vec());
            }
            let downs: HashMap<String, chrono::DateTime<chrono::Utc>> = state
                .nodes
                .iter()
                .filter(|n| n.down)
                .filter_map(|n| n.down_since.map(|since| (n.url.clone(), since)))
                .collect();
            if !downs.is_empty() {
                saved.nodes_down.insert(chain_id.clone(), downs);
            }
        }

        saved
    }
}

/// Runs the monitor until a termination signal arrives, then saves state
/// best-effort and returns.
pub async fn run(cfg: Config, state_file: PathBuf) -> Result<()> {
    let (problems, fatal) = cfg.validate();
    for problem in &problems {
        warn!("config: {}", problem);
    }
    if fatal {
        return Err(ConfigError::Invalid { problems }.into());
    }
    info!("config is valid, starting monitoring for {} chains", cfg.chains.len());

    let saved = state::load(&state_file).await;

    let (alert_tx, alert_rx) = mpsc::channel(queues::ALERT_DEPTH);
    let (feeds, receivers) = feed::channels();
    let cancel = CancellationToken::new();

    let app = Arc::new(App::new(
        Arc::new(cfg),
        alert_tx,
        feeds,
        cancel.clone(),
    ));
    app.restore(&saved).await;

    // refresh the chain-id to path mapping now and periodically; failures
    // leave the bootstrap table in place
    {
        let app = app.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                if let Err(e) = app.registry.refresh().await {
                    warn!("chain registry refresh failed: {}", e);
                }
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(registry::REFRESH_INTERVAL) => {}
                }
            }
        });
    }

    // exactly one alert drain: dispatch order matches enqueue order
    let dispatcher = Dispatcher::from_config(&app.cfg);
    tokio::spawn(dispatcher.run(alert_rx, cancel.clone()));

    // exactly one log drain; dashboard serving itself is an external
    // collaborator, so the snapshot and stats feeds are drained here
    let broadcaster = LogBroadcaster::new(app.cfg.hide_logs);
    tokio::spawn(broadcaster.run(receivers.logs, cancel.clone()));
    tokio::spawn(feed::drain(receivers.updates, cancel.clone()));
    tokio::spawn(feed::drain(receivers.stats, cancel.clone()));

    if app.cfg.healthcheck.enabled {
        let app = app.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { ping_healthcheck(app, cancel).await });
    }

    for chain in app.chains.values() {
        spawn_chain_tasks(app.clone(), chain.clone());
    }

    // the save task owns the shutdown sequence: wait for cancellation,
    // snapshot under the locks, write, then signal completion
    let (saved_tx, saved_rx) = oneshot::channel();
    {
        let app = app.clone();
        let cancel = cancel.clone();
        let path = state_file.clone();
        tokio::spawn(async move {
            cancel.cancelled().await;
            info!("saving state");
            let snapshot = app.snapshot().await;
            if let Err(e) = state::save(&path, &snapshot).await {
                error!("{}", e);
            }
            let _ = saved_tx.send(());
        });
    }

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            info!("shutdown signal received");
            cancel.cancel();
        });
    }

    cancel.cancelled().await;
    let _ = saved_rx.await;
    info!("exiting");
    Ok(())
}

/// Starts the stream loop and the health prober for one chain, each under
/// a supervisor that restarts the task if it ever aborts before shutdown.
fn spawn_chain_tasks(app: Arc<App>, chain: Arc<Chain>) {
    {
        let app = app.clone();
        let chain = chain.clone();
        tokio::spawn(async move {
            let cancel = app.cancel.clone();
            loop {
                let watcher = ChainWatcher::new(app.clone(), chain.clone());
                let result = tokio::spawn(watcher.run(cancel.clone())).await;
                if cancel.is_cancelled() {
                    return;
                }
                match result {
                    Ok(()) => return,
                    Err(e) => error!(
                        "watch task for {} aborted: {}, restarting",
                        chain.chain_id(),
                        e
                    ),
                }
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(monitor::RECONNECT_BACKOFF) => {}
                }
            }
        });
    }

    tokio::spawn(async move {
        let cancel = app.cancel.clone();
        loop {
            let prober = HealthMonitor::new(app.clone(), chain.clone());
            let result = tokio::spawn(prober.run(cancel.clone())).await;
            if cancel.is_cancelled() {
                return;
            }
            match result {
                Ok(()) => return,
                Err(e) => error!(
                    "health prober for {} aborted: {}, restarting",
                    chain.chain_id(),
                    e
                ),
            }
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(monitor::RECONNECT_BACKOFF) => {}
            }
        }
    });
}

/// Dead-man's-switch pinger: tells an external health service this
/// monitor is alive.
async fn ping_healthcheck(app: Arc<App>, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(Duration::from_secs(
        app.cfg.healthcheck.ping_interval_minutes * 60,
    ));
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = interval.tick() => {
                match app.http.get(&app.cfg.healthcheck.ping_url).send().await {
                    Ok(response) if response.status().is_success() => {
                        debug!("healthcheck ping sent");
                    }
                    Ok(response) => {
                        warn!("healthcheck ping returned HTTP {}", response.status());
                    }
                    Err(e) => {
                        warn!("healthcheck ping failed: {}", e);
                    }
                }
            }
        }
    }
}

async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sig) => sig,
        Err(e) => {
            error!("failed to install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    let mut sighup = match signal(SignalKind::hangup()) {
        Ok(sig) => sig,
        Err(e) => {
            error!("failed to install SIGHUP handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
        _ = sighup.recv() => {}
    }
}
