// File: valwatch/src/chain/mod.rs
pub mod health;
pub mod watcher;

use crate::config::ChainCfg;
use crate::constants::monitor;
use crate::registry::ChainDirectoryData;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use tokio::sync::Mutex;

/// Signing outcome per observed block. The integer values are the
/// persisted wire format in the saved-state document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    Missed,
    Signed,
    Proposed,
}

impl BlockStatus {
    pub fn as_i32(self) -> i32 {
        match self {
            BlockStatus::Missed => 0,
            BlockStatus::Signed => 3,
            BlockStatus::Proposed => 4,
        }
    }
}

/// A configured RPC endpoint with its probe state. Owned by the chain
/// state; only the health prober and the connector touch the flags.
#[derive(Debug, Clone)]
pub struct Node {
    pub url: String,
    pub alert_if_down: bool,
    pub down: bool,
    pub down_since: Option<DateTime<Utc>>,
}

impl Node {
    pub fn new(url: String, alert_if_down: bool) -> Self {
        Self {
            url,
            alert_if_down,
            down: false,
            down_since: None,
        }
    }

    /// Records an up-to-down transition. The down-since stamp is set once;
    /// repeated down observations leave it unchanged.
    pub fn mark_down(&mut self, now: DateTime<Utc>) {
        if !self.down {
            self.down = true;
            self.down_since = Some(now);
        }
    }

    /// Records a down-to-up transition, clearing the down-since stamp.
    pub fn mark_up(&mut self) {
        self.down = false;
        self.down_since = None;
    }

    /// Minutes this node has been continuously down, zero when up.
    pub fn down_minutes(&self, now: DateTime<Utc>) -> i64 {
        match self.down_since {
            Some(since) if self.down => (now - since).num_minutes(),
            _ => 0,
        }
    }
}

/// Fixed-capacity ring of recent signing outcomes, oldest evicted first.
#[derive(Debug)]
pub struct SigningWindow {
    results: VecDeque<i32>,
    capacity: usize,
}

impl SigningWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            results: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, status: BlockStatus) {
        if self.results.len() == self.capacity {
            self.results.pop_front();
        }
        self.results.push_back(status.as_i32());
    }

    /// Seeds the window from a persisted snapshot, keeping the newest
    /// entries when the snapshot exceeds capacity.
    pub fn restore(&mut self, saved: &[i32]) {
        self.results.clear();
        let skip = saved.len().saturating_sub(self.capacity);
        self.results.extend(saved.iter().skip(skip).copied());
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn missed(&self) -> usize {
        self.results
            .iter()
            .filter(|&&r| r == BlockStatus::Missed.as_i32())
            .count()
    }

    /// Run of missed blocks at the newest end of the window.
    pub fn consecutive_missed(&self) -> usize {
        self.results
            .iter()
            .rev()
            .take_while(|&&r| r == BlockStatus::Missed.as_i32())
            .count()
    }

    /// Missed share of the current window contents, as a percentage.
    pub fn missed_percent(&self) -> f64 {
        if self.results.is_empty() {
            return 0.0;
        }
        self.missed() as f64 * 100.0 / self.results.len() as f64
    }

    pub fn as_vec(&self) -> Vec<i32> {
        self.results.iter().copied().collect()
    }
}

/// Mutable per-chain monitoring state, guarded by the chain's lock.
#[derive(Debug)]
pub struct ChainState {
    pub nodes: Vec<Node>,
    /// Index of the most recently successful endpoint
    pub preferred: Option<usize>,
    pub window: SigningWindow,
    /// Fraction of the signing window that must be signed, from the
    /// directory snapshot when available
    pub min_signed_per_window: f64,
    pub last_block_height: i64,
    pub last_block_time: Option<DateTime<Utc>>,
    pub in_active_set: bool,
    pub directory: Option<ChainDirectoryData>,
}

/// One monitored chain: immutable configuration plus locked runtime state.
/// Created at configuration load and alive for the process lifetime.
pub struct Chain {
    pub name: String,
    pub cfg: ChainCfg,
    pub state: Mutex<ChainState>,
}

impl Chain {
    pub fn new(name: String, cfg: ChainCfg) -> Self {
        let nodes = cfg
            .nodes
            .iter()
            .map(|n| Node::new(n.url.clone(), n.alert_if_down))
            .collect();

        Self {
            name,
            cfg,
            state: Mutex::new(ChainState {
                nodes,
                preferred: None,
                window: SigningWindow::new(monitor::SIGNING_WINDOW_CAP),
                min_signed_per_window: 0.0,
                last_block_height: 0,
                last_block_time: None,
                in_active_set: true,
                directory: None,
            }),
        }
    }

    pub fn chain_id(&self) -> &str {
        &self.cfg.chain_id
    }

    /// Directory name for this chain: the configured override, else the
    /// lowercase display name.
    pub fn effective_chain_name(&self) -> String {
        self.cfg
            .chain_name
            .clone()
            .unwrap_or_else(|| self.name.to_lowercase())
    }
}

impl ChainState {
    /// Endpoint indices in connection-attempt order: the most recently
    /// successful endpoint first, then the remaining up endpoints
    /// round-robin; with every endpoint down, the full configured list in
    /// original order.
    pub fn failover_order(&self) -> Vec<usize> {
        let n = self.nodes.len();
        if n == 0 {
            return Vec::new();
        }
        if self.nodes.iter().all(|node| node.down) {
            return (0..n).collect();
        }

        let start = match self.preferred {
            Some(i) if i < n && !self.nodes[i].down => i,
            _ => self
                .nodes
                .iter()
                .position(|node| !node.down)
                .unwrap_or(0),
        };

        (0..n)
            .map(|offset| (start + offset) % n)
            .filter(|&i| !self.nodes[i].down)
            .collect()
    }

    pub fn nodes_up(&self) -> usize {
        self.nodes.iter().filter(|n| !n.down).count()
    }
}
