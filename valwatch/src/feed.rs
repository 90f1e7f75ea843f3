// File: valwatch/src/feed.rs
//! Broadcast plumbing for the dashboard and metrics collaborators: a
//! structured log feed with an explicit subscriber list, a chain-state
//! snapshot feed, and a per-chain statistics feed. Producers never block;
//! when a collaborator is disabled the orchestrator installs a drain.

use crate::constants::queues;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Log severity carried on every record; no untyped values on the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// One structured log record for the dashboard feed.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub level: LogLevel,
    pub ts: DateTime<Utc>,
    pub message: String,
}

/// Point-in-time snapshot of one chain's monitoring state.
#[derive(Debug, Clone, Serialize)]
pub struct ChainUpdate {
    pub chain_id: String,
    pub name: String,
    pub height: i64,
    pub last_block_at: Option<DateTime<Utc>>,
    pub nodes_up: usize,
    pub nodes_total: usize,
    pub window_len: usize,
    pub missed_in_window: usize,
    pub consecutive_missed: usize,
    pub min_signed_per_window: f64,
    pub in_active_set: bool,
}

/// Per-chain counters for the metrics collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct ChainStats {
    pub chain_id: String,
    pub height: i64,
    pub missed_blocks: usize,
    pub window_len: usize,
}

/// Producer-side handles, cheap to clone into every task.
#[derive(Clone)]
pub struct Feeds {
    log_tx: mpsc::Sender<LogRecord>,
    update_tx: mpsc::Sender<ChainUpdate>,
    stats_tx: mpsc::Sender<ChainStats>,
}

/// Consumer-side ends, handed to the collaborators or to drains.
pub struct FeedReceivers {
    pub logs: mpsc::Receiver<LogRecord>,
    pub updates: mpsc::Receiver<ChainUpdate>,
    pub stats: mpsc::Receiver<ChainStats>,
}

pub fn channels() -> (Feeds, FeedReceivers) {
    let (log_tx, logs) = mpsc::channel(queues::FEED_DEPTH);
    let (update_tx, updates) = mpsc::channel(queues::FEED_DEPTH);
    let (stats_tx, stats) = mpsc::channel(queues::FEED_DEPTH);
    (
        Feeds {
            log_tx,
            update_tx,
            stats_tx,
        },
        FeedReceivers {
            logs,
            updates,
            stats,
        },
    )
}

impl Feeds {
    /// Queues a log record. Drops on a full queue rather than blocking the
    /// monitoring loops.
    pub fn log(&self, level: LogLevel, message: String) {
        let record = LogRecord {
            level,
            ts: Utc::now(),
            message,
        };
        let _ = self.log_tx.try_send(record);
    }

    pub fn update(&self, update: ChainUpdate) {
        let _ = self.update_tx.try_send(update);
    }

    pub fn stats(&self, stats: ChainStats) {
        let _ = self.stats_tx.try_send(stats);
    }
}

/// The single drain of the log queue. Every record is emitted through
/// `tracing` and, unless log forwarding is hidden, copied to each
/// registered subscriber.
pub struct LogBroadcaster {
    subscribers: Mutex<Vec<mpsc::Sender<LogRecord>>>,
    hide_logs: bool,
}

impl LogBroadcaster {
    pub fn new(hide_logs: bool) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            hide_logs,
        }
    }

    /// Registers a dashboard-style consumer and returns its receiving end.
    pub async fn subscribe(&self) -> mpsc::Receiver<LogRecord> {
        let (tx, rx) = mpsc::channel(queues::FEED_DEPTH);
        self.subscribers.lock().await.push(tx);
        rx
    }

    pub async fn run(self, mut rx: mpsc::Receiver<LogRecord>, cancel: CancellationToken) {
        loop {
            let record = tokio::select! {
                _ = cancel.cancelled() => return,
                record = rx.recv() => match record {
                    Some(record) => record,
                    None => return,
                },
            };

            match record.level {
                LogLevel::Debug => debug!("{}", record.message),
                LogLevel::Info => info!("{}", record.message),
                LogLevel::Warn => warn!("{}", record.message),
                LogLevel::Error => error!("{}", record.message),
            }

            if self.hide_logs {
                continue;
            }
            let mut subscribers = self.subscribers.lock().await;
            subscribers.retain(|tx| match tx.try_send(record.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => true,
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            });
        }
    }
}

/// Consumes a feed indefinitely so producers never back up. Used when the
/// corresponding collaborator is disabled.
pub async fn drain<T: Send + 'static>(mut rx: mpsc::Receiver<T>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            item = rx.recv() => {
                if item.is_none() {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_records_reach_subscribers() {
        let (feeds, receivers) = channels();
        let broadcaster = LogBroadcaster::new(false);
        let mut sub = broadcaster.subscribe().await;

        let cancel = CancellationToken::new();
        let task = tokio::spawn(broadcaster.run(receivers.logs, cancel.clone()));

        feeds.log(LogLevel::Warn, "node down".to_string());
        let record = sub.recv().await.expect("forwarded record");
        assert_eq!(record.level, LogLevel::Warn);
        assert_eq!(record.message, "node down");

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn hidden_logs_are_not_forwarded() {
        let (feeds, receivers) = channels();
        let broadcaster = LogBroadcaster::new(true);
        let mut sub = broadcaster.subscribe().await;

        let cancel = CancellationToken::new();
        let task = tokio::spawn(broadcaster.run(receivers.logs, cancel.clone()));

        feeds.log(LogLevel::Info, "quiet".to_string());
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(sub.try_recv().is_err());

        cancel.cancel();
        task.await.unwrap();
    }
}
