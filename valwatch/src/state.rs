// File: valwatch/src/state.rs
//! Crash-safe persistence of the alarm set, signing windows, and known
//! node outages. Written once at shutdown, read once at startup; a
//! missing or unreadable file never prevents the daemon from running.

use crate::alerts::Alarm;
use crate::errors::PersistenceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

/// The on-disk state document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SavedState {
    #[serde(default)]
    pub alarms: Vec<Alarm>,
    /// Per-chain ring buffer contents, newest last
    #[serde(default)]
    pub blocks: HashMap<String, Vec<i32>>,
    /// Per-chain, per-endpoint down-since stamps
    #[serde(default)]
    pub nodes_down: HashMap<String, HashMap<String, DateTime<Utc>>>,
}

/// Reads the state file. Absent or unparseable files yield an empty state;
/// monitoring must start either way.
pub async fn load(path: &Path) -> SavedState {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) => {
            info!("no saved state at {} ({}), starting fresh", path.display(), e);
            return SavedState::default();
        }
    };

    match serde_json::from_str::<SavedState>(&content) {
        Ok(state) => {
            info!(
                "restored state: {} alarms, {} chains with block history",
                state.alarms.len(),
                state.blocks.len()
            );
            state
        }
        Err(e) => {
            warn!(
                "{}",
                PersistenceError::Corrupt {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                }
            );
            SavedState::default()
        }
    }
}

/// Serializes the snapshot to a temporary path, then atomically renames it
/// over the state file.
pub async fn save(path: &Path, state: &SavedState) -> Result<(), PersistenceError> {
    let body = serde_json::to_vec_pretty(state).map_err(|e| PersistenceError::WriteFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let tmp = path.with_extension("tmp");
    fs::write(&tmp, &body)
        .await
        .map_err(|e| PersistenceError::WriteFailed {
            path: tmp.display().to_string(),
            reason: e.to_string(),
        })?;

    fs::rename(&tmp, path)
        .await
        .map_err(|e| PersistenceError::WriteFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

    info!(
        "state saved: {} alarms, {} chains",
        state.alarms.len(),
        state.blocks.len()
    );
    Ok(())
}
