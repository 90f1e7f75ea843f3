//! State persistence tests: the saved document round-trips, and a missing
//! or corrupt file yields an empty state instead of an error.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use valwatch::alerts::{Alarm, AlertCategory, Severity};
use valwatch::config::Config;
use valwatch::feed;
use valwatch::run::App;
use valwatch::state::{self, SavedState};

fn sample_state() -> SavedState {
    let now = Utc::now();
    let mut blocks = HashMap::new();
    blocks.insert("osmosis-1".to_string(), vec![3, 3, 0, 4, 3]);

    let mut osmosis_down = HashMap::new();
    osmosis_down.insert("http://10.0.0.5:26657".to_string(), now);
    let mut nodes_down = HashMap::new();
    nodes_down.insert("osmosis-1".to_string(), osmosis_down);

    SavedState {
        alarms: vec![
            Alarm {
                chain_id: "osmosis-1".to_string(),
                category: AlertCategory::NodeDown("http://10.0.0.5:26657".to_string()),
                severity: Severity::Warning,
                active: true,
                first_triggered: now,
                last_notified: now,
            },
            Alarm {
                chain_id: "juno-1".to_string(),
                category: AlertCategory::Stalled,
                severity: Severity::Warning,
                active: true,
                first_triggered: now,
                last_notified: now,
            },
        ],
        blocks,
        nodes_down,
    }
}

#[tokio::test]
async fn round_trip_reproduces_the_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    let original = sample_state();
    state::save(&path, &original).await.unwrap();
    let restored = state::load(&path).await;

    assert_eq!(restored.alarms.len(), 2);
    assert_eq!(
        restored.alarms[0].chain_id, original.alarms[0].chain_id,
    );
    assert_eq!(restored.blocks["osmosis-1"], vec![3, 3, 0, 4, 3]);
    assert_eq!(
        restored.nodes_down["osmosis-1"]["http://10.0.0.5:26657"],
        original.nodes_down["osmosis-1"]["http://10.0.0.5:26657"]
    );
}

#[tokio::test]
async fn save_leaves_a_valid_non_empty_document() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    state::save(&path, &sample_state()).await.unwrap();

    let raw = tokio::fs::read_to_string(&path).await.unwrap();
    assert!(!raw.is_empty());
    let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert!(doc["alarms"].is_array());
    assert!(doc["blocks"].is_object());
    assert!(doc["nodes_down"].is_object());
    // no temporary file left behind
    assert!(!path.with_extension("tmp").exists());
}

#[tokio::test]
async fn missing_file_yields_empty_state() {
    let dir = tempfile::tempdir().unwrap();
    let restored = state::load(&dir.path().join("never-written.json")).await;

    assert!(restored.alarms.is_empty());
    assert!(restored.blocks.is_empty());
    assert!(restored.nodes_down.is_empty());
}

#[tokio::test]
async fn corrupt_file_yields_empty_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    tokio::fs::write(&path, b"{ not json ").await.unwrap();

    let restored = state::load(&path).await;
    assert!(restored.alarms.is_empty());
}

#[tokio::test]
async fn restart_restores_alarms_windows_and_down_nodes() {
    let cfg: Config = toml::from_str(
        r#"
        [chains.Osmosis]
        chain_id = "osmosis-1"
        validator_address = "AABBCC"

        [[chains.Osmosis.nodes]]
        url = "http://10.0.0.5:26657"

        [[chains.Osmosis.nodes]]
        url = "http://10.0.0.6:26657"
        "#,
    )
    .unwrap();

    let (alert_tx, _alert_rx) = mpsc::channel(8);
    let (feeds, _receivers) = feed::channels();
    let app = App::new(Arc::new(cfg), alert_tx, feeds, CancellationToken::new());

    // simulate a restart: restore yesterday's snapshot, then save again
    let original = sample_state();
    app.restore(&original).await;
    let snapshot = app.snapshot().await;

    assert_eq!(snapshot.alarms.len(), 2, "restored alarms survive a save cycle");
    assert_eq!(snapshot.blocks["osmosis-1"], vec![3, 3, 0, 4, 3]);
    assert_eq!(
        snapshot.nodes_down["osmosis-1"]["http://10.0.0.5:26657"],
        original.nodes_down["osmosis-1"]["http://10.0.0.5:26657"],
        "down-since stamps are preserved, not re-stamped"
    );
    assert!(!snapshot.nodes_down["osmosis-1"].contains_key("http://10.0.0.6:26657"));

    // and the cycle is stable through the disk format
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    state::save(&path, &snapshot).await.unwrap();
    let reloaded = state::load(&path).await;
    assert_eq!(reloaded.alarms.len(), snapshot.alarms.len());
    assert_eq!(reloaded.blocks, snapshot.blocks);
}

#[tokio::test]
async fn save_replaces_previous_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    state::save(&path, &sample_state()).await.unwrap();
    state::save(&path, &SavedState::default()).await.unwrap();

    let restored = state::load(&path).await;
    assert!(restored.alarms.is_empty());
    assert!(restored.blocks.is_empty());
}
