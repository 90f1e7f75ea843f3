//! Configuration tests: the bundled example parses, validation separates
//! fatal from advisory problems, and the chain directory merges.

use valwatch::config::{Config, ConfigLoader};

fn minimal_config() -> Config {
    toml::from_str(
        r#"
        [chains.Osmosis]
        chain_id = "osmosis-1"
        validator_address = "AABBCC"

        [[chains.Osmosis.nodes]]
        url = "http://10.0.0.5:26657"
        "#,
    )
    .unwrap()
}

#[test]
fn example_config_parses_and_validates() {
    let cfg: Config = toml::from_str(include_str!("../example-config.toml")).unwrap();
    assert_eq!(cfg.chains.len(), 1);

    let osmosis = &cfg.chains["Osmosis"];
    assert_eq!(osmosis.chain_id, "osmosis-1");
    assert_eq!(osmosis.nodes.len(), 2);
    assert!(osmosis.nodes[0].alert_if_down);
    assert!(!osmosis.nodes[1].alert_if_down);
    assert_eq!(osmosis.alerts.consecutive_missed, 5);

    let (_, fatal) = cfg.validate();
    assert!(!fatal);
}

#[test]
fn defaults_fill_in_missing_sections() {
    let cfg = minimal_config();
    assert_eq!(cfg.check_interval_seconds, 60);
    assert_eq!(cfg.node_down_alert_minutes, 3);
    assert!(!cfg.pagerduty.enabled);

    let osmosis = &cfg.chains["Osmosis"];
    assert!(osmosis.public_fallback);
    assert!(osmosis.alerts.stalled_enabled);
    assert_eq!(osmosis.alerts.stalled_minutes, 10);
    assert!(osmosis.alerts.renotify_minutes.is_none());
}

#[test]
fn no_chains_is_fatal() {
    let cfg: Config = toml::from_str("").unwrap();
    let (problems, fatal) = cfg.validate();
    assert!(fatal);
    assert!(problems.iter().any(|p| p.contains("no chains")));
}

#[test]
fn enabled_channel_without_credentials_is_fatal() {
    let mut cfg = minimal_config();
    cfg.pagerduty.enabled = true;
    let (problems, fatal) = cfg.validate();
    assert!(fatal);
    assert!(problems.iter().any(|p| p.contains("pagerduty")));
}

#[test]
fn no_enabled_channel_is_advisory_only() {
    let cfg = minimal_config();
    let (problems, fatal) = cfg.validate();
    assert!(!fatal);
    assert!(problems.iter().any(|p| p.contains("no notification channel")));
}

#[test]
fn duplicate_chain_ids_are_fatal() {
    let cfg: Config = toml::from_str(
        r#"
        [chains.One]
        chain_id = "osmosis-1"
        validator_address = "AA"
        [[chains.One.nodes]]
        url = "http://a:26657"

        [chains.Two]
        chain_id = "osmosis-1"
        validator_address = "BB"
        [[chains.Two.nodes]]
        url = "http://b:26657"
        "#,
    )
    .unwrap();

    let (problems, fatal) = cfg.validate();
    assert!(fatal);
    assert!(problems.iter().any(|p| p.contains("duplicates chain_id")));
}

#[test]
fn no_nodes_without_fallback_is_fatal() {
    let cfg: Config = toml::from_str(
        r#"
        [chains.Osmosis]
        chain_id = "osmosis-1"
        validator_address = "AA"
        public_fallback = false
        "#,
    )
    .unwrap();

    let (_, fatal) = cfg.validate();
    assert!(fatal);
}

#[tokio::test]
async fn loader_merges_the_chain_directory() {
    let dir = tempfile::tempdir().unwrap();
    let main = dir.path().join("config.toml");
    let chains_d = dir.path().join("chains.d");
    tokio::fs::create_dir(&chains_d).await.unwrap();

    tokio::fs::write(
        &main,
        r#"
        [chains.Osmosis]
        chain_id = "osmosis-1"
        validator_address = "AA"
        [[chains.Osmosis.nodes]]
        url = "http://a:26657"
        "#,
    )
    .await
    .unwrap();

    tokio::fs::write(
        chains_d.join("juno.toml"),
        r#"
        [chains.Juno]
        chain_id = "juno-1"
        validator_address = "BB"
        [[chains.Juno.nodes]]
        url = "http://b:26657"
        "#,
    )
    .await
    .unwrap();

    let cfg = ConfigLoader::load(
        main.to_str().unwrap(),
        chains_d.to_str().unwrap(),
    )
    .await
    .unwrap();

    assert_eq!(cfg.chains.len(), 2);
    assert!(cfg.chains.contains_key("Osmosis"));
    assert!(cfg.chains.contains_key("Juno"));
}

#[tokio::test]
async fn loader_reports_unparsable_files() {
    let dir = tempfile::tempdir().unwrap();
    let main = dir.path().join("config.toml");
    tokio::fs::write(&main, "not [valid toml").await.unwrap();

    let result = ConfigLoader::load(main.to_str().unwrap(), "nonexistent.d").await;
    assert!(result.is_err());
}
