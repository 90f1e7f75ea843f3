//! Thin typed layer over the node RPC surface: the `/status` and
//! `/validators` endpoints and the NewBlock websocket subscription.

use crate::constants::http;
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub result: StatusResult,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusResult {
    pub node_info: NodeInfo,
    pub sync_info: SyncInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeInfo {
    pub network: String,
    pub moniker: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncInfo {
    pub latest_block_height: String,
    pub catching_up: bool,
}

impl StatusResult {
    pub fn height(&self) -> i64 {
        self.sync_info.latest_block_height.parse().unwrap_or(0)
    }
}

/// Fetches `/status` from an endpoint. The shared client carries the
/// request timeout.
pub async fn fetch_status(client: &Client, url: &str) -> Result<StatusResult> {
    let status_url = format!("{}/status", url.trim_end_matches('/'));
    let response = client
        .get(&status_url)
        .timeout(http::RPC_TIMEOUT)
        .send()
        .await
        .map_err(|e| anyhow!("status request to {} failed: {}", status_url, e))?;

    if !response.status().is_success() {
        return Err(anyhow!("{} returned HTTP {}", status_url, response.status()));
    }

    let parsed: StatusResponse = response
        .json()
        .await
        .map_err(|e| anyhow!("failed to parse status from {}: {}", status_url, e))?;

    Ok(parsed.result)
}

/// Fetches the active validator set as uppercase hex consensus addresses,
/// following pagination until `total` is reached.
pub async fn fetch_validator_set(client: &Client, url: &str) -> Result<Vec<String>> {
    let mut addresses = Vec::new();
    let mut page = 1u32;

    loop {
        let page_url = format!(
            "{}/validators?page={}&per_page=100",
            url.trim_end_matches('/'),
            page
        );
        let response = client
            .get(&page_url)
            .timeout(http::RPC_TIMEOUT)
            .send()
            .await
            .map_err(|e| anyhow!("validators request to {} failed: {}", page_url, e))?;

        if !response.status().is_success() {
            return Err(anyhow!("{} returned HTTP {}", page_url, response.status()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| anyhow!("failed to parse validators from {}: {}", page_url, e))?;

        let validators = body["result"]["validators"]
            .as_array()
            .ok_or_else(|| anyhow!("no validators array in response from {}", page_url))?;
        for v in validators {
            if let Some(addr) = v["address"].as_str() {
                addresses.push(addr.to_uppercase());
            }
        }

        let total: usize = body["result"]["total"]
            .as_str()
            .and_then(|t| t.parse().ok())
            .unwrap_or(addresses.len());
        if addresses.len() >= total || validators.is_empty() {
            break;
        }
        page += 1;
        // active sets top out in the hundreds; a runaway pagination loop
        // means the endpoint is lying about totals
        if page > 10 {
            break;
        }
    }

    Ok(addresses)
}

/// Websocket endpoint for a node RPC URL.
pub fn ws_endpoint(url: &str) -> String {
    let base = url.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        format!("ws://{}", base)
    };
    format!("{}/websocket", base)
}

/// The JSON-RPC subscribe request for NewBlock events.
pub fn subscribe_request() -> String {
    serde_json::json!({
        "jsonrpc": "2.0",
        "method": "subscribe",
        "id": Uuid::new_v4().to_string(),
        "params": {
            "query": "tm.event='NewBlock'"
        }
    })
    .to_string()
}

/// One observed block from the event stream
#[derive(Debug, Clone)]
pub struct BlockEvent {
    pub height: i64,
    pub time: Option<DateTime<Utc>>,
    pub proposer: String,
    pub signers: Vec<String>,
}

impl BlockEvent {
    pub fn signed_by(&self, address: &str) -> bool {
        self.signers.iter().any(|s| s == address)
    }

    pub fn proposed_by(&self, address: &str) -> bool {
        self.proposer == address
    }
}

/// Extracts a block event from one websocket text frame. Returns `None`
/// for frames that are not NewBlock events (e.g. the subscribe ack).
pub fn parse_block_event(text: &str) -> Option<BlockEvent> {
    let value: Value = serde_json::from_str(text).ok()?;
    let block = &value["result"]["data"]["value"]["block"];
    if block.is_null() {
        return None;
    }

    let header = &block["header"];
    let height = header["height"].as_str()?.parse::<i64>().ok()?;
    let time = header["time"]
        .as_str()
        .and_then(|t| t.parse::<DateTime<Utc>>().ok());
    let proposer = header["proposer_address"]
        .as_str()
        .unwrap_or_default()
        .to_uppercase();

    let signers = block["last_commit"]["signatures"]
        .as_array()
        .map(|sigs| {
            sigs.iter()
                .filter_map(|s| s["validator_address"].as_str())
                .filter(|a| !a.is_empty())
                .map(|a| a.to_uppercase())
                .collect()
        })
        .unwrap_or_default();

    Some(BlockEvent {
        height,
        time,
        proposer,
        signers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_endpoint_maps_schemes() {
        assert_eq!(
            ws_endpoint("https://rpc.example.com:443"),
            "wss://rpc.example.com:443/websocket"
        );
        assert_eq!(
            ws_endpoint("http://10.0.0.5:26657/"),
            "ws://10.0.0.5:26657/websocket"
        );
    }

    #[test]
    fn subscribe_ack_is_not_a_block() {
        let ack = r#"{"jsonrpc":"2.0","id":"1","result":{}}"#;
        assert!(parse_block_event(ack).is_none());
    }

    #[test]
    fn block_event_extracts_height_proposer_and_signers() {
        let frame = r#"{
            "jsonrpc": "2.0",
            "id": "1",
            "result": {
                "query": "tm.event='NewBlock'",
                "data": {
                    "type": "tendermint/event/NewBlock",
                    "value": {
                        "block": {
                            "header": {
                                "height": "12345",
                                "time": "2024-03-01T12:00:00Z",
                                "proposer_address": "aabbcc"
                            },
                            "last_commit": {
                                "signatures": [
                                    {"validator_address": "aabbcc", "block_id_flag": 2},
                                    {"validator_address": "ddeeff", "block_id_flag": 2},
                                    {"validator_address": "", "block_id_flag": 1}
                                ]
                            }
                        }
                    }
                }
            }
        }"#;

        let event = parse_block_event(frame).expect("block event");
        assert_eq!(event.height, 12345);
        assert_eq!(event.proposer, "AABBCC");
        assert_eq!(event.signers, vec!["AABBCC", "DDEEFF"]);
        assert!(event.signed_by("DDEEFF"));
        assert!(event.proposed_by("AABBCC"));
        assert!(!event.signed_by("001122"));
    }
}
