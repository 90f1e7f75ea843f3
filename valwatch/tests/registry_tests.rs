//! Chain registry tests against a local HTTP server: caching behavior,
//! payload rejection, and listing refresh.

use serde_json::json;
use valwatch::registry::ChainRegistry;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn registry_for(server: &MockServer) -> ChainRegistry {
    ChainRegistry::with_base_urls(
        &format!("{}/", server.uri()),
        "https://rpc.cosmos.directory:443/",
    )
}

fn chain_payload(chain_id: &str) -> serde_json::Value {
    json!({
        "chain": {
            "chain_id": chain_id,
            "path": "osmosis",
            "chain_name": "osmosis",
            "symbol": "OSMO",
            "decimals": 6,
            "denom": "uosmo",
            "params": {
                "actual_block_time": 6.1,
                "community_tax": 0.0,
                "calculated_apr": 0.11,
                "slashing": {
                    "signed_blocks_window": "10000",
                    "min_signed_per_window": "0.05"
                }
            },
            "assets": [
                {
                    "base": {"denom": "uosmo", "exponent": 0},
                    "symbol": "OSMO",
                    "display": {"denom": "osmo", "exponent": 6},
                    "name": "Osmosis",
                    "description": "",
                    "denom_units": []
                }
            ]
        }
    })
}

#[tokio::test]
async fn second_fetch_within_ttl_issues_one_network_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/osmosis"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chain_payload("osmosis-1")))
        .expect(1)
        .mount(&server)
        .await;

    let registry = registry_for(&server);
    let first = registry.fetch_chain_data("osmosis").await.unwrap();
    let second = registry.fetch_chain_data("osmosis").await.unwrap();

    assert_eq!(first.chain_id, "osmosis-1");
    assert_eq!(second.chain_id, "osmosis-1");
    assert_eq!(first.signing_window(), Some((10000, 0.05)));
    // the mock's expect(1) verifies the cache on drop
}

#[tokio::test]
async fn empty_chain_id_is_an_error_and_is_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/osmosis"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chain_payload("")))
        .expect(2)
        .mount(&server)
        .await;

    let registry = registry_for(&server);
    assert!(registry.fetch_chain_data("osmosis").await.is_err());
    // a second call goes back to the network: nothing was cached
    assert!(registry.fetch_chain_data("osmosis").await.is_err());
}

#[tokio::test]
async fn non_success_status_is_a_recoverable_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/nosuchchain"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let registry = registry_for(&server);
    assert!(registry.fetch_chain_data("nosuchchain").await.is_err());
}

#[tokio::test]
async fn unparsable_body_is_a_recoverable_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/osmosis"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
        .mount(&server)
        .await;

    let registry = registry_for(&server);
    assert!(registry.fetch_chain_data("osmosis").await.is_err());
}

#[tokio::test]
async fn empty_chain_name_never_hits_the_network() {
    let server = MockServer::start().await;
    let registry = registry_for(&server);
    assert!(registry.fetch_chain_data("").await.is_err());
    assert!(registry.fetch_chain_data("   ").await.is_err());
}

#[tokio::test]
async fn refresh_merges_listing_into_the_path_map() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "chains": [
                {"path": "testchain", "chain_id": "testchain-1"},
                {"path": "osmosis", "chain_id": "osmosis-1"}
            ]
        })))
        .mount(&server)
        .await;

    let registry = registry_for(&server);
    assert!(registry.lookup("testchain-1").is_none());

    registry.refresh().await.unwrap();
    assert_eq!(
        registry.lookup("testchain-1").as_deref(),
        Some("https://rpc.cosmos.directory:443/testchain")
    );
    // bootstrap entries survive the merge
    assert!(registry.lookup("juno-1").is_some());
}

#[tokio::test]
async fn refresh_rejects_an_empty_listing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"chains": []})))
        .mount(&server)
        .await;

    let registry = registry_for(&server);
    assert!(registry.refresh().await.is_err());
    // the bootstrap mapping is untouched
    assert_eq!(
        registry.lookup("osmosis-1").as_deref(),
        Some("https://rpc.cosmos.directory:443/osmosis")
    );
}
