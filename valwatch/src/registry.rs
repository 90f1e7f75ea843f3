// File: valwatch/src/registry.rs
//! Chain directory client: resolves chain ids to public RPC proxy paths
//! and fetches per-chain metadata, cached with a 30-minute TTL.

use crate::cache::{CacheKey, TtlCache};
use crate::constants::{http, registry};
use crate::errors::{DataMismatchError, TransientError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, info};

/// Bootstrap chain-id to directory-path entries, used before (and as a
/// fallback for) the first successful directory refresh.
fn bootstrap_paths() -> HashMap<String, String> {
    [
        ("agoric-3", "agoric"),
        ("akashnet-2", "akash"),
        ("axelar-dojo-1", "axelar"),
        ("bitsong-2b", "bitsong"),
        ("carbon-1", "carbon"),
        ("celestia", "celestia"),
        ("cheqd-mainnet-1", "cheqd"),
        ("chihuahua-1", "chihuahua"),
        ("columbus-5", "terra"),
        ("comdex-1", "comdex"),
        ("core-1", "persistence"),
        ("cosmoshub-4", "cosmoshub"),
        ("crescent-1", "crescent"),
        ("dydx-mainnet-1", "dydx"),
        ("evmos_9001-2", "evmos"),
        ("gravity-bridge-3", "gravitybridge"),
        ("injective-1", "injective"),
        ("irishub-1", "irisnet"),
        ("juno-1", "juno"),
        ("kava_2222-10", "kava"),
        ("laozi-mainnet", "bandchain"),
        ("neutron-1", "neutron"),
        ("noble-1", "noble"),
        ("osmosis-1", "osmosis"),
        ("phoenix-1", "terra2"),
        ("regen-1", "regen"),
        ("secret-4", "secretnetwork"),
        ("sentinelhub-2", "sentinel"),
        ("sommelier-3", "sommelier"),
        ("stargaze-1", "stargaze"),
        ("stride-1", "stride"),
        ("umee-1", "umee"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Trimmed directory listing, only what the path map needs
#[derive(Debug, Deserialize)]
struct RegistryListing {
    chains: Vec<RegistryListingEntry>,
}

#[derive(Debug, Deserialize)]
struct RegistryListingEntry {
    path: String,
    chain_id: String,
}

/// Top-level wrapper of the per-chain detail endpoint
#[derive(Debug, Deserialize)]
struct DirectoryResponse {
    chain: ChainDirectoryData,
}

/// Per-chain detail payload from the directory service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChainDirectoryData {
    #[serde(default)]
    pub chain_id: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub chain_name: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub decimals: i32,
    #[serde(default)]
    pub denom: String,
    #[serde(default)]
    pub params: DirectoryParams,
    #[serde(default)]
    pub assets: Vec<DirectoryAsset>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryParams {
    #[serde(default)]
    pub actual_block_time: f64,
    #[serde(default)]
    pub community_tax: f64,
    #[serde(default)]
    pub calculated_apr: f64,
    #[serde(default)]
    pub slashing: Option<SlashingParams>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlashingParams {
    #[serde(default)]
    pub signed_blocks_window: String,
    #[serde(default)]
    pub min_signed_per_window: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryAsset {
    #[serde(default)]
    pub base: DenomInfo,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub display: DenomInfo,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub denom_units: Vec<DenomUnit>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DenomInfo {
    #[serde(default)]
    pub denom: String,
    #[serde(default)]
    pub exponent: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DenomUnit {
    #[serde(default)]
    pub denom: String,
    #[serde(default)]
    pub exponent: i32,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl ChainDirectoryData {
    /// Signing-window parameters, if the directory published them.
    /// Returns (window size, min signed fraction).
    pub fn signing_window(&self) -> Option<(i64, f64)> {
        let slashing = self.params.slashing.as_ref()?;
        let window = slashing.signed_blocks_window.parse::<i64>().ok()?;
        let min_signed = slashing.min_signed_per_window.parse::<f64>().ok()?;
        Some((window, min_signed))
    }

    /// Asset metadata for a denom: exact base match first, else the first
    /// listed asset (usually the native token).
    pub fn asset_for_denom(&self, denom: &str) -> Option<&DirectoryAsset> {
        self.assets
            .iter()
            .find(|a| a.base.denom == denom)
            .or_else(|| self.assets.first())
    }
}

/// Resolves chain identifiers against the remote directory. The path map
/// has its own lock and is never refreshed on the lookup path, so lookups
/// never block on network I/O.
pub struct ChainRegistry {
    base_url: String,
    proxy_url: String,
    paths: Mutex<HashMap<String, String>>,
    cache: TtlCache<CacheKey, ChainDirectoryData>,
    client: Client,
}

impl ChainRegistry {
    pub fn new() -> Self {
        Self::with_base_urls(registry::DIRECTORY_URL, registry::PUBLIC_RPC_URL)
    }

    /// Base URLs are injectable so tests can point at a local server.
    pub fn with_base_urls(base_url: &str, proxy_url: &str) -> Self {
        let client = Client::builder()
            .timeout(http::DIRECTORY_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client for ChainRegistry");

        Self {
            base_url: base_url.to_string(),
            proxy_url: proxy_url.to_string(),
            paths: Mutex::new(bootstrap_paths()),
            cache: TtlCache::new(),
            client,
        }
    }

    /// O(1) proxy-URL lookup by chain id. `None` for unknown identifiers;
    /// callers fall back to their configured endpoints.
    pub fn lookup(&self, chain_id: &str) -> Option<String> {
        let paths = self.paths.lock().expect("registry path lock poisoned");
        paths
            .get(chain_id)
            .map(|path| format!("{}{}", self.proxy_url, path))
    }

    /// Proxy URL for a directory chain name, no lookup involved.
    pub fn proxy_url_for_name(&self, chain_name: &str) -> String {
        format!("{}{}", self.proxy_url, chain_name)
    }

    /// Refreshes the chain-id to path mapping from the directory listing.
    /// An empty listing is rejected and leaves the current mapping intact.
    pub async fn refresh(&self) -> Result<(), TransientError> {
        let listing: RegistryListing = self.get_json(&self.base_url).await?;
        if listing.chains.is_empty() {
            return Err(TransientError::InvalidPayload {
                url: self.base_url.clone(),
                reason: "response had no chains".to_string(),
            });
        }

        let mut paths = self.paths.lock().expect("registry path lock poisoned");
        for chain in listing.chains {
            paths.insert(chain.chain_id, chain.path);
        }
        info!("chain registry refreshed: {} paths known", paths.len());
        Ok(())
    }

    /// Cache-or-fetch for per-chain directory data. Network failures,
    /// non-success statuses, unparsable bodies, and empty chain ids all
    /// surface as recoverable errors and leave the cache untouched.
    pub async fn fetch_chain_data(
        &self,
        chain_name: &str,
    ) -> Result<ChainDirectoryData, TransientError> {
        if chain_name.trim().is_empty() {
            return Err(TransientError::InvalidPayload {
                url: self.base_url.clone(),
                reason: "empty chain name".to_string(),
            });
        }

        let key = CacheKey::ChainData(chain_name.to_string());
        if let Some(data) = self.cache.get(&key).await {
            debug!("directory data for {} served from cache", chain_name);
            return Ok(data);
        }

        let url = format!("{}{}", self.base_url, chain_name);
        let response: DirectoryResponse = self.get_json(&url).await?;
        let data = response.chain;

        if data.chain_id.trim().is_empty() {
            return Err(TransientError::InvalidPayload {
                url,
                reason: format!("directory returned empty chain data for {}", chain_name),
            });
        }

        self.cache
            .set(key, data.clone(), registry::CHAIN_DATA_TTL)
            .await;
        Ok(data)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<T, TransientError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TransientError::ConnectFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransientError::BadStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| TransientError::InvalidPayload {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }
}

impl Default for ChainRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Cross-checks fetched directory data against the configured chain id.
/// A mismatch is a warning-level error; monitoring continues without the
/// directory snapshot (testnets commonly mismatch intentionally).
pub fn check_chain_id(
    configured: &str,
    data: &ChainDirectoryData,
) -> Result<(), DataMismatchError> {
    if data.chain_id != configured {
        return Err(DataMismatchError::ChainId {
            configured: configured.to_string(),
            fetched: data.chain_id.clone(),
        });
    }
    Ok(())
}
