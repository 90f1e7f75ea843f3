// File: valwatch/src/config/loader.rs
use super::{ChainCfg, Config};
use crate::errors::ConfigError;
use glob::glob;
use serde::Deserialize;
use std::collections::HashMap;
use tokio::fs;
use tracing::{debug, info, warn};

/// Shape of the per-chain files in the chain config directory
#[derive(Debug, Deserialize)]
struct ChainConfigFile {
    #[serde(default)]
    chains: HashMap<String, ChainCfg>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads the main config file, then merges every `*.toml` under the
    /// chain config directory into `chains`. A chain defined in both
    /// places keeps the directory version.
    pub async fn load(main_path: &str, chain_dir: &str) -> Result<Config, ConfigError> {
        let content = fs::read_to_string(main_path)
            .await
            .map_err(|e| ConfigError::LoadFailed {
                path: main_path.to_string(),
                reason: e.to_string(),
            })?;

        let mut config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: main_path.to_string(),
            reason: e.to_string(),
        })?;

        let pattern = format!("{}/*.toml", chain_dir);
        let entries = match glob(&pattern) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("skipping chain config directory {}: {}", chain_dir, e);
                return Ok(config);
            }
        };

        for entry in entries {
            let path = entry.map_err(|e| ConfigError::LoadFailed {
                path: chain_dir.to_string(),
                reason: e.to_string(),
            })?;

            debug!("loading chain config: {}", path.display());
            let content = fs::read_to_string(&path)
                .await
                .map_err(|e| ConfigError::LoadFailed {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;

            let file: ChainConfigFile =
                toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;

            for (name, chain) in file.chains {
                if config.chains.insert(name.clone(), chain).is_some() {
                    warn!(
                        "chain '{}' redefined by {}, keeping the directory version",
                        name,
                        path.display()
                    );
                }
            }
        }

        info!("configuration loaded: {} chains", config.chains.len());
        Ok(config)
    }
}
