// File: valwatch/src/main.rs
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};
use valwatch::config::ConfigLoader;
use valwatch::run;

/// Default locations, overridable through the environment
const DEFAULT_CONFIG: &str = "config.toml";
const DEFAULT_STATE_FILE: &str = ".valwatch-state.json";
const CHAIN_CONFIG_DIR: &str = "chains.d";

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::args()
        .skip(1)
        .any(|arg| arg == "example-config" || arg == "--example-config")
    {
        print!("{}", include_str!("../example-config.toml"));
        return Ok(());
    }

    let level = match std::env::var("LOG_LEVEL")
        .unwrap_or_default()
        .to_lowercase()
        .as_str()
    {
        "debug" => "debug",
        "warn" | "warning" => "warn",
        "error" => "error",
        _ => "info",
    };
    let env_filter = EnvFilter::from_default_env()
        .add_directive(format!("valwatch={}", level).parse()?)
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?)
        .add_directive("tungstenite=warn".parse()?);
    fmt().with_env_filter(env_filter).init();

    let config_file = std::env::var("CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG.to_string());
    let state_file = std::env::var("STATE_FILE").unwrap_or_else(|_| DEFAULT_STATE_FILE.to_string());

    let cfg = ConfigLoader::load(&config_file, CHAIN_CONFIG_DIR)
        .await
        .with_context(|| format!("loading configuration from {}", config_file))?;

    run::run(cfg, PathBuf::from(state_file)).await
}
