//! Application-wide constants for timeouts, intervals, and limits.
//!
//! Grouped by category so that every magic number has one home.

use std::time::Duration;

/// Outbound HTTP timeouts
pub mod http {
    use super::Duration;

    /// Bound for RPC status and validator-set requests
    pub const RPC_TIMEOUT: Duration = Duration::from_secs(10);

    /// Bound for chain-directory requests
    pub const DIRECTORY_TIMEOUT: Duration = Duration::from_secs(10);

    /// Bound for a single notification-channel delivery
    pub const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);
}

/// Watch-loop and health-prober tuning
pub mod monitor {
    use super::Duration;

    /// Sleep between reconnect attempts after a stream failure. Fixed, no
    /// jitter.
    pub const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

    /// The transport read timeout for the block-event stream. A silent
    /// stream for longer than this is treated as a failed connection.
    pub const STREAM_READ_TIMEOUT: Duration = Duration::from_secs(30);

    /// Capacity of the per-chain signing ring buffer
    pub const SIGNING_WINDOW_CAP: usize = 512;

    /// Minimum observed blocks before the window-percentage alarm is
    /// evaluated
    pub const MIN_WINDOW_SAMPLE: usize = 20;

    /// Default interval between health-prober passes when the config does
    /// not override it
    pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 60;

    /// How long a validator-set snapshot may be reused between refreshes
    pub const VALIDATOR_SET_TTL: Duration = Duration::from_secs(600);
}

/// Chain-directory service endpoints and cache tuning
pub mod registry {
    use super::Duration;

    /// Directory listing and per-chain detail endpoint
    pub const DIRECTORY_URL: &str = "https://chains.cosmos.directory/";

    /// Public RPC proxy, reachable by chain path
    pub const PUBLIC_RPC_URL: &str = "https://rpc.cosmos.directory:443/";

    /// TTL for cached per-chain directory data
    pub const CHAIN_DATA_TTL: Duration = Duration::from_secs(30 * 60);

    /// How often the chain-id to path mapping is refreshed from the
    /// directory listing
    pub const REFRESH_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);
}

/// Queue depths for the alert and broadcast channels
pub mod queues {
    /// Alert queue between the engine and the dispatcher
    pub const ALERT_DEPTH: usize = 128;

    /// Log, chain-update, and stats feeds
    pub const FEED_DEPTH: usize = 256;
}
