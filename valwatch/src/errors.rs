//! Custom error types for the monitor
//!
//! Provides structured error handling with context for the failure
//! categories the daemon distinguishes: transient network trouble is
//! retried, configuration problems are fatal at startup only, data
//! mismatches and persistence failures are downgraded to warnings, and
//! notification failures stay isolated to their channel.

use std::fmt;

/// Main error type for the monitor
#[derive(Debug)]
pub enum MonitorError {
    /// RPC, stream, or HTTP failures; always retried, never fatal
    Transient(TransientError),

    /// Configuration problems; fatal at startup, before monitoring begins
    Config(ConfigError),

    /// Remote data disagreeing with local configuration; logged, monitoring
    /// continues
    DataMismatch(DataMismatchError),

    /// State file read/write failures; logged, non-fatal
    Persistence(PersistenceError),

    /// Single-channel notification failures; never propagated to other
    /// channels
    Notification(NotificationError),

    /// Other errors with context
    Other(String),
}

/// Transient network error variants
#[derive(Debug)]
pub enum TransientError {
    /// Connection to an endpoint failed
    ConnectFailed { url: String, reason: String },

    /// Request or stream read timed out
    Timeout { url: String, operation: String },

    /// Endpoint returned a non-success status
    BadStatus { url: String, status: u16 },

    /// Response body could not be parsed or was empty
    InvalidPayload { url: String, reason: String },

    /// Block-event stream ended or errored
    StreamFailed { chain_id: String, reason: String },
}

/// Configuration error variants
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to load a configuration file
    LoadFailed { path: String, reason: String },

    /// Configuration parsing error
    ParseError { path: String, reason: String },

    /// Validation found fatal problems
    Invalid { problems: Vec<String> },
}

/// Data mismatch error variants
#[derive(Debug)]
pub enum DataMismatchError {
    /// Directory chain id differs from the configured one
    ChainId { configured: String, fetched: String },
}

/// Persistence error variants
#[derive(Debug)]
pub enum PersistenceError {
    /// Failed to read the state file
    ReadFailed { path: String, reason: String },

    /// Failed to write the state file
    WriteFailed { path: String, reason: String },

    /// State file present but not parseable
    Corrupt { path: String, reason: String },
}

/// Notification error variants
#[derive(Debug)]
pub enum NotificationError {
    /// Delivery to a channel failed
    SendFailed { channel: String, reason: String },

    /// Channel endpoint returned a non-success status
    BadStatus { channel: String, status: u16 },
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorError::Transient(e) => write!(f, "Transient network error: {}", e),
            MonitorError::Config(e) => write!(f, "Configuration error: {}", e),
            MonitorError::DataMismatch(e) => write!(f, "Data mismatch: {}", e),
            MonitorError::Persistence(e) => write!(f, "Persistence error: {}", e),
            MonitorError::Notification(e) => write!(f, "Notification error: {}", e),
            MonitorError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for TransientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransientError::ConnectFailed { url, reason } => {
                write!(f, "Connection to {} failed: {}", url, reason)
            }
            TransientError::Timeout { url, operation } => {
                write!(f, "Timeout while {} on {}", operation, url)
            }
            TransientError::BadStatus { url, status } => {
                write!(f, "{} returned HTTP {}", url, status)
            }
            TransientError::InvalidPayload { url, reason } => {
                write!(f, "Invalid response from {}: {}", url, reason)
            }
            TransientError::StreamFailed { chain_id, reason } => {
                write!(f, "Block stream for {} failed: {}", chain_id, reason)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::LoadFailed { path, reason } => {
                write!(f, "Failed to load config from '{}': {}", path, reason)
            }
            ConfigError::ParseError { path, reason } => {
                write!(f, "Failed to parse '{}': {}", path, reason)
            }
            ConfigError::Invalid { problems } => {
                write!(f, "Invalid configuration: {}", problems.join("; "))
            }
        }
    }
}

impl fmt::Display for DataMismatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataMismatchError::ChainId { configured, fetched } => {
                write!(
                    f,
                    "configured chain id ({}) does not match the directory chain id ({}), \
                     safe to ignore for testnets",
                    configured, fetched
                )
            }
        }
    }
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceError::ReadFailed { path, reason } => {
                write!(f, "Failed to read state file '{}': {}", path, reason)
            }
            PersistenceError::WriteFailed { path, reason } => {
                write!(f, "Failed to write state file '{}': {}", path, reason)
            }
            PersistenceError::Corrupt { path, reason } => {
                write!(f, "State file '{}' is not parseable: {}", path, reason)
            }
        }
    }
}

impl fmt::Display for NotificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationError::SendFailed { channel, reason } => {
                write!(f, "Sending to {} failed: {}", channel, reason)
            }
            NotificationError::BadStatus { channel, status } => {
                write!(f, "{} returned HTTP {}", channel, status)
            }
        }
    }
}

impl std::error::Error for MonitorError {}
impl std::error::Error for TransientError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for DataMismatchError {}
impl std::error::Error for PersistenceError {}
impl std::error::Error for NotificationError {}

impl From<anyhow::Error> for MonitorError {
    fn from(err: anyhow::Error) -> Self {
        MonitorError::Other(err.to_string())
    }
}

impl From<TransientError> for MonitorError {
    fn from(err: TransientError) -> Self {
        MonitorError::Transient(err)
    }
}

impl From<ConfigError> for MonitorError {
    fn from(err: ConfigError) -> Self {
        MonitorError::Config(err)
    }
}

impl From<DataMismatchError> for MonitorError {
    fn from(err: DataMismatchError) -> Self {
        MonitorError::DataMismatch(err)
    }
}

impl From<PersistenceError> for MonitorError {
    fn from(err: PersistenceError) -> Self {
        MonitorError::Persistence(err)
    }
}

impl From<NotificationError> for MonitorError {
    fn from(err: NotificationError) -> Self {
        MonitorError::Notification(err)
    }
}
