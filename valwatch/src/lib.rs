pub mod alerts;
pub mod cache;
pub mod chain;
pub mod config;
pub mod constants;
pub mod errors;
pub mod feed;
pub mod notify;
pub mod registry;
pub mod rpc;
pub mod run;
pub mod state;

// Re-export commonly used types
pub use alerts::{AlertCategory, AlertEngine, AlertMsg, Alarm, Severity};
pub use cache::{CacheKey, TtlCache};
pub use chain::{Chain, ChainState, Node};
pub use config::{ChainCfg, Config, ConfigLoader, NodeCfg};
pub use errors::MonitorError;
pub use notify::{ChannelSender, Dispatcher};
pub use registry::ChainRegistry;
pub use run::App;
pub use state::SavedState;
