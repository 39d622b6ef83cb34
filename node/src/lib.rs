//! Liquid-democracy node.
//!
//! Opens the LMDB data directory, replays the governance engine from it and
//! serves the HTTP API until shut down.

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod shutdown;

pub use config::NodeConfig;
pub use error::NodeError;
pub use logging::{init_logging, LogFormat};
pub use metrics::NodeMetrics;
pub use node::LiquidNode;
pub use shutdown::ShutdownController;
