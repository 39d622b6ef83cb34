//! Node configuration with TOML file support.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use liquid_governance::{FinalizePolicy, GovernanceParams};

use crate::NodeError;

/// Configuration for a liquid-democracy node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Every field has a default, so an
/// empty file is a valid configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Directory holding the LMDB environment.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Whether to serve the HTTP API.
    #[serde(default = "default_true")]
    pub enable_rpc: bool,

    /// Address the HTTP API binds to.
    #[serde(default = "default_rpc_bind")]
    pub rpc_bind: String,

    /// HTTP port. 0 picks a free port.
    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter, e.g. "info" or "debug,liquid_governance=trace".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Whether to expose Prometheus metrics at `/metrics`.
    #[serde(default)]
    pub enable_metrics: bool,

    /// Upper bound on engine calls running at once.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Maximum proposal statement length in bytes.
    #[serde(default = "default_max_statement_len")]
    pub max_statement_len: usize,

    /// Who may finalize a proposal.
    #[serde(default)]
    pub finalize_policy: FinalizePolicy,

    /// LMDB memory map size in bytes.
    #[serde(default = "default_lmdb_map_size")]
    pub lmdb_map_size: usize,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    PathBuf::from("./liquid_data")
}

fn default_true() -> bool {
    true
}

fn default_rpc_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_rpc_port() -> u16 {
    8080
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_concurrent() -> usize {
    64
}

fn default_max_statement_len() -> usize {
    GovernanceParams::default().max_statement_len
}

fn default_lmdb_map_size() -> usize {
    1 << 30
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(format!("{path}: {e}")))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Engine parameters derived from this configuration.
    pub fn governance_params(&self) -> GovernanceParams {
        GovernanceParams {
            finalize_policy: self.finalize_policy,
            max_statement_len: self.max_statement_len,
        }
    }

    /// Socket address the HTTP API binds to.
    pub fn rpc_addr(&self) -> Result<SocketAddr, NodeError> {
        let ip: IpAddr = self
            .rpc_bind
            .parse()
            .map_err(|e| NodeError::Config(format!("invalid rpc_bind '{}': {e}", self.rpc_bind)))?;
        Ok(SocketAddr::new(ip, self.rpc_port))
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            enable_rpc: default_true(),
            rpc_bind: default_rpc_bind(),
            rpc_port: default_rpc_port(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            enable_metrics: false,
            max_concurrent: default_max_concurrent(),
            max_statement_len: default_max_statement_len(),
            finalize_policy: FinalizePolicy::default(),
            lmdb_map_size: default_lmdb_map_size(),
        }
    }
}
