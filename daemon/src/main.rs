//! Liquid-democracy daemon: runs a node, or talks to one over HTTP.

mod client;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use liquid_governance::FinalizePolicy;
use liquid_node::{init_logging, LiquidNode, LogFormat, NodeConfig};

use crate::client::{ClientAction, NodeClient};

#[derive(Parser, Debug)]
#[command(name = "liquid-daemon", about = "Liquid-democracy decision node")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base;
    /// CLI flags and env vars override them.
    #[arg(long, env = "LIQUID_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for the LMDB environment.
    #[arg(long, env = "LIQUID_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Serve the HTTP API.
    #[arg(long, env = "LIQUID_ENABLE_RPC")]
    rpc: Option<bool>,

    /// Address the HTTP API binds to.
    #[arg(long, env = "LIQUID_RPC_BIND")]
    rpc_bind: Option<String>,

    /// HTTP port.
    #[arg(long, env = "LIQUID_RPC_PORT")]
    rpc_port: Option<u16>,

    /// Enable the Prometheus metrics endpoint.
    #[arg(long, env = "LIQUID_ENABLE_METRICS")]
    metrics: bool,

    /// Log format: "human" or "json".
    #[arg(long, env = "LIQUID_LOG_FORMAT")]
    log_format: Option<String>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "LIQUID_LOG_LEVEL")]
    log_level: Option<String>,

    /// Upper bound on engine calls running at once.
    #[arg(long, env = "LIQUID_MAX_CONCURRENT")]
    max_concurrent: Option<usize>,

    /// Maximum proposal statement length in bytes.
    #[arg(long, env = "LIQUID_MAX_STATEMENT_LEN")]
    max_statement_len: Option<usize>,

    /// Who may finalize: "anyone" or "proposer_only".
    #[arg(long, env = "LIQUID_FINALIZE_POLICY", value_parser = parse_policy)]
    finalize_policy: Option<FinalizePolicy>,

    /// Subcommand.
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Run the node.
    #[command(name = "node")]
    Node {
        #[command(subcommand)]
        action: NodeAction,
    },
    /// Send a request to a running node.
    Client {
        /// Base URL of the node's HTTP API.
        #[arg(long, default_value = "http://127.0.0.1:8080", env = "LIQUID_URL")]
        url: String,

        #[command(subcommand)]
        action: ClientAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum NodeAction {
    /// Run the node until SIGINT or SIGTERM.
    Run,
}

fn parse_policy(s: &str) -> Result<FinalizePolicy, String> {
    match s.to_ascii_lowercase().as_str() {
        "anyone" => Ok(FinalizePolicy::Anyone),
        "proposer_only" | "proposer-only" => Ok(FinalizePolicy::ProposerOnly),
        other => Err(format!(
            "unknown finalize policy '{other}', expected 'anyone' or 'proposer_only'"
        )),
    }
}

impl Cli {
    /// Layer flags and env vars over `base`.
    fn merge_into(&self, base: NodeConfig) -> NodeConfig {
        NodeConfig {
            data_dir: self.data_dir.clone().unwrap_or(base.data_dir),
            enable_rpc: self.rpc.unwrap_or(base.enable_rpc),
            rpc_bind: self.rpc_bind.clone().unwrap_or(base.rpc_bind),
            rpc_port: self.rpc_port.unwrap_or(base.rpc_port),
            enable_metrics: self.metrics || base.enable_metrics,
            log_format: self.log_format.clone().unwrap_or(base.log_format),
            log_level: self.log_level.clone().unwrap_or(base.log_level),
            max_concurrent: self.max_concurrent.unwrap_or(base.max_concurrent),
            max_statement_len: self.max_statement_len.unwrap_or(base.max_statement_len),
            finalize_policy: self.finalize_policy.unwrap_or(base.finalize_policy),
            ..base
        }
    }

    fn node_config(&self) -> anyhow::Result<NodeConfig> {
        let base = match &self.config {
            Some(path) => {
                let path_str = path.to_string_lossy();
                NodeConfig::from_toml_file(&path_str)
                    .with_context(|| format!("loading {}", path.display()))?
            }
            None => NodeConfig::default(),
        };
        Ok(self.merge_into(base))
    }
}

async fn run_node(config: NodeConfig) -> anyhow::Result<()> {
    let format: LogFormat = config.log_format.parse()?;
    init_logging(format, &config.log_level)?;

    tracing::info!(
        "starting liquid node (RPC:{}, metrics:{})",
        if config.enable_rpc {
            format!("{}:{}", config.rpc_bind, config.rpc_port)
        } else {
            "off".into()
        },
        if config.enable_metrics { "on" } else { "off" },
    );

    let mut node = LiquidNode::new(config)?;
    node.start().await?;

    node.shutdown.wait_for_signal().await;
    node.stop().await?;

    tracing::info!("liquid daemon exited cleanly");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Command::Node {
            action: NodeAction::Run,
        } => run_node(cli.node_config()?).await,
        Command::Client { url, action } => {
            let body = NodeClient::new(url).run(action.clone()).await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(())
        }
    }
}
