//! Weave daemon — entry point for running a Weave node.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use weave_gossip::NoPeers;
use weave_node::logging::{init_logging, LogFormat};
use weave_node::memory::ProcMemory;
use weave_node::{NodeConfig, WeaveNode};
use weave_store::FsStore;
use weave_types::{ProtocolParams, SystemClock};

#[derive(Parser)]
#[command(name = "weave-daemon", about = "Weave blockweave node daemon")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings are
    /// used as the base; CLI flags override them.
    #[arg(long, env = "WEAVE_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for block/tx/wallet storage.
    #[arg(long, env = "WEAVE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Hex-encoded mining payout address.
    #[arg(long, env = "WEAVE_REWARD_ADDR")]
    reward_addr: Option<String>,

    /// Mine continuously.
    #[arg(long, env = "WEAVE_AUTOMINE")]
    automine: bool,

    /// Use fast development-network parameters.
    #[arg(long, env = "WEAVE_DEV")]
    dev: bool,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, default_value = "info", env = "WEAVE_LOG_LEVEL")]
    log_level: String,

    /// Log format: "human" or "json".
    #[arg(long, default_value = "human", env = "WEAVE_LOG_FORMAT")]
    log_format: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => NodeConfig::from_toml_file(&path.display().to_string())
            .map_err(|e| anyhow::anyhow!("config: {e}"))?,
        None => NodeConfig::default(),
    };
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(addr) = cli.reward_addr {
        config.reward_addr = Some(addr);
    }
    if cli.automine {
        config.automine = true;
    }
    config.log_level = cli.log_level;
    config.log_format = cli.log_format;

    init_logging(
        LogFormat::from_str_lossy(&config.log_format),
        &config.log_level,
    );

    let params = if cli.dev {
        ProtocolParams::dev_defaults()
    } else {
        ProtocolParams::default()
    };

    tracing::info!(
        data_dir = %config.data_dir.display(),
        automine = config.automine,
        "starting weave node"
    );

    let store = Arc::new(FsStore::open(&config.data_dir).map_err(|e| anyhow::anyhow!("store: {e}"))?);
    let node = WeaveNode::spawn(
        &config,
        params,
        store,
        Arc::new(NoPeers),
        Arc::new(SystemClock),
        Arc::new(ProcMemory),
    )
    .map_err(|e| anyhow::anyhow!("node: {e}"))?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received; stopping node");
    node.stop().await.map_err(|e| anyhow::anyhow!("stop: {e}"))?;
    tracing::info!("weave daemon exited cleanly");

    Ok(())
}
