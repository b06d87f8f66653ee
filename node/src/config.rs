//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use weave_types::{Address, RewardAddress};

use crate::NodeError;

/// Configuration for a Weave node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Data directory for block/tx/wallet storage.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Hex-encoded mining payout address; `None` leaves rewards unclaimed.
    #[serde(default)]
    pub reward_addr: Option<String>,

    /// Restart the miner after every integrated block.
    #[serde(default)]
    pub automine: bool,

    /// Throttle between PoW attempt windows, in milliseconds.
    #[serde(default)]
    pub mining_delay_ms: u64,

    /// Difficulty a fresh (not yet joined) node assumes.
    #[serde(default = "default_initial_diff")]
    pub initial_diff: u32,

    /// Simulated gossip loss probability in [0, 1].
    #[serde(default)]
    pub loss_probability: f64,

    /// Simulated gossip delay in milliseconds.
    #[serde(default)]
    pub gossip_delay_ms: u64,

    /// Simulated gossip transfer speed in bytes per second.
    #[serde(default)]
    pub xfer_speed_bps: Option<u64>,

    /// Fixed transaction propagation delay override (tests).
    #[serde(default)]
    pub fixed_propagation_delay_ms: Option<u64>,

    /// Seed for the worker's RNG (tests); random when unset.
    #[serde(default)]
    pub rng_seed: Option<u64>,

    /// Initial peer set.
    #[serde(default)]
    pub peers: Vec<String>,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    PathBuf::from("./weave_data")
}

fn default_initial_diff() -> u32 {
    8
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("NodeConfig is always serializable to TOML")
    }

    /// The configured payout address, or `Unclaimed`.
    pub fn reward_address(&self) -> Result<RewardAddress, NodeError> {
        match &self.reward_addr {
            None => Ok(RewardAddress::Unclaimed),
            Some(hex) => {
                let addr = Address::from_hex(hex)
                    .map_err(|e| NodeError::Config(format!("reward_addr: {e}")))?;
                Ok(RewardAddress::Wallet(addr))
            }
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            reward_addr: None,
            automine: false,
            mining_delay_ms: 0,
            initial_diff: default_initial_diff(),
            loss_probability: 0.0,
            gossip_delay_ms: 0,
            xfer_speed_bps: None,
            fixed_propagation_delay_ms: None,
            rng_seed: None,
            peers: Vec::new(),
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}
