use std::time::Duration;

use share::{utils::read_env_var, DEFAULT_DEVNET_ADDR, DEFAULT_DEVNET_DB, DEFAULT_REWARDS_DURATION};
use staking_rewards::RewardMode;

/// Runtime settings, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct DevnetConfig {
    pub addr: String,
    pub db_path: String,
    pub reward_mode: RewardMode,
    pub rewards_duration: u64,
    /// Zero disables the node loop; messages then move only on `devnet_flush`.
    pub auto_flush_interval: Duration,
    /// Let the node loop consume posted L2 -> L1 messages on L1.
    pub auto_relay: bool,
}

impl Default for DevnetConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_DEVNET_ADDR.to_owned(),
            db_path: DEFAULT_DEVNET_DB.to_owned(),
            reward_mode: RewardMode::default(),
            rewards_duration: DEFAULT_REWARDS_DURATION,
            auto_flush_interval: Duration::ZERO,
            auto_relay: false,
        }
    }
}

impl DevnetConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            addr: read_env_var("DEVNET_ADDR", defaults.addr),
            db_path: read_env_var("DEVNET_DB_PATH", defaults.db_path),
            reward_mode: read_env_var("REWARD_MODE", defaults.reward_mode),
            rewards_duration: read_env_var("REWARDS_DURATION", defaults.rewards_duration),
            auto_flush_interval: Duration::from_millis(read_env_var("AUTO_FLUSH_INTERVAL_MS", 0u64)),
            auto_relay: read_env_var("AUTO_RELAY", defaults.auto_relay),
        }
    }
}
