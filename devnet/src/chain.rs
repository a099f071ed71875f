//! The two simulated ledgers and their genesis.

use std::str::FromStr;

use alloy_primitives::{address, Address};
use serde::{Deserialize, Serialize};
use share::{messaging::Messaging, token::Erc20};
use staking_bridge::StakingBridge;
use staking_rewards::{RewardMode, StakingRewards, StakingRewardsConfig};

/// Deploys both contracts and owns the L2 reward schedule.
pub const OWNER: Address = address!("0000000000000000000000000000000000000a0a");
/// Sender of L2 transactions that deliver L1 messages.
pub const SEQUENCER: Address = address!("0000000000000000000000000000000000005e0a");
/// Sender of L1 transactions that consume posted L2 messages.
pub const RELAYER: Address = address!("0000000000000000000000000000000000000e1a");

pub const L1_BRIDGE: Address = address!("1000000000000000000000000000000000000001");
pub const L1_STAKING_TOKEN: Address = address!("1000000000000000000000000000000000000002");
pub const L1_REWARD_TOKEN: Address = address!("1000000000000000000000000000000000000003");

pub const L2_STAKING: Address = address!("2000000000000000000000000000000000000001");
pub const L2_STAKING_TOKEN: Address = address!("2000000000000000000000000000000000000002");
pub const L2_REWARD_TOKEN: Address = address!("2000000000000000000000000000000000000003");

pub const GENESIS_TIMESTAMP: u64 = 1_700_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Layer {
    L1,
    L2,
}

impl FromStr for Layer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "l1" => Ok(Self::L1),
            "l2" => Ok(Self::L2),
            other => Err(format!("unknown layer {:?}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    Staking,
    Reward,
}

impl FromStr for TokenKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "staking" => Ok(Self::Staking),
            "reward" => Ok(Self::Reward),
            other => Err(format!("unknown token {:?}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct L1Chain {
    pub timestamp: u64,
    pub staking_token: Erc20,
    pub reward_token: Erc20,
    pub bridge: StakingBridge,
}

impl L1Chain {
    pub fn genesis() -> Self {
        Self {
            timestamp: GENESIS_TIMESTAMP,
            staking_token: Erc20::new(L1_STAKING_TOKEN, "Staking Token", "STK"),
            // The bridge mints the L1 reward token for bridged claims.
            reward_token: Erc20::new(L1_REWARD_TOKEN, "Reward Token", "RWD").with_minter(L1_BRIDGE),
            bridge: StakingBridge::new(L1_BRIDGE, L1_STAKING_TOKEN, L1_REWARD_TOKEN, L2_STAKING),
        }
    }

    pub fn token(&self, kind: TokenKind) -> &Erc20 {
        match kind {
            TokenKind::Staking => &self.staking_token,
            TokenKind::Reward => &self.reward_token,
        }
    }

    pub fn token_mut(&mut self, kind: TokenKind) -> &mut Erc20 {
        match kind {
            TokenKind::Staking => &mut self.staking_token,
            TokenKind::Reward => &mut self.reward_token,
        }
    }

    /// Runs one bridge call as `sender` at the current L1 time.
    pub fn call<R>(
        &mut self,
        messaging: &mut Messaging,
        sender: Address,
        f: impl FnOnce(&mut StakingBridge, &mut staking_bridge::Context<'_>) -> R,
    ) -> R {
        let mut ctx = staking_bridge::Context {
            sender,
            timestamp: self.timestamp,
            staking_token: &mut self.staking_token,
            reward_token: &mut self.reward_token,
            messaging,
        };
        f(&mut self.bridge, &mut ctx)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct L2Chain {
    pub timestamp: u64,
    pub staking_token: Erc20,
    pub reward_token: Erc20,
    pub staking: StakingRewards,
}

impl L2Chain {
    pub fn genesis(reward_mode: RewardMode, rewards_duration: u64) -> Self {
        let mut config =
            StakingRewardsConfig::new(L2_STAKING, OWNER, L2_STAKING_TOKEN, L2_REWARD_TOKEN, L1_BRIDGE);
        config.reward_mode = reward_mode;
        config.rewards_duration = rewards_duration;

        Self {
            timestamp: GENESIS_TIMESTAMP,
            staking_token: Erc20::new(L2_STAKING_TOKEN, "Staking Token", "STK"),
            reward_token: Erc20::new(L2_REWARD_TOKEN, "Reward Token", "RWD"),
            staking: StakingRewards::new(config),
        }
    }

    pub fn token(&self, kind: TokenKind) -> &Erc20 {
        match kind {
            TokenKind::Staking => &self.staking_token,
            TokenKind::Reward => &self.reward_token,
        }
    }

    pub fn token_mut(&mut self, kind: TokenKind) -> &mut Erc20 {
        match kind {
            TokenKind::Staking => &mut self.staking_token,
            TokenKind::Reward => &mut self.reward_token,
        }
    }

    /// Runs one staking call as `sender` at the current L2 time.
    pub fn call<R>(
        &mut self,
        messaging: &mut Messaging,
        sender: Address,
        f: impl FnOnce(&mut StakingRewards, &mut staking_rewards::Context<'_>) -> R,
    ) -> R {
        let mut ctx = staking_rewards::Context {
            sender,
            timestamp: self.timestamp,
            staking_token: &mut self.staking_token,
            reward_token: &mut self.reward_token,
            messaging,
        };
        f(&mut self.staking, &mut ctx)
    }
}
