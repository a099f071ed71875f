use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use share::DEFAULT_REWARDS_DURATION;

/*´:°•.°+.*•´.*:˚.°*.˚•´.°:°•.°•.*•´.*:˚.°*.˚•´.°:°•.°+.*•´.*:*/
/*                          STATE                             */
/*.•°:°.´+˚.*°.˚:*.´•*.+°.•°:´*.´•*.•°.•°:°.´:•˚°.*°.˚:*.´+°.•*/

/// Per-participant position. Created on first stake and never removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeAccount {
    /// Total stake, local and bridged.
    pub staked_balance: U256,
    /// Part of `staked_balance` credited by L1 bridge messages and backed by
    /// L1 custody. Always `<= staked_balance`.
    pub bridged_balance: U256,
    /// Accumulator value at the account's last settlement.
    pub reward_per_token_paid: U256,
    /// Accrued, unclaimed reward.
    pub rewards_owed: U256,
}

impl StakeAccount {
    /// Stake that was funded with L2 tokens and is paid back on L2.
    pub fn local_balance(&self) -> U256 {
        self.staked_balance.saturating_sub(self.bridged_balance)
    }
}

/// Global accrual state of one reward pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardPeriod {
    pub total_staked: U256,
    /// Reward tokens per second.
    pub reward_rate: U256,
    /// Cumulative reward per staked token, scaled by `PRECISION`.
    pub reward_per_token_stored: U256,
    pub last_update_time: u64,
    pub period_finish: u64,
    pub rewards_duration: u64,
}

impl RewardPeriod {
    pub fn new(rewards_duration: u64) -> Self {
        Self {
            total_staked: U256::ZERO,
            reward_rate: U256::ZERO,
            reward_per_token_stored: U256::ZERO,
            last_update_time: 0,
            period_finish: 0,
            rewards_duration,
        }
    }
}

impl Default for RewardPeriod {
    fn default() -> Self {
        Self::new(DEFAULT_REWARDS_DURATION)
    }
}

/// Where claimed rewards are paid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RewardMode {
    /// Transfer the L2 reward token held by the contract.
    Local,
    /// Burn the L2 reward token held by the contract and have the L1 bridge
    /// mint the same amount of the L1 reward token.
    #[default]
    Bridged,
}

impl std::str::FromStr for RewardMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "bridged" => Ok(Self::Bridged),
            other => Err(format!("unknown reward mode {:?}", other)),
        }
    }
}
