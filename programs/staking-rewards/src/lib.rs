//! L2 staking rewards.
//!
//! Stake is credited either directly, by pulling the L2 staking token, or
//! from the L1 staking bridge through a cross-ledger message. Rewards accrue
//! through a global reward-per-token accumulator that is settled before every
//! state change, so no operation ever iterates over stakers.

pub mod biz_error;
pub mod reward_math;
pub mod staking;
pub mod state;

#[cfg(test)]
mod tests;

pub use crate::biz_error::{ErrorCode, Result};
pub use crate::staking::{Context, StakingEvent, StakingRewards, StakingRewardsConfig};
pub use crate::state::{RewardMode, RewardPeriod, StakeAccount};
