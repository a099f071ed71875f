//! Fixed-point reward accounting.
//!
//! All values are unsigned 256-bit integers, the accumulator is scaled by
//! [`PRECISION`] and every division truncates toward zero. Overflow is an
//! error, never a wrap.

use alloy_primitives::U256;
use share::PRECISION;

use crate::biz_error::{ErrorCode, Result};
use crate::state::{RewardPeriod, StakeAccount};

fn precision() -> U256 {
    U256::from(PRECISION)
}

/// Rewards stop accruing at `period_finish`.
pub fn last_time_reward_applicable(now: u64, period_finish: u64) -> u64 {
    now.min(period_finish)
}

/// Accumulator value at `now`. Unchanged while nothing is staked.
pub fn reward_per_token(period: &RewardPeriod, now: u64) -> Result<U256> {
    if period.total_staked.is_zero() {
        return Ok(period.reward_per_token_stored);
    }
    let elapsed = last_time_reward_applicable(now, period.period_finish)
        .saturating_sub(period.last_update_time);

    let accrued = U256::from(elapsed)
        .checked_mul(period.reward_rate)
        .and_then(|v| v.checked_mul(precision()))
        .ok_or(ErrorCode::Overflow)?
        / period.total_staked;

    period
        .reward_per_token_stored
        .checked_add(accrued)
        .ok_or(ErrorCode::Overflow)
}

/// Reward owed to `account` given the current accumulator.
pub fn earned(account: &StakeAccount, reward_per_token: U256) -> Result<U256> {
    let delta = reward_per_token
        .checked_sub(account.reward_per_token_paid)
        .ok_or(ErrorCode::Overflow)?;
    let fresh = account
        .staked_balance
        .checked_mul(delta)
        .ok_or(ErrorCode::Overflow)?
        / precision();

    fresh
        .checked_add(account.rewards_owed)
        .ok_or(ErrorCode::Overflow)
}

pub fn reward_for_duration(reward_rate: U256, duration: u64) -> Result<U256> {
    reward_rate
        .checked_mul(U256::from(duration))
        .ok_or(ErrorCode::Overflow)
}

/// The global half of settlement: brings the accumulator up to `now`.
pub fn settle_period(period: &RewardPeriod, now: u64) -> Result<RewardPeriod> {
    let mut settled = *period;
    settled.reward_per_token_stored = reward_per_token(period, now)?;
    settled.last_update_time = last_time_reward_applicable(now, period.period_finish);
    Ok(settled)
}

/// The per-account half of settlement: snapshots earned reward against an
/// already settled accumulator.
pub fn settle_account(account: &StakeAccount, reward_per_token: U256) -> Result<StakeAccount> {
    let mut settled = *account;
    settled.rewards_owed = earned(account, reward_per_token)?;
    settled.reward_per_token_paid = reward_per_token;
    Ok(settled)
}

/// Rate for a new top-up of `amount`, folding in whatever the running period
/// has not paid out yet. `period` must already be settled at `now`.
pub fn next_reward_rate(period: &RewardPeriod, amount: U256, now: u64) -> Result<U256> {
    let duration = U256::from(period.rewards_duration);
    if duration.is_zero() {
        return Err(ErrorCode::InvalidAmount);
    }

    let total = if now >= period.period_finish {
        amount
    } else {
        let remaining = U256::from(period.period_finish - now);
        let leftover = remaining
            .checked_mul(period.reward_rate)
            .ok_or(ErrorCode::Overflow)?;
        amount.checked_add(leftover).ok_or(ErrorCode::Overflow)?
    };
    Ok(total / duration)
}
