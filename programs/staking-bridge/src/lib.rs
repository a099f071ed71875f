//! L1 staking bridge.
//!
//! Holds the L1 staking token in custody, forwards stakes to the L2 staking
//! rewards contract and settles the withdrawals and reward claims L2 sends
//! back.

pub mod biz_error;
pub mod bridge;

pub use crate::biz_error::{ErrorCode, Result};
pub use crate::bridge::{BridgeEvent, Context, FinalizedMessages, StakingBridge};
