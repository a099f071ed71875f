pub mod message;
pub mod messaging;
pub mod state;
pub mod token;
pub mod utils;

pub use alloy_primitives::{Address, B256, U256};

// Fixed-point scale shared by both ledgers (18 decimals).
pub const PRECISION: u128 = 1_000_000_000_000_000_000;
// One whole token in base units.
pub const TOKEN_UNIT: u128 = PRECISION;

pub const ONE_DAY: u64 = 86_400;
pub const SEVEN_DAYS: u64 = ONE_DAY * 7;
// Default reward period length on L2.
pub const DEFAULT_REWARDS_DURATION: u64 = SEVEN_DAYS;

pub static DEFAULT_DEVNET_ADDR: &str = "0.0.0.0:5050";
pub static DEFAULT_DEVNET_DB: &str = "devnet_db";
