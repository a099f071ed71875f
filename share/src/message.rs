//! Fixed-layout payloads exchanged between the L1 bridge and the L2 staking
//! contract.
//!
//! Every payload element is a field element carried as a [`U256`]. Amounts
//! travel as two 128-bit limbs (`low`, `high`) because the L2 execution
//! environment cannot hold a full 256-bit word in one element.
//!
//! | Kind        | Payload                      | Direction |
//! |-------------|------------------------------|-----------|
//! | Stake       | `[account, low, high]`       | L1 → L2   |
//! | Withdraw    | `[1, account, low, high]`    | L2 → L1   |
//! | ClaimReward | `[2, account, low, high]`    | L2 → L1   |

use alloy_primitives::{keccak256, Address, U256};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const WITHDRAW: u64 = 1;
pub const CLAIM_REWARD: u64 = 2;

const STAKE_PAYLOAD_LEN: usize = 3;
const L2_TO_L1_PAYLOAD_LEN: usize = 4;

lazy_static! {
    static ref SELECTOR_MASK: U256 = (U256::from(1) << 250) - U256::from(1);
    /// Entry point on L2 that receives stake messages from the L1 bridge.
    pub static ref STAKE_SELECTOR: U256 = selector("handle_stake_from_bridge");
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("empty payload")]
    EmptyPayload,
    #[error("payload length mismatch: expected {expected}, got {got}")]
    InvalidLength { expected: usize, got: usize },
    #[error("unknown message discriminator {0}")]
    UnknownDiscriminator(U256),
    #[error("amount limb {0} does not fit in 128 bits")]
    LimbOverflow(U256),
    #[error("field element {0} is not a valid address")]
    InvalidAddress(U256),
}

/// Entry point selector: keccak of the name truncated to 250 bits.
pub fn selector(name: &str) -> U256 {
    U256::from_be_bytes(keccak256(name.as_bytes()).0) & *SELECTOR_MASK
}

/// A 256-bit amount in its two-limb L2 representation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Uint256 {
    pub low: u128,
    pub high: u128,
}

impl Uint256 {
    /// Rebuilds an amount from two payload elements, each of which must fit
    /// in 128 bits.
    pub fn from_felts(low: U256, high: U256) -> Result<Self, EncodingError> {
        let low = u128::try_from(low).map_err(|_| EncodingError::LimbOverflow(low))?;
        let high = u128::try_from(high).map_err(|_| EncodingError::LimbOverflow(high))?;
        Ok(Self { low, high })
    }

    pub fn to_felts(self) -> [U256; 2] {
        [U256::from(self.low), U256::from(self.high)]
    }
}

impl From<U256> for Uint256 {
    fn from(value: U256) -> Self {
        let limbs = value.as_limbs();
        Self {
            low: u128::from(limbs[0]) | (u128::from(limbs[1]) << 64),
            high: u128::from(limbs[2]) | (u128::from(limbs[3]) << 64),
        }
    }
}

impl From<Uint256> for U256 {
    fn from(value: Uint256) -> Self {
        (U256::from(value.high) << 128) | U256::from(value.low)
    }
}

pub fn address_to_felt(address: Address) -> U256 {
    U256::from_be_slice(address.as_slice())
}

pub fn felt_to_address(felt: U256) -> Result<Address, EncodingError> {
    if felt >> 160 != U256::ZERO {
        return Err(EncodingError::InvalidAddress(felt));
    }
    let bytes = felt.to_be_bytes::<32>();
    Ok(Address::from_slice(&bytes[12..]))
}

fn check_len(payload: &[U256], expected: usize) -> Result<(), EncodingError> {
    if payload.is_empty() {
        return Err(EncodingError::EmptyPayload);
    }
    if payload.len() != expected {
        return Err(EncodingError::InvalidLength {
            expected,
            got: payload.len(),
        });
    }
    Ok(())
}

/// L1 → L2: credit `amount` of stake to `account`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeMessage {
    pub account: Address,
    pub amount: U256,
}

impl StakeMessage {
    pub fn encode(&self) -> Vec<U256> {
        let [low, high] = Uint256::from(self.amount).to_felts();
        vec![address_to_felt(self.account), low, high]
    }

    pub fn decode(payload: &[U256]) -> Result<Self, EncodingError> {
        check_len(payload, STAKE_PAYLOAD_LEN)?;
        Ok(Self {
            account: felt_to_address(payload[0])?,
            amount: Uint256::from_felts(payload[1], payload[2])?.into(),
        })
    }
}

/// L2 → L1 messages. The first payload element is always the discriminator
/// so the bridge can dispatch without out-of-band type information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum L2ToL1Message {
    Withdraw { account: Address, amount: U256 },
    ClaimReward { account: Address, amount: U256 },
}

impl L2ToL1Message {
    pub fn discriminator(&self) -> u64 {
        match self {
            Self::Withdraw { .. } => WITHDRAW,
            Self::ClaimReward { .. } => CLAIM_REWARD,
        }
    }

    pub fn account(&self) -> Address {
        match self {
            Self::Withdraw { account, .. } | Self::ClaimReward { account, .. } => *account,
        }
    }

    pub fn amount(&self) -> U256 {
        match self {
            Self::Withdraw { amount, .. } | Self::ClaimReward { amount, .. } => *amount,
        }
    }

    pub fn encode(&self) -> Vec<U256> {
        let [low, high] = Uint256::from(self.amount()).to_felts();
        vec![
            U256::from(self.discriminator()),
            address_to_felt(self.account()),
            low,
            high,
        ]
    }

    pub fn decode(payload: &[U256]) -> Result<Self, EncodingError> {
        let discriminator = *payload.first().ok_or(EncodingError::EmptyPayload)?;
        if discriminator != U256::from(WITHDRAW) && discriminator != U256::from(CLAIM_REWARD) {
            return Err(EncodingError::UnknownDiscriminator(discriminator));
        }
        check_len(payload, L2_TO_L1_PAYLOAD_LEN)?;

        let account = felt_to_address(payload[1])?;
        let amount = Uint256::from_felts(payload[2], payload[3])?.into();
        if discriminator == U256::from(WITHDRAW) {
            Ok(Self::Withdraw { account, amount })
        } else {
            Ok(Self::ClaimReward { account, amount })
        }
    }
}
