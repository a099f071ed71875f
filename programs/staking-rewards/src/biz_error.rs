use alloy_primitives::{Address, U256};
use share::{message::EncodingError, messaging::MessagingError, token::TokenError};
use thiserror::Error;

/*´:°•.°+.*•´.*:˚.°*.˚•´.°:°•.°•.*•´.*:˚.°*.˚•´.°:°•.°+.*•´.*:*/
/*                          BIZ ERROR                         */
/*.•°:°.´+˚.*°.˚:*.´•*.+°.•°:´*.´•*.•°.•°:°.´:•˚°.*°.˚:*.´+°.•*/

pub type Result<T> = std::result::Result<T, ErrorCode>;

/// Biz error code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorCode {
    #[error("Amount must be greater than zero")]
    InvalidAmount,
    #[error("Insufficient staked balance: requested {requested}, staked {available}")]
    InsufficientBalance { requested: U256, available: U256 },
    #[error("Provided reward too high: needs {required}, contract holds {available}")]
    InsufficientRewardBalance { required: U256, available: U256 },
    #[error("Previous rewards period must be complete (finishes at {period_finish}, now {now})")]
    PeriodNotFinished { period_finish: u64, now: u64 },
    #[error("Caller {0} is not authorized")]
    Unauthorized(Address),
    #[error("Wrong token account: expected {expected}, got {got}")]
    TokenMismatch { expected: Address, got: Address },
    #[error("Cannot withdraw the staking token")]
    CannotRecoverStakingToken,
    #[error("Arithmetic overflow")]
    Overflow,
    #[error(transparent)]
    Messaging(#[from] MessagingError),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error(transparent)]
    Token(#[from] TokenError),
}
