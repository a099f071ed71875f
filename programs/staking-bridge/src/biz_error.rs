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
    /// The bridge holds less than L2 asks it to release. The two ledgers
    /// disagree; the message stays pending.
    #[error("Insufficient custody: requested {required}, bridge holds {available}")]
    InsufficientCustody { required: U256, available: U256 },
    #[error("Sender {0} is not authorized")]
    Unauthorized(Address),
    #[error("Wrong token account: expected {expected}, got {got}")]
    TokenMismatch { expected: Address, got: Address },
    #[error(transparent)]
    Messaging(#[from] MessagingError),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error(transparent)]
    Token(#[from] TokenError),
}
