use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use share::{
    message::{L2ToL1Message, StakeMessage, STAKE_SELECTOR},
    messaging::{Direction, Envelope, MessageTransport, MessagingError},
    token::{Erc20, TokenError},
};

use crate::biz_error::{ErrorCode, Result};

/*´:°•.°+.*•´.*:˚.°*.˚•´.°:°•.°•.*•´.*:˚.°*.˚•´.°:°•.°+.*•´.*:*/
/*                         EVENTS                             */
/*.•°:°.´+˚.*°.˚:*.´•*.+°.•°:´*.´•*.•°.•°:°.´:•˚°.*°.˚:*.´+°.•*/

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BridgeEvent {
    Stake {
        /// The account that locked tokens and is credited on L2
        account: Address,
        amount: U256,
        /// Hash of the stake message sent to L2
        message_hash: B256,
        nonce: u64,
        timestamp: u64,
    },
    Withdrawal {
        account: Address,
        amount: U256,
        /// Hash of the consumed L2 message
        message_hash: B256,
        timestamp: u64,
    },
    RewardClaimed {
        account: Address,
        amount: U256,
        message_hash: B256,
        timestamp: u64,
    },
}

/*´:°•.°+.*•´.*:˚.°*.˚•´.°:°•.°•.*•´.*:˚.°*.˚•´.°:°•.°+.*•´.*:*/
/*                         BRIDGE IMPL                        */
/*.•°:°.´+˚.*°.˚:*.´•*.+°.•°:´*.´•*.•°.•°:°.´:•˚°.*°.˚:*.´+°.•*/

/// Accounts and environment of one L1 call.
pub struct Context<'a> {
    pub sender: Address,
    pub timestamp: u64,
    pub staking_token: &'a mut Erc20,
    pub reward_token: &'a mut Erc20,
    pub messaging: &'a mut dyn MessageTransport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakingBridge {
    pub address: Address,
    pub staking_token: Address,
    pub reward_token: Address,
    /// The L2 staking rewards contract, the only sender whose messages are
    /// honoured.
    pub l2_staking: Address,
    finalized_messages: FinalizedMessages,
    events: Vec<BridgeEvent>,
}

impl StakingBridge {
    pub fn new(
        address: Address,
        staking_token: Address,
        reward_token: Address,
        l2_staking: Address,
    ) -> Self {
        Self {
            address,
            staking_token,
            reward_token,
            l2_staking,
            finalized_messages: FinalizedMessages::default(),
            events: Vec::new(),
        }
    }

    /// Locks `amount` of the caller's staking token and asks L2 to credit the
    /// same stake. Returns the message hash and nonce; delivery happens
    /// later.
    pub fn stake(&mut self, ctx: &mut Context<'_>, amount: U256) -> Result<(B256, u64)> {
        self.check_token_accounts(ctx)?;
        if amount.is_zero() {
            return Err(ErrorCode::InvalidAmount);
        }

        // Transfer the staking token from sender to the bridge custody.
        ctx.staking_token
            .transfer_from(self.address, ctx.sender, self.address, amount)?;

        let payload = StakeMessage {
            account: ctx.sender,
            amount,
        }
        .encode();
        let (message_hash, nonce) = ctx.messaging.send_message(
            Direction::L1ToL2,
            self.address,
            self.l2_staking,
            *STAKE_SELECTOR,
            payload,
        );

        self.events.push(BridgeEvent::Stake {
            account: ctx.sender,
            amount,
            message_hash,
            nonce,
            timestamp: ctx.timestamp,
        });
        log::info!(
            "stake for account: {:?}, amount: {}, message: {} (nonce {})",
            ctx.sender,
            amount,
            message_hash,
            nonce
        );
        Ok((message_hash, nonce))
    }

    /// Settles a Withdraw or ClaimReward message from L2. Anyone may relay
    /// it; the beneficiary is taken from the payload.
    pub fn consume_message(&mut self, ctx: &mut Context<'_>, envelope: &Envelope) -> Result<B256> {
        self.check_token_accounts(ctx)?;
        if envelope.direction != Direction::L2ToL1
            || envelope.from != self.l2_staking
            || envelope.to != self.address
        {
            log::warn!("rejected message from {:?} to {:?}", envelope.from, envelope.to);
            return Err(ErrorCode::Unauthorized(envelope.from));
        }

        // Check that this message has not already been finalized.
        let message_hash = envelope.hash();
        if self.finalized_messages.get_finalized(&message_hash) {
            return Err(MessagingError::MessageReplayOrNotFound(message_hash).into());
        }

        let message = L2ToL1Message::decode(&envelope.payload)?;
        self.check_effect(ctx, &message)?;

        ctx.messaging.consume_message(envelope)?;

        // Mark the message as finalized so it can't be replayed.
        self.finalized_messages.set_finalized(message_hash, true);

        let event = match message {
            L2ToL1Message::Withdraw { account, amount } => {
                ctx.staking_token.transfer(self.address, account, amount)?;
                log::info!("withdrawal for account: {:?}, amount: {}", account, amount);
                BridgeEvent::Withdrawal {
                    account,
                    amount,
                    message_hash,
                    timestamp: ctx.timestamp,
                }
            }
            L2ToL1Message::ClaimReward { account, amount } => {
                ctx.reward_token.mint(self.address, account, amount)?;
                log::info!("reward claimed for account: {:?}, amount: {}", account, amount);
                BridgeEvent::RewardClaimed {
                    account,
                    amount,
                    message_hash,
                    timestamp: ctx.timestamp,
                }
            }
        };
        self.events.push(event);
        Ok(message_hash)
    }

    /// Staking tokens currently held in custody.
    pub fn locked_balance(&self, staking_token: &Erc20) -> U256 {
        staking_token.balance_of(&self.address)
    }

    pub fn is_finalized(&self, message_hash: &B256) -> bool {
        self.finalized_messages.get_finalized(message_hash)
    }

    pub fn events(&self) -> &[BridgeEvent] {
        &self.events
    }

    fn check_token_accounts(&self, ctx: &Context<'_>) -> Result<()> {
        for (expected, got) in [
            (self.staking_token, ctx.staking_token.address),
            (self.reward_token, ctx.reward_token.address),
        ] {
            if expected != got {
                return Err(ErrorCode::TokenMismatch { expected, got });
            }
        }
        Ok(())
    }

    // Everything that could make the effect fail is checked before the
    // transport consumes the message.
    fn check_effect(&self, ctx: &Context<'_>, message: &L2ToL1Message) -> Result<()> {
        match *message {
            L2ToL1Message::Withdraw { amount, .. } => {
                let available = self.locked_balance(ctx.staking_token);
                if available < amount {
                    log::error!(
                        "custody desync: L2 releases {} but bridge holds {}",
                        amount,
                        available
                    );
                    return Err(ErrorCode::InsufficientCustody {
                        required: amount,
                        available,
                    });
                }
            }
            L2ToL1Message::ClaimReward { amount, .. } => {
                if ctx.reward_token.minter != Some(self.address) {
                    return Err(TokenError::NotMinter(self.address).into());
                }
                if ctx.reward_token.total_supply().checked_add(amount).is_none() {
                    return Err(TokenError::Overflow.into());
                }
            }
        }
        Ok(())
    }
}

/// Hashes of L2 messages already settled by the bridge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinalizedMessages {
    pub finalized_messages: Vec<(B256, bool)>,
}

impl FinalizedMessages {
    pub fn get_finalized(&self, message_hash: &B256) -> bool {
        self.finalized_messages
            .iter()
            .find(|(key, _)| key == message_hash)
            .map(|(_, finalized)| *finalized)
            .unwrap_or(false)
    }

    pub fn set_finalized(&mut self, message_hash: B256, finalized: bool) {
        if let Some(entry) = self
            .finalized_messages
            .iter_mut()
            .find(|(key, _)| key == &message_hash)
        {
            entry.1 = finalized;
        } else {
            self.finalized_messages.push((message_hash, finalized));
        }
    }
}
