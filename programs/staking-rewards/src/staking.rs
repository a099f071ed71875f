use std::collections::{HashMap, HashSet};

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use share::{
    message::{L2ToL1Message, StakeMessage, STAKE_SELECTOR},
    messaging::{Direction, Envelope, MessageTransport, MessagingError},
    token::{Erc20, TokenError},
    DEFAULT_REWARDS_DURATION,
};

use crate::biz_error::{ErrorCode, Result};
use crate::reward_math;
use crate::state::{RewardMode, RewardPeriod, StakeAccount};

/*´:°•.°+.*•´.*:˚.°*.˚•´.°:°•.°•.*•´.*:˚.°*.˚•´.°:°•.°+.*•´.*:*/
/*                         EVENTS                             */
/*.•°:°.´+˚.*°.˚:*.´•*.+°.•°:´*.´•*.•°.•°:°.´:•˚°.*°.˚:*.´+°.•*/

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StakingEvent {
    Staked {
        account: Address,
        amount: U256,
        /// Set when the stake arrived from the L1 bridge.
        message_hash: Option<B256>,
    },
    Withdrawn {
        account: Address,
        amount: U256,
        /// Part of `amount` released on L1 instead of paid out here.
        bridged_amount: U256,
        message_hash: Option<B256>,
    },
    RewardPaid {
        account: Address,
        reward: U256,
        message_hash: Option<B256>,
    },
    RewardAdded {
        reward: U256,
        reward_rate: U256,
        period_finish: u64,
    },
    RewardsDurationUpdated {
        duration: u64,
    },
    RewardsDistributionUpdated {
        authority: Address,
    },
    Recovered {
        token: Address,
        amount: U256,
    },
}

/*´:°•.°+.*•´.*:˚.°*.˚•´.°:°•.°•.*•´.*:˚.°*.˚•´.°:°•.°+.*•´.*:*/
/*                        STAKING IMPL                        */
/*.•°:°.´+˚.*°.˚:*.´•*.+°.•°:´*.´•*.•°.•°:°.´:•˚°.*°.˚:*.´+°.•*/

/// Accounts and environment of one L2 call.
pub struct Context<'a> {
    pub sender: Address,
    pub timestamp: u64,
    pub staking_token: &'a mut Erc20,
    pub reward_token: &'a mut Erc20,
    pub messaging: &'a mut dyn MessageTransport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakingRewardsConfig {
    pub address: Address,
    pub owner: Address,
    pub rewards_distribution: Address,
    pub staking_token: Address,
    pub reward_token: Address,
    /// The only L1 contract allowed to credit stake.
    pub l1_bridge: Address,
    pub reward_mode: RewardMode,
    pub rewards_duration: u64,
}

impl StakingRewardsConfig {
    pub fn new(
        address: Address,
        owner: Address,
        staking_token: Address,
        reward_token: Address,
        l1_bridge: Address,
    ) -> Self {
        Self {
            address,
            owner,
            rewards_distribution: owner,
            staking_token,
            reward_token,
            l1_bridge,
            reward_mode: RewardMode::default(),
            rewards_duration: DEFAULT_REWARDS_DURATION,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakingRewards {
    pub address: Address,
    pub owner: Address,
    pub rewards_distribution: Address,
    pub staking_token: Address,
    pub reward_token: Address,
    pub l1_bridge: Address,
    pub reward_mode: RewardMode,
    period: RewardPeriod,
    accounts: HashMap<Address, StakeAccount>,
    // L1 -> L2 messages already applied.
    handled_messages: HashSet<B256>,
    events: Vec<StakingEvent>,
}

impl StakingRewards {
    pub fn new(config: StakingRewardsConfig) -> Self {
        Self {
            address: config.address,
            owner: config.owner,
            rewards_distribution: config.rewards_distribution,
            staking_token: config.staking_token,
            reward_token: config.reward_token,
            l1_bridge: config.l1_bridge,
            reward_mode: config.reward_mode,
            period: RewardPeriod::new(config.rewards_duration),
            accounts: HashMap::new(),
            handled_messages: HashSet::new(),
            events: Vec::new(),
        }
    }

    /// Stake `amount` of the L2 staking token. The caller must have approved
    /// this contract beforehand.
    pub fn stake(&mut self, ctx: &mut Context<'_>, amount: U256) -> Result<()> {
        self.check_token_accounts(ctx)?;
        if amount.is_zero() {
            return Err(ErrorCode::InvalidAmount);
        }

        let (mut period, mut account) = self.settle(ctx.sender, ctx.timestamp)?;
        account.staked_balance = checked_add(account.staked_balance, amount)?;
        period.total_staked = checked_add(period.total_staked, amount)?;

        ctx.staking_token
            .transfer_from(self.address, ctx.sender, self.address, amount)?;

        self.commit(period, ctx.sender, account);
        self.emit(StakingEvent::Staked {
            account: ctx.sender,
            amount,
            message_hash: None,
        });
        log::info!("stake for account: {:?}, amount: {}", ctx.sender, amount);
        Ok(())
    }

    /// Applies a stake message sent by the L1 bridge, crediting the account
    /// named in the payload rather than the caller.
    pub fn handle_stake_from_bridge(
        &mut self,
        ctx: &mut Context<'_>,
        envelope: &Envelope,
    ) -> Result<B256> {
        if envelope.direction != Direction::L1ToL2
            || envelope.from != self.l1_bridge
            || envelope.to != self.address
            || envelope.selector != *STAKE_SELECTOR
        {
            return Err(ErrorCode::Unauthorized(envelope.from));
        }
        let hash = envelope.hash();
        if self.handled_messages.contains(&hash) {
            return Err(MessagingError::MessageReplayOrNotFound(hash).into());
        }

        let message = StakeMessage::decode(&envelope.payload)?;
        if message.amount.is_zero() {
            return Err(ErrorCode::InvalidAmount);
        }

        let (mut period, mut account) = self.settle(message.account, ctx.timestamp)?;
        account.staked_balance = checked_add(account.staked_balance, message.amount)?;
        account.bridged_balance = checked_add(account.bridged_balance, message.amount)?;
        period.total_staked = checked_add(period.total_staked, message.amount)?;

        ctx.messaging.consume_message(envelope)?;

        self.handled_messages.insert(hash);
        self.commit(period, message.account, account);
        self.emit(StakingEvent::Staked {
            account: message.account,
            amount: message.amount,
            message_hash: Some(hash),
        });
        log::info!(
            "bridged stake for account: {:?}, amount: {}, message: {}",
            message.account,
            message.amount,
            hash
        );
        Ok(hash)
    }

    /// Unstake `amount`. Locally funded stake is returned in L2 tokens first;
    /// the rest is released on L1 through a Withdraw message.
    pub fn withdraw(&mut self, ctx: &mut Context<'_>, amount: U256) -> Result<Option<B256>> {
        self.check_token_accounts(ctx)?;
        if amount.is_zero() {
            return Err(ErrorCode::InvalidAmount);
        }
        let available = self.balance_of(&ctx.sender);
        if amount > available {
            return Err(ErrorCode::InsufficientBalance {
                requested: amount,
                available,
            });
        }

        let (mut period, mut account) = self.settle(ctx.sender, ctx.timestamp)?;
        let local_amount = amount.min(account.local_balance());
        let bridged_amount = amount - local_amount;
        account.staked_balance -= amount;
        account.bridged_balance -= bridged_amount;
        period.total_staked = period
            .total_staked
            .checked_sub(amount)
            .ok_or(ErrorCode::Overflow)?;

        if !local_amount.is_zero() {
            ctx.staking_token
                .transfer(self.address, ctx.sender, local_amount)?;
        }
        let message_hash = if bridged_amount.is_zero() {
            None
        } else {
            let message = L2ToL1Message::Withdraw {
                account: ctx.sender,
                amount: bridged_amount,
            };
            Some(self.send_to_l1(ctx, message))
        };

        self.commit(period, ctx.sender, account);
        self.emit(StakingEvent::Withdrawn {
            account: ctx.sender,
            amount,
            bridged_amount,
            message_hash,
        });
        log::info!(
            "withdraw for account: {:?}, amount: {}, bridged: {}",
            ctx.sender,
            amount,
            bridged_amount
        );
        Ok(message_hash)
    }

    /// Pays out everything the caller has earned. Returns the amount paid.
    pub fn claim_reward(&mut self, ctx: &mut Context<'_>) -> Result<U256> {
        self.check_token_accounts(ctx)?;

        let (period, mut account) = self.settle(ctx.sender, ctx.timestamp)?;
        let reward = account.rewards_owed;
        if reward.is_zero() {
            self.commit(period, ctx.sender, account);
            return Ok(reward);
        }

        let message_hash = self.pay_reward(ctx, reward)?;
        account.rewards_owed = U256::ZERO;

        self.commit(period, ctx.sender, account);
        self.emit(StakingEvent::RewardPaid {
            account: ctx.sender,
            reward,
            message_hash,
        });
        log::info!("reward paid to account: {:?}, reward: {}", ctx.sender, reward);
        Ok(reward)
    }

    /// Withdraws the whole stake and claims the reward in one call.
    pub fn exit(&mut self, ctx: &mut Context<'_>) -> Result<U256> {
        self.check_token_accounts(ctx)?;
        let pending = self.earned(&ctx.sender, ctx.timestamp)?;
        let held = ctx.reward_token.balance_of(&self.address);
        if held < pending {
            return Err(TokenError::InsufficientBalance {
                account: self.address,
                available: held,
                required: pending,
            }
            .into());
        }

        let balance = self.balance_of(&ctx.sender);
        self.withdraw(ctx, balance)?;
        self.claim_reward(ctx)
    }

    /// Starts or extends the reward period with `amount` of new reward. The
    /// reward tokens must already be held by this contract.
    pub fn notify_reward_amount(&mut self, ctx: &mut Context<'_>, amount: U256) -> Result<()> {
        if ctx.sender != self.rewards_distribution {
            return Err(ErrorCode::Unauthorized(ctx.sender));
        }
        self.check_token_accounts(ctx)?;

        let now = ctx.timestamp;
        let mut period = reward_math::settle_period(&self.period, now)?;
        let reward_rate = reward_math::next_reward_rate(&period, amount, now)?;

        let required = reward_math::reward_for_duration(reward_rate, period.rewards_duration)?;
        let available = ctx.reward_token.balance_of(&self.address);
        if required > available {
            return Err(ErrorCode::InsufficientRewardBalance {
                required,
                available,
            });
        }

        period.reward_rate = reward_rate;
        period.last_update_time = now;
        period.period_finish = now
            .checked_add(period.rewards_duration)
            .ok_or(ErrorCode::Overflow)?;
        self.period = period;

        self.emit(StakingEvent::RewardAdded {
            reward: amount,
            reward_rate,
            period_finish: period.period_finish,
        });
        log::info!(
            "reward added: {}, rate: {}/s, period finishes at {}",
            amount,
            reward_rate,
            period.period_finish
        );
        Ok(())
    }

    pub fn set_rewards_duration(&mut self, ctx: &mut Context<'_>, duration: u64) -> Result<()> {
        if ctx.sender != self.rewards_distribution {
            return Err(ErrorCode::Unauthorized(ctx.sender));
        }
        if ctx.timestamp < self.period.period_finish {
            return Err(ErrorCode::PeriodNotFinished {
                period_finish: self.period.period_finish,
                now: ctx.timestamp,
            });
        }
        if duration == 0 {
            return Err(ErrorCode::InvalidAmount);
        }

        self.period.rewards_duration = duration;
        self.emit(StakingEvent::RewardsDurationUpdated { duration });
        Ok(())
    }

    pub fn set_rewards_distribution(
        &mut self,
        ctx: &mut Context<'_>,
        authority: Address,
    ) -> Result<()> {
        if ctx.sender != self.owner {
            return Err(ErrorCode::Unauthorized(ctx.sender));
        }
        self.rewards_distribution = authority;
        self.emit(StakingEvent::RewardsDistributionUpdated { authority });
        Ok(())
    }

    /// Sends tokens that were transferred here by mistake to the owner.
    /// Staked tokens can never be taken out this way.
    pub fn recover_erc20(
        &mut self,
        sender: Address,
        token: &mut Erc20,
        amount: U256,
    ) -> Result<()> {
        if sender != self.owner {
            return Err(ErrorCode::Unauthorized(sender));
        }
        if token.address == self.staking_token {
            return Err(ErrorCode::CannotRecoverStakingToken);
        }
        token.transfer(self.address, self.owner, amount)?;
        self.emit(StakingEvent::Recovered {
            token: token.address,
            amount,
        });
        Ok(())
    }

    /*´:°•.°+.*•´.*:˚.°*.˚•´.°:°•.°•.*•´.*:˚.°*.˚•´.°:°•.°+.*•´.*:*/
    /*                          VIEWS                             */
    /*.•°:°.´+˚.*°.˚:*.´•*.+°.•°:´*.´•*.•°.•°:°.´:•˚°.*°.˚:*.´+°.•*/

    pub fn balance_of(&self, account: &Address) -> U256 {
        self.account(account).staked_balance
    }

    pub fn total_supply(&self) -> U256 {
        self.period.total_staked
    }

    pub fn account(&self, account: &Address) -> StakeAccount {
        self.accounts.get(account).copied().unwrap_or_default()
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&Address, &StakeAccount)> {
        self.accounts.iter()
    }

    pub fn period(&self) -> &RewardPeriod {
        &self.period
    }

    pub fn last_time_reward_applicable(&self, now: u64) -> u64 {
        reward_math::last_time_reward_applicable(now, self.period.period_finish)
    }

    pub fn reward_per_token(&self, now: u64) -> Result<U256> {
        reward_math::reward_per_token(&self.period, now)
    }

    pub fn earned(&self, account: &Address, now: u64) -> Result<U256> {
        reward_math::earned(&self.account(account), self.reward_per_token(now)?)
    }

    pub fn get_reward_for_duration(&self) -> Result<U256> {
        reward_math::reward_for_duration(self.period.reward_rate, self.period.rewards_duration)
    }

    pub fn is_handled(&self, hash: &B256) -> bool {
        self.handled_messages.contains(hash)
    }

    pub fn events(&self) -> &[StakingEvent] {
        &self.events
    }

    /*´:°•.°+.*•´.*:˚.°*.˚•´.°:°•.°•.*•´.*:˚.°*.˚•´.°:°•.°+.*•´.*:*/
    /*                         INTERNAL                           */
    /*.•°:°.´+˚.*°.˚:*.´•*.+°.•°:´*.´•*.•°.•°:°.´:•˚°.*°.˚:*.´+°.•*/

    // Settlement is computed on copies; `commit` writes it back once every
    // fallible step of the operation has passed.
    fn settle(&self, account: Address, now: u64) -> Result<(RewardPeriod, StakeAccount)> {
        let period = reward_math::settle_period(&self.period, now)?;
        let account =
            reward_math::settle_account(&self.account(&account), period.reward_per_token_stored)?;
        Ok((period, account))
    }

    fn commit(&mut self, period: RewardPeriod, address: Address, account: StakeAccount) {
        self.period = period;
        self.accounts.insert(address, account);
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

    fn pay_reward(&self, ctx: &mut Context<'_>, reward: U256) -> Result<Option<B256>> {
        match self.reward_mode {
            RewardMode::Local => {
                ctx.reward_token.transfer(self.address, ctx.sender, reward)?;
                Ok(None)
            }
            RewardMode::Bridged => {
                ctx.reward_token.burn(self.address, reward)?;
                let message = L2ToL1Message::ClaimReward {
                    account: ctx.sender,
                    amount: reward,
                };
                Ok(Some(self.send_to_l1(ctx, message)))
            }
        }
    }

    fn send_to_l1(&self, ctx: &mut Context<'_>, message: L2ToL1Message) -> B256 {
        let (hash, nonce) = ctx.messaging.send_message(
            Direction::L2ToL1,
            self.address,
            self.l1_bridge,
            U256::from(message.discriminator()),
            message.encode(),
        );
        log::info!("sent {:?} to L1 as message {} (nonce {})", message, hash, nonce);
        hash
    }

    fn emit(&mut self, event: StakingEvent) {
        log::debug!("event: {:?}", event);
        self.events.push(event);
    }
}

fn checked_add(a: U256, b: U256) -> Result<U256> {
    a.checked_add(b).ok_or(ErrorCode::Overflow)
}
