use std::collections::VecDeque;

use alloy_primitives::{Address, B256, U256};
use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use share::{
    messaging::{Envelope, Messaging, MessagingError},
    state::{calculate_state_root, StateDB},
};
use staking_rewards::{RewardPeriod, StakeAccount};

use crate::chain::{L1Chain, L2Chain, Layer, TokenKind, RELAYER, SEQUENCER};
use crate::config::DevnetConfig;

const STATE_KEY: &str = "devnet_state";
const BLOCK_CACHE_SIZE: usize = 128;

/// Everything that changes when a transaction commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevnetState {
    pub l1: L1Chain,
    pub l2: L2Chain,
    pub messaging: Messaging,
}

impl DevnetState {
    pub fn genesis(config: &DevnetConfig) -> Self {
        Self {
            l1: L1Chain::genesis(),
            l2: L2Chain::genesis(config.reward_mode, config.rewards_duration),
            messaging: Messaging::new(),
        }
    }

    fn deliver_to_l2(&mut self, envelope: &Envelope) -> Result<B256> {
        let Self { l2, messaging, .. } = self;
        let hash = l2.call(messaging, SEQUENCER, |staking, ctx| {
            staking.handle_stake_from_bridge(ctx, envelope)
        })?;
        Ok(hash)
    }

    fn consume_on_l1(&mut self, sender: Address, message_hash: &B256) -> Result<B256> {
        let envelope = self
            .messaging
            .find(message_hash)
            .cloned()
            .ok_or(MessagingError::MessageReplayOrNotFound(*message_hash))?;
        let Self { l1, messaging, .. } = self;
        let hash = l1.call(messaging, sender, |bridge, ctx| {
            bridge.consume_message(ctx, &envelope)
        })?;
        Ok(hash)
    }
}

/// One committed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub block_num: u64,
    /// Name of the operation that produced the block.
    pub op: String,
    pub l1_timestamp: u64,
    pub l2_timestamp: u64,
    pub prev_state_root: B256,
    pub post_state_root: B256,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FailedMessage {
    pub message_hash: B256,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlushReport {
    /// L1 -> L2 messages applied on L2.
    pub delivered: Vec<B256>,
    /// L1 -> L2 messages that reverted and are still pending.
    pub failed: Vec<FailedMessage>,
    /// L2 -> L1 messages that became consumable on L1.
    pub posted: Vec<B256>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayReport {
    pub consumed: Vec<B256>,
    pub failed: Vec<FailedMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingMessages {
    pub l1_to_l2: Vec<Envelope>,
    pub l2_outbox: Vec<Envelope>,
    pub l2_to_l1: Vec<Envelope>,
}

/// Both ledgers plus the postman between them. Every mutation runs as one
/// all-or-nothing transaction and produces a block.
pub struct Devnet {
    state: DevnetState,
    state_db: StateDB,
    latest_block_num: u64,
    latest_state_root: [u8; 32],
    blocks: VecDeque<Block>,
}

impl Devnet {
    /// Opens the devnet stored at `config.db_path`, starting from genesis if
    /// the store is empty.
    pub fn open(config: &DevnetConfig) -> Result<Self> {
        let state_db = StateDB::new(&config.db_path)?;
        Self::with_state_db(state_db, config)
    }

    /// A devnet whose store lives in memory only.
    pub fn temporary(config: &DevnetConfig) -> Result<Self> {
        Self::with_state_db(StateDB::temporary()?, config)
    }

    fn with_state_db(state_db: StateDB, config: &DevnetConfig) -> Result<Self> {
        let state = match state_db.load::<DevnetState>(STATE_KEY)? {
            Some(state) => state,
            None => {
                log::info!("No state found, starting from genesis");
                DevnetState::genesis(config)
            }
        };
        let latest_block_num = state_db.latest_block_num()?;
        let latest_state_root = state_db.latest_state_root()?;
        log::info!(
            "Devnet at block #{} (state root {})",
            latest_block_num,
            B256::from(latest_state_root)
        );

        Ok(Self {
            state,
            state_db,
            latest_block_num,
            latest_state_root,
            blocks: VecDeque::with_capacity(BLOCK_CACHE_SIZE),
        })
    }

    pub fn state(&self) -> &DevnetState {
        &self.state
    }

    pub fn latest_block_num(&self) -> u64 {
        self.latest_block_num
    }

    pub fn latest_state_root(&self) -> B256 {
        B256::from(self.latest_state_root)
    }

    /// Runs `f` against a copy of the state. On success the copy becomes the
    /// new state and a block is persisted; on error nothing changes.
    pub fn transact<R>(
        &mut self,
        op: &str,
        f: impl FnOnce(&mut DevnetState) -> Result<R>,
    ) -> Result<(R, Block)> {
        let mut next = self.state.clone();
        let output = match f(&mut next) {
            Ok(output) => output,
            Err(e) => {
                log::warn!("{} reverted: {:#}", op, e);
                return Err(e);
            }
        };

        let snapshot = bincode::serialize(&next).context("serialize devnet state")?;
        let post_state_root = calculate_state_root(&snapshot);
        let block = Block {
            block_num: self.latest_block_num + 1,
            op: op.to_owned(),
            l1_timestamp: next.l1.timestamp,
            l2_timestamp: next.l2.timestamp,
            prev_state_root: B256::from(self.latest_state_root),
            post_state_root: B256::from(post_state_root),
        };
        self.save_block(&next, &block)?;

        self.state = next;
        self.latest_block_num = block.block_num;
        self.latest_state_root = post_state_root;
        log::info!("Generated block #{} ({})", block.block_num, op);
        Ok((output, block))
    }

    /// Save block and state to local storage
    fn save_block(&mut self, state: &DevnetState, block: &Block) -> Result<()> {
        self.state_db.save(STATE_KEY, state)?;
        self.state_db.save(&block_key(block.block_num), block)?;
        self.state_db
            .commit_head(block.block_num, block.post_state_root.0)?;

        if self.blocks.len() == BLOCK_CACHE_SIZE {
            self.blocks.pop_front();
        }
        self.blocks.push_back(block.clone());
        Ok(())
    }

    pub fn get_block(&self, block_num: u64) -> Result<Option<Block>> {
        if let Some(block) = self.blocks.iter().find(|b| b.block_num == block_num) {
            return Ok(Some(block.clone()));
        }
        self.state_db.load(&block_key(block_num))
    }

    /*´:°•.°+.*•´.*:˚.°*.˚•´.°:°•.°•.*•´.*:˚.°*.˚•´.°:°•.°+.*•´.*:*/
    /*                            L1                              */
    /*.•°:°.´+˚.*°.˚:*.´•*.+°.•°:´*.´•*.•°.•°:°.´:•˚°.*°.˚:*.´+°.•*/

    pub fn l1_approve(&mut self, owner: Address, spender: Address, amount: U256) -> Result<Block> {
        let ((), block) = self.transact("l1_approve", |state| {
            state.l1.staking_token.approve(owner, spender, amount);
            Ok(())
        })?;
        Ok(block)
    }

    pub fn l1_stake(&mut self, sender: Address, amount: U256) -> Result<((B256, u64), Block)> {
        self.transact("l1_stake", |state| {
            let DevnetState { l1, messaging, .. } = state;
            Ok(l1.call(messaging, sender, |bridge, ctx| bridge.stake(ctx, amount))?)
        })
    }

    pub fn l1_consume_message(&mut self, sender: Address, message_hash: B256) -> Result<(B256, Block)> {
        self.transact("l1_consume_message", |state| {
            state.consume_on_l1(sender, &message_hash)
        })
    }

    pub fn l1_balance_of(&self, token: TokenKind, account: &Address) -> U256 {
        self.state.l1.token(token).balance_of(account)
    }

    /*´:°•.°+.*•´.*:˚.°*.˚•´.°:°•.°•.*•´.*:˚.°*.˚•´.°:°•.°+.*•´.*:*/
    /*                            L2                              */
    /*.•°:°.´+˚.*°.˚:*.´•*.+°.•°:´*.´•*.•°.•°:°.´:•˚°.*°.˚:*.´+°.•*/

    pub fn l2_approve(&mut self, owner: Address, spender: Address, amount: U256) -> Result<Block> {
        let ((), block) = self.transact("l2_approve", |state| {
            state.l2.staking_token.approve(owner, spender, amount);
            Ok(())
        })?;
        Ok(block)
    }

    pub fn l2_stake(&mut self, sender: Address, amount: U256) -> Result<Block> {
        let ((), block) = self.transact("l2_stake", |state| {
            let DevnetState { l2, messaging, .. } = state;
            Ok(l2.call(messaging, sender, |staking, ctx| staking.stake(ctx, amount))?)
        })?;
        Ok(block)
    }

    pub fn l2_withdraw(&mut self, sender: Address, amount: U256) -> Result<(Option<B256>, Block)> {
        self.transact("l2_withdraw", |state| {
            let DevnetState { l2, messaging, .. } = state;
            Ok(l2.call(messaging, sender, |staking, ctx| staking.withdraw(ctx, amount))?)
        })
    }

    pub fn l2_claim_reward(&mut self, sender: Address) -> Result<(U256, Block)> {
        self.transact("l2_claim_reward", |state| {
            let DevnetState { l2, messaging, .. } = state;
            Ok(l2.call(messaging, sender, |staking, ctx| staking.claim_reward(ctx))?)
        })
    }

    pub fn l2_exit(&mut self, sender: Address) -> Result<(U256, Block)> {
        self.transact("l2_exit", |state| {
            let DevnetState { l2, messaging, .. } = state;
            Ok(l2.call(messaging, sender, |staking, ctx| staking.exit(ctx))?)
        })
    }

    pub fn l2_notify_reward_amount(&mut self, sender: Address, amount: U256) -> Result<Block> {
        let ((), block) = self.transact("l2_notify_reward_amount", |state| {
            let DevnetState { l2, messaging, .. } = state;
            Ok(l2.call(messaging, sender, |staking, ctx| {
                staking.notify_reward_amount(ctx, amount)
            })?)
        })?;
        Ok(block)
    }

    pub fn l2_set_rewards_duration(&mut self, sender: Address, duration: u64) -> Result<Block> {
        let ((), block) = self.transact("l2_set_rewards_duration", |state| {
            let DevnetState { l2, messaging, .. } = state;
            Ok(l2.call(messaging, sender, |staking, ctx| {
                staking.set_rewards_duration(ctx, duration)
            })?)
        })?;
        Ok(block)
    }

    pub fn l2_earned(&self, account: &Address) -> Result<U256> {
        let l2 = &self.state.l2;
        Ok(l2.staking.earned(account, l2.timestamp)?)
    }

    pub fn l2_account(&self, account: &Address) -> StakeAccount {
        self.state.l2.staking.account(account)
    }

    pub fn l2_reward_period(&self) -> RewardPeriod {
        *self.state.l2.staking.period()
    }

    pub fn l2_balance_of(&self, token: TokenKind, account: &Address) -> U256 {
        self.state.l2.token(token).balance_of(account)
    }

    /*´:°•.°+.*•´.*:˚.°*.˚•´.°:°•.°•.*•´.*:˚.°*.˚•´.°:°•.°+.*•´.*:*/
    /*                          DEVNET                            */
    /*.•°:°.´+˚.*°.˚:*.´•*.+°.•°:´*.´•*.•°.•°:°.´:•˚°.*°.˚:*.´+°.•*/

    /// Faucet: credits `to` without going through a minter.
    pub fn mint(&mut self, layer: Layer, token: TokenKind, to: Address, amount: U256) -> Result<Block> {
        let ((), block) = self.transact("mint", |state| {
            let erc20 = match layer {
                Layer::L1 => state.l1.token_mut(token),
                Layer::L2 => state.l2.token_mut(token),
            };
            erc20.deal(to, amount)?;
            Ok(())
        })?;
        Ok(block)
    }

    /// Advances the clock of one ledger, or of both when `layer` is `None`.
    pub fn increase_time(&mut self, layer: Option<Layer>, seconds: u64) -> Result<Block> {
        let ((), block) = self.transact("increase_time", |state| {
            if layer != Some(Layer::L2) {
                state.l1.timestamp = state
                    .l1
                    .timestamp
                    .checked_add(seconds)
                    .context("L1 clock overflow")?;
            }
            if layer != Some(Layer::L1) {
                state.l2.timestamp = state
                    .l2
                    .timestamp
                    .checked_add(seconds)
                    .context("L2 clock overflow")?;
            }
            Ok(())
        })?;
        Ok(block)
    }

    /// Delivers every pending L1 -> L2 message, oldest first, each in its own
    /// transaction, then posts the L2 outbox to L1.
    pub fn flush(&mut self) -> Result<FlushReport> {
        let mut report = FlushReport::default();
        for envelope in self.state.messaging.pending_l1_to_l2() {
            let message_hash = envelope.hash();
            match self.transact("deliver_l1_to_l2", |state| state.deliver_to_l2(&envelope)) {
                Ok(_) => report.delivered.push(message_hash),
                Err(e) => report.failed.push(FailedMessage {
                    message_hash,
                    reason: format!("{:#}", e),
                }),
            }
        }

        if !self.state.messaging.outbox().is_empty() {
            let (posted, _) = self.transact("post_l2_to_l1", |state| {
                Ok(state.messaging.flush_l2_to_l1())
            })?;
            report.posted = posted;
        }
        Ok(report)
    }

    /// Consumes every posted L2 -> L1 message on L1 as the relayer. Failures
    /// stay pending.
    pub fn relay(&mut self) -> Result<RelayReport> {
        let mut report = RelayReport::default();
        for envelope in self.state.messaging.pending_l2_to_l1() {
            let message_hash = envelope.hash();
            match self.l1_consume_message(RELAYER, message_hash) {
                Ok(_) => report.consumed.push(message_hash),
                Err(e) => report.failed.push(FailedMessage {
                    message_hash,
                    reason: format!("{:#}", e),
                }),
            }
        }
        Ok(report)
    }

    pub fn pending_messages(&self) -> PendingMessages {
        let messaging = &self.state.messaging;
        PendingMessages {
            l1_to_l2: messaging.pending_l1_to_l2(),
            l2_outbox: messaging.outbox(),
            l2_to_l1: messaging.pending_l2_to_l1(),
        }
    }
}

fn block_key(block_num: u64) -> String {
    format!("block_{}", block_num)
}
