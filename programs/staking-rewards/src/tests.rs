use alloy_primitives::{address, Address, U256};
use proptest::prelude::*;
use share::{
    message::{selector, L2ToL1Message, StakeMessage, STAKE_SELECTOR},
    messaging::{Direction, Envelope, MessageTransport, Messaging, MessagingError},
    token::{Erc20, TokenError},
    ONE_DAY, SEVEN_DAYS, TOKEN_UNIT,
};

use crate::{
    staking::{Context, StakingRewards, StakingRewardsConfig},
    ErrorCode, RewardMode,
};

const ADMIN: Address = address!("00000000000000000000000000000000000ad111");
const ALICE: Address = address!("00000000000000000000000000000000000a11ce");
const BOB: Address = address!("0000000000000000000000000000000000000b0b");
const CAROL: Address = address!("00000000000000000000000000000000000ca201");
const STAKING: Address = address!("000000000000000000000000000000000057a6e0");
const L1_BRIDGE: Address = address!("00000000000000000000000000000000000b1d9e");
const STK: Address = address!("0000000000000000000000000000000000005701");
const RWD: Address = address!("0000000000000000000000000000000000005702");

const GENESIS: u64 = 1_700_000_000;

fn units(n: u64) -> U256 {
    U256::from(n) * U256::from(TOKEN_UNIT)
}

struct Harness {
    staking: StakingRewards,
    staking_token: Erc20,
    reward_token: Erc20,
    messaging: Messaging,
    now: u64,
}

impl Harness {
    fn new(reward_mode: RewardMode) -> Self {
        let mut config = StakingRewardsConfig::new(STAKING, ADMIN, STK, RWD, L1_BRIDGE);
        config.reward_mode = reward_mode;
        Self {
            staking: StakingRewards::new(config),
            staking_token: Erc20::new(STK, "Staking Token", "STK"),
            reward_token: Erc20::new(RWD, "Reward Token", "RWD"),
            messaging: Messaging::new(),
            now: GENESIS,
        }
    }

    fn call<R>(
        &mut self,
        sender: Address,
        f: impl FnOnce(&mut StakingRewards, &mut Context<'_>) -> R,
    ) -> R {
        let mut ctx = Context {
            sender,
            timestamp: self.now,
            staking_token: &mut self.staking_token,
            reward_token: &mut self.reward_token,
            messaging: &mut self.messaging,
        };
        f(&mut self.staking, &mut ctx)
    }

    fn stake(&mut self, who: Address, amount: U256) -> crate::Result<()> {
        self.staking_token.deal(who, amount).unwrap();
        self.staking_token.approve(who, STAKING, amount);
        self.call(who, |staking, ctx| staking.stake(ctx, amount))
    }

    fn notify(&mut self, amount: U256) -> crate::Result<()> {
        self.reward_token.deal(STAKING, amount).unwrap();
        self.call(ADMIN, |staking, ctx| staking.notify_reward_amount(ctx, amount))
    }

    fn send_from_l1(&mut self, from: Address, selector: U256, payload: Vec<U256>) -> Envelope {
        let (hash, _) =
            self.messaging
                .send_message(Direction::L1ToL2, from, STAKING, selector, payload);
        self.messaging.find(&hash).cloned().unwrap()
    }

    fn bridge_stake(&mut self, who: Address, amount: U256) -> crate::Result<()> {
        let payload = StakeMessage {
            account: who,
            amount,
        }
        .encode();
        let envelope = self.send_from_l1(L1_BRIDGE, *STAKE_SELECTOR, payload);
        self.call(ADMIN, |staking, ctx| {
            staking.handle_stake_from_bridge(ctx, &envelope)
        })
        .map(|_| ())
    }

    fn advance(&mut self, seconds: u64) {
        self.now += seconds;
    }
}

#[test]
fn test_stake_zero_and_over_withdraw_rejected() {
    let mut h = Harness::new(RewardMode::Local);
    assert_eq!(h.stake(ALICE, U256::ZERO).unwrap_err(), ErrorCode::InvalidAmount);

    h.stake(ALICE, units(10)).unwrap();
    let period = *h.staking.period();
    let err = h
        .call(ALICE, |staking, ctx| staking.withdraw(ctx, units(11)))
        .unwrap_err();
    assert_eq!(
        err,
        ErrorCode::InsufficientBalance {
            requested: units(11),
            available: units(10),
        }
    );
    assert_eq!(*h.staking.period(), period);
    assert_eq!(h.staking.balance_of(&ALICE), units(10));
    assert_eq!(
        h.call(ALICE, |staking, ctx| staking.withdraw(ctx, U256::ZERO))
            .unwrap_err(),
        ErrorCode::InvalidAmount
    );
}

#[test]
fn test_stake_without_approval_leaves_state_untouched() {
    let mut h = Harness::new(RewardMode::Local);
    h.staking_token.deal(ALICE, units(5)).unwrap();

    let err = h
        .call(ALICE, |staking, ctx| staking.stake(ctx, units(5)))
        .unwrap_err();
    assert!(matches!(
        err,
        ErrorCode::Token(TokenError::InsufficientAllowance { .. })
    ));
    assert_eq!(h.staking.total_supply(), U256::ZERO);
    assert_eq!(h.staking.balance_of(&ALICE), U256::ZERO);
    assert!(h.staking.events().is_empty());
}

#[test]
fn test_sole_staker_earns_full_period() {
    let mut h = Harness::new(RewardMode::Local);
    let reward = units(1_000_000);

    h.stake(ALICE, units(100)).unwrap();
    h.notify(reward).unwrap();
    h.advance(SEVEN_DAYS);

    let paid = h
        .call(ALICE, |staking, ctx| staking.claim_reward(ctx))
        .unwrap();
    assert_eq!(h.reward_token.balance_of(&ALICE), paid);
    assert!(paid <= reward);
    // Only the rate truncation (< duration) and the per-token truncation are lost.
    assert!(reward - paid < U256::from(SEVEN_DAYS + 100));
    assert_eq!(h.staking.account(&ALICE).rewards_owed, U256::ZERO);
}

#[test]
fn test_equal_stakers_split_evenly() {
    let mut h = Harness::new(RewardMode::Local);
    let reward = units(1_000_000);

    h.stake(ALICE, units(50)).unwrap();
    h.stake(BOB, units(50)).unwrap();
    h.notify(reward).unwrap();
    h.advance(SEVEN_DAYS);

    let alice = h.staking.earned(&ALICE, h.now).unwrap();
    let bob = h.staking.earned(&BOB, h.now).unwrap();
    assert_eq!(alice, bob);

    let half = reward / U256::from(2);
    assert!(alice <= half);
    assert!(half - alice < U256::from(SEVEN_DAYS + 100));
}

#[test]
fn test_late_staker_earns_share_of_remaining_time() {
    let mut h = Harness::new(RewardMode::Local);
    let reward = units(700);

    h.stake(ALICE, units(10)).unwrap();
    h.notify(reward).unwrap();
    h.advance(SEVEN_DAYS / 2);
    h.stake(BOB, units(10)).unwrap();
    h.advance(SEVEN_DAYS / 2);

    let alice = h.staking.earned(&ALICE, h.now).unwrap();
    let bob = h.staking.earned(&BOB, h.now).unwrap();
    // Alice: all of the first half plus half of the second; Bob: half of the second.
    let tolerance = U256::from(SEVEN_DAYS);
    let expected_alice = units(525);
    let expected_bob = units(175);
    assert!(expected_alice - alice < tolerance);
    assert!(expected_bob - bob < tolerance);
}

#[test]
fn test_no_accrual_while_nothing_staked() {
    let mut h = Harness::new(RewardMode::Local);
    h.notify(units(1_000)).unwrap();
    h.advance(ONE_DAY);

    assert_eq!(h.staking.reward_per_token(h.now).unwrap(), U256::ZERO);
    h.stake(ALICE, units(1)).unwrap();
    assert_eq!(h.staking.period().reward_per_token_stored, U256::ZERO);
    assert_eq!(h.staking.period().last_update_time, h.now);
}

#[test]
fn test_notify_requires_authority_and_funding() {
    let mut h = Harness::new(RewardMode::Local);
    assert_eq!(
        h.call(ALICE, |staking, ctx| staking.notify_reward_amount(ctx, units(1)))
            .unwrap_err(),
        ErrorCode::Unauthorized(ALICE)
    );

    h.reward_token.deal(STAKING, units(10)).unwrap();
    let err = h
        .call(ADMIN, |staking, ctx| staking.notify_reward_amount(ctx, units(11)))
        .unwrap_err();
    assert!(matches!(err, ErrorCode::InsufficientRewardBalance { .. }));
    assert_eq!(h.staking.period().period_finish, 0);
    assert_eq!(h.staking.period().reward_rate, U256::ZERO);

    h.call(ADMIN, |staking, ctx| staking.notify_reward_amount(ctx, units(10)))
        .unwrap();
    assert_eq!(h.staking.period().period_finish, h.now + SEVEN_DAYS);
    assert_eq!(h.staking.period().last_update_time, h.now);
    assert!(h.staking.get_reward_for_duration().unwrap() <= units(10));
}

#[test]
fn test_notify_mid_period_folds_leftover() {
    let mut h = Harness::new(RewardMode::Local);
    h.stake(ALICE, units(1)).unwrap();
    h.notify(U256::from(SEVEN_DAYS * 10)).unwrap();
    assert_eq!(h.staking.period().reward_rate, U256::from(10));

    h.advance(SEVEN_DAYS / 2);
    h.notify(U256::from(SEVEN_DAYS * 5)).unwrap();
    // leftover 5 * SEVEN_DAYS plus 5 * SEVEN_DAYS new, spread over a fresh period
    assert_eq!(h.staking.period().reward_rate, U256::from(10));
    assert_eq!(h.staking.period().period_finish, h.now + SEVEN_DAYS);
}

#[test]
fn test_rewards_duration_only_between_periods() {
    let mut h = Harness::new(RewardMode::Local);
    h.notify(units(1)).unwrap();

    h.advance(ONE_DAY);
    let err = h
        .call(ADMIN, |staking, ctx| staking.set_rewards_duration(ctx, ONE_DAY))
        .unwrap_err();
    assert!(matches!(err, ErrorCode::PeriodNotFinished { .. }));

    h.advance(SEVEN_DAYS);
    assert_eq!(
        h.call(BOB, |staking, ctx| staking.set_rewards_duration(ctx, ONE_DAY))
            .unwrap_err(),
        ErrorCode::Unauthorized(BOB)
    );
    assert_eq!(
        h.call(ADMIN, |staking, ctx| staking.set_rewards_duration(ctx, 0))
            .unwrap_err(),
        ErrorCode::InvalidAmount
    );
    h.call(ADMIN, |staking, ctx| staking.set_rewards_duration(ctx, ONE_DAY))
        .unwrap();
    assert_eq!(h.staking.period().rewards_duration, ONE_DAY);
}

#[test]
fn test_bridge_stake_credits_beneficiary_once() {
    let mut h = Harness::new(RewardMode::Bridged);
    let payload = StakeMessage {
        account: ALICE,
        amount: units(100),
    }
    .encode();
    let envelope = h.send_from_l1(L1_BRIDGE, *STAKE_SELECTOR, payload);

    let hash = h
        .call(BOB, |staking, ctx| staking.handle_stake_from_bridge(ctx, &envelope))
        .unwrap();
    assert_eq!(hash, envelope.hash());
    assert_eq!(h.staking.balance_of(&ALICE), units(100));
    assert_eq!(h.staking.account(&ALICE).bridged_balance, units(100));
    assert_eq!(h.staking.balance_of(&BOB), U256::ZERO);
    assert!(h.staking.is_handled(&hash));

    let err = h
        .call(BOB, |staking, ctx| staking.handle_stake_from_bridge(ctx, &envelope))
        .unwrap_err();
    assert_eq!(
        err,
        ErrorCode::Messaging(MessagingError::MessageReplayOrNotFound(hash))
    );
    assert_eq!(h.staking.total_supply(), units(100));
}

#[test]
fn test_bridge_stake_rejects_forgeries() {
    let mut h = Harness::new(RewardMode::Bridged);
    let payload = StakeMessage {
        account: ALICE,
        amount: units(1),
    }
    .encode();

    let forged = h.send_from_l1(CAROL, *STAKE_SELECTOR, payload.clone());
    assert_eq!(
        h.call(ADMIN, |staking, ctx| staking.handle_stake_from_bridge(ctx, &forged))
            .unwrap_err(),
        ErrorCode::Unauthorized(CAROL)
    );

    let wrong_entry = h.send_from_l1(L1_BRIDGE, selector("stake"), payload);
    assert!(matches!(
        h.call(ADMIN, |staking, ctx| staking
            .handle_stake_from_bridge(ctx, &wrong_entry))
            .unwrap_err(),
        ErrorCode::Unauthorized(_)
    ));

    let malformed = h.send_from_l1(L1_BRIDGE, *STAKE_SELECTOR, vec![U256::from(1)]);
    assert!(matches!(
        h.call(ADMIN, |staking, ctx| staking.handle_stake_from_bridge(ctx, &malformed))
            .unwrap_err(),
        ErrorCode::Encoding(_)
    ));

    let zero = StakeMessage {
        account: ALICE,
        amount: U256::ZERO,
    }
    .encode();
    let zero = h.send_from_l1(L1_BRIDGE, *STAKE_SELECTOR, zero);
    assert_eq!(
        h.call(ADMIN, |staking, ctx| staking.handle_stake_from_bridge(ctx, &zero))
            .unwrap_err(),
        ErrorCode::InvalidAmount
    );

    // Nothing was credited and every rejected message is still pending.
    assert_eq!(h.staking.total_supply(), U256::ZERO);
    assert_eq!(h.messaging.pending_l1_to_l2().len(), 4);
}

#[test]
fn test_withdraw_pays_local_stake_first() {
    let mut h = Harness::new(RewardMode::Bridged);
    h.stake(ALICE, units(30)).unwrap();
    h.bridge_stake(ALICE, units(70)).unwrap();

    let hash = h
        .call(ALICE, |staking, ctx| staking.withdraw(ctx, units(50)))
        .unwrap()
        .expect("bridged remainder is released on L1");

    assert_eq!(h.staking_token.balance_of(&ALICE), units(30));
    let account = h.staking.account(&ALICE);
    assert_eq!(account.staked_balance, units(50));
    assert_eq!(account.bridged_balance, units(50));

    let outbox = h.messaging.outbox();
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0].hash(), hash);
    assert_eq!(outbox[0].from, STAKING);
    assert_eq!(outbox[0].to, L1_BRIDGE);
    assert_eq!(
        L2ToL1Message::decode(&outbox[0].payload).unwrap(),
        L2ToL1Message::Withdraw {
            account: ALICE,
            amount: units(20),
        }
    );

    // Purely local withdrawals never talk to L1.
    h.stake(BOB, units(5)).unwrap();
    assert!(h
        .call(BOB, |staking, ctx| staking.withdraw(ctx, units(5)))
        .unwrap()
        .is_none());
    assert_eq!(h.messaging.outbox().len(), 1);
}

#[test]
fn test_bridged_claim_burns_and_messages_l1() {
    let mut h = Harness::new(RewardMode::Bridged);
    h.bridge_stake(ALICE, units(100)).unwrap();
    h.notify(units(1_000)).unwrap();
    h.advance(SEVEN_DAYS);

    let supply_before = h.reward_token.total_supply();
    let paid = h
        .call(ALICE, |staking, ctx| staking.claim_reward(ctx))
        .unwrap();
    assert!(!paid.is_zero());
    assert_eq!(h.reward_token.total_supply(), supply_before - paid);
    assert_eq!(h.reward_token.balance_of(&ALICE), U256::ZERO);

    let outbox = h.messaging.outbox();
    assert_eq!(outbox.len(), 1);
    assert_eq!(
        L2ToL1Message::decode(&outbox[0].payload).unwrap(),
        L2ToL1Message::ClaimReward {
            account: ALICE,
            amount: paid,
        }
    );

    // Nothing left to claim, nothing sent.
    assert_eq!(
        h.call(ALICE, |staking, ctx| staking.claim_reward(ctx))
            .unwrap(),
        U256::ZERO
    );
    assert_eq!(h.messaging.outbox().len(), 1);
}

#[test]
fn test_exit_withdraws_and_claims() {
    let mut h = Harness::new(RewardMode::Local);
    h.stake(ALICE, units(10)).unwrap();
    h.notify(units(70)).unwrap();
    h.advance(ONE_DAY);

    let reward = h.call(ALICE, |staking, ctx| staking.exit(ctx)).unwrap();
    assert!(!reward.is_zero());
    assert_eq!(h.staking.balance_of(&ALICE), U256::ZERO);
    assert_eq!(h.staking_token.balance_of(&ALICE), units(10));
    assert_eq!(h.reward_token.balance_of(&ALICE), reward);

    // Rewards stop accruing for a zero balance.
    h.advance(ONE_DAY);
    assert_eq!(h.staking.earned(&ALICE, h.now).unwrap(), U256::ZERO);
}

#[test]
fn test_recover_erc20() {
    let mut h = Harness::new(RewardMode::Local);
    let mut stray = Erc20::new(address!("0000000000000000000000000000000000005703"), "Stray", "STR");
    stray.deal(STAKING, units(3)).unwrap();

    assert_eq!(
        h.staking
            .recover_erc20(ALICE, &mut stray, units(3))
            .unwrap_err(),
        ErrorCode::Unauthorized(ALICE)
    );
    assert_eq!(
        h.staking
            .recover_erc20(ADMIN, &mut h.staking_token, U256::ZERO)
            .unwrap_err(),
        ErrorCode::CannotRecoverStakingToken
    );
    h.staking.recover_erc20(ADMIN, &mut stray, units(3)).unwrap();
    assert_eq!(stray.balance_of(&ADMIN), units(3));
}

#[test]
fn test_wrong_token_account_rejected() {
    let mut h = Harness::new(RewardMode::Local);
    h.staking_token = Erc20::new(RWD, "Impostor", "IMP");
    assert_eq!(
        h.call(ALICE, |staking, ctx| staking.stake(ctx, units(1)))
            .unwrap_err(),
        ErrorCode::TokenMismatch {
            expected: STK,
            got: RWD,
        }
    );
}

#[test]
fn test_new_authority_takes_over() {
    let mut h = Harness::new(RewardMode::Local);
    assert_eq!(
        h.call(BOB, |staking, ctx| staking.set_rewards_distribution(ctx, BOB))
            .unwrap_err(),
        ErrorCode::Unauthorized(BOB)
    );
    h.call(ADMIN, |staking, ctx| staking.set_rewards_distribution(ctx, BOB))
        .unwrap();

    h.reward_token.deal(STAKING, units(1)).unwrap();
    assert!(h
        .call(ADMIN, |staking, ctx| staking.notify_reward_amount(ctx, units(1)))
        .is_err());
    h.call(BOB, |staking, ctx| staking.notify_reward_amount(ctx, units(1)))
        .unwrap();
}

#[derive(Debug, Clone)]
enum Op {
    Stake(usize, u64),
    BridgeStake(usize, u64),
    Withdraw(usize, u64),
    Claim(usize),
    Notify(u64),
    Advance(u64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..3usize, 0..1_000u64).prop_map(|(who, amount)| Op::Stake(who, amount)),
        (0..3usize, 1..1_000u64).prop_map(|(who, amount)| Op::BridgeStake(who, amount)),
        (0..3usize, 0..1_000u64).prop_map(|(who, amount)| Op::Withdraw(who, amount)),
        (0..3usize).prop_map(Op::Claim),
        (0..1_000_000u64).prop_map(Op::Notify),
        (0..3 * ONE_DAY).prop_map(Op::Advance),
    ]
}

proptest! {
    #[test]
    fn prop_accounting_invariants(ops in prop::collection::vec(op_strategy(), 1..64)) {
        let stakers = [ALICE, BOB, CAROL];
        let mut h = Harness::new(RewardMode::Bridged);
        let mut last_rpt = U256::ZERO;

        for op in ops {
            let before = (*h.staking.period(), stakers.map(|who| h.staking.account(&who)));
            let result = match op {
                Op::Stake(who, amount) => h.stake(stakers[who], units(amount)),
                Op::BridgeStake(who, amount) => h.bridge_stake(stakers[who], units(amount)),
                Op::Withdraw(who, amount) => h
                    .call(stakers[who], |staking, ctx| staking.withdraw(ctx, units(amount)))
                    .map(|_| ()),
                Op::Claim(who) => h
                    .call(stakers[who], |staking, ctx| staking.claim_reward(ctx))
                    .map(|_| ()),
                Op::Notify(amount) => h.notify(units(amount)),
                Op::Advance(seconds) => {
                    h.advance(seconds);
                    Ok(())
                }
            };
            if result.is_err() {
                let after = (*h.staking.period(), stakers.map(|who| h.staking.account(&who)));
                prop_assert_eq!(before, after);
            }

            let mut sum = U256::ZERO;
            for who in stakers {
                let account = h.staking.account(&who);
                prop_assert!(account.bridged_balance <= account.staked_balance);
                sum += account.staked_balance;
            }
            prop_assert_eq!(sum, h.staking.total_supply());

            let rpt = h.staking.period().reward_per_token_stored;
            prop_assert!(rpt >= last_rpt);
            last_rpt = rpt;
            prop_assert!(h.staking.period().last_update_time <= h.now);
        }
    }
}
