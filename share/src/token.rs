//! Minimal fungible token used on both ledgers (ERC20 semantics).

use std::collections::HashMap;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("insufficient balance for {account}: have {available}, need {required}")]
    InsufficientBalance {
        account: Address,
        available: U256,
        required: U256,
    },
    #[error("insufficient allowance for {spender}: have {available}, need {required}")]
    InsufficientAllowance {
        spender: Address,
        available: U256,
        required: U256,
    },
    #[error("{0} is not the minter")]
    NotMinter(Address),
    #[error("total supply overflow")]
    Overflow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Erc20 {
    pub address: Address,
    pub name: String,
    pub symbol: String,
    pub minter: Option<Address>,
    total_supply: U256,
    balances: HashMap<Address, U256>,
    allowances: HashMap<Address, HashMap<Address, U256>>,
}

impl Erc20 {
    pub fn new(address: Address, name: &str, symbol: &str) -> Self {
        Self {
            address,
            name: name.to_owned(),
            symbol: symbol.to_owned(),
            minter: None,
            total_supply: U256::ZERO,
            balances: HashMap::new(),
            allowances: HashMap::new(),
        }
    }

    pub fn with_minter(mut self, minter: Address) -> Self {
        self.minter = Some(minter);
        self
    }

    pub fn total_supply(&self) -> U256 {
        self.total_supply
    }

    pub fn balance_of(&self, account: &Address) -> U256 {
        self.balances.get(account).copied().unwrap_or_default()
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> U256 {
        self.allowances
            .get(owner)
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or_default()
    }

    pub fn approve(&mut self, owner: Address, spender: Address, amount: U256) {
        self.allowances
            .entry(owner)
            .or_default()
            .insert(spender, amount);
    }

    pub fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<(), TokenError> {
        let from_balance = self.balance_of(&from);
        if from_balance < amount {
            return Err(TokenError::InsufficientBalance {
                account: from,
                available: from_balance,
                required: amount,
            });
        }
        self.balances.insert(from, from_balance - amount);
        // Cannot overflow: the sum of balances is bounded by total supply.
        let to_balance = self.balance_of(&to);
        self.balances.insert(to, to_balance + amount);
        Ok(())
    }

    /// Moves `amount` from `from` to `to` on behalf of `spender`, spending
    /// the allowance `from` granted to `spender`.
    pub fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), TokenError> {
        let allowed = self.allowance(&from, &spender);
        if allowed < amount {
            return Err(TokenError::InsufficientAllowance {
                spender,
                available: allowed,
                required: amount,
            });
        }
        self.transfer(from, to, amount)?;
        if allowed != U256::MAX {
            self.approve(from, spender, allowed - amount);
        }
        Ok(())
    }

    pub fn mint(&mut self, caller: Address, to: Address, amount: U256) -> Result<(), TokenError> {
        if self.minter != Some(caller) {
            return Err(TokenError::NotMinter(caller));
        }
        self.deal(to, amount)
    }

    /// Credits `to` without a minter check. Genesis and devnet faucet only.
    pub fn deal(&mut self, to: Address, amount: U256) -> Result<(), TokenError> {
        self.total_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(TokenError::Overflow)?;
        let balance = self.balance_of(&to);
        self.balances.insert(to, balance + amount);
        Ok(())
    }

    pub fn burn(&mut self, from: Address, amount: U256) -> Result<(), TokenError> {
        let balance = self.balance_of(&from);
        if balance < amount {
            return Err(TokenError::InsufficientBalance {
                account: from,
                available: balance,
                required: amount,
            });
        }
        self.balances.insert(from, balance - amount);
        self.total_supply -= amount;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    const TOKEN: Address = address!("0000000000000000000000000000000000000001");
    const ALICE: Address = address!("00000000000000000000000000000000000a11ce");
    const BOB: Address = address!("0000000000000000000000000000000000000b0b");

    #[test]
    fn test_transfer_from_spends_allowance() {
        let mut token = Erc20::new(TOKEN, "Staking Token", "STK");
        token.deal(ALICE, U256::from(100)).unwrap();
        token.approve(ALICE, BOB, U256::from(60));

        token
            .transfer_from(BOB, ALICE, BOB, U256::from(40))
            .unwrap();
        assert_eq!(token.balance_of(&ALICE), U256::from(60));
        assert_eq!(token.balance_of(&BOB), U256::from(40));
        assert_eq!(token.allowance(&ALICE, &BOB), U256::from(20));

        let err = token
            .transfer_from(BOB, ALICE, BOB, U256::from(21))
            .unwrap_err();
        assert!(matches!(err, TokenError::InsufficientAllowance { .. }));
    }

    #[test]
    fn test_mint_requires_minter() {
        let mut token = Erc20::new(TOKEN, "Reward Token", "RWD").with_minter(BOB);
        assert_eq!(
            token.mint(ALICE, ALICE, U256::from(1)).unwrap_err(),
            TokenError::NotMinter(ALICE)
        );
        token.mint(BOB, ALICE, U256::from(5)).unwrap();
        assert_eq!(token.total_supply(), U256::from(5));

        token.burn(ALICE, U256::from(5)).unwrap();
        assert_eq!(token.total_supply(), U256::ZERO);
    }

    #[test]
    fn test_transfer_insufficient_balance_is_untouched() {
        let mut token = Erc20::new(TOKEN, "Staking Token", "STK");
        token.deal(ALICE, U256::from(10)).unwrap();
        assert!(token.transfer(ALICE, BOB, U256::from(11)).is_err());
        assert_eq!(token.balance_of(&ALICE), U256::from(10));
        assert_eq!(token.balance_of(&BOB), U256::ZERO);
    }
}
