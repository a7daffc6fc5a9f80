//! Share accountant
//!
//! Pool totals plus per-owner share balances. The pricing math lives in
//! `vault_model::share_math`; this module applies it and keeps balances
//! consistent with `total_shares`.

use alloc::collections::BTreeMap;
use vault_model::math::add_bounded;
use vault_model::share_math;
use vault_model::ShareState;

use crate::{Address, Result, VaultError};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShareAccountant {
    state: ShareState,

    #[cfg_attr(feature = "serde", serde(with = "crate::serde_map"))]
    balances: BTreeMap<Address, u128>,
}

impl ShareAccountant {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ShareState {
        self.state
    }

    pub fn total_shares(&self) -> u128 {
        self.state.total_shares
    }

    pub fn total_value(&self) -> u128 {
        self.state.total_value
    }

    /// Share price in PRICE_SCALE fixed point
    pub fn price(&self) -> u128 {
        share_math::price(self.state)
    }

    pub fn balance_of(&self, owner: &Address) -> u128 {
        self.balances.get(owner).copied().unwrap_or(0)
    }

    /// Number of addresses holding a non-zero balance
    pub fn holder_count(&self) -> usize {
        self.balances.len()
    }

    pub fn preview_mint(&self, base_amount: u128) -> Result<u128> {
        Ok(share_math::shares_for_deposit(self.state, base_amount)?)
    }

    pub fn preview_burn(&self, shares: u128) -> Result<u128> {
        Ok(share_math::value_for_shares(self.state, shares)?)
    }

    /// Issue shares to `owner` for `base_amount` of value
    pub fn mint(&mut self, owner: &Address, base_amount: u128) -> Result<u128> {
        let (next, shares) = share_math::apply_mint(self.state, base_amount)?;
        let balance = add_bounded(self.balance_of(owner), shares)?;

        self.state = next;
        self.balances.insert(*owner, balance);
        Ok(shares)
    }

    /// Burn `shares` from `owner`, returning the value they redeemed
    pub fn burn(&mut self, owner: &Address, shares: u128) -> Result<u128> {
        let balance = self.balance_of(owner);
        if shares > balance {
            return Err(VaultError::InsufficientShares);
        }
        let (next, value) = share_math::apply_burn(self.state, shares)?;

        self.state = next;
        let remaining = balance - shares;
        if remaining == 0 {
            self.balances.remove(owner);
        } else {
            self.balances.insert(*owner, remaining);
        }
        Ok(value)
    }

    /// Add value without issuing shares (the only price-raising path)
    pub fn deposit_value(&mut self, amount: u128) -> Result<()> {
        self.state = share_math::apply_value_deposit(self.state, amount)?;
        Ok(())
    }

    /// Sum of per-owner balances equals total_shares
    pub fn balances_consistent(&self) -> bool {
        let sum = self
            .balances
            .values()
            .fold(0u128, |acc, b| acc.saturating_add(*b));
        sum == self.state.total_shares
    }
}
