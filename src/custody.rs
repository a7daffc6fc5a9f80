//! Token custody seam
//!
//! The engine never holds balances itself. Every token movement, approval
//! and external swap call goes through [`AssetCustody`], supplied by the
//! caller for the duration of one operation.

use alloc::collections::{BTreeMap, BTreeSet};
use vault_model::math::{add_bounded, sub_checked};

use crate::{Address, Result, VaultError};

/// Pluggable token custody
///
/// Implementations decide how balances are stored and how swap targets
/// execute. The engine treats every method as an external call: it
/// commits bookkeeping before calls whose result it does not need and
/// after calls whose result it does.
pub trait AssetCustody {
    /// Balance of `token` held by `holder`
    fn balance_of(&self, token: &Address, holder: &Address) -> u128;

    /// Move `amount` of `token` from `from` to `to`
    ///
    /// # Returns
    /// * `Err(VaultError::InsufficientBalance)` if `from` holds too little
    /// * `Err(VaultError::TransferFailed)` if the transfer is otherwise rejected
    fn transfer(&mut self, token: &Address, from: &Address, to: &Address, amount: u128) -> Result<()>;

    /// Set the allowance `owner` grants `spender` over `token`
    fn approve(&mut self, token: &Address, owner: &Address, spender: &Address, amount: u128) -> Result<()>;

    /// Invoke `target` on behalf of `caller` with opaque call data
    fn call(&mut self, caller: &Address, target: &Address, data: &[u8]) -> Result<()>;
}

/// Call data understood by [`InMemoryCustody`] swap venues
///
/// Layout: `sell_token (32) | amount_in (16, LE) | buy_token (32) | amount_out (16, LE)`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapCall {
    pub sell_token: Address,
    pub amount_in: u128,
    pub buy_token: Address,
    pub amount_out: u128,
}

impl SwapCall {
    pub const ENCODED_LEN: usize = 96;

    pub fn encode(&self) -> [u8; Self::ENCODED_LEN] {
        let mut out = [0u8; Self::ENCODED_LEN];
        out[0..32].copy_from_slice(&self.sell_token);
        out[32..48].copy_from_slice(&self.amount_in.to_le_bytes());
        out[48..80].copy_from_slice(&self.buy_token);
        out[80..96].copy_from_slice(&self.amount_out.to_le_bytes());
        out
    }

    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() != Self::ENCODED_LEN {
            return None;
        }
        let mut sell_token = [0u8; 32];
        let mut buy_token = [0u8; 32];
        let mut amount_in = [0u8; 16];
        let mut amount_out = [0u8; 16];
        sell_token.copy_from_slice(&data[0..32]);
        amount_in.copy_from_slice(&data[32..48]);
        buy_token.copy_from_slice(&data[48..80]);
        amount_out.copy_from_slice(&data[80..96]);
        Some(Self {
            sell_token,
            amount_in: u128::from_le_bytes(amount_in),
            buy_token,
            amount_out: u128::from_le_bytes(amount_out),
        })
    }
}

/// Ledger-style custody kept in memory, for tests and the simulator
///
/// A swap venue is an address holding its own reserves. Calling it with a
/// [`SwapCall`] pulls `amount_in` from the caller, spending the allowance
/// the caller granted to the venue's registered spender, and pays
/// `amount_out` from the venue's reserves. The whole call is rejected if
/// any leg would fail.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InMemoryCustody {
    /// (token, holder) -> balance
    #[cfg_attr(feature = "serde", serde(with = "crate::serde_map"))]
    balances: BTreeMap<(Address, Address), u128>,

    /// (token, owner, spender) -> allowance
    #[cfg_attr(feature = "serde", serde(with = "crate::serde_map"))]
    allowances: BTreeMap<(Address, Address, Address), u128>,

    /// venue address -> spender it pulls through
    #[cfg_attr(feature = "serde", serde(with = "crate::serde_map"))]
    venues: BTreeMap<Address, Address>,

    /// Holders that reject incoming transfers
    #[cfg_attr(feature = "serde", serde(default))]
    frozen: BTreeSet<Address>,
}

impl InMemoryCustody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create tokens out of thin air (faucet)
    pub fn mint_to(&mut self, token: &Address, holder: &Address, amount: u128) -> Result<()> {
        let balance = add_bounded(self.balance_of(token, holder), amount)?;
        self.balances.insert((*token, *holder), balance);
        Ok(())
    }

    pub fn allowance(&self, token: &Address, owner: &Address, spender: &Address) -> u128 {
        self.allowances
            .get(&(*token, *owner, *spender))
            .copied()
            .unwrap_or(0)
    }

    /// Register `venue` as a swap target pulling through `spender`
    pub fn register_venue(&mut self, venue: Address, spender: Address) {
        self.venues.insert(venue, spender);
    }

    pub fn venue_spender(&self, venue: &Address) -> Option<Address> {
        self.venues.get(venue).copied()
    }

    /// Make `holder` reject incoming transfers (or accept them again)
    pub fn set_frozen(&mut self, holder: Address, frozen: bool) {
        if frozen {
            self.frozen.insert(holder);
        } else {
            self.frozen.remove(&holder);
        }
    }

    /// Non-zero balances, ordered by (token, holder)
    pub fn balances(&self) -> impl Iterator<Item = (&Address, &Address, u128)> {
        self.balances.iter().map(|((t, h), b)| (t, h, *b))
    }

    fn set_balance(&mut self, token: &Address, holder: &Address, amount: u128) {
        if amount == 0 {
            self.balances.remove(&(*token, *holder));
        } else {
            self.balances.insert((*token, *holder), amount);
        }
    }

    fn execute_swap(&mut self, caller: &Address, venue: &Address, swap: &SwapCall) -> Result<()> {
        let spender = self.venue_spender(venue).ok_or(VaultError::SwapFailed)?;
        let allowance = self.allowance(&swap.sell_token, caller, &spender);
        if swap.amount_in > allowance {
            return Err(VaultError::SwapFailed);
        }

        // Validate both legs before touching any balance
        let caller_sell = sub_checked(self.balance_of(&swap.sell_token, caller), swap.amount_in)
            .map_err(|_| VaultError::SwapFailed)?;
        let venue_buy = sub_checked(self.balance_of(&swap.buy_token, venue), swap.amount_out)
            .map_err(|_| VaultError::SwapFailed)?;
        if swap.sell_token == swap.buy_token {
            return Err(VaultError::SwapFailed);
        }
        let venue_sell = add_bounded(self.balance_of(&swap.sell_token, venue), swap.amount_in)
            .map_err(|_| VaultError::SwapFailed)?;
        let caller_buy = add_bounded(self.balance_of(&swap.buy_token, caller), swap.amount_out)
            .map_err(|_| VaultError::SwapFailed)?;

        self.allowances
            .insert((swap.sell_token, *caller, spender), allowance - swap.amount_in);
        self.set_balance(&swap.sell_token, caller, caller_sell);
        self.set_balance(&swap.sell_token, venue, venue_sell);
        self.set_balance(&swap.buy_token, venue, venue_buy);
        self.set_balance(&swap.buy_token, caller, caller_buy);
        Ok(())
    }
}

impl AssetCustody for InMemoryCustody {
    fn balance_of(&self, token: &Address, holder: &Address) -> u128 {
        self.balances.get(&(*token, *holder)).copied().unwrap_or(0)
    }

    fn transfer(&mut self, token: &Address, from: &Address, to: &Address, amount: u128) -> Result<()> {
        if self.frozen.contains(to) {
            return Err(VaultError::TransferFailed);
        }
        if amount == 0 || from == to {
            return Ok(());
        }
        let from_balance = sub_checked(self.balance_of(token, from), amount)
            .map_err(|_| VaultError::InsufficientBalance)?;
        let to_balance = add_bounded(self.balance_of(token, to), amount)?;

        self.set_balance(token, from, from_balance);
        self.set_balance(token, to, to_balance);
        Ok(())
    }

    fn approve(&mut self, token: &Address, owner: &Address, spender: &Address, amount: u128) -> Result<()> {
        if amount == 0 {
            self.allowances.remove(&(*token, *owner, *spender));
        } else {
            self.allowances.insert((*token, *owner, *spender), amount);
        }
        Ok(())
    }

    fn call(&mut self, caller: &Address, target: &Address, data: &[u8]) -> Result<()> {
        let swap = SwapCall::decode(data).ok_or(VaultError::SwapFailed)?;
        self.execute_swap(caller, target, &swap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REWARD: Address = [0xAA; 32];
    const BASE: Address = [0xBB; 32];
    const VAULT: Address = [1u8; 32];
    const VENUE: Address = [2u8; 32];
    const ROUTER: Address = [3u8; 32];

    fn setup() -> InMemoryCustody {
        let mut c = InMemoryCustody::new();
        c.register_venue(VENUE, ROUTER);
        c.mint_to(&REWARD, &VAULT, 100).unwrap();
        c.mint_to(&BASE, &VENUE, 1_000).unwrap();
        c
    }

    fn swap(amount_in: u128, amount_out: u128) -> SwapCall {
        SwapCall { sell_token: REWARD, amount_in, buy_token: BASE, amount_out }
    }

    #[test]
    fn test_swap_call_codec() {
        let call = swap(7, 9);
        assert_eq!(SwapCall::decode(&call.encode()), Some(call));
        assert_eq!(SwapCall::decode(&[0u8; 95]), None);
    }

    #[test]
    fn test_transfer_checks_balance() {
        let mut c = setup();
        assert_eq!(
            c.transfer(&REWARD, &VAULT, &VENUE, 101),
            Err(VaultError::InsufficientBalance)
        );
        c.transfer(&REWARD, &VAULT, &VENUE, 40).unwrap();
        assert_eq!(c.balance_of(&REWARD, &VAULT), 60);
        assert_eq!(c.balance_of(&REWARD, &VENUE), 40);
    }

    #[test]
    fn test_frozen_recipient_rejects() {
        let mut c = setup();
        c.set_frozen(VENUE, true);
        assert_eq!(c.transfer(&REWARD, &VAULT, &VENUE, 1), Err(VaultError::TransferFailed));
        c.set_frozen(VENUE, false);
        assert!(c.transfer(&REWARD, &VAULT, &VENUE, 1).is_ok());
    }

    #[test]
    fn test_swap_spends_allowance() {
        let mut c = setup();
        let data = swap(100, 250).encode();

        // No approval yet
        assert_eq!(c.call(&VAULT, &VENUE, &data), Err(VaultError::SwapFailed));

        c.approve(&REWARD, &VAULT, &ROUTER, 100).unwrap();
        c.call(&VAULT, &VENUE, &data).unwrap();
        assert_eq!(c.balance_of(&BASE, &VAULT), 250);
        assert_eq!(c.balance_of(&REWARD, &VAULT), 0);
        assert_eq!(c.allowance(&REWARD, &VAULT, &ROUTER), 0);
    }

    #[test]
    fn test_failed_swap_leaves_balances() {
        let mut c = setup();
        c.approve(&REWARD, &VAULT, &ROUTER, 100).unwrap();
        let before = c.clone();

        // Venue cannot pay 5_000
        assert_eq!(c.call(&VAULT, &VENUE, &swap(100, 5_000).encode()), Err(VaultError::SwapFailed));
        assert_eq!(c, before);
        // Unknown target
        assert_eq!(c.call(&VAULT, &[9u8; 32], &swap(1, 1).encode()), Err(VaultError::SwapFailed));
    }
}
