//! Share accounting model
//!
//! Shares are a claim on `total_value`. Mint and burn move `total_shares`
//! and `total_value` by the same ratio, rounding in favour of the pool, so
//! the share price never decreases on mint or burn. Only a value deposit
//! raises the price.
//!
//! # Properties Proven
//! - **S1**: mint does not decrease the price
//! - **S2**: burn does not decrease the price
//! - **S3**: a burn never pays out more than its pro-rata value
//! - **S4**: a positive value deposit strictly raises the exact price
//!
//! `price()` is the PRICE_SCALE rounding of the exact ratio
//! `total_value / total_shares`. Comparisons that must not lose precision
//! go through [`price_ratio`] and [`price_cmp`].

use crate::math::{add_bounded, mul_div_floor, sub_checked, MathError, MAX_AMOUNT, PRICE_SCALE};

/// Pool-level share totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShareState {
    /// Outstanding shares
    pub total_shares: u128,
    /// Base-asset value backing the outstanding shares
    pub total_value: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareError {
    /// Amount is zero, or rounds to zero
    ZeroAmount,
    /// Burn exceeds outstanding shares
    InsufficientShares,
    /// Value deposit with nobody to receive it
    NoOutstandingShares,
    /// Arithmetic overflow (or total above MAX_AMOUNT)
    Overflow,
}

impl From<MathError> for ShareError {
    fn from(_: MathError) -> Self {
        ShareError::Overflow
    }
}

/// Share price in PRICE_SCALE fixed point; 1.0 when no shares exist
pub fn price(state: ShareState) -> u128 {
    if state.total_shares == 0 {
        return PRICE_SCALE;
    }
    // total_value <= MAX_AMOUNT, so this cannot overflow
    mul_div_floor(state.total_value, PRICE_SCALE, state.total_shares).unwrap_or(u128::MAX)
}

/// Exact price as `(numerator, denominator)`; `(1, 1)` when no shares exist
pub fn price_ratio(state: ShareState) -> (u128, u128) {
    if state.total_shares == 0 {
        return (1, 1);
    }
    (state.total_value, state.total_shares)
}

/// Compare the exact prices of two states by cross-multiplication
///
/// Both totals are bounded by MAX_AMOUNT, so each product fits in u128.
pub fn price_cmp(a: ShareState, b: ShareState) -> core::cmp::Ordering {
    let (an, ad) = price_ratio(a);
    let (bn, bd) = price_ratio(b);
    let lhs = an.checked_mul(bd);
    let rhs = bn.checked_mul(ad);
    match (lhs, rhs) {
        (Some(l), Some(r)) => l.cmp(&r),
        // Only reachable above MAX_AMOUNT; fall back to the scaled price
        _ => price(a).cmp(&price(b)),
    }
}

/// Shares issued for `base_amount`, without applying the mint
///
/// `shares = total_shares == 0 ? base : base * total_shares / total_value`
pub fn shares_for_deposit(state: ShareState, base_amount: u128) -> Result<u128, ShareError> {
    if base_amount == 0 {
        return Err(ShareError::ZeroAmount);
    }
    if base_amount > MAX_AMOUNT {
        return Err(ShareError::Overflow);
    }
    if state.total_shares == 0 {
        return Ok(base_amount);
    }
    let shares = mul_div_floor(base_amount, state.total_shares, state.total_value)?;
    if shares == 0 {
        return Err(ShareError::ZeroAmount);
    }
    Ok(shares)
}

/// Base value redeemed by burning `shares`, without applying the burn
///
/// `value = shares * total_value / total_shares`
pub fn value_for_shares(state: ShareState, shares: u128) -> Result<u128, ShareError> {
    if shares == 0 {
        return Err(ShareError::ZeroAmount);
    }
    if shares > state.total_shares {
        return Err(ShareError::InsufficientShares);
    }
    Ok(mul_div_floor(shares, state.total_value, state.total_shares)?)
}

/// Apply a mint. Returns the new state and the shares issued.
pub fn apply_mint(state: ShareState, base_amount: u128) -> Result<(ShareState, u128), ShareError> {
    let shares = shares_for_deposit(state, base_amount)?;
    let next = ShareState {
        total_shares: add_bounded(state.total_shares, shares)?,
        total_value: add_bounded(state.total_value, base_amount)?,
    };
    Ok((next, shares))
}

/// Apply a burn. Returns the new state and the value released.
///
/// A burn whose value rounds to zero is rejected: the shares would be
/// destroyed for nothing.
pub fn apply_burn(state: ShareState, shares: u128) -> Result<(ShareState, u128), ShareError> {
    let value = value_for_shares(state, shares)?;
    if value == 0 {
        return Err(ShareError::ZeroAmount);
    }
    let next = ShareState {
        total_shares: sub_checked(state.total_shares, shares)?,
        total_value: sub_checked(state.total_value, value)?,
    };
    Ok((next, value))
}

/// Apply a value-only deposit (the price-raising operation)
pub fn apply_value_deposit(state: ShareState, amount: u128) -> Result<ShareState, ShareError> {
    if amount == 0 {
        return Err(ShareError::ZeroAmount);
    }
    if state.total_shares == 0 {
        return Err(ShareError::NoOutstandingShares);
    }
    Ok(ShareState {
        total_shares: state.total_shares,
        total_value: add_bounded(state.total_value, amount)?,
    })
}


#[cfg(kani)]
mod proofs {
    use super::*;

    fn bounded_state() -> ShareState {
        let total_shares: u128 = kani::any();
        let total_value: u128 = kani::any();
        kani::assume(total_shares <= 1_000_000_000_000);
        kani::assume(total_value <= 1_000_000_000_000);
        // Shares outstanding always carry value
        kani::assume(total_shares == 0 || total_value > 0);
        ShareState { total_shares, total_value }
    }

    /// **Proof S1: mint does not decrease the price**
    #[kani::proof]
    fn proof_s1_mint_price_non_decreasing() {
        let state = bounded_state();
        let amount: u128 = kani::any();
        kani::assume(amount > 0 && amount <= 1_000_000_000_000);
        kani::assume(state.total_shares > 0);

        if let Ok((next, _)) = apply_mint(state, amount) {
            assert!(price(next) >= price(state));
        }
    }

    /// **Proof S2/S3: burn keeps price and pays at most pro-rata**
    #[kani::proof]
    fn proof_s2_s3_burn() {
        let state = bounded_state();
        let shares: u128 = kani::any();
        kani::assume(shares > 0 && shares <= state.total_shares);

        if let Ok((next, value)) = apply_burn(state, shares) {
            // value * total_shares <= shares * total_value
            assert!(value * state.total_shares <= shares * state.total_value);
            if next.total_shares > 0 {
                assert!(price(next) >= price(state));
            }
        }
    }

    /// **Proof S4: positive deposit strictly raises the exact price**
    #[kani::proof]
    fn proof_s4_deposit_raises_price() {
        let state = bounded_state();
        let amount: u128 = kani::any();
        kani::assume(amount > 0 && amount <= 1_000_000_000_000);

        if let Ok(next) = apply_value_deposit(state, amount) {
            assert!(next.total_value > state.total_value);
            assert!(price_cmp(next, state) == core::cmp::Ordering::Greater);
            assert!(price(next) >= price(state));
        }
    }
}
