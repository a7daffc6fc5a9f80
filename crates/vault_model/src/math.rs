//! Checked amount arithmetic
//!
//! Every running total in the vault is kept at or below [`MAX_AMOUNT`].
//! Two bounded amounts multiply without overflowing `u128`, so the
//! mul-div helpers below only fail on a zero divisor or on inputs that
//! escaped the bound.

/// Upper bound for any amount tracked by the vault (base units)
pub const MAX_AMOUNT: u128 = u64::MAX as u128;

/// Fixed-point scale for share prices (1.0 == PRICE_SCALE)
pub const PRICE_SCALE: u128 = 1_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathError {
    /// Result exceeds MAX_AMOUNT or u128
    Overflow,
    /// Result would go below zero
    Underflow,
    /// Division by zero
    DivisionByZero,
}

/// Add two amounts, failing if the sum leaves the bounded range
#[inline]
pub fn add_bounded(a: u128, b: u128) -> Result<u128, MathError> {
    let sum = a.checked_add(b).ok_or(MathError::Overflow)?;
    if sum > MAX_AMOUNT {
        return Err(MathError::Overflow);
    }
    Ok(sum)
}

#[inline]
pub fn sub_checked(a: u128, b: u128) -> Result<u128, MathError> {
    a.checked_sub(b).ok_or(MathError::Underflow)
}

/// floor(a * b / denom)
#[inline]
pub fn mul_div_floor(a: u128, b: u128, denom: u128) -> Result<u128, MathError> {
    if denom == 0 {
        return Err(MathError::DivisionByZero);
    }
    let num = a.checked_mul(b).ok_or(MathError::Overflow)?;
    Ok(num / denom)
}

/// ceil(a * b / denom)
#[inline]
pub fn mul_div_ceil(a: u128, b: u128, denom: u128) -> Result<u128, MathError> {
    if denom == 0 {
        return Err(MathError::DivisionByZero);
    }
    let num = a.checked_mul(b).ok_or(MathError::Overflow)?;
    let q = num / denom;
    if num % denom == 0 {
        Ok(q)
    } else {
        q.checked_add(1).ok_or(MathError::Overflow)
    }
}


#[cfg(kani)]
mod proofs {
    use super::*;

    /// floor <= ceil <= floor + 1 for every bounded input
    #[kani::proof]
    fn proof_floor_ceil_bracket() {
        let a: u128 = kani::any();
        let b: u128 = kani::any();
        let d: u128 = kani::any();
        kani::assume(a <= MAX_AMOUNT && b <= MAX_AMOUNT);
        kani::assume(d > 0 && d <= MAX_AMOUNT);

        let lo = mul_div_floor(a, b, d).unwrap();
        let hi = mul_div_ceil(a, b, d).unwrap();
        assert!(lo <= hi);
        assert!(hi - lo <= 1);
    }
}
