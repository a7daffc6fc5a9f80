//! Vault Model - Pure lock/share/proof math for formal verification
//!
//! This crate holds the arithmetic the vault engine relies on, extracted
//! as total functions over plain values so it can be checked with Kani:
//! - Epoch arithmetic (timestamp → epoch, maturity epochs)
//! - Share mint/burn/price math
//! - The relock split between queue reserve and re-committed principal
//! - Merkle inclusion proofs for reward claims
//!
//! No panics, no unwraps. The engine crate imports these functions directly.

#![no_std]
#![forbid(unsafe_code)]

#[cfg(kani)]
extern crate kani;

extern crate alloc;

pub mod math;
pub mod epoch;
pub mod share_math;
pub mod lock_schedule;
pub mod merkle;


pub use epoch::{Epoch, EpochClock};
pub use lock_schedule::{MaturityRounding, RelockSplit};
pub use math::{MathError, MAX_AMOUNT, PRICE_SCALE};
pub use merkle::Hash;
pub use share_math::{ShareError, ShareState};
