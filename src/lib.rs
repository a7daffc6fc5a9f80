//! Epoch-locked yield vault engine
//!
//! Users deposit a base asset and receive shares in a pooled position that
//! is locked for a fixed number of epochs. Reward distributions are claimed
//! with merkle proofs, sold for the base asset and re-deposited, raising the
//! share price. Withdrawals burn shares immediately and wait in a FIFO queue
//! until locked principal matures.
//!
//! The engine guarantees:
//! 1. Share price is unchanged (up to rounding in the pool's favour) by mint/burn
//! 2. Only value deposits raise the share price
//! 3. Withdrawal tickets settle strictly in request order
//! 4. A `(root, token, index)` claim is credited at most once
//! 5. Conservation: `total_locked == total_value + outstanding ticket value`
//!
//! All state lives in a single [`VaultEngine`] value; token movements go
//! through the [`AssetCustody`] trait supplied by the caller.

#![no_std]
#![forbid(unsafe_code)]

#[cfg(kani)]
extern crate kani;

extern crate alloc;

pub mod custody;
pub mod engine;
pub mod events;
pub mod harvest;
pub mod ledger;
pub mod queue;
pub mod shares;

#[cfg(feature = "serde")]
mod serde_map;

pub use custody::{AssetCustody, InMemoryCustody, SwapCall};
pub use engine::{Role, Roles, VaultEngine, VaultParams, WithdrawReceipt};
pub use events::Event;
pub use harvest::{ClaimProof, ClaimStatus, ConversionInstruction, RewardHarvester, SellReport, SellStatus};
pub use ledger::{LockLedger, LockState, RelockOutcome};
pub use queue::{QueueReport, StopReason, WithdrawTicket, WithdrawalQueue};
pub use shares::ShareAccountant;

pub use vault_model::{
    Epoch, EpochClock, Hash, MaturityRounding, ShareState, MAX_AMOUNT, PRICE_SCALE,
};

/// 32-byte account / token identifier
pub type Address = [u8; 32];

/// Withdrawal ticket sequence number
pub type TicketId = u64;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VaultError {
    /// Restricted operation invoked by the wrong caller
    Unauthorized,

    /// Amount is zero (or rounds to zero shares / value)
    ZeroAmount,

    /// Share burn exceeds the owner's balance
    InsufficientShares,

    /// Token balance too small for a transfer
    InsufficientBalance,

    /// Value deposit while no shares are outstanding
    NoOutstandingShares,

    /// Arithmetic overflow or amount above MAX_AMOUNT
    Overflow,

    /// Token transfer rejected by custody
    TransferFailed,

    /// Swap target call failed
    SwapFailed,

    /// Base-asset balance decreased across a swap
    NegativeProceeds,

    /// Parameters rejected at construction
    InvalidParams,

    /// No ticket with the given id
    TicketNotFound,

    /// Clock update would move time backwards
    StaleTimestamp,
}

pub type Result<T> = core::result::Result<T, VaultError>;

impl core::fmt::Display for VaultError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            VaultError::Unauthorized => "caller is not authorized",
            VaultError::ZeroAmount => "amount is zero or rounds to zero",
            VaultError::InsufficientShares => "share balance too small",
            VaultError::InsufficientBalance => "token balance too small",
            VaultError::NoOutstandingShares => "no shares outstanding",
            VaultError::Overflow => "arithmetic overflow",
            VaultError::TransferFailed => "token transfer failed",
            VaultError::SwapFailed => "swap call failed",
            VaultError::NegativeProceeds => "base balance decreased across swap",
            VaultError::InvalidParams => "invalid vault parameters",
            VaultError::TicketNotFound => "withdraw ticket not found",
            VaultError::StaleTimestamp => "timestamp is before the engine clock",
        };
        f.write_str(msg)
    }
}

impl From<vault_model::MathError> for VaultError {
    fn from(_: vault_model::MathError) -> Self {
        VaultError::Overflow
    }
}

impl From<vault_model::ShareError> for VaultError {
    fn from(e: vault_model::ShareError) -> Self {
        match e {
            vault_model::ShareError::ZeroAmount => VaultError::ZeroAmount,
            vault_model::ShareError::InsufficientShares => VaultError::InsufficientShares,
            vault_model::ShareError::NoOutstandingShares => VaultError::NoOutstandingShares,
            vault_model::ShareError::Overflow => VaultError::Overflow,
        }
    }
}
