//! Engine events
//!
//! Operations append to an in-engine buffer; callers drain it with
//! [`VaultEngine::drain_events`](crate::VaultEngine::drain_events).

use vault_model::{Epoch, Hash};

use crate::engine::Role;
use crate::{Address, TicketId};

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Event {
    SharesMinted {
        owner: Address,
        base_amount: u128,
        shares: u128,
    },
    SharesBurned {
        owner: Address,
        shares: u128,
        value: u128,
    },
    WithdrawRequested {
        ticket: TicketId,
        owner: Address,
        value: u128,
        epoch_eligible: Epoch,
    },
    WithdrawSettled {
        ticket: TicketId,
        owner: Address,
        value: u128,
    },
    RewardClaimed {
        token: Address,
        index: u64,
        amount: u128,
    },
    RewardSold {
        token: Address,
        amount_in: u128,
        proceeds: u128,
    },
    /// Value added without minting; carries the resulting share price
    ValueDeposited {
        amount: u128,
        price: u128,
    },
    Relocked {
        epoch: Epoch,
        matured: u128,
        reserved: u128,
        relocked: u128,
    },
    RootUpdated {
        token: Address,
        root: Hash,
    },
    RoleTransferred {
        role: Role,
        from: Address,
        to: Address,
    },
}
