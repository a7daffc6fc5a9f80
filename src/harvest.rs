//! Reward harvester
//!
//! Claims third-party reward distributions with merkle inclusion proofs
//! and converts the claimed tokens into the base asset.
//!
//! Claims are public and processed entry by entry: a stale, replayed or
//! malformed proof is skipped with a status and never fails the batch.
//! Conversions are restricted (see [`VaultEngine::sell`](crate::VaultEngine::sell))
//! and treat the swap target as untrusted: the approval is exactly the
//! pending amount, it is reset afterwards, and proceeds are measured as
//! the base-asset balance delta rather than taken from the target.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;
use vault_model::math::{add_bounded, MAX_AMOUNT};
use vault_model::{merkle, Hash};

use crate::custody::AssetCustody;
use crate::{Address, Result, VaultError};

/// One distribution entry to claim
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClaimProof {
    pub token: Address,
    pub index: u64,
    pub amount: u128,
    pub merkle_path: Vec<Hash>,
}

/// One reward-to-base conversion
///
/// `spender` receives a temporary approval of the pending balance;
/// `swap_target` is called with `call_data`. Both are untrusted.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConversionInstruction {
    pub sell_token: Address,
    pub spender: Address,
    pub swap_target: Address,
    pub call_data: Vec<u8>,
}

/// Per-entry result of a claim batch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ClaimStatus {
    Claimed,
    /// No root recorded for the token
    UnknownRoot,
    InvalidProof,
    /// `(root, token, index)` was already credited
    AlreadyClaimed,
    ZeroAmount,
    /// Amount above MAX_AMOUNT, or the pending balance would overflow
    AmountOutOfRange,
    /// The distributor refused the pull; the entry stays claimable
    TransferFailed,
}

/// Per-instruction result of a sell call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SellStatus {
    Sold { amount_in: u128, proceeds: u128 },
    /// Swapped, but the proceeds would overflow the pool; held as base pending
    ProceedsParked { amount_in: u128, proceeds: u128 },
    /// Pending balance was already the base asset
    DepositedDirectly { amount: u128 },
    NothingPending,
    /// The swap call failed; the pending balance is restored
    SwapFailed,
}

/// Summary of a sell call
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SellReport {
    pub statuses: Vec<SellStatus>,
    /// Base value deposited across all instructions
    pub deposited: u128,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RewardHarvester {
    /// Current distribution root per reward token
    #[cfg_attr(feature = "serde", serde(with = "crate::serde_map"))]
    roots: BTreeMap<Address, Hash>,

    /// Credited `(root, token, index)` triples
    consumed: BTreeSet<(Hash, Address, u64)>,

    /// Claimed but not yet converted, per token
    #[cfg_attr(feature = "serde", serde(with = "crate::serde_map"))]
    pending: BTreeMap<Address, u128>,
}

impl RewardHarvester {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root_of(&self, token: &Address) -> Option<Hash> {
        self.roots.get(token).copied()
    }

    /// Record `root` for `token`, returning the root it replaces
    pub fn set_root(&mut self, token: Address, root: Hash) -> Option<Hash> {
        self.roots.insert(token, root)
    }

    pub fn is_consumed(&self, root: &Hash, token: &Address, index: u64) -> bool {
        self.consumed.contains(&(*root, *token, index))
    }

    pub fn pending(&self, token: &Address) -> u128 {
        self.pending.get(token).copied().unwrap_or(0)
    }

    pub fn pending_balances(&self) -> impl Iterator<Item = (&Address, u128)> {
        self.pending.iter().map(|(t, a)| (t, *a))
    }

    /// Remove and return the whole pending balance of `token`
    pub fn take_pending(&mut self, token: &Address) -> u128 {
        self.pending.remove(token).unwrap_or(0)
    }

    /// Put `amount` back into the pending balance of `token`
    pub fn restore_pending(&mut self, token: &Address, amount: u128) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        let balance = add_bounded(self.pending(token), amount)?;
        self.pending.insert(*token, balance);
        Ok(())
    }

    /// Verify one proof and pull its amount from `distributor` into `vault`
    ///
    /// The consumed marker is written before the pull and removed again if
    /// the pull fails, so a re-entrant claim of the same entry is rejected.
    pub fn claim_one<C: AssetCustody>(
        &mut self,
        custody: &mut C,
        proof: &ClaimProof,
        vault: &Address,
        distributor: &Address,
    ) -> ClaimStatus {
        if proof.amount == 0 {
            return ClaimStatus::ZeroAmount;
        }
        if proof.amount > MAX_AMOUNT {
            return ClaimStatus::AmountOutOfRange;
        }
        let root = match self.root_of(&proof.token) {
            Some(root) => root,
            None => return ClaimStatus::UnknownRoot,
        };
        let key = (root, proof.token, proof.index);
        if self.consumed.contains(&key) {
            return ClaimStatus::AlreadyClaimed;
        }
        let leaf = merkle::claim_leaf(&proof.token, proof.index, vault, proof.amount);
        if !merkle::verify(&root, &leaf, &proof.merkle_path) {
            return ClaimStatus::InvalidProof;
        }
        let credited = match add_bounded(self.pending(&proof.token), proof.amount) {
            Ok(v) => v,
            Err(_) => return ClaimStatus::AmountOutOfRange,
        };

        self.consumed.insert(key);
        if custody
            .transfer(&proof.token, distributor, vault, proof.amount)
            .is_err()
        {
            self.consumed.remove(&key);
            return ClaimStatus::TransferFailed;
        }
        self.pending.insert(proof.token, credited);
        ClaimStatus::Claimed
    }

    /// Run one conversion through the swap target
    ///
    /// Returns `SellStatus::Sold` with the measured base proceeds. Proceeds
    /// are not deposited here. Any sell-token amount the target did not
    /// spend goes back to pending.
    pub fn convert<C: AssetCustody>(
        &mut self,
        custody: &mut C,
        instruction: &ConversionInstruction,
        vault: &Address,
        base_token: &Address,
    ) -> Result<SellStatus> {
        let token = &instruction.sell_token;
        let amount = self.take_pending(token);
        if amount == 0 {
            return Ok(SellStatus::NothingPending);
        }

        let base_before = custody.balance_of(base_token, vault);
        let sell_before = custody.balance_of(token, vault);

        if custody.approve(token, vault, &instruction.spender, amount).is_err() {
            self.restore_pending(token, amount)?;
            return Ok(SellStatus::SwapFailed);
        }
        let called = custody.call(vault, &instruction.swap_target, &instruction.call_data);
        // Allowance is reset whatever the call did
        let reset = custody.approve(token, vault, &instruction.spender, 0);

        let spent = sell_before.saturating_sub(custody.balance_of(token, vault));
        let unspent = amount.saturating_sub(spent);
        self.restore_pending(token, unspent)?;

        if called.is_err() {
            log::warn!("swap via target {:02x?} failed", &instruction.swap_target[..4]);
            return Ok(SellStatus::SwapFailed);
        }
        reset?;

        let base_after = custody.balance_of(base_token, vault);
        if base_after < base_before {
            return Err(VaultError::NegativeProceeds);
        }
        Ok(SellStatus::Sold {
            amount_in: spent.min(amount),
            proceeds: base_after - base_before,
        })
    }
}
