//! Lock ledger
//!
//! Tracks principal committed to the locker. Locks taken during the same
//! epoch share a maturity and are aggregated into one schedule entry, so
//! the schedule never holds more than `max_lock_wait + 1` live entries and
//! relock cost does not grow with the number of deposits.

use alloc::collections::BTreeMap;
use vault_model::lock_schedule::{max_lock_wait, maturity_epoch, split_matured};
use vault_model::math::{add_bounded, sub_checked};
use vault_model::{Epoch, MaturityRounding};

use crate::{Result, VaultError};

/// Running lock totals
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LockState {
    /// All principal held for the vault: scheduled locks plus unlocked-unprocessed.
    /// Decreases only through queue payouts.
    pub total_locked: u128,

    /// Principal that matured and is held back for queue payouts
    pub unlocked_unprocessed: u128,

    /// Epoch of the last relock that processed a matured batch
    pub last_epoch_processed: Epoch,
}

/// Result of a relock call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelockOutcome {
    /// No lock matured since the last relock; nothing changed
    NothingMatured {
        /// Earliest future maturity, if any principal is scheduled
        next_maturity: Option<Epoch>,
    },
    /// Matured principal was split between the queue reserve and a fresh lock
    Processed {
        matured: u128,
        reserved: u128,
        relocked: u128,
        relock_maturity: Epoch,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LockLedger {
    state: LockState,

    /// Locked principal keyed by maturity epoch
    #[cfg_attr(feature = "serde", serde(with = "crate::serde_map"))]
    schedule: BTreeMap<Epoch, u128>,

    lock_epochs: u64,
    rounding: MaturityRounding,
}

impl LockLedger {
    pub fn new(lock_epochs: u64, rounding: MaturityRounding) -> Self {
        Self {
            state: LockState::default(),
            schedule: BTreeMap::new(),
            lock_epochs,
            rounding,
        }
    }

    pub fn state(&self) -> LockState {
        self.state
    }

    /// Longest wait between a lock and its maturity
    pub fn max_wait_epochs(&self) -> u64 {
        max_lock_wait(self.lock_epochs, self.rounding)
    }

    pub fn maturity_for(&self, lock_epoch: Epoch) -> Result<Epoch> {
        Ok(maturity_epoch(lock_epoch, self.lock_epochs, self.rounding)?)
    }

    /// Scheduled (still locked) principal, in maturity order
    pub fn schedule(&self) -> impl Iterator<Item = (Epoch, u128)> + '_ {
        self.schedule.iter().map(|(e, a)| (*e, *a))
    }

    /// Principal whose maturity is at or before `current_epoch`
    pub fn matured_amount(&self, current_epoch: Epoch) -> u128 {
        self.schedule
            .range(..=current_epoch)
            .fold(0u128, |acc, (_, a)| acc.saturating_add(*a))
    }

    /// First maturity strictly after `current_epoch`
    pub fn next_maturity(&self, current_epoch: Epoch) -> Option<Epoch> {
        self.schedule
            .range(current_epoch.saturating_add(1)..)
            .next()
            .map(|(e, _)| *e)
    }

    /// Commit `amount` of fresh principal during `current_epoch`
    ///
    /// Returns the maturity epoch of the lock.
    pub fn lock(&mut self, amount: u128, current_epoch: Epoch) -> Result<Epoch> {
        if amount == 0 {
            return Err(VaultError::ZeroAmount);
        }
        let maturity = self.maturity_for(current_epoch)?;
        let total_locked = add_bounded(self.state.total_locked, amount)?;
        let entry = add_bounded(self.schedule.get(&maturity).copied().unwrap_or(0), amount)?;

        self.state.total_locked = total_locked;
        self.schedule.insert(maturity, entry);
        Ok(maturity)
    }

    /// Check that a lock of `amount` during `current_epoch` would succeed
    pub fn can_lock(&self, amount: u128, current_epoch: Epoch) -> Result<()> {
        let maturity = self.maturity_for(current_epoch)?;
        add_bounded(self.state.total_locked, amount)?;
        add_bounded(self.schedule.get(&maturity).copied().unwrap_or(0), amount)?;
        Ok(())
    }

    /// Process every lock matured by `current_epoch`
    ///
    /// Matured batches are summed. Up to `queue_demand` stays unlocked for
    /// payouts, the rest is re-committed into a lock maturing
    /// `max_wait_epochs` from now. A call with nothing matured is a no-op.
    pub fn relock(&mut self, current_epoch: Epoch, queue_demand: u128) -> Result<RelockOutcome> {
        let matured = self
            .schedule
            .range(..=current_epoch)
            .try_fold(0u128, |acc, (_, a)| add_bounded(acc, *a))?;

        if matured == 0 {
            return Ok(RelockOutcome::NothingMatured {
                next_maturity: self.next_maturity(current_epoch),
            });
        }

        let split = split_matured(self.state.unlocked_unprocessed, matured, queue_demand)?;
        let relock_maturity = self.maturity_for(current_epoch)?;
        let relock_entry = add_bounded(
            self.schedule.get(&relock_maturity).copied().unwrap_or(0),
            split.relocked,
        )?;

        // Commit: drop matured entries, then record the fresh lock
        let remaining = self.schedule.split_off(&current_epoch.saturating_add(1));
        self.schedule = remaining;
        if split.relocked > 0 {
            self.schedule.insert(relock_maturity, relock_entry);
        }
        self.state.unlocked_unprocessed = split.reserved;
        self.state.last_epoch_processed = self.state.last_epoch_processed.max(current_epoch);

        log::debug!(
            "relock epoch={} matured={} reserved={} relocked={}",
            current_epoch,
            matured,
            split.reserved,
            split.relocked
        );

        Ok(RelockOutcome::Processed {
            matured,
            reserved: split.reserved,
            relocked: split.relocked,
            relock_maturity,
        })
    }

    /// Pay `amount` of unlocked principal out of the system
    pub fn release(&mut self, amount: u128) -> Result<()> {
        if amount > self.state.unlocked_unprocessed {
            return Err(VaultError::InsufficientBalance);
        }
        let total_locked = sub_checked(self.state.total_locked, amount)?;
        self.state.unlocked_unprocessed -= amount;
        self.state.total_locked = total_locked;
        Ok(())
    }

    /// Undo a [`release`](Self::release) whose payout transfer failed
    pub fn restore(&mut self, amount: u128) -> Result<()> {
        let unlocked = add_bounded(self.state.unlocked_unprocessed, amount)?;
        let total_locked = add_bounded(self.state.total_locked, amount)?;
        self.state.unlocked_unprocessed = unlocked;
        self.state.total_locked = total_locked;
        Ok(())
    }

    /// Earliest epoch at which cumulative unlocked principal covers `demand`
    ///
    /// Unlocked principal and anything already matured count as available
    /// at `current_epoch`; scheduled locks become available at maturity.
    pub fn projected_unlock_epoch(&self, demand: u128, current_epoch: Epoch) -> Option<Epoch> {
        let mut available = self
            .state
            .unlocked_unprocessed
            .saturating_add(self.matured_amount(current_epoch));
        if available >= demand {
            return Some(current_epoch);
        }
        for (maturity, amount) in self.schedule.range(current_epoch.saturating_add(1)..) {
            available = available.saturating_add(*amount);
            if available >= demand {
                return Some(*maturity);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> LockLedger {
        LockLedger::new(4, MaturityRounding::Floor)
    }

    #[test]
    fn test_locks_in_same_epoch_aggregate() {
        let mut l = ledger();
        assert_eq!(l.lock(100, 2).unwrap(), 6);
        assert_eq!(l.lock(50, 2).unwrap(), 6);
        assert_eq!(l.lock(10, 3).unwrap(), 7);

        let entries: alloc::vec::Vec<_> = l.schedule().collect();
        assert_eq!(entries, alloc::vec![(6, 150), (7, 10)]);
        assert_eq!(l.state().total_locked, 160);
    }

    #[test]
    fn test_relock_before_maturity_is_noop() {
        let mut l = ledger();
        l.lock(100, 0).unwrap();
        let before = l.clone();

        let outcome = l.relock(3, 0).unwrap();
        assert_eq!(outcome, RelockOutcome::NothingMatured { next_maturity: Some(4) });
        assert_eq!(l, before);
    }

    #[test]
    fn test_relock_without_demand_recommits_everything() {
        let mut l = ledger();
        l.lock(100, 0).unwrap();
        l.lock(40, 1).unwrap();

        let outcome = l.relock(5, 0).unwrap();
        assert_eq!(
            outcome,
            RelockOutcome::Processed { matured: 140, reserved: 0, relocked: 140, relock_maturity: 9 }
        );
        let s = l.state();
        assert_eq!(s.unlocked_unprocessed, 0);
        assert_eq!(s.total_locked, 140);
        assert_eq!(s.last_epoch_processed, 5);
    }

    #[test]
    fn test_relock_reserves_demand() {
        let mut l = ledger();
        l.lock(100, 0).unwrap();
        l.relock(4, 30).unwrap();

        assert_eq!(l.state().unlocked_unprocessed, 30);
        assert_eq!(l.state().total_locked, 100);
        assert_eq!(l.schedule().collect::<alloc::vec::Vec<_>>(), alloc::vec![(8, 70)]);
    }

    #[test]
    fn test_release_only_from_unlocked() {
        let mut l = ledger();
        l.lock(100, 0).unwrap();
        assert_eq!(l.release(1), Err(VaultError::InsufficientBalance));

        l.relock(4, 60).unwrap();
        l.release(60).unwrap();
        assert_eq!(l.state().total_locked, 40);
        assert_eq!(l.state().unlocked_unprocessed, 0);

        l.restore(60).unwrap();
        assert_eq!(l.state().total_locked, 100);
        assert_eq!(l.state().unlocked_unprocessed, 60);
    }

    #[test]
    fn test_projection_walks_schedule() {
        let mut l = ledger();
        l.lock(40, 0).unwrap(); // matures 4
        l.lock(100, 1).unwrap(); // matures 5

        assert_eq!(l.projected_unlock_epoch(30, 1), Some(4));
        assert_eq!(l.projected_unlock_epoch(40, 1), Some(4));
        assert_eq!(l.projected_unlock_epoch(41, 1), Some(5));
        assert_eq!(l.projected_unlock_epoch(141, 1), None);
        // already matured counts as available now
        assert_eq!(l.projected_unlock_epoch(40, 4), Some(4));
    }

    #[test]
    fn test_last_epoch_processed_never_decreases() {
        let mut l = ledger();
        l.lock(10, 0).unwrap();
        l.relock(9, 0).unwrap();
        assert_eq!(l.state().last_epoch_processed, 9);
        // nothing matured at 10: no-op, epoch unchanged
        l.relock(10, 0).unwrap();
        assert_eq!(l.state().last_epoch_processed, 9);
    }
}
