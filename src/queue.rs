//! Withdrawal queue
//!
//! Append-only sequence of withdraw tickets consumed strictly oldest-first.
//! A ticket is created when its shares are burned and is only ever changed
//! by settlement. `head` points at the oldest unsettled ticket, so every
//! ticket before `head` is settled and every ticket from `head` on is not.

use alloc::vec::Vec;
use vault_model::math::{add_bounded, sub_checked};
use vault_model::Epoch;

use crate::{Address, Result, TicketId, VaultError};

/// A queued withdrawal
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WithdrawTicket {
    /// Sequence number (equals position in the queue)
    pub id: TicketId,

    /// Receiver of the payout
    pub owner: Address,

    /// Shares burned at request time
    pub share_amount: u128,

    /// Base value locked in at request time
    pub value_at_request: u128,

    /// Epoch the request was made in
    pub epoch_requested: Epoch,

    /// Epoch from which enough principal is projected to be unlocked
    pub epoch_eligible: Epoch,

    pub settled: bool,
}

/// Why a `process_queue` pass stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// Every ticket is settled
    QueueEmpty,
    /// The oldest unsettled ticket is not eligible yet
    NotYetEligible { ticket: TicketId, epoch_eligible: Epoch },
    /// The oldest unsettled ticket is eligible but not covered by unlocked principal
    InsufficientUnlocked { ticket: TicketId, needed: u128, available: u128 },
    /// The per-call ticket limit was reached
    MaxTicketsReached,
}

/// Summary of a `process_queue` pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueReport {
    pub settled: Vec<TicketId>,
    pub paid: u128,
    pub stopped: StopReason,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WithdrawalQueue {
    tickets: Vec<WithdrawTicket>,

    /// Index of the oldest unsettled ticket
    head: usize,

    /// Sum of value_at_request over unsettled tickets
    outstanding_value: u128,
}

impl WithdrawalQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value still owed to unsettled tickets
    pub fn outstanding_value(&self) -> u128 {
        self.outstanding_value
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.tickets.len() - self.head
    }

    pub fn get(&self, id: TicketId) -> Option<&WithdrawTicket> {
        usize::try_from(id).ok().and_then(|i| self.tickets.get(i))
    }

    /// Oldest unsettled ticket
    pub fn front(&self) -> Option<&WithdrawTicket> {
        self.tickets.get(self.head)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WithdrawTicket> {
        self.tickets.iter()
    }

    pub fn tickets_of<'a>(&'a self, owner: &'a Address) -> impl Iterator<Item = &'a WithdrawTicket> + 'a {
        self.tickets.iter().filter(move |t| t.owner == *owner)
    }

    /// Append a ticket for already-burned shares
    pub fn enqueue(
        &mut self,
        owner: Address,
        share_amount: u128,
        value_at_request: u128,
        epoch_requested: Epoch,
        epoch_eligible: Epoch,
    ) -> Result<TicketId> {
        if value_at_request == 0 {
            return Err(VaultError::ZeroAmount);
        }
        let outstanding = add_bounded(self.outstanding_value, value_at_request)?;
        let id = self.tickets.len() as TicketId;

        self.tickets.push(WithdrawTicket {
            id,
            owner,
            share_amount,
            value_at_request,
            epoch_requested,
            epoch_eligible,
            settled: false,
        });
        self.outstanding_value = outstanding;
        Ok(id)
    }

    /// Check whether the oldest unsettled ticket can be paid now
    pub fn check_front(&self, current_epoch: Epoch, unlocked: u128) -> core::result::Result<&WithdrawTicket, StopReason> {
        let ticket = self.front().ok_or(StopReason::QueueEmpty)?;
        if ticket.epoch_eligible > current_epoch {
            return Err(StopReason::NotYetEligible {
                ticket: ticket.id,
                epoch_eligible: ticket.epoch_eligible,
            });
        }
        if ticket.value_at_request > unlocked {
            return Err(StopReason::InsufficientUnlocked {
                ticket: ticket.id,
                needed: ticket.value_at_request,
                available: unlocked,
            });
        }
        Ok(ticket)
    }

    /// Mark the oldest unsettled ticket settled and advance the head
    pub fn settle_front(&mut self) -> Result<WithdrawTicket> {
        let value = self
            .tickets
            .get(self.head)
            .map(|t| t.value_at_request)
            .ok_or(VaultError::TicketNotFound)?;
        let outstanding = sub_checked(self.outstanding_value, value)?;

        let ticket = &mut self.tickets[self.head];
        ticket.settled = true;
        let settled = ticket.clone();
        self.outstanding_value = outstanding;
        self.head += 1;
        Ok(settled)
    }

    /// Reopen the most recently settled ticket after a failed payout
    pub fn unsettle_last(&mut self, id: TicketId) -> Result<()> {
        if self.head == 0 || self.tickets[self.head - 1].id != id {
            return Err(VaultError::TicketNotFound);
        }
        let value = self.tickets[self.head - 1].value_at_request;
        let outstanding = add_bounded(self.outstanding_value, value)?;

        self.head -= 1;
        self.tickets[self.head].settled = false;
        self.outstanding_value = outstanding;
        Ok(())
    }

    /// Settled tickets form a prefix of the sequence
    pub fn settled_prefix_holds(&self) -> bool {
        self.tickets[..self.head].iter().all(|t| t.settled)
            && self.tickets[self.head..].iter().all(|t| !t.settled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: Address = [1u8; 32];
    const BOB: Address = [2u8; 32];

    #[test]
    fn test_enqueue_assigns_sequential_ids() {
        let mut q = WithdrawalQueue::new();
        assert_eq!(q.enqueue(ALICE, 10, 11, 0, 5).unwrap(), 0);
        assert_eq!(q.enqueue(BOB, 20, 22, 1, 5).unwrap(), 1);
        assert_eq!(q.outstanding_value(), 33);
        assert_eq!(q.pending_count(), 2);
        assert_eq!(q.tickets_of(&BOB).count(), 1);
    }

    #[test]
    fn test_front_blocks_until_eligible_and_covered() {
        let mut q = WithdrawalQueue::new();
        q.enqueue(ALICE, 10, 100, 0, 5).unwrap();
        q.enqueue(BOB, 1, 10, 0, 5).unwrap();

        assert_eq!(
            q.check_front(4, 1_000).unwrap_err(),
            StopReason::NotYetEligible { ticket: 0, epoch_eligible: 5 }
        );
        // Bob's ticket would be coverable, but Alice is first
        assert_eq!(
            q.check_front(5, 50).unwrap_err(),
            StopReason::InsufficientUnlocked { ticket: 0, needed: 100, available: 50 }
        );
        assert_eq!(q.check_front(5, 100).unwrap().id, 0);
    }

    #[test]
    fn test_settle_and_unsettle() {
        let mut q = WithdrawalQueue::new();
        q.enqueue(ALICE, 10, 100, 0, 0).unwrap();
        q.enqueue(BOB, 10, 50, 0, 0).unwrap();

        let t = q.settle_front().unwrap();
        assert_eq!(t.id, 0);
        assert!(t.settled);
        assert_eq!(q.outstanding_value(), 50);
        assert!(q.settled_prefix_holds());

        assert_eq!(q.unsettle_last(1), Err(VaultError::TicketNotFound));
        q.unsettle_last(0).unwrap();
        assert_eq!(q.outstanding_value(), 150);
        assert_eq!(q.front().map(|t| t.id), Some(0));
        assert!(q.settled_prefix_holds());
    }

    #[test]
    fn test_pending_count_follows_head() {
        let mut q = WithdrawalQueue::new();
        q.enqueue(ALICE, 1, 10, 0, 3).unwrap();
        q.enqueue(BOB, 1, 20, 1, 2).unwrap();
        q.settle_front().unwrap();

        assert_eq!(q.len(), 2);
        assert_eq!(q.pending_count(), q.iter().filter(|t| !t.settled).count());
        assert_eq!(q.front().map(|t| t.owner), Some(BOB));
    }

    #[test]
    fn test_empty_queue() {
        let q = WithdrawalQueue::new();
        assert_eq!(q.check_front(10, 10).unwrap_err(), StopReason::QueueEmpty);
        assert!(q.get(0).is_none());
    }
}
