//! Vault engine
//!
//! Single-owner state for the whole vault. Operations take `&mut self`
//! and run to completion; token movements go through the caller's
//! [`AssetCustody`]. Each operation validates and computes its new state
//! first, then performs the external call it depends on, then commits.
//! A failed external call after commit is rolled back explicitly.

use alloc::vec::Vec;
use vault_model::{Epoch, EpochClock, MaturityRounding};

use crate::custody::AssetCustody;
use crate::events::Event;
use crate::harvest::{ClaimProof, ClaimStatus, ConversionInstruction, RewardHarvester, SellReport, SellStatus};
use crate::ledger::{LockLedger, LockState, RelockOutcome};
use crate::queue::{QueueReport, StopReason, WithdrawTicket, WithdrawalQueue};
use crate::shares::ShareAccountant;
use crate::{Address, Result, TicketId, VaultError};
use vault_model::{Hash, ShareState};

/// Vault parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VaultParams {
    /// Timestamp at which epoch 0 begins
    pub genesis_timestamp: u64,

    /// Epoch length in seconds
    pub epoch_length_secs: u64,

    /// Whole epochs a lock lasts
    pub lock_epochs: u64,

    /// How the partial epoch of a fresh lock is counted
    pub maturity_rounding: MaturityRounding,

    /// Asset users deposit and withdraw
    pub base_token: Address,

    /// Address holding the vault's tokens in custody
    pub vault_address: Address,

    /// Reward distributor claims are pulled from
    pub distributor: Address,
}

impl VaultParams {
    pub fn validate(&self) -> Result<()> {
        if self.epoch_length_secs == 0 || self.lock_epochs == 0 {
            return Err(VaultError::InvalidParams);
        }
        if self.vault_address == self.distributor {
            return Err(VaultError::InvalidParams);
        }
        Ok(())
    }

    pub fn clock(&self) -> EpochClock {
        EpochClock::new(self.genesis_timestamp, self.epoch_length_secs)
    }
}

/// Restricted capabilities
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Role {
    /// May sell rewards and donate value
    Harvester,
    /// May record distribution roots
    RootUpdater,
}

/// Role holders, compared against the caller at call time
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Roles {
    pub harvester: Address,
    pub root_updater: Address,
}

impl Roles {
    pub fn holder(&self, role: Role) -> Address {
        match role {
            Role::Harvester => self.harvester,
            Role::RootUpdater => self.root_updater,
        }
    }

    fn require(&self, role: Role, caller: &Address) -> Result<()> {
        if self.holder(role) != *caller {
            return Err(VaultError::Unauthorized);
        }
        Ok(())
    }
}

/// Result of a withdraw request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WithdrawReceipt {
    pub ticket: TicketId,
    pub shares: u128,
    pub value: u128,
    pub epoch_eligible: Epoch,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VaultEngine {
    params: VaultParams,
    roles: Roles,
    clock: EpochClock,

    /// Engine time in seconds; never decreases
    now: u64,

    ledger: LockLedger,
    shares: ShareAccountant,
    harvester: RewardHarvester,
    queue: WithdrawalQueue,

    #[cfg_attr(feature = "serde", serde(skip))]
    events: Vec<Event>,
}

impl VaultEngine {
    /// Create an engine with its clock at `now`
    pub fn new(params: VaultParams, roles: Roles, now: u64) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            roles,
            clock: params.clock(),
            now,
            ledger: LockLedger::new(params.lock_epochs, params.maturity_rounding),
            shares: ShareAccountant::new(),
            harvester: RewardHarvester::new(),
            queue: WithdrawalQueue::new(),
            events: Vec::new(),
        })
    }

    // ========================================
    // Clock
    // ========================================

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn current_epoch(&self) -> Epoch {
        self.clock.epoch_at(self.now)
    }

    pub fn clock(&self) -> EpochClock {
        self.clock
    }

    /// Move the clock to `timestamp`; earlier timestamps are rejected
    pub fn set_time(&mut self, timestamp: u64) -> Result<()> {
        if timestamp < self.now {
            return Err(VaultError::StaleTimestamp);
        }
        self.now = timestamp;
        Ok(())
    }

    pub fn advance_time(&mut self, secs: u64) {
        self.now = self.now.saturating_add(secs);
    }

    // ========================================
    // Deposits
    // ========================================

    /// Deposit `base_amount` from `owner` and issue shares at the current price
    pub fn mint<C: AssetCustody>(&mut self, custody: &mut C, owner: &Address, base_amount: u128) -> Result<u128> {
        let epoch = self.current_epoch();
        let shares = self.shares.preview_mint(base_amount)?;
        self.ledger.can_lock(base_amount, epoch)?;

        // The pull is needed before anything is credited
        custody.transfer(&self.params.base_token, owner, &self.params.vault_address, base_amount)?;

        self.ledger.lock(base_amount, epoch)?;
        let minted = self.shares.mint(owner, base_amount)?;
        debug_assert_eq!(minted, shares);

        log::info!("mint base={} shares={} epoch={}", base_amount, minted, epoch);
        self.events.push(Event::SharesMinted {
            owner: *owner,
            base_amount,
            shares: minted,
        });
        Ok(minted)
    }

    /// Restricted direct value deposit, pulled from the harvester
    pub fn donate<C: AssetCustody>(&mut self, custody: &mut C, caller: &Address, amount: u128) -> Result<()> {
        self.roles.require(Role::Harvester, caller)?;
        self.check_value_deposit(amount)?;

        custody.transfer(&self.params.base_token, caller, &self.params.vault_address, amount)?;
        self.commit_value_deposit(amount)
    }

    fn check_value_deposit(&self, amount: u128) -> Result<()> {
        vault_model::share_math::apply_value_deposit(self.shares.state(), amount)?;
        self.ledger.can_lock(amount, self.current_epoch())
    }

    /// Lock `amount` of base already in custody and credit it to the share pool
    fn commit_value_deposit(&mut self, amount: u128) -> Result<()> {
        self.ledger.lock(amount, self.current_epoch())?;
        self.shares.deposit_value(amount)?;

        let price = self.shares.price();
        log::info!("value deposit amount={} price={}", amount, price);
        self.events.push(Event::ValueDeposited { amount, price });
        Ok(())
    }

    // ========================================
    // Withdrawals
    // ========================================

    /// Burn `shares` from `owner` and queue the redeemed value
    ///
    /// The ticket becomes eligible once the locks maturing so far cover
    /// every earlier ticket plus this one, and never later than
    /// `current + max_wait_epochs`.
    pub fn request_withdraw(&mut self, owner: &Address, shares: u128) -> Result<WithdrawReceipt> {
        let current = self.current_epoch();
        let value = self.shares.preview_burn(shares)?;
        if shares > self.shares.balance_of(owner) {
            return Err(VaultError::InsufficientShares);
        }
        let demand = vault_model::math::add_bounded(self.queue.outstanding_value(), value)?;
        let epoch_eligible = self.eligible_epoch(demand, current);

        let burned = self.shares.burn(owner, shares)?;
        debug_assert_eq!(burned, value);
        let ticket = self.queue.enqueue(*owner, shares, value, current, epoch_eligible)?;

        log::info!(
            "withdraw ticket={} shares={} value={} eligible={}",
            ticket,
            shares,
            value,
            epoch_eligible
        );
        self.events.push(Event::SharesBurned { owner: *owner, shares, value });
        self.events.push(Event::WithdrawRequested {
            ticket,
            owner: *owner,
            value,
            epoch_eligible,
        });
        Ok(WithdrawReceipt { ticket, shares, value, epoch_eligible })
    }

    fn eligible_epoch(&self, demand: u128, current: Epoch) -> Epoch {
        let ceiling = current.saturating_add(self.ledger.max_wait_epochs());
        self.ledger
            .projected_unlock_epoch(demand, current)
            .map_or(ceiling, |e| e.max(current).min(ceiling))
    }

    /// Settle up to `max_tickets` of the oldest tickets
    ///
    /// Stops at the first ticket that is not yet eligible or not covered by
    /// unlocked principal. A failed payout transfer reopens that ticket and
    /// returns the error; tickets settled earlier in the call stay settled.
    pub fn process_queue<C: AssetCustody>(&mut self, custody: &mut C, max_tickets: usize) -> Result<QueueReport> {
        let current = self.current_epoch();
        let mut settled = Vec::new();
        let mut paid = 0u128;

        let stopped = loop {
            let unlocked = self.ledger.state().unlocked_unprocessed;
            let ticket_id = match self.queue.check_front(current, unlocked) {
                Ok(t) => t.id,
                Err(reason) => break reason,
            };
            if settled.len() >= max_tickets {
                break StopReason::MaxTicketsReached;
            }

            let ticket = self.queue.settle_front()?;
            debug_assert_eq!(ticket.id, ticket_id);
            self.ledger.release(ticket.value_at_request)?;

            if let Err(e) = custody.transfer(
                &self.params.base_token,
                &self.params.vault_address,
                &ticket.owner,
                ticket.value_at_request,
            ) {
                log::warn!("payout for ticket {} failed: {}", ticket.id, e);
                self.ledger.restore(ticket.value_at_request)?;
                self.queue.unsettle_last(ticket.id)?;
                return Err(e);
            }

            paid = paid.saturating_add(ticket.value_at_request);
            settled.push(ticket.id);
            self.events.push(Event::WithdrawSettled {
                ticket: ticket.id,
                owner: ticket.owner,
                value: ticket.value_at_request,
            });
        };

        if !settled.is_empty() {
            log::info!("settled {} tickets, paid {}", settled.len(), paid);
        }
        Ok(QueueReport { settled, paid, stopped })
    }

    // ========================================
    // Lock management
    // ========================================

    /// Process matured locks, reserving enough for every unsettled ticket
    pub fn relock(&mut self) -> Result<RelockOutcome> {
        let epoch = self.current_epoch();
        let outcome = self.ledger.relock(epoch, self.queue.outstanding_value())?;
        if let RelockOutcome::Processed { matured, reserved, relocked, .. } = outcome {
            self.events.push(Event::Relocked { epoch, matured, reserved, relocked });
        }
        Ok(outcome)
    }

    // ========================================
    // Rewards
    // ========================================

    /// Record the distribution root for `token`
    pub fn set_distribution_root(&mut self, caller: &Address, token: Address, root: Hash) -> Result<()> {
        self.roles.require(Role::RootUpdater, caller)?;
        if let Some(previous) = self.harvester.set_root(token, root) {
            log::debug!("root replaced, old={:02x?}", &previous[..4]);
        }
        self.events.push(Event::RootUpdated { token, root });
        Ok(())
    }

    /// Claim reward distributions; one status per proof
    pub fn claim<C: AssetCustody>(&mut self, custody: &mut C, proofs: &[ClaimProof]) -> Vec<ClaimStatus> {
        let vault = self.params.vault_address;
        let distributor = self.params.distributor;

        proofs
            .iter()
            .map(|proof| {
                let status = self.harvester.claim_one(custody, proof, &vault, &distributor);
                log::debug!("claim index={} status={:?}", proof.index, status);
                if status == ClaimStatus::Claimed {
                    self.events.push(Event::RewardClaimed {
                        token: proof.token,
                        index: proof.index,
                        amount: proof.amount,
                    });
                }
                status
            })
            .collect()
    }

    /// Convert pending rewards into base and deposit the proceeds
    ///
    /// Each instruction is committed on its own. A failing swap is reported
    /// as `SellStatus::SwapFailed`; a base balance that shrinks across a swap
    /// aborts the call with `NegativeProceeds`. Proceeds that cannot be
    /// deposited without exceeding MAX_AMOUNT stay in the base pending
    /// balance (`SellStatus::ProceedsParked`) for a later sell.
    pub fn sell<C: AssetCustody>(
        &mut self,
        custody: &mut C,
        caller: &Address,
        instructions: &[ConversionInstruction],
    ) -> Result<SellReport> {
        self.roles.require(Role::Harvester, caller)?;
        if self.shares.total_shares() == 0 {
            return Err(VaultError::NoOutstandingShares);
        }
        let base = self.params.base_token;
        let vault = self.params.vault_address;
        let mut report = SellReport::default();

        for instruction in instructions {
            let status = if instruction.sell_token == base {
                let amount = self.harvester.take_pending(&base);
                if amount == 0 {
                    SellStatus::NothingPending
                } else if let Err(e) = self.check_value_deposit(amount) {
                    self.harvester.restore_pending(&base, amount)?;
                    return Err(e);
                } else {
                    self.commit_value_deposit(amount)?;
                    report.deposited = report.deposited.saturating_add(amount);
                    SellStatus::DepositedDirectly { amount }
                }
            } else {
                let mut status = self.harvester.convert(custody, instruction, &vault, &base)?;
                if let SellStatus::Sold { amount_in, proceeds } = status {
                    if proceeds > 0 {
                        if let Err(e) = self.check_value_deposit(proceeds) {
                            // Proceeds are already in custody: keep them as base pending
                            log::warn!("proceeds {} not depositable ({}), parked as pending", proceeds, e);
                            self.harvester.restore_pending(&base, proceeds)?;
                            status = SellStatus::ProceedsParked { amount_in, proceeds };
                        } else {
                            self.commit_value_deposit(proceeds)?;
                            report.deposited = report.deposited.saturating_add(proceeds);
                        }
                    }
                    self.events.push(Event::RewardSold {
                        token: instruction.sell_token,
                        amount_in,
                        proceeds,
                    });
                }
                status
            };
            report.statuses.push(status);
        }
        Ok(report)
    }

    // ========================================
    // Administration
    // ========================================

    /// Hand `role` to `new_holder`; only the current holder may do this
    pub fn transfer_role(&mut self, caller: &Address, role: Role, new_holder: Address) -> Result<()> {
        self.roles.require(role, caller)?;
        match role {
            Role::Harvester => self.roles.harvester = new_holder,
            Role::RootUpdater => self.roles.root_updater = new_holder,
        }
        log::info!("role {:?} transferred", role);
        self.events.push(Event::RoleTransferred {
            role,
            from: *caller,
            to: new_holder,
        });
        Ok(())
    }

    /// Take every buffered event, oldest first
    pub fn drain_events(&mut self) -> Vec<Event> {
        core::mem::take(&mut self.events)
    }

    // ========================================
    // Views
    // ========================================

    pub fn params(&self) -> &VaultParams {
        &self.params
    }

    pub fn roles(&self) -> &Roles {
        &self.roles
    }

    pub fn ledger(&self) -> &LockLedger {
        &self.ledger
    }

    pub fn harvester(&self) -> &RewardHarvester {
        &self.harvester
    }

    pub fn queue(&self) -> &WithdrawalQueue {
        &self.queue
    }

    pub fn lock_state(&self) -> LockState {
        self.ledger.state()
    }

    pub fn share_state(&self) -> ShareState {
        self.shares.state()
    }

    /// Share price in PRICE_SCALE fixed point
    pub fn price(&self) -> u128 {
        self.shares.price()
    }

    /// Exact share price as `(total_value, total_shares)`, `(1, 1)` when empty
    pub fn price_ratio(&self) -> (u128, u128) {
        vault_model::share_math::price_ratio(self.shares.state())
    }

    pub fn share_balance(&self, owner: &Address) -> u128 {
        self.shares.balance_of(owner)
    }

    pub fn preview_mint(&self, base_amount: u128) -> Result<u128> {
        self.shares.preview_mint(base_amount)
    }

    pub fn preview_burn(&self, shares: u128) -> Result<u128> {
        self.shares.preview_burn(shares)
    }

    pub fn ticket(&self, id: TicketId) -> Option<&WithdrawTicket> {
        self.queue.get(id)
    }

    pub fn tickets_of<'a>(&'a self, owner: &'a Address) -> impl Iterator<Item = &'a WithdrawTicket> + 'a {
        self.queue.tickets_of(owner)
    }

    pub fn max_wait_epochs(&self) -> u64 {
        self.ledger.max_wait_epochs()
    }

    /// Start of the epoch in which the earliest scheduled lock matures
    ///
    /// May lie in the past when a matured lock is waiting for `relock`.
    pub fn next_unlock_timestamp(&self) -> Option<u64> {
        self.ledger
            .schedule()
            .next()
            .map(|(epoch, _)| self.clock.epoch_start(epoch))
    }

    /// `total_locked == total_value + outstanding ticket value`
    pub fn check_conservation(&self) -> bool {
        let expected = self
            .shares
            .total_value()
            .checked_add(self.queue.outstanding_value());
        expected == Some(self.ledger.state().total_locked)
    }

    /// Every engine-wide invariant at once
    pub fn check_invariants(&self) -> bool {
        let lock = self.ledger.state();
        self.check_conservation()
            && lock.unlocked_unprocessed <= self.queue.outstanding_value()
            && self.queue.settled_prefix_holds()
            && self.shares.balances_consistent()
    }
}
