//! Fast scenario tests for the vault engine
//! Run with: cargo test

use lockvault::*;
use vault_model::merkle;

const BASE: Address = [0xBB; 32];
const REWARD: Address = [0xAA; 32];
const VAULT: Address = [0xF0; 32];
const DIST: Address = [0xD0; 32];
const VENUE: Address = [0xC0; 32];
const ROUTER: Address = [0xC1; 32];
const HARVESTER: Address = [0xE1; 32];
const UPDATER: Address = [0xE2; 32];
const ALICE: Address = [1u8; 32];
const BOB: Address = [2u8; 32];

const EPOCH_SECS: u64 = 7 * 24 * 3600;
const ONE: u128 = PRICE_SCALE;

fn default_params() -> VaultParams {
    VaultParams {
        genesis_timestamp: 1_700_000_000,
        epoch_length_secs: EPOCH_SECS,
        lock_epochs: 2,
        maturity_rounding: MaturityRounding::Ceil,
        base_token: BASE,
        vault_address: VAULT,
        distributor: DIST,
    }
}

fn setup() -> (VaultEngine, InMemoryCustody) {
    let params = default_params();
    let roles = Roles { harvester: HARVESTER, root_updater: UPDATER };
    let engine = VaultEngine::new(params, roles, params.genesis_timestamp).unwrap();

    let mut custody = InMemoryCustody::new();
    custody.register_venue(VENUE, ROUTER);
    custody.mint_to(&BASE, &VENUE, 1_000 * ONE).unwrap();
    custody.mint_to(&REWARD, &DIST, 1_000 * ONE).unwrap();
    for who in [ALICE, BOB, HARVESTER] {
        custody.mint_to(&BASE, &who, 100 * ONE).unwrap();
    }
    (engine, custody)
}

fn goto_epoch(engine: &mut VaultEngine, epoch: Epoch) {
    let ts = engine.clock().epoch_start(epoch);
    engine.set_time(ts).unwrap();
}

/// Publish a one-token distribution to the vault and return its proofs
fn publish(engine: &mut VaultEngine, entries: &[(u64, u128)]) -> Vec<ClaimProof> {
    let leaves: Vec<Hash> = entries
        .iter()
        .map(|(index, amount)| merkle::claim_leaf(&REWARD, *index, &VAULT, *amount))
        .collect();
    engine
        .set_distribution_root(&UPDATER, REWARD, merkle::compute_root(&leaves))
        .unwrap();
    entries
        .iter()
        .enumerate()
        .map(|(pos, (index, amount))| ClaimProof {
            token: REWARD,
            index: *index,
            amount: *amount,
            merkle_path: merkle::proof_for(&leaves, pos).unwrap(),
        })
        .collect()
}

fn swap_instruction(amount_in: u128, amount_out: u128) -> ConversionInstruction {
    ConversionInstruction {
        sell_token: REWARD,
        spender: ROUTER,
        swap_target: VENUE,
        call_data: SwapCall { sell_token: REWARD, amount_in, buy_token: BASE, amount_out }
            .encode()
            .to_vec(),
    }
}

#[test]
fn test_price_one_to_one_point_one() {
    let (mut engine, mut custody) = setup();

    // Mint 1.0 into an empty pool
    let shares = engine.mint(&mut custody, &ALICE, ONE).unwrap();
    assert_eq!(shares, ONE);
    assert_eq!(engine.price(), ONE);

    // Harvest 0.1 of value through claim + sell
    let proofs = publish(&mut engine, &[(0, 5 * ONE)]);
    assert_eq!(engine.claim(&mut custody, &proofs), vec![ClaimStatus::Claimed]);
    let report = engine
        .sell(&mut custody, &HARVESTER, &[swap_instruction(5 * ONE, ONE / 10)])
        .unwrap();
    assert_eq!(report.statuses, vec![SellStatus::Sold { amount_in: 5 * ONE, proceeds: ONE / 10 }]);
    assert_eq!(engine.price(), 1_100_000_000);

    // Withdraw everything
    let receipt = engine.request_withdraw(&ALICE, ONE).unwrap();
    assert_eq!(receipt.value, 1_100_000_000);
    assert_eq!(engine.share_state().total_shares, 0);
    assert_eq!(engine.share_balance(&ALICE), 0);
    assert!(engine.check_conservation());

    // Nothing is payable before maturity
    let report = engine.process_queue(&mut custody, 10).unwrap();
    assert!(report.settled.is_empty());

    goto_epoch(&mut engine, receipt.epoch_eligible);
    engine.relock().unwrap();
    let report = engine.process_queue(&mut custody, 10).unwrap();
    assert_eq!(report.settled, vec![receipt.ticket]);
    assert_eq!(report.paid, 1_100_000_000);
    assert_eq!(custody.balance_of(&BASE, &ALICE), 100 * ONE + ONE / 10);
    assert_eq!(engine.lock_state().total_locked, 0);
    assert!(engine.check_invariants());
}

#[test]
fn test_earlier_ticket_blocks_later_one() {
    let (mut engine, mut custody) = setup();

    engine.mint(&mut custody, &ALICE, 100).unwrap(); // epoch 0, matures 3
    goto_epoch(&mut engine, 1);
    engine.mint(&mut custody, &BOB, 1_000).unwrap(); // epoch 1, matures 4

    let a = engine.request_withdraw(&BOB, 1_000).unwrap();
    let b = engine.request_withdraw(&ALICE, 50).unwrap();
    assert_eq!(a.epoch_eligible, 4);
    assert_eq!(b.epoch_eligible, 4);

    // Alice's 100 matures: enough for B, not for A
    goto_epoch(&mut engine, 3);
    engine.relock().unwrap();
    assert_eq!(engine.lock_state().unlocked_unprocessed, 100);
    let report = engine.process_queue(&mut custody, 10).unwrap();
    assert!(report.settled.is_empty());

    // A is eligible now but still uncovered until the next relock
    goto_epoch(&mut engine, 4);
    let report = engine.process_queue(&mut custody, 10).unwrap();
    assert!(report.settled.is_empty());
    assert_eq!(
        report.stopped,
        StopReason::InsufficientUnlocked { ticket: a.ticket, needed: 1_000, available: 100 }
    );
    assert!(!engine.ticket(b.ticket).unwrap().settled);

    engine.relock().unwrap();
    let report = engine.process_queue(&mut custody, 10).unwrap();
    assert_eq!(report.settled, vec![a.ticket, b.ticket]);
    assert!(engine.check_invariants());
}

#[test]
fn test_replayed_proof_does_not_affect_batch() {
    let (mut engine, mut custody) = setup();
    engine.mint(&mut custody, &ALICE, ONE).unwrap();

    let proofs = publish(&mut engine, &[(0, 10), (1, 20), (2, 30)]);
    engine.claim(&mut custody, &proofs[..1]);

    let batch = vec![proofs[0].clone(), proofs[1].clone(), proofs[0].clone(), proofs[2].clone()];
    let statuses = engine.claim(&mut custody, &batch);
    assert_eq!(
        statuses,
        vec![
            ClaimStatus::AlreadyClaimed,
            ClaimStatus::Claimed,
            ClaimStatus::AlreadyClaimed,
            ClaimStatus::Claimed,
        ]
    );
    assert_eq!(engine.harvester().pending(&REWARD), 60);
    assert_eq!(custody.balance_of(&REWARD, &VAULT), 60);
}

#[test]
fn test_claim_is_public_and_root_is_restricted() {
    let (mut engine, mut custody) = setup();
    assert_eq!(
        engine.set_distribution_root(&ALICE, REWARD, [1u8; 32]),
        Err(VaultError::Unauthorized)
    );

    let proofs = publish(&mut engine, &[(7, 10)]);
    // Anyone may submit; proceeds always land in the vault
    assert_eq!(engine.claim(&mut custody, &proofs), vec![ClaimStatus::Claimed]);
    assert_eq!(custody.balance_of(&REWARD, &ALICE), 0);
}

#[test]
fn test_sell_is_restricted() {
    let (mut engine, mut custody) = setup();
    engine.mint(&mut custody, &ALICE, ONE).unwrap();
    let proofs = publish(&mut engine, &[(0, 10)]);
    engine.claim(&mut custody, &proofs);

    let before = engine.clone();
    assert_eq!(
        engine.sell(&mut custody, &ALICE, &[swap_instruction(10, 5)]),
        Err(VaultError::Unauthorized)
    );
    assert_eq!(engine, before);
    assert_eq!(engine.donate(&mut custody, &ALICE, 10), Err(VaultError::Unauthorized));
}

#[test]
fn test_failed_swap_keeps_pending_and_continues() {
    let (mut engine, mut custody) = setup();
    engine.mint(&mut custody, &ALICE, ONE).unwrap();
    let proofs = publish(&mut engine, &[(0, 10)]);
    engine.claim(&mut custody, &proofs);

    let broken = ConversionInstruction { swap_target: [0x99; 32], ..swap_instruction(10, 5) };
    let report = engine
        .sell(&mut custody, &HARVESTER, &[broken, swap_instruction(10, 5)])
        .unwrap();
    assert_eq!(
        report.statuses,
        vec![SellStatus::SwapFailed, SellStatus::Sold { amount_in: 10, proceeds: 5 }]
    );
    assert_eq!(report.deposited, 5);
    assert_eq!(engine.harvester().pending(&REWARD), 0);
    assert_eq!(custody.allowance(&REWARD, &VAULT, &ROUTER), 0);
    assert!(engine.check_invariants());
}

#[test]
fn test_pending_base_is_deposited_without_swap() {
    let (mut engine, mut custody) = setup();
    engine.mint(&mut custody, &ALICE, ONE).unwrap();

    custody.mint_to(&BASE, &DIST, 500).unwrap();
    let leaf = merkle::claim_leaf(&BASE, 0, &VAULT, 500);
    engine.set_distribution_root(&UPDATER, BASE, leaf).unwrap();
    let proof = ClaimProof { token: BASE, index: 0, amount: 500, merkle_path: vec![] };
    assert_eq!(engine.claim(&mut custody, &[proof]), vec![ClaimStatus::Claimed]);

    let instruction = ConversionInstruction {
        sell_token: BASE,
        spender: ROUTER,
        swap_target: VENUE,
        call_data: vec![],
    };
    let report = engine.sell(&mut custody, &HARVESTER, &[instruction]).unwrap();
    assert_eq!(report.statuses, vec![SellStatus::DepositedDirectly { amount: 500 }]);
    assert_eq!(engine.share_state().total_value, ONE + 500);
    assert!(engine.check_invariants());
}

/// Custody whose swap target also drains base from the caller
struct DrainingCustody {
    inner: InMemoryCustody,
}

impl AssetCustody for DrainingCustody {
    fn balance_of(&self, token: &Address, holder: &Address) -> u128 {
        self.inner.balance_of(token, holder)
    }

    fn transfer(&mut self, token: &Address, from: &Address, to: &Address, amount: u128) -> Result<()> {
        self.inner.transfer(token, from, to, amount)
    }

    fn approve(&mut self, token: &Address, owner: &Address, spender: &Address, amount: u128) -> Result<()> {
        self.inner.approve(token, owner, spender, amount)
    }

    fn call(&mut self, caller: &Address, target: &Address, data: &[u8]) -> Result<()> {
        self.inner.call(caller, target, data)?;
        self.inner.transfer(&BASE, caller, target, 1_000)
    }
}

#[test]
fn test_negative_proceeds_is_hard_error() {
    let (mut engine, custody) = setup();
    let mut custody = DrainingCustody { inner: custody };
    engine.mint(&mut custody, &ALICE, ONE).unwrap();
    let proofs = publish(&mut engine, &[(0, 10)]);
    engine.claim(&mut custody, &proofs);

    let value_before = engine.share_state().total_value;
    assert_eq!(
        engine.sell(&mut custody, &HARVESTER, &[swap_instruction(10, 5)]),
        Err(VaultError::NegativeProceeds)
    );
    assert_eq!(engine.share_state().total_value, value_before);
}

#[test]
fn test_eligibility_within_ceiling() {
    let (mut engine, mut custody) = setup();
    let max_wait = engine.max_wait_epochs();
    assert_eq!(max_wait, 3);

    for epoch in 0..6u64 {
        goto_epoch(&mut engine, epoch);
        engine.relock().unwrap();
        engine.mint(&mut custody, &ALICE, 1_000).unwrap();
        let receipt = engine.request_withdraw(&ALICE, 300).unwrap();
        assert!(receipt.epoch_eligible >= epoch);
        assert!(receipt.epoch_eligible <= epoch + max_wait);
        engine.process_queue(&mut custody, 100).unwrap();
        assert!(engine.check_invariants());
    }
}

#[test]
fn test_withdraw_more_than_owned() {
    let (mut engine, mut custody) = setup();
    engine.mint(&mut custody, &ALICE, 1_000).unwrap();
    engine.mint(&mut custody, &BOB, 1_000).unwrap();

    assert_eq!(engine.request_withdraw(&BOB, 1_001), Err(VaultError::InsufficientShares));
    assert_eq!(engine.request_withdraw(&BOB, 0), Err(VaultError::ZeroAmount));
    assert!(engine.queue().is_empty());
}

#[test]
fn test_relock_noop_and_reserve() {
    let (mut engine, mut custody) = setup();
    engine.mint(&mut custody, &ALICE, 1_000).unwrap();

    assert_eq!(
        engine.relock().unwrap(),
        RelockOutcome::NothingMatured { next_maturity: Some(3) }
    );

    goto_epoch(&mut engine, 3);
    assert_eq!(
        engine.relock().unwrap(),
        RelockOutcome::Processed { matured: 1_000, reserved: 0, relocked: 1_000, relock_maturity: 6 }
    );
    assert_eq!(engine.lock_state().unlocked_unprocessed, 0);
    assert_eq!(engine.lock_state().last_epoch_processed, 3);
}

#[test]
fn test_mint_after_growth_rounds_down() {
    let (mut engine, mut custody) = setup();
    engine.mint(&mut custody, &ALICE, 3).unwrap();
    engine.donate(&mut custody, &HARVESTER, 1).unwrap();

    // 4 value / 3 shares: 1 base buys 0 shares
    assert_eq!(engine.mint(&mut custody, &BOB, 1), Err(VaultError::ZeroAmount));
    let price_before = engine.price();
    engine.mint(&mut custody, &BOB, 10).unwrap();
    assert!(engine.price() >= price_before);
}

#[test]
fn test_dust_donation_raises_exact_price() {
    let (mut engine, mut custody) = setup();
    custody.mint_to(&BASE, &ALICE, 1_000_000_000_000).unwrap();
    engine.mint(&mut custody, &ALICE, 1_000_000_000_000).unwrap();

    let price_before = engine.price();
    let state_before = engine.share_state();
    engine.donate(&mut custody, &HARVESTER, 1).unwrap();

    // One base unit is below fixed-point resolution at this size
    assert_eq!(engine.price(), price_before);
    assert_eq!(engine.price_ratio(), (1_000_000_000_001, 1_000_000_000_000));
    assert_eq!(
        vault_model::share_math::price_cmp(engine.share_state(), state_before),
        std::cmp::Ordering::Greater
    );
}

#[test]
fn test_payout_within_max_wait_when_kept_every_epoch() {
    let (mut engine, mut custody) = setup();
    let max_wait = engine.max_wait_epochs();
    let mut settled = 0usize;

    for epoch in 0..48u64 {
        goto_epoch(&mut engine, epoch);
        engine.relock().unwrap();
        let report = engine.process_queue(&mut custody, usize::MAX).unwrap();
        for id in &report.settled {
            let ticket = engine.ticket(*id).unwrap();
            assert!(
                epoch - ticket.epoch_requested <= max_wait,
                "ticket {} requested at {} paid at {}",
                id,
                ticket.epoch_requested,
                epoch
            );
        }
        settled += report.settled.len();
        assert!(engine.check_invariants());

        // Mid-epoch activity
        if epoch >= 40 {
            continue;
        }
        engine
            .set_time(engine.clock().epoch_start(epoch) + EPOCH_SECS / 2)
            .unwrap();
        if epoch % 4 != 3 {
            engine.mint(&mut custody, &ALICE, 1_000 + epoch as u128 * 37).unwrap();
        }
        if epoch % 2 == 0 {
            engine.mint(&mut custody, &BOB, 5_000).unwrap();
        }
        let alice = engine.share_balance(&ALICE) / 3;
        if epoch % 3 == 0 && alice > 0 {
            engine.request_withdraw(&ALICE, alice).unwrap();
        }
        let bob = engine.share_balance(&BOB) / 2;
        if epoch % 5 == 1 && bob > 0 {
            engine.request_withdraw(&BOB, bob).unwrap();
        }
        assert!(engine.check_invariants());
    }

    assert!(settled > 0);
    assert_eq!(engine.queue().pending_count(), 0);
}

/// Custody whose vault base balance can exceed the pool bound
struct OversizedCustody {
    inner: InMemoryCustody,
    extra_base: u128,
    bonus_per_call: u128,
}

impl AssetCustody for OversizedCustody {
    fn balance_of(&self, token: &Address, holder: &Address) -> u128 {
        let balance = self.inner.balance_of(token, holder);
        if *token == BASE && *holder == VAULT {
            balance + self.extra_base
        } else {
            balance
        }
    }

    fn transfer(&mut self, token: &Address, from: &Address, to: &Address, amount: u128) -> Result<()> {
        self.inner.transfer(token, from, to, amount)
    }

    fn approve(&mut self, token: &Address, owner: &Address, spender: &Address, amount: u128) -> Result<()> {
        self.inner.approve(token, owner, spender, amount)
    }

    fn call(&mut self, caller: &Address, target: &Address, data: &[u8]) -> Result<()> {
        self.inner.call(caller, target, data)?;
        self.extra_base += self.bonus_per_call;
        Ok(())
    }
}

#[test]
fn test_undepositable_proceeds_are_parked() {
    let (mut engine, custody) = setup();
    let mut custody = OversizedCustody { inner: custody, extra_base: 0, bonus_per_call: 500 };
    custody.inner.mint_to(&BASE, &ALICE, MAX_AMOUNT - 100 * ONE).unwrap();
    engine.mint(&mut custody, &ALICE, MAX_AMOUNT - 100).unwrap();

    let proofs = publish(&mut engine, &[(0, 10)]);
    engine.claim(&mut custody, &proofs);
    let value_before = engine.share_state().total_value;

    let report = engine
        .sell(&mut custody, &HARVESTER, &[swap_instruction(10, 0)])
        .unwrap();
    assert_eq!(report.statuses, vec![SellStatus::ProceedsParked { amount_in: 10, proceeds: 500 }]);
    assert_eq!(report.deposited, 0);
    assert_eq!(engine.share_state().total_value, value_before);
    assert_eq!(engine.harvester().pending(&BASE), 500);
    assert_eq!(engine.harvester().pending(&REWARD), 0);
    assert!(engine.check_invariants());
}
