//! Vault commands: init, status, deposits, withdrawals, clock

use anyhow::{bail, Context, Result};
use colored::Colorize;
use lockvault::{AssetCustody, InMemoryCustody, RelockOutcome, StopReason, VaultEngine};
use std::path::Path;

use crate::client::{
    encode_address, format_address, format_scaled, format_time, parse_cli_address, with_state, SimState,
};
use crate::config::VaultConfig;

pub fn init(config_path: &Path, state_path: &Path, now: Option<u64>, force: bool) -> Result<()> {
    if state_path.exists() && !force {
        bail!(
            "State file {} already exists (use --force to overwrite)",
            state_path.display()
        );
    }
    let config = VaultConfig::load(config_path)?;
    let params = config.params()?;
    let roles = config.roles()?;
    let now = now.unwrap_or_else(|| chrono::Utc::now().timestamp().max(0) as u64);

    let engine = VaultEngine::new(params, roles, now)
        .map_err(|e| anyhow::anyhow!("{}", e))
        .context("Failed to create vault engine")?;
    let state = SimState { engine, custody: InMemoryCustody::new() };
    state.save(state_path)?;

    println!("{}", "=== Vault Initialized ===".bright_green().bold());
    println!("{} {}", "State:".bright_cyan(), state_path.display());
    println!("{} {}", "Vault:".bright_cyan(), encode_address(&params.vault_address));
    println!("{} {}", "Epoch:".bright_cyan(), state.engine.current_epoch());
    Ok(())
}

pub fn status(state_path: &Path, detailed: bool) -> Result<()> {
    let state = SimState::load(state_path)?;
    let e = &state.engine;
    let lock = e.lock_state();
    let shares = e.share_state();
    let clock = e.clock();

    println!("{}", "=== Vault Status ===".bright_green().bold());
    println!("{} {}", "Time:".bright_cyan(), format_time(e.now()));
    println!(
        "{} {} ({}s until next)",
        "Epoch:".bright_cyan(),
        e.current_epoch(),
        clock.secs_until_next_epoch(e.now())
    );
    println!("{} {}", "Share price:".bright_cyan(), format_scaled(e.price()));
    println!("{} {}", "Total shares:".bright_cyan(), shares.total_shares);
    println!("{} {}", "Total value:".bright_cyan(), shares.total_value);

    println!("\n{}", "Lock Ledger:".bright_yellow());
    println!("  {} {}", "Total locked:".bright_cyan(), lock.total_locked);
    println!("  {} {}", "Unlocked (queue reserve):".bright_cyan(), lock.unlocked_unprocessed);
    println!("  {} {}", "Last epoch processed:".bright_cyan(), lock.last_epoch_processed);
    match e.next_unlock_timestamp() {
        Some(ts) => println!("  {} {}", "Next unlock:".bright_cyan(), format_time(ts)),
        None => println!("  {} none", "Next unlock:".bright_cyan()),
    }

    println!("\n{}", "Withdrawal Queue:".bright_yellow());
    println!("  {} {}", "Pending tickets:".bright_cyan(), e.queue().pending_count());
    println!("  {} {}", "Outstanding value:".bright_cyan(), e.queue().outstanding_value());

    if detailed {
        println!("\n{}", "Lock schedule:".bright_yellow());
        for (epoch, amount) in e.ledger().schedule() {
            println!("  {} epoch {:>6}: {}", "├─".dimmed(), epoch, amount);
        }
        println!("\n{}", "Pending rewards:".bright_yellow());
        for (token, amount) in e.harvester().pending_balances() {
            println!("  {} {}: {}", "├─".dimmed(), format_address(token), amount);
        }
        println!("\n{}", "Roles:".bright_yellow());
        println!("  {} {}", "Harvester:".bright_cyan(), encode_address(&e.roles().harvester));
        println!("  {} {}", "Root updater:".bright_cyan(), encode_address(&e.roles().root_updater));
    }

    let ok = e.check_invariants();
    println!(
        "\n{} {}",
        "Invariants:".bright_cyan(),
        if ok { "✓ hold".green() } else { "✗ VIOLATED".red().bold() }
    );
    Ok(())
}

/// Simulator faucet
pub fn fund(state_path: &Path, to: &str, token: &str, amount: u128) -> Result<()> {
    let to = parse_cli_address(to)?;
    with_state(state_path, |s| {
        let token = s.resolve_token(token)?;
        s.custody
            .mint_to(&token, &to, amount)
            .map_err(|e| anyhow::anyhow!("{}", e))?;
        println!(
            "{} {} now holds {}",
            "✓".green(),
            format_address(&to),
            s.custody.balance_of(&token, &to)
        );
        Ok(())
    })
}

pub fn mint(state_path: &Path, owner: &str, amount: u128) -> Result<()> {
    let owner = parse_cli_address(owner)?;
    with_state(state_path, |s| {
        let shares = s
            .engine
            .mint(&mut s.custody, &owner, amount)
            .map_err(|e| anyhow::anyhow!("Mint failed: {}", e))?;
        println!("{} Minted {} shares", "✓".green(), shares);
        Ok(())
    })
}

pub fn withdraw(state_path: &Path, owner: &str, shares: Option<u128>, all: bool) -> Result<()> {
    let owner = parse_cli_address(owner)?;
    with_state(state_path, |s| {
        let shares = match (shares, all) {
            (_, true) => s.engine.share_balance(&owner),
            (Some(n), false) => n,
            (None, false) => bail!("Specify a share amount or --all"),
        };
        let receipt = s
            .engine
            .request_withdraw(&owner, shares)
            .map_err(|e| anyhow::anyhow!("Withdraw request failed: {}", e))?;
        let eligible_at = s.engine.clock().epoch_start(receipt.epoch_eligible);
        println!(
            "{} Ticket #{} for {} base, eligible at epoch {} ({})",
            "✓".green(),
            receipt.ticket,
            receipt.value,
            receipt.epoch_eligible,
            format_time(eligible_at)
        );
        Ok(())
    })
}

pub fn relock(state_path: &Path) -> Result<()> {
    with_state(state_path, |s| {
        let outcome = s.engine.relock().map_err(|e| anyhow::anyhow!("Relock failed: {}", e))?;
        print_relock(&outcome);
        Ok(())
    })
}

pub fn print_relock(outcome: &RelockOutcome) {
    match outcome {
        RelockOutcome::NothingMatured { next_maturity: Some(epoch) } => {
            println!("  {} Nothing matured (next maturity at epoch {})", "ℹ".blue(), epoch)
        }
        RelockOutcome::NothingMatured { next_maturity: None } => {
            println!("  {} Nothing locked", "ℹ".blue())
        }
        RelockOutcome::Processed { matured, reserved, relocked, relock_maturity } => println!(
            "  {} Matured {}: reserved {}, relocked {} until epoch {}",
            "✓".green(),
            matured,
            reserved,
            relocked,
            relock_maturity
        ),
    }
}

pub fn process(state_path: &Path, max_tickets: usize) -> Result<()> {
    with_state(state_path, |s| {
        let report = s
            .engine
            .process_queue(&mut s.custody, max_tickets)
            .map_err(|e| anyhow::anyhow!("Queue processing failed: {}", e))?;
        println!("{} Settled {} tickets, paid {}", "✓".green(), report.settled.len(), report.paid);
        print_stop(&report.stopped);
        Ok(())
    })
}

pub fn print_stop(reason: &StopReason) {
    let text = match reason {
        StopReason::QueueEmpty => "queue empty".to_string(),
        StopReason::NotYetEligible { ticket, epoch_eligible } => {
            format!("ticket #{} not eligible until epoch {}", ticket, epoch_eligible)
        }
        StopReason::InsufficientUnlocked { ticket, needed, available } => {
            format!("ticket #{} needs {}, only {} unlocked (run relock)", ticket, needed, available)
        }
        StopReason::MaxTicketsReached => "ticket limit reached".to_string(),
    };
    println!("  {} Stopped: {}", "ℹ".blue(), text.dimmed());
}

pub fn advance_time(state_path: &Path, secs: Option<u64>, epochs: Option<u64>) -> Result<()> {
    with_state(state_path, |s| {
        let epoch_len = s.engine.params().epoch_length_secs;
        let delta = secs
            .unwrap_or(0)
            .saturating_add(epochs.unwrap_or(0).saturating_mul(epoch_len));
        s.engine.advance_time(delta);
        println!(
            "{} Clock at {} (epoch {})",
            "✓".green(),
            format_time(s.engine.now()),
            s.engine.current_epoch()
        );
        Ok(())
    })
}

pub fn set_time(state_path: &Path, timestamp: u64) -> Result<()> {
    with_state(state_path, |s| {
        s.engine
            .set_time(timestamp)
            .map_err(|e| anyhow::anyhow!("{}", e))?;
        println!("{} Clock at epoch {}", "✓".green(), s.engine.current_epoch());
        Ok(())
    })
}

pub fn tickets(state_path: &Path, owner: Option<&str>) -> Result<()> {
    let state = SimState::load(state_path)?;
    let owner = owner.map(parse_cli_address).transpose()?;

    println!("{}", "=== Withdrawal Tickets ===".bright_green().bold());
    let current = state.engine.current_epoch();
    let mut shown = 0;
    for t in state.engine.queue().iter() {
        if owner.map_or(false, |o| o != t.owner) {
            continue;
        }
        let status = if t.settled {
            "settled".green()
        } else if t.epoch_eligible <= current {
            "eligible".yellow()
        } else {
            "waiting".dimmed()
        };
        println!(
            "  #{:<4} {} value={} shares={} requested={} eligible={} [{}]",
            t.id,
            format_address(&t.owner),
            t.value_at_request,
            t.share_amount,
            t.epoch_requested,
            t.epoch_eligible,
            status
        );
        shown += 1;
    }
    if shown == 0 {
        println!("  {}", "No tickets".dimmed());
    }
    Ok(())
}

pub fn balance(state_path: &Path, who: &str) -> Result<()> {
    let state = SimState::load(state_path)?;
    let who = parse_cli_address(who)?;
    let base = state.engine.params().base_token;
    let shares = state.engine.share_balance(&who);
    let redeemable = if shares == 0 {
        0
    } else {
        state.engine.preview_burn(shares).unwrap_or(0)
    };

    println!("{} {}", "Account:".bright_cyan(), format_address(&who));
    println!("  {} {}", "Base balance:".bright_cyan(), state.custody.balance_of(&base, &who));
    println!("  {} {}", "Shares:".bright_cyan(), shares);
    println!("  {} {}", "Redeemable:".bright_cyan(), redeemable);
    Ok(())
}
