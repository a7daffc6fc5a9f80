//! Keeper loop: advance the clock, relock, settle the queue

use anyhow::Result;
use colored::Colorize;
use lockvault::{QueueReport, RelockOutcome};
use std::path::Path;
use std::time::Duration;

use crate::client::{print_events, SimState};
use crate::vault::{print_relock, print_stop};

/// How the keeper moves the simulator clock on each pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockMode {
    /// Leave the clock alone
    Hold,
    /// Advance by a fixed number of seconds
    Advance(u64),
    /// Follow the host wall clock
    WallClock,
}

/// Result of one keeper pass
#[derive(Debug)]
pub struct KeeperPass {
    pub epoch: u64,
    pub relock: RelockOutcome,
    pub queue: QueueReport,
}

/// Run one keeper pass against in-memory state
pub fn keeper_pass(state: &mut SimState, clock: ClockMode, max_tickets: usize) -> Result<KeeperPass> {
    match clock {
        ClockMode::Hold => {}
        ClockMode::Advance(secs) => state.engine.advance_time(secs),
        ClockMode::WallClock => {
            let now = chrono::Utc::now().timestamp().max(0) as u64;
            if now > state.engine.now() {
                state
                    .engine
                    .set_time(now)
                    .map_err(|e| anyhow::anyhow!("{}", e))?;
            }
        }
    }

    let relock = state
        .engine
        .relock()
        .map_err(|e| anyhow::anyhow!("Relock failed: {}", e))?;
    let queue = state
        .engine
        .process_queue(&mut state.custody, max_tickets)
        .map_err(|e| anyhow::anyhow!("Queue processing failed: {}", e))?;

    if !state.engine.check_invariants() {
        log::error!("invariant check failed after keeper pass");
    }
    Ok(KeeperPass { epoch: state.engine.current_epoch(), relock, queue })
}

/// Load, run a pass, report, save
pub fn run_once(state_path: &Path, clock: ClockMode, max_tickets: usize) -> Result<KeeperPass> {
    let mut state = SimState::load(state_path)?;
    let pass = keeper_pass(&mut state, clock, max_tickets)?;
    print_events(&state.engine.drain_events());
    state.save(state_path)?;

    println!(
        "{}",
        format!("[{}] epoch {}", chrono::Local::now().format("%H:%M:%S"), pass.epoch).dimmed()
    );
    print_relock(&pass.relock);
    println!(
        "  {} Settled {} tickets, paid {}",
        "✓".green(),
        pass.queue.settled.len(),
        pass.queue.paid
    );
    print_stop(&pass.queue.stopped);
    Ok(pass)
}

pub async fn run_keeper(
    state_path: &Path,
    interval: u64,
    clock: ClockMode,
    max_tickets: usize,
    iterations: Option<u64>,
) -> Result<()> {
    println!("{}", "=== Starting Keeper ===".bright_green().bold());
    println!("{} {}", "State:".bright_cyan(), state_path.display());
    println!("{} {}s", "Interval:".bright_cyan(), interval);
    println!("{} {:?}", "Clock:".bright_cyan(), clock);
    println!("{}", "(Press Ctrl+C to stop)".dimmed());

    let mut ticker = tokio::time::interval(Duration::from_secs(interval.max(1)));
    let mut passes = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = run_once(state_path, clock, max_tickets) {
                    log::warn!("keeper pass failed: {:#}", e);
                    println!("  {} {:#}", "✗".red(), e);
                }
                passes += 1;
                if iterations.map_or(false, |n| passes >= n) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\n{}", "Keeper stopped".yellow());
                break;
            }
        }
    }
    Ok(())
}
