//! Simulator state persistence and output helpers

use anyhow::{Context, Result};
use colored::Colorize;
use lockvault::{Address, Event, InMemoryCustody, VaultEngine, PRICE_SCALE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::config::parse_address;

/// Everything the simulator keeps between invocations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimState {
    pub engine: VaultEngine,
    pub custody: InMemoryCustody,
}

impl SimState {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).with_context(|| {
            format!("Failed to read state file: {} (run `lockvault init` first)", path.display())
        })?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))
    }

    /// Write atomically: serialize to a sibling temp file, then rename
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).context("Failed to serialize state")?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, text).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, path).with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }

    /// Token argument: `base` or a base58 address
    pub fn resolve_token(&self, text: &str) -> Result<Address> {
        if text.eq_ignore_ascii_case("base") {
            return Ok(self.engine.params().base_token);
        }
        Ok(parse_address("token", text)?)
    }
}

/// Load, apply `f`, print drained events, save
pub fn with_state<T>(path: &Path, f: impl FnOnce(&mut SimState) -> Result<T>) -> Result<T> {
    let mut state = SimState::load(path)?;
    let out = f(&mut state)?;
    print_events(&state.engine.drain_events());
    state.save(path)?;
    Ok(out)
}

pub fn parse_cli_address(text: &str) -> Result<Address> {
    Ok(parse_address("address", text)?)
}

pub fn encode_address(addr: &Address) -> String {
    bs58::encode(addr).into_string()
}

/// Shortened base58 address
pub fn format_address(addr: &Address) -> String {
    let s = encode_address(addr);
    if s.len() <= 12 {
        return s.bright_yellow().to_string();
    }
    format!("{}...{}", &s[..6], &s[s.len() - 4..]).bright_yellow().to_string()
}

/// Render a PRICE_SCALE fixed-point amount as a decimal
pub fn format_scaled(value: u128) -> String {
    format!("{}.{:09}", value / PRICE_SCALE, value % PRICE_SCALE)
}

pub fn format_time(ts: u64) -> String {
    chrono::DateTime::from_timestamp(ts as i64, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}

pub fn print_events(events: &[Event]) {
    for event in events {
        println!("  {} {}", "•".bright_blue(), describe_event(event));
    }
}

pub fn describe_event(event: &Event) -> String {
    match event {
        Event::SharesMinted { owner, base_amount, shares } => {
            format!("minted {} shares for {} base to {}", shares, base_amount, format_address(owner))
        }
        Event::SharesBurned { owner, shares, value } => {
            format!("burned {} shares of {} (value {})", shares, format_address(owner), value)
        }
        Event::WithdrawRequested { ticket, value, epoch_eligible, .. } => {
            format!("ticket #{} queued for {} (eligible at epoch {})", ticket, value, epoch_eligible)
        }
        Event::WithdrawSettled { ticket, owner, value } => {
            format!("ticket #{} paid {} to {}", ticket, value, format_address(owner))
        }
        Event::RewardClaimed { token, index, amount } => {
            format!("claimed {} of {} (index {})", amount, format_address(token), index)
        }
        Event::RewardSold { token, amount_in, proceeds } => {
            format!("sold {} of {} for {} base", amount_in, format_address(token), proceeds)
        }
        Event::ValueDeposited { amount, price } => {
            format!("deposited {} value, price now {}", amount, format_scaled(*price))
        }
        Event::Relocked { epoch, matured, reserved, relocked } => format!(
            "relock at epoch {}: matured {}, reserved {}, relocked {}",
            epoch, matured, reserved, relocked
        ),
        Event::RootUpdated { token, .. } => format!("distribution root updated for {}", format_address(token)),
        Event::RoleTransferred { role, to, .. } => format!("{:?} role moved to {}", role, format_address(to)),
    }
}
