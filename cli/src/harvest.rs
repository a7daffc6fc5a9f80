//! Reward commands: roots, claims, sells, donations, swap venues
//!
//! Claim proofs and conversion instructions are read from JSON files.
//! Addresses and hashes are base58; call data is base58 or a `swap`
//! shorthand understood by the simulator's venues.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use lockvault::{ClaimProof, ClaimStatus, ConversionInstruction, Hash, Role, SellStatus, SwapCall};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use vault_model::merkle;

use crate::client::{encode_address, format_address, parse_cli_address, with_state, SimState};
use crate::config::parse_address;

/// One claim proof as stored on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofEntry {
    pub token: String,
    pub index: u64,
    pub amount: u128,
    #[serde(default)]
    pub merkle_path: Vec<String>,
}

/// One conversion instruction as stored on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructionEntry {
    pub sell_token: String,
    pub spender: String,
    pub swap_target: String,
    #[serde(default)]
    pub call_data: Option<String>,
    #[serde(default)]
    pub swap: Option<SwapSpec>,
}

/// Simulator venue swap into the base token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapSpec {
    pub amount_in: u128,
    pub amount_out: u128,
}

/// Distribution entry used to build a tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionEntry {
    pub index: u64,
    pub account: String,
    pub amount: u128,
}

/// Output of `harvest tree`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionTree {
    pub token: String,
    pub root: String,
    pub proofs: Vec<ProofEntry>,
}

fn parse_hash(text: &str) -> Result<Hash> {
    Ok(parse_address("hash", text)?)
}

impl ProofEntry {
    pub fn to_proof(&self) -> Result<ClaimProof> {
        Ok(ClaimProof {
            token: parse_address("token", &self.token)?,
            index: self.index,
            amount: self.amount,
            merkle_path: self
                .merkle_path
                .iter()
                .map(|h| parse_hash(h))
                .collect::<Result<Vec<_>>>()?,
        })
    }
}

impl InstructionEntry {
    pub fn to_instruction(&self, base_token: &[u8; 32]) -> Result<ConversionInstruction> {
        let sell_token = parse_address("sell_token", &self.sell_token)?;
        let call_data = match (&self.call_data, &self.swap) {
            (Some(data), None) => bs58::decode(data)
                .into_vec()
                .with_context(|| format!("Invalid call_data for {}", self.sell_token))?,
            (None, Some(swap)) => SwapCall {
                sell_token,
                amount_in: swap.amount_in,
                buy_token: *base_token,
                amount_out: swap.amount_out,
            }
            .encode()
            .to_vec(),
            (None, None) => Vec::new(),
            (Some(_), Some(_)) => bail!("Instruction for {} has both call_data and swap", self.sell_token),
        };
        Ok(ConversionInstruction {
            sell_token,
            spender: parse_address("spender", &self.spender)?,
            swap_target: parse_address("swap_target", &self.swap_target)?,
            call_data,
        })
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn set_root(state_path: &Path, caller: &str, token: &str, root: &str) -> Result<()> {
    let caller = parse_cli_address(caller)?;
    let root = parse_hash(root)?;
    with_state(state_path, |s| {
        let token = s.resolve_token(token)?;
        s.engine
            .set_distribution_root(&caller, token, root)
            .map_err(|e| anyhow::anyhow!("Root update failed: {}", e))?;
        println!("{} Root recorded for {}", "✓".green(), format_address(&token));
        Ok(())
    })
}

pub fn claim(state_path: &Path, proofs_path: &Path) -> Result<()> {
    let entries: Vec<ProofEntry> = read_json(proofs_path)?;
    let proofs = entries
        .iter()
        .map(ProofEntry::to_proof)
        .collect::<Result<Vec<_>>>()?;

    with_state(state_path, |s| {
        let statuses = s.engine.claim(&mut s.custody, &proofs);
        let claimed = statuses.iter().filter(|st| **st == ClaimStatus::Claimed).count();
        for (proof, status) in proofs.iter().zip(&statuses) {
            let mark = if *status == ClaimStatus::Claimed { "✓".green() } else { "✗".yellow() };
            println!("  {} index {} amount {}: {:?}", mark, proof.index, proof.amount, status);
        }
        println!("{} Claimed {}/{} entries", "✓".green(), claimed, statuses.len());
        Ok(())
    })
}

pub fn sell(state_path: &Path, caller: &str, instructions_path: &Path) -> Result<()> {
    let caller = parse_cli_address(caller)?;
    let entries: Vec<InstructionEntry> = read_json(instructions_path)?;

    with_state(state_path, |s| {
        let base = s.engine.params().base_token;
        let instructions = entries
            .iter()
            .map(|e| e.to_instruction(&base))
            .collect::<Result<Vec<_>>>()?;
        let report = s
            .engine
            .sell(&mut s.custody, &caller, &instructions)
            .map_err(|e| anyhow::anyhow!("Sell failed: {}", e))?;
        for (instruction, status) in instructions.iter().zip(&report.statuses) {
            let text = match status {
                SellStatus::Sold { amount_in, proceeds } => format!("sold {} for {}", amount_in, proceeds).green(),
                SellStatus::ProceedsParked { amount_in, proceeds } => {
                    format!("sold {} for {}, proceeds parked as pending", amount_in, proceeds).yellow()
                }
                SellStatus::DepositedDirectly { amount } => format!("deposited {} directly", amount).green(),
                SellStatus::NothingPending => "nothing pending".dimmed(),
                SellStatus::SwapFailed => "swap failed, pending kept".yellow(),
            };
            println!("  {} {}", format_address(&instruction.sell_token), text);
        }
        println!("{} Deposited {} base", "✓".green(), report.deposited);
        Ok(())
    })
}

pub fn donate(state_path: &Path, caller: &str, amount: u128) -> Result<()> {
    let caller = parse_cli_address(caller)?;
    with_state(state_path, |s| {
        s.engine
            .donate(&mut s.custody, &caller, amount)
            .map_err(|e| anyhow::anyhow!("Donation failed: {}", e))?;
        println!("{} Donated {}", "✓".green(), amount);
        Ok(())
    })
}

pub fn transfer_role(state_path: &Path, caller: &str, role: Role, to: &str) -> Result<()> {
    let caller = parse_cli_address(caller)?;
    let to = parse_cli_address(to)?;
    with_state(state_path, |s| {
        s.engine
            .transfer_role(&caller, role, to)
            .map_err(|e| anyhow::anyhow!("Role transfer failed: {}", e))?;
        Ok(())
    })
}

pub fn register_venue(state_path: &Path, venue: &str, spender: &str) -> Result<()> {
    let venue = parse_cli_address(venue)?;
    let spender = parse_cli_address(spender)?;
    with_state(state_path, |s| {
        s.custody.register_venue(venue, spender);
        println!("{} Venue {} pulls through {}", "✓".green(), format_address(&venue), format_address(&spender));
        Ok(())
    })
}

/// Build a distribution tree for `token` and write root + proofs
pub fn build_tree(token: &str, entries_path: &Path, out: Option<&Path>) -> Result<DistributionTree> {
    let token_addr = parse_address("token", token)?;
    let entries: Vec<DistributionEntry> = read_json(entries_path)?;
    let tree = distribution_tree(&token_addr, &entries)?;

    let text = serde_json::to_string_pretty(&tree)?;
    match out {
        Some(path) => {
            fs::write(path, &text).with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{} Root {} ({} proofs) written to {}", "✓".green(), tree.root, tree.proofs.len(), path.display());
        }
        None => println!("{}", text),
    }
    Ok(tree)
}

pub fn distribution_tree(token: &[u8; 32], entries: &[DistributionEntry]) -> Result<DistributionTree> {
    let accounts = entries
        .iter()
        .map(|e| parse_address("account", &e.account))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let leaves: Vec<Hash> = entries
        .iter()
        .zip(&accounts)
        .map(|(e, account)| merkle::claim_leaf(token, e.index, account, e.amount))
        .collect();

    let mut proofs = Vec::with_capacity(entries.len());
    for (pos, entry) in entries.iter().enumerate() {
        let path = merkle::proof_for(&leaves, pos).context("Leaf index out of range")?;
        proofs.push(ProofEntry {
            token: encode_address(token),
            index: entry.index,
            amount: entry.amount,
            merkle_path: path.iter().map(|h| bs58::encode(h).into_string()).collect(),
        });
    }
    Ok(DistributionTree {
        token: encode_address(token),
        root: bs58::encode(merkle::compute_root(&leaves)).into_string(),
        proofs,
    })
}

/// Print the pending rewards waiting for a sell
pub fn pending(state_path: &Path) -> Result<()> {
    let state = SimState::load(state_path)?;
    println!("{}", "=== Pending Rewards ===".bright_green().bold());
    let mut any = false;
    for (token, amount) in state.engine.harvester().pending_balances() {
        println!("  {} {}", format_address(token), amount);
        any = true;
    }
    if !any {
        println!("  {}", "Nothing pending".dimmed());
    }
    Ok(())
}
