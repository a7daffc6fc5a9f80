//! Lockvault CLI - epoch-locked yield vault simulator
//!
//! Drives a persistent vault engine over an in-memory custody ledger:
//! deposits, queued withdrawals, lock maturity, reward claims and sells.

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use lockvault::Role;
use std::path::PathBuf;

mod client;
mod config;
mod harvest;
mod keeper;
mod vault;

use config::VaultConfig;
use keeper::ClockMode;

#[derive(Parser)]
#[command(name = "lockvault")]
#[command(about = "Lockvault CLI - simulate an epoch-locked yield vault", long_about = None)]
#[command(version)]
struct Cli {
    /// Vault configuration file
    #[arg(short, long, default_value = "lockvault.toml")]
    config: PathBuf,

    /// Simulator state file
    #[arg(short, long, default_value = "lockvault-state.json")]
    state: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a fresh state file from the configuration
    Init {
        /// Starting timestamp (defaults to now)
        #[arg(long)]
        now: Option<u64>,

        /// Overwrite an existing state file
        #[arg(long)]
        force: bool,
    },

    /// Show vault status
    Status {
        /// Include lock schedule, pending rewards and roles
        #[arg(short, long)]
        detailed: bool,
    },

    /// Credit tokens to an account (simulator faucet)
    Fund {
        /// Recipient address
        to: String,

        /// Amount in token units
        amount: u128,

        /// Token address or `base`
        #[arg(short, long, default_value = "base")]
        token: String,
    },

    /// Deposit base tokens and mint shares
    Mint {
        /// Depositor address
        owner: String,

        /// Base amount
        amount: u128,
    },

    /// Burn shares and queue a withdrawal ticket
    Withdraw {
        /// Share owner address
        owner: String,

        /// Shares to burn
        shares: Option<u128>,

        /// Burn the whole balance
        #[arg(long)]
        all: bool,
    },

    /// Process matured locks
    Relock,

    /// Settle eligible withdrawal tickets
    Process {
        /// Maximum tickets to settle
        #[arg(short, long, default_value = "32")]
        max: usize,
    },

    /// Simulator clock
    Time {
        #[command(subcommand)]
        command: TimeCommands,
    },

    /// List withdrawal tickets
    Tickets {
        /// Only show tickets for this owner
        #[arg(short, long)]
        owner: Option<String>,
    },

    /// Show an account's base balance and shares
    Balance {
        /// Account address
        who: String,
    },

    /// Reward harvesting
    Harvest {
        #[command(subcommand)]
        command: HarvestCommands,
    },

    /// Swap venues
    Venue {
        #[command(subcommand)]
        command: VenueCommands,
    },

    /// Role management
    Role {
        #[command(subcommand)]
        command: RoleCommands,
    },

    /// Keeper operations
    Keeper {
        #[command(subcommand)]
        command: KeeperCommands,
    },

    /// Configuration helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum TimeCommands {
    /// Move the clock forward
    Advance {
        /// Seconds to advance
        #[arg(long)]
        secs: Option<u64>,

        /// Whole epochs to advance
        #[arg(long)]
        epochs: Option<u64>,
    },

    /// Set the clock to an absolute timestamp
    Set {
        /// Unix timestamp
        timestamp: u64,
    },
}

#[derive(Subcommand)]
enum HarvestCommands {
    /// Record a distribution root
    SetRoot {
        /// Caller address (root updater)
        caller: String,

        /// Reward token address or `base`
        token: String,

        /// Base58 root hash
        root: String,
    },

    /// Claim rewards with proofs from a JSON file
    Claim {
        /// Proofs file
        proofs: PathBuf,
    },

    /// Convert pending rewards with instructions from a JSON file
    Sell {
        /// Caller address (harvester)
        caller: String,

        /// Instructions file
        instructions: PathBuf,
    },

    /// Deposit base directly into the share pool
    Donate {
        /// Caller address (harvester)
        caller: String,

        /// Base amount
        amount: u128,
    },

    /// Show claimed rewards awaiting a sell
    Pending,

    /// Build a distribution root and proofs
    Tree {
        /// Reward token address
        token: String,

        /// Distribution entries file
        entries: PathBuf,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum VenueCommands {
    /// Register a swap venue and the account it pulls through
    Register {
        /// Venue address
        venue: String,

        /// Spender address the venue pulls through
        spender: String,
    },
}

#[derive(Subcommand)]
enum RoleCommands {
    /// Hand a role to a new holder
    Transfer {
        /// Current holder
        caller: String,

        /// Role to transfer
        #[arg(value_enum)]
        role: RoleArg,

        /// New holder
        to: String,
    },
}

#[derive(Subcommand)]
enum KeeperCommands {
    /// Start keeper loop
    Run {
        /// Pass interval in seconds
        #[arg(short, long, default_value = "5")]
        interval: u64,

        /// Seconds to advance the simulated clock per pass
        #[arg(long, conflicts_with = "wall_clock")]
        advance: Option<u64>,

        /// Follow the host clock
        #[arg(long)]
        wall_clock: bool,

        /// Stop after this many passes
        #[arg(long)]
        iterations: Option<u64>,

        /// Maximum tickets settled per pass
        #[arg(long, default_value = "32")]
        max: usize,
    },

    /// Run a single pass
    Once {
        /// Seconds to advance the simulated clock first
        #[arg(long)]
        advance: Option<u64>,

        /// Maximum tickets to settle
        #[arg(long, default_value = "32")]
        max: usize,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print an example configuration
    Example,
}

#[derive(Clone, Copy, ValueEnum)]
enum RoleArg {
    Harvester,
    RootUpdater,
}

impl From<RoleArg> for Role {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::Harvester => Role::Harvester,
            RoleArg::RootUpdater => Role::RootUpdater,
        }
    }
}

fn clock_mode(advance: Option<u64>, wall_clock: bool) -> ClockMode {
    match (advance, wall_clock) {
        (_, true) => ClockMode::WallClock,
        (Some(secs), false) => ClockMode::Advance(secs),
        (None, false) => ClockMode::Hold,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let state = cli.state.as_path();

    if cli.verbose {
        println!("{} {}", "Config:".bright_cyan(), cli.config.display());
        println!("{} {}", "State:".bright_cyan(), state.display());
    }

    match cli.command {
        Commands::Init { now, force } => vault::init(&cli.config, state, now, force)?,
        Commands::Status { detailed } => vault::status(state, detailed)?,
        Commands::Fund { to, amount, token } => vault::fund(state, &to, &token, amount)?,
        Commands::Mint { owner, amount } => vault::mint(state, &owner, amount)?,
        Commands::Withdraw { owner, shares, all } => vault::withdraw(state, &owner, shares, all)?,
        Commands::Relock => vault::relock(state)?,
        Commands::Process { max } => vault::process(state, max)?,
        Commands::Time { command } => match command {
            TimeCommands::Advance { secs, epochs } => vault::advance_time(state, secs, epochs)?,
            TimeCommands::Set { timestamp } => vault::set_time(state, timestamp)?,
        },
        Commands::Tickets { owner } => vault::tickets(state, owner.as_deref())?,
        Commands::Balance { who } => vault::balance(state, &who)?,
        Commands::Harvest { command } => match command {
            HarvestCommands::SetRoot { caller, token, root } => harvest::set_root(state, &caller, &token, &root)?,
            HarvestCommands::Claim { proofs } => harvest::claim(state, &proofs)?,
            HarvestCommands::Sell { caller, instructions } => harvest::sell(state, &caller, &instructions)?,
            HarvestCommands::Donate { caller, amount } => harvest::donate(state, &caller, amount)?,
            HarvestCommands::Pending => harvest::pending(state)?,
            HarvestCommands::Tree { token, entries, out } => {
                harvest::build_tree(&token, &entries, out.as_deref())?;
            }
        },
        Commands::Venue { command } => match command {
            VenueCommands::Register { venue, spender } => harvest::register_venue(state, &venue, &spender)?,
        },
        Commands::Role { command } => match command {
            RoleCommands::Transfer { caller, role, to } => harvest::transfer_role(state, &caller, role.into(), &to)?,
        },
        Commands::Keeper { command } => match command {
            KeeperCommands::Run { interval, advance, wall_clock, iterations, max } => {
                keeper::run_keeper(state, interval, clock_mode(advance, wall_clock), max, iterations).await?;
            }
            KeeperCommands::Once { advance, max } => {
                keeper::run_once(state, clock_mode(advance, false), max)?;
            }
        },
        Commands::Config { command } => match command {
            ConfigCommands::Example => print!("{}", VaultConfig::example().to_toml()?),
        },
    }

    Ok(())
}
