//! # sol-custodian CLI
//!
//! Operator tool for the custodian program, running against a local ledger
//! whose state is kept in a JSON file between invocations.
//!
//! ## Custody Flow
//!
//! ```text
//! ┌─────────────┐ Initialize ┌─────────────┐    Fund    ┌─────────────┐
//! │  Authority  │  ────────> │    Vault    │ <────────  │   Anyone    │
//! │  (signer)   │            │ (derived,   │            │  (system    │
//! └─────────────┘            │  off-curve) │            │  transfer)  │
//!                            └─────────────┘            └─────────────┘
//!                                   │
//!                                   │ TransferOut (trusted service signs)
//!                                   ▼
//!                            ┌─────────────┐
//!                            │  Recipient  │
//!                            └─────────────┘
//! ```
//!
//! ## Usage Examples
//!
//! ```bash
//! # Keys for the authority and the trusted service
//! sol-custodian keygen --outfile authority.json
//! sol-custodian keygen --outfile service.json
//!
//! # Fund the authority on the local ledger and create its vault
//! sol-custodian airdrop <AUTHORITY> 2000000000
//! sol-custodian --trusted-service <SERVICE> initialize --authority-keypair authority.json
//!
//! # Move funds out of the vault
//! sol-custodian --trusted-service <SERVICE> transfer --trusted-keypair service.json \
//!   --authority <AUTHORITY> --recipient <RECIPIENT> --lamports 100000000
//! ```

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use sol_custodian::config::{env as env_vars, files};
use sol_custodian::instruction::{self, system};
use sol_custodian::transaction::TransactionRecord;
use sol_custodian::utils::{address, amount, fs as fs_utils, time};
use sol_custodian::{
    CustodianError, CustodianProgram, Identity, Keypair, Ledger, MemoryLedger, ProgramConfig,
    Transaction,
};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "sol-custodian")]
#[command(about = "Program-owned SOL custody with a trusted-service transfer gate")]
#[command(version)]
struct Cli {
    /// Ledger state file (defaults to $CUSTODIAN_LEDGER or ./custodian_ledger.json)
    #[arg(long, global = true)]
    ledger: Option<PathBuf>,

    /// Custodian program id (defaults to $PROGRAM_ID or the deployed id)
    #[arg(long, global = true)]
    program_id: Option<String>,

    /// Trusted service identity (defaults to $TRUSTED_SERVICE)
    #[arg(long, global = true)]
    trusted_service: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new keypair file
    Keygen {
        /// Output path (defaults to ~/.config/sol-custodian/id.json)
        #[arg(short, long)]
        outfile: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Print the vault address and bump for an authority
    Address {
        /// Authority identity (base58)
        #[arg(short, long)]
        authority: String,
    },
    /// Credit lamports to an address on the local ledger
    Airdrop {
        /// Address to credit (base58)
        address: String,
        /// Amount in lamports
        lamports: u64,
    },
    /// Create the vault for an authority
    Initialize {
        /// Authority keypair file; the authority signs and pays rent
        #[arg(short, long)]
        authority_keypair: PathBuf,
    },
    /// Fund a vault with a plain system transfer
    Fund {
        /// Keypair file of the paying wallet
        #[arg(short, long)]
        from_keypair: PathBuf,
        /// Authority whose vault receives the funds
        #[arg(short, long)]
        authority: String,
        /// Amount in lamports
        #[arg(short, long)]
        lamports: u64,
    },
    /// Transfer lamports out of a vault (trusted service only)
    Transfer {
        /// Trusted service keypair file
        #[arg(short, long)]
        trusted_keypair: PathBuf,
        /// Authority whose vault pays
        #[arg(short, long, conflicts_with = "vault")]
        authority: Option<String>,
        /// Explicit vault address
        #[arg(long)]
        vault: Option<String>,
        /// Recipient address
        #[arg(short, long)]
        recipient: String,
        /// Amount in lamports
        #[arg(short, long)]
        lamports: u64,
    },
    /// Show a vault record and balance
    Show {
        /// Authority whose vault to show
        #[arg(short, long, conflicts_with = "vault")]
        authority: Option<String>,
        /// Explicit vault address
        #[arg(long)]
        vault: Option<String>,
    },
    /// Print the balance of any address
    Balance {
        /// Address (base58)
        address: String,
    },
    /// List processed transactions
    History {
        /// Number of most recent entries to show
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    match &cli.command {
        Commands::Keygen { outfile, force } => keygen(outfile.as_deref(), *force),
        Commands::Address { authority } => show_address(&cli, authority),
        Commands::Airdrop { address, lamports } => airdrop(&cli, address, *lamports),
        Commands::Initialize { authority_keypair } => initialize(&cli, authority_keypair),
        Commands::Fund {
            from_keypair,
            authority,
            lamports,
        } => fund(&cli, from_keypair, authority, *lamports),
        Commands::Transfer {
            trusted_keypair,
            authority,
            vault,
            recipient,
            lamports,
        } => transfer(
            &cli,
            trusted_keypair,
            authority.as_deref(),
            vault.as_deref(),
            recipient,
            *lamports,
        ),
        Commands::Show { authority, vault } => show(&cli, authority.as_deref(), vault.as_deref()),
        Commands::Balance { address } => balance(&cli, address),
        Commands::History { limit } => history(&cli, *limit),
    }
}

fn parse_identity(value: &str) -> Result<Identity> {
    Identity::from_str(value).with_context(|| format!("'{}' is not a valid address", value))
}

fn ledger_path(cli: &Cli) -> PathBuf {
    cli.ledger.clone().unwrap_or_else(|| {
        std::env::var(env_vars::LEDGER_STATE)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(files::LEDGER_STATE))
    })
}

/// Program id alone, for commands that only derive addresses.
fn program_id(cli: &Cli) -> Result<Identity> {
    dotenv::dotenv().ok();
    match &cli.program_id {
        Some(value) => parse_identity(value),
        None => match std::env::var(env_vars::PROGRAM_ID) {
            Ok(value) => parse_identity(&value),
            Err(_) => Ok(ProgramConfig::default_program_id()?),
        },
    }
}

fn program(cli: &Cli) -> Result<Arc<CustodianProgram>> {
    let config = ProgramConfig::resolve(cli.program_id.as_deref(), cli.trusted_service.as_deref())
        .context("custodian program configuration")?;
    Ok(Arc::new(CustodianProgram::new(config)))
}

fn load_ledger(path: &Path) -> Result<MemoryLedger> {
    if path.exists() {
        MemoryLedger::load_from_file(path)
            .with_context(|| format!("failed to load ledger state from {}", path.display()))
    } else {
        log::info!("No ledger state at {}, starting fresh", path.display());
        Ok(MemoryLedger::default())
    }
}

/// Load the ledger with the custodian registered.
fn open_ledger(cli: &Cli) -> Result<(MemoryLedger, Arc<CustodianProgram>)> {
    let program = program(cli)?;
    let mut ledger = load_ledger(&ledger_path(cli))?;
    ledger.register_program(program.clone());
    Ok((ledger, program))
}

/// Submit, then persist the ledger whether or not the transaction committed.
fn submit(cli: &Cli, ledger: &mut MemoryLedger, transaction: &Transaction) -> Result<TransactionRecord> {
    let result = ledger.submit(transaction);
    ledger.save_to_file(ledger_path(cli))?;
    result.map_err(|error: CustodianError| {
        let code = error.code();
        anyhow::Error::new(error).context(format!("transaction rejected (custom error {})", code))
    })
}

fn read_keypair(path: &Path) -> Result<Keypair> {
    Keypair::read_from_file(path).with_context(|| format!("failed to read keypair {}", path.display()))
}

fn resolve_vault(program: &CustodianProgram, authority: Option<&str>, vault: Option<&str>) -> Result<Identity> {
    match (authority, vault) {
        (_, Some(vault)) => parse_identity(vault),
        (Some(authority), None) => Ok(program.vault_address(&parse_identity(authority)?)?),
        (None, None) => Err(anyhow!("either --authority or --vault is required")),
    }
}

fn keygen(outfile: Option<&Path>, force: bool) -> Result<()> {
    let path = match outfile {
        Some(path) => path.to_path_buf(),
        None => fs_utils::default_keypair_path()?,
    };
    if path.exists() && !force {
        return Err(anyhow!("{} already exists (use --force to overwrite)", path.display()));
    }
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs_utils::ensure_dir_exists(parent)?;
    }

    let keypair = Keypair::generate();
    keypair.write_to_file(&path)?;

    println!("🔑 Wrote new keypair to {}", path.display());
    println!("   Identity: {}", keypair.identity());
    Ok(())
}

fn show_address(cli: &Cli, authority: &str) -> Result<()> {
    let program_id = program_id(cli)?;
    let authority = parse_identity(authority)?;
    let (vault, bump) = sol_custodian::find_vault_address(&authority, &program_id)?;

    println!("🏦 Vault for {}", authority);
    println!("   Address: {}", vault);
    println!("   Bump:    {}", bump);
    println!("   Program: {}", program_id);
    Ok(())
}

fn airdrop(cli: &Cli, target: &str, lamports: u64) -> Result<()> {
    let path = ledger_path(cli);
    let target = parse_identity(target)?;
    let mut ledger = load_ledger(&path)?;

    let balance = ledger.airdrop(&target, lamports)?;
    ledger.save_to_file(&path)?;

    println!("💧 Airdropped {} to {}", amount::format_lamports(lamports), address::format_short(&target));
    println!("   Balance: {}", amount::format_lamports(balance));
    Ok(())
}

fn initialize(cli: &Cli, authority_keypair: &Path) -> Result<()> {
    let (mut ledger, program) = open_ledger(cli)?;
    let authority = read_keypair(authority_keypair)?;

    let ix = instruction::initialize(program.program_id(), &authority.identity())?;
    let transaction = Transaction::new_signed(vec![ix], &[&authority])?;
    let record = submit(cli, &mut ledger, &transaction)?;

    let vault = program.vault_address(&authority.identity())?;
    let view = program.fetch_vault(&ledger, &vault)?;
    println!("✅ Vault initialized (slot {})", record.slot);
    println!("   Authority: {}", view.authority);
    println!("   Vault:     {}", view.address);
    println!("   Bump:      {}", view.bump);
    println!("   Balance:   {}", amount::format_lamports(view.balance));
    println!("\nSend SOL to the vault address to fund it");
    Ok(())
}

fn fund(cli: &Cli, from_keypair: &Path, authority: &str, lamports: u64) -> Result<()> {
    let path = ledger_path(cli);
    let mut ledger = load_ledger(&path)?;
    let payer = read_keypair(from_keypair)?;
    let vault = sol_custodian::find_vault_address(&parse_identity(authority)?, &program_id(cli)?)?.0;

    let transaction = Transaction::new_signed(vec![system::transfer(&payer.identity(), &vault, lamports)], &[&payer])?;
    let record = submit(cli, &mut ledger, &transaction)?;

    println!("💰 Funded vault {} with {} (slot {})", vault, amount::format_lamports(lamports), record.slot);
    println!("   Vault balance: {}", amount::format_lamports(ledger.balance(&vault)));
    Ok(())
}

fn transfer(
    cli: &Cli,
    trusted_keypair: &Path,
    authority: Option<&str>,
    vault: Option<&str>,
    recipient: &str,
    lamports: u64,
) -> Result<()> {
    let (mut ledger, program) = open_ledger(cli)?;
    let trusted = read_keypair(trusted_keypair)?;
    let vault = resolve_vault(&program, authority, vault)?;
    let recipient = parse_identity(recipient)?;

    if trusted.identity() != program.config().trusted_service {
        log::warn!(
            "Keypair {} is not the configured trusted service {}",
            trusted.identity(),
            program.config().trusted_service
        );
    }

    let ix = instruction::transfer_out(program.program_id(), &vault, &trusted.identity(), &recipient, lamports);
    let transaction = Transaction::new_signed(vec![ix], &[&trusted])?;
    let record = submit(cli, &mut ledger, &transaction)?;

    println!("📤 Transferred {} (slot {})", amount::format_lamports(lamports), record.slot);
    println!("   From: {}", vault);
    println!("   To:   {}", recipient);
    println!("   Vault balance:     {}", amount::format_lamports(ledger.balance(&vault)));
    println!("   Recipient balance: {}", amount::format_lamports(ledger.balance(&recipient)));
    Ok(())
}

fn show(cli: &Cli, authority: Option<&str>, vault: Option<&str>) -> Result<()> {
    let (ledger, program) = open_ledger(cli)?;
    let vault = resolve_vault(&program, authority, vault)?;
    let view = program.fetch_vault(&ledger, &vault)?;

    println!("🏦 Vault {}", view.address);
    println!("   Authority: {}", view.authority);
    println!("   Bump:      {}", view.bump);
    println!("   Balance:   {}", amount::format_lamports(view.balance));
    println!(
        "   Spendable: {}",
        amount::format_lamports(view.balance.saturating_sub(ledger.minimum_balance(sol_custodian::VaultAccount::LEN)))
    );
    Ok(())
}

fn balance(cli: &Cli, target: &str) -> Result<()> {
    let ledger = load_ledger(&ledger_path(cli))?;
    let target = parse_identity(target)?;
    println!("{}", amount::format_lamports(ledger.balance(&target)));
    Ok(())
}

fn history(cli: &Cli, limit: usize) -> Result<()> {
    let ledger = load_ledger(&ledger_path(cli))?;
    let records = ledger.history();
    if records.is_empty() {
        println!("No transactions yet");
        return Ok(());
    }

    println!("📜 Transaction history (latest {} of {})", limit.min(records.len()), records.len());
    for record in records.iter().rev().take(limit) {
        let status = if record.success { "✅" } else { "❌" };
        println!(
            "{} slot {:>4}  {}  {}",
            status,
            record.slot,
            time::format_unix(record.processed_at),
            address::format_with_length(&record.id, 8, 8)
        );
        if let Some(error) = &record.error {
            println!("      {}", error);
        }
    }
    Ok(())
}
