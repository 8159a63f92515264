//! Creditor Bank - Main Entry Point
//!
//! Operates the creditor tables from the command line against a SQLite
//! store, with balances mirrored from a chain node.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use creditor_bank::bank::{Bank, BankParams, PoolOutcome, RotationReport};
use creditor_bank::chain::{
    snapshot_ledger, AccountName, Asset, ChainRpcClient, DeferredQueue, InMemoryLedger,
    SystemClock,
};
use creditor_bank::config::Config;
use creditor_bank::persistence::{BankSnapshot, StateStore};
use creditor_bank::tables::Pool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

type LocalBank = Bank<InMemoryLedger, DeferredQueue>;

/// Creditor Bank CLI
#[derive(Parser)]
#[command(name = "creditor-bank")]
#[command(version, about = "Creditor pool matching and rotation for resource lending")]
struct Cli {
    /// Path to SQLite database (overrides storage.db_path)
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace stored tables with a JSON snapshot
    Import {
        /// Path to snapshot file
        #[arg(short, long)]
        file: String,
    },

    /// Show creditor pools and plans
    Status {
        /// Show every creditor, not only active ones
        #[arg(short, long)]
        verbose: bool,
    },

    /// Make a creditor the active one of its pool
    Activate {
        account: String,
    },

    /// Run one rotation heartbeat
    Rotate,

    /// Find paid creditors able to serve an amount
    Match {
        /// Amount, e.g. "100.0000 EOS"
        amount: String,

        /// Search for a bundle instead of a single creditor
        #[arg(short, long)]
        bundle: bool,
    },

    /// Plan an order: split, price and income per creditor
    Quote {
        /// Stake to delegate, e.g. "100.0000 EOS"
        amount: String,

        /// Order price, e.g. "0.5000 EOS"
        price: String,

        /// Paying account
        #[arg(long)]
        sender: Option<String>,

        /// Transfer memo naming the beneficiary
        #[arg(long, default_value = "")]
        memo: String,
    },

    /// Refresh mirrored balances from the chain node
    Sync,

    /// Rotate on a fixed interval until interrupted
    Run {
        /// Sync balances before every rotation
        #[arg(long)]
        sync: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging()?;

    let mut config = Config::load()?;
    if let Some(db) = cli.db {
        config.storage.db_path = db;
    }
    config.validate()?;

    let store = StateStore::new(&config.storage.db_path)?;

    match cli.command {
        Commands::Import { file } => {
            let snapshot = BankSnapshot::from_file(&file)?;
            let (state, ledger) = store.import(snapshot)?;
            println!(
                "Imported {} creditors, {} plans, {} balances from {}",
                state.creditors.len(),
                state.plans.len(),
                ledger.balances().count(),
                file
            );
            Ok(())
        }
        Commands::Status { verbose } => show_status(&config, &store, verbose),
        Commands::Activate { account } => {
            let account: AccountName = account.parse()?;
            with_bank(&config, &store, |bank| {
                bank.activate(&account)?;
                println!("Activated {}", account);
                Ok(())
            })
        }
        Commands::Rotate => with_bank(&config, &store, |bank| {
            let report = bank.rotate()?;
            print_report(&report);
            Ok(())
        }),
        Commands::Match { amount, bundle } => {
            let amount: Asset = amount.parse()?;
            with_bank(&config, &store, |bank| {
                if bundle {
                    let entries = bank.find_bundle(&amount)?;
                    println!("{}", serde_json::to_string_pretty(&entries)?);
                } else {
                    match bank.find_single(&amount)? {
                        Some(creditor) => println!("{}", creditor),
                        None => println!("No single creditor can serve {}", amount),
                    }
                }
                Ok(())
            })
        }
        Commands::Quote {
            amount,
            price,
            sender,
            memo,
        } => {
            let amount: Asset = amount.parse()?;
            let price: Asset = price.parse()?;
            with_bank(&config, &store, |bank| {
                if let Some(sender) = &sender {
                    let sender: AccountName = sender.parse()?;
                    let beneficiary = bank.resolve_beneficiary(&memo, &sender)?;
                    println!("Beneficiary: {}", beneficiary);
                }
                let plan = bank.plan_order(&amount, &price)?;
                println!("{}", serde_json::to_string_pretty(&plan)?);
                Ok(())
            })
        }
        Commands::Sync => {
            sync_ledger(&config, &store).await?;
            Ok(())
        }
        Commands::Run { sync } => run_rotation_loop(&config, &store, sync).await,
    }
}

/// Load tables, run `f` against a local bank, then persist the result.
fn with_bank<F>(config: &Config, store: &StateStore, f: F) -> Result<()>
where
    F: FnOnce(&mut LocalBank) -> Result<()>,
{
    let params = BankParams::from_config(&config.bank)?;
    let state = store.load_state()?;
    let ledger = store.load_ledger()?;
    let mut bank = Bank::new(
        params,
        state,
        ledger,
        DeferredQueue::new(),
        Arc::new(SystemClock),
    );

    f(&mut bank)?;

    flush_notifications(&mut bank);
    store.save_state(bank.state())?;
    Ok(())
}

/// Deferred notifications have no chain to land on locally; log them instead.
fn flush_notifications(bank: &mut LocalBank) {
    for notification in bank.scheduler_mut().drain() {
        info!(
            sender_id = notification.sender_id,
            creditor = %notification.notice.account,
            pool = %notification.notice.pool,
            actor = %notification.authorization.actor,
            permission = %notification.authorization.permission,
            "Rotation notification due"
        );
    }
}

async fn sync_ledger(config: &Config, store: &StateStore) -> Result<InMemoryLedger> {
    let params = BankParams::from_config(&config.bank)?;
    let client = ChainRpcClient::new(
        &config.chain.rpc_url,
        &config.chain.token_contract,
        Duration::from_secs(config.chain.timeout_secs),
    )?;

    let state = store.load_state()?;
    let accounts: Vec<AccountName> = state
        .creditors
        .iter()
        .map(|record| record.account.clone())
        .collect();

    let mut ledger = snapshot_ledger(&client, &accounts, &params.system_symbol)
        .await
        .context("Failed to sync balances")?;
    for account in store.load_ledger()?.accounts() {
        ledger.add_account(account.clone());
    }

    store.save_ledger(&ledger)?;
    info!(accounts = accounts.len(), "Ledger synced");
    Ok(ledger)
}

async fn run_rotation_loop(config: &Config, store: &StateStore, sync: bool) -> Result<()> {
    info!(
        "Creditor Bank v{} - rotating every {}s",
        env!("CARGO_PKG_VERSION"),
        config.rotation.interval_secs
    );

    let mut interval = tokio::time::interval(Duration::from_secs(config.rotation.interval_secs));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            _ = interval.tick() => {
                if sync {
                    if let Err(e) = sync_ledger(config, store).await {
                        warn!("Balance sync failed, rotating on stale balances: {:#}", e);
                    }
                }

                let result = with_bank(config, store, |bank| {
                    let report = bank.rotate()?;
                    if report.rotated() {
                        info!(?report, "Rotation applied");
                    }
                    Ok(())
                });
                if let Err(e) = result {
                    error!("Rotation failed: {:#}", e);
                }
            }
        }
    }

    Ok(())
}

fn print_report(report: &RotationReport) {
    for (pool, outcome) in [(Pool::Free, &report.free), (Pool::Paid, &report.paid)] {
        match outcome {
            PoolOutcome::Healthy { active } => println!("{:<5} healthy, active {}", pool.as_str(), active),
            PoolOutcome::Rotated { from, to } => match from {
                Some(from) => println!("{:<5} rotated {} -> {}", pool.as_str(), from, to),
                None => println!("{:<5} rotated -> {}", pool.as_str(), to),
            },
            PoolOutcome::Starved { active } => match active {
                Some(active) => println!("{:<5} STARVED, keeping {}", pool.as_str(), active),
                None => println!("{:<5} STARVED, no active creditor", pool.as_str()),
            },
        }
    }
}

fn show_status(config: &Config, store: &StateStore, verbose: bool) -> Result<()> {
    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║              CREDITOR BANK STATUS                          ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    if !store.has_state()? {
        println!("\nNo creditors stored in {}.", config.storage.db_path);
        println!("   Seed the database with `import --file <snapshot.json>`.");
        return Ok(());
    }

    let state = store.load_state()?;

    for pool in [Pool::Free, Pool::Paid] {
        let members: Vec<_> = state
            .creditors
            .iter()
            .filter(|record| record.pool == pool)
            .collect();
        let active = state
            .creditors
            .active_creditor(pool)
            .map(|account| account.to_string())
            .unwrap_or_else(|| "none".to_string());

        println!("\n{} pool", pool);
        println!("   ├─ Creditors:  {}", members.len());
        println!("   └─ Active:     {}", active);

        if verbose {
            for record in members {
                println!(
                    "       {:<12} {:>20} {} {}{}",
                    record.account.as_str(),
                    record.balance.to_string(),
                    record.updated_at.format("%Y-%m-%d %H:%M:%S UTC"),
                    if record.is_active { "active" } else { "" },
                    if state.safe_creditors.is_safe_creditor(&record.account) {
                        " safe"
                    } else {
                        ""
                    },
                );
            }
        }
    }

    println!("\nPlans");
    match state.plans.min_paid_stake() {
        Ok(stake) => println!("   └─ Paid threshold: {}", stake),
        Err(e) => println!("   └─ {}", e),
    }

    Ok(())
}

/// Initialize logging to stdout and an hourly rolling file.
fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::hourly("logs", "creditor-bank.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Keep the guard alive for the program duration
    Box::leak(Box::new(guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("creditor_bank=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    Ok(())
}
