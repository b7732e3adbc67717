//! flash_loan - build and submit Texture flash loans from the command line
//!
//! ## Commands
//!
//! - **quote**: fees a reserve would charge for a given amount
//! - **airdrop**: request lamports from a test validator or devnet faucet
//! - **execute**: borrow and repay in one transaction, wait until finalized
//!
//! All amounts are integer base units of the reserve's liquidity mint.

// Compiler warning configuration
#![deny(unused_mut)]
#![warn(unused_imports)]
#![warn(unused_variables)]
#![warn(unused_must_use)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use solana_sdk::{pubkey::Pubkey, signature::Signer};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use flash_loan_executor::{
    compute_fees, fetch_reserve,
    metrics::metrics,
    tx_builder::sanity_check_flash_pairs,
    wallet::WalletManager,
    FlashBorrowAccounts, FlashLoanBatch, FlashLoanConfig, FlashRepayAccounts, RpcLedger,
    SubmissionReport, Submitter,
};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Print Prometheus metrics to stdout before exiting
    #[arg(long)]
    dump_metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the fees for flashing `amount` from a reserve
    Quote {
        /// Amount in base units
        amount: u64,

        /// Reserve address (defaults to the configured reserve)
        #[arg(long)]
        reserve: Option<Pubkey>,
    },

    /// Request an airdrop and wait until it is finalized
    Airdrop {
        /// Lamports to request
        lamports: u64,

        /// Recipient (defaults to the wallet)
        #[arg(long)]
        to: Option<Pubkey>,
    },

    /// Flash borrow and repay `amount` in a single transaction
    Execute {
        /// Amount in base units
        amount: u64,

        /// Token account receiving the loan and paying it back
        #[arg(long)]
        token_account: Pubkey,

        /// Reserve address (defaults to the configured reserve)
        #[arg(long)]
        reserve: Option<Pubkey>,

        /// Keypair owning the token account (defaults to the wallet)
        #[arg(long)]
        authority_keypair: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.json_logs)?;

    info!("🚀 flash_loan v{}", env!("CARGO_PKG_VERSION"));

    info!("📋 Loading configuration from: {}", args.config);
    let config = load_config(&args.config)?;
    config.validate().context("Invalid configuration")?;

    let ledger = Arc::new(RpcLedger::new(config.rpc.url.clone(), config.rpc_timeout()));
    info!("🌐 RPC endpoint: {}", ledger.url());

    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    let outcome = run(&args.command, &config, ledger, &cancel).await;

    if args.dump_metrics {
        print!("{}", metrics().render().context("Failed to render metrics")?);
    }
    outcome
}

async fn run(
    command: &Command,
    config: &FlashLoanConfig,
    ledger: Arc<RpcLedger>,
    cancel: &CancellationToken,
) -> Result<()> {
    let submitter = Submitter::new(Arc::clone(&ledger), config.submission.to_policy());

    match command {
        Command::Quote { amount, reserve } => {
            let reserve_address = resolve_reserve(*reserve, config)?;
            let reserve = fetch_reserve(ledger.as_ref(), &reserve_address).await?;
            let quote = compute_fees(&reserve.config.fees, *amount)?;

            info!(
                "💰 Reserve {} has {} available",
                reserve_address, reserve.liquidity.available_amount
            );
            let output = serde_json::json!({
                "reserve": reserve_address.to_string(),
                "amount": amount,
                "borrow_fee": quote.borrow_fee,
                "texture_fee": quote.texture_fee,
                "repayment_amount": quote.repayment_amount(*amount),
                "available_liquidity": reserve.liquidity.available_amount,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Airdrop { lamports, to } => {
            let recipient = match to {
                Some(key) => *key,
                None => load_wallet(&config.wallet.keypair_path)?.pubkey(),
            };
            info!("🪂 Requesting {} lamports for {}", lamports, recipient);
            let report = submitter.airdrop(&recipient, *lamports, cancel).await?;
            print_report(&report);
        }

        Command::Execute {
            amount,
            token_account,
            reserve,
            authority_keypair,
        } => {
            let reserve_address = resolve_reserve(*reserve, config)?;
            let payer = load_wallet(&config.wallet.keypair_path)?;
            let authority = match authority_keypair {
                Some(path) => load_wallet(path)?,
                None => payer.clone(),
            };
            info!("💼 Fee payer: {}", payer.pubkey());

            let reserve = fetch_reserve(ledger.as_ref(), &reserve_address).await?;
            let quote = compute_fees(&reserve.config.fees, *amount)?;
            let available = reserve.liquidity.available_amount;
            if *amount > available {
                anyhow::bail!(
                    "Reserve {reserve_address} only has {available} available, requested {amount}"
                );
            }
            info!(
                "💸 Borrowing {} (fee {}, texture fee {})",
                amount, quote.borrow_fee, quote.texture_fee
            );

            let mut batch = FlashLoanBatch::new(config.program.program_id);
            batch
                .append_flash_borrow(
                    &FlashBorrowAccounts::for_reserve(reserve_address, &reserve, *token_account),
                    *amount,
                )?
                .append_flash_repay(
                    &FlashRepayAccounts::for_reserve(
                        reserve_address,
                        &reserve,
                        *token_account,
                        authority.pubkey(),
                    ),
                    *amount,
                )?;
            sanity_check_flash_pairs(batch.instructions(), batch.program_id())?;

            let report = batch
                .execute_with_cancel(&submitter, payer.keypair(), &[authority.keypair()], cancel)
                .await?;
            print_report(&report);
        }
    }

    Ok(())
}

/// Initialize logging subsystem
fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let env_filter = if verbose {
        "flash_loan_executor=debug,flash_loan=debug,info"
    } else {
        "flash_loan_executor=info,flash_loan=info,warn"
    };

    let fmt_layer = if json {
        tracing_subscriber::fmt::layer().json().with_target(true).boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(true).boxed()
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(fmt_layer)
        .init();

    Ok(())
}

/// Load configuration from file with fallback to the environment
fn load_config(path: &str) -> Result<FlashLoanConfig> {
    if Path::new(path).exists() {
        FlashLoanConfig::from_file_with_env(path)
            .with_context(|| format!("Failed to load config from {}", path))
    } else {
        warn!("Config file '{}' not found, using defaults and environment", path);
        FlashLoanConfig::from_env().context("Failed to read configuration from environment")
    }
}

fn load_wallet(path: &str) -> Result<WalletManager> {
    WalletManager::from_file(path).with_context(|| format!("Failed to load wallet from {}", path))
}

fn resolve_reserve(explicit: Option<Pubkey>, config: &FlashLoanConfig) -> Result<Pubkey> {
    explicit
        .or(config.program.reserve)
        .context("No reserve given; pass --reserve or set RESERVE")
}

fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 Received shutdown signal, abandoning confirmation wait");
            cancel.cancel();
        }
    });
}

fn print_report(report: &SubmissionReport) {
    info!(
        "✅ Finalized after {} attempt(s), {} status poll(s){}",
        report.attempts,
        report.confirmation_polls,
        if report.reconciled { ", reconciled" } else { "" }
    );
    println!("{}", report.signature);
}
