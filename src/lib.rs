//! Flash loan executor for Texture lending reserves
//!
//! Builds a single atomic transaction holding a `FlashBorrow` and its
//! matching `FlashRepay`, signs it once and submits it with bounded retry
//! until it is finalized.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use flash_loan_executor::{
//!     fetch_reserve, FlashBorrowAccounts, FlashLoanBatch, FlashRepayAccounts, RpcLedger,
//!     SubmissionPolicy, Submitter,
//! };
//! use solana_sdk::{pubkey::Pubkey, signature::{Keypair, Signer}};
//!
//! # async fn example(program: Pubkey, reserve_address: Pubkey, user_token: Pubkey)
//! # -> flash_loan_executor::FlashLoanResult<()> {
//! let ledger = Arc::new(RpcLedger::new("http://127.0.0.1:8899", Duration::from_secs(30)));
//! let reserve = fetch_reserve(ledger.as_ref(), &reserve_address).await?;
//! let payer = Keypair::new();
//!
//! let mut batch = FlashLoanBatch::new(program);
//! batch
//!     .append_flash_borrow(
//!         &FlashBorrowAccounts::for_reserve(reserve_address, &reserve, user_token),
//!         1_000_000,
//!     )?
//!     .append_flash_repay(
//!         &FlashRepayAccounts::for_reserve(reserve_address, &reserve, user_token, payer.pubkey()),
//!         1_000_000,
//!     )?;
//!
//! let submitter = Submitter::new(ledger, SubmissionPolicy::default());
//! let report = batch.execute(&submitter, &payer, &[]).await?;
//! println!("finalized {}", report.signature);
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod config;
pub mod errors;
pub mod fees;
pub mod layout;
pub mod metrics;
pub mod observability;
pub mod reserve;
pub mod rpc;
pub mod submission;
pub mod tx_builder;
pub mod wallet;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use config::FlashLoanConfig;
pub use errors::{FlashLoanError, FlashLoanResult, LayoutError};
pub use fees::{compute_fees, FeeQuote};
pub use layout::{LendingInstruction, Reserve};
pub use reserve::{available_liquidity, fetch_reserve, quote_flash_loan_fees};
pub use rpc::{LedgerError, LedgerReader, LedgerWriter, RpcLedger};
pub use submission::{SubmissionPolicy, SubmissionReport, Submitter};
pub use tx_builder::{FlashBorrowAccounts, FlashLoanBatch, FlashRepayAccounts};

#[cfg(test)]
mod tests {
    // Test modules live in src/tests/
    mod batch_tests;
    mod property_tests;
    mod reserve_tests;
    mod submission_tests;
}
