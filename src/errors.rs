//! Error types for the flash loan executor
//!
//! A single taxonomy covers the whole pipeline, from reading the reserve
//! account to waiting for finality:
//! - Layout errors: byte length or discriminant mismatch (fatal, never retried)
//! - Economic errors: amount too small to cover the flash loan fee
//! - Builder misuse: empty or sealed batches
//! - Ledger errors: transport and RPC-reported failures
//! - Submission errors: exhausted retries, abandoned confirmation, on-chain failure
//!
//! Only transient ledger errors during broadcast are retried, and only by the
//! submission protocol. Everything else propagates to the caller as-is.

use solana_sdk::{pubkey::Pubkey, signature::Signature};
use thiserror::Error;

use crate::rpc::LedgerError;

/// Convenience alias used across the crate
pub type FlashLoanResult<T> = std::result::Result<T, FlashLoanError>;

/// Failure to decode or encode one of the program's fixed layouts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// Input length differs from the layout's fixed size
    #[error("{layout} expects {expected} bytes, got {actual}")]
    LengthMismatch {
        layout: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Instruction tag does not name any variant of the program's enum
    #[error("unknown instruction discriminant {0}")]
    UnknownDiscriminant(u8),

    /// Borsh failed on an otherwise well-sized buffer
    #[error("encoding error: {0}")]
    Encoding(String),
}

impl From<std::io::Error> for LayoutError {
    fn from(err: std::io::Error) -> Self {
        Self::Encoding(err.to_string())
    }
}

/// Comprehensive error type for all flash loan operations
#[derive(Error, Debug)]
pub enum FlashLoanError {
    /// The requested account does not exist on the ledger
    ///
    /// Surfaced immediately; a missing reserve will not appear on retry.
    #[error("account not found: {address}")]
    AccountNotFound { address: Pubkey },

    /// Account or instruction bytes do not match the program layout
    ///
    /// This indicates a versioning mismatch between this crate and the
    /// deployed program.
    #[error("layout error: {0}")]
    Layout(#[from] LayoutError),

    /// The borrow fee would consume the whole borrowed amount
    ///
    /// The caller must choose a larger amount.
    #[error(
        "borrow amount {amount} is too small to receive liquidity after fees (fee {borrow_fee})"
    )]
    FeeTooSmall { amount: u64, borrow_fee: u64 },

    /// `execute` or `seal` was called without any appended instruction
    #[error("batch has no instructions")]
    EmptyBatch,

    /// An instruction was appended after the batch was sealed
    #[error("batch is sealed; reset it before appending")]
    BatchSealed,

    /// Flash borrows and repays are not paired within the batch
    #[error("invalid instruction order: {0}")]
    InvalidInstructionOrder(String),

    /// No bump in 0..=255 produced an off-curve lending market authority
    #[error("no valid authority bump for lending market {lending_market}")]
    AuthorityDerivation { lending_market: Pubkey },

    /// Signing the transaction failed (missing or mismatched signer)
    #[error("signing failed: {0}")]
    Signing(String),

    /// Ledger interaction failed outside the retried broadcast step
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// All broadcast attempts failed
    #[error("submission exhausted after {attempts} attempts: {last_error}")]
    SubmissionExhausted { attempts: u32, last_error: String },

    /// Confirmation polling was cancelled or timed out
    ///
    /// The transaction may still land; the caller must verify independently
    /// whether funds moved.
    #[error("confirmation abandoned for {}", describe_signature(.signature))]
    ConfirmationAbandoned { signature: Option<Signature> },

    /// The transaction reached finality but the program rejected it
    #[error("transaction {signature} failed on-chain: {reason}")]
    TransactionFailed { signature: Signature, reason: String },

    /// Invalid configuration values
    #[error("configuration error: {0}")]
    Configuration(String),
}

fn describe_signature(signature: &Option<Signature>) -> String {
    match signature {
        Some(signature) => signature.to_string(),
        None => "unbroadcast transaction".to_string(),
    }
}

impl FlashLoanError {
    /// Check if this error is potentially retryable
    ///
    /// Only transient ledger failures qualify. Retrying a malformed or
    /// economically invalid transaction cannot succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Ledger(err) => err.is_transient(),

            Self::AccountNotFound { .. } => false,
            Self::Layout(_) => false,
            Self::FeeTooSmall { .. } => false,
            Self::EmptyBatch => false,
            Self::BatchSealed => false,
            Self::InvalidInstructionOrder(_) => false,
            Self::AuthorityDerivation { .. } => false,
            Self::Signing(_) => false,
            Self::SubmissionExhausted { .. } => false,
            Self::ConfirmationAbandoned { .. } => false,
            Self::TransactionFailed { .. } => false,
            Self::Configuration(_) => false,
        }
    }

    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            Self::AccountNotFound { .. } => "account",
            Self::Layout(_) => "layout",
            Self::FeeTooSmall { .. } => "fee",
            Self::EmptyBatch | Self::BatchSealed => "builder",
            Self::InvalidInstructionOrder(_) => "validation",
            Self::AuthorityDerivation { .. } => "derivation",
            Self::Signing(_) => "signing",
            Self::Ledger(_) => "ledger",
            Self::SubmissionExhausted { .. } => "submission",
            Self::ConfirmationAbandoned { .. } => "confirmation",
            Self::TransactionFailed { .. } => "execution",
            Self::Configuration(_) => "config",
        }
    }
}
