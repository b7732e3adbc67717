//! Ledger collaborators
//!
//! The executor never talks to a node directly. Reads go through
//! [`LedgerReader`], submission through [`LedgerWriter`]; [`RpcLedger`]
//! implements both over the nonblocking Solana `RpcClient`, and tests plug in
//! scripted doubles.

use async_trait::async_trait;
use solana_sdk::{
    hash::Hash, pubkey::Pubkey, signature::Signature, transaction::Transaction,
};

pub mod rpc_errors;
pub mod rpc_ledger;

pub use rpc_errors::LedgerError;
pub use rpc_ledger::RpcLedger;

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Confirmation level reported for a signature, weakest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfirmationLevel {
    Processed,
    Confirmed,
    /// Irreversible
    Finalized,
}

/// Status of a signature known to the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureStatus {
    pub level: ConfirmationLevel,
    /// Program or runtime error if the transaction executed and failed
    pub err: Option<String>,
}

impl SignatureStatus {
    pub fn is_finalized(&self) -> bool {
        self.level == ConfirmationLevel::Finalized
    }
}

/// Read access to account data
#[async_trait]
pub trait LedgerReader: Send + Sync {
    /// Raw data of `address`, or `None` when the account does not exist
    ///
    /// An existing account with empty data returns `Some(vec![])`.
    async fn get_account_bytes(&self, address: &Pubkey) -> LedgerResult<Option<Vec<u8>>>;
}

/// Transaction submission and status queries
#[async_trait]
pub trait LedgerWriter: Send + Sync {
    /// Blockhash to sign new transactions against
    async fn latest_blockhash(&self) -> LedgerResult<Hash>;

    /// Send an already-signed transaction
    async fn broadcast(&self, transaction: &Transaction) -> LedgerResult<Signature>;

    /// Current status of `signature`, `None` if the ledger has not seen it
    async fn signature_status(&self, signature: &Signature)
        -> LedgerResult<Option<SignatureStatus>>;

    /// Ask a test validator or devnet faucet for lamports
    async fn request_airdrop(&self, to: &Pubkey, lamports: u64) -> LedgerResult<Signature>;
}
