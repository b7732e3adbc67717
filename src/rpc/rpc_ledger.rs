//! `LedgerReader`/`LedgerWriter` over the nonblocking Solana RPC client

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use solana_client::{nonblocking::rpc_client::RpcClient, rpc_config::RpcSendTransactionConfig};
use solana_sdk::{
    commitment_config::{CommitmentConfig, CommitmentLevel},
    hash::Hash,
    pubkey::Pubkey,
    signature::Signature,
    transaction::Transaction,
};
use solana_transaction_status::{TransactionConfirmationStatus, TransactionStatus};
use tracing::debug;

use super::{
    ConfirmationLevel, LedgerError, LedgerReader, LedgerResult, LedgerWriter, SignatureStatus,
};

/// Ledger collaborator backed by a single RPC endpoint
///
/// Reads and preflight checks run at `finalized` commitment, so decoded
/// reserves and simulated transactions reflect irreversible state.
#[derive(Clone)]
pub struct RpcLedger {
    rpc: Arc<RpcClient>,
}

impl RpcLedger {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let rpc = RpcClient::new_with_timeout_and_commitment(
            url.into(),
            timeout,
            CommitmentConfig::finalized(),
        );
        Self { rpc: Arc::new(rpc) }
    }

    /// Get the RPC endpoint URL
    pub fn url(&self) -> String {
        self.rpc.url()
    }

    fn send_config() -> RpcSendTransactionConfig {
        RpcSendTransactionConfig {
            skip_preflight: false,
            preflight_commitment: Some(CommitmentLevel::Finalized),
            // Retries are driven by the submission protocol, not the node
            max_retries: Some(0),
            ..RpcSendTransactionConfig::default()
        }
    }
}

impl std::fmt::Debug for RpcLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcLedger").field("url", &self.rpc.url()).finish()
    }
}

fn map_status(status: &TransactionStatus) -> SignatureStatus {
    let level = match status.confirmation_status() {
        TransactionConfirmationStatus::Processed => ConfirmationLevel::Processed,
        TransactionConfirmationStatus::Confirmed => ConfirmationLevel::Confirmed,
        TransactionConfirmationStatus::Finalized => ConfirmationLevel::Finalized,
    };
    SignatureStatus {
        level,
        err: status.err.as_ref().map(|err| err.to_string()),
    }
}

#[async_trait]
impl LedgerReader for RpcLedger {
    async fn get_account_bytes(&self, address: &Pubkey) -> LedgerResult<Option<Vec<u8>>> {
        let response = self
            .rpc
            .get_account_with_commitment(address, CommitmentConfig::finalized())
            .await
            .map_err(LedgerError::from_client_error)?;

        debug!(
            address = %address,
            slot = response.context.slot,
            found = response.value.is_some(),
            "Fetched account"
        );
        Ok(response.value.map(|account| account.data))
    }
}

#[async_trait]
impl LedgerWriter for RpcLedger {
    async fn latest_blockhash(&self) -> LedgerResult<Hash> {
        self.rpc
            .get_latest_blockhash()
            .await
            .map_err(LedgerError::from_client_error)
    }

    async fn broadcast(&self, transaction: &Transaction) -> LedgerResult<Signature> {
        self.rpc
            .send_transaction_with_config(transaction, Self::send_config())
            .await
            .map_err(LedgerError::from_client_error)
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> LedgerResult<Option<SignatureStatus>> {
        let response = self
            .rpc
            .get_signature_statuses(&[*signature])
            .await
            .map_err(LedgerError::from_client_error)?;

        Ok(response
            .value
            .into_iter()
            .next()
            .flatten()
            .map(|status| map_status(&status)))
    }

    async fn request_airdrop(&self, to: &Pubkey, lamports: u64) -> LedgerResult<Signature> {
        self.rpc
            .request_airdrop(to, lamports)
            .await
            .map_err(LedgerError::from_client_error)
    }
}
