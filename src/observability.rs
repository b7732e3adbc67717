//! Correlation and structured logging for flash loan flows
//!
//! Every batch gets a [`CorrelationId`]; all events of that batch, from the
//! first appended instruction to finality, carry it as a `correlation_id`
//! field so a single flow can be filtered out of interleaved logs.

use serde::{Deserialize, Serialize};
use solana_sdk::{instruction::Instruction, pubkey::Pubkey, signature::Signature};
use std::time::Duration;
use uuid::Uuid;

use crate::rpc::{ConfirmationLevel, LedgerError};

/// Correlation ID for tracking one flow across components
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Structured logger for batch and submission events
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    correlation_id: CorrelationId,
}

impl StructuredLogger {
    pub fn new(correlation_id: CorrelationId) -> Self {
        Self { correlation_id }
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub fn log_instruction_appended(&self, name: &str, amount: u64, ix: &Instruction) {
        let accounts: Vec<String> = ix
            .accounts
            .iter()
            .map(|meta| {
                format!(
                    "{}{}{}",
                    meta.pubkey,
                    if meta.is_writable { ":w" } else { ":r" },
                    if meta.is_signer { ":s" } else { "" }
                )
            })
            .collect();

        tracing::info!(
            correlation_id = %self.correlation_id,
            instruction = %name,
            amount = amount,
            program = %ix.program_id,
            data = %hex::encode(&ix.data),
            "Append instruction"
        );
        tracing::debug!(
            correlation_id = %self.correlation_id,
            instruction = %name,
            accounts = ?accounts,
            "Instruction accounts"
        );
    }

    pub fn log_execute(&self, fee_payer: &Pubkey, signers: &[Pubkey], instruction_count: usize) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            fee_payer = %fee_payer,
            signers = ?signers,
            instruction_count = instruction_count,
            "Execute transaction"
        );
    }

    pub fn log_broadcast_attempt(&self, operation: &str, attempt: u32, max_attempts: u32) {
        tracing::debug!(
            correlation_id = %self.correlation_id,
            operation = %operation,
            attempt = attempt,
            max_attempts = max_attempts,
            "Broadcasting"
        );
    }

    /// `transient` separates network and throttling failures from node
    /// rejections; both are retried because the signed bytes never change.
    pub fn log_broadcast_failure(
        &self,
        operation: &str,
        attempt: u32,
        error: &LedgerError,
        backoff: Option<Duration>,
    ) {
        tracing::warn!(
            correlation_id = %self.correlation_id,
            operation = %operation,
            attempt = attempt,
            error = %error,
            transient = error.is_transient(),
            backoff_ms = backoff.map(|b| b.as_millis() as u64),
            "Broadcast failed"
        );
    }

    pub fn log_reconciled(&self, signature: &Signature, level: ConfirmationLevel) {
        tracing::warn!(
            correlation_id = %self.correlation_id,
            signature = %signature,
            level = ?level,
            "Earlier broadcast was accepted despite an error response; skipping resubmission"
        );
    }

    pub fn log_broadcast_success(&self, signature: &Signature, attempts: u32) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            signature = %signature,
            attempts = attempts,
            "Transaction broadcast"
        );
    }

    pub fn log_finalized(&self, signature: &Signature, polls: u32, latency: Duration) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            signature = %signature,
            polls = polls,
            latency_ms = latency.as_millis() as u64,
            "Transaction finalized"
        );
    }

    pub fn error(&self, message: &str) {
        tracing::error!(
            correlation_id = %self.correlation_id,
            message = %message,
            "Error"
        );
    }
}

impl Default for StructuredLogger {
    fn default() -> Self {
        Self::new(CorrelationId::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_ids_are_unique() {
        let a = CorrelationId::new();
        let b = CorrelationId::new();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_correlation_id_display() {
        let id = CorrelationId::from_string("flow-1".to_string());
        assert_eq!(id.to_string(), "flow-1");
        let logger = StructuredLogger::new(id.clone());
        assert_eq!(logger.correlation_id(), &id);
    }
}
