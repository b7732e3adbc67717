//! Broadcast with bounded retry, then wait for finality
//!
//! ## Protocol
//!
//! 1. Broadcast the signed transaction. On any error, wait
//!    `backoff_after(n)` and try again, up to `max_attempts` in total.
//! 2. Before a retry, ask the ledger whether the transaction's signature is
//!    already known. An error response does not prove the node dropped the
//!    transaction, and a second copy of a funds-moving transaction must never
//!    be sent blindly. A known signature skips straight to step 3.
//! 3. Poll the signature status every `poll_interval` until it reaches
//!    `Finalized`. Only then is success reported.
//!
//! The transaction is signed once by the caller and never rebuilt here; every
//! retry resends the exact same bytes. Cancellation (or the optional confirm
//! timeout) aborts waiting without resubmitting.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use solana_sdk::{pubkey::Pubkey, signature::Signature, transaction::Transaction};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::errors::{FlashLoanError, FlashLoanResult};
use crate::metrics::metrics;
use crate::observability::{CorrelationId, StructuredLogger};
use crate::rpc::{LedgerResult, LedgerWriter};

pub mod policy;

pub use policy::SubmissionPolicy;

/// What happened during one submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReport {
    pub signature: Signature,
    /// Broadcasts performed, including the successful one
    pub attempts: u32,
    /// Waits taken between attempts, in order
    pub backoffs: Vec<Duration>,
    /// A failed broadcast turned out to have landed
    pub reconciled: bool,
    /// Status queries until finality
    pub confirmation_polls: u32,
}

struct BroadcastOutcome {
    signature: Signature,
    attempts: u32,
    backoffs: Vec<Duration>,
    reconciled: bool,
}

/// Submits transactions through a [`LedgerWriter`] under a [`SubmissionPolicy`]
pub struct Submitter<W: ?Sized> {
    ledger: Arc<W>,
    policy: SubmissionPolicy,
}

impl<W: ?Sized> Clone for Submitter<W> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            policy: self.policy.clone(),
        }
    }
}

impl<W: LedgerWriter + ?Sized> Submitter<W> {
    pub fn new(ledger: Arc<W>, policy: SubmissionPolicy) -> Self {
        Self { ledger, policy }
    }

    pub fn ledger(&self) -> &W {
        &self.ledger
    }

    pub fn policy(&self) -> &SubmissionPolicy {
        &self.policy
    }

    /// Broadcast a signed transaction and wait until it is finalized
    pub async fn submit(
        &self,
        transaction: &Transaction,
        cancel: &CancellationToken,
    ) -> FlashLoanResult<SubmissionReport> {
        self.submit_correlated(transaction, &CorrelationId::new(), cancel)
            .await
    }

    /// Same as [`Submitter::submit`], logging under an existing correlation ID
    pub async fn submit_correlated(
        &self,
        transaction: &Transaction,
        correlation_id: &CorrelationId,
        cancel: &CancellationToken,
    ) -> FlashLoanResult<SubmissionReport> {
        let logger = StructuredLogger::new(correlation_id.clone());
        // The fee payer's signature identifies the transaction before it is sent
        let known_signature = transaction.signatures.first().copied();

        let outcome = self
            .broadcast_with_retry("send_transaction", known_signature, cancel, &logger, || {
                self.ledger.broadcast(transaction)
            })
            .await?;

        self.finish(outcome, cancel, &logger).await
    }

    /// Request an airdrop and wait until it is finalized
    pub async fn airdrop(
        &self,
        to: &Pubkey,
        lamports: u64,
        cancel: &CancellationToken,
    ) -> FlashLoanResult<SubmissionReport> {
        let logger = StructuredLogger::default();
        tracing::info!(
            correlation_id = %logger.correlation_id(),
            to = %to,
            lamports = lamports,
            "Requesting airdrop"
        );

        let outcome = self
            .broadcast_with_retry("request_airdrop", None, cancel, &logger, || {
                self.ledger.request_airdrop(to, lamports)
            })
            .await?;

        self.finish(outcome, cancel, &logger).await
    }

    async fn finish(
        &self,
        outcome: BroadcastOutcome,
        cancel: &CancellationToken,
        logger: &StructuredLogger,
    ) -> FlashLoanResult<SubmissionReport> {
        let confirmation_polls = self
            .await_finalized(&outcome.signature, cancel, logger)
            .await?;

        Ok(SubmissionReport {
            signature: outcome.signature,
            attempts: outcome.attempts,
            backoffs: outcome.backoffs,
            reconciled: outcome.reconciled,
            confirmation_polls,
        })
    }

    async fn broadcast_with_retry<F, Fut>(
        &self,
        operation: &str,
        known_signature: Option<Signature>,
        cancel: &CancellationToken,
        logger: &StructuredLogger,
        mut send: F,
    ) -> FlashLoanResult<BroadcastOutcome>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = LedgerResult<Signature>>,
    {
        let max_attempts = self.policy.max_attempts;
        let mut backoffs = Vec::new();
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            if attempt > 1 && self.policy.reconcile_before_retry {
                if let Some(signature) = known_signature {
                    if let Some(outcome) = self
                        .reconcile(signature, attempt - 1, &backoffs, logger)
                        .await
                    {
                        return Ok(outcome);
                    }
                }
            }

            logger.log_broadcast_attempt(operation, attempt, max_attempts);
            metrics().broadcast_attempts.inc();

            match send().await {
                Ok(signature) => {
                    logger.log_broadcast_success(&signature, attempt);
                    return Ok(BroadcastOutcome {
                        signature,
                        attempts: attempt,
                        backoffs,
                        reconciled: false,
                    });
                }
                Err(err) => {
                    metrics().broadcast_failures.inc();

                    // No wait once the budget is spent
                    let backoff =
                        (attempt < max_attempts).then(|| self.policy.backoff_after(attempt));
                    logger.log_broadcast_failure(operation, attempt, &err, backoff);
                    last_error = Some(err);

                    if let Some(backoff) = backoff {
                        if !pause(backoff, cancel).await {
                            metrics().confirmations_abandoned.inc();
                            return Err(FlashLoanError::ConfirmationAbandoned {
                                signature: known_signature,
                            });
                        }
                        backoffs.push(backoff);
                    }
                }
            }
        }

        // The final attempt may have landed despite its error response
        if self.policy.reconcile_before_retry {
            if let Some(signature) = known_signature {
                if let Some(outcome) = self
                    .reconcile(signature, max_attempts, &backoffs, logger)
                    .await
                {
                    return Ok(outcome);
                }
            }
        }

        metrics().submissions_exhausted.inc();
        let last_error = last_error
            .map(|err| err.to_string())
            .unwrap_or_else(|| "no attempt was made".to_string());
        logger.error(&format!(
            "{operation} failed after {max_attempts} attempts: {last_error}"
        ));
        Err(FlashLoanError::SubmissionExhausted {
            attempts: max_attempts,
            last_error,
        })
    }

    // Some(outcome) when the ledger already knows the signature
    async fn reconcile(
        &self,
        signature: Signature,
        attempts: u32,
        backoffs: &[Duration],
        logger: &StructuredLogger,
    ) -> Option<BroadcastOutcome> {
        match self.ledger.signature_status(&signature).await {
            Ok(Some(status)) => {
                metrics().reconciled_broadcasts.inc();
                logger.log_reconciled(&signature, status.level);
                Some(BroadcastOutcome {
                    signature,
                    attempts,
                    backoffs: backoffs.to_vec(),
                    reconciled: true,
                })
            }
            Ok(None) => None,
            Err(err) => {
                // Resubmitting identical bytes cannot double-spend
                tracing::debug!(
                    correlation_id = %logger.correlation_id(),
                    signature = %signature,
                    error = %err,
                    "Status check for reconciliation failed"
                );
                None
            }
        }
    }

    async fn await_finalized(
        &self,
        signature: &Signature,
        cancel: &CancellationToken,
        logger: &StructuredLogger,
    ) -> FlashLoanResult<u32> {
        let started = Instant::now();
        let deadline = self.policy.confirm_timeout.map(|timeout| started + timeout);
        let mut polls = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(abandon(*signature));
            }

            polls += 1;
            match self.ledger.signature_status(signature).await {
                Ok(Some(status)) if status.is_finalized() => {
                    if let Some(reason) = status.err {
                        metrics().transactions_failed.inc();
                        logger.error(&format!("transaction {signature} failed: {reason}"));
                        return Err(FlashLoanError::TransactionFailed {
                            signature: *signature,
                            reason,
                        });
                    }
                    let latency = started.elapsed();
                    metrics().confirmations_finalized.inc();
                    metrics().confirmation_latency.observe(latency.as_secs_f64());
                    logger.log_finalized(signature, polls, latency);
                    return Ok(polls);
                }
                Ok(Some(status)) => {
                    tracing::debug!(
                        correlation_id = %logger.correlation_id(),
                        signature = %signature,
                        level = ?status.level,
                        "Waiting for finalization"
                    );
                }
                Ok(None) => {
                    tracing::debug!(
                        correlation_id = %logger.correlation_id(),
                        signature = %signature,
                        "Signature not yet visible"
                    );
                }
                Err(err) => {
                    tracing::warn!(
                        correlation_id = %logger.correlation_id(),
                        signature = %signature,
                        error = %err,
                        "Status query failed, polling again"
                    );
                }
            }

            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Err(abandon(*signature));
            }
            if !pause(self.policy.poll_interval(), cancel).await {
                return Err(abandon(*signature));
            }
        }
    }
}

fn abandon(signature: Signature) -> FlashLoanError {
    metrics().confirmations_abandoned.inc();
    tracing::warn!(
        signature = %signature,
        "Stopped waiting for finalization; the transaction may still land"
    );
    FlashLoanError::ConfirmationAbandoned {
        signature: Some(signature),
    }
}

// false when cancelled before the full duration elapsed
async fn pause(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
