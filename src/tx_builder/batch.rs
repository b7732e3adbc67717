//! Flash loan instruction batch
//!
//! A batch buffers instructions while OPEN. `seal` moves it to SEALED and
//! hands out the buffered instructions; `execute` seals, signs once, submits
//! and always leaves the batch empty and OPEN again, whatever the outcome.

use solana_sdk::{
    instruction::Instruction,
    message::Message,
    pubkey::Pubkey,
    signature::Signer,
    transaction::Transaction,
};
use tokio_util::sync::CancellationToken;

use crate::errors::{FlashLoanError, FlashLoanResult};
use crate::metrics::metrics;
use crate::observability::{CorrelationId, StructuredLogger};
use crate::rpc::LedgerWriter;
use crate::submission::{SubmissionReport, Submitter};

use super::instructions::{flash_borrow, flash_repay, FlashBorrowAccounts, FlashRepayAccounts};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Open,
    Sealed,
}

/// Ordered instructions of one flash loan transaction
#[derive(Debug)]
pub struct FlashLoanBatch {
    program_id: Pubkey,
    instructions: Vec<Instruction>,
    state: BatchState,
    logger: StructuredLogger,
}

impl FlashLoanBatch {
    pub fn new(program_id: Pubkey) -> Self {
        Self {
            program_id,
            instructions: Vec::new(),
            state: BatchState::Open,
            logger: StructuredLogger::default(),
        }
    }

    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn is_sealed(&self) -> bool {
        self.state == BatchState::Sealed
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// ID attached to every log event of the current flow
    pub fn correlation_id(&self) -> &CorrelationId {
        self.logger.correlation_id()
    }

    /// Append a `FlashBorrow` of `amount` base units
    pub fn append_flash_borrow(
        &mut self,
        accounts: &FlashBorrowAccounts,
        amount: u64,
    ) -> FlashLoanResult<&mut Self> {
        self.ensure_open()?;
        let ix = flash_borrow(&self.program_id, accounts, amount)?;
        self.push("FlashBorrow", amount, ix);
        Ok(self)
    }

    /// Append a `FlashRepay` of `amount` base units (fee excluded)
    pub fn append_flash_repay(
        &mut self,
        accounts: &FlashRepayAccounts,
        amount: u64,
    ) -> FlashLoanResult<&mut Self> {
        self.ensure_open()?;
        let ix = flash_repay(&self.program_id, accounts, amount)?;
        self.push("FlashRepay", amount, ix);
        Ok(self)
    }

    /// Close the batch for appends and return its instructions
    ///
    /// An empty batch is rejected and stays OPEN.
    pub fn seal(&mut self) -> FlashLoanResult<Vec<Instruction>> {
        self.ensure_open()?;
        if self.instructions.is_empty() {
            return Err(FlashLoanError::EmptyBatch);
        }
        self.state = BatchState::Sealed;
        Ok(self.instructions.clone())
    }

    /// Drop all instructions and start a new flow
    pub fn reset(&mut self) {
        self.instructions.clear();
        self.state = BatchState::Open;
        self.logger = StructuredLogger::default();
    }

    /// Sign and submit the batch, then wait for finality
    pub async fn execute<W>(
        &mut self,
        submitter: &Submitter<W>,
        fee_payer: &dyn Signer,
        signers: &[&dyn Signer],
    ) -> FlashLoanResult<SubmissionReport>
    where
        W: LedgerWriter + ?Sized,
    {
        self.execute_with_cancel(submitter, fee_payer, signers, &CancellationToken::new())
            .await
    }

    /// Like [`FlashLoanBatch::execute`], abandoning backoff and polling once
    /// `cancel` fires
    pub async fn execute_with_cancel<W>(
        &mut self,
        submitter: &Submitter<W>,
        fee_payer: &dyn Signer,
        signers: &[&dyn Signer],
        cancel: &CancellationToken,
    ) -> FlashLoanResult<SubmissionReport>
    where
        W: LedgerWriter + ?Sized,
    {
        let instructions = self.seal()?;
        let logger = self.logger.clone();

        let result =
            sign_and_submit(submitter, &instructions, fee_payer, signers, &logger, cancel).await;

        if let Err(e) = &result {
            logger.error(&format!(
                "flash loan execution failed ({}, retryable: {}): {e}",
                e.category(),
                e.is_retryable()
            ));
        }
        self.reset();
        result
    }

    fn ensure_open(&self) -> FlashLoanResult<()> {
        match self.state {
            BatchState::Open => Ok(()),
            BatchState::Sealed => Err(FlashLoanError::BatchSealed),
        }
    }

    fn push(&mut self, name: &str, amount: u64, ix: Instruction) {
        self.logger.log_instruction_appended(name, amount, &ix);
        metrics().instructions_appended.inc();
        self.instructions.push(ix);
    }
}

async fn sign_and_submit<W>(
    submitter: &Submitter<W>,
    instructions: &[Instruction],
    fee_payer: &dyn Signer,
    signers: &[&dyn Signer],
    logger: &StructuredLogger,
    cancel: &CancellationToken,
) -> FlashLoanResult<SubmissionReport>
where
    W: LedgerWriter + ?Sized,
{
    let signers = dedup_signers(fee_payer, signers);
    let signer_keys: Vec<Pubkey> = signers.iter().map(|s| s.pubkey()).collect();
    logger.log_execute(&fee_payer.pubkey(), &signer_keys, instructions.len());

    let blockhash = submitter.ledger().latest_blockhash().await?;
    let message = Message::new(instructions, Some(&fee_payer.pubkey()));
    let mut transaction = Transaction::new_unsigned(message);
    transaction
        .try_sign(&signers, blockhash)
        .map_err(|e| FlashLoanError::Signing(e.to_string()))?;

    submitter
        .submit_correlated(&transaction, logger.correlation_id(), cancel)
        .await
}

/// Fee payer first, then each further signer once, by pubkey
fn dedup_signers<'a>(fee_payer: &'a dyn Signer, signers: &[&'a dyn Signer]) -> Vec<&'a dyn Signer> {
    let mut unique: Vec<&dyn Signer> = vec![fee_payer];
    for signer in signers {
        let key = signer.pubkey();
        if !unique.iter().any(|s| s.pubkey() == key) {
            unique.push(*signer);
        }
    }
    unique
}
