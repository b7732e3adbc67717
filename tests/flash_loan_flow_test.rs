//! End-to-end flash loan flow over the public API
//!
//! A minimal in-memory ledger stands in for the validator: it serves one
//! reserve account, accepts every broadcast and reports it finalized on the
//! second status query.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use flash_loan_executor::{
    compute_fees, fetch_reserve,
    layout::LendingInstruction,
    quote_flash_loan_fees,
    rpc::{ConfirmationLevel, LedgerResult, SignatureStatus},
    tx_builder::sanity_check_flash_pairs,
    FlashBorrowAccounts, FlashLoanBatch, FlashLoanError, FlashRepayAccounts, LedgerReader,
    LedgerWriter, Reserve, SubmissionPolicy, Submitter,
};
use solana_sdk::{
    hash::Hash,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::Transaction,
};

struct DevnetStub {
    accounts: HashMap<Pubkey, Vec<u8>>,
    blockhash: Hash,
    sent: Mutex<Vec<Transaction>>,
    queries: Mutex<HashMap<Signature, u32>>,
}

impl DevnetStub {
    fn with_reserve(address: Pubkey, reserve: &Reserve) -> Self {
        Self {
            accounts: HashMap::from([(address, reserve.pack().unwrap())]),
            blockhash: Hash::new_unique(),
            sent: Mutex::new(Vec::new()),
            queries: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl LedgerReader for DevnetStub {
    async fn get_account_bytes(&self, address: &Pubkey) -> LedgerResult<Option<Vec<u8>>> {
        Ok(self.accounts.get(address).cloned())
    }
}

#[async_trait]
impl LedgerWriter for DevnetStub {
    async fn latest_blockhash(&self) -> LedgerResult<Hash> {
        Ok(self.blockhash)
    }

    async fn broadcast(&self, transaction: &Transaction) -> LedgerResult<Signature> {
        self.sent.lock().unwrap().push(transaction.clone());
        Ok(transaction.signatures[0])
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> LedgerResult<Option<SignatureStatus>> {
        let mut queries = self.queries.lock().unwrap();
        let seen = queries.entry(*signature).or_insert(0);
        *seen += 1;
        let level = if *seen >= 2 {
            ConfirmationLevel::Finalized
        } else {
            ConfirmationLevel::Confirmed
        };
        Ok(Some(SignatureStatus { level, err: None }))
    }

    async fn request_airdrop(&self, _to: &Pubkey, _lamports: u64) -> LedgerResult<Signature> {
        Ok(Signature::default())
    }
}

fn devnet_reserve() -> Reserve {
    let mut reserve = Reserve {
        version: 1,
        lending_market: Pubkey::new_unique(),
        ..Reserve::default()
    };
    reserve.liquidity.supply_pubkey = Pubkey::new_unique();
    reserve.liquidity.available_amount = 1_000_000_000;
    // 0.3% with a 10% texture share
    reserve.config.fees.flash_loan_fee_wad = 3_000_000_000_000_000;
    reserve.config.fees.texture_fee_percentage = 10;
    reserve.config.fee_receiver = Pubkey::new_unique();
    reserve
}

#[tokio::test(start_paused = true)]
async fn test_borrow_and_repay_round_trip() {
    let program = Pubkey::new_unique();
    let reserve_address = Pubkey::new_unique();
    let ledger = Arc::new(DevnetStub::with_reserve(reserve_address, &devnet_reserve()));
    let payer = Keypair::new();
    let user_token = Pubkey::new_unique();
    let amount = 100_000_000;

    let reserve = fetch_reserve(ledger.as_ref(), &reserve_address).await.unwrap();
    let quote = quote_flash_loan_fees(ledger.as_ref(), &reserve_address, amount)
        .await
        .unwrap();
    assert_eq!((quote.borrow_fee, quote.texture_fee), (300_000, 30_000));
    assert_eq!(quote.repayment_amount(amount), Some(100_300_000));

    let mut batch = FlashLoanBatch::new(program);
    batch
        .append_flash_borrow(
            &FlashBorrowAccounts::for_reserve(reserve_address, &reserve, user_token),
            amount,
        )
        .unwrap()
        .append_flash_repay(
            &FlashRepayAccounts::for_reserve(reserve_address, &reserve, user_token, payer.pubkey()),
            amount,
        )
        .unwrap();
    sanity_check_flash_pairs(batch.instructions(), &program).unwrap();

    let submitter = Submitter::new(Arc::clone(&ledger), SubmissionPolicy::default());
    let report = batch.execute(&submitter, &payer, &[&payer]).await.unwrap();

    assert_eq!(report.attempts, 1);
    assert_eq!(report.confirmation_polls, 2);
    assert!(batch.is_empty());

    let sent = ledger.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    let tx = &sent[0];
    assert!(tx.verify().is_ok());
    assert_eq!(tx.signatures[0], report.signature);
    assert_eq!(tx.message.instructions.len(), 2);

    let borrow = &tx.message.instructions[0];
    assert_eq!(
        LendingInstruction::unpack(&borrow.data).unwrap(),
        LendingInstruction::FlashBorrow { amount }
    );
    assert_eq!(
        tx.message.account_keys[borrow.program_id_index as usize],
        program
    );
}

#[tokio::test]
async fn test_fee_rejection_surfaces_before_building() {
    let mut reserve = devnet_reserve();
    reserve.config.fees.texture_fee_percentage = 0;

    // The minimum fee of 1 would consume a 1-unit loan entirely
    let result = compute_fees(&reserve.config.fees, 1);
    assert!(matches!(result, Err(FlashLoanError::FeeTooSmall { amount: 1, borrow_fee: 1 })));
    assert!(compute_fees(&reserve.config.fees, 2).is_ok());
}
