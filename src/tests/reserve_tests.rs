//! Reserve reads and fee quotes through the ledger reader

use solana_sdk::pubkey::Pubkey;

use crate::errors::{FlashLoanError, LayoutError};
use crate::fees::FeeQuote;
use crate::reserve::{available_liquidity, fetch_reserve, quote_flash_loan_fees};
use crate::test_utils::{sample_reserve, LedgerEvent, MockLedger};

// 0.3%
const THIRTY_BPS: u64 = 3_000_000_000_000_000;

#[tokio::test]
async fn test_fetch_reserve_decodes_account() {
    let address = Pubkey::new_unique();
    let reserve = sample_reserve(THIRTY_BPS, 10);
    let ledger = MockLedger::new().with_account(address, reserve.pack().unwrap());

    let fetched = fetch_reserve(&ledger, &address).await.unwrap();
    assert_eq!(fetched, reserve);
}

#[tokio::test]
async fn test_missing_reserve() {
    let address = Pubkey::new_unique();
    let ledger = MockLedger::new();

    let result = fetch_reserve(&ledger, &address).await;
    assert!(matches!(result, Err(FlashLoanError::AccountNotFound { address: a }) if a == address));
}

#[tokio::test]
async fn test_truncated_reserve_data() {
    let address = Pubkey::new_unique();
    let mut data = sample_reserve(THIRTY_BPS, 0).pack().unwrap();
    data.truncate(300);
    let ledger = MockLedger::new().with_account(address, data);

    let result = fetch_reserve(&ledger, &address).await;
    assert!(matches!(
        result,
        Err(FlashLoanError::Layout(LayoutError::LengthMismatch { expected: 360, actual: 300, .. }))
    ));
}

#[tokio::test]
async fn test_empty_account_is_not_missing() {
    let address = Pubkey::new_unique();
    let ledger = MockLedger::new().with_account(address, Vec::new());

    let result = fetch_reserve(&ledger, &address).await;
    assert!(matches!(result, Err(FlashLoanError::Layout(_))));
}

#[tokio::test]
async fn test_available_liquidity() {
    let address = Pubkey::new_unique();
    let ledger =
        MockLedger::new().with_account(address, sample_reserve(THIRTY_BPS, 0).pack().unwrap());

    assert_eq!(available_liquidity(&ledger, &address).await.unwrap(), 5_000_000_000);
}

#[tokio::test]
async fn test_quotes_match_reference_scenarios() {
    let plain = Pubkey::new_unique();
    let textured = Pubkey::new_unique();
    let ledger = MockLedger::new()
        .with_account(plain, sample_reserve(THIRTY_BPS, 0).pack().unwrap())
        .with_account(textured, sample_reserve(THIRTY_BPS, 10).pack().unwrap());

    assert_eq!(
        quote_flash_loan_fees(&ledger, &plain, 100_000_000).await.unwrap(),
        FeeQuote {
            borrow_fee: 300_000,
            texture_fee: 0
        }
    );
    assert_eq!(
        quote_flash_loan_fees(&ledger, &textured, 100_000_000).await.unwrap(),
        FeeQuote {
            borrow_fee: 300_000,
            texture_fee: 30_000
        }
    );
}

#[tokio::test]
async fn test_every_quote_reads_the_ledger() {
    let address = Pubkey::new_unique();
    let ledger =
        MockLedger::new().with_account(address, sample_reserve(THIRTY_BPS, 0).pack().unwrap());

    quote_flash_loan_fees(&ledger, &address, 1_000).await.unwrap();
    quote_flash_loan_fees(&ledger, &address, 1_000).await.unwrap();

    let reads = ledger
        .events()
        .into_iter()
        .filter(|e| *e == LedgerEvent::AccountRead(address))
        .count();
    assert_eq!(reads, 2);
}
