//! Reserve account reads
//!
//! Reserve state is fetched and decoded on every call; nothing is cached, so
//! fee quotes always reflect the current on-chain configuration.

use solana_sdk::pubkey::Pubkey;

use crate::errors::{FlashLoanError, FlashLoanResult};
use crate::fees::{compute_fees, FeeQuote};
use crate::layout::Reserve;
use crate::rpc::LedgerReader;

/// Fetch and decode the reserve at `address`
pub async fn fetch_reserve<R>(ledger: &R, address: &Pubkey) -> FlashLoanResult<Reserve>
where
    R: LedgerReader + ?Sized,
{
    let data = ledger
        .get_account_bytes(address)
        .await?
        .ok_or(FlashLoanError::AccountNotFound { address: *address })?;

    let reserve = Reserve::unpack(&data)?;
    tracing::debug!(
        reserve = %address,
        lending_market = %reserve.lending_market,
        available = reserve.liquidity.available_amount,
        flash_loan_fee_wad = reserve.config.fees.flash_loan_fee_wad,
        texture_fee_percentage = reserve.config.fees.texture_fee_percentage,
        "Loaded reserve"
    );
    Ok(reserve)
}

/// Liquidity currently available for borrowing, in base units
pub async fn available_liquidity<R>(ledger: &R, address: &Pubkey) -> FlashLoanResult<u64>
where
    R: LedgerReader + ?Sized,
{
    Ok(fetch_reserve(ledger, address).await?.liquidity.available_amount)
}

/// Fees the reserve at `address` would charge for flashing `amount`
pub async fn quote_flash_loan_fees<R>(
    ledger: &R,
    address: &Pubkey,
    amount: u64,
) -> FlashLoanResult<FeeQuote>
where
    R: LedgerReader + ?Sized,
{
    let reserve = fetch_reserve(ledger, address).await?;
    compute_fees(&reserve.config.fees, amount)
}
