//! Flash loan fee calculation
//!
//! Mirrors the program's integer arithmetic: the fee fraction is a WAD
//! (10^18-scaled) fixed-point value, intermediate products are held in `u128`
//! and results are floored. The texture fee is taken from the unfloored borrow
//! fee, exactly as the program computes it.

use serde::{Deserialize, Serialize};

use crate::errors::{FlashLoanError, FlashLoanResult};
use crate::layout::ReserveFees;

/// Fixed-point scale of `flash_loan_fee_wad`
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// Scale of `texture_fee_percentage`
const PERCENT: u128 = 100;

/// Fees charged for one flash loan of a given amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeeQuote {
    /// Fee owed to the reserve on top of the borrowed amount
    pub borrow_fee: u64,
    /// Part of `borrow_fee` routed to the texture fee receiver
    pub texture_fee: u64,
}

impl FeeQuote {
    /// Total the repay instruction pulls from the user's source account
    pub fn repayment_amount(&self, amount: u64) -> Option<u64> {
        amount.checked_add(self.borrow_fee)
    }
}

/// Compute borrow and texture fees for flashing `amount` base units
///
/// 1. A zero fee fraction or a zero amount costs nothing.
/// 2. The borrow fee is `amount * fraction`, but never below the minimum fee
///    (2 when a texture fee is charged, else 1).
/// 3. The texture fee is `borrow_fee * percentage / 100`, never below 1.
///
/// # Errors
///
/// `FlashLoanError::FeeTooSmall` when the borrow fee would be at least the
/// borrowed amount.
pub fn compute_fees(fees: &ReserveFees, amount: u64) -> FlashLoanResult<FeeQuote> {
    if fees.flash_loan_fee_wad == 0 || amount == 0 {
        return Ok(FeeQuote::default());
    }

    let texture_pct = u128::from(fees.texture_fee_percentage);
    let minimum_fee: u128 = if texture_pct > 0 { 2 } else { 1 };

    // Borrow fee in WAD units; u64 * u64 always fits in u128
    let borrow_fee_wad =
        (u128::from(amount) * u128::from(fees.flash_loan_fee_wad)).max(minimum_fee * WAD);
    let borrow_fee = borrow_fee_wad / WAD;

    // floor(x) >= amount  <=>  x >= amount, since amount is an integer
    if borrow_fee >= u128::from(amount) {
        return Err(FlashLoanError::FeeTooSmall {
            amount,
            borrow_fee: u64::try_from(borrow_fee).unwrap_or(u64::MAX),
        });
    }

    let texture_fee = if texture_pct > 0 {
        mul_div_floor(borrow_fee_wad, texture_pct, PERCENT * WAD).max(1)
    } else {
        0
    };

    // borrow_fee < amount here; texture_fee can only outgrow it above 100%
    Ok(FeeQuote {
        borrow_fee: borrow_fee as u64,
        texture_fee: u64::try_from(texture_fee).unwrap_or(u64::MAX),
    })
}

// floor(value * numerator / denominator) without overflowing the product.
// Callers keep numerator below denominator, which bounds both partial terms.
fn mul_div_floor(value: u128, numerator: u128, denominator: u128) -> u128 {
    let whole = value / denominator;
    let rest = value % denominator;
    whole * numerator + rest * numerator / denominator
}
