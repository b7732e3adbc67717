//! Well-known addresses and lending market authority derivation

use solana_sdk::{pubkey::Pubkey, sysvar};

use crate::errors::{FlashLoanError, FlashLoanResult};

/// Instructions sysvar, read by the program to pair borrow and repay
pub fn instructions_sysvar_id() -> Pubkey {
    sysvar::instructions::id()
}

/// SPL token program moving the borrowed liquidity
pub fn token_program_id() -> Pubkey {
    spl_token::id()
}

/// Derive the lending market authority and its bump seed
///
/// Seeds are `[lending_market]`. Bumps are tried from 255 down to 0 and the
/// first candidate that is not a valid curve point wins, which yields the same
/// canonical address as `Pubkey::find_program_address`. The search is bounded
/// to the 256 possible bumps.
///
/// # Errors
///
/// `FlashLoanError::AuthorityDerivation` if every bump lands on the curve.
pub fn find_lending_market_authority(
    lending_market: &Pubkey,
    program_id: &Pubkey,
) -> FlashLoanResult<(Pubkey, u8)> {
    for bump in (0..=u8::MAX).rev() {
        let seeds: [&[u8]; 2] = [lending_market.as_ref(), &[bump]];
        if let Ok(address) = Pubkey::create_program_address(&seeds, program_id) {
            return Ok((address, bump));
        }
    }

    Err(FlashLoanError::AuthorityDerivation {
        lending_market: *lending_market,
    })
}
