//! Account lists and instruction constructors for flash borrow/repay
//!
//! The program resolves accounts by position, so the order produced here is
//! part of the wire contract:
//!
//! FlashBorrow:
//! 0. source liquidity (w), 1. destination liquidity (w), 2. reserve (w),
//! 3. lending market, 4. lending market authority, 5. instructions sysvar,
//! 6. token program
//!
//! FlashRepay:
//! 0. source liquidity (w), 1. destination liquidity (w), 2. fee receiver (w),
//! 3. reserve (w), 4. lending market, 5. user transfer authority (signer),
//! 6. instructions sysvar, 7. token program

use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};

use crate::address::{find_lending_market_authority, instructions_sysvar_id, token_program_id};
use crate::errors::{FlashLoanError, FlashLoanResult};
use crate::layout::{LendingInstruction, Reserve};

/// Accounts of a `FlashBorrow` instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashBorrowAccounts {
    /// Reserve liquidity supply the loan is taken from
    pub source_liquidity: Pubkey,
    /// User token account receiving the loan
    pub destination_liquidity: Pubkey,
    pub reserve: Pubkey,
    pub lending_market: Pubkey,
}

impl FlashBorrowAccounts {
    /// Borrow from `reserve` into `destination_liquidity`
    pub fn for_reserve(
        reserve_address: Pubkey,
        reserve: &Reserve,
        destination_liquidity: Pubkey,
    ) -> Self {
        Self {
            source_liquidity: reserve.liquidity.supply_pubkey,
            destination_liquidity,
            reserve: reserve_address,
            lending_market: reserve.lending_market,
        }
    }
}

/// Accounts of a `FlashRepay` instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashRepayAccounts {
    /// User token account the loan and fee are pulled from
    pub source_liquidity: Pubkey,
    /// Reserve liquidity supply receiving the repayment
    pub destination_liquidity: Pubkey,
    pub reserve: Pubkey,
    pub fee_receiver: Pubkey,
    pub lending_market: Pubkey,
    /// Owner or delegate of `source_liquidity`; must sign
    pub user_transfer_authority: Pubkey,
}

impl FlashRepayAccounts {
    /// Repay `reserve` from `source_liquidity`, authorized by `user_transfer_authority`
    pub fn for_reserve(
        reserve_address: Pubkey,
        reserve: &Reserve,
        source_liquidity: Pubkey,
        user_transfer_authority: Pubkey,
    ) -> Self {
        Self {
            source_liquidity,
            destination_liquidity: reserve.liquidity.supply_pubkey,
            reserve: reserve_address,
            fee_receiver: reserve.config.fee_receiver,
            lending_market: reserve.lending_market,
            user_transfer_authority,
        }
    }
}

/// Ordered account list of a `FlashBorrow` instruction
///
/// # Errors
///
/// `AuthorityDerivation` if no bump yields an off-curve market authority.
pub fn flash_borrow_account_metas(
    accounts: &FlashBorrowAccounts,
    program_id: &Pubkey,
) -> FlashLoanResult<Vec<AccountMeta>> {
    let (lending_market_authority, _bump) =
        find_lending_market_authority(&accounts.lending_market, program_id)?;

    Ok(vec![
        AccountMeta::new(accounts.source_liquidity, false),
        AccountMeta::new(accounts.destination_liquidity, false),
        AccountMeta::new(accounts.reserve, false),
        AccountMeta::new_readonly(accounts.lending_market, false),
        AccountMeta::new_readonly(lending_market_authority, false),
        AccountMeta::new_readonly(instructions_sysvar_id(), false),
        AccountMeta::new_readonly(token_program_id(), false),
    ])
}

/// Ordered account list of a `FlashRepay` instruction
pub fn flash_repay_account_metas(accounts: &FlashRepayAccounts) -> Vec<AccountMeta> {
    vec![
        AccountMeta::new(accounts.source_liquidity, false),
        AccountMeta::new(accounts.destination_liquidity, false),
        AccountMeta::new(accounts.fee_receiver, false),
        AccountMeta::new(accounts.reserve, false),
        AccountMeta::new_readonly(accounts.lending_market, false),
        AccountMeta::new_readonly(accounts.user_transfer_authority, true),
        AccountMeta::new_readonly(instructions_sysvar_id(), false),
        AccountMeta::new_readonly(token_program_id(), false),
    ]
}

/// Build a `FlashBorrow` instruction for `amount` base units
pub fn flash_borrow(
    program_id: &Pubkey,
    accounts: &FlashBorrowAccounts,
    amount: u64,
) -> FlashLoanResult<Instruction> {
    Ok(Instruction {
        program_id: *program_id,
        accounts: flash_borrow_account_metas(accounts, program_id)?,
        data: LendingInstruction::FlashBorrow { amount }.pack()?,
    })
}

/// Build a `FlashRepay` instruction
///
/// `amount` is the borrowed amount without fees; the program adds the fee
/// itself when pulling from `source_liquidity`.
pub fn flash_repay(
    program_id: &Pubkey,
    accounts: &FlashRepayAccounts,
    amount: u64,
) -> FlashLoanResult<Instruction> {
    Ok(Instruction {
        program_id: *program_id,
        accounts: flash_repay_account_metas(accounts),
        data: LendingInstruction::FlashRepay { amount }.pack()?,
    })
}

/// Check that every flash borrow is repaid later in the same instruction list
///
/// The program rejects unpaired borrows on-chain; this catches the mistake
/// before fees are spent. Each `FlashBorrow` must be followed by a
/// `FlashRepay` of the same amount against the same reserve, and no
/// `FlashRepay` may appear without a preceding borrow. Instructions of other
/// programs are ignored.
pub fn sanity_check_flash_pairs(
    instructions: &[Instruction],
    program_id: &Pubkey,
) -> FlashLoanResult<()> {
    // (position, reserve, amount) of borrows still waiting for a repay
    let mut open_borrows: Vec<(usize, Pubkey, u64)> = Vec::new();

    for (idx, ix) in instructions.iter().enumerate() {
        if ix.program_id != *program_id {
            continue;
        }
        match LendingInstruction::unpack(&ix.data)? {
            LendingInstruction::FlashBorrow { amount } => {
                let reserve = account_at(ix, 2, idx)?;
                open_borrows.push((idx, reserve, amount));
            }
            LendingInstruction::FlashRepay { amount } => {
                let reserve = account_at(ix, 3, idx)?;
                let matched = open_borrows
                    .iter()
                    .position(|(_, r, a)| *r == reserve && *a == amount)
                    .ok_or_else(|| {
                        FlashLoanError::InvalidInstructionOrder(format!(
                            "FlashRepay at position {idx} has no matching FlashBorrow (reserve {reserve}, amount {amount})"
                        ))
                    })?;
                open_borrows.remove(matched);
            }
            _ => {}
        }
    }

    if let Some((idx, reserve, amount)) = open_borrows.first() {
        return Err(FlashLoanError::InvalidInstructionOrder(format!(
            "FlashBorrow at position {idx} is never repaid (reserve {reserve}, amount {amount})"
        )));
    }

    Ok(())
}

fn account_at(ix: &Instruction, position: usize, idx: usize) -> FlashLoanResult<Pubkey> {
    ix.accounts
        .get(position)
        .map(|meta| meta.pubkey)
        .ok_or_else(|| {
            FlashLoanError::InvalidInstructionOrder(format!(
                "instruction at position {idx} has only {} accounts",
                ix.accounts.len()
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn borrow_accounts() -> FlashBorrowAccounts {
        FlashBorrowAccounts {
            source_liquidity: Pubkey::new_unique(),
            destination_liquidity: Pubkey::new_unique(),
            reserve: Pubkey::new_unique(),
            lending_market: Pubkey::new_unique(),
        }
    }

    fn repay_accounts_for(borrow: &FlashBorrowAccounts) -> FlashRepayAccounts {
        FlashRepayAccounts {
            source_liquidity: borrow.destination_liquidity,
            destination_liquidity: borrow.source_liquidity,
            reserve: borrow.reserve,
            fee_receiver: Pubkey::new_unique(),
            lending_market: borrow.lending_market,
            user_transfer_authority: Pubkey::new_unique(),
        }
    }

    fn assert_meta(meta: &AccountMeta, pubkey: Pubkey, writable: bool, signer: bool) {
        assert_eq!(meta.pubkey, pubkey);
        assert_eq!(meta.is_writable, writable, "writable flag of {pubkey}");
        assert_eq!(meta.is_signer, signer, "signer flag of {pubkey}");
    }

    #[test]
    fn test_flash_borrow_account_order() {
        let program = Pubkey::new_unique();
        let accounts = borrow_accounts();

        let metas = flash_borrow_account_metas(&accounts, &program).unwrap();
        let (authority, _) =
            Pubkey::find_program_address(&[accounts.lending_market.as_ref()], &program);

        assert_eq!(metas.len(), 7);
        assert_meta(&metas[0], accounts.source_liquidity, true, false);
        assert_meta(&metas[1], accounts.destination_liquidity, true, false);
        assert_meta(&metas[2], accounts.reserve, true, false);
        assert_meta(&metas[3], accounts.lending_market, false, false);
        assert_meta(&metas[4], authority, false, false);
        assert_meta(&metas[5], solana_sdk::sysvar::instructions::id(), false, false);
        assert_meta(&metas[6], spl_token::id(), false, false);
    }

    #[test]
    fn test_flash_repay_account_order() {
        let borrow = borrow_accounts();
        let accounts = repay_accounts_for(&borrow);

        let metas = flash_repay_account_metas(&accounts);

        assert_eq!(metas.len(), 8);
        assert_meta(&metas[0], accounts.source_liquidity, true, false);
        assert_meta(&metas[1], accounts.destination_liquidity, true, false);
        assert_meta(&metas[2], accounts.fee_receiver, true, false);
        assert_meta(&metas[3], accounts.reserve, true, false);
        assert_meta(&metas[4], accounts.lending_market, false, false);
        assert_meta(&metas[5], accounts.user_transfer_authority, false, true);
        assert_meta(&metas[6], solana_sdk::sysvar::instructions::id(), false, false);
        assert_meta(&metas[7], spl_token::id(), false, false);
    }

    #[test]
    fn test_instruction_payloads() {
        let program = Pubkey::new_unique();
        let borrow = borrow_accounts();
        let repay = repay_accounts_for(&borrow);

        let ix = flash_borrow(&program, &borrow, 100_000_000).unwrap();
        assert_eq!(ix.program_id, program);
        assert_eq!(
            LendingInstruction::unpack(&ix.data).unwrap(),
            LendingInstruction::FlashBorrow {
                amount: 100_000_000
            }
        );

        let ix = flash_repay(&program, &repay, 100_000_000).unwrap();
        assert_eq!(ix.data[0], 8);
        assert_eq!(&ix.data[1..], &100_000_000u64.to_le_bytes());
    }

    #[test]
    fn test_accounts_for_reserve() {
        let mut reserve = Reserve::default();
        reserve.lending_market = Pubkey::new_unique();
        reserve.liquidity.supply_pubkey = Pubkey::new_unique();
        reserve.config.fee_receiver = Pubkey::new_unique();
        let reserve_address = Pubkey::new_unique();
        let user_token = Pubkey::new_unique();
        let authority = Pubkey::new_unique();

        let borrow = FlashBorrowAccounts::for_reserve(reserve_address, &reserve, user_token);
        assert_eq!(borrow.source_liquidity, reserve.liquidity.supply_pubkey);
        assert_eq!(borrow.destination_liquidity, user_token);
        assert_eq!(borrow.reserve, reserve_address);
        assert_eq!(borrow.lending_market, reserve.lending_market);

        let repay =
            FlashRepayAccounts::for_reserve(reserve_address, &reserve, user_token, authority);
        assert_eq!(repay.source_liquidity, user_token);
        assert_eq!(repay.destination_liquidity, reserve.liquidity.supply_pubkey);
        assert_eq!(repay.fee_receiver, reserve.config.fee_receiver);
        assert_eq!(repay.user_transfer_authority, authority);
    }

    #[test]
    fn test_sanity_check_valid_pair() {
        let program = Pubkey::new_unique();
        let borrow = borrow_accounts();
        let repay = repay_accounts_for(&borrow);

        let instructions = vec![
            flash_borrow(&program, &borrow, 500).unwrap(),
            flash_repay(&program, &repay, 500).unwrap(),
        ];
        assert!(sanity_check_flash_pairs(&instructions, &program).is_ok());
    }

    #[test]
    fn test_sanity_check_unrepaid_borrow() {
        let program = Pubkey::new_unique();
        let borrow = borrow_accounts();

        let instructions = vec![flash_borrow(&program, &borrow, 500).unwrap()];
        let result = sanity_check_flash_pairs(&instructions, &program);
        if let Err(FlashLoanError::InvalidInstructionOrder(msg)) = result {
            assert!(msg.contains("never repaid"));
        } else {
            panic!("Expected InvalidInstructionOrder error");
        }
    }

    #[test]
    fn test_sanity_check_repay_before_borrow() {
        let program = Pubkey::new_unique();
        let borrow = borrow_accounts();
        let repay = repay_accounts_for(&borrow);

        let instructions = vec![
            flash_repay(&program, &repay, 500).unwrap(),
            flash_borrow(&program, &borrow, 500).unwrap(),
        ];
        let result = sanity_check_flash_pairs(&instructions, &program);
        assert!(matches!(
            result,
            Err(FlashLoanError::InvalidInstructionOrder(msg))
                if msg.contains("no matching FlashBorrow")
        ));
    }

    #[test]
    fn test_sanity_check_amount_mismatch() {
        let program = Pubkey::new_unique();
        let borrow = borrow_accounts();
        let repay = repay_accounts_for(&borrow);

        let instructions = vec![
            flash_borrow(&program, &borrow, 500).unwrap(),
            flash_repay(&program, &repay, 499).unwrap(),
        ];
        assert!(sanity_check_flash_pairs(&instructions, &program).is_err());
    }
}
