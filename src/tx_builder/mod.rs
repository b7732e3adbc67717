//! Flash loan transaction building
//!
//! - **instructions**: ordered account lists, instruction constructors and
//!   the borrow/repay pairing check
//! - **batch**: the OPEN/SEALED instruction batch that signs once and hands
//!   the transaction to the submission protocol

pub mod batch;
pub mod instructions;

pub use batch::{BatchState, FlashLoanBatch};
pub use instructions::{
    flash_borrow, flash_borrow_account_metas, flash_repay, flash_repay_account_metas,
    sanity_check_flash_pairs, FlashBorrowAccounts, FlashRepayAccounts,
};
