//! Fixed binary layouts of the lending program
//!
//! The deployed program reads and writes borsh-encoded data, so every type
//! here derives `BorshSerialize`/`BorshDeserialize` and the field order is the
//! wire order. Field widths and order must match the program bit-for-bit;
//! reordering a field silently corrupts every decode.
//!
//! ## Layouts
//! - [`Reserve`]: the 360-byte reserve account (liquidity, LP token and fee
//!   configuration)
//! - [`LendingInstruction`]: the program's instruction enum, 1-byte tag
//!   followed by the variant payload

use borsh::{BorshDeserialize, BorshSerialize};
use solana_sdk::pubkey::Pubkey;

use crate::errors::LayoutError;

/// Liquidity side of a reserve
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReserveLiquidity {
    /// Mint of the borrowed asset
    pub mint_pubkey: Pubkey,
    /// Stored as a full u64 by the program
    pub mint_decimals: u64,
    /// Token account holding the reserve's liquidity
    pub supply_pubkey: Pubkey,
    /// Liquidity currently available to borrow, in base units
    pub available_amount: u64,
}

/// LP token side of a reserve
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReserveLpTokens {
    pub mint_pubkey: Pubkey,
    pub mint_total_supply: u64,
    pub supply_pubkey: Pubkey,
}

/// Fee configuration of a reserve
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReserveFees {
    /// Flash loan fee as a fraction scaled by 10^18 (WAD)
    pub flash_loan_fee_wad: u64,
    /// Share of the borrow fee taken as texture fee, in whole percent
    pub texture_fee_percentage: u8,
    pub _padding: [u8; 7],
}

/// Reserve configuration
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReserveConfig {
    pub fees: ReserveFees,
    pub deposit_limit: u64,
    /// Token account receiving flash loan fees
    pub fee_receiver: Pubkey,
    pub _future_padding1: [u8; 32],
    pub _future_padding2: [u8; 32],
}

/// Decoded snapshot of a reserve account
///
/// Padding regions are carried through untouched so that `pack` reproduces
/// the original bytes exactly.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Reserve {
    pub version: u8,
    pub _padding: [u8; 7],
    /// Slot of the last reserve update
    pub last_update_slot: u64,
    pub lending_market: Pubkey,
    pub liquidity: ReserveLiquidity,
    pub lp_tokens_info: ReserveLpTokens,
    pub config: ReserveConfig,
    pub _future_padding: [u64; 5],
}

impl Reserve {
    /// Exact size of a reserve account's data
    pub const LEN: usize = 360;

    /// Decode a reserve from raw account data
    ///
    /// # Errors
    ///
    /// Returns `LayoutError::LengthMismatch` unless `data` is exactly
    /// [`Reserve::LEN`] bytes long.
    pub fn unpack(data: &[u8]) -> Result<Self, LayoutError> {
        if data.len() != Self::LEN {
            return Err(LayoutError::LengthMismatch {
                layout: "Reserve",
                expected: Self::LEN,
                actual: data.len(),
            });
        }
        Ok(borsh::from_slice(data)?)
    }

    /// Encode the reserve back into account data
    pub fn pack(&self) -> Result<Vec<u8>, LayoutError> {
        let mut buf = Vec::with_capacity(Self::LEN);
        self.serialize(&mut buf)?;
        Ok(buf)
    }
}

/// Instructions of the lending program
///
/// Variant order is the on-chain discriminant order and must never change.
/// Only the two flash loan variants are built by this crate; the others are
/// decoded for inspection and carry no payload.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LendingInstruction {
    InitLendingMarket,
    SetLendingMarketOwner,
    InitReserve,
    Deposit,
    Withdraw,
    FlashLoan,
    UpdateReserveConfig,
    /// Borrow `amount` of reserve liquidity for the rest of the transaction
    ///
    /// Accounts expected:
    /// 0. `[writable]` Source liquidity (reserve supply)
    /// 1. `[writable]` Destination liquidity
    /// 2. `[writable]` Reserve
    /// 3. `[]` Lending market
    /// 4. `[]` Lending market authority (derived)
    /// 5. `[]` Instructions sysvar
    /// 6. `[]` Token program
    FlashBorrow { amount: u64 },
    /// Repay `amount` plus the flash loan fee
    ///
    /// Accounts expected:
    /// 0. `[writable]` Source liquidity (user)
    /// 1. `[writable]` Destination liquidity (reserve supply)
    /// 2. `[writable]` Reserve fee receiver
    /// 3. `[writable]` Reserve
    /// 4. `[]` Lending market
    /// 5. `[signer]` User transfer authority
    /// 6. `[]` Instructions sysvar
    /// 7. `[]` Token program
    FlashRepay { amount: u64 },
    Sync,
}

impl LendingInstruction {
    /// Number of variants in the program's instruction enum
    pub const VARIANT_COUNT: u8 = 10;

    /// On-chain discriminant of this instruction
    pub fn tag(&self) -> u8 {
        match self {
            Self::InitLendingMarket => 0,
            Self::SetLendingMarketOwner => 1,
            Self::InitReserve => 2,
            Self::Deposit => 3,
            Self::Withdraw => 4,
            Self::FlashLoan => 5,
            Self::UpdateReserveConfig => 6,
            Self::FlashBorrow { .. } => 7,
            Self::FlashRepay { .. } => 8,
            Self::Sync => 9,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::InitLendingMarket => "InitLendingMarket",
            Self::SetLendingMarketOwner => "SetLendingMarketOwner",
            Self::InitReserve => "InitReserve",
            Self::Deposit => "Deposit",
            Self::Withdraw => "Withdraw",
            Self::FlashLoan => "FlashLoan",
            Self::UpdateReserveConfig => "UpdateReserveConfig",
            Self::FlashBorrow { .. } => "FlashBorrow",
            Self::FlashRepay { .. } => "FlashRepay",
            Self::Sync => "Sync",
        }
    }

    /// Encode as instruction data (tag byte + payload)
    pub fn pack(&self) -> Result<Vec<u8>, LayoutError> {
        let mut buf = Vec::with_capacity(Self::packed_len(self.tag()));
        self.serialize(&mut buf)?;
        Ok(buf)
    }

    /// Decode instruction data
    ///
    /// # Errors
    ///
    /// - `UnknownDiscriminant` if the tag byte is outside the enum
    /// - `LengthMismatch` if the data is empty or the payload has the wrong size
    pub fn unpack(data: &[u8]) -> Result<Self, LayoutError> {
        let (&tag, _) = data.split_first().ok_or(LayoutError::LengthMismatch {
            layout: "LendingInstruction",
            expected: 1,
            actual: 0,
        })?;
        if tag >= Self::VARIANT_COUNT {
            return Err(LayoutError::UnknownDiscriminant(tag));
        }
        let expected = Self::packed_len(tag);
        if data.len() != expected {
            return Err(LayoutError::LengthMismatch {
                layout: "LendingInstruction",
                expected,
                actual: data.len(),
            });
        }
        Ok(borsh::from_slice(data)?)
    }

    // FlashBorrow and FlashRepay carry a u64 amount; everything else is bare.
    fn packed_len(tag: u8) -> usize {
        match tag {
            7 | 8 => 1 + 8,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_reserve() -> Reserve {
        Reserve {
            version: 1,
            _padding: [0; 7],
            last_update_slot: 245_000_123,
            lending_market: Pubkey::new_unique(),
            liquidity: ReserveLiquidity {
                mint_pubkey: Pubkey::new_unique(),
                mint_decimals: 9,
                supply_pubkey: Pubkey::new_unique(),
                available_amount: 5_000_000_000,
            },
            lp_tokens_info: ReserveLpTokens {
                mint_pubkey: Pubkey::new_unique(),
                mint_total_supply: 4_900_000_000,
                supply_pubkey: Pubkey::new_unique(),
            },
            config: ReserveConfig {
                fees: ReserveFees {
                    flash_loan_fee_wad: 3_000_000_000_000_000,
                    texture_fee_percentage: 10,
                    _padding: [0; 7],
                },
                deposit_limit: u64::MAX,
                fee_receiver: Pubkey::new_unique(),
                _future_padding1: [0; 32],
                _future_padding2: [0; 32],
            },
            _future_padding: [0; 5],
        }
    }

    #[test]
    fn test_reserve_packed_len() {
        let packed = sample_reserve().pack().unwrap();
        assert_eq!(packed.len(), Reserve::LEN);
    }

    #[test]
    fn test_reserve_field_offsets() {
        let reserve = sample_reserve();
        let packed = reserve.pack().unwrap();

        assert_eq!(packed[0], 1);
        assert_eq!(&packed[8..16], &245_000_123u64.to_le_bytes());
        assert_eq!(&packed[16..48], reserve.lending_market.as_ref());
        assert_eq!(&packed[48..80], reserve.liquidity.mint_pubkey.as_ref());
        assert_eq!(&packed[80..88], &9u64.to_le_bytes());
        assert_eq!(&packed[88..120], reserve.liquidity.supply_pubkey.as_ref());
        assert_eq!(&packed[120..128], &5_000_000_000u64.to_le_bytes());
        assert_eq!(&packed[200..208], &3_000_000_000_000_000u64.to_le_bytes());
        assert_eq!(packed[208], 10);
        assert_eq!(&packed[216..224], &u64::MAX.to_le_bytes());
        assert_eq!(&packed[224..256], reserve.config.fee_receiver.as_ref());
    }

    #[test]
    fn test_reserve_unpack_preserves_padding() {
        let mut bytes = sample_reserve().pack().unwrap();
        // Non-zero bytes in every reserved region
        bytes[1..8].copy_from_slice(&[7; 7]);
        bytes[209..216].copy_from_slice(&[9; 7]);
        bytes[256..320].iter_mut().for_each(|b| *b = 0xAB);
        bytes[320..360].iter_mut().for_each(|b| *b = 0xCD);

        let reserve = Reserve::unpack(&bytes).unwrap();
        assert_eq!(reserve._padding, [7; 7]);
        assert_eq!(reserve.config.fees._padding, [9; 7]);
        assert_eq!(reserve.pack().unwrap(), bytes);
    }

    #[test]
    fn test_reserve_wrong_length() {
        let bytes = sample_reserve().pack().unwrap();

        let err = Reserve::unpack(&bytes[..Reserve::LEN - 1]).unwrap_err();
        assert_eq!(
            err,
            LayoutError::LengthMismatch {
                layout: "Reserve",
                expected: 360,
                actual: 359
            }
        );

        let mut longer = bytes.clone();
        longer.push(0);
        assert!(matches!(
            Reserve::unpack(&longer),
            Err(LayoutError::LengthMismatch { actual: 361, .. })
        ));

        assert!(Reserve::unpack(&[]).is_err());
    }

    #[test]
    fn test_instruction_tags() {
        let all = [
            LendingInstruction::InitLendingMarket,
            LendingInstruction::SetLendingMarketOwner,
            LendingInstruction::InitReserve,
            LendingInstruction::Deposit,
            LendingInstruction::Withdraw,
            LendingInstruction::FlashLoan,
            LendingInstruction::UpdateReserveConfig,
            LendingInstruction::FlashBorrow { amount: 0 },
            LendingInstruction::FlashRepay { amount: 0 },
            LendingInstruction::Sync,
        ];
        for (expected_tag, ix) in all.iter().enumerate() {
            assert_eq!(ix.tag() as usize, expected_tag, "{}", ix.name());
            assert_eq!(ix.pack().unwrap()[0] as usize, expected_tag);
        }
    }

    #[test]
    fn test_flash_borrow_encoding() {
        let data = LendingInstruction::FlashBorrow {
            amount: 100_000_000,
        }
        .pack()
        .unwrap();
        assert_eq!(data, vec![7, 0x00, 0xE1, 0xF5, 0x05, 0, 0, 0, 0]);

        let data = LendingInstruction::FlashRepay { amount: 1 }.pack().unwrap();
        assert_eq!(data, vec![8, 1, 0, 0, 0, 0, 0, 0, 0]);

        assert_eq!(LendingInstruction::Sync.pack().unwrap(), vec![9]);
    }

    #[test]
    fn test_instruction_unpack() {
        let ix = LendingInstruction::unpack(&[8, 0x40, 0x42, 0x0F, 0, 0, 0, 0, 0]).unwrap();
        assert_eq!(ix, LendingInstruction::FlashRepay { amount: 1_000_000 });

        assert_eq!(
            LendingInstruction::unpack(&[3]).unwrap(),
            LendingInstruction::Deposit
        );
    }

    #[test]
    fn test_instruction_unpack_errors() {
        assert_eq!(
            LendingInstruction::unpack(&[10]),
            Err(LayoutError::UnknownDiscriminant(10))
        );
        assert_eq!(
            LendingInstruction::unpack(&[0xFF, 1, 2]),
            Err(LayoutError::UnknownDiscriminant(0xFF))
        );
        assert!(matches!(
            LendingInstruction::unpack(&[]),
            Err(LayoutError::LengthMismatch { actual: 0, .. })
        ));
        // Truncated amount
        assert!(matches!(
            LendingInstruction::unpack(&[7, 1, 2, 3]),
            Err(LayoutError::LengthMismatch {
                expected: 9,
                actual: 4,
                ..
            })
        ));
        // Payload on a bare variant
        assert!(matches!(
            LendingInstruction::unpack(&[9, 0]),
            Err(LayoutError::LengthMismatch { expected: 1, .. })
        ));
    }
}
