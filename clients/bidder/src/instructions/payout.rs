use anchor_lang::prelude::*;
use anchor_lang::{Discriminator, InstructionData, ToAccountMetas};
use solana_program::instruction::{AccountMeta, Instruction};
use solana_program::system_program;

use crate::constants::PAYOUT_DISCRIMINATOR;

/// Accounts required to pay out a resolved pool.
///
/// The program pays out of the pool account itself and splits the pot three ways:
/// 1. A static resolver fee to `signer`.
/// 2. The service fee to `fee`.
/// 3. The remainder to `winner`.
pub struct Payout {
    /// Ephemeral signer; receives the resolver fee.
    pub signer: Pubkey,

    /// Pool in the `Resolved` state.
    pub pool: Pubkey,

    /// Winner recorded on the pool.
    pub winner: Pubkey,

    /// Protocol fee account.
    pub fee: Pubkey,
}

impl ToAccountMetas for Payout {
    fn to_account_metas(&self, _is_signer: Option<bool>) -> Vec<AccountMeta> {
        vec![
            AccountMeta::new(self.signer, true),
            AccountMeta::new(self.pool, false),
            AccountMeta::new(self.winner, false),
            AccountMeta::new(self.fee, false),
            AccountMeta::new_readonly(system_program::ID, false),
        ]
    }
}

#[derive(AnchorSerialize)]
pub struct PayoutArgs {}

impl Discriminator for PayoutArgs {
    const DISCRIMINATOR: [u8; 8] = PAYOUT_DISCRIMINATOR;
}

impl InstructionData for PayoutArgs {}

pub fn build_payout(program_id: &Pubkey, accounts: &Payout) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: accounts.to_account_metas(None),
        data: PayoutArgs {}.data(),
    }
}
