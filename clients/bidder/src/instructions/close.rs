use anchor_lang::prelude::*;
use anchor_lang::{Discriminator, InstructionData, ToAccountMetas};
use solana_program::instruction::{AccountMeta, Instruction};

use crate::constants::CLOSE_DISCRIMINATOR;

/// Accounts required to close a pool and bind its randomness account.
pub struct Close {
    /// Ephemeral signer paying for the resolution.
    pub signer: Pubkey,

    /// Pool being closed.
    pub pool: Pubkey,

    /// Oracle account whose commitment gets bound to the pool.
    pub randomness_account_data: Pubkey,
}

impl ToAccountMetas for Close {
    fn to_account_metas(&self, _is_signer: Option<bool>) -> Vec<AccountMeta> {
        vec![
            AccountMeta::new(self.signer, true),
            AccountMeta::new(self.pool, false),
            AccountMeta::new_readonly(self.randomness_account_data, false),
        ]
    }
}

#[derive(AnchorSerialize)]
pub struct CloseArgs {}

impl Discriminator for CloseArgs {
    const DISCRIMINATOR: [u8; 8] = CLOSE_DISCRIMINATOR;
}

impl InstructionData for CloseArgs {}

pub fn build_close(program_id: &Pubkey, accounts: &Close) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: accounts.to_account_metas(None),
        data: CloseArgs {}.data(),
    }
}
