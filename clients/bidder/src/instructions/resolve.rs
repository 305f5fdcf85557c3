use anchor_lang::prelude::*;
use anchor_lang::{Discriminator, InstructionData, ToAccountMetas};
use solana_program::instruction::{AccountMeta, Instruction};

use crate::constants::RESOLVE_DISCRIMINATOR;

/// Accounts required to find the winner inside the winning page.
pub struct Resolve {
    /// Ephemeral signer paying for the resolution.
    pub signer: Pubkey,

    /// Pool in the `Selected` state.
    pub pool: Pubkey,

    /// Page at the pool's `winning_page` index.
    pub page: Pubkey,
}

impl ToAccountMetas for Resolve {
    fn to_account_metas(&self, _is_signer: Option<bool>) -> Vec<AccountMeta> {
        vec![
            AccountMeta::new(self.signer, true),
            AccountMeta::new(self.pool, false),
            AccountMeta::new(self.page, false),
        ]
    }
}

#[derive(AnchorSerialize)]
pub struct ResolveArgs {}

impl Discriminator for ResolveArgs {
    const DISCRIMINATOR: [u8; 8] = RESOLVE_DISCRIMINATOR;
}

impl InstructionData for ResolveArgs {}

pub fn build_resolve(program_id: &Pubkey, accounts: &Resolve) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: accounts.to_account_metas(None),
        data: ResolveArgs {}.data(),
    }
}
