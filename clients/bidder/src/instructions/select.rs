use anchor_lang::prelude::*;
use anchor_lang::{Discriminator, InstructionData, ToAccountMetas};
use solana_program::instruction::{AccountMeta, Instruction};

use crate::constants::SELECT_DISCRIMINATOR;

/// Accounts required to draw the winning entry from the revealed randomness.
pub struct Select {
    /// Ephemeral signer paying for the resolution.
    pub signer: Pubkey,

    /// Closed pool awaiting selection.
    pub pool: Pubkey,

    /// Per-page totals the program walks to find the winning page.
    pub pages: Pubkey,

    /// Oracle account bound to the pool on `close`.
    pub randomness_account_data: Pubkey,
}

impl ToAccountMetas for Select {
    fn to_account_metas(&self, _is_signer: Option<bool>) -> Vec<AccountMeta> {
        vec![
            AccountMeta::new(self.signer, true),
            AccountMeta::new(self.pool, false),
            AccountMeta::new_readonly(self.pages, false),
            AccountMeta::new_readonly(self.randomness_account_data, false),
        ]
    }
}

#[derive(AnchorSerialize)]
pub struct SelectArgs {}

impl Discriminator for SelectArgs {
    const DISCRIMINATOR: [u8; 8] = SELECT_DISCRIMINATOR;
}

impl InstructionData for SelectArgs {}

pub fn build_select(program_id: &Pubkey, accounts: &Select) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: accounts.to_account_metas(None),
        data: SelectArgs {}.data(),
    }
}
