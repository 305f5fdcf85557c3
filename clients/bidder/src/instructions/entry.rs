use anchor_lang::prelude::*;
use anchor_lang::{Discriminator, InstructionData, ToAccountMetas};
use solana_program::instruction::{AccountMeta, Instruction};
use solana_program::system_program;

use crate::constants::ENTRY_DISCRIMINATOR;

/// Accounts required to contribute to the current day's pool.
///
/// The program creates the pool, vault, pages, page and user accounts on first use, so all of
/// them are passed writable.
pub struct Entry {
    /// Participant making the contribution.
    pub signer: Pubkey,

    /// Pool of the current day.
    pub pool: Pubkey,

    /// Lamport vault of the pool.
    pub vault: Pubkey,

    /// Per-page totals.
    pub pages: Pubkey,

    /// Page at the pool's `current_page` index.
    pub page: Pubkey,

    /// Participant's record in the pool.
    pub user: Pubkey,
}

impl ToAccountMetas for Entry {
    fn to_account_metas(&self, _is_signer: Option<bool>) -> Vec<AccountMeta> {
        vec![
            AccountMeta::new(self.signer, true),
            AccountMeta::new(self.pool, false),
            AccountMeta::new(self.vault, false),
            AccountMeta::new(self.pages, false),
            AccountMeta::new(self.page, false),
            AccountMeta::new(self.user, false),
            AccountMeta::new_readonly(system_program::ID, false),
        ]
    }
}

#[derive(AnchorSerialize)]
pub struct EntryArgs {
    /// Contribution in lamports.
    pub amount: u64,

    /// Epoch of the pool; must be today's.
    pub day_id: i64,
}

impl Discriminator for EntryArgs {
    const DISCRIMINATOR: [u8; 8] = ENTRY_DISCRIMINATOR;
}

impl InstructionData for EntryArgs {}

pub fn build_entry(program_id: &Pubkey, accounts: &Entry, args: EntryArgs) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: accounts.to_account_metas(None),
        data: args.data(),
    }
}
