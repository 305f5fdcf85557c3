use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use std::sync::Arc;
use tracing::info;

use crate::constants::LAMPORTS_PER_SOL;
use crate::error::BidderError;
use crate::gateway::{submit_with_wallet, LedgerGateway};
use crate::instructions::{build_entry, Entry, EntryArgs};
use crate::pda::{AddressDeriver, PoolSeed};
use crate::wallet::Wallet;

/// Converts a user-entered SOL amount to lamports, rounding to the nearest lamport.
pub fn lamports_from_sol(sol: f64) -> Result<u64, BidderError> {
    if !sol.is_finite() || sol <= 0.0 {
        return Err(BidderError::Validation(format!("invalid amount {sol}")));
    }
    let lamports = (sol * LAMPORTS_PER_SOL as f64).round();
    if lamports < 1.0 || lamports >= u64::MAX as f64 {
        return Err(BidderError::Validation(format!("amount {sol} is out of range")));
    }
    Ok(lamports as u64)
}

/// Sends a participant's contribution to today's pool.
pub struct EntrySubmitter {
    gateway: Arc<dyn LedgerGateway>,
    deriver: AddressDeriver,
}

impl EntrySubmitter {
    pub fn new(gateway: Arc<dyn LedgerGateway>, deriver: AddressDeriver) -> Self {
        Self { gateway, deriver }
    }

    /// Contributes `amount` lamports from `wallet` to the current day's pool.
    ///
    /// Never retried: a rejected contribution (e.g. `PageFull`) is returned to the caller as is.
    pub async fn submit(&self, wallet: &dyn Wallet, amount: u64) -> Result<Signature, BidderError> {
        if amount == 0 {
            return Err(BidderError::Validation("amount must be greater than zero".to_string()));
        }
        let signer = wallet.connected_pubkey()?;
        let (pool, day_id) = self.deriver.pool(0)?;
        let accounts = self.entry_accounts(signer, pool).await?;

        let ix = build_entry(&self.deriver.program_id(), &accounts, EntryArgs { amount, day_id });
        let signature = submit_with_wallet(self.gateway.as_ref(), wallet, &[ix]).await?;
        info!(%pool, day_id, amount, %signature, "entry submitted");
        Ok(signature)
    }

    async fn entry_accounts(&self, signer: Pubkey, pool: Pubkey) -> Result<Entry, BidderError> {
        // The program creates the pool on the first entry of the day.
        let current_page = self
            .gateway
            .pool(&pool)
            .await?
            .map(|snapshot| snapshot.current_page)
            .unwrap_or(0);

        Ok(Entry {
            signer,
            pool,
            vault: self.deriver.derive(&pool, PoolSeed::Vault)?,
            pages: self.deriver.derive(&pool, PoolSeed::Pages)?,
            page: self.deriver.page(&pool, current_page)?,
            user: self.deriver.derive(&pool, PoolSeed::User(signer))?,
        })
    }
}
