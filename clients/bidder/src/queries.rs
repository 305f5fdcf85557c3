//! Read-only views over the daily pools.

use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;

use crate::constants::LAST_POOL_OFFSET;
use crate::error::BidderError;
use crate::gateway::LedgerGateway;
use crate::pda::{AddressDeriver, PoolSeed};
use crate::state::Pool;

pub struct PoolQueries {
    gateway: Arc<dyn LedgerGateway>,
    deriver: AddressDeriver,
}

impl PoolQueries {
    pub fn new(gateway: Arc<dyn LedgerGateway>, deriver: AddressDeriver) -> Self {
        Self { gateway, deriver }
    }

    /// Yesterday's pool, `None` if nobody entered it.
    pub async fn last_pool(&self) -> Result<Option<Pool>, BidderError> {
        let (pool, _) = self.deriver.pool(LAST_POOL_OFFSET)?;
        self.gateway.pool(&pool).await
    }

    /// Lamports held by today's vault.
    pub async fn pool_size(&self) -> Result<u64, BidderError> {
        let (pool, _) = self.deriver.pool(0)?;
        let vault = self.deriver.derive(&pool, PoolSeed::Vault)?;
        self.gateway.balance(&vault).await
    }

    /// Total `owner` contributed to today's pool.
    pub async fn user_entries(&self, owner: &Pubkey) -> Result<u64, BidderError> {
        let (pool, _) = self.deriver.pool(0)?;
        let user = self.deriver.derive(&pool, PoolSeed::User(*owner))?;
        Ok(self.gateway.user(&user).await?.map(|user| user.entries).unwrap_or(0))
    }
}
