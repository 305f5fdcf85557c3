//! Program-derived addresses of the daily pool and its sub-accounts.
//!
//! Everything here is pure: the same inputs always derive the same addresses.

use anchor_lang::prelude::*;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::constants::{PAGES_SEED, PAGE_SEED, POOL_SEED, SECONDS_PER_DAY, USER_SEED, VAULT_SEED};
use crate::error::BidderError;

/// Sub-accounts hanging off a pool address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolSeed {
    /// Lamport vault of the pool.
    Vault,
    /// Per-page totals used to locate the winning page.
    Pages,
    /// One page of entries. The index is written as little-endian `i64`.
    Page(i64),
    /// A participant's record in the pool.
    User(Pubkey),
}

#[derive(Debug, Clone, Copy)]
pub struct AddressDeriver {
    program_id: Pubkey,
}

impl Default for AddressDeriver {
    fn default() -> Self {
        Self::new(crate::ID)
    }
}

impl AddressDeriver {
    pub fn new(program_id: Pubkey) -> Self {
        Self { program_id }
    }

    pub fn program_id(&self) -> Pubkey {
        self.program_id
    }

    /// Epoch id of the day containing `unix_timestamp`, shifted by `offset` days.
    pub fn day_id_at(unix_timestamp: i64, offset: i64) -> std::result::Result<i64, BidderError> {
        if unix_timestamp < 0 {
            return Err(BidderError::Validation(format!(
                "timestamp {unix_timestamp} predates the unix epoch"
            )));
        }
        (unix_timestamp / SECONDS_PER_DAY)
            .checked_add(offset)
            .ok_or_else(|| BidderError::Validation(format!("day offset {offset} overflows")))
    }

    /// Epoch id for the current wall-clock day shifted by `offset` (−1 is yesterday's pool).
    pub fn current_day_id(offset: i64) -> std::result::Result<i64, BidderError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|err| BidderError::Validation(format!("system clock before epoch: {err}")))?;
        Self::day_id_at(now.as_secs() as i64, offset)
    }

    /// Pool address and epoch id at `unix_timestamp` shifted by `offset` days.
    pub fn pool_at(
        &self,
        unix_timestamp: i64,
        offset: i64,
    ) -> std::result::Result<(Pubkey, i64), BidderError> {
        let day_id = Self::day_id_at(unix_timestamp, offset)?;
        Ok((self.pool_for_day(day_id)?, day_id))
    }

    /// Pool address and epoch id for today shifted by `offset` days.
    pub fn pool(&self, offset: i64) -> std::result::Result<(Pubkey, i64), BidderError> {
        let day_id = Self::current_day_id(offset)?;
        Ok((self.pool_for_day(day_id)?, day_id))
    }

    pub fn pool_for_day(&self, day_id: i64) -> std::result::Result<Pubkey, BidderError> {
        self.find(&[POOL_SEED, &day_id.to_le_bytes()])
    }

    /// Address of one of the pool's sub-accounts.
    pub fn derive(&self, pool: &Pubkey, seed: PoolSeed) -> std::result::Result<Pubkey, BidderError> {
        match seed {
            PoolSeed::Vault => self.find(&[VAULT_SEED, pool.as_ref()]),
            PoolSeed::Pages => self.find(&[PAGES_SEED, pool.as_ref()]),
            PoolSeed::Page(index) => {
                if index < 0 {
                    return Err(BidderError::Validation(format!("negative page index {index}")));
                }
                self.find(&[PAGE_SEED, pool.as_ref(), &index.to_le_bytes()])
            }
            PoolSeed::User(owner) => self.find(&[USER_SEED, pool.as_ref(), owner.as_ref()]),
        }
    }

    /// Page address for a page index as stored on the pool (`u64`).
    pub fn page(&self, pool: &Pubkey, index: u64) -> std::result::Result<Pubkey, BidderError> {
        let index = i64::try_from(index)
            .map_err(|_| BidderError::Validation(format!("page index {index} out of range")))?;
        self.derive(pool, PoolSeed::Page(index))
    }

    fn find(&self, seeds: &[&[u8]]) -> std::result::Result<Pubkey, BidderError> {
        if seeds.iter().any(|seed| seed.is_empty()) {
            return Err(BidderError::Validation("empty address seed".to_string()));
        }
        Ok(Pubkey::find_program_address(seeds, &self.program_id).0)
    }
}
