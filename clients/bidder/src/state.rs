use anchor_lang::prelude::*;
use std::fmt;

use crate::error::BidderError;

/// Read-only mirror of the program's daily pool account.
#[account]
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Pool {
    /// Raw resolution status, see [`PoolStatus`].
    pub status: u8,

    /// Sum of all contributions in lamports.
    pub total_entries: u64,

    /// Page currently accepting entries.
    pub current_page: u64,

    /// Epoch the pool belongs to.
    pub day_id: i64,

    /// Seed slot of the randomness committed on `close`.
    pub close_slot: u64,

    /// Oracle account bound by the latest `close`.
    pub randomness_account: Pubkey,

    /// Winning entry index, set on `select`.
    pub winning_entry: u64,

    /// Page holding the winning entry, set on `select`.
    pub winning_page: u64,

    /// Winning participant, set on `resolve`.
    pub winner: Pubkey,
}

impl Pool {
    pub fn status(&self) -> std::result::Result<PoolStatus, BidderError> {
        PoolStatus::try_from(self.status)
    }

    /// Decodes a pool from raw account data, checking the account discriminator.
    pub fn from_account_data(data: &[u8]) -> std::result::Result<Self, BidderError> {
        let mut slice = data;
        Pool::try_deserialize(&mut slice)
            .map_err(|err| BidderError::Validation(format!("malformed pool account: {err}")))
    }
}

/// A participant's total contribution to one pool.
#[account]
#[derive(Debug, Default)]
pub struct User {
    pub entries: u64,
}

impl User {
    pub fn from_account_data(data: &[u8]) -> std::result::Result<Self, BidderError> {
        let mut slice = data;
        User::try_deserialize(&mut slice)
            .map_err(|err| BidderError::Validation(format!("malformed user account: {err}")))
    }
}

/// Resolution stage of a pool. Advances monotonically within one resolution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolStatus {
    Open = 0,
    Closed = 1,
    Selected = 2,
    Resolved = 3,
    PaidOut = 4,
}

impl TryFrom<u8> for PoolStatus {
    type Error = BidderError;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(PoolStatus::Open),
            1 => Ok(PoolStatus::Closed),
            2 => Ok(PoolStatus::Selected),
            3 => Ok(PoolStatus::Resolved),
            4 => Ok(PoolStatus::PaidOut),
            other => Err(BidderError::Validation(format!("unknown pool status {other}"))),
        }
    }
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PoolStatus::Open => "open",
            PoolStatus::Closed => "closed",
            PoolStatus::Selected => "selected",
            PoolStatus::Resolved => "resolved",
            PoolStatus::PaidOut => "paid-out",
        };
        f.write_str(name)
    }
}
