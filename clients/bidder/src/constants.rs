use anchor_lang::prelude::*;

/// Seed prefix of the daily pool account.
pub const POOL_SEED: &[u8] = b"pool";
/// Seed prefix of the vault holding the pool's lamports.
pub const VAULT_SEED: &[u8] = b"vault";
/// Seed prefix of the page index account.
pub const PAGES_SEED: &[u8] = b"pages";
/// Seed prefix of a single page of entries.
pub const PAGE_SEED: &[u8] = b"page";
/// Seed prefix of a participant's per-pool record.
pub const USER_SEED: &[u8] = b"user";

pub const SECONDS_PER_DAY: i64 = 86_400;

/// Epoch offset of the pool that is waiting to be resolved.
pub const LAST_POOL_OFFSET: i64 = -1;

/// Protocol fee account the program checks on `payout`.
pub const FEE_ACCOUNT: Pubkey = pubkey!("TjgnAqExKJKAGmWKxr5sKuZE648nwvqYE8c4MQVqbdr");

/// Randomness oracle program that must own the randomness account bound on `close`.
pub const ORACLE_PROGRAM_ID: Pubkey = switchboard_on_demand::ON_DEMAND_MAINNET_PID;

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Stake moved into the ephemeral signer before resolving (0.1 SOL).
pub const EPHEMERAL_STAKE_LAMPORTS: u64 = 100_000_000;

pub const MAX_RESOLVE_ITERATIONS: u32 = 5;

pub const COMMIT_ATTEMPTS: u32 = 10;
pub const COMMIT_BACKOFF_MS: u64 = 50;

/// Priority fee attached to resolution transactions, in micro-lamports per compute unit.
pub const COMPUTE_UNIT_PRICE: u64 = 75_000;

/// Compute-unit limit attached to resolution transactions. Covers the oracle commit or reveal
/// bundled with `close` or `select`.
pub const COMPUTE_UNIT_LIMIT: u32 = 400_000;

// Anchor instruction discriminators, sha256("global:<name>")[..8].
pub const ENTRY_DISCRIMINATOR: [u8; 8] = [49, 1, 109, 22, 199, 43, 16, 153];
pub const CLOSE_DISCRIMINATOR: [u8; 8] = [98, 165, 201, 177, 108, 65, 206, 96];
pub const SELECT_DISCRIMINATOR: [u8; 8] = [135, 147, 132, 101, 155, 102, 202, 124];
pub const RESOLVE_DISCRIMINATOR: [u8; 8] = [246, 150, 236, 206, 108, 63, 58, 10];
pub const PAYOUT_DISCRIMINATOR: [u8; 8] = [149, 140, 194, 236, 174, 189, 6, 239];
