//! Client configuration, layered with Figment.
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. TOML config file
//! 3. Environment variables (`BIDDER_` prefix, `__` between nested keys)

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::constants::{
    COMMIT_ATTEMPTS, COMMIT_BACKOFF_MS, COMPUTE_UNIT_LIMIT, COMPUTE_UNIT_PRICE, EPHEMERAL_STAKE_LAMPORTS, FEE_ACCOUNT,
    MAX_RESOLVE_ITERATIONS, ORACLE_PROGRAM_ID,
};
use crate::error::BidderError;
use crate::gateway::ComputeBudget;

const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";
const DEFAULT_COMMITMENT: &str = "confirmed";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONFIRM_TIMEOUT_SECS: u64 = 60;
const DEFAULT_CONFIRM_POLL_MS: u64 = 500;

/// Environment variable prefix for config overrides.
///
/// Example: `BIDDER_RESOLUTION__MAX_ITERATIONS` -> `resolution.max_iterations`
const ENV_PREFIX: &str = "BIDDER_";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidderConfig {
    pub rpc_url: String,
    /// `processed`, `confirmed` or `finalized`.
    pub commitment: String,
    #[serde(with = "pubkey_str")]
    pub program_id: Pubkey,
    #[serde(with = "pubkey_str")]
    pub fee_account: Pubkey,
    #[serde(with = "pubkey_str")]
    pub oracle_program_id: Pubkey,
    pub request_timeout_secs: u64,
    pub confirm_timeout_secs: u64,
    pub confirm_poll_ms: u64,
    #[serde(default)]
    pub resolution: ResolutionConfig,
}

/// Knobs of a single resolution run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionConfig {
    /// Lamports moved into the ephemeral signer before resolving.
    pub ephemeral_stake_lamports: u64,
    /// Iteration budget of one run.
    pub max_iterations: u32,
    /// Attempts at building the oracle commit instruction.
    pub commit_attempts: u32,
    /// Fixed pause between commit attempts.
    pub commit_backoff_ms: u64,
    /// Priority fee in micro-lamports per compute unit, `0` disables it.
    pub compute_unit_price: u64,
    /// Compute-unit limit of resolution transactions, `0` leaves the runtime default.
    pub compute_unit_limit: u32,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            ephemeral_stake_lamports: EPHEMERAL_STAKE_LAMPORTS,
            max_iterations: MAX_RESOLVE_ITERATIONS,
            commit_attempts: COMMIT_ATTEMPTS,
            commit_backoff_ms: COMMIT_BACKOFF_MS,
            compute_unit_price: COMPUTE_UNIT_PRICE,
            compute_unit_limit: COMPUTE_UNIT_LIMIT,
        }
    }
}

impl ResolutionConfig {
    pub fn commit_backoff(&self) -> Duration {
        Duration::from_millis(self.commit_backoff_ms)
    }

    pub fn compute_budget(&self) -> ComputeBudget {
        ComputeBudget { unit_limit: self.compute_unit_limit, unit_price: self.compute_unit_price }
    }
}

impl Default for BidderConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            commitment: DEFAULT_COMMITMENT.to_string(),
            program_id: crate::ID,
            fee_account: FEE_ACCOUNT,
            oracle_program_id: ORACLE_PROGRAM_ID,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            confirm_timeout_secs: DEFAULT_CONFIRM_TIMEOUT_SECS,
            confirm_poll_ms: DEFAULT_CONFIRM_POLL_MS,
            resolution: ResolutionConfig::default(),
        }
    }
}

impl BidderConfig {
    /// Loads defaults, then `path` (if given), then `BIDDER_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, BidderError> {
        let mut figment = Figment::from(Serialized::defaults(BidderConfig::default()));
        if let Some(path) = path {
            debug!(path = %path.display(), "loading config file");
            figment = figment.merge(Toml::file(path));
        }
        let config: BidderConfig = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|err| BidderError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BidderError> {
        self.commitment_config()?;
        if self.rpc_url.trim().is_empty() {
            return Err(BidderError::Config("rpc_url must not be empty".to_string()));
        }
        let resolution = &self.resolution;
        if resolution.max_iterations == 0 {
            return Err(BidderError::Config("resolution.max_iterations must be > 0".to_string()));
        }
        if resolution.commit_attempts == 0 {
            return Err(BidderError::Config("resolution.commit_attempts must be > 0".to_string()));
        }
        if resolution.ephemeral_stake_lamports == 0 {
            return Err(BidderError::Config(
                "resolution.ephemeral_stake_lamports must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn commitment_config(&self) -> Result<CommitmentConfig, BidderError> {
        match self.commitment.as_str() {
            "processed" => Ok(CommitmentConfig::processed()),
            "confirmed" => Ok(CommitmentConfig::confirmed()),
            "finalized" => Ok(CommitmentConfig::finalized()),
            other => Err(BidderError::Config(format!("unknown commitment level '{other}'"))),
        }
    }
}

/// Base58 (de)serialization for public keys in config files.
mod pubkey_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use solana_sdk::pubkey::Pubkey;
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(key: &Pubkey, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&key.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Pubkey, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Pubkey::from_str(raw.trim()).map_err(|err| serde::de::Error::custom(format!("invalid pubkey '{raw}': {err}")))
    }
}
