//! Commit/reveal session against the randomness oracle.
//!
//! One session per resolution attempt: its account is created and committed together with the
//! pool's `close`, then revealed together with `select`, then abandoned.

use async_trait::async_trait;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::constants::{COMMIT_ATTEMPTS, COMMIT_BACKOFF_MS};
use crate::error::BidderError;
use crate::gateway::LedgerGateway;

/// The oracle's client SDK. Every call either returns a ready instruction or fails.
#[async_trait]
pub trait RandomnessOracle: Send + Sync {
    /// Default oracle queue for the connected network.
    async fn default_queue(&self) -> Result<Pubkey, BidderError>;

    /// Instruction registering `account` on `queue`, paid by `payer`.
    async fn create_instruction(
        &self,
        account: &Pubkey,
        queue: &Pubkey,
        payer: &Pubkey,
    ) -> Result<Instruction, BidderError>;

    /// Commit instruction for `account`. May fail until the oracle has indexed the account.
    async fn commit_instruction(&self, account: &Pubkey, queue: &Pubkey) -> Result<Instruction, BidderError>;

    /// Reveal instruction for `account`, paid by `payer`.
    async fn reveal_instruction(&self, account: &Pubkey, payer: &Pubkey) -> Result<Instruction, BidderError>;
}

/// Fixed-attempt, fixed-delay retry policy for building the commit instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitRetry {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for CommitRetry {
    fn default() -> Self {
        Self { attempts: COMMIT_ATTEMPTS, backoff: Duration::from_millis(COMMIT_BACKOFF_MS) }
    }
}

pub struct RandomnessSession {
    account: Keypair,
    queue: Pubkey,
}

impl RandomnessSession {
    /// Allocates a fresh oracle account and returns the instruction that registers it.
    ///
    /// The returned instruction must be signed by both the fee payer and [`Self::account`].
    pub async fn open(
        oracle: &dyn RandomnessOracle,
        queue: Pubkey,
        fee_payer: &Pubkey,
    ) -> Result<(Self, Instruction), BidderError> {
        let account = Keypair::new();
        let create_ix = oracle.create_instruction(&account.pubkey(), &queue, fee_payer).await?;
        debug!(account = %account.pubkey(), queue = %queue, "randomness session opened");
        Ok((Self { account, queue }, create_ix))
    }

    pub fn pubkey(&self) -> Pubkey {
        self.account.pubkey()
    }

    pub fn account(&self) -> &Keypair {
        &self.account
    }

    pub fn queue(&self) -> Pubkey {
        self.queue
    }

    /// Checks that the session account exists and belongs to `oracle_program`.
    pub async fn ensure_registered(
        &self,
        gateway: &dyn LedgerGateway,
        oracle_program: &Pubkey,
    ) -> Result<(), BidderError> {
        match gateway.account(&self.pubkey()).await? {
            Some(account) if account.owner == *oracle_program => Ok(()),
            Some(account) => Err(BidderError::Validation(format!(
                "randomness account {} is owned by {}, expected {}",
                self.pubkey(),
                account.owner,
                oracle_program
            ))),
            None => Err(BidderError::Validation(format!(
                "randomness account {} was not created",
                self.pubkey()
            ))),
        }
    }

    /// Builds the commit instruction, retrying up to `retry.attempts` times with a fixed pause.
    ///
    /// Exhaustion is fatal for the current attempt and surfaces as `OracleUnavailable`.
    pub async fn commit_instruction(
        &self,
        oracle: &dyn RandomnessOracle,
        retry: CommitRetry,
    ) -> Result<Instruction, BidderError> {
        let account = self.pubkey();
        let mut last = String::from("no attempt made");
        for attempt in 1..=retry.attempts {
            match oracle.commit_instruction(&account, &self.queue).await {
                Ok(ix) => {
                    debug!(%account, attempt, "commit instruction ready");
                    return Ok(ix);
                }
                Err(err) => {
                    warn!(%account, attempt, error = %err, "commit instruction not ready, retrying");
                    last = err.to_string();
                    if attempt < retry.attempts {
                        sleep(retry.backoff).await;
                    }
                }
            }
        }
        Err(BidderError::OracleUnavailable { attempts: retry.attempts, last })
    }

    /// Builds the reveal instruction. Single attempt; the oracle does its own retrying.
    pub async fn reveal_instruction(
        &self,
        oracle: &dyn RandomnessOracle,
        payer: &Pubkey,
    ) -> Result<Instruction, BidderError> {
        oracle.reveal_instruction(&self.pubkey(), payer).await
    }
}
