//! Off-chain driver that walks a closed-day pool to `PaidOut`.
//!
//! Each iteration reads the pool, dispatches the one program instruction its status calls for,
//! and re-reads the pool to make sure the status moved. There is no lock: several participants
//! may resolve the same pool at once. Every step re-derives its precondition from fresh ledger
//! state, so a failed run is recovered by starting a new one.
//!
//! The ephemeral signer is funded before the first dispatch. Steps per effective status:
//! 1. `Open`: create a randomness account, then commit it together with the program's `close`.
//! 2. `Closed`: reveal the randomness together with `select`.
//! 3. `Selected`: `resolve` against the winning page.
//! 4. `Resolved`: `payout` to the winner, then refund the ephemeral signer.

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::{BidderConfig, ResolutionConfig};
use crate::constants::LAST_POOL_OFFSET;
use crate::ephemeral::{EphemeralSigner, EphemeralSignerManager};
use crate::error::{BidderError, ResolutionFailure};
use crate::gateway::{submit_privileged, LedgerGateway};
use crate::instructions::{
    build_close, build_payout, build_resolve, build_select, Close, Payout, Resolve, Select,
};
use crate::pda::{AddressDeriver, PoolSeed};
use crate::randomness::{CommitRetry, RandomnessOracle, RandomnessSession};
use crate::state::{Pool, PoolStatus};
use crate::wallet::Wallet;

/// The pool a resolver drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolTarget {
    pub pool: Pubkey,
    pub day_id: i64,
}

impl PoolTarget {
    /// Yesterday's pool, the one waiting to be resolved.
    pub fn last_pool(deriver: &AddressDeriver) -> Result<Self, BidderError> {
        let (pool, day_id) = deriver.pool(LAST_POOL_OFFSET)?;
        Ok(Self { pool, day_id })
    }

    pub fn for_day(deriver: &AddressDeriver, day_id: i64) -> Result<Self, BidderError> {
        Ok(Self { pool: deriver.pool_for_day(day_id)?, day_id })
    }
}

/// Where a run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveStep {
    ReadPool,
    Fund,
    Close,
    Select,
    Resolve,
    Payout,
}

impl ResolveStep {
    fn for_status(status: PoolStatus) -> Self {
        match status {
            PoolStatus::Open => ResolveStep::Close,
            PoolStatus::Closed => ResolveStep::Select,
            PoolStatus::Selected => ResolveStep::Resolve,
            PoolStatus::Resolved => ResolveStep::Payout,
            PoolStatus::PaidOut => ResolveStep::ReadPool,
        }
    }
}

impl fmt::Display for ResolveStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResolveStep::ReadPool => "read-pool",
            ResolveStep::Fund => "fund",
            ResolveStep::Close => "close",
            ResolveStep::Select => "select",
            ResolveStep::Resolve => "resolve",
            ResolveStep::Payout => "payout",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub enum ResolveOutcome {
    /// The pool was paid out before this run touched anything; no funds moved.
    AlreadyResolved,
    /// The pool reached `PaidOut` during this run.
    Resolved {
        /// Our payout transaction; `None` when the pool reached `PaidOut` without one.
        payout: Option<Signature>,
        /// Refund of the ephemeral signer; `None` when there was nothing to refund.
        refund: Option<Signature>,
        /// Set when the refund failed. The pool is still resolved.
        refund_error: Option<BidderError>,
    },
}

#[derive(Debug)]
pub enum Progress {
    /// One program instruction landed and the pool moved on.
    Advanced { from: PoolStatus, to: PoolStatus, signatures: Vec<Signature> },
    Finished(ResolveOutcome),
}

pub struct PoolResolver {
    gateway: Arc<dyn LedgerGateway>,
    oracle: Arc<dyn RandomnessOracle>,
    wallet: Arc<dyn Wallet>,
    signers: EphemeralSignerManager,
    deriver: AddressDeriver,
    fee_account: Pubkey,
    oracle_program: Pubkey,
    settings: ResolutionConfig,
    target: PoolTarget,
    /// Wallet that funds the run and receives the refund.
    owner: Pubkey,
    ephemeral: EphemeralSigner,
    fund_attempted: bool,
    funded: bool,
    queue: Option<Pubkey>,
    session: Option<RandomnessSession>,
    snapshot: Option<Pool>,
    iterations: u32,
    done: bool,
}

impl PoolResolver {
    /// Prepares a run against `target`. A fresh ephemeral signer is generated here so its
    /// recovery secret can be shown before anything is funded.
    pub fn new(
        gateway: Arc<dyn LedgerGateway>,
        signers: EphemeralSignerManager,
        oracle: Arc<dyn RandomnessOracle>,
        wallet: Arc<dyn Wallet>,
        config: &BidderConfig,
        target: PoolTarget,
    ) -> Result<Self, BidderError> {
        let owner = wallet.connected_pubkey()?;
        let ephemeral = signers.create();
        Ok(Self {
            gateway,
            oracle,
            wallet,
            signers,
            deriver: AddressDeriver::new(config.program_id),
            fee_account: config.fee_account,
            oracle_program: config.oracle_program_id,
            settings: config.resolution.clone(),
            target,
            owner,
            ephemeral,
            fund_attempted: false,
            funded: false,
            queue: None,
            session: None,
            snapshot: None,
            iterations: 0,
            done: false,
        })
    }

    pub fn ephemeral(&self) -> &EphemeralSigner {
        &self.ephemeral
    }

    pub fn target(&self) -> PoolTarget {
        self.target
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Drives [`Self::step`] until the pool is paid out, a step fails, or the iteration budget
    /// runs out. Any failure after funding was attempted is followed by one refund pass.
    pub async fn run(mut self) -> Result<ResolveOutcome, ResolutionFailure> {
        info!(
            pool = %self.target.pool,
            day_id = self.target.day_id,
            ephemeral = %self.ephemeral.pubkey(),
            "resolving pool"
        );
        loop {
            match self.step().await {
                Ok(Progress::Finished(outcome)) => return Ok(outcome),
                Ok(Progress::Advanced { .. }) => continue,
                Err(failure) => return Err(self.abort(failure).await),
            }
        }
    }

    /// Runs one iteration of the state machine.
    ///
    /// Callers stepping manually own the refund on failure, see [`Self::refund`].
    pub async fn step(&mut self) -> Result<Progress, ResolutionFailure> {
        if self.done {
            return Err(ResolutionFailure::new(
                ResolveStep::ReadPool,
                BidderError::Validation("resolution run already finished".to_string()),
            ));
        }

        let pool = match self.snapshot.take() {
            Some(pool) => pool,
            None => self.read_pool().await?,
        };
        let status = pool.status().map_err(|err| ResolutionFailure::new(ResolveStep::ReadPool, err))?;

        if status == PoolStatus::PaidOut {
            if !self.fund_attempted {
                info!(pool = %self.target.pool, "pool already resolved");
                self.done = true;
                return Ok(Progress::Finished(ResolveOutcome::AlreadyResolved));
            }
            return Ok(Progress::Finished(self.finish(None).await));
        }

        let effective = self.effective_status(&pool, status);
        let step = ResolveStep::for_status(effective);
        if self.iterations >= self.settings.max_iterations {
            return Err(ResolutionFailure::new(
                step,
                BidderError::ResolutionTimedOut(self.settings.max_iterations),
            ));
        }
        self.iterations += 1;
        if effective != status {
            warn!(
                pool = %self.target.pool,
                bound = %pool.randomness_account,
                "pool bound to a stale randomness account, closing again"
            );
        }
        info!(pool = %self.target.pool, status = %effective, iteration = self.iterations, "dispatching");

        let mut signatures = Vec::new();
        if !self.funded {
            signatures.push(self.fund().await?);
        }
        let dispatched = match effective {
            PoolStatus::Open => self.close_pool().await,
            PoolStatus::Closed => self.select_pool().await,
            PoolStatus::Selected => self.resolve_pool(&pool).await,
            PoolStatus::Resolved => {
                let payout = self.payout_pool(&pool).await.map_err(|err| ResolutionFailure::new(step, err))?;
                info!(pool = %self.target.pool, signature = %payout, "pool paid out");
                return Ok(Progress::Finished(self.finish(Some(payout)).await));
            }
            PoolStatus::PaidOut => return Ok(Progress::Finished(self.finish(None).await)),
        };
        signatures.extend(dispatched.map_err(|err| ResolutionFailure::new(step, err))?);

        let next = self.read_pool().await?;
        let next_status = next.status().map_err(|err| ResolutionFailure::new(ResolveStep::ReadPool, err))?;
        if next_status == PoolStatus::PaidOut {
            info!(pool = %self.target.pool, "pool reached paid-out");
            return Ok(Progress::Finished(self.finish(None).await));
        }
        let next_effective = self.effective_status(&next, next_status);
        if next_effective == effective {
            return Err(ResolutionFailure::new(step, BidderError::StatusStalled(effective)));
        }

        info!(pool = %self.target.pool, from = %effective, to = %next_effective, "pool advanced");
        self.snapshot = Some(next);
        Ok(Progress::Advanced { from: effective, to: next_effective, signatures })
    }

    /// Drains the ephemeral signer back to the participant's wallet. Idempotent.
    pub async fn refund(&self) -> Result<Option<Signature>, BidderError> {
        self.signers.refund(&self.ephemeral, &self.owner).await
    }

    /// `Closed` bound to a randomness account other than this run's counts as `Open`: the
    /// earlier attempt is abandoned and the pool is closed again with a fresh session.
    fn effective_status(&self, pool: &Pool, status: PoolStatus) -> PoolStatus {
        let ours = self.session.as_ref().map(|session| session.pubkey());
        if status == PoolStatus::Closed && ours != Some(pool.randomness_account) {
            PoolStatus::Open
        } else {
            status
        }
    }

    async fn read_pool(&self) -> Result<Pool, ResolutionFailure> {
        self.gateway
            .pool(&self.target.pool)
            .await
            .and_then(|pool| pool.ok_or(BidderError::NoPoolToResolve))
            .map_err(|err| ResolutionFailure::new(ResolveStep::ReadPool, err))
    }

    fn commit_retry(&self) -> CommitRetry {
        CommitRetry {
            attempts: self.settings.commit_attempts,
            backoff: self.settings.commit_backoff(),
        }
    }

    /// Moves the stake into the ephemeral signer. Attempted at most once per run.
    async fn fund(&mut self) -> Result<Signature, ResolutionFailure> {
        self.fund_attempted = true;
        let signature = self
            .signers
            .fund(self.wallet.as_ref(), &self.ephemeral, self.settings.ephemeral_stake_lamports)
            .await
            .map_err(|err| ResolutionFailure::new(ResolveStep::Fund, err))?;
        self.funded = true;
        Ok(signature)
    }

    /// Opens a fresh randomness session, then commits it together with the program's `close`.
    async fn close_pool(&mut self) -> Result<Vec<Signature>, BidderError> {
        let payer = self.ephemeral.pubkey();
        let budget = self.settings.compute_budget();
        let queue = match self.queue {
            Some(queue) => queue,
            None => {
                let queue = self.oracle.default_queue().await?;
                self.queue = Some(queue);
                queue
            }
        };

        let (session, create_ix) = RandomnessSession::open(self.oracle.as_ref(), queue, &payer).await?;
        let created = submit_privileged(
            self.gateway.as_ref(),
            &[create_ix],
            &[self.ephemeral.keypair(), session.account()],
            budget,
        )
        .await?;
        info!(account = %session.pubkey(), signature = %created, "randomness account created");

        session.ensure_registered(self.gateway.as_ref(), &self.oracle_program).await?;
        let commit_ix = session.commit_instruction(self.oracle.as_ref(), self.commit_retry()).await?;
        let close_ix = build_close(
            &self.deriver.program_id(),
            &Close {
                signer: payer,
                pool: self.target.pool,
                randomness_account_data: session.pubkey(),
            },
        );
        let closed = submit_privileged(
            self.gateway.as_ref(),
            &[commit_ix, close_ix],
            &[self.ephemeral.keypair()],
            budget,
        )
        .await?;
        info!(pool = %self.target.pool, signature = %closed, "pool closed");
        self.session = Some(session);
        Ok(vec![created, closed])
    }

    async fn select_pool(&self) -> Result<Vec<Signature>, BidderError> {
        let session = self.session.as_ref().ok_or_else(|| {
            BidderError::Validation("no randomness session bound to this run".to_string())
        })?;
        let payer = self.ephemeral.pubkey();
        let reveal_ix = session.reveal_instruction(self.oracle.as_ref(), &payer).await?;
        let select_ix = build_select(
            &self.deriver.program_id(),
            &Select {
                signer: payer,
                pool: self.target.pool,
                pages: self.deriver.derive(&self.target.pool, PoolSeed::Pages)?,
                randomness_account_data: session.pubkey(),
            },
        );
        let signature = submit_privileged(
            self.gateway.as_ref(),
            &[reveal_ix, select_ix],
            &[self.ephemeral.keypair()],
            self.settings.compute_budget(),
        )
        .await?;
        info!(pool = %self.target.pool, %signature, "winner selected");
        Ok(vec![signature])
    }

    async fn resolve_pool(&self, pool: &Pool) -> Result<Vec<Signature>, BidderError> {
        let resolve_ix = build_resolve(
            &self.deriver.program_id(),
            &Resolve {
                signer: self.ephemeral.pubkey(),
                pool: self.target.pool,
                page: self.deriver.page(&self.target.pool, pool.winning_page)?,
            },
        );
        let signature = submit_privileged(
            self.gateway.as_ref(),
            &[resolve_ix],
            &[self.ephemeral.keypair()],
            self.settings.compute_budget(),
        )
        .await?;
        info!(pool = %self.target.pool, page = pool.winning_page, %signature, "winner resolved");
        Ok(vec![signature])
    }

    async fn payout_pool(&self, pool: &Pool) -> Result<Signature, BidderError> {
        let payout_ix = build_payout(
            &self.deriver.program_id(),
            &Payout {
                signer: self.ephemeral.pubkey(),
                pool: self.target.pool,
                winner: pool.winner,
                fee: self.fee_account,
            },
        );
        submit_privileged(
            self.gateway.as_ref(),
            &[payout_ix],
            &[self.ephemeral.keypair()],
            self.settings.compute_budget(),
        )
        .await
    }

    async fn finish(&mut self, payout: Option<Signature>) -> ResolveOutcome {
        self.done = true;
        if !self.fund_attempted {
            return ResolveOutcome::Resolved { payout, refund: None, refund_error: None };
        }
        match self.refund().await {
            Ok(refund) => ResolveOutcome::Resolved { payout, refund, refund_error: None },
            Err(err) => {
                error!(ephemeral = %self.ephemeral.pubkey(), error = %err, "refund after resolution failed");
                ResolveOutcome::Resolved { payout, refund: None, refund_error: Some(err) }
            }
        }
    }

    async fn abort(&mut self, mut failure: ResolutionFailure) -> ResolutionFailure {
        self.done = true;
        error!(pool = %self.target.pool, step = %failure.step, error = %failure.error, "resolution failed");
        if self.fund_attempted {
            if let Err(err) = self.refund().await {
                error!(ephemeral = %self.ephemeral.pubkey(), error = %err, "refund after failure failed");
                failure.refund_error = Some(err);
            }
        }
        failure
    }
}
