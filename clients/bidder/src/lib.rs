use anchor_lang::prelude::*;

pub mod config;
pub mod constants;
pub mod ephemeral;
pub mod error;
pub mod gateway;
pub mod instructions;
pub mod logging;
pub mod pda;
pub mod queries;
pub mod randomness;
pub mod resolver;
pub mod state;
pub mod submitter;
pub mod wallet;

pub use config::{BidderConfig, ResolutionConfig};
pub use ephemeral::{EphemeralSigner, EphemeralSignerManager};
pub use error::{BidderError, ProgramErrorCode, ResolutionFailure};
pub use gateway::{ComputeBudget, LedgerGateway, RpcGateway, SubmitMode};
pub use pda::{AddressDeriver, PoolSeed};
pub use queries::PoolQueries;
pub use randomness::{CommitRetry, RandomnessOracle, RandomnessSession};
pub use resolver::{PoolResolver, PoolTarget, Progress, ResolveOutcome, ResolveStep};
pub use state::{Pool, PoolStatus, User};
pub use submitter::{lamports_from_sol, EntrySubmitter};
pub use wallet::{KeypairWallet, Wallet};

declare_id!("JtMSXSCDbJ6ZDLwMFLXLmLZWLD1VGwzxUsA57nefbdr");
