use anchor_lang::error_code;
use solana_sdk::instruction::InstructionError;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::TransactionError;
use std::fmt;
use thiserror::Error;

use crate::resolver::ResolveStep;
use crate::state::PoolStatus;

/// Errors reported by the pool program itself, offset from 6000 by Anchor.
#[error_code]
pub enum ProgramErrorCode {
    #[msg("Arithmetic overflow occurred")]
    Overflow,

    #[msg("The provided day ID does not match the current day")]
    BadDayId,

    #[msg("The lottery pool is closed for entries")]
    PoolClosed,

    #[msg("The amount must be greater than zero")]
    InvalidAmount,

    #[msg("The current page is already full")]
    PageFull,

    #[msg("The provided fee account is incorrect")]
    WrongFeeAccount,

    #[msg("The provided winner account is incorrect")]
    WrongWinnerAccount,

    #[msg("The randomness has already expired")]
    RandomnessExpired,

    #[msg("The randomness has already been revealed")]
    RandomnessAlreadyRevealed,

    #[msg("The provided randomness account is invalid")]
    InvalidRandomnessAccount,

    #[msg("The randomness has not been resolved yet")]
    RandomnessNotResolved,

    #[msg("The provided randomness value is invalid")]
    RandomnessValueError,

    #[msg("The provided account owner is invalid")]
    InvalidAccountOwner,

    #[msg("The provided account state is invalid")]
    InvalidAccountState,
}

impl ProgramErrorCode {
    const ALL: [ProgramErrorCode; 14] = [
        ProgramErrorCode::Overflow,
        ProgramErrorCode::BadDayId,
        ProgramErrorCode::PoolClosed,
        ProgramErrorCode::InvalidAmount,
        ProgramErrorCode::PageFull,
        ProgramErrorCode::WrongFeeAccount,
        ProgramErrorCode::WrongWinnerAccount,
        ProgramErrorCode::RandomnessExpired,
        ProgramErrorCode::RandomnessAlreadyRevealed,
        ProgramErrorCode::InvalidRandomnessAccount,
        ProgramErrorCode::RandomnessNotResolved,
        ProgramErrorCode::RandomnessValueError,
        ProgramErrorCode::InvalidAccountOwner,
        ProgramErrorCode::InvalidAccountState,
    ];

    /// Decodes a custom instruction error code raised by the pool program.
    pub fn from_code(code: u32) -> Option<Self> {
        let index = code.checked_sub(anchor_lang::error::ERROR_CODE_OFFSET)?;
        Self::ALL.get(index as usize).copied()
    }
}

/// The program's verdict on a transaction that reached (or was simulated against) the ledger.
#[derive(Debug)]
pub struct Rejection {
    /// Signature of the rejected transaction; `None` when preflight refused it.
    pub signature: Option<Signature>,
    /// Index of the failing instruction within the transaction.
    pub instruction: Option<u8>,
    /// Raw custom error code, if the failing program raised one.
    pub code: Option<u32>,
    /// Decoded pool program error.
    pub program_error: Option<ProgramErrorCode>,
    pub detail: String,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.program_error {
            Some(err) => write!(f, "{} ({})", err, err.name())?,
            None => write!(f, "{}", self.detail)?,
        }
        if let Some(index) = self.instruction {
            write!(f, " at instruction {index}")?;
        }
        if let Some(signature) = &self.signature {
            write!(f, " [tx {signature}]")?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum BidderError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("wallet error: {0}")]
    Wallet(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("program rejected transaction: {0}")]
    ProgramRejection(Box<Rejection>),

    #[error("randomness oracle unavailable after {attempts} attempts: {last}")]
    OracleUnavailable { attempts: u32, last: String },

    #[error("pool status did not advance from {0}")]
    StatusStalled(PoolStatus),

    #[error("pool not resolved within {0} iterations")]
    ResolutionTimedOut(u32),

    #[error("no pool to resolve")]
    NoPoolToResolve,

    #[error("configuration error: {0}")]
    Config(String),
}

impl BidderError {
    pub fn from_transaction_error(signature: Option<Signature>, err: TransactionError) -> Self {
        let (instruction, code) = match &err {
            TransactionError::InstructionError(index, InstructionError::Custom(code)) => {
                (Some(*index), Some(*code))
            }
            TransactionError::InstructionError(index, _) => (Some(*index), None),
            _ => (None, None),
        };
        BidderError::ProgramRejection(Box::new(Rejection {
            signature,
            instruction,
            code,
            program_error: code.and_then(ProgramErrorCode::from_code),
            detail: err.to_string(),
        }))
    }

    /// The pool program error behind a rejection, if any.
    pub fn program_error(&self) -> Option<ProgramErrorCode> {
        match self {
            BidderError::ProgramRejection(rejection) => rejection.program_error,
            _ => None,
        }
    }
}

impl From<solana_client::client_error::ClientError> for BidderError {
    fn from(err: solana_client::client_error::ClientError) -> Self {
        match err.get_transaction_error() {
            Some(tx_err) => BidderError::from_transaction_error(None, tx_err),
            None => BidderError::Network(err.to_string()),
        }
    }
}

/// A resolution run that stopped before reaching `PaidOut`.
///
/// `refund_error` is set when the refund pass that follows the failure also failed; it never
/// replaces `error`.
#[derive(Debug, Error)]
#[error("pool resolution failed during {step}: {error}")]
pub struct ResolutionFailure {
    pub step: ResolveStep,
    #[source]
    pub error: BidderError,
    pub refund_error: Option<BidderError>,
}

impl ResolutionFailure {
    pub fn new(step: ResolveStep, error: BidderError) -> Self {
        Self { step, error, refund_error: None }
    }
}
