#![allow(dead_code)]

use anchor_lang::AccountSerialize;
use async_trait::async_trait;
use bidder_client::constants::{
    CLOSE_DISCRIMINATOR, ENTRY_DISCRIMINATOR, FEE_ACCOUNT, ORACLE_PROGRAM_ID, PAYOUT_DISCRIMINATOR,
    RESOLVE_DISCRIMINATOR, SELECT_DISCRIMINATOR,
};
use bidder_client::{
    BidderConfig, BidderError, LedgerGateway, Pool, PoolStatus, RandomnessOracle, SubmitMode, User,
};
use solana_sdk::account::Account;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::{AccountMeta, Instruction, InstructionError};
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::{Transaction, TransactionError};
use solana_sdk::{compute_budget, system_program};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

pub const FEE: u64 = 5_000;
pub const PAGE_FULL: u32 = 6004;
pub const WRONG_FEE_ACCOUNT: u32 = 6005;
pub const WRONG_WINNER_ACCOUNT: u32 = 6006;
pub const INVALID_ACCOUNT_STATE: u32 = 6013;

/// An instruction as the fake ledger understood it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Entry { amount: u64, day_id: i64, page: Pubkey },
    Close,
    Select,
    Resolve,
    Payout,
    OracleCreate,
    OracleCommit,
    OracleReveal,
    Transfer { from: Pubkey, to: Pubkey, lamports: u64 },
    ComputeUnitLimit,
    ComputeUnitPrice,
    Unknown,
}

impl Call {
    pub fn is_program_call(&self) -> bool {
        matches!(self, Call::Close | Call::Select | Call::Resolve | Call::Payout)
    }
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub mode: SubmitMode,
    pub payer: Pubkey,
    pub calls: Vec<Call>,
    pub landed: bool,
}

#[derive(Default)]
struct LedgerState {
    accounts: HashMap<Pubkey, Account>,
    scripted_reads: HashMap<Pubkey, VecDeque<Pool>>,
    ignored: HashSet<[u8; 8]>,
    page_full: bool,
    failing_transfers: HashSet<Pubkey>,
    winner: Pubkey,
    winning_page: u64,
    fee_quotes: Vec<Hash>,
    submissions: Vec<Submission>,
}

/// In-memory ledger that executes the pool program's state transitions.
pub struct FakeLedger {
    program_id: Pubkey,
    state: Mutex<LedgerState>,
}

impl FakeLedger {
    pub fn new(program_id: Pubkey) -> Self {
        Self { program_id, state: Mutex::new(LedgerState::default()) }
    }

    pub fn airdrop(&self, to: &Pubkey, lamports: u64) {
        let mut state = self.state.lock().unwrap();
        credit(&mut state.accounts, to, lamports);
    }

    pub fn lamports(&self, address: &Pubkey) -> u64 {
        let state = self.state.lock().unwrap();
        state.accounts.get(address).map(|account| account.lamports).unwrap_or(0)
    }

    pub fn put_pool(&self, address: Pubkey, pool: Pool) {
        let mut state = self.state.lock().unwrap();
        write_pool(&mut state.accounts, self.program_id, address, &pool);
    }

    pub fn pool_state(&self, address: &Pubkey) -> Option<Pool> {
        let state = self.state.lock().unwrap();
        read_pool(&state.accounts, address)
    }

    /// Pool snapshots served, in order, to the next reads of `address` before real state.
    pub fn script_reads(&self, address: Pubkey, reads: Vec<Pool>) {
        let mut state = self.state.lock().unwrap();
        state.scripted_reads.entry(address).or_default().extend(reads);
    }

    /// Makes the program instruction with `discriminator` land without any effect.
    pub fn ignore(&self, discriminator: [u8; 8]) {
        self.state.lock().unwrap().ignored.insert(discriminator);
    }

    pub fn set_page_full(&self, full: bool) {
        self.state.lock().unwrap().page_full = full;
    }

    /// System transfers out of `from` fail with a network error.
    pub fn fail_transfers_from(&self, from: Pubkey) {
        self.state.lock().unwrap().failing_transfers.insert(from);
    }

    pub fn set_winner(&self, winner: Pubkey, winning_page: u64) {
        let mut state = self.state.lock().unwrap();
        state.winner = winner;
        state.winning_page = winning_page;
    }

    /// Blockhashes of every successful fee quote.
    pub fn fee_quotes(&self) -> Vec<Hash> {
        self.state.lock().unwrap().fee_quotes.clone()
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.state.lock().unwrap().submissions.clone()
    }

    /// Pool program calls of every landed transaction, in submission order.
    pub fn program_calls(&self) -> Vec<Call> {
        self.submissions()
            .into_iter()
            .filter(|submission| submission.landed)
            .flat_map(|submission| submission.calls)
            .filter(Call::is_program_call)
            .collect()
    }

    pub fn transfers_from(&self, from: &Pubkey) -> Vec<u64> {
        self.submissions()
            .into_iter()
            .filter(|submission| submission.landed)
            .flat_map(|submission| submission.calls)
            .filter_map(|call| match call {
                Call::Transfer { from: source, lamports, .. } if source == *from => Some(lamports),
                _ => None,
            })
            .collect()
    }

    fn classify(&self, program: &Pubkey, keys: &[Pubkey], data: &[u8]) -> Call {
        if *program == system_program::ID {
            return match decode_transfer(data) {
                Some(lamports) if keys.len() >= 2 => Call::Transfer { from: keys[0], to: keys[1], lamports },
                _ => Call::Unknown,
            };
        }
        if *program == compute_budget::id() {
            // borsh ComputeBudgetInstruction tags
            return match data.first() {
                Some(2) => Call::ComputeUnitLimit,
                Some(3) => Call::ComputeUnitPrice,
                _ => Call::Unknown,
            };
        }
        if *program == ORACLE_PROGRAM_ID {
            return match data {
                b"create" => Call::OracleCreate,
                b"commit" => Call::OracleCommit,
                b"reveal" => Call::OracleReveal,
                _ => Call::Unknown,
            };
        }
        if *program != self.program_id || data.len() < 8 {
            return Call::Unknown;
        }
        match <[u8; 8]>::try_from(&data[..8]).unwrap_or_default() {
            ENTRY_DISCRIMINATOR if data.len() >= 24 && keys.len() >= 6 => Call::Entry {
                page: keys[4],
                amount: u64::from_le_bytes(data[8..16].try_into().unwrap()),
                day_id: i64::from_le_bytes(data[16..24].try_into().unwrap()),
            },
            CLOSE_DISCRIMINATOR => Call::Close,
            SELECT_DISCRIMINATOR => Call::Select,
            RESOLVE_DISCRIMINATOR => Call::Resolve,
            PAYOUT_DISCRIMINATOR => Call::Payout,
            _ => Call::Unknown,
        }
    }

    fn execute(
        &self,
        state: &LedgerState,
        accounts: &mut HashMap<Pubkey, Account>,
        call: &Call,
        keys: &[Pubkey],
        data: &[u8],
    ) -> Result<(), InstructionError> {
        let ignored = data.len() >= 8 && state.ignored.contains(&data[..8]);
        match call {
            Call::Transfer { .. } => {
                let lamports = decode_transfer(data).ok_or(InstructionError::InvalidInstructionData)?;
                debit(accounts, &keys[0], lamports)?;
                credit(accounts, &keys[1], lamports);
            }
            Call::OracleCreate => {
                accounts.insert(
                    keys[0],
                    Account { lamports: 0, data: vec![0; 8], owner: ORACLE_PROGRAM_ID, ..Account::default() },
                );
            }
            Call::OracleCommit
            | Call::OracleReveal
            | Call::ComputeUnitLimit
            | Call::ComputeUnitPrice
            | Call::Unknown => {}
            _ if ignored => {}
            Call::Entry { amount, day_id, .. } => {
                if state.page_full {
                    return Err(InstructionError::Custom(PAGE_FULL));
                }
                let (signer, pool_key, vault, user) = (keys[0], keys[1], keys[2], keys[5]);
                let mut pool = read_pool(accounts, &pool_key).unwrap_or(Pool { day_id: *day_id, ..Pool::default() });
                if pool.status().ok() != Some(PoolStatus::Open) {
                    return Err(InstructionError::Custom(INVALID_ACCOUNT_STATE));
                }
                debit(accounts, &signer, *amount)?;
                credit(accounts, &vault, *amount);
                pool.total_entries += amount;
                write_pool(accounts, self.program_id, pool_key, &pool);

                let mut record = accounts
                    .get(&user)
                    .and_then(|account| User::from_account_data(&account.data).ok())
                    .unwrap_or_default();
                record.entries += amount;
                let mut data = Vec::new();
                record.try_serialize(&mut data).map_err(|_| InstructionError::InvalidAccountData)?;
                accounts.insert(user, Account { lamports: 1, data, owner: self.program_id, ..Account::default() });
            }
            Call::Close => {
                let mut pool = self.expect_pool(accounts, &keys[1], &[PoolStatus::Open, PoolStatus::Closed])?;
                pool.status = PoolStatus::Closed as u8;
                pool.randomness_account = keys[2];
                write_pool(accounts, self.program_id, keys[1], &pool);
            }
            Call::Select => {
                let mut pool = self.expect_pool(accounts, &keys[1], &[PoolStatus::Closed])?;
                if pool.randomness_account != keys[3] {
                    return Err(InstructionError::Custom(INVALID_ACCOUNT_STATE));
                }
                pool.status = PoolStatus::Selected as u8;
                pool.winning_page = state.winning_page;
                write_pool(accounts, self.program_id, keys[1], &pool);
            }
            Call::Resolve => {
                let mut pool = self.expect_pool(accounts, &keys[1], &[PoolStatus::Selected])?;
                pool.status = PoolStatus::Resolved as u8;
                pool.winner = state.winner;
                write_pool(accounts, self.program_id, keys[1], &pool);
            }
            Call::Payout => {
                let mut pool = self.expect_pool(accounts, &keys[1], &[PoolStatus::Resolved])?;
                // signer, pool, winner, fee, system_program
                if pool.winner != keys[2] {
                    return Err(InstructionError::Custom(WRONG_WINNER_ACCOUNT));
                }
                if keys[3] != FEE_ACCOUNT {
                    return Err(InstructionError::Custom(WRONG_FEE_ACCOUNT));
                }
                let pot = pool.total_entries;
                debit(accounts, &keys[1], pot)?;
                credit(accounts, &keys[2], pot);
                pool.status = PoolStatus::PaidOut as u8;
                write_pool(accounts, self.program_id, keys[1], &pool);
            }
        }
        Ok(())
    }

    fn expect_pool(
        &self,
        accounts: &HashMap<Pubkey, Account>,
        address: &Pubkey,
        allowed: &[PoolStatus],
    ) -> Result<Pool, InstructionError> {
        let pool = read_pool(accounts, address).ok_or(InstructionError::UninitializedAccount)?;
        match pool.status() {
            Ok(status) if allowed.contains(&status) => Ok(pool),
            _ => Err(InstructionError::Custom(INVALID_ACCOUNT_STATE)),
        }
    }
}

#[async_trait]
impl LedgerGateway for FakeLedger {
    async fn latest_blockhash(&self) -> Result<Hash, BidderError> {
        Ok(Hash::new_unique())
    }

    async fn balance(&self, address: &Pubkey) -> Result<u64, BidderError> {
        Ok(self.lamports(address))
    }

    async fn account(&self, address: &Pubkey) -> Result<Option<Account>, BidderError> {
        let mut state = self.state.lock().unwrap();
        if let Some(pool) = state.scripted_reads.get_mut(address).and_then(VecDeque::pop_front) {
            let mut data = Vec::new();
            pool.try_serialize(&mut data).unwrap();
            return Ok(Some(Account { lamports: 1, data, owner: self.program_id, ..Account::default() }));
        }
        Ok(state.accounts.get(address).cloned())
    }

    async fn fee_for_message(&self, message: &Message) -> Result<u64, BidderError> {
        // Nodes only price messages whose blockhash they know.
        if message.recent_blockhash == Hash::default() {
            return Err(BidderError::Network("Invalid fee response".to_string()));
        }
        self.state.lock().unwrap().fee_quotes.push(message.recent_blockhash);
        Ok(FEE)
    }

    async fn send_and_confirm(&self, tx: &Transaction, mode: SubmitMode) -> Result<Signature, BidderError> {
        tx.verify()
            .map_err(|err| BidderError::Network(format!("signature verification failed: {err}")))?;
        let signature = tx.signatures[0];
        let keys = &tx.message.account_keys;
        let payer = keys[0];

        let mut state = self.state.lock().unwrap();
        let ix_keys: Vec<Vec<Pubkey>> = tx
            .message
            .instructions
            .iter()
            .map(|ix| ix.accounts.iter().map(|i| keys[*i as usize]).collect())
            .collect();
        let calls: Vec<Call> = tx
            .message
            .instructions
            .iter()
            .zip(&ix_keys)
            .map(|(ix, ix_keys)| self.classify(&keys[ix.program_id_index as usize], ix_keys, &ix.data))
            .collect();

        let dropped = calls.iter().any(|call| {
            matches!(call, Call::Transfer { from, .. } if state.failing_transfers.contains(from))
        });
        if dropped {
            state.submissions.push(Submission { mode, payer, calls, landed: false });
            return Err(BidderError::Network("transfer dropped by node".to_string()));
        }

        let mut accounts = state.accounts.clone();
        if debit(&mut accounts, &payer, FEE).is_err() {
            state.submissions.push(Submission { mode, payer, calls, landed: false });
            return Err(BidderError::from_transaction_error(None, TransactionError::InsufficientFundsForFee));
        }
        // Fees are charged even when an instruction fails.
        let charged = accounts.clone();

        for (index, ix) in tx.message.instructions.iter().enumerate() {
            if let Err(err) = self.execute(&state, &mut accounts, &calls[index], &ix_keys[index], &ix.data) {
                state.accounts = charged;
                state.submissions.push(Submission { mode, payer, calls: calls.clone(), landed: false });
                return Err(BidderError::from_transaction_error(
                    Some(signature),
                    TransactionError::InstructionError(index as u8, err),
                ));
            }
        }

        state.accounts = accounts;
        state.submissions.push(Submission { mode, payer, calls, landed: true });
        Ok(signature)
    }
}

/// Oracle SDK stand-in whose commit construction fails a scripted number of times.
pub struct FakeOracle {
    queue: Pubkey,
    commit_failures: AtomicU32,
    pub commit_calls: AtomicU32,
}

impl FakeOracle {
    pub fn new() -> Self {
        Self::failing_commits(0)
    }

    pub fn failing_commits(failures: u32) -> Self {
        Self {
            queue: Pubkey::new_unique(),
            commit_failures: AtomicU32::new(failures),
            commit_calls: AtomicU32::new(0),
        }
    }

    pub fn commit_calls(&self) -> u32 {
        self.commit_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RandomnessOracle for FakeOracle {
    async fn default_queue(&self) -> Result<Pubkey, BidderError> {
        Ok(self.queue)
    }

    async fn create_instruction(
        &self,
        account: &Pubkey,
        queue: &Pubkey,
        payer: &Pubkey,
    ) -> Result<Instruction, BidderError> {
        Ok(Instruction::new_with_bytes(
            ORACLE_PROGRAM_ID,
            b"create",
            vec![
                AccountMeta::new(*account, true),
                AccountMeta::new_readonly(*queue, false),
                AccountMeta::new(*payer, true),
            ],
        ))
    }

    async fn commit_instruction(&self, account: &Pubkey, queue: &Pubkey) -> Result<Instruction, BidderError> {
        self.commit_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.commit_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.commit_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(BidderError::Network("randomness account not indexed yet".to_string()));
        }
        Ok(Instruction::new_with_bytes(
            ORACLE_PROGRAM_ID,
            b"commit",
            vec![AccountMeta::new(*account, false), AccountMeta::new_readonly(*queue, false)],
        ))
    }

    async fn reveal_instruction(&self, account: &Pubkey, payer: &Pubkey) -> Result<Instruction, BidderError> {
        Ok(Instruction::new_with_bytes(
            ORACLE_PROGRAM_ID,
            b"reveal",
            vec![AccountMeta::new(*account, false), AccountMeta::new(*payer, false)],
        ))
    }
}

/// Config pointing at the fake ledger with fast retries.
pub fn test_config() -> BidderConfig {
    let mut config = BidderConfig::default();
    config.resolution.commit_backoff_ms = 1;
    config
}

pub fn pool_with(status: PoolStatus) -> Pool {
    Pool { status: status as u8, total_entries: 2_000_000_000, day_id: 19_999, ..Pool::default() }
}

fn decode_transfer(data: &[u8]) -> Option<u64> {
    // bincode SystemInstruction::Transfer: u32 variant 2, u64 lamports
    if data.len() != 12 || data[..4] != 2_u32.to_le_bytes() {
        return None;
    }
    Some(u64::from_le_bytes(data[4..12].try_into().ok()?))
}

fn credit(accounts: &mut HashMap<Pubkey, Account>, to: &Pubkey, lamports: u64) {
    accounts
        .entry(*to)
        .or_insert_with(|| Account { owner: system_program::ID, ..Account::default() })
        .lamports += lamports;
}

fn debit(accounts: &mut HashMap<Pubkey, Account>, from: &Pubkey, lamports: u64) -> Result<(), InstructionError> {
    let account = accounts.get_mut(from).ok_or(InstructionError::InsufficientFunds)?;
    account.lamports = account.lamports.checked_sub(lamports).ok_or(InstructionError::InsufficientFunds)?;
    Ok(())
}

fn read_pool(accounts: &HashMap<Pubkey, Account>, address: &Pubkey) -> Option<Pool> {
    accounts.get(address).and_then(|account| Pool::from_account_data(&account.data).ok())
}

fn write_pool(accounts: &mut HashMap<Pubkey, Account>, program_id: Pubkey, address: Pubkey, pool: &Pool) {
    let mut data = Vec::new();
    pool.try_serialize(&mut data).unwrap();
    let lamports = accounts.get(&address).map(|account| account.lamports).unwrap_or(1);
    accounts.insert(address, Account { lamports, data, owner: program_id, ..Account::default() });
}
