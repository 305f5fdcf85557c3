//! Transaction submission and account reads against the ledger.

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_sdk::account::Account;
use solana_sdk::compute_budget::ComputeBudgetInstruction;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::Transaction;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::config::BidderConfig;
use crate::error::BidderError;
use crate::state::{Pool, User};
use crate::wallet::Wallet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitMode {
    /// Wallet-signed, simulated before sending, transport may resend.
    Normal,
    /// Explicit signers, no preflight simulation and no automatic resend, so a non-idempotent
    /// instruction is never submitted twice behind the caller's back.
    Privileged,
}

#[async_trait]
pub trait LedgerGateway: Send + Sync {
    async fn latest_blockhash(&self) -> Result<Hash, BidderError>;

    async fn balance(&self, address: &Pubkey) -> Result<u64, BidderError>;

    async fn account(&self, address: &Pubkey) -> Result<Option<Account>, BidderError>;

    /// Fee the ledger charges for `message`.
    async fn fee_for_message(&self, message: &Message) -> Result<u64, BidderError>;

    /// Sends a fully signed transaction and blocks until it is confirmed or fails.
    ///
    /// An execution error reported by the ledger surfaces as `ProgramRejection`; transport
    /// failures and confirmation timeouts surface as `Network`.
    async fn send_and_confirm(&self, tx: &Transaction, mode: SubmitMode) -> Result<Signature, BidderError>;

    async fn pool(&self, address: &Pubkey) -> Result<Option<Pool>, BidderError> {
        match self.account(address).await? {
            Some(account) => Pool::from_account_data(&account.data).map(Some),
            None => Ok(None),
        }
    }

    async fn user(&self, address: &Pubkey) -> Result<Option<User>, BidderError> {
        match self.account(address).await? {
            Some(account) => User::from_account_data(&account.data).map(Some),
            None => Ok(None),
        }
    }
}

/// Compute-budget instructions prepended to a privileged transaction. Zero fields are omitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComputeBudget {
    /// Compute-unit ceiling of the whole transaction.
    pub unit_limit: u32,
    /// Priority fee in micro-lamports per compute unit.
    pub unit_price: u64,
}

impl ComputeBudget {
    pub fn instructions(&self) -> Vec<Instruction> {
        let mut ixs = Vec::with_capacity(2);
        if self.unit_limit > 0 {
            ixs.push(ComputeBudgetInstruction::set_compute_unit_limit(self.unit_limit));
        }
        if self.unit_price > 0 {
            ixs.push(ComputeBudgetInstruction::set_compute_unit_price(self.unit_price));
        }
        ixs
    }
}

/// Signs `instructions` with an explicit signer set and submits them in privileged mode.
///
/// The first signer pays the fee. `budget` instructions go first.
pub async fn submit_privileged(
    gateway: &dyn LedgerGateway,
    instructions: &[Instruction],
    signers: &[&Keypair],
    budget: ComputeBudget,
) -> Result<Signature, BidderError> {
    let payer = signers
        .first()
        .map(|signer| signer.pubkey())
        .ok_or_else(|| BidderError::Validation("privileged submission without signers".to_string()))?;

    let mut ixs = budget.instructions();
    ixs.extend_from_slice(instructions);

    let blockhash = gateway.latest_blockhash().await?;
    let mut tx = Transaction::new_with_payer(&ixs, Some(&payer));
    tx.try_sign(signers, blockhash)
        .map_err(|err| BidderError::Validation(format!("failed to sign transaction: {err}")))?;

    debug!(payer = %payer, instructions = ixs.len(), "submitting privileged transaction");
    gateway.send_and_confirm(&tx, SubmitMode::Privileged).await
}

/// Builds a transaction paid by the connected wallet, has the wallet sign it and submits it in
/// normal mode.
pub async fn submit_with_wallet(
    gateway: &dyn LedgerGateway,
    wallet: &dyn Wallet,
    instructions: &[Instruction],
) -> Result<Signature, BidderError> {
    let payer = wallet.connected_pubkey()?;
    let blockhash = gateway.latest_blockhash().await?;
    let mut tx = Transaction::new_with_payer(instructions, Some(&payer));
    tx.message.recent_blockhash = blockhash;

    let tx = wallet.sign_transaction(tx).await?;
    if !tx.is_signed() {
        return Err(BidderError::Wallet("transaction is missing signatures".to_string()));
    }

    debug!(payer = %payer, instructions = instructions.len(), "submitting wallet transaction");
    gateway.send_and_confirm(&tx, SubmitMode::Normal).await
}

/// Ledger gateway backed by a JSON-RPC node.
pub struct RpcGateway {
    client: RpcClient,
    confirm_timeout: Duration,
    poll_interval: Duration,
}

impl RpcGateway {
    pub fn new(config: &BidderConfig) -> Result<Self, BidderError> {
        let commitment = config.commitment_config()?;
        let client = RpcClient::new_with_timeout_and_commitment(
            config.rpc_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
            commitment,
        );
        Ok(Self {
            client,
            confirm_timeout: Duration::from_secs(config.confirm_timeout_secs),
            poll_interval: Duration::from_millis(config.confirm_poll_ms),
        })
    }

    async fn confirm(&self, signature: Signature) -> Result<Signature, BidderError> {
        let deadline = Instant::now() + self.confirm_timeout;
        loop {
            let status = self
                .client
                .get_signature_status_with_commitment(&signature, self.client.commitment())
                .await?;
            match status {
                Some(Ok(())) => return Ok(signature),
                Some(Err(err)) => {
                    warn!(%signature, error = %err, "transaction failed on-chain");
                    return Err(BidderError::from_transaction_error(Some(signature), err));
                }
                None => {}
            }
            if Instant::now() >= deadline {
                return Err(BidderError::Network(format!(
                    "transaction {signature} not confirmed within {}s",
                    self.confirm_timeout.as_secs()
                )));
            }
            sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl LedgerGateway for RpcGateway {
    async fn latest_blockhash(&self) -> Result<Hash, BidderError> {
        Ok(self.client.get_latest_blockhash().await?)
    }

    async fn balance(&self, address: &Pubkey) -> Result<u64, BidderError> {
        Ok(self.client.get_balance(address).await?)
    }

    async fn account(&self, address: &Pubkey) -> Result<Option<Account>, BidderError> {
        let response = self
            .client
            .get_account_with_commitment(address, self.client.commitment())
            .await?;
        Ok(response.value)
    }

    async fn fee_for_message(&self, message: &Message) -> Result<u64, BidderError> {
        Ok(self.client.get_fee_for_message(message).await?)
    }

    async fn send_and_confirm(&self, tx: &Transaction, mode: SubmitMode) -> Result<Signature, BidderError> {
        let config = match mode {
            SubmitMode::Normal => RpcSendTransactionConfig {
                skip_preflight: false,
                preflight_commitment: Some(self.client.commitment().commitment),
                ..RpcSendTransactionConfig::default()
            },
            SubmitMode::Privileged => RpcSendTransactionConfig {
                skip_preflight: true,
                max_retries: Some(0),
                ..RpcSendTransactionConfig::default()
            },
        };
        let signature = self.client.send_transaction_with_config(tx, config).await?;
        debug!(%signature, ?mode, "transaction sent, awaiting confirmation");
        self.confirm(signature).await
    }
}
