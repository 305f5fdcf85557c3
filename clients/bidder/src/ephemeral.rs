//! Single-use signer that pays for and authorizes one resolution run.
//!
//! Lifecycle: created -> funded by the participant's wallet -> fee payer of every resolution
//! transaction -> refunded to the wallet -> dropped. It is never persisted; the secret key is only
//! exposed so the participant can recover a stranded stake by hand.

use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::system_instruction;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::BidderError;
use crate::gateway::{submit_privileged, submit_with_wallet, ComputeBudget, LedgerGateway};
use crate::wallet::Wallet;

pub struct EphemeralSigner {
    keypair: Keypair,
}

impl EphemeralSigner {
    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    /// Secret key as a JSON byte array, the format wallets import.
    pub fn recovery_secret(&self) -> String {
        let bytes: Vec<String> = self.keypair.to_bytes().iter().map(u8::to_string).collect();
        format!("[{}]", bytes.join(","))
    }

    /// Rebuilds a signer from [`EphemeralSigner::recovery_secret`] output.
    pub fn from_recovery_secret(secret: &str) -> Result<Self, BidderError> {
        let bytes: Vec<u8> = serde_json::from_str(secret.trim())
            .map_err(|err| BidderError::Validation(format!("malformed recovery secret: {err}")))?;
        let keypair = Keypair::from_bytes(&bytes)
            .map_err(|err| BidderError::Validation(format!("invalid recovery keypair: {err}")))?;
        Ok(Self { keypair })
    }
}

impl std::fmt::Debug for EphemeralSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralSigner").field("pubkey", &self.pubkey()).finish()
    }
}

pub struct EphemeralSignerManager {
    gateway: Arc<dyn LedgerGateway>,
}

impl EphemeralSignerManager {
    pub fn new(gateway: Arc<dyn LedgerGateway>) -> Self {
        Self { gateway }
    }

    /// Generates a fresh signer. Never cached: every resolution attempt gets its own.
    pub fn create(&self) -> EphemeralSigner {
        EphemeralSigner { keypair: Keypair::new() }
    }

    /// Moves `lamports` from the participant's wallet to `signer`.
    pub async fn fund(
        &self,
        wallet: &dyn Wallet,
        signer: &EphemeralSigner,
        lamports: u64,
    ) -> Result<Signature, BidderError> {
        let from = wallet.connected_pubkey()?;
        let ix = system_instruction::transfer(&from, &signer.pubkey(), lamports);
        let signature = submit_with_wallet(self.gateway.as_ref(), wallet, &[ix]).await?;
        info!(ephemeral = %signer.pubkey(), lamports, %signature, "ephemeral signer funded");
        Ok(signature)
    }

    /// Drains `signer` back to `to`.
    ///
    /// Reads the balance fresh on every call, so a transaction still landing from an abandoned run
    /// is accounted for. Returns `Ok(None)` without submitting anything when there is nothing
    /// to move. The signer pays the fee, so the transfer is the balance minus that fee.
    pub async fn refund(
        &self,
        signer: &EphemeralSigner,
        to: &Pubkey,
    ) -> Result<Option<Signature>, BidderError> {
        let from = signer.pubkey();
        let balance = self.gateway.balance(&from).await?;
        if balance == 0 {
            return Ok(None);
        }

        // The ledger quotes fees against a known blockhash only.
        let blockhash = self.gateway.latest_blockhash().await?;
        let quote = Message::new_with_blockhash(
            &[system_instruction::transfer(&from, to, balance)],
            Some(&from),
            &blockhash,
        );
        let fee = self.gateway.fee_for_message(&quote).await?;
        let lamports = balance.saturating_sub(fee);
        if lamports == 0 {
            warn!(ephemeral = %from, balance, fee, "ephemeral balance does not cover the refund fee");
            return Ok(None);
        }

        let ix = system_instruction::transfer(&from, to, lamports);
        let signature =
            submit_privileged(self.gateway.as_ref(), &[ix], &[signer.keypair()], ComputeBudget::default()).await?;
        info!(ephemeral = %from, to = %to, lamports, %signature, "ephemeral signer refunded");
        Ok(Some(signature))
    }
}
