use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::transaction::Transaction;

use crate::error::BidderError;

/// The participant's wallet. The client never sees its key material; it only asks for a
/// signature over a fully built transaction.
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Address of the connected participant, `None` while disconnected.
    fn pubkey(&self) -> Option<Pubkey>;

    /// Adds the participant's signature to `tx` (whose blockhash is already set).
    async fn sign_transaction(&self, tx: Transaction) -> Result<Transaction, BidderError>;

    fn connected_pubkey(&self) -> Result<Pubkey, BidderError> {
        self.pubkey().ok_or_else(|| BidderError::Wallet("wallet not connected".to_string()))
    }
}

/// Wallet backed by a local keypair, for scripts and tests.
pub struct KeypairWallet {
    keypair: Keypair,
}

impl KeypairWallet {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }
}

#[async_trait]
impl Wallet for KeypairWallet {
    fn pubkey(&self) -> Option<Pubkey> {
        Some(self.keypair.pubkey())
    }

    async fn sign_transaction(&self, mut tx: Transaction) -> Result<Transaction, BidderError> {
        let blockhash = tx.message.recent_blockhash;
        tx.try_partial_sign(&[&self.keypair], blockhash)
            .map_err(|err| BidderError::Wallet(format!("signing rejected: {err}")))?;
        Ok(tx)
    }
}
