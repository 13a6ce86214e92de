//! Local signing of aggregator-built transactions.

use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    transaction::VersionedTransaction,
};

use crate::Result;

/// Opaque signing capability handed to the swap engine
pub trait TransactionSigner: Send + Sync {
    /// Base58 address the aggregator builds transactions for
    fn address(&self) -> String;

    /// Sign a serialized versioned transaction as fee payer and return it re-serialized
    fn sign_transaction(&self, unsigned: &[u8]) -> Result<Vec<u8>>;
}

/// Wallet backed by a Solana keypair
pub struct Wallet {
    keypair: Keypair,
}

impl Wallet {
    /// Load from a base58-encoded 64-byte secret key
    pub fn from_base58(private_key: &str) -> Result<Self> {
        let decoded = bs58::decode(private_key.trim())
            .into_vec()
            .map_err(|e| format!("Failed to decode base58 private key: {}", e))?;

        if decoded.len() != 64 {
            return Err(format!(
                "Invalid private key length: expected 64 bytes, got {}",
                decoded.len()
            )
            .into());
        }

        let keypair = Keypair::from_bytes(&decoded)
            .map_err(|e| format!("Failed to create keypair: {}", e))?;

        Ok(Self { keypair })
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }
}

impl TransactionSigner for Wallet {
    fn address(&self) -> String {
        self.keypair.pubkey().to_string()
    }

    fn sign_transaction(&self, unsigned: &[u8]) -> Result<Vec<u8>> {
        let mut transaction: VersionedTransaction = bincode::deserialize(unsigned)
            .map_err(|e| format!("Failed to deserialize transaction: {}", e))?;

        // Fee payer signs in slot 0
        let signature = self.keypair.sign_message(&transaction.message.serialize());
        if transaction.signatures.is_empty() {
            transaction.signatures.push(signature);
        } else {
            transaction.signatures[0] = signature;
        }

        Ok(bincode::serialize(&transaction)?)
    }
}
