use alloy_primitives::Address;
use async_trait::async_trait;
use dashmap::DashMap;
use std::str::FromStr;

use crate::error::StorageError;
use crate::transaction::Transaction;

/// Persistence used by the incrementor to insert, update and fetch records.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Inserts a new record or replaces the one with the same `unique_id`.
    async fn upsert_transaction(&self, tx: &Transaction) -> Result<(), StorageError>;

    /// Non-terminal records whose sender is one of `signers`. Records the
    /// incrementor cannot sign for must not be returned.
    async fn transactions_to_check(
        &self,
        signers: &[Address],
    ) -> Result<Vec<Transaction>, StorageError>;

    /// Number of non-terminal records queued for `sender`.
    async fn sender_queue_len(&self, sender: Address) -> Result<usize, StorageError>;
}

/// Volatile [`Storage`] for tests and simulations. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    txs: DashMap<String, Transaction>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, unique_id: &str) -> Option<Transaction> {
        self.txs.get(unique_id).map(|tx| tx.clone())
    }

    pub fn all(&self) -> Vec<Transaction> {
        self.txs.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }
}

fn sender_matches(tx: &Transaction, signers: &[Address]) -> bool {
    match Address::from_str(tx.sender_address_hex.trim()) {
        Ok(addr) if addr != Address::ZERO => signers.contains(&addr),
        // legacy records without a sender belong to a lone signer
        _ => signers.len() == 1,
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn upsert_transaction(&self, tx: &Transaction) -> Result<(), StorageError> {
        self.txs.insert(tx.unique_id.clone(), tx.clone());
        Ok(())
    }

    async fn transactions_to_check(
        &self,
        signers: &[Address],
    ) -> Result<Vec<Transaction>, StorageError> {
        Ok(self
            .txs
            .iter()
            .filter(|entry| !entry.state.is_terminal() && sender_matches(entry, signers))
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn sender_queue_len(&self, sender: Address) -> Result<usize, StorageError> {
        Ok(self
            .txs
            .iter()
            .filter(|entry| {
                !entry.state.is_terminal()
                    && Address::from_str(&entry.sender_address_hex).ok() == Some(sender)
            })
            .count())
    }
}
