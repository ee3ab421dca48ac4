use alloy_primitives::B256;
use async_trait::async_trait;

use crate::encoding::SignedTransaction;
use crate::error::ChainError;

pub const RECEIPT_STATUS_FAILED: u64 = 0;
pub const RECEIPT_STATUS_SUCCESSFUL: u64 = 1;

/// Outcome of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: B256,
    pub status: u64,
    pub block_number: Option<u64>,
}

/// Status of a tracked transaction on chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BcTxStatus {
    Pending,
    Failed,
    Succeeded,
}

/// Access to the networks the incrementor resubmits to.
///
/// Calls are not cancelled by [`crate::GasPriceIncrementor::stop`]; bound them
/// with `call_timeout` in [`crate::GasIncrementorConfig`] if a node may hang.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn transaction_receipt(&self, chain_id: u64, hash: B256) -> Result<Receipt, ChainError>;

    async fn send_transaction(&self, chain_id: u64, tx: &SignedTransaction)
    -> Result<(), ChainError>;

    /// Returns the transaction and whether it is still pending.
    async fn transaction_by_hash(
        &self,
        chain_id: u64,
        hash: B256,
    ) -> Result<(SignedTransaction, bool), ChainError>;
}
