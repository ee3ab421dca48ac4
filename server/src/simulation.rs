use alloy_primitives::{Address, B256, keccak256};
use async_trait::async_trait;
use gas_incrementor::{
    ChainClient, ChainError, Receipt, SignedTransaction, SignerError, UnsignedTransaction,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{debug, info};

/// In-process chain: a broadcast transaction gets mined as soon as it pays at
/// least the market gas price.
pub struct SimulatedChain {
    market_price: u128,
    broadcasts: Mutex<HashMap<B256, SignedTransaction>>,
}

impl SimulatedChain {
    pub fn new(market_price: u128) -> Self {
        Self {
            market_price,
            broadcasts: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl ChainClient for SimulatedChain {
    async fn transaction_receipt(&self, _chain_id: u64, hash: B256) -> Result<Receipt, ChainError> {
        if !self.broadcasts.lock().contains_key(&hash) {
            return Err(ChainError::from_rpc_message("receipt not found"));
        }
        Ok(Receipt {
            tx_hash: hash,
            status: gas_incrementor::chain::RECEIPT_STATUS_SUCCESSFUL,
            block_number: Some(1),
        })
    }

    async fn send_transaction(
        &self,
        chain_id: u64,
        tx: &SignedTransaction,
    ) -> Result<(), ChainError> {
        let hash = tx.hash();
        info!(chain_id, %hash, gas_price = tx.gas_price(), nonce = tx.nonce(), "broadcast");
        self.broadcasts.lock().insert(hash, tx.clone());
        Ok(())
    }

    async fn transaction_by_hash(
        &self,
        _chain_id: u64,
        hash: B256,
    ) -> Result<(SignedTransaction, bool), ChainError> {
        let tx = self
            .broadcasts
            .lock()
            .get(&hash)
            .cloned()
            .ok_or_else(|| ChainError::NotFound(format!("transaction {hash}")))?;

        let pending = tx.gas_price() < self.market_price;
        debug!(%hash, gas_price = tx.gas_price(), market = self.market_price, pending, "lookup");
        Ok((tx, pending))
    }
}

/// Signer that stamps a deterministic pseudo signature for `sender`.
pub fn local_signer(
    sender: Address,
) -> impl Fn(&UnsignedTransaction, u64) -> Result<SignedTransaction, SignerError> + Send + Sync {
    move |tx: &UnsignedTransaction, chain_id: u64| -> Result<SignedTransaction, SignerError> {
        let mut preimage = sender.to_vec();
        preimage.extend_from_slice(&chain_id.to_be_bytes());
        preimage.extend_from_slice(&tx.nonce.to_be_bytes());
        preimage.extend_from_slice(&tx.gas_price.to_be_bytes());

        Ok(SignedTransaction {
            chain_id,
            tx: tx.clone(),
            signature: keccak256(preimage).to_vec(),
        })
    }
}
