//! Signing capabilities keyed by sender address.

use alloy_primitives::Address;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::encoding::{SignedTransaction, UnsignedTransaction};
use crate::error::SignerError;

/// Signs resubmitted transactions for one sender.
pub trait TransactionSigner: Send + Sync {
    fn sign(
        &self,
        tx: &UnsignedTransaction,
        chain_id: u64,
    ) -> Result<SignedTransaction, SignerError>;
}

impl<F> TransactionSigner for F
where
    F: Fn(&UnsignedTransaction, u64) -> Result<SignedTransaction, SignerError> + Send + Sync,
{
    fn sign(
        &self,
        tx: &UnsignedTransaction,
        chain_id: u64,
    ) -> Result<SignedTransaction, SignerError> {
        self(tx, chain_id)
    }
}

#[derive(Default)]
pub struct SignerRegistry {
    signers: Mutex<HashMap<Address, Arc<dyn TransactionSigner>>>,
}

impl fmt::Debug for SignerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignerRegistry")
            .field("addresses", &self.addresses())
            .finish()
    }
}

impl SignerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`Self::register`].
    pub fn with_signer(self, address: Address, signer: impl TransactionSigner + 'static) -> Self {
        self.register(address, signer);
        self
    }

    pub fn register(&self, address: Address, signer: impl TransactionSigner + 'static) {
        self.signers.lock().insert(address, Arc::new(signer));
    }

    pub fn remove(&self, address: &Address) -> bool {
        self.signers.lock().remove(address).is_some()
    }

    /// Looks up the signer for a hex encoded sender address.
    ///
    /// Records created before senders were tracked carry an empty (or zero)
    /// address. While exactly one signer is registered such lookups resolve
    /// to it, whatever its real address is.
    pub fn resolve(&self, sender_hex: &str) -> Option<Arc<dyn TransactionSigner>> {
        let signers = self.signers.lock();
        let parsed = Address::from_str(sender_hex.trim()).ok();

        if signers.len() == 1 && (sender_hex.trim().is_empty() || parsed == Some(Address::ZERO)) {
            return signers.values().next().cloned();
        }

        parsed.and_then(|addr| signers.get(&addr).cloned())
    }

    pub fn resolve_address(&self, sender: Address) -> Option<Arc<dyn TransactionSigner>> {
        self.resolve(&sender.to_checksum(None))
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.signers.lock().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.signers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
