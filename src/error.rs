//! Error types for the incrementor and its capabilities.

use alloy_primitives::B256;
use std::time::Duration;
use thiserror::Error;

/// Reasons a [`crate::TransactionOpts`] is rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptsError {
    #[error("timeout must be greater than zero")]
    ZeroTimeout,

    #[error("check interval must be greater than zero")]
    ZeroCheckInterval,

    #[error("increase interval must be greater than zero")]
    ZeroIncreaseInterval,

    #[error("price multiplier must be a finite number greater than 1, got {0}")]
    InvalidMultiplier(f64),

    #[error("max price must be greater than zero")]
    ZeroMaxPrice,
}

/// Errors reported by a [`crate::ChainClient`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("nonce too low: {0}")]
    NonceTooLow(String),

    #[error("nonce too high: {0}")]
    NonceTooHigh(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The call did not complete within the configured call timeout.
    #[error("chain call timed out after {0:?}")]
    Timeout(Duration),

    #[error("rpc error: {0}")]
    Rpc(String),
}

impl ChainError {
    /// Classifies a raw RPC error message.
    ///
    /// Nodes do not agree on error codes, so the message text is the only
    /// portable signal for nonce conflicts and missing transactions. Other
    /// "not found" messages ("header not found" from a lagging node, "method
    /// not found") are transient.
    pub fn from_rpc_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();

        if lower.contains("nonce too low") {
            Self::NonceTooLow(message)
        } else if lower.contains("nonce too high") {
            Self::NonceTooHigh(message)
        } else if lower.contains("transaction not found") || lower.contains("receipt not found") {
            Self::NotFound(message)
        } else {
            Self::Rpc(message)
        }
    }

    /// Nonce conflicts and missing transactions can never heal by retrying.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(
            self,
            Self::NonceTooLow(_) | Self::NonceTooHigh(_) | Self::NotFound(_)
        )
    }
}

/// Error returned by a [`crate::Storage`] implementation.
#[derive(Debug, Clone, Error)]
#[error("storage error: {0}")]
pub struct StorageError(pub String);

/// Error returned by a [`crate::TransactionSigner`].
#[derive(Debug, Clone, Error)]
#[error("signer error: {0}")]
pub struct SignerError(pub String);

/// The stored encoded transaction could not be decoded.
#[derive(Debug, Error)]
#[error("malformed internal tx object: {0}")]
pub struct DecodeError(#[from] pub std::io::Error);

#[derive(Debug, Error)]
pub enum IncrementorError {
    #[error("invalid opts given: {0}")]
    InvalidOpts(#[from] OptsError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("{context}: {source}")]
    Chain {
        context: &'static str,
        #[source]
        source: ChainError,
    },

    #[error(
        "transaction with uniqueID '{unique_id}' failed, gas price limit of {max_price} reached on chain {chain_id}"
    )]
    GasPriceLimit {
        unique_id: String,
        max_price: u128,
        chain_id: u64,
    },

    #[error("can't retry, no signer for address: {0:?}")]
    MissingSigner(String),

    #[error("failed to sign a transaction: {0}")]
    Sign(#[source] SignerError),

    #[error("failed to send a transaction: {0}")]
    Broadcast(#[source] ChainError),

    #[error("received unknown receipt status {status} for tx uniqueID: '{unique_id}', lastHash: '{hash}'")]
    UnknownReceiptStatus {
        status: u64,
        unique_id: String,
        hash: B256,
    },
}

impl IncrementorError {
    /// Whether the watcher must mark the transaction `Failed` instead of
    /// leaving it for a later attempt.
    pub fn forces_failure(&self) -> bool {
        match self {
            Self::Chain { source, .. } => source.is_unrecoverable(),
            Self::GasPriceLimit { .. }
            | Self::MissingSigner(_)
            | Self::Sign(_)
            | Self::Broadcast(_)
            | Self::Decode(_)
            | Self::UnknownReceiptStatus { .. } => true,
            Self::InvalidOpts(_) | Self::Storage(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_message_classification() {
        assert_eq!(
            ChainError::from_rpc_message("Nonce too low: next nonce 5, tx nonce 4"),
            ChainError::NonceTooLow("Nonce too low: next nonce 5, tx nonce 4".to_string())
        );
        assert!(matches!(
            ChainError::from_rpc_message("nonce too high"),
            ChainError::NonceTooHigh(_)
        ));
        assert!(matches!(
            ChainError::from_rpc_message("transaction not found"),
            ChainError::NotFound(_)
        ));
        assert!(matches!(
            ChainError::from_rpc_message("Receipt not found"),
            ChainError::NotFound(_)
        ));
        assert!(matches!(
            ChainError::from_rpc_message("connection reset by peer"),
            ChainError::Rpc(_)
        ));
    }

    #[test]
    fn test_other_not_found_messages_are_transient() {
        for message in [
            "header not found",
            "Method not found",
            "missing trie node: not found",
            "block not found",
        ] {
            let err = ChainError::from_rpc_message(message);
            assert_eq!(err, ChainError::Rpc(message.to_string()));
            assert!(!err.is_unrecoverable(), "{message} should be retried");
        }
    }

    #[test]
    fn test_unrecoverable_chain_errors() {
        assert!(ChainError::NonceTooLow(String::new()).is_unrecoverable());
        assert!(ChainError::NonceTooHigh(String::new()).is_unrecoverable());
        assert!(ChainError::NotFound(String::new()).is_unrecoverable());
        assert!(!ChainError::Rpc("503".into()).is_unrecoverable());
        assert!(!ChainError::Timeout(Duration::from_secs(1)).is_unrecoverable());
    }

    #[test]
    fn test_forces_failure() {
        let transient = IncrementorError::Chain {
            context: "failed to get transaction by hash",
            source: ChainError::Rpc("timeout".into()),
        };
        assert!(!transient.forces_failure());

        let nonce = IncrementorError::Chain {
            context: "failed to get transaction receipt",
            source: ChainError::NonceTooLow("nonce too low".into()),
        };
        assert!(nonce.forces_failure());

        let limit = IncrementorError::GasPriceLimit {
            unique_id: "a".into(),
            max_price: 100,
            chain_id: 1,
        };
        assert!(limit.forces_failure());
        assert!(limit.to_string().contains("gas price limit of 100"));

        assert!(IncrementorError::Broadcast(ChainError::Rpc("down".into())).forces_failure());
        assert!(!IncrementorError::Storage(StorageError("locked".into())).forces_failure());
    }
}
