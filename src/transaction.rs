use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

use crate::config::serde_millis;
use crate::encoding::SignedTransaction;
use crate::error::{DecodeError, OptsError};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxState {
    Pending,
    PriceIncreased,
    Failed,
    Succeeded,
}

impl TxState {
    /// `Failed` and `Succeeded` are final; nothing writes a record after them.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Succeeded)
    }
}

/// Retry policy for a single transaction, fixed when it is inserted.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TransactionOpts {
    /// Deadline measured from the record's creation.
    #[serde(with = "serde_millis")]
    pub timeout: Duration,
    #[serde(with = "serde_millis")]
    pub check_interval: Duration,
    #[serde(with = "serde_millis")]
    pub increase_interval: Duration,
    pub price_multiplier: f64,
    pub max_price: u128,
}

impl TransactionOpts {
    pub fn validate(&self) -> Result<(), OptsError> {
        if self.timeout.is_zero() {
            return Err(OptsError::ZeroTimeout);
        }
        if self.check_interval.is_zero() {
            return Err(OptsError::ZeroCheckInterval);
        }
        if self.increase_interval.is_zero() {
            return Err(OptsError::ZeroIncreaseInterval);
        }
        if !self.price_multiplier.is_finite() || self.price_multiplier <= 1.0 {
            return Err(OptsError::InvalidMultiplier(self.price_multiplier));
        }
        if self.max_price == 0 {
            return Err(OptsError::ZeroMaxPrice);
        }
        Ok(())
    }
}

/// A transaction tracked by the incrementor, as persisted by [`crate::Storage`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Transaction {
    pub unique_id: String,
    pub chain_id: u64,
    pub sender_address_hex: String,
    pub state: TxState,
    pub opts: TransactionOpts,
    pub latest_tx: Vec<u8>,
    pub created_at: SystemTime,
}

impl Transaction {
    pub(crate) fn new(tx: &SignedTransaction, sender: Address, opts: TransactionOpts) -> Self {
        Self {
            unique_id: uuid::Uuid::new_v4().to_string(),
            chain_id: tx.chain_id,
            sender_address_hex: sender.to_checksum(None),
            state: TxState::Pending,
            opts,
            latest_tx: tx.encode(),
            created_at: SystemTime::now(),
        }
    }

    pub fn latest_tx(&self) -> Result<SignedTransaction, DecodeError> {
        SignedTransaction::decode(&self.latest_tx)
    }

    pub fn deadline(&self) -> SystemTime {
        self.created_at + self.opts.timeout
    }

    /// Time left until [`Self::deadline`], zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline()
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO)
    }

    pub fn is_expired(&self) -> bool {
        SystemTime::now() >= self.deadline()
    }

    pub(crate) fn with_latest(&self, tx: &SignedTransaction, state: TxState) -> Self {
        Self {
            state,
            latest_tx: tx.encode(),
            ..self.clone()
        }
    }

    pub(crate) fn with_state(&self, state: TxState) -> Self {
        Self {
            state,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::UnsignedTransaction;

    fn opts() -> TransactionOpts {
        TransactionOpts {
            timeout: Duration::from_secs(60),
            check_interval: Duration::from_secs(1),
            increase_interval: Duration::from_secs(5),
            price_multiplier: 1.5,
            max_price: 1_000,
        }
    }

    fn signed() -> SignedTransaction {
        SignedTransaction {
            chain_id: 5,
            tx: UnsignedTransaction {
                nonce: 1,
                gas_price: 10,
                gas_limit: 21_000,
                to: None,
                value: [0; 32],
                data: vec![],
            },
            signature: vec![],
        }
    }

    #[test]
    fn test_validate_opts() {
        assert!(opts().validate().is_ok());

        let mut o = opts();
        o.timeout = Duration::ZERO;
        assert_eq!(o.validate(), Err(OptsError::ZeroTimeout));

        let mut o = opts();
        o.check_interval = Duration::ZERO;
        assert_eq!(o.validate(), Err(OptsError::ZeroCheckInterval));

        let mut o = opts();
        o.increase_interval = Duration::ZERO;
        assert_eq!(o.validate(), Err(OptsError::ZeroIncreaseInterval));

        let mut o = opts();
        o.price_multiplier = 1.0;
        assert_eq!(o.validate(), Err(OptsError::InvalidMultiplier(1.0)));

        let mut o = opts();
        o.price_multiplier = f64::NAN;
        assert!(matches!(o.validate(), Err(OptsError::InvalidMultiplier(_))));

        let mut o = opts();
        o.max_price = 0;
        assert_eq!(o.validate(), Err(OptsError::ZeroMaxPrice));
    }

    #[test]
    fn test_new_transaction() {
        let sender = Address::from([0xAA; 20]);
        let tx = Transaction::new(&signed(), sender, opts());

        assert_eq!(tx.state, TxState::Pending);
        assert_eq!(tx.chain_id, 5);
        assert_eq!(tx.sender_address_hex, sender.to_checksum(None));
        assert_eq!(tx.latest_tx().unwrap(), signed());
        assert!(!tx.is_expired());
        assert!(tx.remaining() <= Duration::from_secs(60));
    }

    #[test]
    fn test_expired() {
        let mut tx = Transaction::new(&signed(), Address::ZERO, opts());
        tx.created_at = SystemTime::now() - Duration::from_secs(61);

        assert!(tx.is_expired());
        assert_eq!(tx.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_terminal_states() {
        assert!(TxState::Failed.is_terminal());
        assert!(TxState::Succeeded.is_terminal());
        assert!(!TxState::Pending.is_terminal());
        assert!(!TxState::PriceIncreased.is_terminal());
    }

    #[test]
    fn test_serde_record() {
        let tx = Transaction::new(&signed(), Address::from([0x11; 20]), opts());
        let json = serde_json::to_string(&tx).unwrap();
        assert!(json.contains("\"check_interval\":1000"));

        let back: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tx);
    }
}
