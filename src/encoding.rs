//! Wire representation of the transactions the incrementor rebroadcasts.
//!
//! The `latest_tx` field of a stored record holds a borsh-encoded
//! [`SignedTransaction`]; the storage layer treats it as opaque bytes.

use alloy_primitives::{Address, B256, U256, keccak256};
use borsh::{BorshDeserialize, BorshSerialize};

use crate::error::DecodeError;

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: Option<[u8; 20]>,
    pub value: [u8; 32], // U256 as big-endian bytes
    pub data: Vec<u8>,
}

impl UnsignedTransaction {
    pub fn recipient(&self) -> Option<Address> {
        self.to.map(Address::from)
    }

    pub fn value(&self) -> U256 {
        U256::from_be_bytes(self.value)
    }

    /// Same payload (recipient, value, nonce, gas limit, data) with a new gas price.
    pub fn with_gas_price(&self, gas_price: u128) -> Self {
        Self {
            gas_price,
            ..self.clone()
        }
    }
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub chain_id: u64,
    pub tx: UnsignedTransaction,
    pub signature: Vec<u8>,
}

impl SignedTransaction {
    /// Borsh encoding of the whole signed transaction.
    ///
    /// Infallible: the only error borsh can report is one from the writer,
    /// and writing into a `Vec` never fails. The fields are plain integers,
    /// byte arrays and byte vectors, none of which borsh rejects.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(128 + self.tx.data.len() + self.signature.len());
        match self.serialize(&mut buf) {
            Ok(()) => buf,
            Err(err) => unreachable!("borsh write into Vec failed: {err}"),
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        Ok(borsh::from_slice(bytes)?)
    }

    pub fn hash(&self) -> B256 {
        keccak256(self.encode())
    }

    pub fn gas_price(&self) -> u128 {
        self.tx.gas_price
    }

    pub fn nonce(&self) -> u64 {
        self.tx.nonce
    }
}

/// Scales a gas price by `multiplier`, truncating toward zero.
///
/// The multiply happens in floating point so fractional multipliers keep their
/// magnitude; the result saturates at `u128::MAX`.
pub fn scale_gas_price(gas_price: u128, multiplier: f64) -> u128 {
    (gas_price as f64 * multiplier) as u128
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SignedTransaction {
        SignedTransaction {
            chain_id: 137,
            tx: UnsignedTransaction {
                nonce: 7,
                gas_price: 40,
                gas_limit: 21_000,
                to: Some([0xBB; 20]),
                value: U256::from(1_000u64).to_be_bytes(),
                data: vec![0xde, 0xad],
            },
            signature: vec![1; 65],
        }
    }

    #[test]
    fn test_decode_encoded() {
        let tx = sample();
        let decoded = SignedTransaction::decode(&tx.encode()).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(decoded.tx.value(), U256::from(1_000u64));
        assert_eq!(decoded.tx.recipient(), Some(Address::from([0xBB; 20])));
    }

    #[test]
    fn test_encode_large_payload() {
        let mut tx = sample();
        tx.tx.data = vec![0x42; 128 * 1024];
        tx.signature = vec![0xff; 65];

        let bytes = tx.encode();
        assert!(bytes.len() > 128 * 1024);
        assert_eq!(SignedTransaction::decode(&bytes).unwrap(), tx);
        assert_eq!(tx.hash(), keccak256(&bytes));
    }

    #[test]
    fn test_decode_garbage() {
        assert!(SignedTransaction::decode(&[0x01, 0x02, 0x03]).is_err());
        assert!(SignedTransaction::decode(&[]).is_err());
    }

    #[test]
    fn test_hash_depends_on_gas_price() {
        let tx = sample();
        let mut bumped = tx.clone();
        bumped.tx = tx.tx.with_gas_price(80);

        assert_ne!(tx.hash(), bumped.hash());
        assert_eq!(bumped.nonce(), tx.nonce());
        assert_eq!(bumped.tx.data, tx.tx.data);
        assert_eq!(bumped.gas_price(), 80);
    }

    #[test]
    fn test_scale_gas_price() {
        assert_eq!(scale_gas_price(40, 2.0), 80);
        assert_eq!(scale_gas_price(100, 1.125), 112);
        assert_eq!(scale_gas_price(3, 1.5), 4);
        // small multipliers can truncate back to the same price
        assert_eq!(scale_gas_price(40, 1.01), 40);
        assert_eq!(scale_gas_price(u128::MAX, 2.0), u128::MAX);
    }
}
