//! Gas price incrementor.
//!
//! Keeps stored transactions alive until they are mined: a poll loop picks up
//! every transaction this process can sign for and starts a watcher that
//! periodically checks its status and rebroadcasts it with a higher gas price,
//! giving up once the transaction's deadline or price ceiling is reached.
//!
//! Chain access, persistence and signing are supplied through the
//! [`ChainClient`], [`Storage`] and [`TransactionSigner`] traits.

pub mod chain;
pub mod config;
pub mod encoding;
pub mod error;
pub mod incrementor;
pub mod signers;
pub mod storage;
pub mod transaction;
pub mod watch;

pub use chain::{BcTxStatus, ChainClient, Receipt};
pub use config::GasIncrementorConfig;
pub use encoding::{SignedTransaction, UnsignedTransaction};
pub use error::{ChainError, DecodeError, IncrementorError, OptsError, SignerError, StorageError};
pub use incrementor::{GasPriceIncrementor, LogFn};
pub use signers::{SignerRegistry, TransactionSigner};
pub use storage::{MemoryStorage, Storage};
pub use transaction::{Transaction, TransactionOpts, TxState};
pub use watch::WatchSet;
