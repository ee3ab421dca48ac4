use alloy_primitives::Address;
use std::future::Future;
use std::sync::Arc;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::chain::{
    BcTxStatus, ChainClient, RECEIPT_STATUS_FAILED, RECEIPT_STATUS_SUCCESSFUL, Receipt,
};
use crate::config::GasIncrementorConfig;
use crate::encoding::{SignedTransaction, UnsignedTransaction, scale_gas_price};
use crate::error::{ChainError, IncrementorError};
use crate::signers::SignerRegistry;
use crate::storage::Storage;
use crate::transaction::{Transaction, TransactionOpts, TxState};
use crate::watch::WatchSet;

/// Observer called whenever a watcher hits a recoverable problem.
pub type LogFn = Arc<dyn Fn(&Transaction, &IncrementorError) + Send + Sync>;

/// Raises the gas price of stored transactions until they are mined, run out
/// of time, or would cross their price ceiling.
///
/// Transactions are handed over with [`Self::insert_initial`]. [`Self::run`]
/// polls storage and starts one watcher task per transaction; each watcher
/// checks the chain every `check_interval` and rebroadcasts with a higher gas
/// price every `increase_interval`.
pub struct GasPriceIncrementor {
    cfg: GasIncrementorConfig,
    storage: Arc<dyn Storage>,
    chain: Arc<dyn ChainClient>,
    signers: SignerRegistry,
    watching: Arc<WatchSet>,
    log_fn: Option<LogFn>,
    stop: CancellationToken,
    tasks: TaskTracker,
}

impl GasPriceIncrementor {
    pub fn new(
        cfg: GasIncrementorConfig,
        storage: Arc<dyn Storage>,
        chain: Arc<dyn ChainClient>,
        signers: SignerRegistry,
    ) -> Self {
        Self {
            cfg,
            storage,
            chain,
            signers,
            watching: Arc::new(WatchSet::new()),
            log_fn: None,
            stop: CancellationToken::new(),
            tasks: TaskTracker::new(),
        }
    }

    /// Attaches an observer for errors met by the watchers.
    ///
    /// Needs exclusive access, so it has to happen before the incrementor is
    /// shared and [`Self::run`] is started.
    pub fn attach_log_fn(
        &mut self,
        log_fn: impl Fn(&Transaction, &IncrementorError) + Send + Sync + 'static,
    ) {
        self.log_fn = Some(Arc::new(log_fn));
    }

    /// Polls storage every `pull_interval` and watches every transaction it
    /// returns. Returns once [`Self::stop`] is called.
    pub async fn run(self: &Arc<Self>) {
        let period = self.cfg.pull_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(pull_interval = ?period, "gas price incrementor started");

        loop {
            tokio::select! {
                biased;

                _ = self.stop.cancelled() => break,

                _ = ticker.tick() => {
                    let signers = self.signers.addresses();
                    let txs = match self.storage.transactions_to_check(&signers).await {
                        Ok(txs) => txs,
                        Err(err) => {
                            warn!(error = %err, "failed to fetch transactions to check, skipping cycle");
                            continue;
                        }
                    };

                    for tx in txs {
                        // finalized records are never picked up again
                        if tx.state.is_terminal() {
                            continue;
                        }
                        self.try_watch(tx);
                    }
                }
            }
        }

        info!("gas price incrementor stopped");
    }

    /// Signals the poll loop and every watcher to exit. Calls into the chain
    /// client that are already in flight are not interrupted.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Stops and waits until every watcher has exited.
    pub async fn shutdown(&self) {
        self.stop();
        self.tasks.close();
        self.tasks.wait().await;
    }

    pub fn watching_count(&self) -> usize {
        self.watching.len()
    }

    /// Stores a freshly broadcast transaction in `Pending` state. It is
    /// watched from the next poll cycle on. Returns the record's unique id.
    pub async fn insert_initial(
        &self,
        tx: &SignedTransaction,
        opts: TransactionOpts,
        sender: Address,
    ) -> Result<String, IncrementorError> {
        opts.validate()?;

        let record = Transaction::new(tx, sender, opts);
        self.storage.upsert_transaction(&record).await?;

        debug!(unique_id = %record.unique_id, chain_id = record.chain_id, %sender, "transaction inserted");
        Ok(record.unique_id)
    }

    pub fn can_sign(&self, sender: Address) -> bool {
        self.signers.resolve_address(sender).is_some()
    }

    /// Whether `sender` has room for another queued transaction.
    pub async fn can_queue(&self, sender: Address) -> Result<bool, IncrementorError> {
        let length = self.storage.sender_queue_len(sender).await?;
        Ok(length < self.cfg.max_queue_per_signer)
    }

    fn try_watch(self: &Arc<Self>, tx: Transaction) {
        if self.is_stopped() || self.watching.is_watching(&tx.unique_id) {
            return;
        }
        if let Err(err) = tx.opts.validate() {
            self.log(&tx, &IncrementorError::InvalidOpts(err));
            return;
        }
        let Some(guard) = self.watching.try_guard(&tx.unique_id) else {
            return;
        };

        debug!(unique_id = %tx.unique_id, chain_id = tx.chain_id, state = ?tx.state, "watching transaction");

        let this = Arc::clone(self);
        self.tasks.spawn(async move {
            let _guard = guard;
            this.watch(tx).await;
        });
    }

    async fn watch(&self, mut tx: Transaction) {
        let Err(err) = self.watch_and_increment(&mut tx).await else {
            return;
        };
        self.log(&tx, &err);

        if !tx.is_expired() {
            return;
        }
        if let Err(err) = self.transaction_failed(&tx).await {
            self.log(&tx, &err);
        }
    }

    /// Drives one transaction until it reaches a final state, the deadline
    /// passes or the incrementor stops.
    ///
    /// Errors that leave the record untouched are returned; the caller logs
    /// them and the next poll cycle picks the record up again.
    async fn watch_and_increment(&self, tx: &mut Transaction) -> Result<(), IncrementorError> {
        let deadline = sleep(tx.remaining());
        tokio::pin!(deadline);

        let check_every = tx.opts.check_interval;
        let mut check = interval_at(Instant::now() + check_every, check_every);
        check.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let increase_every = tx.opts.increase_interval;
        let mut increase = interval_at(Instant::now() + increase_every, increase_every);
        increase.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = self.stop.cancelled() => return Ok(()),

                _ = &mut deadline => {
                    info!(unique_id = %tx.unique_id, "transaction timed out");
                    return self.transaction_failed(tx).await;
                }

                _ = check.tick() => match self.tx_status(tx).await {
                    Ok(BcTxStatus::Succeeded) => return self.transaction_succeeded(tx).await,
                    Ok(BcTxStatus::Failed) => return self.transaction_failed(tx).await,
                    Ok(BcTxStatus::Pending) => {}
                    Err(err) if err.forces_failure() => {
                        warn!(unique_id = %tx.unique_id, error = %err, "unhandleable status error, marking tx as failed");
                        self.log(tx, &err);
                        return self.transaction_failed(tx).await;
                    }
                    Err(err) => return Err(err),
                },

                _ = increase.tick() => match self.increase_gas_price(tx).await {
                    Ok(updated) => *tx = updated,
                    Err(err) if err.forces_failure() => {
                        warn!(unique_id = %tx.unique_id, error = %err, "unhandleable increase error, marking tx as failed");
                        self.log(tx, &err);
                        return self.transaction_failed(tx).await;
                    }
                    Err(err) => return Err(err),
                },
            }
        }
    }

    async fn tx_status(&self, tx: &Transaction) -> Result<BcTxStatus, IncrementorError> {
        let latest = tx.latest_tx()?;
        let hash = latest.hash();

        let (_, pending) = self
            .bounded(self.chain.transaction_by_hash(tx.chain_id, hash))
            .await
            .map_err(|source| IncrementorError::Chain {
                context: "failed to get transaction by hash",
                source,
            })?;
        if pending {
            return Ok(BcTxStatus::Pending);
        }

        let receipt = self
            .bounded(self.chain.transaction_receipt(tx.chain_id, hash))
            .await
            .map_err(|source| IncrementorError::Chain {
                context: "failed to get transaction receipt",
                source,
            })?;

        debug!(unique_id = %tx.unique_id, %hash, block = ?receipt.block_number, status = receipt.status, "transaction mined");
        Ok(self.status_from_receipt(tx, &receipt))
    }

    fn status_from_receipt(&self, tx: &Transaction, receipt: &Receipt) -> BcTxStatus {
        match receipt.status {
            RECEIPT_STATUS_SUCCESSFUL => BcTxStatus::Succeeded,
            RECEIPT_STATUS_FAILED => BcTxStatus::Failed,
            status => {
                let err = IncrementorError::UnknownReceiptStatus {
                    status,
                    unique_id: tx.unique_id.clone(),
                    hash: receipt.tx_hash,
                };
                self.log(tx, &err);
                BcTxStatus::Failed
            }
        }
    }

    async fn increase_gas_price(&self, tx: &Transaction) -> Result<Transaction, IncrementorError> {
        let latest = tx.latest_tx()?;
        let new_price = scale_gas_price(latest.gas_price(), tx.opts.price_multiplier);

        if new_price > tx.opts.max_price {
            return Err(IncrementorError::GasPriceLimit {
                unique_id: tx.unique_id.clone(),
                max_price: tx.opts.max_price,
                chain_id: tx.chain_id,
            });
        }

        if new_price == latest.gas_price() {
            debug!(
                unique_id = %tx.unique_id,
                gas_price = new_price,
                multiplier = tx.opts.price_multiplier,
                "multiplier too small to raise gas price, rebroadcasting unchanged"
            );
        }

        let rebuilt = latest.tx.with_gas_price(new_price);
        let signed = self
            .sign_and_send(&rebuilt, tx.chain_id, &tx.sender_address_hex)
            .await?;

        info!(
            unique_id = %tx.unique_id,
            old_price = latest.gas_price(),
            new_price,
            hash = %signed.hash(),
            "gas price increased"
        );
        self.transaction_price_increased(tx, &signed).await
    }

    async fn sign_and_send(
        &self,
        tx: &UnsignedTransaction,
        chain_id: u64,
        sender_hex: &str,
    ) -> Result<SignedTransaction, IncrementorError> {
        let signer = self
            .signers
            .resolve(sender_hex)
            .ok_or_else(|| IncrementorError::MissingSigner(sender_hex.to_owned()))?;

        let signed = signer.sign(tx, chain_id).map_err(IncrementorError::Sign)?;

        self.bounded(self.chain.send_transaction(chain_id, &signed))
            .await
            .map_err(IncrementorError::Broadcast)?;

        Ok(signed)
    }

    /// Applies `call_timeout`, if configured, to a chain client call.
    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, ChainError>>,
    ) -> Result<T, ChainError> {
        match self.cfg.call_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| ChainError::Timeout(limit))?,
            None => call.await,
        }
    }

    async fn transaction_failed(&self, tx: &Transaction) -> Result<(), IncrementorError> {
        self.storage
            .upsert_transaction(&tx.with_state(TxState::Failed))
            .await?;
        info!(unique_id = %tx.unique_id, "transaction marked as failed");
        Ok(())
    }

    async fn transaction_succeeded(&self, tx: &Transaction) -> Result<(), IncrementorError> {
        self.storage
            .upsert_transaction(&tx.with_state(TxState::Succeeded))
            .await?;
        info!(unique_id = %tx.unique_id, "transaction succeeded");
        Ok(())
    }

    async fn transaction_price_increased(
        &self,
        tx: &Transaction,
        signed: &SignedTransaction,
    ) -> Result<Transaction, IncrementorError> {
        let updated = tx.with_latest(signed, TxState::PriceIncreased);
        self.storage.upsert_transaction(&updated).await?;
        Ok(updated)
    }

    fn log(&self, tx: &Transaction, err: &IncrementorError) {
        debug!(unique_id = %tx.unique_id, chain_id = tx.chain_id, error = %err, "incrementor error");
        if let Some(log_fn) = &self.log_fn {
            log_fn(tx, err);
        }
    }
}
