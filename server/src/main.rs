mod simulation;

use alloy_primitives::{Address, U256};
use clap::Parser;
use gas_incrementor::{
    ChainClient, GasIncrementorConfig, GasPriceIncrementor, MemoryStorage, SignedTransaction,
    SignerRegistry, TransactionOpts, UnsignedTransaction,
};
use simulation::{SimulatedChain, local_signer};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CHAIN_ID: u64 = 137;

#[derive(Parser, Debug)]
#[command(about = "Runs the gas price incrementor against a simulated chain")]
struct Args {
    /// TOML file with a `GasIncrementorConfig`
    #[arg(long)]
    config: Option<PathBuf>,

    /// Gas price at which the simulated chain mines a transaction
    #[arg(long, default_value_t = 120)]
    market_price: u128,

    #[arg(long, default_value_t = 3)]
    transactions: u64,

    #[arg(long, default_value_t = 1.5)]
    multiplier: f64,

    #[arg(long, default_value_t = 200)]
    max_price: u128,

    /// Seconds before the simulation gives up waiting
    #[arg(long, default_value_t = 30)]
    deadline: u64,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<GasIncrementorConfig> {
    match path {
        Some(path) => Ok(toml::from_str(&std::fs::read_to_string(path)?)?),
        None => Ok(GasIncrementorConfig {
            pull_interval: Duration::from_millis(200),
            ..Default::default()
        }),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let cfg = load_config(args.config.as_ref())?;
    info!(?cfg, "loaded config");

    let sender = Address::from([0xAA; 20]);
    let storage = Arc::new(MemoryStorage::new());
    let chain = Arc::new(SimulatedChain::new(args.market_price));
    let signers = SignerRegistry::new().with_signer(sender, local_signer(sender));

    let mut incrementor = GasPriceIncrementor::new(cfg, storage.clone(), chain.clone(), signers);
    incrementor.attach_log_fn(|tx, err| {
        warn!(unique_id = %tx.unique_id, state = ?tx.state, "incrementor: {err}");
    });
    let incrementor = Arc::new(incrementor);

    let opts = TransactionOpts {
        timeout: Duration::from_secs(args.deadline),
        check_interval: Duration::from_millis(300),
        increase_interval: Duration::from_secs(1),
        price_multiplier: args.multiplier,
        max_price: args.max_price,
    };

    for nonce in 0..args.transactions {
        if !incrementor.can_queue(sender).await? {
            warn!(nonce, "sender queue is full, not queueing");
            continue;
        }

        let tx = SignedTransaction {
            chain_id: CHAIN_ID,
            tx: UnsignedTransaction {
                nonce,
                gas_price: 20 * (nonce as u128 + 1),
                gas_limit: 21_000,
                to: Some([0xBB; 20]),
                value: U256::from(1_000_000u64).to_be_bytes(),
                data: vec![],
            },
            signature: vec![],
        };
        chain.send_transaction(CHAIN_ID, &tx).await?;
        let id = incrementor.insert_initial(&tx, opts.clone(), sender).await?;
        info!(%id, nonce, gas_price = tx.gas_price(), "queued transaction");
    }

    let runner = tokio::spawn({
        let incrementor = incrementor.clone();
        async move { incrementor.run().await }
    });

    let started = tokio::time::Instant::now();
    while started.elapsed() < Duration::from_secs(args.deadline + 5) {
        tokio::time::sleep(Duration::from_millis(500)).await;
        if storage.all().iter().all(|tx| tx.state.is_terminal()) {
            break;
        }
    }

    incrementor.shutdown().await;
    runner.await?;

    for tx in storage.all() {
        let price = tx.latest_tx().map(|t| t.gas_price()).unwrap_or_default();
        info!(unique_id = %tx.unique_id, state = ?tx.state, gas_price = price, "final");
    }
    info!("simulation finished");

    Ok(())
}
