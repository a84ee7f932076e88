// common/src/lib.rs
pub mod approval;
pub mod chain;
pub mod config;
pub mod connection;
pub mod credentials;
pub mod cycle;
pub mod error;
pub mod executor;
pub mod logger;
pub mod retry;
pub mod route;
pub mod runtime;

#[cfg(test)]
pub(crate) mod testing;

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use log::{error, info};

pub use chain::{Chain, RpcChain, TransactionRecord};
pub use config::{load_config, BotConfig};
pub use credentials::{load_accounts, require_accounts, Account, EnvSecrets, SecretSource};
pub use cycle::{PassReport, SwapCycle};
pub use error::Error;
pub use route::{HttpRouteApi, RouteApi, RouteFetcher, RouteQuote, SwapRequest};

use runtime::{ask_swap_count, Operator, Scheduler, StdinOperator, TokioScheduler};

// ─────────────────── Startup ───────────────────

/// What a flow needs before its first swap.
pub struct Startup {
    pub accounts: Vec<Account>,
    pub swaps_per_wallet: usize,
    pub chain: Arc<dyn Chain>,
}

/// Loads keys, connects, then asks the operator for the swap count.
///
/// Keys are checked before `connect` runs, so a missing `.env` never touches
/// the network.
pub async fn bootstrap<F, Fut>(
    secrets: &dyn SecretSource,
    operator: &dyn Operator,
    connect: F,
) -> Result<Startup, Error>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Arc<dyn Chain>, Error>>,
{
    let accounts = require_accounts(secrets)?;
    info!("Loaded {} wallet(s)", accounts.len());
    let chain = connect().await?;
    let swaps_per_wallet = ask_swap_count(operator).await?;
    Ok(Startup {
        accounts,
        swaps_per_wallet,
        chain,
    })
}

async fn start() -> Result<(BotConfig, SwapCycle)> {
    let cfg = load_config()?;
    logger::setup_logging(&cfg.log_level)?;
    logger::banner();

    let scheduler: Arc<dyn Scheduler> = Arc::new(TokioScheduler);
    let network = &cfg.network;
    let probe_clock = scheduler.clone();
    let startup = bootstrap(&EnvSecrets, &StdinOperator, move || async move {
        let chain = connection::connect(network, probe_clock.as_ref()).await?;
        Ok(Arc::new(chain) as Arc<dyn Chain>)
    })
    .await
    .map_err(|e| {
        error!("{e}");
        e
    })?;

    let api = Arc::new(HttpRouteApi::new(&cfg.route_api)?);
    let cycle = SwapCycle::new(
        &cfg,
        startup.accounts,
        startup.swaps_per_wallet,
        startup.chain,
        api,
        scheduler,
    );
    Ok((cfg, cycle))
}

// ─────────────────── Flows ───────────────────

/// Swaps for every wallet, waits out the cycle interval, repeats forever.
pub async fn swap_cycle_flow() -> Result<()> {
    let (_cfg, cycle) = start().await?;
    cycle.run_forever().await;
    Ok(())
}

/// One pass over every wallet, then exit.
pub async fn single_pass_flow() -> Result<()> {
    let (cfg, cycle) = start().await?;
    let report = cycle.run_pass().await;
    info!(
        target: logger::SUCCESS,
        "Pass finished on {}: {} swap(s) confirmed, {} failed",
        cfg.network.name,
        report.succeeded,
        report.failed
    );
    Ok(())
}
