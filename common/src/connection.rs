use log::{info, warn};

use crate::chain::{Chain, RpcChain};
use crate::config::NetworkConfig;
use crate::error::{Error, Result};
use crate::retry::{RetryError, RetryPolicy};
use crate::runtime::Scheduler;

/// Checks that `chain` answers and belongs to the expected network.
///
/// RPC failures are retried under `policy`. A node reporting a different
/// chain id is rejected at once.
pub async fn probe(
    chain: &dyn Chain,
    expected_chain_id: u64,
    policy: &RetryPolicy,
    scheduler: &dyn Scheduler,
) -> Result<u64> {
    let outcome = policy
        .run(
            scheduler,
            |_| async move {
                let block = chain.block_number().await?;
                let chain_id = chain.chain_id().await?;
                if chain_id != expected_chain_id {
                    return Err(Error::Connectivity(format!(
                        "endpoint serves chain {chain_id}, expected {expected_chain_id}"
                    )));
                }
                Ok::<_, Error>(block)
            },
            |e| matches!(e, Error::Rpc(_)),
            |attempt, e| warn!("RPC probe {attempt} failed: {e}"),
        )
        .await;

    match outcome {
        Ok(block) => Ok(block),
        Err(RetryError::Exhausted { attempts, last }) => Err(Error::Connectivity(format!(
            "no answer after {attempts} probes: {last}"
        ))),
        Err(RetryError::Aborted(e @ Error::Connectivity(_))) => Err(e),
        Err(RetryError::Aborted(e)) => Err(Error::Connectivity(e.to_string())),
    }
}

/// Returns a handle on the first configured endpoint that passes [`probe`].
pub async fn connect(network: &NetworkConfig, scheduler: &dyn Scheduler) -> Result<RpcChain> {
    let mut last = Error::Connectivity(format!("no RPC endpoints configured for {}", network.name));
    for url in &network.rpc_urls {
        let chain = RpcChain::http(url, network.chain_id, network.confirmation_poll)?;
        match probe(&chain, network.chain_id, &network.probe, scheduler).await {
            Ok(block) => {
                info!("Connected to {} via {url} at block {block}", network.name);
                return Ok(chain);
            }
            Err(e) => {
                warn!("RPC endpoint {url} unusable: {e}");
                last = e;
            }
        }
    }
    Err(last)
}
