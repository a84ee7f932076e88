
use faroswap_common::swap_cycle_flow;
use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Reads .env (PRIVATE_KEY_1.., optional RPC_URL / ROUTE_API_URL / API_KEY)
    // and runs until the process is killed
    swap_cycle_flow().await?;

    Ok(())
}
