
use faroswap_common::single_pass_flow;
use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // One round over every wallet, no countdown
    single_pass_flow().await?;

    Ok(())
}
