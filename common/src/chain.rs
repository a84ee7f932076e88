use std::time::Duration;

use alloy::eips::eip2718::Encodable2718;
use alloy::network::{Ethereum, EthereumWallet, ReceiptResponse, TransactionBuilder};
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::types::eth::TransactionRequest;
use alloy::sol;
use async_trait::async_trait;
use log::debug;
use url::Url;

use crate::credentials::Account;
use crate::error::{Error, Result};

pub type HttpProvider = RootProvider<Ethereum>;

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256);
        function decimals() external view returns (uint8);
        function approve(address spender, uint256 amount) external returns (bool);
        function allowance(address owner, address spender) external view returns (uint256);
    }
}

/// One outgoing transaction: built for a swap or an approval, submitted,
/// then dropped once the outcome is logged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionRecord {
    pub to: Address,
    pub input: Bytes,
    pub value: U256,
    pub gas_limit: u64,
    pub nonce: u64,
    pub hash: Option<TxHash>,
}

/// The narrow slice of a node the bot relies on.
#[async_trait]
pub trait Chain: Send + Sync {
    async fn chain_id(&self) -> Result<u64>;

    async fn block_number(&self) -> Result<u64>;

    /// Next nonce for `owner`, counting transactions still in the mempool.
    async fn pending_nonce(&self, owner: Address) -> Result<u64>;

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256>;

    async fn token_decimals(&self, token: Address) -> Result<u8>;

    async fn token_allowance(&self, token: Address, owner: Address, spender: Address)
        -> Result<U256>;

    /// Signs `tx` with `account` and broadcasts it.
    async fn submit(&self, account: &Account, tx: &TransactionRecord) -> Result<TxHash>;

    /// Blocks until `hash` is mined; a reverted receipt is an error.
    async fn wait_for_confirmation(&self, hash: TxHash) -> Result<()>;
}

/// `Chain` over a JSON-RPC HTTP endpoint.
#[derive(Clone)]
pub struct RpcChain {
    provider: HttpProvider,
    chain_id: u64,
    poll_interval: Duration,
}

fn rpc_err(what: &str) -> impl FnOnce(alloy::transports::TransportError) -> Error + '_ {
    move |e| Error::Rpc(format!("{what}: {e}"))
}

fn call_err(what: &str) -> impl FnOnce(alloy::contract::Error) -> Error + '_ {
    move |e| Error::Rpc(format!("{what}: {e}"))
}

impl RpcChain {
    pub fn http(rpc_url: &str, chain_id: u64, poll_interval: Duration) -> Result<Self> {
        let url = Url::parse(rpc_url)
            .map_err(|e| Error::Config(format!("Invalid RPC URL {rpc_url}: {e}")))?;
        Ok(Self {
            provider: RootProvider::new_http(url),
            chain_id,
            poll_interval,
        })
    }

    fn erc20(&self, token: Address) -> IERC20::IERC20Instance<HttpProvider> {
        IERC20::new(token, self.provider.clone())
    }
}

#[async_trait]
impl Chain for RpcChain {
    async fn chain_id(&self) -> Result<u64> {
        self.provider
            .get_chain_id()
            .await
            .map_err(rpc_err("eth_chainId"))
    }

    async fn block_number(&self) -> Result<u64> {
        self.provider
            .get_block_number()
            .await
            .map_err(rpc_err("eth_blockNumber"))
    }

    async fn pending_nonce(&self, owner: Address) -> Result<u64> {
        self.provider
            .get_transaction_count(owner)
            .pending()
            .await
            .map_err(rpc_err("eth_getTransactionCount"))
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256> {
        self.erc20(token)
            .balanceOf(owner)
            .call()
            .await
            .map_err(call_err("balanceOf"))
    }

    async fn token_decimals(&self, token: Address) -> Result<u8> {
        self.erc20(token)
            .decimals()
            .call()
            .await
            .map_err(call_err("decimals"))
    }

    async fn token_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256> {
        self.erc20(token)
            .allowance(owner, spender)
            .call()
            .await
            .map_err(call_err("allowance"))
    }

    async fn submit(&self, account: &Account, tx: &TransactionRecord) -> Result<TxHash> {
        let gas_price = self
            .provider
            .get_gas_price()
            .await
            .map_err(rpc_err("eth_gasPrice"))?;

        let request = TransactionRequest::default()
            .with_from(account.address())
            .with_to(tx.to)
            .with_input(tx.input.clone())
            .with_value(tx.value)
            .with_nonce(tx.nonce)
            .with_gas_limit(tx.gas_limit)
            .with_gas_price(gas_price)
            .with_chain_id(self.chain_id);

        let wallet = EthereumWallet::from(account.signer().clone());
        let envelope = request
            .build(&wallet)
            .await
            .map_err(|e| Error::Rpc(format!("signing failed: {e}")))?;

        let pending = self
            .provider
            .send_raw_transaction(&envelope.encoded_2718())
            .await
            .map_err(rpc_err("eth_sendRawTransaction"))?;
        let hash = *pending.tx_hash();
        debug!("broadcast {hash} nonce={} to={}", tx.nonce, tx.to);
        Ok(hash)
    }

    async fn wait_for_confirmation(&self, hash: TxHash) -> Result<()> {
        loop {
            let receipt = self
                .provider
                .get_transaction_receipt(hash)
                .await
                .map_err(rpc_err("eth_getTransactionReceipt"))?;
            match receipt {
                Some(r) if r.status() => return Ok(()),
                Some(r) => {
                    return Err(Error::Rpc(format!(
                        "transaction {hash} reverted in block {:?}",
                        r.block_number()
                    )))
                }
                None => tokio::time::sleep(self.poll_interval).await,
            }
        }
    }
}
