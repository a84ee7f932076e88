use std::env;
use std::time::Duration;

use alloy::primitives::utils::parse_ether;
use alloy::primitives::{address, Address, U256};
use dotenv::dotenv;

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

// ─────────────────── Network ───────────────────

#[derive(Clone, Debug)]
pub struct NetworkConfig {
    pub name: String,
    pub chain_id: u64,
    pub rpc_urls: Vec<String>,
    /// Applied per URL while probing liveness.
    pub probe: RetryPolicy,
    pub confirmation_poll: Duration,
}

// ─────────────────── Route API ───────────────────

#[derive(Clone, Debug)]
pub struct RouteApiConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    /// How far in the future the quoted route may be executed. Sent to the
    /// API only; never checked locally.
    pub deadline: Duration,
    pub retry: RetryPolicy,
}

// ─────────────────── Swap plan ───────────────────

/// The single pair and amount swapped on every attempt.
#[derive(Clone, Debug)]
pub struct SwapPlan {
    pub label: String,
    pub from_token: Address,
    pub to_token: Address,
    pub amount: U256,
}

#[derive(Clone, Debug)]
pub struct BotConfig {
    pub network: NetworkConfig,
    pub route_api: RouteApiConfig,
    pub plan: SwapPlan,
    /// Spender granted the allowance for non-native source tokens.
    pub router: Address,
    /// Sentinel address the aggregator uses for the native asset.
    pub native_token: Address,
    pub default_gas_limit: u64,
    pub swap_delay: Duration,
    pub cycle_interval: Duration,
    pub log_level: String,
}

pub const PHRS: Address = address!("eeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee");
pub const USDT: Address = address!("d4071393f8716661958f766df660033b3d35fd29");
pub const DODO_ROUTER: Address = address!("73cafc894dbfc181398264934f7be4e482fc9d40");
pub const PHAROS_CHAIN_ID: u64 = 688688;

impl BotConfig {
    pub fn pharos_testnet() -> Self {
        Self {
            network: NetworkConfig {
                name: "pharos".into(),
                chain_id: PHAROS_CHAIN_ID,
                rpc_urls: vec!["https://testnet.dplabs-internal.com".into()],
                probe: RetryPolicy::new(3, Duration::from_secs(1)),
                confirmation_poll: Duration::from_secs(2),
            },
            route_api: RouteApiConfig {
                url: "https://api.dodoex.io/route-service/v2/widget/getdodoroute".into(),
                api_key: None,
                timeout: Duration::from_secs(15),
                deadline: Duration::from_secs(600),
                retry: RetryPolicy::new(5, Duration::from_secs(2)),
            },
            plan: SwapPlan {
                label: "PHRS -> USDT".into(),
                from_token: PHRS,
                to_token: USDT,
                // 0.00245 PHRS
                amount: U256::from(2_450_000_000_000_000u64),
            },
            router: DODO_ROUTER,
            native_token: PHRS,
            default_gas_limit: 500_000,
            swap_delay: Duration::from_secs(2),
            cycle_interval: Duration::from_secs(2 * 60 * 60),
            log_level: "info".into(),
        }
    }

    pub fn is_native(&self, token: Address) -> bool {
        token == self.native_token
    }

    /// Applies overrides from `lookup` on top of the built-in defaults.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(urls) = var("RPC_URL") {
            self.network.rpc_urls = urls
                .split(',')
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(url) = var("ROUTE_API_URL") {
            self.route_api.url = url;
        }
        self.route_api.api_key = var("API_KEY");
        if let Some(amount) = var("SWAP_AMOUNT") {
            self.plan.amount = parse_ether(&amount)
                .map_err(|e| Error::Config(format!("SWAP_AMOUNT {amount:?}: {e}")))?;
        }
        if let Some(secs) = var("CYCLE_INTERVAL_SECS") {
            let secs = secs
                .parse::<u64>()
                .map_err(|e| Error::Config(format!("CYCLE_INTERVAL_SECS {secs:?}: {e}")))?;
            self.cycle_interval = Duration::from_secs(secs);
        }
        if let Some(level) = var("LOG_LEVEL") {
            self.log_level = level;
        }

        if self.network.rpc_urls.is_empty() {
            return Err(Error::Config("RPC_URL lists no endpoints".into()));
        }
        Ok(self)
    }
}

/// Loads `.env` and builds the configuration from defaults plus environment
/// overrides.
pub fn load_config() -> Result<BotConfig> {
    dotenv().ok();
    BotConfig::pharos_testnet().with_overrides(|name| env::var(name).ok())
}
