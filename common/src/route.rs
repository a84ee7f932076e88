use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use log::{info, warn};
use rand::seq::SliceRandom;
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::config::RouteApiConfig;
use crate::error::{Error, Result};
use crate::retry::{RetryError, RetryPolicy};
use crate::runtime::Scheduler;

/// Status value the aggregator uses for "no viable route yet".
const NO_ROUTE_STATUS: i64 = -1;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
];

fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

// ─────────────────── Request / response types ───────────────────

/// One swap the bot wants quoted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwapRequest {
    pub from_token: Address,
    pub to_token: Address,
    pub amount: U256,
    pub user: Address,
}

/// Query string of a single route call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteQuery {
    pub chain_id: u64,
    /// Unix seconds after which the aggregator should refuse the route.
    pub deadline: u64,
    pub request: SwapRequest,
}

impl RouteQuery {
    pub fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("chainId", self.chain_id.to_string()),
            ("deadLine", self.deadline.to_string()),
            ("toTokenAddress", self.request.to_token.to_string()),
            ("fromTokenAddress", self.request.from_token.to_string()),
            ("userAddr", self.request.user.to_string()),
            ("fromAmount", self.request.amount.to_string()),
        ]
    }
}

/// A ready-to-sign transaction proposal returned by the aggregator.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RouteQuote {
    pub to: Address,
    pub data: Bytes,
    #[serde(deserialize_with = "flexible_u256")]
    pub value: U256,
    #[serde(default, rename = "gasLimit", deserialize_with = "flexible_gas")]
    pub gas_limit: Option<u64>,
    /// Expected output amount, kept for logging only.
    #[serde(default, rename = "resAmount")]
    pub res_amount: Option<Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberLike {
    Int(u64),
    Text(String),
}

impl NumberLike {
    fn to_u256(&self) -> Result<U256, String> {
        match self {
            NumberLike::Int(n) => Ok(U256::from(*n)),
            NumberLike::Text(s) if s.trim().is_empty() => Ok(U256::ZERO),
            NumberLike::Text(s) => s.trim().parse::<U256>().map_err(|e| format!("{s:?}: {e}")),
        }
    }
}

fn flexible_u256<'de, D: Deserializer<'de>>(d: D) -> Result<U256, D::Error> {
    NumberLike::deserialize(d)?
        .to_u256()
        .map_err(serde::de::Error::custom)
}

/// Missing, null, empty or zero all mean "no gas limit supplied".
fn flexible_gas<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    let Some(raw) = Option::<NumberLike>::deserialize(d)? else {
        return Ok(None);
    };
    let gas = raw.to_u256().map_err(serde::de::Error::custom)?;
    if gas.is_zero() {
        return Ok(None);
    }
    u64::try_from(gas)
        .map(Some)
        .map_err(|_| serde::de::Error::custom(format!("gasLimit {gas} out of range")))
}

// ─────────────────── Transport ───────────────────

/// Why a single route call produced nothing usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiFailure {
    /// Timeout, connection failure, or non-2xx status. Worth retrying.
    Transient(String),
    /// The service answered 2xx with a body that is not JSON.
    Malformed(String),
}

/// The aggregator's single read endpoint.
#[async_trait]
pub trait RouteApi: Send + Sync {
    async fn get_route(&self, query: &RouteQuery) -> Result<Value, ApiFailure>;
}

trait RouteReqExt {
    fn with_api_key(self, key: Option<&str>) -> Self;
    fn with_random_agent(self) -> Self;
}

impl RouteReqExt for reqwest::RequestBuilder {
    fn with_api_key(self, key: Option<&str>) -> Self {
        match key {
            Some(key) if !key.is_empty() => self.header("X-API-KEY", key),
            _ => self,
        }
    }

    fn with_random_agent(self) -> Self {
        self.header(reqwest::header::USER_AGENT, random_user_agent())
    }
}

pub struct HttpRouteApi {
    http: Client,
    url: String,
    api_key: Option<String>,
}

impl HttpRouteApi {
    pub fn new(cfg: &RouteApiConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| Error::Config(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            url: cfg.url.clone(),
            api_key: cfg.api_key.clone(),
        })
    }
}

#[async_trait]
impl RouteApi for HttpRouteApi {
    async fn get_route(&self, query: &RouteQuery) -> Result<Value, ApiFailure> {
        let resp = self
            .http
            .get(&self.url)
            .query(&query.params())
            .with_random_agent()
            .with_api_key(self.api_key.as_deref())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ApiFailure::Transient(format!("Timeout or network error: {e}")))?;

        resp.json::<Value>().await.map_err(|e| {
            if e.is_decode() {
                ApiFailure::Malformed(format!("response is not JSON: {e}"))
            } else {
                ApiFailure::Transient(format!("Timeout or network error: {e}"))
            }
        })
    }
}

// ─────────────────── Fetcher ───────────────────

#[derive(Debug)]
enum AttemptError {
    NoRoute,
    Transport(String),
    Malformed(String),
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::NoRoute => write!(f, "route API status {NO_ROUTE_STATUS}"),
            AttemptError::Transport(msg) | AttemptError::Malformed(msg) => f.write_str(msg),
        }
    }
}

/// Pulls the quote out of `{ "status": .., "data": { "to", "data", .. } }`.
fn decode_envelope(body: Value) -> Result<RouteQuote, AttemptError> {
    let Value::Object(mut envelope) = body else {
        return Err(AttemptError::Malformed("response is not a JSON object".into()));
    };
    if envelope.get("status").and_then(Value::as_i64) == Some(NO_ROUTE_STATUS) {
        return Err(AttemptError::NoRoute);
    }
    let inner = match envelope.remove("data") {
        Some(inner @ Value::Object(_)) => inner,
        _ => return Err(AttemptError::Malformed("missing data object".into())),
    };
    match inner.get("data") {
        Some(Value::String(calldata)) if !calldata.is_empty() => {}
        _ => return Err(AttemptError::Malformed("missing data.data calldata".into())),
    }
    serde_json::from_value(inner).map_err(|e| AttemptError::Malformed(e.to_string()))
}

pub struct RouteFetcher {
    api: Arc<dyn RouteApi>,
    scheduler: Arc<dyn Scheduler>,
    chain_id: u64,
    deadline: Duration,
    retry: RetryPolicy,
}

impl RouteFetcher {
    pub fn new(
        api: Arc<dyn RouteApi>,
        scheduler: Arc<dyn Scheduler>,
        chain_id: u64,
        cfg: &RouteApiConfig,
    ) -> Self {
        Self {
            api,
            scheduler,
            chain_id,
            deadline: cfg.deadline,
            retry: cfg.retry,
        }
    }

    fn query(&self, request: &SwapRequest) -> RouteQuery {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        RouteQuery {
            chain_id: self.chain_id,
            deadline: (now + self.deadline).as_secs(),
            request: request.clone(),
        }
    }

    /// Asks the aggregator for a route, retrying "no route yet" answers and
    /// transport failures under the configured policy.
    pub async fn fetch_route(&self, request: &SwapRequest) -> Result<RouteQuote> {
        let query = &self.query(request);
        let api = self.api.as_ref();
        let outcome = self
            .retry
            .run(
                self.scheduler.as_ref(),
                |_| async move {
                    let body = api.get_route(query).await.map_err(|f| match f {
                        ApiFailure::Transient(msg) => AttemptError::Transport(msg),
                        ApiFailure::Malformed(msg) => AttemptError::Malformed(msg),
                    })?;
                    decode_envelope(body)
                },
                |e| !matches!(e, AttemptError::Malformed(_)),
                |attempt, e| match e {
                    AttemptError::NoRoute => warn!("Retry {attempt} route API status -1"),
                    other => warn!("Retry {attempt} failed: {other}"),
                },
            )
            .await;

        match outcome {
            Ok(quote) => {
                info!(target: crate::logger::SUCCESS, "Route info fetched successfully");
                Ok(quote)
            }
            Err(RetryError::Exhausted { attempts, last }) => Err(Error::RouteUnavailable {
                attempts,
                last: last.to_string(),
            }),
            Err(RetryError::Aborted(e)) => Err(Error::MalformedRoute(e.to_string())),
        }
    }
}
