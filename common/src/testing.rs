//! Deterministic stand-ins for the node, the aggregator and the clock.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use alloy::primitives::{Address, Bytes, TxHash, B256, U256};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::Instant;

use crate::chain::{Chain, TransactionRecord, IERC20};
use crate::credentials::Account;
use crate::error::{Error, Result};
use crate::route::{ApiFailure, RouteApi, RouteQuery, RouteQuote};
use crate::runtime::Scheduler;

const TEST_KEYS: [&str; 3] = [
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
    "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d",
    "0x5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a",
];

pub(crate) fn test_account(index: usize) -> Account {
    Account::from_secret(TEST_KEYS[index]).unwrap()
}

pub(crate) fn route_body(to: Address, gas_limit: Option<Value>) -> Value {
    let mut data = json!({
        "to": to.to_string(),
        "data": "0x12345678",
        "value": "2450000000000000",
        "resAmount": 0.61,
    });
    if let Some(gas) = gas_limit {
        data["gasLimit"] = gas;
    }
    json!({ "status": 200, "data": data })
}

pub(crate) fn quote(to: Address, gas_limit: Option<u64>) -> RouteQuote {
    RouteQuote {
        to,
        data: Bytes::from(vec![0x12, 0x34, 0x56, 0x78]),
        value: U256::from(2_450_000_000_000_000u64),
        gas_limit,
        res_amount: None,
    }
}

// ─────────────────── Clock ───────────────────

/// Virtual clock: sleeping jumps time forward and records the wait.
pub(crate) struct ManualScheduler {
    now: Mutex<Instant>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualScheduler {
    pub(crate) fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    pub(crate) fn clear(&self) {
        self.sleeps.lock().unwrap().clear();
    }
}

#[async_trait]
impl Scheduler for ManualScheduler {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }

    async fn sleep_until(&self, deadline: Instant) {
        let mut now = self.now.lock().unwrap();
        self.sleeps
            .lock()
            .unwrap()
            .push(deadline.saturating_duration_since(*now));
        if deadline > *now {
            *now = deadline;
        }
    }
}

// ─────────────────── Aggregator ───────────────────

/// Replays canned answers in order; `always` repeats one answer forever.
pub(crate) struct ScriptedRouteApi {
    script: Mutex<VecDeque<Result<Value, ApiFailure>>>,
    fallback: Option<Value>,
    calls: AtomicUsize,
    last_query: Mutex<Option<RouteQuery>>,
}

impl ScriptedRouteApi {
    pub(crate) fn new(script: Vec<Result<Value, ApiFailure>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: None,
            calls: AtomicUsize::new(0),
            last_query: Mutex::new(None),
        }
    }

    pub(crate) fn always(body: Value) -> Self {
        Self {
            fallback: Some(body),
            ..Self::new(Vec::new())
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_query(&self) -> Option<RouteQuery> {
        self.last_query.lock().unwrap().clone()
    }
}

#[async_trait]
impl RouteApi for ScriptedRouteApi {
    async fn get_route(&self, query: &RouteQuery) -> Result<Value, ApiFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_query.lock().unwrap() = Some(query.clone());
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            return next;
        }
        match &self.fallback {
            Some(body) => Ok(body.clone()),
            None => Err(ApiFailure::Transient("script exhausted".into())),
        }
    }
}

// ─────────────────── Node ───────────────────

#[derive(Default)]
struct ChainState {
    calls: HashMap<&'static str, usize>,
    balance: U256,
    allowance: U256,
    base_nonce: u64,
    block_failures: usize,
    fail_submit: Option<(Address, usize)>,
    fail_confirmations: bool,
    attempts: Vec<Address>,
    submitted: Vec<(Address, TransactionRecord)>,
}

/// In-memory node. Successful submissions stay "pending", so the pending
/// nonce grows with every accepted transaction. Approvals update the
/// allowance.
pub(crate) struct FakeChain {
    chain_id: u64,
    state: Mutex<ChainState>,
}

impl FakeChain {
    pub(crate) const BLOCK: u64 = 1_234_567;

    pub(crate) fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            state: Mutex::new(ChainState::default()),
        }
    }

    fn record(&self, op: &'static str) -> std::sync::MutexGuard<'_, ChainState> {
        let mut state = self.state.lock().unwrap();
        *state.calls.entry(op).or_default() += 1;
        state
    }

    pub(crate) fn calls(&self, op: &str) -> usize {
        self.state.lock().unwrap().calls.get(op).copied().unwrap_or(0)
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.state.lock().unwrap().calls.values().sum()
    }

    pub(crate) fn set_balance(&self, balance: U256) {
        self.state.lock().unwrap().balance = balance;
    }

    pub(crate) fn set_allowance(&self, allowance: U256) {
        self.state.lock().unwrap().allowance = allowance;
    }

    pub(crate) fn set_nonce(&self, nonce: u64) {
        self.state.lock().unwrap().base_nonce = nonce;
    }

    /// The first `n` block-height reads fail.
    pub(crate) fn fail_block_number(&self, n: usize) {
        self.state.lock().unwrap().block_failures = n;
    }

    /// The `nth` (1-based) submission from `sender` is rejected.
    pub(crate) fn fail_submit(&self, sender: Address, nth: usize) {
        self.state.lock().unwrap().fail_submit = Some((sender, nth));
    }

    pub(crate) fn fail_confirmations(&self) {
        self.state.lock().unwrap().fail_confirmations = true;
    }

    pub(crate) fn submitted(&self) -> Vec<TransactionRecord> {
        self.state
            .lock()
            .unwrap()
            .submitted
            .iter()
            .map(|(_, tx)| tx.clone())
            .collect()
    }

    /// Sender of every submission attempt, accepted or not.
    pub(crate) fn submitters(&self) -> Vec<Address> {
        self.state.lock().unwrap().attempts.clone()
    }
}

#[async_trait]
impl Chain for FakeChain {
    async fn chain_id(&self) -> Result<u64> {
        self.record("chain_id");
        Ok(self.chain_id)
    }

    async fn block_number(&self) -> Result<u64> {
        let mut state = self.record("block_number");
        if state.block_failures > 0 {
            state.block_failures -= 1;
            return Err(Error::Rpc("connection refused".into()));
        }
        Ok(Self::BLOCK)
    }

    async fn pending_nonce(&self, owner: Address) -> Result<u64> {
        let state = self.record("pending_nonce");
        let pending = state.submitted.iter().filter(|(from, _)| *from == owner).count();
        Ok(state.base_nonce + pending as u64)
    }

    async fn token_balance(&self, _token: Address, _owner: Address) -> Result<U256> {
        Ok(self.record("token_balance").balance)
    }

    async fn token_decimals(&self, _token: Address) -> Result<u8> {
        self.record("token_decimals");
        Ok(6)
    }

    async fn token_allowance(
        &self,
        _token: Address,
        _owner: Address,
        _spender: Address,
    ) -> Result<U256> {
        Ok(self.record("token_allowance").allowance)
    }

    async fn submit(&self, account: &Account, tx: &TransactionRecord) -> Result<TxHash> {
        let mut state = self.record("submit");
        let sender = account.address();
        state.attempts.push(sender);
        let nth = state.attempts.iter().filter(|a| **a == sender).count();
        if state.fail_submit == Some((sender, nth)) {
            return Err(Error::Rpc("nonce too low".into()));
        }
        if let Ok(approve) = IERC20::approveCall::abi_decode(&tx.input) {
            state.allowance = approve.amount;
        }
        let hash = B256::with_last_byte(state.submitted.len() as u8 + 1);
        let mut tx = tx.clone();
        tx.hash = Some(hash);
        state.submitted.push((sender, tx));
        Ok(hash)
    }

    async fn wait_for_confirmation(&self, hash: TxHash) -> Result<()> {
        let state = self.record("wait_for_confirmation");
        if state.fail_confirmations {
            return Err(Error::Rpc(format!("transaction {hash} reverted")));
        }
        Ok(())
    }
}
