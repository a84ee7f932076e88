use std::sync::Arc;
use std::time::Duration;

use log::{error, info};

use crate::approval::ApprovalManager;
use crate::chain::{Chain, TransactionRecord};
use crate::config::{BotConfig, SwapPlan};
use crate::credentials::Account;
use crate::error::Result;
use crate::executor::SwapExecutor;
use crate::logger::{self, STEP, SUCCESS};
use crate::route::{RouteApi, RouteFetcher, SwapRequest};
use crate::runtime::Scheduler;

/// Outcome counts for one pass over every wallet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PassReport {
    pub succeeded: usize,
    pub failed: usize,
}

impl PassReport {
    fn merge(&mut self, other: PassReport) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
    }
}

pub fn format_remaining(remaining: Duration) -> String {
    let secs = remaining.as_secs();
    format!(
        "Next swap cycle in {}h {}m {}s",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}

/// Drives every wallet through its swaps, then waits out the cycle interval.
pub struct SwapCycle {
    accounts: Vec<Account>,
    plan: SwapPlan,
    swaps_per_wallet: usize,
    routes: RouteFetcher,
    executor: SwapExecutor,
    scheduler: Arc<dyn Scheduler>,
    swap_delay: Duration,
    cycle_interval: Duration,
}

impl SwapCycle {
    pub fn new(
        cfg: &BotConfig,
        accounts: Vec<Account>,
        swaps_per_wallet: usize,
        chain: Arc<dyn Chain>,
        api: Arc<dyn RouteApi>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        let routes = RouteFetcher::new(api, scheduler.clone(), cfg.network.chain_id, &cfg.route_api);
        let approvals = ApprovalManager::new(chain.clone(), cfg.router, cfg.native_token);
        let executor = SwapExecutor::new(chain, approvals, cfg.native_token, cfg.default_gas_limit);
        Self {
            accounts,
            plan: cfg.plan.clone(),
            swaps_per_wallet,
            routes,
            executor,
            scheduler,
            swap_delay: cfg.swap_delay,
            cycle_interval: cfg.cycle_interval,
        }
    }

    /// Never returns; only killing the process stops it.
    pub async fn run_forever(&self) {
        loop {
            let report = self.run_pass().await;
            info!(
                target: STEP,
                "All wallets processed for this cycle ({} ok, {} failed). Waiting for next cycle...",
                report.succeeded,
                report.failed
            );
            self.wait_for_next_pass().await;
        }
    }

    /// Runs every wallet's swaps once, in order.
    pub async fn run_pass(&self) -> PassReport {
        let mut report = PassReport::default();
        let total = self.accounts.len();
        for (index, account) in self.accounts.iter().enumerate() {
            info!(
                target: SUCCESS,
                "Processing wallet {}/{total}: {}",
                index + 1,
                account.address()
            );
            report.merge(self.run_wallet(account).await);
            info!(target: SUCCESS, "Swap cycle completed for wallet {}!", account.address());
        }
        report
    }

    async fn run_wallet(&self, account: &Account) -> PassReport {
        let mut report = PassReport::default();
        let count = self.swaps_per_wallet;
        for attempt in 1..=count {
            info!(
                target: STEP,
                "Swap #{attempt} of {count}: {} for wallet {}",
                self.plan.label,
                account.address()
            );
            match self.swap_once(account).await {
                Ok(_) => report.succeeded += 1,
                Err(e) => {
                    error!("Swap #{attempt} failed for wallet {}: {e}", account.address());
                    report.failed += 1;
                }
            }
            self.scheduler.sleep(self.swap_delay).await;
        }
        report
    }

    async fn swap_once(&self, account: &Account) -> Result<TransactionRecord> {
        let request = SwapRequest {
            from_token: self.plan.from_token,
            to_token: self.plan.to_token,
            amount: self.plan.amount,
            user: account.address(),
        };
        let route = self.routes.fetch_route(&request).await?;
        self.executor
            .execute_swap(account, &route, request.from_token, request.amount)
            .await
    }

    /// Counts down the cycle interval one second at a time.
    pub async fn wait_for_next_pass(&self) {
        let deadline = self.scheduler.now() + self.cycle_interval;
        loop {
            let now = self.scheduler.now();
            let remaining = deadline.saturating_duration_since(now);
            logger::countdown(&format_remaining(remaining));
            if remaining.is_zero() {
                break;
            }
            let tick = (now + Duration::from_secs(1)).min(deadline);
            self.scheduler.sleep_until(tick).await;
        }
        logger::end_countdown();
    }
}
