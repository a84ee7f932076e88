use std::sync::Arc;

use alloy::primitives::{Address, U256};
use log::info;

use crate::approval::ApprovalManager;
use crate::chain::{Chain, TransactionRecord};
use crate::credentials::Account;
use crate::error::{Error, Result};
use crate::route::RouteQuote;

/// Turns a route quote into a confirmed transaction.
pub struct SwapExecutor {
    chain: Arc<dyn Chain>,
    approvals: ApprovalManager,
    native_token: Address,
    default_gas_limit: u64,
}

impl SwapExecutor {
    pub fn new(
        chain: Arc<dyn Chain>,
        approvals: ApprovalManager,
        native_token: Address,
        default_gas_limit: u64,
    ) -> Self {
        Self {
            chain,
            approvals,
            native_token,
            default_gas_limit,
        }
    }

    pub async fn execute_swap(
        &self,
        account: &Account,
        route: &RouteQuote,
        from_token: Address,
        amount: U256,
    ) -> Result<TransactionRecord> {
        if from_token != self.native_token
            && !self
                .approvals
                .ensure_approved(account, from_token, amount)
                .await?
        {
            return Err(Error::Approval(format!(
                "{from_token} not approved for {}",
                account.address()
            )));
        }

        // Re-read right before building so unconfirmed transactions are counted.
        let nonce = self
            .chain
            .pending_nonce(account.address())
            .await
            .map_err(|e| Error::SwapExecution(format!("nonce: {e}")))?;

        let mut record = TransactionRecord {
            to: route.to,
            input: route.data.clone(),
            value: route.value,
            gas_limit: route.gas_limit.unwrap_or(self.default_gas_limit),
            nonce,
            hash: None,
        };
        let hash = self
            .chain
            .submit(account, &record)
            .await
            .map_err(|e| Error::SwapExecution(format!("submission: {e}")))?;
        record.hash = Some(hash);

        self.chain
            .wait_for_confirmation(hash)
            .await
            .map_err(|e| Error::SwapExecution(format!("{hash} not confirmed: {e}")))?;
        info!(target: crate::logger::SUCCESS, "Swap Transaction confirmed! TX Hash: {hash}");
        Ok(record)
    }
}
