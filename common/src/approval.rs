use std::sync::Arc;

use alloy::primitives::utils::format_units;
use alloy::primitives::{Address, U256};
use alloy::sol_types::SolCall;
use log::{error, info};

use crate::chain::{Chain, TransactionRecord, IERC20};
use crate::credentials::Account;
use crate::error::{Error, Result};

const APPROVE_GAS_LIMIT: u64 = 100_000;

/// Makes sure the router may spend the source token before a swap.
pub struct ApprovalManager {
    chain: Arc<dyn Chain>,
    router: Address,
    native_token: Address,
}

impl ApprovalManager {
    pub fn new(chain: Arc<dyn Chain>, router: Address, native_token: Address) -> Self {
        Self {
            chain,
            router,
            native_token,
        }
    }

    /// Returns `Ok(false)` when the balance cannot cover `required`; nothing
    /// else is read or sent in that case. Submits an approval for exactly
    /// `required` only when the current allowance is short.
    pub async fn ensure_approved(
        &self,
        account: &Account,
        token: Address,
        required: U256,
    ) -> Result<bool> {
        if token == self.native_token {
            return Ok(true);
        }
        let owner = account.address();

        let balance = self
            .chain
            .token_balance(token, owner)
            .await
            .map_err(|e| Error::Approval(format!("balance of {token}: {e}")))?;
        if balance < required {
            let shown = match self.chain.token_decimals(token).await {
                Ok(decimals) => format_units(balance, decimals).unwrap_or_else(|_| balance.to_string()),
                Err(_) => balance.to_string(),
            };
            error!("Insufficient balance of {token} for {owner}: {shown}");
            return Ok(false);
        }

        let allowance = self
            .chain
            .token_allowance(token, owner, self.router)
            .await
            .map_err(|e| Error::Approval(format!("allowance of {token}: {e}")))?;
        if allowance >= required {
            return Ok(true);
        }

        let nonce = self
            .chain
            .pending_nonce(owner)
            .await
            .map_err(|e| Error::Approval(format!("nonce for {owner}: {e}")))?;
        let approve = TransactionRecord {
            to: token,
            input: IERC20::approveCall {
                spender: self.router,
                amount: required,
            }
            .abi_encode()
            .into(),
            value: U256::ZERO,
            gas_limit: APPROVE_GAS_LIMIT,
            nonce,
            hash: None,
        };
        let hash = self
            .chain
            .submit(account, &approve)
            .await
            .map_err(|e| Error::Approval(format!("approve submission: {e}")))?;
        self.chain
            .wait_for_confirmation(hash)
            .await
            .map_err(|e| Error::Approval(format!("approve {hash} not confirmed: {e}")))?;
        info!("Approved {required} of {token} for router {}", self.router);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DODO_ROUTER, PHRS, USDT};
    use crate::testing::{test_account, FakeChain};

    fn manager(chain: &Arc<FakeChain>) -> ApprovalManager {
        ApprovalManager::new(chain.clone(), DODO_ROUTER, PHRS)
    }

    #[tokio::test]
    async fn native_asset_needs_no_contract_calls() {
        let chain = Arc::new(FakeChain::new(688688));
        let ok = manager(&chain)
            .ensure_approved(&test_account(0), PHRS, U256::from(1000))
            .await
            .unwrap();

        assert!(ok);
        assert_eq!(chain.total_calls(), 0);
    }

    #[tokio::test]
    async fn sufficient_allowance_sends_nothing() {
        let chain = Arc::new(FakeChain::new(688688));
        chain.set_balance(U256::from(5000));
        chain.set_allowance(U256::from(1000));

        let ok = manager(&chain)
            .ensure_approved(&test_account(0), USDT, U256::from(1000))
            .await
            .unwrap();

        assert!(ok);
        assert_eq!(chain.calls("submit"), 0);
        assert!(chain.submitted().is_empty());
    }

    #[tokio::test]
    async fn low_balance_short_circuits() {
        let chain = Arc::new(FakeChain::new(688688));
        chain.set_balance(U256::from(999));

        let ok = manager(&chain)
            .ensure_approved(&test_account(0), USDT, U256::from(1000))
            .await
            .unwrap();

        assert!(!ok);
        assert_eq!(chain.calls("token_allowance"), 0);
        assert_eq!(chain.calls("submit"), 0);
    }

    #[tokio::test]
    async fn short_allowance_approves_exact_amount() {
        let chain = Arc::new(FakeChain::new(688688));
        chain.set_balance(U256::from(5000));
        chain.set_allowance(U256::from(10));

        let ok = manager(&chain)
            .ensure_approved(&test_account(0), USDT, U256::from(1000))
            .await
            .unwrap();

        assert!(ok);
        let sent = chain.submitted();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, USDT);
        let call = IERC20::approveCall::abi_decode(&sent[0].input).unwrap();
        assert_eq!(call.spender, DODO_ROUTER);
        assert_eq!(call.amount, U256::from(1000));
        assert_eq!(chain.calls("wait_for_confirmation"), 1);
    }

    #[tokio::test]
    async fn unconfirmed_approval_is_an_error() {
        let chain = Arc::new(FakeChain::new(688688));
        chain.set_balance(U256::from(5000));
        chain.fail_confirmations();

        let err = manager(&chain)
            .ensure_approved(&test_account(0), USDT, U256::from(1000))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Approval(_)));
    }
}
