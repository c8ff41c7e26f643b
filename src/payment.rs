//! Payment token approval for the L2 endpoint.
//!
//! The L2 endpoint pulls channel fees in the payment token from the caller, so it
//! needs an ERC-20 allowance first. Unlimited approval is the default: one
//! transaction, never repeated. Callers wanting minimal exposure pick an exact
//! amount instead.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::chain::eip155::{Eip155MetaTransactionProvider, SubmittedTransaction, decimal_u256};
use crate::contracts::{self, IERC20};
use crate::error::RelayError;

/// How much of the payment token the L2 endpoint may pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Allowance {
    #[default]
    Unlimited,
    Exact(#[serde(with = "decimal_u256")] U256),
}

impl Allowance {
    pub fn amount(&self) -> U256 {
        match self {
            Allowance::Unlimited => U256::MAX,
            Allowance::Exact(amount) => *amount,
        }
    }

    /// Whether an existing on-chain allowance already covers this policy.
    ///
    /// Tokens that decrement an unlimited allowance on spend leave it just below
    /// `U256::MAX`; half of the range is treated as unlimited still.
    pub fn is_covered_by(&self, current: U256) -> bool {
        match self {
            Allowance::Unlimited => current >= U256::MAX >> 1,
            Allowance::Exact(amount) => current >= *amount,
        }
    }
}

/// Grants ERC-20 allowances from the provider's signer.
pub struct PaymentApprover<P> {
    provider: P,
    token: Address,
    confirmations: u64,
}

impl<P> PaymentApprover<P>
where
    P: Eip155MetaTransactionProvider,
{
    pub fn new(provider: P, token: Address) -> Self {
        Self {
            provider,
            token,
            confirmations: 1,
        }
    }

    pub fn with_confirmations(mut self, confirmations: u64) -> Self {
        self.confirmations = confirmations;
        self
    }

    pub fn token(&self) -> Address {
        self.token
    }

    /// Authorizes `spender` to pull up to `allowance` from the signer. Balance is not checked.
    #[instrument(skip_all, err, fields(token = %self.token, %spender, amount = %allowance.amount()))]
    pub async fn approve(
        &self,
        spender: Address,
        allowance: Allowance,
    ) -> Result<SubmittedTransaction, RelayError> {
        let call = IERC20::approveCall {
            spender,
            value: allowance.amount(),
        };
        let receipt =
            contracts::transact(&self.provider, self.token, call, U256::ZERO, self.confirmations)
                .await?;
        tracing::info!(tx = %receipt.hash, "Payment token approved");
        Ok(receipt)
    }

    pub async fn allowance(&self, owner: Address, spender: Address) -> Result<U256, RelayError> {
        contracts::view(&self.provider, self.token, IERC20::allowanceCall { owner, spender }).await
    }

    /// Approves only when the current allowance of the signer falls short of `allowance`.
    pub async fn ensure(
        &self,
        spender: Address,
        allowance: Allowance,
    ) -> Result<Option<SubmittedTransaction>, RelayError> {
        let current = self
            .allowance(self.provider.signer_address(), spender)
            .await?;
        if allowance.is_covered_by(current) {
            tracing::info!(token = %self.token, %spender, %current, "Allowance already sufficient");
            return Ok(None);
        }
        self.approve(spender, allowance).await.map(Some)
    }
}
