use alloy_primitives::{Address, U256};
use tracing::instrument;

use crate::chain::eip155::{Eip155MetaTransactionProvider, SubmittedTransaction};
use crate::contracts::{self, IWithdrawable};
use crate::error::RelayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Withdrawal {
    /// The endpoint held no native balance; no transaction was sent.
    Nothing,
    Withdrawn {
        amount: U256,
        tx: SubmittedTransaction,
    },
}

/// Sweeps the whole native balance of one relay endpoint to a beneficiary.
///
/// Each chain has its own manager; withdrawing on L1 leaves the L2 endpoint alone.
pub struct WithdrawalManager<P> {
    provider: P,
    endpoint: Address,
    confirmations: u64,
}

impl<P> WithdrawalManager<P>
where
    P: Eip155MetaTransactionProvider,
{
    pub fn new(provider: P, endpoint: Address) -> Self {
        Self {
            provider,
            endpoint,
            confirmations: 1,
        }
    }

    pub fn with_confirmations(mut self, confirmations: u64) -> Self {
        self.confirmations = confirmations;
        self
    }

    pub async fn balance(&self) -> Result<U256, RelayError> {
        Ok(self.provider.balance(self.endpoint).await?)
    }

    #[instrument(skip_all, err, fields(chain = %self.provider.chain(), endpoint = %self.endpoint, %beneficiary))]
    pub async fn withdraw(&self, beneficiary: Address) -> Result<Withdrawal, RelayError> {
        let amount = self.balance().await?;
        if amount.is_zero() {
            tracing::info!("Nothing to withdraw");
            return Ok(Withdrawal::Nothing);
        }
        let call = IWithdrawable::withdrawCall { beneficiary };
        let tx = contracts::transact(
            &self.provider,
            self.endpoint,
            call,
            U256::ZERO,
            self.confirmations,
        )
        .await?;
        tracing::info!(tx = %tx.hash, %amount, "Withdrawn");
        Ok(Withdrawal::Withdrawn { amount, tx })
    }
}
