use alloy_primitives::{Address, U256};
use tracing::instrument;

use crate::chain::eip155::{ChainSelector, Eip155MetaTransactionProvider, SubmittedTransaction};
use crate::contracts::{self, IRelayL1};
use crate::error::RelayError;

/// Result of an allowlist setter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowlistUpdate {
    /// The entry already had the requested value; nothing was sent.
    Unchanged,
    Updated(SubmittedTransaction),
}

/// Administers the allowlist of the L1 endpoint.
///
/// A relayed message is honored only when both its source chain selector and its
/// sender are allowed. Setters read the current value first, so re-applying a
/// configuration costs nothing.
pub struct AllowlistConfigurator<P> {
    provider: P,
    endpoint: Address,
    confirmations: u64,
}

impl<P> AllowlistConfigurator<P>
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

    pub async fn is_chain_allowed(&self, selector: ChainSelector) -> Result<bool, RelayError> {
        let call = IRelayL1::allowlistedSourceChainsCall {
            sourceChainSelector: selector.inner(),
        };
        contracts::view(&self.provider, self.endpoint, call).await
    }

    pub async fn is_sender_allowed(&self, sender: Address) -> Result<bool, RelayError> {
        let call = IRelayL1::allowlistedSendersCall { sender };
        contracts::view(&self.provider, self.endpoint, call).await
    }

    /// Whether messages from `sender` on `selector` would be honored.
    pub async fn is_authorized(
        &self,
        selector: ChainSelector,
        sender: Address,
    ) -> Result<bool, RelayError> {
        Ok(self.is_chain_allowed(selector).await? && self.is_sender_allowed(sender).await?)
    }

    #[instrument(skip_all, err, fields(endpoint = %self.endpoint, %selector, allowed = allowed))]
    pub async fn set_chain_allowed(
        &self,
        selector: ChainSelector,
        allowed: bool,
    ) -> Result<AllowlistUpdate, RelayError> {
        if self.is_chain_allowed(selector).await? == allowed {
            tracing::info!("Source chain already set, skipping");
            return Ok(AllowlistUpdate::Unchanged);
        }
        let call = IRelayL1::allowlistSourceChainCall {
            sourceChainSelector: selector.inner(),
            allowed,
        };
        let receipt = contracts::transact(
            &self.provider,
            self.endpoint,
            call,
            U256::ZERO,
            self.confirmations,
        )
        .await?;
        tracing::info!(tx = %receipt.hash, "Source chain allowlist updated");
        Ok(AllowlistUpdate::Updated(receipt))
    }

    #[instrument(skip_all, err, fields(endpoint = %self.endpoint, %sender, allowed = allowed))]
    pub async fn set_sender_allowed(
        &self,
        sender: Address,
        allowed: bool,
    ) -> Result<AllowlistUpdate, RelayError> {
        if self.is_sender_allowed(sender).await? == allowed {
            tracing::info!("Sender already set, skipping");
            return Ok(AllowlistUpdate::Unchanged);
        }
        let call = IRelayL1::allowlistSenderCall { sender, allowed };
        let receipt = contracts::transact(
            &self.provider,
            self.endpoint,
            call,
            U256::ZERO,
            self.confirmations,
        )
        .await?;
        tracing::info!(tx = %receipt.hash, "Sender allowlist updated");
        Ok(AllowlistUpdate::Updated(receipt))
    }

    /// Allows both the chain and the sender of an L2 endpoint.
    pub async fn authorize(
        &self,
        selector: ChainSelector,
        sender: Address,
    ) -> Result<(AllowlistUpdate, AllowlistUpdate), RelayError> {
        let chain = self.set_chain_allowed(selector, true).await?;
        let sender = self.set_sender_allowed(sender, true).await?;
        Ok((chain, sender))
    }
}
