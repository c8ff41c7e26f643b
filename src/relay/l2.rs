use alloy_primitives::{Address, U256};
use tracing::instrument;

use crate::chain::eip155::{Eip155MetaTransactionProvider, SubmittedTransaction};
use crate::commitment::{Commitment, RegistrationRequest};
use crate::contracts::{self, IRelayL2};
use crate::error::RelayError;

/// Submits registration calls to the L2 endpoint.
///
/// A successful receipt means the L2 endpoint accepted the call and handed it to
/// the channel. Whether the L1 side honored it is only visible on L1, later.
pub struct L2RelayClient<P> {
    provider: P,
    endpoint: Address,
    confirmations: u64,
}

impl<P> L2RelayClient<P>
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

    pub fn endpoint(&self) -> Address {
        self.endpoint
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    #[instrument(skip_all, err, fields(endpoint = %self.endpoint, %commitment))]
    pub async fn commit(&self, commitment: Commitment) -> Result<SubmittedTransaction, RelayError> {
        let call = IRelayL2::commitCall {
            commitment: commitment.as_b256(),
        };
        let receipt = contracts::transact(
            &self.provider,
            self.endpoint,
            call,
            U256::ZERO,
            self.confirmations,
        )
        .await?;
        tracing::info!(tx = %receipt.hash, "Commitment sent");
        Ok(receipt)
    }

    /// Commits a raw hash, checking only that it is 32 bytes long.
    pub async fn commit_hash(&self, hash: &[u8]) -> Result<SubmittedTransaction, RelayError> {
        self.commit(Commitment::from_slice(hash)?).await
    }

    /// Reveals `request` with `payment` attached as native value.
    ///
    /// `request` must be the one the earlier commitment was computed from. Relay
    /// rules are checked first and nothing is sent when they fail.
    #[instrument(skip_all, err, fields(endpoint = %self.endpoint, name = %request.name(), %payment))]
    pub async fn register(
        &self,
        request: &RegistrationRequest,
        payment: U256,
    ) -> Result<SubmittedTransaction, RelayError> {
        request.validate_for_relay()?;
        let call = IRelayL2::registerCall {
            name: request.name().to_string(),
            owner: request.owner(),
            duration: U256::from(request.duration()),
            secret: request.secret(),
            resolver: request.resolver_or_zero(),
            data: request.resolver_data().to_vec(),
            reverseRecord: request.reverse_record(),
            ownerControlledFuses: request.fuses(),
        };
        let receipt = contracts::transact(
            &self.provider,
            self.endpoint,
            call,
            payment,
            self.confirmations,
        )
        .await?;
        tracing::info!(tx = %receipt.hash, "Registration sent");
        Ok(receipt)
    }
}
