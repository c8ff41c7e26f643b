//! Read-only view of the L1 registrar controller.

use alloy_primitives::{Address, B256, U256, keccak256};

use crate::chain::eip155::Eip155MetaTransactionProvider;
use crate::commitment::{Commitment, RegistrationRequest};
use crate::contracts::{self, INameWrapper, IRegistrarController};
use crate::error::RelayError;
use crate::registration::{CommitWindow, RegistrationState};
use crate::relay::message::u64_from;
use crate::timestamp::UnixTimestamp;

/// Rent quoted by the registrar for a name and duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RentPrice {
    pub base: U256,
    pub premium: U256,
}

impl RentPrice {
    pub fn total(&self) -> U256 {
        self.base.saturating_add(self.premium)
    }
}

/// ENS namehash of `<label>.eth`.
pub fn eth_node(label: &str) -> B256 {
    let mut eth = [0u8; 64];
    eth[32..].copy_from_slice(keccak256("eth").as_slice());
    let mut node = [0u8; 64];
    node[..32].copy_from_slice(keccak256(eth).as_slice());
    node[32..].copy_from_slice(keccak256(label.as_bytes()).as_slice());
    keccak256(node)
}

/// Everything read from L1 to place a registration in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub state: RegistrationState,
    pub now: UnixTimestamp,
}

pub struct RegistrarView<P> {
    provider: P,
    controller: Address,
}

impl<P> RegistrarView<P>
where
    P: Eip155MetaTransactionProvider,
{
    pub fn new(provider: P, controller: Address) -> Self {
        Self {
            provider,
            controller,
        }
    }

    pub fn controller(&self) -> Address {
        self.controller
    }

    /// Commit time recorded for `commitment`, `None` if the registrar holds none.
    pub async fn commitment_time(
        &self,
        commitment: Commitment,
    ) -> Result<Option<UnixTimestamp>, RelayError> {
        let call = IRegistrarController::commitmentsCall {
            commitment: commitment.as_b256(),
        };
        let recorded = contracts::view(&self.provider, self.controller, call).await?;
        let secs = u64_from(recorded, "commit time")?;
        Ok((secs != 0).then(|| UnixTimestamp::from_secs(secs)))
    }

    pub async fn commit_window(&self) -> Result<CommitWindow, RelayError> {
        let min = contracts::view(
            &self.provider,
            self.controller,
            IRegistrarController::minCommitmentAgeCall {},
        )
        .await?;
        let max = contracts::view(
            &self.provider,
            self.controller,
            IRegistrarController::maxCommitmentAgeCall {},
        )
        .await?;
        Ok(CommitWindow::new(
            u64_from(min, "minCommitmentAge")?,
            u64_from(max, "maxCommitmentAge")?,
        ))
    }

    pub async fn rent_price(&self, name: &str, duration: u64) -> Result<RentPrice, RelayError> {
        let call = IRegistrarController::rentPriceCall {
            name: name.to_string(),
            duration: U256::from(duration),
        };
        let price = contracts::view(&self.provider, self.controller, call).await?;
        Ok(RentPrice {
            base: price.base,
            premium: price.premium,
        })
    }

    pub async fn available(&self, name: &str) -> Result<bool, RelayError> {
        let call = IRegistrarController::availableCall {
            name: name.to_string(),
        };
        contracts::view(&self.provider, self.controller, call).await
    }

    /// The registrar's own commitment for `request`.
    pub async fn make_commitment(
        &self,
        request: &RegistrationRequest,
    ) -> Result<Commitment, RelayError> {
        let call = IRegistrarController::makeCommitmentCall {
            name: request.name().to_string(),
            owner: request.owner(),
            duration: U256::from(request.duration()),
            secret: request.secret(),
            resolver: request.resolver_or_zero(),
            data: request.resolver_data().to_vec(),
            reverseRecord: request.reverse_record(),
            ownerControlledFuses: request.fuses(),
        };
        let hash = contracts::view(&self.provider, self.controller, call).await?;
        Commitment::from_slice(hash.as_slice())
    }

    /// Current owner of `<name>.eth`, `None` if it is unregistered or expired.
    pub async fn name_owner(&self, name: &str) -> Result<Option<Address>, RelayError> {
        let wrapper = contracts::view(
            &self.provider,
            self.controller,
            IRegistrarController::nameWrapperCall {},
        )
        .await?;
        let call = INameWrapper::ownerOfCall {
            id: U256::from_be_bytes(eth_node(name).0),
        };
        let owner = contracts::view(&self.provider, wrapper, call).await?;
        Ok((owner != Address::ZERO).then_some(owner))
    }

    pub async fn latest_timestamp(&self) -> Result<UnixTimestamp, RelayError> {
        Ok(self.provider.latest_timestamp().await?)
    }

    /// Derives the current state of `request` from L1 reads.
    ///
    /// Fails with [`RelayError::NameUnavailable`] when the name is taken by
    /// anyone but the request's owner and no commitment is pending.
    pub async fn observe(
        &self,
        request: &RegistrationRequest,
        window: &CommitWindow,
    ) -> Result<Observation, RelayError> {
        let now = self.latest_timestamp().await?;
        let committed_at = self.commitment_time(request.commitment()).await?;
        let available = self.available(request.name()).await?;
        if !available && committed_at.is_none() {
            let owner = self.name_owner(request.name()).await?;
            if owner != Some(request.owner()) {
                tracing::warn!(name = %request.name(), ?owner, "Name is held by another owner");
                return Err(RelayError::NameUnavailable(request.name().to_string()));
            }
        }
        let state = RegistrationState::derive(committed_at, available, window, now);
        Ok(Observation { state, now })
    }
}
