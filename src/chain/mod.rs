//! Chain identifiers and providers.
//!
//! - [`ChainId`] - CAIP-2 identifier used as the deployment registry key.
//! - [`eip155`] - EVM chain reference, channel chain selectors and the signing provider.
//! - [`ChainRegistry`] - providers built from the configured deployments, one per chain.

mod chain_id;
pub mod eip155;

pub use chain_id::*;

use std::collections::HashMap;
use std::sync::Arc;

/// Asynchronously constructs an instance of `Self` from a configuration type.
#[async_trait::async_trait]
pub trait FromConfig<TConfig>
where
    Self: Sized,
{
    async fn from_config(config: &TConfig) -> Result<Self, Box<dyn std::error::Error>>;
}

#[async_trait::async_trait]
impl<TConfig, T> FromConfig<TConfig> for Arc<T>
where
    TConfig: Sync,
    T: FromConfig<TConfig> + Send + Sync,
{
    async fn from_config(config: &TConfig) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Arc::new(T::from_config(config).await?))
    }
}

/// Common metadata available on every chain provider.
pub trait ChainProviderOps {
    /// CAIP-2 chain identifier of this provider.
    fn chain_id(&self) -> ChainId;
}

impl<T: ChainProviderOps> ChainProviderOps for Arc<T> {
    fn chain_id(&self) -> ChainId {
        (**self).chain_id()
    }
}

/// Providers indexed by chain id.
///
/// L1 and L2 each get their own provider with its own nonce stream, so waiting
/// on one chain never holds back submissions on the other.
#[derive(Debug)]
pub struct ChainRegistry<P>(HashMap<ChainId, P>);

impl<P> ChainRegistry<P> {
    pub fn new(providers: HashMap<ChainId, P>) -> Self {
        Self(providers)
    }

    pub fn by_chain_id(&self, chain_id: &ChainId) -> Option<&P> {
        self.0.get(chain_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<P> ChainRegistry<P>
where
    P: ChainProviderOps,
{
    /// Builds one provider per configured deployment.
    pub async fn from_deployments<C>(deployments: &[C]) -> Result<Self, Box<dyn std::error::Error>>
    where
        P: FromConfig<C>,
    {
        let mut providers = HashMap::new();
        for deployment in deployments {
            let provider = P::from_config(deployment).await?;
            providers.insert(provider.chain_id(), provider);
        }
        Ok(Self(providers))
    }
}
