use crate::chain::ChainId;
use crate::chain::eip155::Eip155ChainReference;
use crate::config::{EvmPrivateKey, RpcConfig};

/// Everything needed to open a signing provider on one EVM chain.
///
/// Built from a [`Deployment`](crate::deployment::Deployment) plus the single signer
/// key shared across all networks.
#[derive(Debug, Clone)]
pub struct Eip155ChainConfig {
    pub chain_reference: Eip155ChainReference,
    pub signer: EvmPrivateKey,
    pub rpc: Vec<RpcConfig>,
    pub eip1559: bool,
    pub flashblocks: bool,
    pub receipt_timeout_secs: u64,
}

impl Eip155ChainConfig {
    pub fn chain_id(&self) -> ChainId {
        self.chain_reference.into()
    }
    pub fn chain_reference(&self) -> Eip155ChainReference {
        self.chain_reference
    }
    pub fn signer(&self) -> &EvmPrivateKey {
        &self.signer
    }
    pub fn rpc(&self) -> &[RpcConfig] {
        &self.rpc
    }
    pub fn eip1559(&self) -> bool {
        self.eip1559
    }
    pub fn flashblocks(&self) -> bool {
        self.flashblocks
    }
    pub fn receipt_timeout_secs(&self) -> u64 {
        self.receipt_timeout_secs
    }
}
