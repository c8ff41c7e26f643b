//! Per-network deployment records.
//!
//! Every network the relay touches has one record: where to reach it (RPC), the
//! relay endpoint deployed there, and the channel and registry contracts that
//! endpoint is bound to. Router, payment token, registrar and chain selector may
//! be omitted for networks listed in [`networks`](crate::networks); the known
//! values are used instead.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::chain::ChainId;
use crate::chain::eip155::config::Eip155ChainConfig;
use crate::chain::eip155::{ChainSelector, ChecksummedAddress, EIP155_NAMESPACE, Eip155ChainReference};
use crate::config::{EvmPrivateKey, RpcConfig};
use crate::error::RelayError;
use crate::networks::{self, NetworkInfo};

/// Deployment on one EVM network.
#[derive(Debug, Clone)]
pub struct Deployment {
    pub chain_reference: Eip155ChainReference,
    pub inner: DeploymentInner,
}

/// Deployment record as written in the configuration file, minus the chain id key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentInner {
    pub rpc: Vec<RpcConfig>,
    /// Relay endpoint deployed on this network.
    pub endpoint: ChecksummedAddress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<ChainSelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router: Option<ChecksummedAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_token: Option<ChecksummedAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registrar: Option<ChecksummedAddress>,
    #[serde(default = "deployment_defaults::eip1559")]
    pub eip1559: bool,
    #[serde(default)]
    pub flashblocks: bool,
    #[serde(default = "deployment_defaults::receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,
    #[serde(default = "deployment_defaults::confirmations")]
    pub confirmations: u64,
}

mod deployment_defaults {
    pub fn eip1559() -> bool {
        true
    }

    pub fn receipt_timeout_secs() -> u64 {
        30
    }

    pub fn confirmations() -> u64 {
        1
    }
}

impl Deployment {
    pub fn chain_id(&self) -> ChainId {
        self.chain_reference.into()
    }

    fn known(&self) -> Option<&'static NetworkInfo> {
        networks::network_by_chain_id(&self.chain_id())
    }

    fn missing(&self, field: &'static str) -> RelayError {
        RelayError::Deployment {
            chain: self.chain_id().to_string(),
            field,
        }
    }

    pub fn endpoint(&self) -> Address {
        self.inner.endpoint.into()
    }

    pub fn selector(&self) -> Result<ChainSelector, RelayError> {
        self.inner
            .selector
            .or_else(|| self.known().map(|n| n.selector))
            .ok_or_else(|| self.missing("selector"))
    }

    pub fn router(&self) -> Result<Address, RelayError> {
        self.inner
            .router
            .map(Address::from)
            .or_else(|| self.known().and_then(|n| n.router))
            .ok_or_else(|| self.missing("router"))
    }

    pub fn payment_token(&self) -> Result<Address, RelayError> {
        self.inner
            .payment_token
            .map(Address::from)
            .or_else(|| self.known().and_then(|n| n.payment_token))
            .ok_or_else(|| self.missing("payment_token"))
    }

    pub fn registrar(&self) -> Result<Address, RelayError> {
        self.inner
            .registrar
            .map(Address::from)
            .or_else(|| self.known().and_then(|n| n.registrar))
            .ok_or_else(|| self.missing("registrar"))
    }

    pub fn confirmations(&self) -> u64 {
        self.inner.confirmations
    }

    /// Provider configuration for this network, signing with `signer`.
    pub fn chain_config(&self, signer: &EvmPrivateKey) -> Eip155ChainConfig {
        Eip155ChainConfig {
            chain_reference: self.chain_reference,
            signer: *signer,
            rpc: self.inner.rpc.clone(),
            eip1559: self.inner.eip1559,
            flashblocks: self.inner.flashblocks,
            receipt_timeout_secs: self.inner.receipt_timeout_secs,
        }
    }
}

/// All configured deployments, keyed by CAIP-2 chain id in the configuration file.
#[derive(Debug, Clone, Default)]
pub struct DeploymentRegistry(Vec<Deployment>);

impl DeploymentRegistry {
    pub fn new(deployments: Vec<Deployment>) -> Self {
        Self(deployments)
    }

    pub fn by_chain_id(&self, chain_id: &ChainId) -> Option<&Deployment> {
        self.0.iter().find(|d| &d.chain_id() == chain_id)
    }

    /// Like [`by_chain_id`](Self::by_chain_id), reporting an absent deployment as an error.
    pub fn require(&self, chain_id: &ChainId) -> Result<&Deployment, RelayError> {
        self.by_chain_id(chain_id).ok_or_else(|| RelayError::Deployment {
            chain: chain_id.to_string(),
            field: "deployment",
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Deployment> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Provider configurations for every deployment, all signing with `signer`.
    pub fn chain_configs(&self, signer: &EvmPrivateKey) -> Vec<Eip155ChainConfig> {
        self.0.iter().map(|d| d.chain_config(signer)).collect()
    }
}

impl Serialize for DeploymentRegistry {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for deployment in &self.0 {
            map.serialize_entry(&deployment.chain_id(), &deployment.inner)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for DeploymentRegistry {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{MapAccess, Visitor};
        use std::fmt;

        struct DeploymentsVisitor;

        impl<'de> Visitor<'de> for DeploymentsVisitor {
            type Value = DeploymentRegistry;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of chain identifiers to deployment records")
            }

            fn visit_map<M>(self, mut access: M) -> Result<Self::Value, M::Error>
            where
                M: MapAccess<'de>,
            {
                let mut deployments: Vec<Deployment> =
                    Vec::with_capacity(access.size_hint().unwrap_or(0));

                while let Some(chain_id) = access.next_key::<ChainId>()? {
                    if chain_id.namespace() != EIP155_NAMESPACE {
                        return Err(serde::de::Error::custom(format!(
                            "Unexpected namespace: {}",
                            chain_id.namespace()
                        )));
                    }
                    if deployments.iter().any(|d| d.chain_id() == chain_id) {
                        return Err(serde::de::Error::custom(format!(
                            "Duplicate deployment for {chain_id}"
                        )));
                    }
                    let inner: DeploymentInner = access.next_value()?;
                    let chain_reference = Eip155ChainReference::try_from(&chain_id)
                        .map_err(|e| serde::de::Error::custom(format!("{e}")))?;
                    deployments.push(Deployment {
                        chain_reference,
                        inner,
                    });
                }

                Ok(DeploymentRegistry(deployments))
            }
        }

        deserializer.deserialize_map(DeploymentsVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::networks::KnownNetwork;
    use alloy_primitives::address;

    fn registry(json: &str) -> DeploymentRegistry {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_known_network_fallbacks() {
        let deployments = registry(
            r#"{
                "eip155:11155111": {
                    "rpc": [{ "http": "https://rpc.sepolia.org" }],
                    "endpoint": "0xF04A02c5Ec0dB6E363771C9171Ca00A4f33Eb298"
                }
            }"#,
        );
        let l1 = deployments.by_chain_id(&ChainId::sepolia()).unwrap();
        assert_eq!(l1.endpoint(), address!("0xF04A02c5Ec0dB6E363771C9171Ca00A4f33Eb298"));
        assert_eq!(l1.selector().unwrap(), ChainSelector::sepolia());
        assert_eq!(
            l1.registrar().unwrap(),
            address!("0xfed6a969aaa60e4961fcd3ebf1a2e8913ac65b72")
        );
        assert_eq!(
            l1.router().unwrap(),
            address!("0x0BF3dE8c5D3e8A2B34D2BEeB17ABfCeBaf363A59")
        );
        assert!(l1.inner.eip1559);
        assert_eq!(l1.confirmations(), 1);
    }

    #[test]
    fn test_explicit_values_win() {
        let deployments = registry(
            r#"{
                "eip155:84532": {
                    "rpc": [{ "http": "https://sepolia.base.org" }],
                    "endpoint": "0xB0F30A5F70708c83c9d92A434DABe8372bE9Aa8c",
                    "selector": "42",
                    "payment_token": "0x0000000000000000000000000000000000000001",
                    "eip1559": false,
                    "receipt_timeout_secs": 90
                }
            }"#,
        );
        let l2 = deployments.by_chain_id(&ChainId::base_sepolia()).unwrap();
        assert_eq!(l2.selector().unwrap(), ChainSelector::new(42));
        assert_eq!(
            l2.payment_token().unwrap(),
            address!("0x0000000000000000000000000000000000000001")
        );
        let signer: EvmPrivateKey =
            "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318"
                .parse()
                .unwrap();
        let chain_config = l2.chain_config(&signer);
        assert!(!chain_config.eip1559());
        assert_eq!(chain_config.receipt_timeout_secs(), 90);
        assert_eq!(chain_config.chain_id(), ChainId::base_sepolia());
    }

    #[test]
    fn test_unknown_network_reports_missing_field() {
        let deployments = registry(
            r#"{
                "eip155:31337": {
                    "rpc": [{ "http": "http://localhost:8545" }],
                    "endpoint": "0x0000000000000000000000000000000000000002"
                }
            }"#,
        );
        let local = deployments.by_chain_id(&ChainId::new("eip155", "31337")).unwrap();
        match local.selector() {
            Err(RelayError::Deployment { chain, field }) => {
                assert_eq!(chain, "eip155:31337");
                assert_eq!(field, "selector");
            }
            other => panic!("unexpected {other:?}"),
        }
        // Only the local chain is configured here.
        assert!(deployments.require(&ChainId::base_sepolia()).is_err());
    }

    #[test]
    fn test_rejects_non_evm_and_duplicates() {
        let non_evm: Result<DeploymentRegistry, _> = serde_json::from_str(
            r#"{ "solana:devnet": { "rpc": [], "endpoint": "0x0000000000000000000000000000000000000002" } }"#,
        );
        assert!(non_evm.is_err());
        let duplicate: Result<DeploymentRegistry, _> = serde_json::from_str(
            r#"{
                "eip155:84532": { "rpc": [], "endpoint": "0x0000000000000000000000000000000000000002" },
                "eip155:84532": { "rpc": [], "endpoint": "0x0000000000000000000000000000000000000003" }
            }"#,
        );
        assert!(duplicate.is_err());
    }
}
