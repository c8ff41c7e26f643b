//! Well-known networks and their messaging-channel deployments.
//!
//! Each entry ties a CAIP-2 chain id to the channel's chain selector and the
//! contracts a relay deployment on that network is bound to: the channel router,
//! the token used to pay channel fees, and (on L1) the name registrar controller.
//! Configured deployments fall back to these values for anything they omit.

use alloy_primitives::{Address, address};

use crate::chain::ChainId;
use crate::chain::eip155::{ChainSelector, EIP155_NAMESPACE};

/// A known network definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInfo {
    /// Human-readable network name (e.g. "base-sepolia").
    pub name: &'static str,
    /// EVM chain id.
    pub chain_reference: u64,
    /// Messaging channel selector.
    pub selector: ChainSelector,
    /// Messaging channel router.
    pub router: Option<Address>,
    /// Fee token accepted by the channel on this network.
    pub payment_token: Option<Address>,
    /// Name registrar controller, present on networks hosting the registry.
    pub registrar: Option<Address>,
}

impl NetworkInfo {
    pub fn chain_id(&self) -> ChainId {
        ChainId::new(EIP155_NAMESPACE, self.chain_reference.to_string())
    }
}

pub static KNOWN_NETWORKS: &[NetworkInfo] = &[
    NetworkInfo {
        name: "sepolia",
        chain_reference: 11155111,
        selector: ChainSelector::new(16015286601757825753),
        router: Some(address!("0x0BF3dE8c5D3e8A2B34D2BEeB17ABfCeBaf363A59")),
        payment_token: Some(address!("0x779877A7B0D9E8603169DdbD7836e478b4624789")),
        registrar: Some(address!("0xfed6a969aaa60e4961fcd3ebf1a2e8913ac65b72")),
    },
    NetworkInfo {
        name: "base-sepolia",
        chain_reference: 84532,
        selector: ChainSelector::new(10344971235874465080),
        router: Some(address!("0xD3b06cEbF099CE7DA4AcCf578aaebFDBd6e88a93")),
        payment_token: Some(address!("0xE4aB69C077896252FAFBD49EFD26B5D171A32410")),
        registrar: None,
    },
    NetworkInfo {
        name: "arbitrum-sepolia",
        chain_reference: 421614,
        selector: ChainSelector::new(3478487238524512106),
        router: Some(address!("0x2a9C5afB0d0e4BAb2BCdaE109EC4b0c4Be15a165")),
        payment_token: Some(address!("0xb1D4538B4571d411F07960EF2838Ce337FE1E80E")),
        registrar: None,
    },
];

pub fn network_by_name(name: &str) -> Option<&'static NetworkInfo> {
    KNOWN_NETWORKS.iter().find(|n| n.name == name)
}

pub fn network_by_chain_id(chain_id: &ChainId) -> Option<&'static NetworkInfo> {
    if chain_id.namespace != EIP155_NAMESPACE {
        return None;
    }
    let reference: u64 = chain_id.reference.parse().ok()?;
    KNOWN_NETWORKS
        .iter()
        .find(|n| n.chain_reference == reference)
}

pub fn network_by_selector(selector: ChainSelector) -> Option<&'static NetworkInfo> {
    KNOWN_NETWORKS.iter().find(|n| n.selector == selector)
}

/// Per-network instances for the networks the relay is deployed on.
pub trait KnownNetwork<A> {
    /// Ethereum Sepolia, hosting the name registry.
    fn sepolia() -> A;
    /// Base Sepolia.
    fn base_sepolia() -> A;
    /// Arbitrum Sepolia.
    fn arbitrum_sepolia() -> A;
}

fn known(name: &str) -> &'static NetworkInfo {
    // Only called with names from KNOWN_NETWORKS
    match network_by_name(name) {
        Some(info) => info,
        None => unreachable!("unknown built-in network {name}"),
    }
}

impl KnownNetwork<ChainId> for ChainId {
    fn sepolia() -> ChainId {
        known("sepolia").chain_id()
    }
    fn base_sepolia() -> ChainId {
        known("base-sepolia").chain_id()
    }
    fn arbitrum_sepolia() -> ChainId {
        known("arbitrum-sepolia").chain_id()
    }
}

impl KnownNetwork<ChainSelector> for ChainSelector {
    fn sepolia() -> ChainSelector {
        known("sepolia").selector
    }
    fn base_sepolia() -> ChainSelector {
        known("base-sepolia").selector
    }
    fn arbitrum_sepolia() -> ChainSelector {
        known("arbitrum-sepolia").selector
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_and_selectors_are_unique() {
        for (i, a) in KNOWN_NETWORKS.iter().enumerate() {
            for b in &KNOWN_NETWORKS[i + 1..] {
                assert_ne!(a.name, b.name);
                assert_ne!(a.selector, b.selector);
                assert_ne!(a.chain_reference, b.chain_reference);
            }
        }
    }

    #[test]
    fn test_lookup_by_chain_id_and_selector() {
        let base = network_by_chain_id(&ChainId::base_sepolia()).unwrap();
        assert_eq!(base.selector, ChainSelector::base_sepolia());
        assert_eq!(network_by_selector(ChainSelector::sepolia()).unwrap().name, "sepolia");
        assert!(network_by_chain_id(&ChainId::new("eip155", "1")).is_none());
        assert!(network_by_chain_id(&ChainId::new("solana", "11155111")).is_none());
    }

    #[test]
    fn test_only_l1_hosts_registrar() {
        assert!(network_by_name("sepolia").unwrap().registrar.is_some());
        assert!(network_by_name("base-sepolia").unwrap().registrar.is_none());
    }
}
