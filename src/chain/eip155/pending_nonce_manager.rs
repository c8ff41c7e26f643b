use alloy_primitives::Address;
use alloy_provider::Provider;
use alloy_provider::fillers::NonceManager;
use alloy_transport::TransportResult;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Sentinel marking an address whose nonce must be fetched from the node.
const UNKNOWN: u64 = u64::MAX;

/// Keeps each signer's transactions in a strict nonce sequence.
///
/// The first nonce for an address is read with `.pending()`, so commits or
/// approvals still sitting in the mempool from an earlier run are counted and a
/// resumed run does not collide with them. Later nonces are allocated locally.
/// After a failed submission the cached value is dropped with [`reset_nonce`]
/// and the next allocation goes back to the node.
///
/// [`reset_nonce`]: PendingNonceManager::reset_nonce
#[derive(Clone, Debug, Default)]
pub struct PendingNonceManager {
    nonces: Arc<DashMap<Address, Arc<Mutex<u64>>>>,
}

#[async_trait]
impl NonceManager for PendingNonceManager {
    async fn get_next_nonce<P, N>(&self, provider: &P, address: Address) -> TransportResult<u64>
    where
        P: Provider<N>,
        N: alloy_network::Network,
    {
        // Clone the per-address lock out of the map; the map guard must not live across the await.
        let slot = {
            let entry = self
                .nonces
                .entry(address)
                .or_insert_with(|| Arc::new(Mutex::new(UNKNOWN)));
            Arc::clone(entry.value())
        };

        let mut nonce = slot.lock().await;
        let next = if *nonce == UNKNOWN {
            tracing::trace!(%address, "fetching pending nonce");
            provider.get_transaction_count(address).pending().await?
        } else {
            tracing::trace!(%address, current_nonce = *nonce, "allocating next nonce");
            *nonce + 1
        };
        *nonce = next;
        Ok(next)
    }
}

impl PendingNonceManager {
    /// Forgets the cached nonce for `address`; the next allocation requeries the node.
    pub async fn reset_nonce(&self, address: Address) {
        if let Some(slot) = self.nonces.get(&address) {
            let mut nonce = slot.lock().await;
            *nonce = UNKNOWN;
            tracing::debug!(%address, "nonce cache reset");
        }
    }

    #[cfg(test)]
    async fn cached(&self, address: Address) -> Option<u64> {
        let slot = self.nonces.get(&address).map(|s| Arc::clone(s.value()))?;
        let nonce = *slot.lock().await;
        Some(nonce)
    }

    #[cfg(test)]
    async fn seed(&self, address: Address, nonce: u64) {
        let slot = Arc::clone(
            self.nonces
                .entry(address)
                .or_insert_with(|| Arc::new(Mutex::new(UNKNOWN)))
                .value(),
        );
        *slot.lock().await = nonce;
    }
}
