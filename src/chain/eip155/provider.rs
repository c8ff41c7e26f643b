use alloy_network::{EthereumWallet, ReceiptResponse, TransactionBuilder};
use alloy_primitives::{Address, B256, Bytes, TxHash, U256};
use alloy_provider::fillers::{
    BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller, WalletFiller,
};
use alloy_provider::{Identity, PendingTransactionError, Provider, ProviderBuilder, RootProvider};
use alloy_rpc_client::RpcClient;
use alloy_rpc_types_eth::{BlockId, BlockNumberOrTag, TransactionReceipt, TransactionRequest};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_transport::TransportError;
use alloy_transport::layers::{FallbackLayer, ThrottleLayer};
use alloy_transport_http::Http;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::Instrument;

use crate::chain::eip155::config::Eip155ChainConfig;
use crate::chain::eip155::pending_nonce_manager::PendingNonceManager;
use crate::chain::eip155::types::Eip155ChainReference;
use crate::chain::{ChainId, ChainProviderOps, FromConfig};
use crate::config::RpcConfig;
use crate::timestamp::UnixTimestamp;

/// Combined filler type for gas, blob gas, nonce, and chain ID.
pub type InnerFiller = JoinFill<
    GasFiller,
    JoinFill<BlobGasFiller, JoinFill<NonceFiller<PendingNonceManager>, ChainIdFiller>>,
>;

/// Fully composed provider: fillers, wallet signing, JSON-RPC root.
pub type InnerProvider = FillProvider<
    JoinFill<JoinFill<Identity, InnerFiller>, WalletFiller<EthereumWallet>>,
    RootProvider,
>;

/// Signing provider for one EVM chain.
///
/// One instance exists per chain (L1 and L2), each carrying the same private key
/// but its own nonce stream, so the two chains advance independently.
#[derive(Debug)]
pub struct Eip155ChainProvider {
    chain: Eip155ChainReference,
    eip1559: bool,
    flashblocks: bool,
    receipt_timeout_secs: u64,
    inner: InnerProvider,
    signer_address: Address,
    nonce_manager: PendingNonceManager,
}

impl Eip155ChainProvider {
    /// Builds a throttled JSON-RPC client that falls back across the configured HTTP endpoints.
    pub fn rpc_client(
        chain_id: &ChainId,
        rpc: &[RpcConfig],
    ) -> Result<RpcClient, Box<dyn std::error::Error>> {
        let transports = rpc
            .iter()
            .filter_map(|provider_config| {
                let rpc_url = provider_config.http.inner().clone();
                let is_http = rpc_url.scheme() == "http" || rpc_url.scheme() == "https";
                if !is_http {
                    tracing::warn!(chain=%chain_id, rpc_url=%rpc_url, "Skipping non-HTTP transport");
                    return None;
                }
                tracing::info!(chain=%chain_id, rpc_url=%rpc_url, rate_limit=?provider_config.rate_limit, "Using HTTP transport");
                let rate_limit = provider_config.rate_limit.unwrap_or(u32::MAX);
                let service = ServiceBuilder::new()
                    .layer(ThrottleLayer::new(rate_limit))
                    .service(Http::new(rpc_url));
                Some(service)
            })
            .collect::<Vec<_>>();
        let transport_count = NonZeroUsize::new(transports.len())
            .ok_or_else(|| format!("no HTTP RPC endpoint configured for {chain_id}"))?;
        let fallback = ServiceBuilder::new()
            .layer(FallbackLayer::default().with_active_transport_count(transport_count))
            .service(transports);
        Ok(RpcClient::new(fallback, false))
    }
}

#[async_trait::async_trait]
impl FromConfig<Eip155ChainConfig> for Eip155ChainProvider {
    async fn from_config(config: &Eip155ChainConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let signer = PrivateKeySigner::from_bytes(&B256::from(*config.signer().as_bytes()))?
            .with_chain_id(Some(config.chain_reference().inner()));
        let signer_address = signer.address();
        let wallet = EthereumWallet::from(signer);

        let client = Self::rpc_client(&config.chain_id(), config.rpc())?;

        let nonce_manager = PendingNonceManager::default();
        // Gas -> BlobGas -> Nonce -> ChainId, with our nonce manager in place of the default
        let filler = JoinFill::new(
            GasFiller,
            JoinFill::new(
                BlobGasFiller::default(),
                JoinFill::new(
                    NonceFiller::new(nonce_manager.clone()),
                    ChainIdFiller::default(),
                ),
            ),
        );
        let inner: InnerProvider = ProviderBuilder::default()
            .filler(filler)
            .wallet(wallet)
            .connect_client(client);

        tracing::info!(chain=%config.chain_id(), signer=%signer_address, "Using EVM provider");

        Ok(Self {
            chain: config.chain_reference(),
            eip1559: config.eip1559(),
            flashblocks: config.flashblocks(),
            receipt_timeout_secs: config.receipt_timeout_secs(),
            inner,
            signer_address,
            nonce_manager,
        })
    }
}

impl Eip155MetaTransactionProvider for Eip155ChainProvider {
    fn chain(&self) -> &Eip155ChainReference {
        &self.chain
    }

    fn signer_address(&self) -> Address {
        self.signer_address
    }

    /// Signs, submits and waits for the receipt of `tx`.
    ///
    /// Legacy (non EIP-1559) chains get an explicit gas price. Any failure after
    /// nonce allocation resets the signer's cached nonce, since the transaction may
    /// or may not have reached the mempool. Nothing is retried.
    async fn send_transaction(
        &self,
        tx: MetaTransaction,
    ) -> Result<SubmittedTransaction, MetaTransactionSendError> {
        let from_address = self.signer_address;
        let mut txr = TransactionRequest::default()
            .with_to(tx.to)
            .with_from(from_address)
            .with_value(tx.value)
            .with_input(tx.calldata);

        if !self.eip1559 {
            let gas: u128 = self
                .inner
                .get_gas_price()
                .instrument(tracing::info_span!("get_gas_price"))
                .await?;
            txr.set_gas_price(gas);
        }

        let block_id = if self.flashblocks {
            BlockId::latest()
        } else {
            BlockId::pending()
        };
        let gas_limit = self.inner.estimate_gas(txr.clone()).block(block_id).await?;
        txr.set_gas_limit(gas_limit);

        let pending_tx = match self.inner.send_transaction(txr).await {
            Ok(pending) => pending,
            Err(e) => {
                self.nonce_manager.reset_nonce(from_address).await;
                return Err(MetaTransactionSendError::Transport(e));
            }
        };
        let tx_hash = *pending_tx.tx_hash();
        tracing::debug!(chain=%self.chain, tx=%tx_hash, "Transaction submitted");

        let timeout = std::time::Duration::from_secs(self.receipt_timeout_secs);
        let watcher = pending_tx
            .with_required_confirmations(tx.confirmations)
            .with_timeout(Some(timeout));

        match watcher.get_receipt().await {
            Ok(receipt) => Ok(SubmittedTransaction::from(&receipt)),
            Err(e) => {
                self.nonce_manager.reset_nonce(from_address).await;
                Err(MetaTransactionSendError::PendingTransaction(e))
            }
        }
    }

    async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes, MetaTransactionSendError> {
        let txr = TransactionRequest::default().with_to(to).with_input(calldata);
        let output = self.inner.call(txr).await?;
        Ok(output)
    }

    async fn balance(&self, address: Address) -> Result<U256, MetaTransactionSendError> {
        let balance = self.inner.get_balance(address).await?;
        Ok(balance)
    }

    async fn latest_timestamp(&self) -> Result<UnixTimestamp, MetaTransactionSendError> {
        let block = self
            .inner
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await?
            .ok_or_else(|| MetaTransactionSendError::Custom("latest block not found".into()))?;
        Ok(UnixTimestamp::from_secs(block.header.inner.timestamp))
    }
}

impl ChainProviderOps for Eip155ChainProvider {
    fn chain_id(&self) -> ChainId {
        self.chain.into()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MetaTransactionSendError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    PendingTransaction(#[from] PendingTransactionError),
    #[error("{0}")]
    Custom(String),
}

/// Transaction parameters: target, calldata, attached native value, confirmations.
#[derive(Debug, Clone)]
pub struct MetaTransaction {
    pub to: Address,
    pub calldata: Bytes,
    pub value: U256,
    pub confirmations: u64,
}

impl MetaTransaction {
    pub fn new(to: Address, calldata: impl Into<Bytes>) -> Self {
        Self {
            to,
            calldata: calldata.into(),
            value: U256::ZERO,
            confirmations: 1,
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn with_confirmations(mut self, confirmations: u64) -> Self {
        self.confirmations = confirmations;
        self
    }
}

/// A mined transaction, as far as the source chain can tell.
///
/// `success` reflects local execution only. For relayed calls it says nothing
/// about whether the message was honored on the destination chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmittedTransaction {
    pub hash: TxHash,
    pub block_number: Option<u64>,
    pub success: bool,
}

impl From<&TransactionReceipt> for SubmittedTransaction {
    fn from(receipt: &TransactionReceipt) -> Self {
        Self {
            hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            success: receipt.status(),
        }
    }
}

/// Everything the relay components need from a chain: signed submission and reads.
pub trait Eip155MetaTransactionProvider {
    /// Chain this provider submits to.
    fn chain(&self) -> &Eip155ChainReference;

    /// Address every transaction is sent from.
    fn signer_address(&self) -> Address;

    /// Sends a transaction and waits for its receipt.
    fn send_transaction(
        &self,
        tx: MetaTransaction,
    ) -> impl Future<Output = Result<SubmittedTransaction, MetaTransactionSendError>> + Send;

    /// Executes a read-only `eth_call` against the latest block.
    fn call(
        &self,
        to: Address,
        calldata: Bytes,
    ) -> impl Future<Output = Result<Bytes, MetaTransactionSendError>> + Send;

    /// Native balance of `address`.
    fn balance(
        &self,
        address: Address,
    ) -> impl Future<Output = Result<U256, MetaTransactionSendError>> + Send;

    /// Timestamp of the latest block, the clock commit windows are measured against.
    fn latest_timestamp(
        &self,
    ) -> impl Future<Output = Result<UnixTimestamp, MetaTransactionSendError>> + Send;
}

impl<T: Eip155MetaTransactionProvider + Send + Sync> Eip155MetaTransactionProvider for Arc<T> {
    fn chain(&self) -> &Eip155ChainReference {
        (**self).chain()
    }

    fn signer_address(&self) -> Address {
        (**self).signer_address()
    }

    fn send_transaction(
        &self,
        tx: MetaTransaction,
    ) -> impl Future<Output = Result<SubmittedTransaction, MetaTransactionSendError>> + Send {
        (**self).send_transaction(tx)
    }

    fn call(
        &self,
        to: Address,
        calldata: Bytes,
    ) -> impl Future<Output = Result<Bytes, MetaTransactionSendError>> + Send {
        (**self).call(to, calldata)
    }

    fn balance(
        &self,
        address: Address,
    ) -> impl Future<Output = Result<U256, MetaTransactionSendError>> + Send {
        (**self).balance(address)
    }

    fn latest_timestamp(
        &self,
    ) -> impl Future<Output = Result<UnixTimestamp, MetaTransactionSendError>> + Send {
        (**self).latest_timestamp()
    }
}
