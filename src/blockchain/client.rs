//! Chain access for the publishing pipeline.
//!
//! # Responsibilities
//! - `SourceChain`: stream new heads, answer "which hash is canonical at height H"
//! - `DestinationChain`: nonce, fee conditions, broadcast, receipts
//! - alloy-backed implementations with a deadline on every call
//!
//! The pipeline is generic over these traits so it can run against in-memory
//! chains in tests.

use alloy::eips::BlockNumberOrTag;
use alloy::primitives::{Address, Bytes, TxHash, B256};
use alloy::providers::{Provider, ProviderBuilder, WsConnect};
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use std::future::Future;
use std::sync::Arc;

use crate::blockchain::abi::decode_receive_event;
use crate::blockchain::types::{BlockchainError, BlockchainResult, FeeConditions, ReceiptSummary};
use crate::publisher::types::{BlockObservation, ChainEndpoint, SourceEndpoint};
use crate::resilience::timeouts::with_timeout;

/// Live sequence of new heads from one subscription. Ends when the connection drops.
pub type BlockStream = BoxStream<'static, BlockObservation>;

/// Read side of a source chain.
pub trait SourceChain: Send + Sync + 'static {
    /// Open a fresh new-heads subscription starting at the current head.
    fn subscribe_heads(&self) -> impl Future<Output = BlockchainResult<BlockStream>> + Send;

    /// Hash of the canonical block at `height`, `None` if the node has no such block.
    fn canonical_hash(
        &self,
        height: u64,
    ) -> impl Future<Output = BlockchainResult<Option<B256>>> + Send;
}

/// Write side of a destination chain.
pub trait DestinationChain: Send + Sync + 'static {
    /// EVM chain ID used for signing.
    fn chain_id(&self) -> u64;

    /// Transaction count of `account` including pending transactions.
    fn pending_nonce(&self, account: Address)
        -> impl Future<Output = BlockchainResult<u64>> + Send;

    fn fee_conditions(&self) -> impl Future<Output = BlockchainResult<FeeConditions>> + Send;

    fn send_raw_transaction(
        &self,
        raw: Bytes,
    ) -> impl Future<Output = BlockchainResult<TxHash>> + Send;

    fn transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> impl Future<Output = BlockchainResult<Option<ReceiptSummary>>> + Send;
}

fn http_provider(endpoint: &ChainEndpoint) -> BlockchainResult<Arc<dyn Provider + Send + Sync>> {
    let rpc_url = endpoint.rpc_url();
    let url: url::Url = rpc_url
        .parse()
        .map_err(|e| BlockchainError::Rpc(format!("Invalid RPC URL '{}': {}", rpc_url, e)))?;
    Ok(Arc::new(ProviderBuilder::new().connect_http(url)) as Arc<dyn Provider + Send + Sync>)
}

/// Source chain over the node's WebSocket (heads) and HTTP (lookups) APIs.
#[derive(Clone)]
pub struct SourceRpcClient {
    endpoint: SourceEndpoint,
    http: Arc<dyn Provider + Send + Sync>,
    timeout_secs: u64,
}

impl SourceRpcClient {
    pub fn new(endpoint: SourceEndpoint, timeout_secs: u64) -> BlockchainResult<Self> {
        let http = http_provider(&endpoint)?;
        Ok(Self {
            endpoint,
            http,
            timeout_secs,
        })
    }
}

impl SourceChain for SourceRpcClient {
    async fn subscribe_heads(&self) -> BlockchainResult<BlockStream> {
        let ws_url = self.endpoint.ws_url();

        let provider = with_timeout(self.timeout_secs, async {
            ProviderBuilder::new()
                .connect_ws(WsConnect::new(ws_url.clone()))
                .await
                .map_err(|e| BlockchainError::Subscription(format!("connect {}: {}", ws_url, e)))
        })
        .await?;

        let subscription = with_timeout(self.timeout_secs, async {
            provider
                .subscribe_blocks()
                .await
                .map_err(|e| BlockchainError::Subscription(format!("eth_subscribe: {}", e)))
        })
        .await?;

        tracing::debug!(ws_url = %ws_url, "Subscribed to new heads");

        // The provider owns the socket; keep it alive as long as the stream.
        let stream = subscription.into_stream().map(move |header| {
            let _connection = &provider;
            BlockObservation::from(&header)
        });
        Ok(stream.boxed())
    }

    async fn canonical_hash(&self, height: u64) -> BlockchainResult<Option<B256>> {
        let block = with_timeout(self.timeout_secs, async {
            self.http
                .get_block_by_number(BlockNumberOrTag::Number(height))
                .await
                .map_err(|e| BlockchainError::rpc("eth_getBlockByNumber", e))
        })
        .await?;
        Ok(block.map(|b| b.header.hash))
    }
}

impl std::fmt::Debug for SourceRpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRpcClient")
            .field("rpc_url", &self.endpoint.rpc_url())
            .field("ws_url", &self.endpoint.ws_url())
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Destination chain over the node's HTTP JSON-RPC API.
#[derive(Clone)]
pub struct DestinationRpcClient {
    endpoint: ChainEndpoint,
    provider: Arc<dyn Provider + Send + Sync>,
    chain_id: u64,
    timeout_secs: u64,
}

impl DestinationRpcClient {
    /// Connect and learn the EVM chain ID.
    ///
    /// Fails if the node is unreachable: destinations are checked once at startup.
    pub async fn connect(endpoint: ChainEndpoint, timeout_secs: u64) -> BlockchainResult<Self> {
        let provider = http_provider(&endpoint)?;

        let chain_id = with_timeout(timeout_secs, async {
            provider
                .get_chain_id()
                .await
                .map_err(|e| BlockchainError::rpc("eth_chainId", e))
        })
        .await?;

        tracing::info!(
            rpc_url = %endpoint.rpc_url(),
            blockchain_id = %endpoint.blockchain_id,
            chain_id,
            "Destination client initialized"
        );

        Ok(Self {
            endpoint,
            provider,
            chain_id,
            timeout_secs,
        })
    }

    pub fn endpoint(&self) -> &ChainEndpoint {
        &self.endpoint
    }
}

impl DestinationChain for DestinationRpcClient {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn pending_nonce(&self, account: Address) -> BlockchainResult<u64> {
        with_timeout(self.timeout_secs, async {
            self.provider
                .get_transaction_count(account)
                .pending()
                .await
                .map_err(|e| BlockchainError::rpc("eth_getTransactionCount", e))
        })
        .await
    }

    async fn fee_conditions(&self) -> BlockchainResult<FeeConditions> {
        let latest = with_timeout(self.timeout_secs, async {
            self.provider
                .get_block_by_number(BlockNumberOrTag::Latest)
                .await
                .map_err(|e| BlockchainError::rpc("eth_getBlockByNumber", e))
        })
        .await?
        .ok_or_else(|| BlockchainError::Rpc("latest block unavailable".to_string()))?;

        let base_fee = latest
            .header
            .base_fee_per_gas
            .ok_or_else(|| BlockchainError::Rpc("latest block carries no base fee".to_string()))?;

        let suggested_tip = with_timeout(self.timeout_secs, async {
            self.provider
                .get_max_priority_fee_per_gas()
                .await
                .map_err(|e| BlockchainError::rpc("eth_maxPriorityFeePerGas", e))
        })
        .await?;

        Ok(FeeConditions {
            base_fee: base_fee as u128,
            suggested_tip,
        })
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> BlockchainResult<TxHash> {
        with_timeout(self.timeout_secs, async {
            let pending = self
                .provider
                .send_raw_transaction(&raw)
                .await
                .map_err(BlockchainError::from_broadcast)?;
            Ok(*pending.tx_hash())
        })
        .await
    }

    async fn transaction_receipt(&self, tx_hash: TxHash) -> BlockchainResult<Option<ReceiptSummary>> {
        let receipt = with_timeout(self.timeout_secs, async {
            self.provider
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(|e| BlockchainError::rpc("eth_getTransactionReceipt", e))
        })
        .await?;

        Ok(receipt.map(|r| ReceiptSummary {
            tx_hash: r.transaction_hash,
            block_number: r.block_number.unwrap_or_default(),
            success: r.status(),
            published_hash: r
                .inner
                .logs()
                .iter()
                .find_map(|log| decode_receive_event(&log.inner.data)),
        }))
    }
}

impl std::fmt::Debug for DestinationRpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DestinationRpcClient")
            .field("rpc_url", &self.endpoint.rpc_url())
            .field("chain_id", &self.chain_id)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
