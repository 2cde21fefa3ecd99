//! Shared utilities for integration tests: in-memory chains and orchestrator helpers.
#![allow(dead_code)]

use alloy::consensus::transaction::SignerRecoverable;
use alloy::consensus::{Transaction, TxEnvelope};
use alloy::eips::eip2718::Decodable2718;
use alloy::primitives::{Address, Bytes, TxHash, B256};
use futures_util::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

use blockhash_relayer::blockchain::abi::decode_receive_block_hash;
use blockhash_relayer::blockchain::client::{BlockStream, DestinationChain, SourceChain};
use blockhash_relayer::blockchain::types::{
    BlockchainError, BlockchainId, BlockchainResult, FeeConditions, ReceiptSummary,
};
use blockhash_relayer::blockchain::wallet::Wallet;
use blockhash_relayer::publisher::orchestrator::RelayerSettings;
use blockhash_relayer::publisher::submitter::SubmitterSettings;
use blockhash_relayer::publisher::types::{
    BlockObservation, ChainEndpoint, DestinationTarget, SubmissionResult,
};
use blockhash_relayer::publisher::watcher::{ReconnectPolicy, SourceState};
use blockhash_relayer::publisher::RelayerHandle;
use blockhash_relayer::resilience::RetryPolicy;

// Anvil's first two accounts
pub const KEY_A: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const KEY_B: &str = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

const WAIT: Duration = Duration::from_secs(10);

pub fn hash_for(height: u64, fork: u8) -> B256 {
    let mut hash = [0u8; 32];
    hash[0] = 0xb0 | (fork & 0x0f);
    hash[24..].copy_from_slice(&height.to_be_bytes());
    B256::from(hash)
}

struct SourceInner {
    head: u64,
    canonical: HashMap<u64, B256>,
    subscribers: Vec<mpsc::UnboundedSender<BlockObservation>>,
    refuse_subscriptions: u32,
    refuse_forever: bool,
    subscriptions: u32,
    lookups: u64,
    scheduled_reorg: Option<(u64, u64, B256)>,
}

/// Source chain driven by the test: blocks are produced on demand and pushed
/// to every open subscription.
pub struct MockSource {
    inner: Mutex<SourceInner>,
}

impl MockSource {
    pub fn new() -> Arc<Self> {
        Self::starting_at(0)
    }

    /// A chain whose blocks up to `head` already exist.
    pub fn starting_at(head: u64) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(SourceInner {
                head,
                canonical: (1..=head).map(|h| (h, hash_for(h, 0))).collect(),
                subscribers: Vec::new(),
                refuse_subscriptions: 0,
                refuse_forever: false,
                subscriptions: 0,
                lookups: 0,
                scheduled_reorg: None,
            }),
        })
    }

    pub fn produce_block(&self) -> BlockObservation {
        let mut inner = self.inner.lock().unwrap();
        inner.head += 1;
        let height = inner.head;
        let block = BlockObservation {
            height,
            hash: hash_for(height, 0),
            parent_hash: inner.canonical.get(&(height - 1)).copied().unwrap_or_default(),
            timestamp: 1_700_000_000 + height,
        };
        inner.canonical.insert(height, block.hash);
        inner.subscribers.retain(|tx| tx.send(block).is_ok());
        block
    }

    pub fn produce_blocks(&self, n: u64) -> Vec<BlockObservation> {
        (0..n).map(|_| self.produce_block()).collect()
    }

    /// Close every open subscription, as a node restart would.
    pub fn drop_connections(&self) {
        self.inner.lock().unwrap().subscribers.clear();
    }

    /// Refuse the next `n` subscription attempts.
    pub fn refuse_subscriptions(&self, n: u32) {
        self.inner.lock().unwrap().refuse_subscriptions = n;
    }

    pub fn refuse_all_subscriptions(&self) {
        self.inner.lock().unwrap().refuse_forever = true;
    }

    /// Replace the canonical block at `height` once `after_lookups` canonical
    /// checks have been answered.
    pub fn schedule_reorg(&self, after_lookups: u64, height: u64, fork: u8) -> B256 {
        let hash = hash_for(height, fork);
        self.inner.lock().unwrap().scheduled_reorg = Some((after_lookups, height, hash));
        hash
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().unwrap().subscribers.len()
    }

    pub fn subscriptions(&self) -> u32 {
        self.inner.lock().unwrap().subscriptions
    }
}

impl SourceChain for MockSource {
    async fn subscribe_heads(&self) -> BlockchainResult<BlockStream> {
        let mut inner = self.inner.lock().unwrap();
        if inner.refuse_forever || inner.refuse_subscriptions > 0 {
            inner.refuse_subscriptions = inner.refuse_subscriptions.saturating_sub(1);
            return Err(BlockchainError::Subscription("connection refused".into()));
        }
        inner.subscriptions += 1;

        let (tx, rx) = mpsc::unbounded_channel();
        inner.subscribers.push(tx);
        let heads = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|block| (block, rx))
        });
        Ok(heads.boxed())
    }

    async fn canonical_hash(&self, height: u64) -> BlockchainResult<Option<B256>> {
        let mut inner = self.inner.lock().unwrap();
        inner.lookups += 1;
        let scheduled = inner.scheduled_reorg;
        if let Some((after, h, hash)) = scheduled {
            if inner.lookups > after {
                inner.canonical.insert(h, hash);
                inner.scheduled_reorg = None;
            }
        }
        Ok(inner.canonical.get(&height).copied())
    }
}

/// A transaction accepted by [`MockDestination`].
#[derive(Debug, Clone)]
pub struct SentTx {
    pub tx_hash: TxHash,
    pub from: Address,
    pub nonce: u64,
    pub receiver: Option<Address>,
    pub block_hash: Option<B256>,
}

#[derive(Default)]
struct DestinationInner {
    nonces: HashMap<Address, u64>,
    sent: Vec<SentTx>,
    failures: VecDeque<BlockchainError>,
    failing_receivers: HashSet<Address>,
    receipts: HashMap<TxHash, ReceiptSummary>,
}

/// Destination chain that includes accepted transactions immediately.
pub struct MockDestination {
    chain_id: u64,
    inner: Mutex<DestinationInner>,
    block_number: AtomicU64,
    broadcast_calls: AtomicU64,
    hang_broadcasts: AtomicBool,
}

impl MockDestination {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            chain_id: 43112,
            inner: Mutex::new(DestinationInner::default()),
            block_number: AtomicU64::new(100),
            broadcast_calls: AtomicU64::new(0),
            hang_broadcasts: AtomicBool::new(false),
        })
    }

    /// Transactions to `receiver` revert.
    pub fn fail_receiver(&self, receiver: Address) {
        self.inner.lock().unwrap().failing_receivers.insert(receiver);
    }

    /// Fail the next broadcasts with these errors, in order.
    pub fn fail_broadcasts(&self, errors: impl IntoIterator<Item = BlockchainError>) {
        self.inner.lock().unwrap().failures.extend(errors);
    }

    /// Broadcasts from now on never answer, like a node that stopped responding.
    pub fn hang_broadcasts(&self) {
        self.hang_broadcasts.store(true, Ordering::SeqCst);
    }

    /// Every `send_raw_transaction` call, answered or not.
    pub fn broadcast_calls(&self) -> u64 {
        self.broadcast_calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<SentTx> {
        self.inner.lock().unwrap().sent.clone()
    }

    pub fn sent_to(&self, receiver: Address) -> Vec<SentTx> {
        self.sent()
            .into_iter()
            .filter(|tx| tx.receiver == Some(receiver))
            .collect()
    }
}

impl DestinationChain for MockDestination {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn pending_nonce(&self, account: Address) -> BlockchainResult<u64> {
        Ok(self.inner.lock().unwrap().nonces.get(&account).copied().unwrap_or(0))
    }

    async fn fee_conditions(&self) -> BlockchainResult<FeeConditions> {
        Ok(FeeConditions {
            base_fee: 25_000_000_000,
            suggested_tip: 1_000_000_000,
        })
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> BlockchainResult<TxHash> {
        self.broadcast_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang_broadcasts.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }

        let mut inner = self.inner.lock().unwrap();
        if let Some(err) = inner.failures.pop_front() {
            return Err(err);
        }

        let envelope = TxEnvelope::decode_2718(&mut raw.as_ref())
            .map_err(|e| BlockchainError::Rejected(format!("undecodable transaction: {}", e)))?;
        let from = envelope
            .recover_signer()
            .map_err(|e| BlockchainError::Rejected(format!("bad signature: {}", e)))?;
        if envelope.chain_id() != Some(self.chain_id) {
            return Err(BlockchainError::Rejected("invalid chain id".into()));
        }

        let expected = inner.nonces.get(&from).copied().unwrap_or(0);
        if envelope.nonce() < expected {
            return Err(BlockchainError::from_rpc_message("nonce too low"));
        }
        inner.nonces.insert(from, envelope.nonce() + 1);

        let tx_hash = *envelope.tx_hash();
        let receiver = envelope.to();
        let block_hash = decode_receive_block_hash(envelope.input());
        let success = !receiver.is_some_and(|r| inner.failing_receivers.contains(&r));
        let block_number = self.block_number.fetch_add(1, Ordering::SeqCst);

        inner.sent.push(SentTx {
            tx_hash,
            from,
            nonce: envelope.nonce(),
            receiver,
            block_hash,
        });
        inner.receipts.insert(
            tx_hash,
            ReceiptSummary {
                tx_hash,
                block_number,
                success,
                published_hash: if success { block_hash } else { None },
            },
        );
        Ok(tx_hash)
    }

    async fn transaction_receipt(&self, tx_hash: TxHash) -> BlockchainResult<Option<ReceiptSummary>> {
        Ok(self.inner.lock().unwrap().receipts.get(&tx_hash).cloned())
    }
}

pub fn endpoint(chain: &str) -> ChainEndpoint {
    ChainEndpoint {
        subnet_id: format!("subnet-{}", chain),
        blockchain_id: chain.into(),
        host: "127.0.0.1".into(),
        port: 9650,
        encrypt_connection: false,
    }
}

pub fn target(
    source: &str,
    destination: &str,
    receiver: Address,
    interval: u64,
    key: &str,
) -> DestinationTarget {
    DestinationTarget {
        source: source.into(),
        destination: endpoint(destination),
        receiver,
        interval: NonZeroU64::new(interval).unwrap(),
        wallet: Wallet::from_private_key(key, 0).unwrap(),
    }
}

/// Settings with millisecond delays.
pub fn fast_settings() -> RelayerSettings {
    RelayerSettings {
        reconnect: ReconnectPolicy {
            max_attempts: 5,
            base_delay_ms: 10,
            max_delay_ms: 50,
        },
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 10,
            max_delay_ms: 50,
        },
        submitter: SubmitterSettings {
            receipt_timeout_secs: 2,
            receipt_poll_interval_ms: 10,
            broadcast_attempts: 3,
        },
        gas_limit: 100_000,
    }
}

/// Poll `condition` until it holds, panicking after a generous deadline.
pub async fn eventually(what: &str, condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {}", what);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub async fn within<T>(what: &str, fut: impl Future<Output = T>) -> T {
    tokio::time::timeout(WAIT, fut)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {}", what))
}

pub async fn next_result(results: &mut broadcast::Receiver<SubmissionResult>) -> SubmissionResult {
    within("submission result", results.recv()).await.unwrap()
}

pub async fn collect_results(
    results: &mut broadcast::Receiver<SubmissionResult>,
    n: usize,
) -> Vec<SubmissionResult> {
    let mut collected = Vec::with_capacity(n);
    for _ in 0..n {
        collected.push(next_result(results).await);
    }
    collected
}

/// Assert nothing more arrives for a little while.
pub async fn assert_quiet(results: &mut broadcast::Receiver<SubmissionResult>) {
    let extra = tokio::time::timeout(Duration::from_millis(200), results.recv()).await;
    assert!(extra.is_err(), "unexpected result: {:?}", extra);
}

pub async fn wait_for_state(
    handle: &RelayerHandle,
    chain: &str,
    predicate: impl Fn(&SourceState) -> bool,
) -> SourceState {
    let mut states = handle
        .state_receiver(&BlockchainId::from(chain))
        .expect("unknown source");
    let state = within("source state", states.wait_for(|state| predicate(state)))
        .await
        .expect("state channel closed")
        .clone();
    state
}
