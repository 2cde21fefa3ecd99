//! In-memory chains for unit tests.

use alloy::consensus::{Transaction, TxEnvelope};
use alloy::eips::eip2718::Decodable2718;
use alloy::primitives::{Address, Bytes, TxHash, B256};
use futures_util::stream::{self, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use crate::blockchain::abi::decode_receive_block_hash;
use crate::blockchain::client::{BlockStream, DestinationChain, SourceChain};
use crate::blockchain::types::{BlockchainError, BlockchainResult, FeeConditions, ReceiptSummary};
use crate::publisher::types::BlockObservation;

pub const TEST_PRIVATE_KEY: &str =
    "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

pub fn hash_for(height: u64, fork: u8) -> B256 {
    let mut hash = [0u8; 32];
    hash[0] = fork;
    hash[24..].copy_from_slice(&height.to_be_bytes());
    B256::from(hash)
}

pub fn block(height: u64) -> BlockObservation {
    BlockObservation {
        height,
        hash: hash_for(height, 0),
        parent_hash: hash_for(height.saturating_sub(1), 0),
        timestamp: 1_700_000_000 + height,
    }
}

/// Source chain whose canonical hashes are set by the test.
#[derive(Default)]
pub struct FakeSource {
    canonical: Mutex<HashMap<u64, B256>>,
    /// Canonical lookups answered after the given number of calls.
    lookups: AtomicU64,
    replace_after_lookups: Mutex<Option<(u64, u64, B256)>>,
}

impl FakeSource {
    pub fn with_blocks(heights: impl IntoIterator<Item = u64>) -> Self {
        let source = Self::default();
        {
            let mut canonical = source.canonical.lock().unwrap();
            for h in heights {
                canonical.insert(h, hash_for(h, 0));
            }
        }
        source
    }

    pub fn set_canonical(&self, height: u64, hash: B256) {
        self.canonical.lock().unwrap().insert(height, hash);
    }

    /// Replace the block at `height` once `lookups` canonical checks have been answered.
    pub fn reorg_after(&self, lookups: u64, height: u64, hash: B256) {
        *self.replace_after_lookups.lock().unwrap() = Some((lookups, height, hash));
    }
}

impl SourceChain for FakeSource {
    async fn subscribe_heads(&self) -> BlockchainResult<BlockStream> {
        Ok(stream::pending().boxed())
    }

    async fn canonical_hash(&self, height: u64) -> BlockchainResult<Option<B256>> {
        let seen = self.lookups.fetch_add(1, Ordering::SeqCst);
        if let Some((after, h, hash)) = *self.replace_after_lookups.lock().unwrap() {
            if seen >= after {
                self.canonical.lock().unwrap().insert(h, hash);
            }
        }
        Ok(self.canonical.lock().unwrap().get(&height).copied())
    }
}

/// A transaction accepted by [`FakeDestination`].
#[derive(Debug, Clone)]
pub struct SentTx {
    pub tx_hash: TxHash,
    pub nonce: u64,
    pub chain_id: Option<u64>,
    pub to: Option<Address>,
    pub block_hash: Option<B256>,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: Option<u128>,
}

/// Destination chain that includes every accepted transaction at once.
pub struct FakeDestination {
    pub chain_id: u64,
    pub fees: FeeConditions,
    next_nonce: AtomicU64,
    sent: Mutex<Vec<SentTx>>,
    broadcast_failures: Mutex<VecDeque<BlockchainError>>,
    receipts: Mutex<HashMap<TxHash, ReceiptSummary>>,
    pub revert: AtomicBool,
    pub include: AtomicBool,
}

impl Default for FakeDestination {
    fn default() -> Self {
        Self {
            chain_id: 43112,
            fees: FeeConditions {
                base_fee: 25_000_000_000,
                suggested_tip: 1_000_000_000,
            },
            next_nonce: AtomicU64::new(0),
            sent: Mutex::new(Vec::new()),
            broadcast_failures: Mutex::new(VecDeque::new()),
            receipts: Mutex::new(HashMap::new()),
            revert: AtomicBool::new(false),
            include: AtomicBool::new(true),
        }
    }
}

impl FakeDestination {
    /// Fail the next broadcasts with these errors, in order.
    pub fn fail_broadcasts(&self, errors: impl IntoIterator<Item = BlockchainError>) {
        self.broadcast_failures.lock().unwrap().extend(errors);
    }

    pub fn sent(&self) -> Vec<SentTx> {
        self.sent.lock().unwrap().clone()
    }
}

impl DestinationChain for FakeDestination {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn pending_nonce(&self, _account: Address) -> BlockchainResult<u64> {
        Ok(self.next_nonce.load(Ordering::SeqCst))
    }

    async fn fee_conditions(&self) -> BlockchainResult<FeeConditions> {
        Ok(self.fees)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> BlockchainResult<TxHash> {
        if let Some(err) = self.broadcast_failures.lock().unwrap().pop_front() {
            return Err(err);
        }

        let envelope = TxEnvelope::decode_2718(&mut raw.as_ref())
            .map_err(|e| BlockchainError::Rejected(format!("undecodable transaction: {}", e)))?;
        let expected = self.next_nonce.load(Ordering::SeqCst);
        if envelope.nonce() < expected {
            return Err(BlockchainError::from_rpc_message("nonce too low"));
        }
        self.next_nonce.store(envelope.nonce() + 1, Ordering::SeqCst);

        let tx_hash = *envelope.tx_hash();
        let block_hash = decode_receive_block_hash(envelope.input());
        self.sent.lock().unwrap().push(SentTx {
            tx_hash,
            nonce: envelope.nonce(),
            chain_id: envelope.chain_id(),
            to: envelope.to(),
            block_hash,
            max_fee_per_gas: envelope.max_fee_per_gas(),
            max_priority_fee_per_gas: envelope.max_priority_fee_per_gas(),
        });

        if self.include.load(Ordering::SeqCst) {
            let success = !self.revert.load(Ordering::SeqCst);
            let block_number = 1_000 + self.sent.lock().unwrap().len() as u64;
            self.receipts.lock().unwrap().insert(
                tx_hash,
                ReceiptSummary {
                    tx_hash,
                    block_number,
                    success,
                    published_hash: if success { block_hash } else { None },
                },
            );
        }
        Ok(tx_hash)
    }

    async fn transaction_receipt(&self, tx_hash: TxHash) -> BlockchainResult<Option<ReceiptSummary>> {
        Ok(self.receipts.lock().unwrap().get(&tx_hash).cloned())
    }
}
