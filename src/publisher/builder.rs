//! Transaction Builder: turns a publish job into a signed destination transaction.

use alloy::consensus::TxEip1559;
use alloy::primitives::{Address, TxKind, U256};
use std::sync::Arc;

use crate::blockchain::abi::encode_receive_block_hash;
use crate::blockchain::client::{DestinationChain, SourceChain};
use crate::blockchain::types::{BlockchainError, FeeConditions};
use crate::blockchain::wallet::{SignedTransaction, Wallet};
use crate::publisher::error::PublishError;
use crate::publisher::types::{BlockObservation, DestinationTarget, PublishJob};

/// Multiplier applied to the latest base fee so the transaction survives
/// a few blocks of base fee growth.
pub const BASE_FEE_FACTOR: u128 = 2;

/// 2.5 gwei.
pub const MAX_PRIORITY_FEE_PER_GAS: u128 = 2_500_000_000;

/// EIP-1559 fee parameters of one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeParams {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

impl From<&FeeConditions> for FeeParams {
    fn from(fees: &FeeConditions) -> Self {
        let max_fee_per_gas = fees
            .base_fee
            .saturating_mul(BASE_FEE_FACTOR)
            .saturating_add(MAX_PRIORITY_FEE_PER_GAS);
        Self {
            max_fee_per_gas,
            max_priority_fee_per_gas: fees.suggested_tip.min(max_fee_per_gas),
        }
    }
}

/// Fail with [`PublishError::StaleBlock`] unless `block` is still canonical on `source`.
pub async fn ensure_canonical<S: SourceChain>(
    source: &S,
    block: &BlockObservation,
) -> Result<(), PublishError> {
    match source.canonical_hash(block.height).await? {
        Some(canonical) if canonical == block.hash => Ok(()),
        Some(canonical) => Err(PublishError::StaleBlock {
            height: block.height,
            observed: block.hash,
            canonical,
        }),
        // Node lagging behind its own subscription; worth another attempt
        None => Err(BlockchainError::MissingBlock(block.height).into()),
    }
}

/// A signed `receiveBlockHash` call for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPublication {
    pub job: PublishJob,
    pub tx: SignedTransaction,
    pub fees: FeeParams,
}

pub struct TransactionBuilder<S, D> {
    source: Arc<S>,
    destination: Arc<D>,
    target: DestinationTarget,
    wallet: Wallet,
    gas_limit: u64,
}

impl<S: SourceChain, D: DestinationChain> TransactionBuilder<S, D> {
    /// The target's wallet is bound to the destination client's chain ID.
    pub fn new(source: Arc<S>, destination: Arc<D>, target: DestinationTarget, gas_limit: u64) -> Self {
        let wallet = target.wallet.clone().with_chain_id(destination.chain_id());
        Self {
            source,
            destination,
            target,
            wallet,
            gas_limit,
        }
    }

    pub fn target(&self) -> &DestinationTarget {
        &self.target
    }

    pub fn account(&self) -> Address {
        self.wallet.address()
    }

    /// Build and sign the publication of `job.block`.
    ///
    /// Nonce and fees are read fresh on every call.
    pub async fn build(&self, job: &PublishJob) -> Result<SignedPublication, PublishError> {
        ensure_canonical(self.source.as_ref(), &job.block).await?;

        let nonce = self.destination.pending_nonce(self.wallet.address()).await?;
        let fees = FeeParams::from(&self.destination.fee_conditions().await?);

        let tx = TxEip1559 {
            chain_id: self.wallet.chain_id(),
            nonce,
            gas_limit: self.gas_limit,
            max_fee_per_gas: fees.max_fee_per_gas,
            max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
            to: TxKind::Call(self.target.receiver),
            value: U256::ZERO,
            input: encode_receive_block_hash(job.block.hash),
            ..Default::default()
        };
        let tx = self.wallet.sign_eip1559(tx)?;

        tracing::debug!(
            target_key = %job.target,
            height = job.block.height,
            nonce,
            tx_hash = %tx.tx_hash,
            max_fee_per_gas = fees.max_fee_per_gas,
            "Built publication"
        );

        Ok(SignedPublication {
            job: job.clone(),
            tx,
            fees,
        })
    }
}
