//! Interval counting: which observed block gets published.
//!
//! Every target keeps a [`PublishCursor`]. Each observed block bumps the count;
//! when it reaches the target's interval the count goes back to zero and a
//! [`PublishJob`] is emitted for that block. The decision depends only on the
//! cursor, the interval and the observation.

use alloy::primitives::{TxHash, B256};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU64;

use crate::publisher::types::{BlockObservation, PublishJob, TargetKey};

/// Height and hash of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRef {
    pub height: u64,
    pub hash: B256,
}

/// A confirmed publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedBlock {
    pub height: u64,
    pub hash: B256,
    pub tx_hash: TxHash,
    pub inclusion_block: u64,
}

/// Per-target counting state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishCursor {
    /// Blocks observed since the last emitted job (or since start).
    pub blocks_since_publish: u64,
    pub last_observed_height: Option<u64>,
    /// Block of the last emitted job, whatever its submission outcome.
    pub last_job: Option<BlockRef>,
    pub last_published: Option<PublishedBlock>,
}

/// Feed one observation through a cursor.
///
/// Observations at or below the last observed height are ignored, so no two jobs
/// for one target ever share a height.
pub fn advance(
    cursor: &PublishCursor,
    interval: NonZeroU64,
    target: &TargetKey,
    observation: &BlockObservation,
) -> (PublishCursor, Option<PublishJob>) {
    if cursor
        .last_observed_height
        .is_some_and(|h| observation.height <= h)
    {
        return (cursor.clone(), None);
    }

    let mut next = cursor.clone();
    next.last_observed_height = Some(observation.height);
    next.blocks_since_publish = cursor.blocks_since_publish.saturating_add(1);

    // `>=` so a persisted count above a newly lowered interval fires at once
    if next.blocks_since_publish < interval.get() {
        return (next, None);
    }

    next.blocks_since_publish = 0;
    next.last_job = Some(BlockRef {
        height: observation.height,
        hash: observation.hash,
    });
    let job = PublishJob {
        target: target.clone(),
        block: *observation,
    };
    (next, Some(job))
}

/// A target's cursor together with its interval.
#[derive(Debug, Clone)]
pub struct IntervalCounter {
    target: TargetKey,
    interval: NonZeroU64,
    cursor: PublishCursor,
}

impl IntervalCounter {
    pub fn new(target: TargetKey, interval: NonZeroU64, cursor: PublishCursor) -> Self {
        Self {
            target,
            interval,
            cursor,
        }
    }

    pub fn observe(&mut self, observation: &BlockObservation) -> Option<PublishJob> {
        let (cursor, job) = advance(&self.cursor, self.interval, &self.target, observation);
        self.cursor = cursor;
        job
    }

    pub fn target(&self) -> &TargetKey {
        &self.target
    }

    pub fn interval(&self) -> NonZeroU64 {
        self.interval
    }

    pub fn cursor(&self) -> &PublishCursor {
        &self.cursor
    }
}
