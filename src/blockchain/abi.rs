//! Block hash receiver contract interface.

use alloy::primitives::{Bytes, LogData, B256};
use alloy::sol;
use alloy::sol_types::{SolCall, SolEvent};

sol! {
    /// Records a block hash published from a source chain.
    function receiveBlockHash(bytes32 blockHash) external;

    /// Emitted by the receiver for every recorded hash.
    #[derive(Debug)]
    event ReceiveBlockHash(bytes32 blockHash);
}

/// Calldata for `receiveBlockHash(blockHash)`.
pub fn encode_receive_block_hash(block_hash: B256) -> Bytes {
    receiveBlockHashCall {
        blockHash: block_hash,
    }
    .abi_encode()
    .into()
}

/// Block hash argument of `receiveBlockHash` calldata, if `input` is such a call.
pub fn decode_receive_block_hash(input: &[u8]) -> Option<B256> {
    receiveBlockHashCall::abi_decode(input)
        .ok()
        .map(|call| call.blockHash)
}

/// Block hash carried by a `ReceiveBlockHash` log, if `data` is one.
pub fn decode_receive_event(data: &LogData) -> Option<B256> {
    if data.topics().first() != Some(&ReceiveBlockHash::SIGNATURE_HASH) {
        return None;
    }
    ReceiveBlockHash::decode_log_data(data)
        .ok()
        .map(|event| event.blockHash)
}
