// crates
use bytes::Bytes;
use serde::{Deserialize, Serialize};
// internal
use crate::merkle::{container_root, pack_bytes, merkleize, HashTreeRoot};
use crate::primitives::{Root, ZERO_HASH};

pub type Transaction = Bytes;
pub type ExecutionAddress = [u8; 20];

fn address_root(address: &ExecutionAddress) -> Root {
    let mut chunk = ZERO_HASH;
    chunk[..20].copy_from_slice(address);
    chunk
}

fn bloom_root(bloom: &Bytes) -> Root {
    merkleize(&pack_bytes(bloom))
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPayload {
    pub parent_hash: Root,
    pub fee_recipient: ExecutionAddress,
    pub state_root: Root,
    pub receipts_root: Root,
    pub logs_bloom: Bytes,
    pub prev_randao: Root,
    pub block_number: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub timestamp: u64,
    pub extra_data: Bytes,
    pub base_fee_per_gas: u64,
    pub block_hash: Root,
    pub transactions: Vec<Transaction>,
}

/// Execution payload with the transaction list replaced by its root, kept in
/// the beacon state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPayloadHeader {
    pub parent_hash: Root,
    pub fee_recipient: ExecutionAddress,
    pub state_root: Root,
    pub receipts_root: Root,
    pub logs_bloom: Bytes,
    pub prev_randao: Root,
    pub block_number: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub timestamp: u64,
    pub extra_data: Bytes,
    pub base_fee_per_gas: u64,
    pub block_hash: Root,
    pub transactions_root: Root,
}

impl ExecutionPayload {
    pub fn to_header(&self) -> ExecutionPayloadHeader {
        ExecutionPayloadHeader {
            parent_hash: self.parent_hash,
            fee_recipient: self.fee_recipient,
            state_root: self.state_root,
            receipts_root: self.receipts_root,
            logs_bloom: self.logs_bloom.clone(),
            prev_randao: self.prev_randao,
            block_number: self.block_number,
            gas_limit: self.gas_limit,
            gas_used: self.gas_used,
            timestamp: self.timestamp,
            extra_data: self.extra_data.clone(),
            base_fee_per_gas: self.base_fee_per_gas,
            block_hash: self.block_hash,
            transactions_root: self.transactions.hash_tree_root(),
        }
    }
}

impl HashTreeRoot for ExecutionPayload {
    fn hash_tree_root(&self) -> Root {
        self.to_header().hash_tree_root()
    }
}

impl HashTreeRoot for ExecutionPayloadHeader {
    fn hash_tree_root(&self) -> Root {
        container_root(&[
            self.parent_hash,
            address_root(&self.fee_recipient),
            self.state_root,
            self.receipts_root,
            bloom_root(&self.logs_bloom),
            self.prev_randao,
            self.block_number.hash_tree_root(),
            self.gas_limit.hash_tree_root(),
            self.gas_used.hash_tree_root(),
            self.timestamp.hash_tree_root(),
            self.extra_data.hash_tree_root(),
            self.base_fee_per_gas.hash_tree_root(),
            self.block_hash,
            self.transactions_root,
        ])
    }
}

impl ExecutionPayloadHeader {
    /// The default header marks a state whose execution layer has not merged.
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}
