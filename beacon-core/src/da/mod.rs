pub mod transaction;

// crates
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
// internal
use crate::crypto::sha256;
use crate::merkle::{container_root, HashTreeRoot};
use crate::primitives::{Root, Slot};
use crate::{serialize_bytes_newtype, wire};
pub use transaction::{
    encode_blob_transaction, tx_peek_blob_versioned_hashes, TxParseError, BLOB_TX_TYPE,
};

pub const KZG_COMMITMENT_SIZE: usize = 48;
pub const KZG_PROOF_SIZE: usize = 48;
pub const VERSIONED_HASH_VERSION_KZG: u8 = 0x01;

/// Evaluation form of a blob polynomial, `FIELD_ELEMENTS_PER_BLOB` 32-byte
/// little endian scalars.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Blob(pub Bytes);

/// Compressed G1 commitment to a blob polynomial.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KzgCommitment(pub [u8; KZG_COMMITMENT_SIZE]);

/// Compressed G1 opening proof.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KzgProof(pub [u8; KZG_PROOF_SIZE]);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VersionedHash(pub [u8; 32]);

serialize_bytes_newtype!(KzgCommitment);
serialize_bytes_newtype!(KzgProof);
serialize_bytes_newtype!(VersionedHash);

impl Blob {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Blob {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Bytes::from(bytes))
    }
}

impl AsRef<[u8]> for KzgCommitment {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for KzgProof {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl HashTreeRoot for Blob {
    fn hash_tree_root(&self) -> Root {
        self.0.hash_tree_root()
    }
}

fn bytes48_root(bytes: &[u8; 48]) -> Root {
    let mut low = [0u8; 32];
    let mut high = [0u8; 32];
    low.copy_from_slice(&bytes[..32]);
    high[..16].copy_from_slice(&bytes[32..]);
    container_root(&[low, high])
}

impl HashTreeRoot for KzgCommitment {
    fn hash_tree_root(&self) -> Root {
        bytes48_root(&self.0)
    }
}

impl HashTreeRoot for KzgProof {
    fn hash_tree_root(&self) -> Root {
        bytes48_root(&self.0)
    }
}

/// `[VERSIONED_HASH_VERSION_KZG] ++ sha256(commitment)[1..]`
#[must_use]
pub fn kzg_commitment_to_versioned_hash(commitment: &KzgCommitment) -> VersionedHash {
    let mut hash = sha256(&commitment.0);
    hash[0] = VERSIONED_HASH_VERSION_KZG;
    VersionedHash(hash)
}

/// Out of block carrier of the blobs committed to by a single block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobsSidecar {
    pub beacon_block_root: Root,
    pub beacon_block_slot: Slot,
    pub blobs: Vec<Blob>,
    pub kzg_aggregated_proof: KzgProof,
}

impl BlobsSidecar {
    pub fn encode(&self) -> Result<Bytes, wire::Error> {
        wire::serialize(self).map(Bytes::from)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, wire::Error> {
        wire::deserialize(bytes)
    }
}

impl HashTreeRoot for BlobsSidecar {
    fn hash_tree_root(&self) -> Root {
        container_root(&[
            self.beacon_block_root,
            self.beacon_block_slot.hash_tree_root(),
            self.blobs.hash_tree_root(),
            self.kzg_aggregated_proof.hash_tree_root(),
        ])
    }
}

/// Asynchronous retrieval of the sidecar accompanying a block.
#[async_trait]
pub trait SidecarFetcher: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn fetch_sidecar(&self, block_root: Root) -> Result<Option<BlobsSidecar>, Self::Error>;
}

#[async_trait]
impl<T: SidecarFetcher + ?Sized> SidecarFetcher for std::sync::Arc<T> {
    type Error = T::Error;

    async fn fetch_sidecar(&self, block_root: Root) -> Result<Option<BlobsSidecar>, Self::Error> {
        (**self).fetch_sidecar(block_root).await
    }
}
