// crates
use sha2::{Digest as _, Sha256};
// internal
use crate::merkle::{container_root, HashTreeRoot};
use crate::primitives::Root;
use crate::serialize_bytes_newtype;

pub const BLS_PUBLIC_KEY_SIZE: usize = 48;
pub const BLS_SIGNATURE_SIZE: usize = 96;

/// Compressed BLS12-381 G1 public key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlsPublicKey(pub [u8; BLS_PUBLIC_KEY_SIZE]);

/// Compressed BLS12-381 G2 signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlsSignature(pub [u8; BLS_SIGNATURE_SIZE]);

serialize_bytes_newtype!(BlsPublicKey);
serialize_bytes_newtype!(BlsSignature);

impl BlsPublicKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl BlsSignature {
    pub fn empty() -> Self {
        Self([0; BLS_SIGNATURE_SIZE])
    }

    /// Compressed G2 point at infinity, the aggregate of no signatures.
    pub fn infinity() -> Self {
        let mut bytes = [0; BLS_SIGNATURE_SIZE];
        bytes[0] = 0xc0;
        Self(bytes)
    }

    pub fn is_infinity(&self) -> bool {
        *self == Self::infinity()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Default for BlsSignature {
    fn default() -> Self {
        Self::empty()
    }
}

impl HashTreeRoot for BlsPublicKey {
    fn hash_tree_root(&self) -> Root {
        let mut low = [0u8; 32];
        let mut high = [0u8; 32];
        low.copy_from_slice(&self.0[..32]);
        high[..16].copy_from_slice(&self.0[32..]);
        container_root(&[low, high])
    }
}

impl HashTreeRoot for BlsSignature {
    fn hash_tree_root(&self) -> Root {
        let mut chunks = [[0u8; 32]; 3];
        for (chunk, bytes) in chunks.iter_mut().zip(self.0.chunks(32)) {
            chunk.copy_from_slice(bytes);
        }
        container_root(&chunks)
    }
}

#[must_use]
pub fn sha256(data: &[u8]) -> Root {
    Sha256::digest(data).into()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DomainType(pub [u8; 4]);

pub const DOMAIN_BEACON_PROPOSER: DomainType = DomainType([0, 0, 0, 0]);
pub const DOMAIN_BEACON_ATTESTER: DomainType = DomainType([1, 0, 0, 0]);
pub const DOMAIN_RANDAO: DomainType = DomainType([2, 0, 0, 0]);
pub const DOMAIN_DEPOSIT: DomainType = DomainType([3, 0, 0, 0]);
pub const DOMAIN_VOLUNTARY_EXIT: DomainType = DomainType([4, 0, 0, 0]);
pub const DOMAIN_SYNC_COMMITTEE: DomainType = DomainType([7, 0, 0, 0]);

pub type Domain = [u8; 32];

/// Signature domain: the domain type followed by the leading bytes of the
/// genesis validators root.
#[must_use]
pub fn compute_domain(domain_type: DomainType, genesis_validators_root: &Root) -> Domain {
    let mut domain = [0u8; 32];
    domain[..4].copy_from_slice(&domain_type.0);
    domain[4..].copy_from_slice(&genesis_validators_root[..28]);
    domain
}

#[must_use]
pub fn compute_signing_root<T: HashTreeRoot + ?Sized>(object: &T, domain: &Domain) -> Root {
    let mut hasher = Sha256::new();
    hasher.update(object.hash_tree_root());
    hasher.update(domain);
    hasher.finalize().into()
}
