// crates
use bitvec::prelude::{BitVec, Lsb0};
use bytes::Bytes;
use rpds::VectorSync;
use sha2::{Digest as _, Sha256};
// internal
use crate::primitives::{Epoch, Root, Slot, ZERO_HASH};

/// Deterministic 32-byte commitment to a value.
///
/// Chunks are hashed pairwise with sha256, padded with zero chunks up to the
/// next power of two. Lists mix their length into the root; containers
/// merkleize the roots of their fields in declaration order.
pub trait HashTreeRoot {
    fn hash_tree_root(&self) -> Root;
}

#[must_use]
pub fn node(a: Root, b: Root) -> Root {
    let mut hasher = Sha256::new();
    hasher.update(a);
    hasher.update(b);
    hasher.finalize().into()
}

#[must_use]
pub fn merkleize(chunks: &[Root]) -> Root {
    match chunks.len() {
        0 => ZERO_HASH,
        1 => chunks[0],
        n => {
            let mut nodes = chunks.to_vec();
            nodes.resize(n.next_power_of_two(), ZERO_HASH);
            while nodes.len() > 1 {
                nodes = nodes
                    .chunks_exact(2)
                    .map(|pair| node(pair[0], pair[1]))
                    .collect();
            }
            nodes[0]
        }
    }
}

#[must_use]
pub fn mix_in_length(root: Root, length: usize) -> Root {
    let mut length_chunk = ZERO_HASH;
    length_chunk[..8].copy_from_slice(&(length as u64).to_le_bytes());
    node(root, length_chunk)
}

/// Split bytes into 32-byte chunks, zero padding the last one.
#[must_use]
pub fn pack_bytes(bytes: &[u8]) -> Vec<Root> {
    bytes
        .chunks(32)
        .map(|chunk| {
            let mut packed = ZERO_HASH;
            packed[..chunk.len()].copy_from_slice(chunk);
            packed
        })
        .collect()
}

/// Root of a container given the roots of its fields.
#[must_use]
pub fn container_root(fields: &[Root]) -> Root {
    merkleize(fields)
}

impl HashTreeRoot for Root {
    fn hash_tree_root(&self) -> Root {
        *self
    }
}

impl HashTreeRoot for u64 {
    fn hash_tree_root(&self) -> Root {
        let mut chunk = ZERO_HASH;
        chunk[..8].copy_from_slice(&self.to_le_bytes());
        chunk
    }
}

impl HashTreeRoot for u8 {
    fn hash_tree_root(&self) -> Root {
        u64::from(*self).hash_tree_root()
    }
}

impl HashTreeRoot for bool {
    fn hash_tree_root(&self) -> Root {
        let mut chunk = ZERO_HASH;
        chunk[0] = u8::from(*self);
        chunk
    }
}

impl HashTreeRoot for Slot {
    fn hash_tree_root(&self) -> Root {
        self.as_u64().hash_tree_root()
    }
}

impl HashTreeRoot for Epoch {
    fn hash_tree_root(&self) -> Root {
        self.as_u64().hash_tree_root()
    }
}

impl HashTreeRoot for Bytes {
    fn hash_tree_root(&self) -> Root {
        mix_in_length(merkleize(&pack_bytes(self)), self.len())
    }
}

impl HashTreeRoot for BitVec<u8, Lsb0> {
    fn hash_tree_root(&self) -> Root {
        mix_in_length(merkleize(&pack_bytes(self.as_raw_slice())), self.len())
    }
}

impl<T: HashTreeRoot> HashTreeRoot for Vec<T> {
    fn hash_tree_root(&self) -> Root {
        let roots: Vec<Root> = self.iter().map(HashTreeRoot::hash_tree_root).collect();
        mix_in_length(merkleize(&roots), self.len())
    }
}

impl<T: HashTreeRoot> HashTreeRoot for VectorSync<T> {
    fn hash_tree_root(&self) -> Root {
        let roots: Vec<Root> = self.iter().map(HashTreeRoot::hash_tree_root).collect();
        mix_in_length(merkleize(&roots), self.len())
    }
}

impl<T: HashTreeRoot> HashTreeRoot for Option<T> {
    fn hash_tree_root(&self) -> Root {
        self.as_ref()
            .map_or(ZERO_HASH, HashTreeRoot::hash_tree_root)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_root_height_1() {
        let leaf = 7u64.hash_tree_root();
        assert_eq!(merkleize(&[leaf]), leaf);
    }

    #[test]
    fn test_root_height_2() {
        let a = [1u8; 32];
        let b = [2u8; 32];
        assert_eq!(merkleize(&[a, b]), node(a, b));
    }

    #[test]
    fn test_root_is_zero_padded() {
        let a = [1u8; 32];
        let b = [2u8; 32];
        let c = [3u8; 32];
        assert_eq!(
            merkleize(&[a, b, c]),
            node(node(a, b), node(c, ZERO_HASH))
        );
    }

    #[test]
    fn test_list_length_is_mixed_in() {
        let short: Vec<u64> = vec![1, 2];
        let padded: Vec<u64> = vec![1, 2, 0];
        assert_ne!(short.hash_tree_root(), padded.hash_tree_root());
    }

    #[test]
    fn test_persistent_vector_matches_vec() {
        let values: Vec<u64> = vec![5, 6, 7];
        let persistent: VectorSync<u64> = values.iter().copied().collect();
        assert_eq!(values.hash_tree_root(), persistent.hash_tree_root());
    }

    #[test]
    fn test_pack_bytes_pads_last_chunk() {
        let packed = pack_bytes(&[0xff; 33]);
        assert_eq!(packed.len(), 2);
        assert_eq!(packed[1][0], 0xff);
        assert_eq!(packed[1][1..], [0u8; 31]);
    }
}
