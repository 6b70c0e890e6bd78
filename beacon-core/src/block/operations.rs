// crates
use bitvec::prelude::{BitVec, Lsb0};
use serde::{Deserialize, Serialize};
// internal
use super::SignedBeaconBlockHeader;
use crate::crypto::{BlsPublicKey, BlsSignature};
use crate::merkle::{container_root, HashTreeRoot};
use crate::primitives::{Epoch, Gwei, Root, Slot, ValidatorIndex};

pub type Bits = BitVec<u8, Lsb0>;

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Eth1Data {
    pub deposit_root: Root,
    pub deposit_count: u64,
    pub block_hash: Root,
}

impl HashTreeRoot for Eth1Data {
    fn hash_tree_root(&self) -> Root {
        container_root(&[
            self.deposit_root,
            self.deposit_count.hash_tree_root(),
            self.block_hash,
        ])
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checkpoint {
    pub epoch: Epoch,
    pub root: Root,
}

impl HashTreeRoot for Checkpoint {
    fn hash_tree_root(&self) -> Root {
        container_root(&[self.epoch.hash_tree_root(), self.root])
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttestationData {
    pub slot: Slot,
    pub index: u64,
    pub beacon_block_root: Root,
    pub source: Checkpoint,
    pub target: Checkpoint,
}

impl HashTreeRoot for AttestationData {
    fn hash_tree_root(&self) -> Root {
        container_root(&[
            self.slot.hash_tree_root(),
            self.index.hash_tree_root(),
            self.beacon_block_root,
            self.source.hash_tree_root(),
            self.target.hash_tree_root(),
        ])
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    pub aggregation_bits: Bits,
    pub data: AttestationData,
    pub signature: BlsSignature,
}

impl HashTreeRoot for Attestation {
    fn hash_tree_root(&self) -> Root {
        container_root(&[
            self.aggregation_bits.hash_tree_root(),
            self.data.hash_tree_root(),
            self.signature.hash_tree_root(),
        ])
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedAttestation {
    pub attesting_indices: Vec<ValidatorIndex>,
    pub data: AttestationData,
    pub signature: BlsSignature,
}

impl HashTreeRoot for IndexedAttestation {
    fn hash_tree_root(&self) -> Root {
        container_root(&[
            self.attesting_indices.hash_tree_root(),
            self.data.hash_tree_root(),
            self.signature.hash_tree_root(),
        ])
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposerSlashing {
    pub signed_header_1: SignedBeaconBlockHeader,
    pub signed_header_2: SignedBeaconBlockHeader,
}

impl HashTreeRoot for ProposerSlashing {
    fn hash_tree_root(&self) -> Root {
        container_root(&[
            self.signed_header_1.hash_tree_root(),
            self.signed_header_2.hash_tree_root(),
        ])
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttesterSlashing {
    pub attestation_1: IndexedAttestation,
    pub attestation_2: IndexedAttestation,
}

impl HashTreeRoot for AttesterSlashing {
    fn hash_tree_root(&self) -> Root {
        container_root(&[
            self.attestation_1.hash_tree_root(),
            self.attestation_2.hash_tree_root(),
        ])
    }
}

/// The part of a deposit the depositor signs as proof of possession.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositMessage {
    pub pubkey: BlsPublicKey,
    pub withdrawal_credentials: Root,
    pub amount: Gwei,
}

impl HashTreeRoot for DepositMessage {
    fn hash_tree_root(&self) -> Root {
        container_root(&[
            self.pubkey.hash_tree_root(),
            self.withdrawal_credentials,
            self.amount.hash_tree_root(),
        ])
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositData {
    pub pubkey: BlsPublicKey,
    pub withdrawal_credentials: Root,
    pub amount: Gwei,
    pub signature: BlsSignature,
}

impl DepositData {
    pub fn message(&self) -> DepositMessage {
        DepositMessage {
            pubkey: self.pubkey,
            withdrawal_credentials: self.withdrawal_credentials,
            amount: self.amount,
        }
    }
}

impl HashTreeRoot for DepositData {
    fn hash_tree_root(&self) -> Root {
        container_root(&[
            self.pubkey.hash_tree_root(),
            self.withdrawal_credentials,
            self.amount.hash_tree_root(),
            self.signature.hash_tree_root(),
        ])
    }
}

/// Deposit already accepted by the eth1 bridge. Inclusion proofs against the
/// deposit contract root are checked by the eth1 follower, not here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposit {
    pub data: DepositData,
}

impl HashTreeRoot for Deposit {
    fn hash_tree_root(&self) -> Root {
        container_root(&[self.data.hash_tree_root()])
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoluntaryExit {
    pub epoch: Epoch,
    pub validator_index: ValidatorIndex,
}

impl HashTreeRoot for VoluntaryExit {
    fn hash_tree_root(&self) -> Root {
        container_root(&[
            self.epoch.hash_tree_root(),
            self.validator_index.hash_tree_root(),
        ])
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedVoluntaryExit {
    pub message: VoluntaryExit,
    pub signature: BlsSignature,
}

impl HashTreeRoot for SignedVoluntaryExit {
    fn hash_tree_root(&self) -> Root {
        container_root(&[
            self.message.hash_tree_root(),
            self.signature.hash_tree_root(),
        ])
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncAggregate {
    pub sync_committee_bits: Bits,
    pub sync_committee_signature: BlsSignature,
}

impl SyncAggregate {
    /// Aggregate with no participants, carrying the point at infinity.
    pub fn empty(sync_committee_size: usize) -> Self {
        Self {
            sync_committee_bits: BitVec::repeat(false, sync_committee_size),
            sync_committee_signature: BlsSignature::infinity(),
        }
    }
}

impl HashTreeRoot for SyncAggregate {
    fn hash_tree_root(&self) -> Root {
        container_root(&[
            self.sync_committee_bits.hash_tree_root(),
            self.sync_committee_signature.hash_tree_root(),
        ])
    }
}
