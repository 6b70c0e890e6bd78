pub mod execution;
pub mod operations;

// crates
use serde::{Deserialize, Serialize};
// internal
use crate::crypto::BlsSignature;
use crate::da::KzgCommitment;
use crate::fork::ForkSeq;
use crate::merkle::{container_root, HashTreeRoot};
use crate::primitives::{Root, Slot, ValidatorIndex};
pub use execution::{ExecutionPayload, ExecutionPayloadHeader, Transaction};
pub use operations::{
    Attestation, AttestationData, AttesterSlashing, Checkpoint, Deposit, DepositData,
    DepositMessage, Eth1Data, IndexedAttestation, ProposerSlashing, SignedVoluntaryExit,
    SyncAggregate, VoluntaryExit,
};

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BeaconBlockHeader {
    pub slot: Slot,
    pub proposer_index: ValidatorIndex,
    pub parent_root: Root,
    pub state_root: Root,
    pub body_root: Root,
}

impl HashTreeRoot for BeaconBlockHeader {
    fn hash_tree_root(&self) -> Root {
        container_root(&[
            self.slot.hash_tree_root(),
            self.proposer_index.hash_tree_root(),
            self.parent_root,
            self.state_root,
            self.body_root,
        ])
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedBeaconBlockHeader {
    pub message: BeaconBlockHeader,
    pub signature: BlsSignature,
}

impl HashTreeRoot for SignedBeaconBlockHeader {
    fn hash_tree_root(&self) -> Root {
        container_root(&[
            self.message.hash_tree_root(),
            self.signature.hash_tree_root(),
        ])
    }
}

/// Body fields present in every fork.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyBase {
    pub randao_reveal: BlsSignature,
    pub eth1_data: Eth1Data,
    pub graffiti: Root,
    pub proposer_slashings: Vec<ProposerSlashing>,
    pub attester_slashings: Vec<AttesterSlashing>,
    pub attestations: Vec<Attestation>,
    pub deposits: Vec<Deposit>,
    pub voluntary_exits: Vec<SignedVoluntaryExit>,
}

impl BodyBase {
    fn field_roots(&self) -> Vec<Root> {
        vec![
            self.randao_reveal.hash_tree_root(),
            self.eth1_data.hash_tree_root(),
            self.graffiti,
            self.proposer_slashings.hash_tree_root(),
            self.attester_slashings.hash_tree_root(),
            self.attestations.hash_tree_root(),
            self.deposits.hash_tree_root(),
            self.voluntary_exits.hash_tree_root(),
        ]
    }
}

/// Fork tagged block body. Each variant carries the base fields plus what
/// its fork introduced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BeaconBlockBody {
    Phase0 {
        base: BodyBase,
    },
    Altair {
        base: BodyBase,
        sync_aggregate: SyncAggregate,
    },
    Bellatrix {
        base: BodyBase,
        sync_aggregate: SyncAggregate,
        execution_payload: ExecutionPayload,
    },
    Capella {
        base: BodyBase,
        sync_aggregate: SyncAggregate,
        execution_payload: ExecutionPayload,
    },
    Eip4844 {
        base: BodyBase,
        sync_aggregate: SyncAggregate,
        execution_payload: ExecutionPayload,
        blob_kzg_commitments: Vec<KzgCommitment>,
    },
}

impl BeaconBlockBody {
    pub fn fork(&self) -> ForkSeq {
        match self {
            BeaconBlockBody::Phase0 { .. } => ForkSeq::Phase0,
            BeaconBlockBody::Altair { .. } => ForkSeq::Altair,
            BeaconBlockBody::Bellatrix { .. } => ForkSeq::Bellatrix,
            BeaconBlockBody::Capella { .. } => ForkSeq::Capella,
            BeaconBlockBody::Eip4844 { .. } => ForkSeq::Eip4844,
        }
    }

    pub fn base(&self) -> &BodyBase {
        match self {
            BeaconBlockBody::Phase0 { base }
            | BeaconBlockBody::Altair { base, .. }
            | BeaconBlockBody::Bellatrix { base, .. }
            | BeaconBlockBody::Capella { base, .. }
            | BeaconBlockBody::Eip4844 { base, .. } => base,
        }
    }

    pub fn base_mut(&mut self) -> &mut BodyBase {
        match self {
            BeaconBlockBody::Phase0 { base }
            | BeaconBlockBody::Altair { base, .. }
            | BeaconBlockBody::Bellatrix { base, .. }
            | BeaconBlockBody::Capella { base, .. }
            | BeaconBlockBody::Eip4844 { base, .. } => base,
        }
    }

    pub fn sync_aggregate(&self) -> Option<&SyncAggregate> {
        match self {
            BeaconBlockBody::Phase0 { .. } => None,
            BeaconBlockBody::Altair { sync_aggregate, .. }
            | BeaconBlockBody::Bellatrix { sync_aggregate, .. }
            | BeaconBlockBody::Capella { sync_aggregate, .. }
            | BeaconBlockBody::Eip4844 { sync_aggregate, .. } => Some(sync_aggregate),
        }
    }

    pub fn execution_payload(&self) -> Option<&ExecutionPayload> {
        match self {
            BeaconBlockBody::Phase0 { .. } | BeaconBlockBody::Altair { .. } => None,
            BeaconBlockBody::Bellatrix {
                execution_payload, ..
            }
            | BeaconBlockBody::Capella {
                execution_payload, ..
            }
            | BeaconBlockBody::Eip4844 {
                execution_payload, ..
            } => Some(execution_payload),
        }
    }

    pub fn execution_payload_mut(&mut self) -> Option<&mut ExecutionPayload> {
        match self {
            BeaconBlockBody::Phase0 { .. } | BeaconBlockBody::Altair { .. } => None,
            BeaconBlockBody::Bellatrix {
                execution_payload, ..
            }
            | BeaconBlockBody::Capella {
                execution_payload, ..
            }
            | BeaconBlockBody::Eip4844 {
                execution_payload, ..
            } => Some(execution_payload),
        }
    }

    pub fn blob_kzg_commitments(&self) -> Option<&[KzgCommitment]> {
        match self {
            BeaconBlockBody::Eip4844 {
                blob_kzg_commitments,
                ..
            } => Some(blob_kzg_commitments),
            _ => None,
        }
    }
}

impl HashTreeRoot for BeaconBlockBody {
    fn hash_tree_root(&self) -> Root {
        let mut fields = self.base().field_roots();
        if let Some(sync_aggregate) = self.sync_aggregate() {
            fields.push(sync_aggregate.hash_tree_root());
        }
        if let Some(payload) = self.execution_payload() {
            fields.push(payload.hash_tree_root());
        }
        if let Some(commitments) = self.blob_kzg_commitments() {
            fields.push(commitments.to_vec().hash_tree_root());
        }
        container_root(&fields)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconBlock {
    pub slot: Slot,
    pub proposer_index: ValidatorIndex,
    pub parent_root: Root,
    pub state_root: Root,
    pub body: BeaconBlockBody,
}

impl BeaconBlock {
    pub fn fork(&self) -> ForkSeq {
        self.body.fork()
    }

    pub fn to_header(&self) -> BeaconBlockHeader {
        BeaconBlockHeader {
            slot: self.slot,
            proposer_index: self.proposer_index,
            parent_root: self.parent_root,
            state_root: self.state_root,
            body_root: self.body.hash_tree_root(),
        }
    }
}

impl HashTreeRoot for BeaconBlock {
    fn hash_tree_root(&self) -> Root {
        self.to_header().hash_tree_root()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedBeaconBlock {
    pub message: BeaconBlock,
    pub signature: BlsSignature,
}

impl SignedBeaconBlock {
    pub fn slot(&self) -> Slot {
        self.message.slot
    }

    pub fn block_root(&self) -> Root {
        self.message.hash_tree_root()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire;

    fn block(body: BeaconBlockBody) -> BeaconBlock {
        BeaconBlock {
            slot: Slot::new(11),
            proposer_index: 3,
            parent_root: [1; 32],
            state_root: [2; 32],
            body,
        }
    }

    #[test]
    fn block_and_header_share_root() {
        let block = block(BeaconBlockBody::Phase0 {
            base: BodyBase::default(),
        });
        assert_eq!(block.hash_tree_root(), block.to_header().hash_tree_root());
    }

    #[test]
    fn fork_fields_change_body_root() {
        let altair = BeaconBlockBody::Altair {
            base: BodyBase::default(),
            sync_aggregate: SyncAggregate::empty(32),
        };
        let phase0 = BeaconBlockBody::Phase0 {
            base: BodyBase::default(),
        };
        assert_ne!(altair.hash_tree_root(), phase0.hash_tree_root());
        assert_eq!(altair.fork(), ForkSeq::Altair);
        assert!(altair.execution_payload().is_none());
    }

    #[test]
    fn blob_body_accessors() {
        let commitments = vec![KzgCommitment([1; 48]), KzgCommitment([2; 48])];
        let body = BeaconBlockBody::Eip4844 {
            base: BodyBase::default(),
            sync_aggregate: SyncAggregate::empty(32),
            execution_payload: ExecutionPayload::default(),
            blob_kzg_commitments: commitments.clone(),
        };
        assert_eq!(body.blob_kzg_commitments(), Some(commitments.as_slice()));
        assert!(body.fork().has_blobs());
    }

    #[test]
    fn signed_block_wire_roundtrip() {
        let signed = SignedBeaconBlock {
            message: block(BeaconBlockBody::Altair {
                base: BodyBase::default(),
                sync_aggregate: SyncAggregate::empty(32),
            }),
            signature: BlsSignature::infinity(),
        };
        let bytes = wire::serialize(&signed).unwrap();
        let decoded: SignedBeaconBlock = wire::deserialize(&bytes).unwrap();
        assert_eq!(decoded, signed);
        assert_eq!(decoded.block_root(), signed.block_root());
    }
}
