mod accessors;

pub use accessors::integer_sqrt;

// crates
use rpds::VectorSync;
use serde::{Deserialize, Serialize};
// internal
use crate::block::operations::Bits;
use crate::block::{AttestationData, BeaconBlockHeader, Eth1Data, ExecutionPayloadHeader};
use crate::crypto::BlsPublicKey;
use crate::fork::ForkSeq;
use crate::merkle::{container_root, HashTreeRoot};
use crate::primitives::{Epoch, Gwei, Root, Slot, ValidatorIndex, FAR_FUTURE_EPOCH};

pub const TIMELY_SOURCE_FLAG_INDEX: u8 = 0;
pub const TIMELY_TARGET_FLAG_INDEX: u8 = 1;
pub const TIMELY_HEAD_FLAG_INDEX: u8 = 2;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub pubkey: BlsPublicKey,
    pub withdrawal_credentials: Root,
    pub effective_balance: Gwei,
    pub slashed: bool,
    pub activation_eligibility_epoch: Epoch,
    pub activation_epoch: Epoch,
    pub exit_epoch: Epoch,
    pub withdrawable_epoch: Epoch,
}

impl Validator {
    /// Validator created by a deposit, active from `activation_epoch`.
    pub fn new(
        pubkey: BlsPublicKey,
        withdrawal_credentials: Root,
        effective_balance: Gwei,
        activation_epoch: Epoch,
    ) -> Self {
        Self {
            pubkey,
            withdrawal_credentials,
            effective_balance,
            slashed: false,
            activation_eligibility_epoch: activation_epoch,
            activation_epoch,
            exit_epoch: FAR_FUTURE_EPOCH,
            withdrawable_epoch: FAR_FUTURE_EPOCH,
        }
    }

    pub fn is_active(&self, epoch: Epoch) -> bool {
        self.activation_epoch <= epoch && epoch < self.exit_epoch
    }

    pub fn is_slashable(&self, epoch: Epoch) -> bool {
        !self.slashed && self.activation_epoch <= epoch && epoch < self.withdrawable_epoch
    }
}

impl HashTreeRoot for Validator {
    fn hash_tree_root(&self) -> Root {
        container_root(&[
            self.pubkey.hash_tree_root(),
            self.withdrawal_credentials,
            self.effective_balance.hash_tree_root(),
            self.slashed.hash_tree_root(),
            self.activation_eligibility_epoch.hash_tree_root(),
            self.activation_epoch.hash_tree_root(),
            self.exit_epoch.hash_tree_root(),
            self.withdrawable_epoch.hash_tree_root(),
        ])
    }
}

/// Attestation recorded for epoch processing before participation flags
/// replaced them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAttestation {
    pub aggregation_bits: Bits,
    pub data: AttestationData,
    pub inclusion_delay: u64,
    pub proposer_index: ValidatorIndex,
}

impl HashTreeRoot for PendingAttestation {
    fn hash_tree_root(&self) -> Root {
        container_root(&[
            self.aggregation_bits.hash_tree_root(),
            self.data.hash_tree_root(),
            self.inclusion_delay.hash_tree_root(),
            self.proposer_index.hash_tree_root(),
        ])
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCommittee {
    pub members: Vec<ValidatorIndex>,
}

impl HashTreeRoot for SyncCommittee {
    fn hash_tree_root(&self) -> Root {
        container_root(&[self.members.hash_tree_root()])
    }
}

/// Consensus state. Every collection is a persistent vector so clones share
/// structure and a transition can consume one handle and return another.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconState {
    pub fork: ForkSeq,
    pub genesis_time: u64,
    pub genesis_validators_root: Root,
    pub slot: Slot,
    pub latest_block_header: BeaconBlockHeader,
    pub block_roots: VectorSync<Root>,
    pub state_roots: VectorSync<Root>,
    pub historical_roots: VectorSync<Root>,
    pub eth1_data: Eth1Data,
    pub eth1_data_votes: VectorSync<Eth1Data>,
    pub eth1_deposit_index: u64,
    pub validators: VectorSync<Validator>,
    pub balances: VectorSync<Gwei>,
    pub randao_mixes: VectorSync<Root>,
    pub slashings: VectorSync<Gwei>,
    pub previous_epoch_attestations: VectorSync<PendingAttestation>,
    pub current_epoch_attestations: VectorSync<PendingAttestation>,
    pub previous_epoch_participation: VectorSync<u8>,
    pub current_epoch_participation: VectorSync<u8>,
    pub current_sync_committee: Option<SyncCommittee>,
    pub next_sync_committee: Option<SyncCommittee>,
    pub latest_execution_payload_header: Option<ExecutionPayloadHeader>,
}

impl HashTreeRoot for BeaconState {
    fn hash_tree_root(&self) -> Root {
        let mut fields = vec![
            (self.fork as u64).hash_tree_root(),
            self.genesis_time.hash_tree_root(),
            self.genesis_validators_root,
            self.slot.hash_tree_root(),
            self.latest_block_header.hash_tree_root(),
            self.block_roots.hash_tree_root(),
            self.state_roots.hash_tree_root(),
            self.historical_roots.hash_tree_root(),
            self.eth1_data.hash_tree_root(),
            self.eth1_data_votes.hash_tree_root(),
            self.eth1_deposit_index.hash_tree_root(),
            self.validators.hash_tree_root(),
            self.balances.hash_tree_root(),
            self.randao_mixes.hash_tree_root(),
            self.slashings.hash_tree_root(),
        ];
        if self.fork.has_sync_committee() {
            fields.extend([
                self.previous_epoch_participation.hash_tree_root(),
                self.current_epoch_participation.hash_tree_root(),
                self.current_sync_committee.hash_tree_root(),
                self.next_sync_committee.hash_tree_root(),
            ]);
        } else {
            fields.extend([
                self.previous_epoch_attestations.hash_tree_root(),
                self.current_epoch_attestations.hash_tree_root(),
            ]);
        }
        if self.fork.has_execution() {
            fields.push(self.latest_execution_payload_header.hash_tree_root());
        }
        container_root(&fields)
    }
}
