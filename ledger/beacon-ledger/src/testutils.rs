//! Deterministic validators and a block producer for tests.

// crates
use beacon_core::block::{
    BeaconBlock, BeaconBlockBody, BodyBase, Deposit, DepositData, ExecutionPayload,
    SignedBeaconBlock, SyncAggregate, Transaction,
};
use beacon_core::crypto::{
    compute_domain, compute_signing_root, sha256, BlsPublicKey, BlsSignature,
    DOMAIN_BEACON_PROPOSER, DOMAIN_DEPOSIT, DOMAIN_RANDAO, DOMAIN_SYNC_COMMITTEE,
};
use beacon_core::da::{encode_blob_transaction, kzg_commitment_to_versioned_hash, Blob, BlobsSidecar, KzgCommitment};
use beacon_core::merkle::HashTreeRoot;
use beacon_core::state::BeaconState;
use beacon_core::{ChainConfig, ForkSeq, Gwei, Root, Slot, ValidatorIndex, ZERO_HASH};
use beacon_da_verifier::blobs_sidecar;
use beacon_kzg::blob_to_kzg_commitment;
use beacon_kzg::testutils::{random_blob, MINIMAL_SETTINGS};
use bitvec::prelude::{BitVec, Lsb0};
use blst::min_pk::{AggregateSignature, SecretKey, Signature};
// internal
use crate::block::compute_timestamp_at_slot;
use crate::{
    compute_new_state_root, initialize_beacon_state, process_slots, state_transition,
    BlstVerifier, GenesisValidator, TransitionContext, TransitionOpts, DST_BLS12381,
};

pub const GENESIS_TIME: u64 = 1_600_000_000;
pub const GENESIS_ETH1_BLOCK_HASH: Root = [0x42; 32];

/// Key of validator `index`, derived from the index alone.
pub fn secret_key(index: u64) -> SecretKey {
    SecretKey::key_gen(&sha256(&index.to_le_bytes()), &[]).expect("32 bytes of key material")
}

pub fn public_key(index: u64) -> BlsPublicKey {
    BlsPublicKey(secret_key(index).sk_to_pk().compress())
}

pub fn genesis_validators(config: &ChainConfig, count: u64) -> Vec<GenesisValidator> {
    (0..count)
        .map(|index| GenesisValidator {
            pubkey: public_key(index),
            withdrawal_credentials: sha256(&index.to_be_bytes()),
            balance: config.preset().max_effective_balance,
        })
        .collect()
}

pub fn genesis_state(config: &ChainConfig, validator_count: u64) -> BeaconState {
    initialize_beacon_state(
        config,
        GENESIS_TIME,
        GENESIS_ETH1_BLOCK_HASH,
        &genesis_validators(config, validator_count),
    )
    .expect("genesis validators are active")
}

#[derive(Clone, Debug)]
pub struct ProducedBlock {
    pub block: SignedBeaconBlock,
    /// Present for blob era blocks, even without blobs.
    pub sidecar: Option<BlobsSidecar>,
    pub post_state: BeaconState,
}

/// Chain of correctly signed blocks on top of a deterministic genesis.
pub struct TestChain {
    pub config: ChainConfig,
    keys: Vec<SecretKey>,
    genesis: BeaconState,
    head_state: BeaconState,
    blocks: Vec<SignedBeaconBlock>,
}

impl TestChain {
    pub fn new(config: ChainConfig, validator_count: u64) -> Self {
        let genesis = genesis_state(&config, validator_count);
        Self {
            keys: (0..validator_count).map(secret_key).collect(),
            head_state: genesis.clone(),
            genesis,
            config,
            blocks: Vec::new(),
        }
    }

    pub fn genesis(&self) -> &BeaconState {
        &self.genesis
    }

    pub fn head_state(&self) -> &BeaconState {
        &self.head_state
    }

    pub fn blocks(&self) -> &[SignedBeaconBlock] {
        &self.blocks
    }

    pub fn sign(&self, index: ValidatorIndex, message: &Root) -> BlsSignature {
        BlsSignature(self.raw_sign(index, message).compress())
    }

    fn raw_sign(&self, index: ValidatorIndex, message: &Root) -> Signature {
        match self.keys.get(index as usize) {
            Some(key) => key.sign(message, DST_BLS12381, &[]),
            None => secret_key(index).sign(message, DST_BLS12381, &[]),
        }
    }

    /// Aggregate of every listed validator signing `message`. Repeated
    /// indices sign repeatedly.
    pub fn aggregate_sign(&self, indices: &[ValidatorIndex], message: &Root) -> BlsSignature {
        let signatures: Vec<Signature> = indices
            .iter()
            .map(|index| self.raw_sign(*index, message))
            .collect();
        if signatures.is_empty() {
            return BlsSignature::infinity();
        }
        let refs: Vec<&Signature> = signatures.iter().collect();
        let aggregate =
            AggregateSignature::aggregate(&refs, false).expect("freshly made signatures");
        BlsSignature(aggregate.to_signature().compress())
    }

    /// Deposit for the validator keyed by `key_index`, with a valid proof of
    /// possession.
    pub fn deposit(&self, key_index: u64, amount: Gwei) -> Deposit {
        let mut data = DepositData {
            pubkey: public_key(key_index),
            withdrawal_credentials: sha256(&key_index.to_be_bytes()),
            amount,
            signature: BlsSignature::empty(),
        };
        let domain = compute_domain(DOMAIN_DEPOSIT, &ZERO_HASH);
        let signing_root = compute_signing_root(&data.message(), &domain);
        data.signature = BlsSignature(
            secret_key(key_index)
                .sign(&signing_root, DST_BLS12381, &[])
                .compress(),
        );
        Deposit { data }
    }

    /// Unsigned empty block at `slot` for the head fork. Not valid on its own.
    pub fn head_block_template(&self, slot: Slot) -> BeaconBlock {
        BeaconBlock {
            slot,
            proposer_index: 0,
            parent_root: self.head_state.latest_block_header.hash_tree_root(),
            state_root: ZERO_HASH,
            body: crate::empty_block_body(self.head_state.fork, self.config.preset()),
        }
    }

    pub fn produce_block(&self, slot: Slot, blob_count: usize) -> ProducedBlock {
        self.produce_block_with(slot, blob_count, |_| {})
    }

    /// Produce the block at `slot` on top of the head. `mutate` runs after the
    /// state root is computed and before signing: the proposer signature stays
    /// valid while any state relevant change leaves the state root stale.
    pub fn produce_block_with(
        &self,
        slot: Slot,
        blob_count: usize,
        mutate: impl FnOnce(&mut BeaconBlock),
    ) -> ProducedBlock {
        let config = &self.config;
        let preset = config.preset();
        let state = process_slots(config, self.head_state.clone(), slot).expect("slot after head");
        let proposer_index = state
            .beacon_proposer_index(preset)
            .expect("active validators");
        let genesis_validators_root = state.genesis_validators_root;
        let epoch = state.current_epoch(preset);
        let randao_domain = compute_domain(DOMAIN_RANDAO, &genesis_validators_root);
        let base = BodyBase {
            randao_reveal: self.sign(proposer_index, &compute_signing_root(&epoch, &randao_domain)),
            eth1_data: state.eth1_data.clone(),
            ..Default::default()
        };
        let parent_root = state.latest_block_header.hash_tree_root();

        let blobs: Vec<Blob> = (0..blob_count)
            .map(|_| random_blob(preset.field_elements_per_blob))
            .collect();
        let commitments: Vec<KzgCommitment> = blobs
            .iter()
            .map(|blob| blob_to_kzg_commitment(blob, &MINIMAL_SETTINGS).expect("canonical blob"))
            .collect();
        let transactions: Vec<Transaction> = if commitments.is_empty() {
            Vec::new()
        } else {
            let hashes: Vec<_> = commitments
                .iter()
                .map(kzg_commitment_to_versioned_hash)
                .collect();
            vec![encode_blob_transaction(&hashes)]
        };

        let body = match state.fork {
            ForkSeq::Phase0 => BeaconBlockBody::Phase0 { base },
            ForkSeq::Altair => BeaconBlockBody::Altair {
                base,
                sync_aggregate: self.sync_aggregate(&state, parent_root),
            },
            ForkSeq::Bellatrix => BeaconBlockBody::Bellatrix {
                base,
                sync_aggregate: self.sync_aggregate(&state, parent_root),
                execution_payload: self.execution_payload(&state, Vec::new()),
            },
            ForkSeq::Capella => BeaconBlockBody::Capella {
                base,
                sync_aggregate: self.sync_aggregate(&state, parent_root),
                execution_payload: self.execution_payload(&state, Vec::new()),
            },
            ForkSeq::Eip4844 => BeaconBlockBody::Eip4844 {
                base,
                sync_aggregate: self.sync_aggregate(&state, parent_root),
                execution_payload: self.execution_payload(&state, transactions),
                blob_kzg_commitments: commitments,
            },
        };
        let mut block = BeaconBlock {
            slot,
            proposer_index,
            parent_root,
            state_root: ZERO_HASH,
            body,
        };

        let ctx = TransitionContext::new(config, &BlstVerifier);
        block.state_root =
            compute_new_state_root(ctx, self.head_state.clone(), &block).expect("valid block");
        let unsigned = SignedBeaconBlock {
            message: block.clone(),
            signature: BlsSignature::empty(),
        };
        let post_state = state_transition(
            ctx,
            self.head_state.clone(),
            &unsigned,
            None,
            TransitionOpts::trusted(),
        )
        .expect("valid block")
        .state;

        mutate(&mut block);
        let proposer_domain = compute_domain(DOMAIN_BEACON_PROPOSER, &genesis_validators_root);
        let signature = self.sign(proposer_index, &compute_signing_root(&block, &proposer_domain));
        let sidecar = block.fork().has_blobs().then(|| {
            blobs_sidecar(&block, blobs, &MINIMAL_SETTINGS).expect("blobs of the block")
        });
        ProducedBlock {
            block: SignedBeaconBlock {
                message: block,
                signature,
            },
            sidecar,
            post_state,
        }
    }

    /// Make `produced` the new head.
    pub fn import(&mut self, produced: ProducedBlock) {
        self.head_state = produced.post_state;
        self.blocks.push(produced.block);
    }

    /// Produce and import one block per slot.
    pub fn extend(
        &mut self,
        slots: impl IntoIterator<Item = u64>,
        blob_count: usize,
    ) -> Vec<ProducedBlock> {
        slots
            .into_iter()
            .map(|slot| {
                let produced = self.produce_block(Slot::new(slot), blob_count);
                self.import(produced.clone());
                produced
            })
            .collect()
    }

    /// Every sync committee member signs the previous block root.
    fn sync_aggregate(&self, state: &BeaconState, parent_root: Root) -> SyncAggregate {
        let preset = self.config.preset();
        let Some(committee) = state.current_sync_committee.as_ref() else {
            return SyncAggregate::empty(preset.sync_committee_size);
        };
        let previous_block_root = state
            .block_root_at_slot(preset, state.slot.saturating_sub(1))
            .unwrap_or(parent_root);
        let domain = compute_domain(DOMAIN_SYNC_COMMITTEE, &state.genesis_validators_root);
        let signing_root = compute_signing_root(&previous_block_root, &domain);
        SyncAggregate {
            sync_committee_bits: BitVec::<u8, Lsb0>::repeat(true, committee.members.len()),
            sync_committee_signature: self.aggregate_sign(&committee.members, &signing_root),
        }
    }

    fn execution_payload(
        &self,
        state: &BeaconState,
        transactions: Vec<Transaction>,
    ) -> ExecutionPayload {
        let preset = self.config.preset();
        let latest = state
            .latest_execution_payload_header
            .clone()
            .unwrap_or_default();
        let mut block_hash_preimage = state.slot.to_be_bytes().to_vec();
        block_hash_preimage.extend_from_slice(&latest.block_hash);
        ExecutionPayload {
            parent_hash: latest.block_hash,
            prev_randao: state.randao_mix(preset, state.current_epoch(preset)),
            block_number: latest.block_number + 1,
            gas_limit: 30_000_000,
            timestamp: compute_timestamp_at_slot(&self.config, state)
                .expect("slot timestamp fits in a u64"),
            block_hash: sha256(&block_hash_preimage),
            transactions,
            ..Default::default()
        }
    }
}
