// crates
use beacon_core::block::{
    BeaconBlockBody, BeaconBlockHeader, BodyBase, Eth1Data, ExecutionPayload, SyncAggregate,
};
use beacon_core::crypto::BlsPublicKey;
use beacon_core::merkle::HashTreeRoot;
use beacon_core::primitives::FAR_FUTURE_EPOCH;
use beacon_core::state::{BeaconState, Validator};
use beacon_core::{ChainConfig, Epoch, ForkSeq, Gwei, Preset, Root, Slot, ZERO_HASH};
use rpds::VectorSync;
// internal
use crate::slots::upgrade_state;
use crate::LedgerError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenesisValidator {
    pub pubkey: BlsPublicKey,
    pub withdrawal_credentials: Root,
    pub balance: Gwei,
}

/// Body with no operations for `fork`.
pub fn empty_block_body(fork: ForkSeq, preset: &Preset) -> BeaconBlockBody {
    let base = BodyBase::default();
    let sync_aggregate = || SyncAggregate::empty(preset.sync_committee_size);
    match fork {
        ForkSeq::Phase0 => BeaconBlockBody::Phase0 { base },
        ForkSeq::Altair => BeaconBlockBody::Altair {
            base,
            sync_aggregate: sync_aggregate(),
        },
        ForkSeq::Bellatrix => BeaconBlockBody::Bellatrix {
            base,
            sync_aggregate: sync_aggregate(),
            execution_payload: ExecutionPayload::default(),
        },
        ForkSeq::Capella => BeaconBlockBody::Capella {
            base,
            sync_aggregate: sync_aggregate(),
            execution_payload: ExecutionPayload::default(),
        },
        ForkSeq::Eip4844 => BeaconBlockBody::Eip4844 {
            base,
            sync_aggregate: sync_aggregate(),
            execution_payload: ExecutionPayload::default(),
            blob_kzg_commitments: Vec::new(),
        },
    }
}

/// Genesis state at slot 0, upgraded to whatever fork the config schedules
/// for epoch 0. Validators deposited with the maximum effective balance are
/// active immediately.
pub fn initialize_beacon_state(
    config: &ChainConfig,
    genesis_time: u64,
    eth1_block_hash: Root,
    genesis_validators: &[GenesisValidator],
) -> Result<BeaconState, LedgerError> {
    let preset = config.preset();
    let genesis_epoch = Epoch::new(0);
    let validators: VectorSync<Validator> = genesis_validators
        .iter()
        .map(|deposit| {
            let effective_balance = (deposit.balance
                - deposit.balance % preset.effective_balance_increment)
                .min(preset.max_effective_balance);
            let activation_epoch = if effective_balance == preset.max_effective_balance {
                genesis_epoch
            } else {
                FAR_FUTURE_EPOCH
            };
            Validator::new(
                deposit.pubkey,
                deposit.withdrawal_credentials,
                effective_balance,
                activation_epoch,
            )
        })
        .collect();
    if !validators
        .iter()
        .any(|validator| validator.is_active(genesis_epoch))
    {
        return Err(LedgerError::NoActiveValidators);
    }

    let zero_roots = |len: u64| (0..len).map(|_| ZERO_HASH).collect::<VectorSync<Root>>();
    let deposit_count = genesis_validators.len() as u64;
    let mut state = BeaconState {
        fork: ForkSeq::Phase0,
        genesis_time,
        genesis_validators_root: validators.hash_tree_root(),
        slot: Slot::genesis(),
        latest_block_header: BeaconBlockHeader {
            body_root: empty_block_body(ForkSeq::Phase0, preset).hash_tree_root(),
            ..Default::default()
        },
        block_roots: zero_roots(preset.slots_per_historical_root),
        state_roots: zero_roots(preset.slots_per_historical_root),
        historical_roots: VectorSync::new_sync(),
        eth1_data: Eth1Data {
            deposit_root: ZERO_HASH,
            deposit_count,
            block_hash: eth1_block_hash,
        },
        eth1_data_votes: VectorSync::new_sync(),
        eth1_deposit_index: deposit_count,
        balances: genesis_validators
            .iter()
            .map(|deposit| deposit.balance)
            .collect(),
        validators,
        randao_mixes: (0..preset.epochs_per_historical_vector)
            .map(|_| eth1_block_hash)
            .collect(),
        slashings: (0..preset.epochs_per_slashings_vector).map(|_| 0).collect(),
        previous_epoch_attestations: VectorSync::new_sync(),
        current_epoch_attestations: VectorSync::new_sync(),
        previous_epoch_participation: VectorSync::new_sync(),
        current_epoch_participation: VectorSync::new_sync(),
        current_sync_committee: None,
        next_sync_committee: None,
        latest_execution_payload_header: None,
    };
    upgrade_state(config, &mut state);
    if state.fork != ForkSeq::Phase0 {
        state.latest_block_header.body_root =
            empty_block_body(state.fork, preset).hash_tree_root();
    }
    tracing::info!(
        fork = %state.fork,
        validators = state.validators.len(),
        root = %const_hex::encode(state.genesis_validators_root),
        "initialized genesis state"
    );
    Ok(state)
}
