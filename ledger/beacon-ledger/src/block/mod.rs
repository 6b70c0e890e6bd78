mod operations;

// crates
use beacon_core::block::{
    BeaconBlock, BeaconBlockHeader, Eth1Data, ExecutionPayload, SyncAggregate,
};
use beacon_core::crypto::{
    compute_domain, compute_signing_root, sha256, BlsPublicKey, DOMAIN_RANDAO,
    DOMAIN_SYNC_COMMITTEE,
};
use beacon_core::da::{BlobsSidecar, KzgCommitment};
use beacon_core::merkle::HashTreeRoot;
use beacon_core::primitives::FAR_FUTURE_EPOCH;
use beacon_core::state::BeaconState;
use beacon_core::{ChainConfig, Preset, ValidatorIndex, ZERO_HASH};
use beacon_da_verifier::{verify_kzg_commitments_against_transactions, DataAvailability};
// internal
use crate::epoch::compute_activation_exit_epoch;
use crate::signature::eth_fast_aggregate_verify;
use crate::{LedgerError, SignatureKind, TransitionContext, TransitionOpts};
pub(crate) use operations::process_operations;

const MIN_VALIDATOR_WITHDRAWABILITY_DELAY: u64 = 256;

pub(crate) const SYNC_REWARD_WEIGHT: u64 = 2;
pub(crate) const PROPOSER_WEIGHT: u64 = 8;
pub(crate) const WEIGHT_DENOMINATOR: u64 = 64;

/// Apply `block` to a state already advanced to the block slot. Returns the
/// data availability outcome of blob carrying blocks when blobs were checked.
pub fn process_block(
    ctx: TransitionContext<'_>,
    state: &mut BeaconState,
    block: &BeaconBlock,
    sidecar: Option<&BlobsSidecar>,
    opts: TransitionOpts,
) -> Result<Option<DataAvailability>, LedgerError> {
    if block.fork() != state.fork {
        return Err(LedgerError::ForkMismatch {
            state: state.fork,
            block: block.fork(),
        });
    }
    let preset = ctx.config.preset();
    process_block_header(preset, state, block)?;
    if let Some(payload) = block.body.execution_payload() {
        if is_execution_enabled(state, payload) {
            process_execution_payload(ctx.config, state, payload)?;
        }
    }
    process_randao(ctx, state, block, opts)?;
    process_eth1_data(preset, state, &block.body.base().eth1_data);
    process_operations(ctx, state, block.body.base(), opts)?;
    if let Some(sync_aggregate) = block.body.sync_aggregate() {
        process_sync_aggregate(ctx, state, sync_aggregate, opts)?;
    }
    match (
        block.body.execution_payload(),
        block.body.blob_kzg_commitments(),
    ) {
        (Some(payload), Some(commitments)) => {
            process_blob_kzg_commitments(ctx, block, payload, commitments, sidecar, opts)
        }
        _ => Ok(None),
    }
}

fn process_block_header(
    preset: &Preset,
    state: &mut BeaconState,
    block: &BeaconBlock,
) -> Result<(), LedgerError> {
    if block.slot != state.slot {
        return Err(LedgerError::BlockSlotMismatch {
            state: state.slot,
            block: block.slot,
        });
    }
    if block.slot <= state.latest_block_header.slot {
        return Err(LedgerError::BlockNotNewer {
            latest: state.latest_block_header.slot,
            block: block.slot,
        });
    }
    let expected = state
        .beacon_proposer_index(preset)
        .ok_or(LedgerError::NoActiveValidators)?;
    if block.proposer_index != expected {
        return Err(LedgerError::ProposerMismatch {
            expected,
            actual: block.proposer_index,
        });
    }
    let parent_root = state.latest_block_header.hash_tree_root();
    if block.parent_root != parent_root {
        return Err(LedgerError::ParentRootMismatch {
            expected: parent_root,
            actual: block.parent_root,
        });
    }
    // filled in by the next slot's processing
    state.latest_block_header = BeaconBlockHeader {
        slot: block.slot,
        proposer_index: block.proposer_index,
        parent_root: block.parent_root,
        state_root: ZERO_HASH,
        body_root: block.body.hash_tree_root(),
    };
    let proposer = state
        .validator(block.proposer_index)
        .ok_or(LedgerError::UnknownValidator(block.proposer_index))?;
    if proposer.slashed {
        return Err(LedgerError::ProposerSlashed(block.proposer_index));
    }
    Ok(())
}

fn is_merge_transition_complete(state: &BeaconState) -> bool {
    state
        .latest_execution_payload_header
        .as_ref()
        .is_some_and(|header| !header.is_default())
}

fn is_execution_enabled(state: &BeaconState, payload: &ExecutionPayload) -> bool {
    is_merge_transition_complete(state) || *payload != ExecutionPayload::default()
}

/// Consistency checks only, the payload itself is validated by the execution
/// engine.
fn process_execution_payload(
    config: &ChainConfig,
    state: &mut BeaconState,
    payload: &ExecutionPayload,
) -> Result<(), LedgerError> {
    let preset = config.preset();
    if let Some(latest) = state
        .latest_execution_payload_header
        .as_ref()
        .filter(|header| !header.is_default())
    {
        if payload.parent_hash != latest.block_hash {
            return Err(LedgerError::PayloadParentHashMismatch);
        }
    }
    if payload.prev_randao != state.randao_mix(preset, state.current_epoch(preset)) {
        return Err(LedgerError::PayloadPrevRandaoMismatch);
    }
    let expected = compute_timestamp_at_slot(config, state)
        .ok_or(LedgerError::SlotTimestampOverflow { slot: state.slot })?;
    if payload.timestamp != expected {
        return Err(LedgerError::PayloadTimestampMismatch {
            expected,
            actual: payload.timestamp,
        });
    }
    state.latest_execution_payload_header = Some(payload.to_header());
    Ok(())
}

/// Unix time of the current slot, `None` when it does not fit a `u64`.
pub(crate) fn compute_timestamp_at_slot(config: &ChainConfig, state: &BeaconState) -> Option<u64> {
    state
        .slot
        .as_u64()
        .checked_mul(config.seconds_per_slot)?
        .checked_add(state.genesis_time)
}

fn process_randao(
    ctx: TransitionContext<'_>,
    state: &mut BeaconState,
    block: &BeaconBlock,
    opts: TransitionOpts,
) -> Result<(), LedgerError> {
    let preset = ctx.config.preset();
    let epoch = state.current_epoch(preset);
    let reveal = &block.body.base().randao_reveal;
    if opts.verify_signatures {
        let proposer = state
            .validator(block.proposer_index)
            .ok_or(LedgerError::UnknownValidator(block.proposer_index))?;
        let domain = compute_domain(DOMAIN_RANDAO, &state.genesis_validators_root);
        let signing_root = compute_signing_root(&epoch, &domain);
        if !ctx.verifier.verify(&proposer.pubkey, &signing_root, reveal) {
            return Err(LedgerError::InvalidSignature(SignatureKind::Randao));
        }
    }
    let mut mix = state.randao_mix(preset, epoch);
    for (byte, reveal_byte) in mix.iter_mut().zip(sha256(reveal.as_bytes())) {
        *byte ^= reveal_byte;
    }
    let index = (epoch.as_u64() % preset.epochs_per_historical_vector) as usize;
    state.randao_mixes.set_mut(index, mix);
    Ok(())
}

fn process_eth1_data(preset: &Preset, state: &mut BeaconState, eth1_data: &Eth1Data) {
    state.eth1_data_votes.push_back_mut(eth1_data.clone());
    let votes = state
        .eth1_data_votes
        .iter()
        .filter(|vote| *vote == eth1_data)
        .count() as u64;
    if votes * 2 > preset.slots_per_eth1_voting_period() {
        state.eth1_data = eth1_data.clone();
    }
}

fn process_sync_aggregate(
    ctx: TransitionContext<'_>,
    state: &mut BeaconState,
    sync_aggregate: &SyncAggregate,
    opts: TransitionOpts,
) -> Result<(), LedgerError> {
    let preset = ctx.config.preset();
    let members = state
        .current_sync_committee
        .as_ref()
        .ok_or(LedgerError::MissingSyncCommittee)?
        .members
        .clone();
    let bits = &sync_aggregate.sync_committee_bits;
    if bits.len() != members.len() {
        return Err(LedgerError::SyncCommitteeBitsLength {
            expected: members.len(),
            actual: bits.len(),
        });
    }
    if opts.verify_signatures {
        let participants = members
            .iter()
            .zip(bits.iter())
            .filter(|(_, bit)| **bit)
            .map(|(index, _)| {
                state
                    .validator(*index)
                    .map(|validator| validator.pubkey)
                    .ok_or(LedgerError::UnknownValidator(*index))
            })
            .collect::<Result<Vec<BlsPublicKey>, _>>()?;
        let previous_slot = state.slot.saturating_sub(1);
        let previous_block_root = state
            .block_root_at_slot(preset, previous_slot)
            .unwrap_or(state.latest_block_header.parent_root);
        let domain = compute_domain(DOMAIN_SYNC_COMMITTEE, &state.genesis_validators_root);
        let signing_root = compute_signing_root(&previous_block_root, &domain);
        if !eth_fast_aggregate_verify(
            ctx.verifier,
            &participants,
            &signing_root,
            &sync_aggregate.sync_committee_signature,
        ) {
            return Err(LedgerError::InvalidSignature(SignatureKind::SyncAggregate));
        }
    }

    let total_active_balance = state.total_active_balance(preset, state.current_epoch(preset));
    let total_active_increments = total_active_balance / preset.effective_balance_increment;
    let total_base_rewards =
        state.base_reward_per_increment(preset, total_active_balance) * total_active_increments;
    let max_participant_rewards =
        total_base_rewards * SYNC_REWARD_WEIGHT / WEIGHT_DENOMINATOR / preset.slots_per_epoch;
    let participant_reward = max_participant_rewards / preset.sync_committee_size as u64;
    let proposer_reward =
        participant_reward * PROPOSER_WEIGHT / (WEIGHT_DENOMINATOR - PROPOSER_WEIGHT);
    let proposer_index = state.latest_block_header.proposer_index;
    for (member, participated) in members.iter().zip(bits.iter()) {
        if *participated {
            state.increase_balance(*member, participant_reward);
            state.increase_balance(proposer_index, proposer_reward);
        } else {
            state.decrease_balance(*member, participant_reward);
        }
    }
    Ok(())
}

fn process_blob_kzg_commitments(
    ctx: TransitionContext<'_>,
    block: &BeaconBlock,
    payload: &ExecutionPayload,
    commitments: &[KzgCommitment],
    sidecar: Option<&BlobsSidecar>,
    opts: TransitionOpts,
) -> Result<Option<DataAvailability>, LedgerError> {
    verify_kzg_commitments_against_transactions(&payload.transactions, commitments)?;
    if !opts.verify_blobs {
        return Ok(None);
    }
    let checker = ctx
        .data_availability
        .ok_or(LedgerError::NoDataAvailabilityChecker)?;
    let availability = checker.is_data_available(
        sidecar,
        block.slot,
        block.hash_tree_root(),
        commitments,
    )?;
    Ok(Some(availability))
}

/// Schedule the exit of `index`. Already exiting validators are left alone.
pub(crate) fn initiate_validator_exit(
    preset: &Preset,
    state: &mut BeaconState,
    index: ValidatorIndex,
) {
    let Some(validator) = state.validator(index) else {
        return;
    };
    if validator.exit_epoch != FAR_FUTURE_EPOCH {
        return;
    }
    let exit_epoch = compute_activation_exit_epoch(preset, state.current_epoch(preset));
    let mut validator = validator.clone();
    validator.exit_epoch = exit_epoch;
    validator.withdrawable_epoch = exit_epoch + MIN_VALIDATOR_WITHDRAWABILITY_DELAY;
    state.validators.set_mut(index as usize, validator);
}
