// std
use std::collections::BTreeSet;
// crates
use beacon_core::block::{
    Attestation, AttestationData, AttesterSlashing, BodyBase, Deposit, IndexedAttestation,
    ProposerSlashing, SignedVoluntaryExit,
};
use beacon_core::crypto::{
    compute_domain, compute_signing_root, BlsPublicKey, DOMAIN_BEACON_ATTESTER,
    DOMAIN_BEACON_PROPOSER, DOMAIN_DEPOSIT, DOMAIN_VOLUNTARY_EXIT,
};
use beacon_core::primitives::FAR_FUTURE_EPOCH;
use beacon_core::state::{
    integer_sqrt, BeaconState, PendingAttestation, Validator, TIMELY_HEAD_FLAG_INDEX,
    TIMELY_SOURCE_FLAG_INDEX, TIMELY_TARGET_FLAG_INDEX,
};
use beacon_core::{Gwei, Preset, ValidatorIndex, ZERO_HASH};
// internal
use super::{initiate_validator_exit, PROPOSER_WEIGHT, WEIGHT_DENOMINATOR};
use crate::{LedgerError, SignatureKind, TransitionContext, TransitionOpts};

const MIN_ATTESTATION_INCLUSION_DELAY: u64 = 1;

const PARTICIPATION_FLAG_WEIGHTS: [(u8, u64); 3] = [
    (TIMELY_SOURCE_FLAG_INDEX, 14),
    (TIMELY_TARGET_FLAG_INDEX, 26),
    (TIMELY_HEAD_FLAG_INDEX, 14),
];

fn check_limit(kind: &'static str, count: usize, max: usize) -> Result<(), LedgerError> {
    if count > max {
        return Err(LedgerError::TooManyOperations { kind, count, max });
    }
    Ok(())
}

pub(crate) fn process_operations(
    ctx: TransitionContext<'_>,
    state: &mut BeaconState,
    body: &BodyBase,
    opts: TransitionOpts,
) -> Result<(), LedgerError> {
    let preset = ctx.config.preset();
    check_limit(
        "proposer slashings",
        body.proposer_slashings.len(),
        preset.max_proposer_slashings,
    )?;
    check_limit(
        "attester slashings",
        body.attester_slashings.len(),
        preset.max_attester_slashings,
    )?;
    check_limit("attestations", body.attestations.len(), preset.max_attestations)?;
    check_limit("voluntary exits", body.voluntary_exits.len(), preset.max_voluntary_exits)?;
    let pending_deposits = state
        .eth1_data
        .deposit_count
        .saturating_sub(state.eth1_deposit_index) as usize;
    let expected_deposits = preset.max_deposits.min(pending_deposits);
    if body.deposits.len() != expected_deposits {
        return Err(LedgerError::DepositCountMismatch {
            expected: expected_deposits,
            actual: body.deposits.len(),
        });
    }

    for slashing in &body.proposer_slashings {
        process_proposer_slashing(ctx, state, slashing, opts)?;
    }
    for slashing in &body.attester_slashings {
        process_attester_slashing(ctx, state, slashing, opts)?;
    }
    for attestation in &body.attestations {
        process_attestation(ctx, state, attestation, opts)?;
    }
    for deposit in &body.deposits {
        process_deposit(ctx, state, deposit);
    }
    for exit in &body.voluntary_exits {
        process_voluntary_exit(ctx, state, exit, opts)?;
    }
    Ok(())
}

fn process_proposer_slashing(
    ctx: TransitionContext<'_>,
    state: &mut BeaconState,
    slashing: &ProposerSlashing,
    opts: TransitionOpts,
) -> Result<(), LedgerError> {
    let preset = ctx.config.preset();
    let header_1 = &slashing.signed_header_1.message;
    let header_2 = &slashing.signed_header_2.message;
    if header_1.slot != header_2.slot {
        return Err(LedgerError::InvalidProposerSlashing("headers are for different slots"));
    }
    if header_1.proposer_index != header_2.proposer_index {
        return Err(LedgerError::InvalidProposerSlashing(
            "headers are from different proposers",
        ));
    }
    if header_1 == header_2 {
        return Err(LedgerError::InvalidProposerSlashing("headers are identical"));
    }
    let index = header_1.proposer_index;
    let proposer = state
        .validator(index)
        .ok_or(LedgerError::UnknownValidator(index))?;
    if !proposer.is_slashable(state.current_epoch(preset)) {
        return Err(LedgerError::InvalidProposerSlashing("proposer is not slashable"));
    }
    if opts.verify_signatures {
        let domain = compute_domain(DOMAIN_BEACON_PROPOSER, &state.genesis_validators_root);
        for signed_header in [&slashing.signed_header_1, &slashing.signed_header_2] {
            let signing_root = compute_signing_root(&signed_header.message, &domain);
            if !ctx
                .verifier
                .verify(&proposer.pubkey, &signing_root, &signed_header.signature)
            {
                return Err(LedgerError::InvalidSignature(SignatureKind::ProposerSlashing));
            }
        }
    }
    slash_validator(preset, state, index);
    Ok(())
}

fn is_slashable_attestation_data(data_1: &AttestationData, data_2: &AttestationData) -> bool {
    let double_vote = data_1 != data_2 && data_1.target.epoch == data_2.target.epoch;
    let surround_vote =
        data_1.source.epoch < data_2.source.epoch && data_2.target.epoch < data_1.target.epoch;
    double_vote || surround_vote
}

fn is_valid_indexed_attestation(
    ctx: TransitionContext<'_>,
    state: &BeaconState,
    attestation: &IndexedAttestation,
    opts: TransitionOpts,
) -> Result<bool, LedgerError> {
    let indices = &attestation.attesting_indices;
    if indices.is_empty() || indices.windows(2).any(|pair| pair[0] >= pair[1]) {
        return Err(LedgerError::InvalidIndexedAttestation(
            "attesting indices are not sorted and unique",
        ));
    }
    if !opts.verify_signatures {
        return Ok(true);
    }
    let pubkeys = attesting_pubkeys(state, indices)?;
    let domain = compute_domain(DOMAIN_BEACON_ATTESTER, &state.genesis_validators_root);
    let signing_root = compute_signing_root(&attestation.data, &domain);
    Ok(ctx
        .verifier
        .fast_aggregate_verify(&pubkeys, &signing_root, &attestation.signature))
}

fn attesting_pubkeys(
    state: &BeaconState,
    indices: &[ValidatorIndex],
) -> Result<Vec<BlsPublicKey>, LedgerError> {
    indices
        .iter()
        .map(|index| {
            state
                .validator(*index)
                .map(|validator| validator.pubkey)
                .ok_or(LedgerError::UnknownValidator(*index))
        })
        .collect()
}

fn process_attester_slashing(
    ctx: TransitionContext<'_>,
    state: &mut BeaconState,
    slashing: &AttesterSlashing,
    opts: TransitionOpts,
) -> Result<(), LedgerError> {
    let preset = ctx.config.preset();
    let attestation_1 = &slashing.attestation_1;
    let attestation_2 = &slashing.attestation_2;
    if !is_slashable_attestation_data(&attestation_1.data, &attestation_2.data) {
        return Err(LedgerError::InvalidAttesterSlashing(
            "attestations are not slashable",
        ));
    }
    for attestation in [attestation_1, attestation_2] {
        if !is_valid_indexed_attestation(ctx, state, attestation, opts)? {
            return Err(LedgerError::InvalidSignature(SignatureKind::AttesterSlashing));
        }
    }
    let indices_1: BTreeSet<ValidatorIndex> =
        attestation_1.attesting_indices.iter().copied().collect();
    let current_epoch = state.current_epoch(preset);
    let mut slashed_any = false;
    for index in attestation_2
        .attesting_indices
        .iter()
        .filter(|index| indices_1.contains(*index))
    {
        let slashable = state
            .validator(*index)
            .is_some_and(|validator| validator.is_slashable(current_epoch));
        if slashable {
            slash_validator(preset, state, *index);
            slashed_any = true;
        }
    }
    if !slashed_any {
        return Err(LedgerError::InvalidAttesterSlashing("no validator was slashed"));
    }
    Ok(())
}

/// Slash `index`, crediting the block proposer as whistleblower.
pub(crate) fn slash_validator(preset: &Preset, state: &mut BeaconState, index: ValidatorIndex) {
    let epoch = state.current_epoch(preset);
    initiate_validator_exit(preset, state, index);
    let Some(validator) = state.validator(index) else {
        return;
    };
    let mut validator = validator.clone();
    validator.slashed = true;
    validator.withdrawable_epoch = validator
        .withdrawable_epoch
        .max(epoch + preset.epochs_per_slashings_vector);
    let effective_balance = validator.effective_balance;
    state.validators.set_mut(index as usize, validator);

    let slashings_index = (epoch.as_u64() % preset.epochs_per_slashings_vector) as usize;
    let slashed_total = state.slashings.get(slashings_index).copied().unwrap_or(0);
    state
        .slashings
        .set_mut(slashings_index, slashed_total + effective_balance);
    state.decrease_balance(
        index,
        effective_balance / preset.min_slashing_penalty_quotient_at(state.fork),
    );

    let proposer_index = state.latest_block_header.proposer_index;
    let whistleblower_reward = effective_balance / preset.whistleblower_reward_quotient;
    let proposer_reward = if state.fork.has_sync_committee() {
        whistleblower_reward * PROPOSER_WEIGHT / WEIGHT_DENOMINATOR
    } else {
        whistleblower_reward / preset.proposer_reward_quotient
    };
    state.increase_balance(proposer_index, proposer_reward);
    state.increase_balance(proposer_index, whistleblower_reward - proposer_reward);
    tracing::debug!(validator = index, whistleblower = proposer_index, "slashed validator");
}

fn process_attestation(
    ctx: TransitionContext<'_>,
    state: &mut BeaconState,
    attestation: &Attestation,
    opts: TransitionOpts,
) -> Result<(), LedgerError> {
    let preset = ctx.config.preset();
    let data = &attestation.data;
    let current_epoch = state.current_epoch(preset);
    let previous_epoch = state.previous_epoch(preset);
    if data.target.epoch != current_epoch && data.target.epoch != previous_epoch {
        return Err(LedgerError::InvalidAttestation(
            "target epoch is neither current nor previous",
        ));
    }
    if data.target.epoch != data.slot.epoch(preset.slots_per_epoch) {
        return Err(LedgerError::InvalidAttestation(
            "target epoch does not match the slot",
        ));
    }
    if data.slot + MIN_ATTESTATION_INCLUSION_DELAY > state.slot {
        return Err(LedgerError::InvalidAttestation("included too early"));
    }
    if state.slot > data.slot + preset.slots_per_epoch {
        return Err(LedgerError::InvalidAttestation("included too late"));
    }
    // a single committee serves each slot
    if data.index != 0 {
        return Err(LedgerError::InvalidAttestation("committee index out of range"));
    }
    let committee = state.beacon_committee(preset, data.slot);
    if attestation.aggregation_bits.len() != committee.len() {
        return Err(LedgerError::InvalidAttestation(
            "aggregation bits do not match the committee",
        ));
    }
    let attesting_indices: Vec<ValidatorIndex> = committee
        .iter()
        .zip(attestation.aggregation_bits.iter())
        .filter(|(_, bit)| **bit)
        .map(|(index, _)| *index)
        .collect();
    if attesting_indices.is_empty() {
        return Err(LedgerError::InvalidAttestation("no attesting validators"));
    }
    let indexed = IndexedAttestation {
        attesting_indices,
        data: data.clone(),
        signature: attestation.signature,
    };
    if !is_valid_indexed_attestation(ctx, state, &indexed, opts)? {
        return Err(LedgerError::InvalidSignature(SignatureKind::Attestation));
    }

    let inclusion_delay = state.slot - data.slot;
    let proposer_index = state.latest_block_header.proposer_index;
    if !state.fork.has_sync_committee() {
        let pending = PendingAttestation {
            aggregation_bits: attestation.aggregation_bits.clone(),
            data: data.clone(),
            inclusion_delay,
            proposer_index,
        };
        if data.target.epoch == current_epoch {
            state.current_epoch_attestations.push_back_mut(pending);
        } else {
            state.previous_epoch_attestations.push_back_mut(pending);
        }
        return Ok(());
    }

    let flags = participation_flags(preset, state, data, inclusion_delay);
    let total_active_balance = state.total_active_balance(preset, current_epoch);
    let reward_per_increment = state.base_reward_per_increment(preset, total_active_balance);
    let mut proposer_reward_numerator: Gwei = 0;
    let is_current = data.target.epoch == current_epoch;
    for index in &indexed.attesting_indices {
        let position = *index as usize;
        let participation = if is_current {
            &state.current_epoch_participation
        } else {
            &state.previous_epoch_participation
        };
        let Some(mut participated) = participation.get(position).copied() else {
            continue;
        };
        let effective_balance = state
            .validator(*index)
            .map_or(0, |validator| validator.effective_balance);
        let base_reward =
            effective_balance / preset.effective_balance_increment * reward_per_increment;
        for (flag, weight) in PARTICIPATION_FLAG_WEIGHTS {
            let mask = 1u8 << flag;
            if flags & mask != 0 && participated & mask == 0 {
                participated |= mask;
                proposer_reward_numerator += base_reward * weight;
            }
        }
        if is_current {
            state.current_epoch_participation.set_mut(position, participated);
        } else {
            state.previous_epoch_participation.set_mut(position, participated);
        }
    }
    let proposer_reward_denominator =
        (WEIGHT_DENOMINATOR - PROPOSER_WEIGHT) * WEIGHT_DENOMINATOR / PROPOSER_WEIGHT;
    state.increase_balance(
        proposer_index,
        proposer_reward_numerator / proposer_reward_denominator,
    );
    Ok(())
}

/// Timeliness flags earned by an attestation. The source is always accepted:
/// justification is not tracked.
fn participation_flags(
    preset: &Preset,
    state: &BeaconState,
    data: &AttestationData,
    inclusion_delay: u64,
) -> u8 {
    let target_root = state.block_root_at_slot(
        preset,
        data.target.epoch.start_slot(preset.slots_per_epoch),
    );
    let head_root = state.block_root_at_slot(preset, data.slot);
    let matching_target = target_root == Some(data.target.root);
    let matching_head = matching_target && head_root == Some(data.beacon_block_root);

    let mut flags = 0u8;
    if inclusion_delay <= integer_sqrt(preset.slots_per_epoch) {
        flags |= 1 << TIMELY_SOURCE_FLAG_INDEX;
    }
    if matching_target && inclusion_delay <= preset.slots_per_epoch {
        flags |= 1 << TIMELY_TARGET_FLAG_INDEX;
    }
    if matching_head && inclusion_delay == MIN_ATTESTATION_INCLUSION_DELAY {
        flags |= 1 << TIMELY_HEAD_FLAG_INDEX;
    }
    flags
}

/// Deposits carry no inclusion proof here: the block only has to include the
/// pending deposits in order. A new validator with an invalid proof of
/// possession is skipped without failing the block.
fn process_deposit(ctx: TransitionContext<'_>, state: &mut BeaconState, deposit: &Deposit) {
    let preset = ctx.config.preset();
    state.eth1_deposit_index += 1;
    let data = &deposit.data;
    if let Some(index) = state
        .validators
        .iter()
        .position(|validator| validator.pubkey == data.pubkey)
    {
        state.increase_balance(index as ValidatorIndex, data.amount);
        return;
    }
    // deposit signatures are fork agnostic
    let domain = compute_domain(DOMAIN_DEPOSIT, &ZERO_HASH);
    let signing_root = compute_signing_root(&data.message(), &domain);
    if !ctx
        .verifier
        .verify(&data.pubkey, &signing_root, &data.signature)
    {
        tracing::debug!(
            pubkey = %const_hex::encode(data.pubkey.as_bytes()),
            "skipping deposit with invalid signature"
        );
        return;
    }
    let effective_balance = (data.amount - data.amount % preset.effective_balance_increment)
        .min(preset.max_effective_balance);
    let mut validator = Validator::new(
        data.pubkey,
        data.withdrawal_credentials,
        effective_balance,
        FAR_FUTURE_EPOCH,
    );
    if effective_balance == preset.max_effective_balance {
        validator.activation_eligibility_epoch = state.current_epoch(preset) + 1;
    }
    state.validators.push_back_mut(validator);
    state.balances.push_back_mut(data.amount);
    if state.fork.has_sync_committee() {
        state.previous_epoch_participation.push_back_mut(0);
        state.current_epoch_participation.push_back_mut(0);
    }
}

fn process_voluntary_exit(
    ctx: TransitionContext<'_>,
    state: &mut BeaconState,
    signed_exit: &SignedVoluntaryExit,
    opts: TransitionOpts,
) -> Result<(), LedgerError> {
    let preset = ctx.config.preset();
    let exit = &signed_exit.message;
    let current_epoch = state.current_epoch(preset);
    let validator = state
        .validator(exit.validator_index)
        .ok_or(LedgerError::UnknownValidator(exit.validator_index))?;
    if !validator.is_active(current_epoch) {
        return Err(LedgerError::InvalidVoluntaryExit("validator is not active"));
    }
    if validator.exit_epoch != FAR_FUTURE_EPOCH {
        return Err(LedgerError::InvalidVoluntaryExit("validator is already exiting"));
    }
    if current_epoch < exit.epoch {
        return Err(LedgerError::InvalidVoluntaryExit("exit epoch is in the future"));
    }
    if current_epoch < validator.activation_epoch + preset.shard_committee_period {
        return Err(LedgerError::InvalidVoluntaryExit(
            "validator has not been active long enough",
        ));
    }
    if opts.verify_signatures {
        let domain = compute_domain(DOMAIN_VOLUNTARY_EXIT, &state.genesis_validators_root);
        let signing_root = compute_signing_root(exit, &domain);
        if !ctx
            .verifier
            .verify(&validator.pubkey, &signing_root, &signed_exit.signature)
        {
            return Err(LedgerError::InvalidSignature(SignatureKind::VoluntaryExit));
        }
    }
    initiate_validator_exit(preset, state, exit.validator_index);
    Ok(())
}

#[cfg(test)]
mod tests {
    use beacon_core::block::{
        BeaconBlockHeader, Checkpoint, DepositData, SignedBeaconBlockHeader, VoluntaryExit,
    };
    use beacon_core::crypto::BlsSignature;
    use beacon_core::state::BeaconState;
    use beacon_core::{ChainConfig, Epoch, ForkSeq, Slot};
    use bitvec::prelude::{BitVec, Lsb0};

    use super::*;
    use crate::testutils::TestChain;
    use crate::{process_slots, BlstVerifier};

    /// State at `slot` whose latest header is a block proposed at that slot.
    fn state_at(chain: &TestChain, slot: u64) -> BeaconState {
        let config = &chain.config;
        let mut state = process_slots(config, chain.head_state().clone(), Slot::new(slot)).unwrap();
        state.latest_block_header.slot = state.slot;
        state.latest_block_header.proposer_index =
            state.beacon_proposer_index(config.preset()).unwrap();
        state
    }

    fn signed_header(chain: &TestChain, state: &BeaconState, header: BeaconBlockHeader) -> SignedBeaconBlockHeader {
        let domain = compute_domain(DOMAIN_BEACON_PROPOSER, &state.genesis_validators_root);
        let signature = chain.sign(header.proposer_index, &compute_signing_root(&header, &domain));
        SignedBeaconBlockHeader {
            message: header,
            signature,
        }
    }

    #[test]
    fn proposer_slashing_penalizes_and_rewards() {
        let chain = TestChain::new(ChainConfig::minimal_at(ForkSeq::Altair), 16);
        let config = &chain.config;
        let preset = config.preset();
        let mut state = state_at(&chain, 3);
        let whistleblower = state.latest_block_header.proposer_index;
        let offender = (whistleblower + 1) % 16;
        let header = BeaconBlockHeader {
            slot: Slot::new(2),
            proposer_index: offender,
            ..Default::default()
        };
        let other = BeaconBlockHeader {
            body_root: [1; 32],
            ..header.clone()
        };
        let slashing = ProposerSlashing {
            signed_header_1: signed_header(&chain, &state, header),
            signed_header_2: signed_header(&chain, &state, other),
        };
        let ctx = TransitionContext::new(config, &BlstVerifier);
        let before = state.balances.clone();
        process_proposer_slashing(ctx, &mut state, &slashing, TransitionOpts::default()).unwrap();

        let slashed = state.validator(offender).unwrap();
        assert!(slashed.slashed);
        assert_ne!(slashed.exit_epoch, FAR_FUTURE_EPOCH);
        let effective = preset.max_effective_balance;
        assert_eq!(
            state.balance(offender).unwrap(),
            before[offender as usize] - effective / preset.min_slashing_penalty_quotient_altair
        );
        assert_eq!(
            state.balance(whistleblower).unwrap(),
            before[whistleblower as usize] + effective / preset.whistleblower_reward_quotient
        );
        assert_eq!(state.slashings[0], effective);

        // the same offence cannot be punished twice
        let error =
            process_proposer_slashing(ctx, &mut state, &slashing, TransitionOpts::default())
                .unwrap_err();
        assert!(matches!(error, LedgerError::InvalidProposerSlashing(_)));
    }

    #[test]
    fn identical_headers_are_not_slashable() {
        let chain = TestChain::new(ChainConfig::minimal_at(ForkSeq::Phase0), 8);
        let mut state = state_at(&chain, 1);
        let header = BeaconBlockHeader {
            slot: Slot::new(1),
            proposer_index: 2,
            ..Default::default()
        };
        let slashing = ProposerSlashing {
            signed_header_1: signed_header(&chain, &state, header.clone()),
            signed_header_2: signed_header(&chain, &state, header),
        };
        let ctx = TransitionContext::new(&chain.config, &BlstVerifier);
        let error =
            process_proposer_slashing(ctx, &mut state, &slashing, TransitionOpts::default())
                .unwrap_err();
        assert!(matches!(
            error,
            LedgerError::InvalidProposerSlashing("headers are identical")
        ));
    }

    #[test]
    fn double_vote_slashes_the_overlap() {
        let chain = TestChain::new(ChainConfig::minimal_at(ForkSeq::Phase0), 8);
        let mut state = state_at(&chain, 2);
        let data = AttestationData {
            slot: Slot::new(1),
            ..Default::default()
        };
        let conflicting = AttestationData {
            beacon_block_root: [4; 32],
            ..data.clone()
        };
        let indexed = |indices: Vec<ValidatorIndex>, data: AttestationData| IndexedAttestation {
            attesting_indices: indices,
            data,
            signature: BlsSignature::infinity(),
        };
        let slashing = AttesterSlashing {
            attestation_1: indexed(vec![1, 3, 5], data),
            attestation_2: indexed(vec![3, 5, 7], conflicting),
        };
        let ctx = TransitionContext::new(&chain.config, &BlstVerifier);
        process_attester_slashing(ctx, &mut state, &slashing, TransitionOpts::trusted()).unwrap();
        let slashed: Vec<bool> = state.validators.iter().map(|v| v.slashed).collect();
        assert_eq!(
            slashed,
            vec![false, false, false, true, false, true, false, false]
        );
    }

    #[test]
    fn attester_slashing_needs_sorted_indices() {
        let chain = TestChain::new(ChainConfig::minimal_at(ForkSeq::Phase0), 8);
        let mut state = state_at(&chain, 2);
        let data = AttestationData {
            slot: Slot::new(1),
            ..Default::default()
        };
        let indexed = |indices: Vec<ValidatorIndex>, data: AttestationData| IndexedAttestation {
            attesting_indices: indices,
            data,
            signature: BlsSignature::infinity(),
        };
        let ctx = TransitionContext::new(&chain.config, &BlstVerifier);
        for indices in [vec![5, 3], vec![3, 3], vec![]] {
            let slashing = AttesterSlashing {
                attestation_1: indexed(vec![3, 5], data.clone()),
                attestation_2: indexed(
                    indices,
                    AttestationData {
                        beacon_block_root: [4; 32],
                        ..data.clone()
                    },
                ),
            };
            let error =
                process_attester_slashing(ctx, &mut state, &slashing, TransitionOpts::trusted())
                    .unwrap_err();
            assert!(matches!(error, LedgerError::InvalidIndexedAttestation(_)));
        }
        assert!(state.validators.iter().all(|validator| !validator.slashed));
    }

    #[test]
    fn surround_vote_detection() {
        let vote = |source: u64, target: u64| AttestationData {
            source: Checkpoint {
                epoch: Epoch::new(source),
                root: [0; 32],
            },
            target: Checkpoint {
                epoch: Epoch::new(target),
                root: [0; 32],
            },
            ..Default::default()
        };
        assert!(is_slashable_attestation_data(&vote(1, 5), &vote(2, 4)));
        assert!(!is_slashable_attestation_data(&vote(2, 4), &vote(1, 5)));
        assert!(!is_slashable_attestation_data(&vote(1, 4), &vote(1, 4)));
    }

    fn committee_attestation(state: &BeaconState, chain: &TestChain, slot: u64) -> Attestation {
        let preset = chain.config.preset();
        let slot = Slot::new(slot);
        let epoch = slot.epoch(preset.slots_per_epoch);
        let data = AttestationData {
            slot,
            index: 0,
            beacon_block_root: state.block_root_at_slot(preset, slot).unwrap(),
            source: Checkpoint::default(),
            target: Checkpoint {
                epoch,
                root: state
                    .block_root_at_slot(preset, epoch.start_slot(preset.slots_per_epoch))
                    .unwrap(),
            },
        };
        let committee = state.beacon_committee(preset, slot);
        let domain = compute_domain(DOMAIN_BEACON_ATTESTER, &state.genesis_validators_root);
        let signing_root = compute_signing_root(&data, &domain);
        Attestation {
            aggregation_bits: BitVec::<u8, Lsb0>::repeat(true, committee.len()),
            signature: chain.aggregate_sign(&committee, &signing_root),
            data,
        }
    }

    #[test]
    fn phase0_attestations_are_recorded() {
        let chain = TestChain::new(ChainConfig::minimal_at(ForkSeq::Phase0), 16);
        let mut state = state_at(&chain, 3);
        let attestation = committee_attestation(&state, &chain, 2);
        let ctx = TransitionContext::new(&chain.config, &BlstVerifier);
        process_attestation(ctx, &mut state, &attestation, TransitionOpts::default()).unwrap();
        assert_eq!(state.current_epoch_attestations.len(), 1);
        assert_eq!(state.current_epoch_attestations[0].inclusion_delay, 1);
    }

    #[test]
    fn altair_attestations_set_flags_and_pay_the_proposer() {
        let chain = TestChain::new(ChainConfig::minimal_at(ForkSeq::Altair), 16);
        let mut state = state_at(&chain, 3);
        let proposer = state.latest_block_header.proposer_index;
        let before = state.balance(proposer).unwrap();
        let attestation = committee_attestation(&state, &chain, 2);
        let committee = state.beacon_committee(chain.config.preset(), Slot::new(2));
        let ctx = TransitionContext::new(&chain.config, &BlstVerifier);
        process_attestation(ctx, &mut state, &attestation, TransitionOpts::default()).unwrap();
        for index in committee {
            assert_eq!(state.current_epoch_participation[index as usize], 0b111);
        }
        assert!(state.balance(proposer).unwrap() > before);
    }

    #[test]
    fn attestation_bad_signature_and_timing() {
        let chain = TestChain::new(ChainConfig::minimal_at(ForkSeq::Phase0), 16);
        let mut state = state_at(&chain, 3);
        let ctx = TransitionContext::new(&chain.config, &BlstVerifier);

        let mut forged = committee_attestation(&state, &chain, 2);
        forged.signature = BlsSignature::infinity();
        assert!(matches!(
            process_attestation(ctx, &mut state, &forged, TransitionOpts::default()),
            Err(LedgerError::InvalidSignature(SignatureKind::Attestation))
        ));

        let mut early = committee_attestation(&state, &chain, 2);
        early.data.slot = Slot::new(3);
        assert!(matches!(
            process_attestation(ctx, &mut state, &early, TransitionOpts::trusted()),
            Err(LedgerError::InvalidAttestation("included too early"))
        ));
    }

    #[test]
    fn deposits_add_validators_or_top_up() {
        let chain = TestChain::new(ChainConfig::minimal_at(ForkSeq::Altair), 8);
        let preset = chain.config.preset();
        let mut state = state_at(&chain, 1);
        let ctx = TransitionContext::new(&chain.config, &BlstVerifier);

        let top_up = Deposit {
            data: DepositData {
                pubkey: state.validators[0].pubkey,
                withdrawal_credentials: [0; 32],
                amount: 5,
                signature: BlsSignature::empty(),
            },
        };
        process_deposit(ctx, &mut state, &top_up);
        assert_eq!(state.balances[0], preset.max_effective_balance + 5);

        let new_validator = chain.deposit(100, preset.max_effective_balance);
        process_deposit(ctx, &mut state, &new_validator);
        assert_eq!(state.validators.len(), 9);
        assert_eq!(state.current_epoch_participation.len(), 9);
        assert_eq!(
            state.validators[8].activation_eligibility_epoch,
            Epoch::new(1)
        );

        let mut forged = chain.deposit(101, preset.max_effective_balance);
        forged.data.amount += 1;
        process_deposit(ctx, &mut state, &forged);
        assert_eq!(state.validators.len(), 9);
        assert_eq!(state.eth1_deposit_index, 11);
    }

    #[test]
    fn deposit_count_is_enforced() {
        let chain = TestChain::new(ChainConfig::minimal_at(ForkSeq::Phase0), 8);
        let mut state = state_at(&chain, 1);
        state.eth1_data.deposit_count += 1;
        let ctx = TransitionContext::new(&chain.config, &BlstVerifier);
        let error =
            process_operations(ctx, &mut state, &BodyBase::default(), TransitionOpts::trusted())
                .unwrap_err();
        assert!(matches!(
            error,
            LedgerError::DepositCountMismatch {
                expected: 1,
                actual: 0
            }
        ));
    }

    #[test]
    fn young_validators_cannot_exit() {
        let chain = TestChain::new(ChainConfig::minimal_at(ForkSeq::Phase0), 8);
        let mut state = state_at(&chain, 1);
        let exit = SignedVoluntaryExit {
            message: VoluntaryExit {
                epoch: Epoch::new(0),
                validator_index: 3,
            },
            signature: BlsSignature::empty(),
        };
        let ctx = TransitionContext::new(&chain.config, &BlstVerifier);
        let error =
            process_voluntary_exit(ctx, &mut state, &exit, TransitionOpts::trusted()).unwrap_err();
        assert!(matches!(
            error,
            LedgerError::InvalidVoluntaryExit("validator has not been active long enough")
        ));
        assert_eq!(state.validators[3], chain.head_state().validators[3]);
    }
}
