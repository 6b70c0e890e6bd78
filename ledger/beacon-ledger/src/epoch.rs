// crates
use beacon_core::merkle::{container_root, HashTreeRoot};
use beacon_core::state::BeaconState;
use beacon_core::{ChainConfig, Epoch, Preset, ValidatorIndex};
use rpds::VectorSync;
// internal
use crate::block::initiate_validator_exit;

const HYSTERESIS_QUOTIENT: u64 = 4;
const HYSTERESIS_DOWNWARD_MULTIPLIER: u64 = 1;
const HYSTERESIS_UPWARD_MULTIPLIER: u64 = 5;

/// Epoch at which a validator activated or exited now takes effect.
pub(crate) fn compute_activation_exit_epoch(preset: &Preset, epoch: Epoch) -> Epoch {
    epoch + 1 + preset.min_seed_lookahead
}

/// Bookkeeping run on the last slot of every epoch.
///
/// Rewards, penalties and justification are not modelled: balances only move
/// through block operations.
pub(crate) fn process_epoch(config: &ChainConfig, state: &mut BeaconState) {
    let preset = config.preset();
    let current_epoch = state.current_epoch(preset);
    let next_epoch = current_epoch + 1;

    process_registry_updates(preset, state, current_epoch);

    if next_epoch.as_u64() % preset.epochs_per_eth1_voting_period == 0 {
        state.eth1_data_votes = VectorSync::new_sync();
    }

    process_effective_balance_updates(preset, state);

    let slashings_index = (next_epoch.as_u64() % preset.epochs_per_slashings_vector) as usize;
    state.slashings.set_mut(slashings_index, 0);

    let mix_index = (next_epoch.as_u64() % preset.epochs_per_historical_vector) as usize;
    let current_mix = state.randao_mix(preset, current_epoch);
    state.randao_mixes.set_mut(mix_index, current_mix);

    let epochs_per_batch = (preset.slots_per_historical_root / preset.slots_per_epoch).max(1);
    if next_epoch.as_u64() % epochs_per_batch == 0 {
        let batch_root = container_root(&[
            state.block_roots.hash_tree_root(),
            state.state_roots.hash_tree_root(),
        ]);
        state.historical_roots.push_back_mut(batch_root);
    }

    if state.fork.has_sync_committee() {
        state.previous_epoch_participation = state.current_epoch_participation.clone();
        state.current_epoch_participation = state.validators.iter().map(|_| 0).collect();
        if next_epoch.as_u64() % preset.epochs_per_sync_committee_period == 0 {
            state.current_sync_committee = state.next_sync_committee.take();
            state.next_sync_committee = Some(state.compute_sync_committee(preset, next_epoch));
        }
    } else {
        state.previous_epoch_attestations = state.current_epoch_attestations.clone();
        state.current_epoch_attestations = VectorSync::new_sync();
    }
    tracing::trace!(epoch = %current_epoch, "processed epoch");
}

/// Activate validators that became eligible and eject those whose balance fell
/// to the ejection threshold. There is no churn limit.
fn process_registry_updates(preset: &Preset, state: &mut BeaconState, current_epoch: Epoch) {
    let activation_epoch = compute_activation_exit_epoch(preset, current_epoch);
    let mut to_eject: Vec<ValidatorIndex> = Vec::new();
    let mut to_activate: Vec<ValidatorIndex> = Vec::new();
    for (index, validator) in state.validators.iter().enumerate() {
        if validator.is_active(current_epoch)
            && validator.effective_balance <= preset.ejection_balance
        {
            to_eject.push(index as ValidatorIndex);
        }
        if validator.activation_epoch == beacon_core::primitives::FAR_FUTURE_EPOCH
            && validator.activation_eligibility_epoch <= current_epoch
        {
            to_activate.push(index as ValidatorIndex);
        }
    }
    for index in to_eject {
        initiate_validator_exit(preset, state, index);
    }
    for index in to_activate {
        if let Some(validator) = state.validators.get(index as usize) {
            let mut validator = validator.clone();
            validator.activation_epoch = activation_epoch;
            state.validators.set_mut(index as usize, validator);
        }
    }
}

fn process_effective_balance_updates(preset: &Preset, state: &mut BeaconState) {
    let hysteresis_increment = preset.effective_balance_increment / HYSTERESIS_QUOTIENT;
    let downward_threshold = hysteresis_increment * HYSTERESIS_DOWNWARD_MULTIPLIER;
    let upward_threshold = hysteresis_increment * HYSTERESIS_UPWARD_MULTIPLIER;
    let updates: Vec<(usize, u64)> = state
        .validators
        .iter()
        .zip(state.balances.iter())
        .enumerate()
        .filter_map(|(index, (validator, balance))| {
            let effective = validator.effective_balance;
            if balance + downward_threshold < effective || effective + upward_threshold < *balance
            {
                let updated = (balance - balance % preset.effective_balance_increment)
                    .min(preset.max_effective_balance);
                Some((index, updated))
            } else {
                None
            }
        })
        .collect();
    for (index, effective_balance) in updates {
        if let Some(validator) = state.validators.get(index) {
            let mut validator = validator.clone();
            validator.effective_balance = effective_balance;
            state.validators.set_mut(index, validator);
        }
    }
}

#[cfg(test)]
mod tests {
    use beacon_core::{ForkSeq, Slot};

    use super::*;
    use crate::process_slots;
    use crate::testutils::genesis_state;

    #[test]
    fn randao_mix_carries_over() {
        let config = ChainConfig::minimal_at(ForkSeq::Phase0);
        let preset = config.preset();
        let mut state = genesis_state(&config, 8);
        state.randao_mixes.set_mut(0, [5; 32]);
        let state = process_slots(&config, state, Slot::new(preset.slots_per_epoch)).unwrap();
        assert_eq!(state.randao_mix(preset, Epoch::new(1)), [5; 32]);
    }

    #[test]
    fn effective_balance_follows_with_hysteresis() {
        let config = ChainConfig::minimal_at(ForkSeq::Phase0);
        let preset = config.preset();
        let mut state = genesis_state(&config, 8);
        let increment = preset.effective_balance_increment;
        // small dip is absorbed
        state.balances.set_mut(0, preset.max_effective_balance - increment / 8);
        // large drop moves the effective balance
        state.balances.set_mut(1, preset.max_effective_balance - 3 * increment);
        let state = process_slots(&config, state, Slot::new(preset.slots_per_epoch)).unwrap();
        assert_eq!(
            state.validators[0].effective_balance,
            preset.max_effective_balance
        );
        assert_eq!(
            state.validators[1].effective_balance,
            preset.max_effective_balance - 3 * increment
        );
    }

    #[test]
    fn low_balance_validators_are_ejected() {
        let config = ChainConfig::minimal_at(ForkSeq::Phase0);
        let preset = config.preset();
        let mut state = genesis_state(&config, 8);
        let mut validator = state.validators[2].clone();
        validator.effective_balance = preset.ejection_balance;
        state.validators.set_mut(2, validator);
        let state = process_slots(&config, state, Slot::new(preset.slots_per_epoch)).unwrap();
        assert_eq!(
            state.validators[2].exit_epoch,
            compute_activation_exit_epoch(preset, Epoch::new(0))
        );
    }

    #[test]
    fn participation_rotates() {
        let config = ChainConfig::minimal_at(ForkSeq::Altair);
        let preset = config.preset();
        let mut state = genesis_state(&config, 8);
        state.current_epoch_participation.set_mut(3, 0b111);
        let state = process_slots(&config, state, Slot::new(preset.slots_per_epoch)).unwrap();
        assert_eq!(state.previous_epoch_participation[3], 0b111);
        assert!(state.current_epoch_participation.iter().all(|flags| *flags == 0));
    }
}
