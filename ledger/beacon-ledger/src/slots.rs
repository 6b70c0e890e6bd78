// crates
use beacon_core::block::ExecutionPayloadHeader;
use beacon_core::merkle::HashTreeRoot;
use beacon_core::state::BeaconState;
use beacon_core::{ChainConfig, ForkSeq, Slot, ZERO_HASH};
use rpds::VectorSync;
// internal
use crate::epoch::process_epoch;
use crate::LedgerError;

/// Advance `state` through every empty slot up to `slot`. A state already at
/// `slot` is returned untouched.
pub fn process_slots(
    config: &ChainConfig,
    mut state: BeaconState,
    slot: Slot,
) -> Result<BeaconState, LedgerError> {
    if state.slot > slot {
        return Err(LedgerError::SlotInPast {
            state: state.slot,
            target: slot,
        });
    }
    let preset = config.preset();
    while state.slot < slot {
        process_slot(config, &mut state);
        if (state.slot + 1).is_epoch_start(preset.slots_per_epoch) {
            process_epoch(config, &mut state);
        }
        state.slot = state.slot + 1;
        if state.slot.is_epoch_start(preset.slots_per_epoch) {
            upgrade_state(config, &mut state);
        }
    }
    Ok(state)
}

/// Cache the roots of the state and of the latest block before leaving the slot.
fn process_slot(config: &ChainConfig, state: &mut BeaconState) {
    let preset = config.preset();
    let index = (state.slot.as_u64() % preset.slots_per_historical_root) as usize;
    let previous_state_root = state.hash_tree_root();
    state.state_roots.set_mut(index, previous_state_root);
    if state.latest_block_header.state_root == ZERO_HASH {
        state.latest_block_header.state_root = previous_state_root;
    }
    let previous_block_root = state.latest_block_header.hash_tree_root();
    state.block_roots.set_mut(index, previous_block_root);
}

/// Apply every fork upgrade scheduled at or before the state's epoch.
pub(crate) fn upgrade_state(config: &ChainConfig, state: &mut BeaconState) {
    let target = config.fork_at_slot(state.slot);
    while state.fork < target {
        let Some(next) = ForkSeq::ALL.get(state.fork as usize + 1).copied() else {
            break;
        };
        match next {
            ForkSeq::Altair => upgrade_to_altair(config, state),
            ForkSeq::Bellatrix => {
                state.latest_execution_payload_header = Some(ExecutionPayloadHeader::default());
            }
            ForkSeq::Phase0 | ForkSeq::Capella | ForkSeq::Eip4844 => {}
        }
        tracing::info!(slot = %state.slot, fork = %next, "upgraded state");
        state.fork = next;
    }
}

fn upgrade_to_altair(config: &ChainConfig, state: &mut BeaconState) {
    let preset = config.preset();
    let zero_participation: VectorSync<u8> = state.validators.iter().map(|_| 0).collect();
    state.previous_epoch_participation = zero_participation.clone();
    state.current_epoch_participation = zero_participation;
    state.previous_epoch_attestations = VectorSync::new_sync();
    state.current_epoch_attestations = VectorSync::new_sync();
    let committee = state.compute_sync_committee(preset, state.current_epoch(preset));
    state.current_sync_committee = Some(committee.clone());
    state.next_sync_committee = Some(committee);
}
