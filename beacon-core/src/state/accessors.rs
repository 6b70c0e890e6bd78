// internal
use super::{BeaconState, SyncCommittee, Validator};
use crate::config::Preset;
use crate::crypto::{sha256, DomainType, DOMAIN_BEACON_PROPOSER, DOMAIN_SYNC_COMMITTEE};
use crate::primitives::{Epoch, Gwei, Root, Slot, ValidatorIndex, ZERO_HASH};

const BASE_REWARDS_PER_EPOCH: u64 = 4;

pub fn integer_sqrt(n: u64) -> u64 {
    if n == 0 {
        return 0;
    }
    let mut x = n;
    let mut y = x / 2 + x % 2;
    while y < x {
        x = y;
        y = (x + n / x) / 2;
    }
    x
}

fn bytes_to_u64(bytes: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(raw)
}

impl BeaconState {
    pub fn current_epoch(&self, preset: &Preset) -> Epoch {
        self.slot.epoch(preset.slots_per_epoch)
    }

    pub fn previous_epoch(&self, preset: &Preset) -> Epoch {
        self.current_epoch(preset).saturating_sub(1)
    }

    pub fn validator(&self, index: ValidatorIndex) -> Option<&Validator> {
        self.validators.get(index as usize)
    }

    pub fn balance(&self, index: ValidatorIndex) -> Option<Gwei> {
        self.balances.get(index as usize).copied()
    }

    pub fn randao_mix(&self, preset: &Preset, epoch: Epoch) -> Root {
        let index = epoch.as_u64() % preset.epochs_per_historical_vector;
        self.randao_mixes
            .get(index as usize)
            .copied()
            .unwrap_or(ZERO_HASH)
    }

    /// Block root at a slot still covered by the historical buffer.
    pub fn block_root_at_slot(&self, preset: &Preset, slot: Slot) -> Option<Root> {
        if slot >= self.slot || self.slot.as_u64() > slot.as_u64() + preset.slots_per_historical_root
        {
            return None;
        }
        let index = slot.as_u64() % preset.slots_per_historical_root;
        self.block_roots.get(index as usize).copied()
    }

    pub fn active_validator_indices(&self, epoch: Epoch) -> Vec<ValidatorIndex> {
        self.validators
            .iter()
            .enumerate()
            .filter(|(_, validator)| validator.is_active(epoch))
            .map(|(index, _)| index as ValidatorIndex)
            .collect()
    }

    /// Never zero, so it can be used as a divisor.
    pub fn total_active_balance(&self, preset: &Preset, epoch: Epoch) -> Gwei {
        let total: Gwei = self
            .validators
            .iter()
            .filter(|validator| validator.is_active(epoch))
            .map(|validator| validator.effective_balance)
            .sum();
        total.max(preset.effective_balance_increment)
    }

    pub fn seed(&self, preset: &Preset, epoch: Epoch, domain_type: DomainType) -> Root {
        let mix_epoch = (epoch + preset.epochs_per_historical_vector)
            .saturating_sub(preset.min_seed_lookahead + 1);
        let mut preimage = Vec::with_capacity(44);
        preimage.extend_from_slice(&domain_type.0);
        preimage.extend_from_slice(&epoch.to_le_bytes());
        preimage.extend_from_slice(&self.randao_mix(preset, mix_epoch));
        sha256(&preimage)
    }

    /// Proposer for the current slot, sampled uniformly from the active set
    /// with the epoch seed.
    pub fn beacon_proposer_index(&self, preset: &Preset) -> Option<ValidatorIndex> {
        let epoch = self.current_epoch(preset);
        let active = self.active_validator_indices(epoch);
        if active.is_empty() {
            return None;
        }
        let mut preimage = self.seed(preset, epoch, DOMAIN_BEACON_PROPOSER).to_vec();
        preimage.extend_from_slice(&self.slot.to_le_bytes());
        let draw = bytes_to_u64(&sha256(&preimage));
        Some(active[(draw % active.len() as u64) as usize])
    }

    /// Validators attesting at `slot`: the active validators whose index
    /// falls on the slot's position within the epoch, in index order.
    pub fn beacon_committee(&self, preset: &Preset, slot: Slot) -> Vec<ValidatorIndex> {
        let position = slot.as_u64() % preset.slots_per_epoch;
        self.active_validator_indices(slot.epoch(preset.slots_per_epoch))
            .into_iter()
            .filter(|index| index % preset.slots_per_epoch == position)
            .collect()
    }

    pub fn base_reward(&self, preset: &Preset, index: ValidatorIndex, total_balance: Gwei) -> Gwei {
        let effective_balance = self
            .validator(index)
            .map_or(0, |validator| validator.effective_balance);
        effective_balance * preset.base_reward_factor
            / integer_sqrt(total_balance)
            / BASE_REWARDS_PER_EPOCH
    }

    pub fn base_reward_per_increment(&self, preset: &Preset, total_balance: Gwei) -> Gwei {
        preset.effective_balance_increment * preset.base_reward_factor
            / integer_sqrt(total_balance).max(1)
    }

    /// Sample the sync committee serving the period starting at `epoch`.
    /// Members may repeat when there are fewer active validators than seats.
    pub fn compute_sync_committee(&self, preset: &Preset, epoch: Epoch) -> SyncCommittee {
        let active = self.active_validator_indices(epoch);
        if active.is_empty() {
            return SyncCommittee::default();
        }
        let seed = self.seed(preset, epoch, DOMAIN_SYNC_COMMITTEE);
        let members = (0..preset.sync_committee_size as u64)
            .map(|seat| {
                let mut preimage = seed.to_vec();
                preimage.extend_from_slice(&seat.to_le_bytes());
                let draw = bytes_to_u64(&sha256(&preimage));
                active[(draw % active.len() as u64) as usize]
            })
            .collect();
        SyncCommittee { members }
    }

    pub fn increase_balance(&mut self, index: ValidatorIndex, delta: Gwei) {
        if let Some(balance) = self.balance(index) {
            self.balances
                .set_mut(index as usize, balance.saturating_add(delta));
        }
    }

    pub fn decrease_balance(&mut self, index: ValidatorIndex, delta: Gwei) {
        if let Some(balance) = self.balance(index) {
            self.balances
                .set_mut(index as usize, balance.saturating_sub(delta));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::sample_state;
    use super::*;
    use crate::config::MINIMAL;

    #[test]
    fn sqrt() {
        assert_eq!(integer_sqrt(0), 0);
        assert_eq!(integer_sqrt(15), 3);
        assert_eq!(integer_sqrt(16), 4);
        assert_eq!(integer_sqrt(u64::MAX), 4294967295);
    }

    #[test]
    fn proposer_is_active_and_deterministic() {
        let mut state = sample_state(16);
        state.slot = Slot::new(5);
        let proposer = state.beacon_proposer_index(&MINIMAL).unwrap();
        assert!(proposer < 16);
        assert_eq!(state.beacon_proposer_index(&MINIMAL), Some(proposer));
    }

    #[test]
    fn no_proposer_without_active_validators() {
        let state = sample_state(0);
        assert_eq!(state.beacon_proposer_index(&MINIMAL), None);
    }

    #[test]
    fn committees_partition_the_epoch() {
        let state = sample_state(20);
        let assigned: usize = (0..MINIMAL.slots_per_epoch)
            .map(|slot| state.beacon_committee(&MINIMAL, Slot::new(slot)).len())
            .sum();
        assert_eq!(assigned, 20);
        assert_eq!(state.beacon_committee(&MINIMAL, Slot::new(1)), vec![1, 9, 17]);
    }

    #[test]
    fn balance_updates_saturate() {
        let mut state = sample_state(2);
        state.decrease_balance(0, u64::MAX);
        state.increase_balance(1, 5);
        assert_eq!(state.balance(0), Some(0));
        assert_eq!(state.balance(1), Some(MINIMAL.max_effective_balance + 5));
        // unknown validators are ignored
        state.increase_balance(7, 5);
    }

    #[test]
    fn sync_committee_has_fixed_size() {
        let state = sample_state(10);
        let committee = state.compute_sync_committee(&MINIMAL, Epoch::new(0));
        assert_eq!(committee.members.len(), MINIMAL.sync_committee_size);
        assert!(committee.members.iter().all(|member| *member < 10));
    }
}
