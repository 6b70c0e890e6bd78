// crates
use serde::{Deserialize, Serialize};
// internal
use crate::fork::ForkSeq;
use crate::primitives::{Epoch, Slot, FAR_FUTURE_EPOCH};

pub const BYTES_PER_FIELD_ELEMENT: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PresetName {
    #[default]
    Mainnet,
    Minimal,
}

/// Sizing and economic constants fixed at compile time for a network family.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Preset {
    pub name: PresetName,
    pub slots_per_epoch: u64,
    pub min_seed_lookahead: u64,
    pub epochs_per_eth1_voting_period: u64,
    pub slots_per_historical_root: u64,
    pub epochs_per_historical_vector: u64,
    pub epochs_per_slashings_vector: u64,
    pub shard_committee_period: u64,
    pub sync_committee_size: usize,
    pub epochs_per_sync_committee_period: u64,
    pub max_proposer_slashings: usize,
    pub max_attester_slashings: usize,
    pub max_attestations: usize,
    pub max_deposits: usize,
    pub max_voluntary_exits: usize,
    pub max_effective_balance: u64,
    pub effective_balance_increment: u64,
    pub ejection_balance: u64,
    pub base_reward_factor: u64,
    pub whistleblower_reward_quotient: u64,
    pub proposer_reward_quotient: u64,
    pub min_slashing_penalty_quotient: u64,
    pub min_slashing_penalty_quotient_altair: u64,
    pub min_slashing_penalty_quotient_bellatrix: u64,
    pub field_elements_per_blob: usize,
    pub max_blobs_per_block: usize,
}

pub const MAINNET: Preset = Preset {
    name: PresetName::Mainnet,
    slots_per_epoch: 32,
    min_seed_lookahead: 1,
    epochs_per_eth1_voting_period: 64,
    slots_per_historical_root: 8192,
    epochs_per_historical_vector: 65536,
    epochs_per_slashings_vector: 8192,
    shard_committee_period: 256,
    sync_committee_size: 512,
    epochs_per_sync_committee_period: 256,
    max_proposer_slashings: 16,
    max_attester_slashings: 2,
    max_attestations: 128,
    max_deposits: 16,
    max_voluntary_exits: 16,
    max_effective_balance: 32_000_000_000,
    effective_balance_increment: 1_000_000_000,
    ejection_balance: 16_000_000_000,
    base_reward_factor: 64,
    whistleblower_reward_quotient: 512,
    proposer_reward_quotient: 8,
    min_slashing_penalty_quotient: 128,
    min_slashing_penalty_quotient_altair: 64,
    min_slashing_penalty_quotient_bellatrix: 32,
    field_elements_per_blob: 4096,
    max_blobs_per_block: 16,
};

pub const MINIMAL: Preset = Preset {
    name: PresetName::Minimal,
    slots_per_epoch: 8,
    min_seed_lookahead: 1,
    epochs_per_eth1_voting_period: 4,
    slots_per_historical_root: 64,
    epochs_per_historical_vector: 64,
    epochs_per_slashings_vector: 64,
    shard_committee_period: 64,
    sync_committee_size: 32,
    epochs_per_sync_committee_period: 8,
    max_proposer_slashings: 16,
    max_attester_slashings: 2,
    max_attestations: 128,
    max_deposits: 16,
    max_voluntary_exits: 16,
    max_effective_balance: 32_000_000_000,
    effective_balance_increment: 1_000_000_000,
    ejection_balance: 16_000_000_000,
    base_reward_factor: 64,
    whistleblower_reward_quotient: 512,
    proposer_reward_quotient: 8,
    min_slashing_penalty_quotient: 64,
    min_slashing_penalty_quotient_altair: 64,
    min_slashing_penalty_quotient_bellatrix: 32,
    field_elements_per_blob: 4,
    max_blobs_per_block: 4,
};

impl PresetName {
    pub fn preset(&self) -> &'static Preset {
        match self {
            PresetName::Mainnet => &MAINNET,
            PresetName::Minimal => &MINIMAL,
        }
    }
}

impl Preset {
    pub fn bytes_per_blob(&self) -> usize {
        self.field_elements_per_blob * BYTES_PER_FIELD_ELEMENT
    }

    pub fn slots_per_eth1_voting_period(&self) -> u64 {
        self.epochs_per_eth1_voting_period * self.slots_per_epoch
    }

    pub fn min_slashing_penalty_quotient_at(&self, fork: ForkSeq) -> u64 {
        match fork {
            ForkSeq::Phase0 => self.min_slashing_penalty_quotient,
            ForkSeq::Altair => self.min_slashing_penalty_quotient_altair,
            _ => self.min_slashing_penalty_quotient_bellatrix,
        }
    }
}

/// Runtime chain parameters, loadable from YAML.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    pub preset: PresetName,
    pub seconds_per_slot: u64,
    #[serde(default = "far_future")]
    pub altair_fork_epoch: Epoch,
    #[serde(default = "far_future")]
    pub bellatrix_fork_epoch: Epoch,
    #[serde(default = "far_future")]
    pub capella_fork_epoch: Epoch,
    #[serde(default = "far_future")]
    pub eip4844_fork_epoch: Epoch,
}

fn far_future() -> Epoch {
    FAR_FUTURE_EPOCH
}

impl ChainConfig {
    pub fn mainnet() -> Self {
        Self {
            preset: PresetName::Mainnet,
            seconds_per_slot: 12,
            altair_fork_epoch: Epoch::new(74240),
            bellatrix_fork_epoch: Epoch::new(144896),
            capella_fork_epoch: Epoch::new(194048),
            eip4844_fork_epoch: FAR_FUTURE_EPOCH,
        }
    }

    /// Minimal preset with every fork active from genesis onwards up to `fork`.
    pub fn minimal_at(fork: ForkSeq) -> Self {
        let activation = |at: ForkSeq| {
            if at <= fork {
                Epoch::new(0)
            } else {
                FAR_FUTURE_EPOCH
            }
        };
        Self {
            preset: PresetName::Minimal,
            seconds_per_slot: 6,
            altair_fork_epoch: activation(ForkSeq::Altair),
            bellatrix_fork_epoch: activation(ForkSeq::Bellatrix),
            capella_fork_epoch: activation(ForkSeq::Capella),
            eip4844_fork_epoch: activation(ForkSeq::Eip4844),
        }
    }

    pub fn preset(&self) -> &'static Preset {
        self.preset.preset()
    }

    pub fn fork_epoch(&self, fork: ForkSeq) -> Epoch {
        match fork {
            ForkSeq::Phase0 => Epoch::new(0),
            ForkSeq::Altair => self.altair_fork_epoch,
            ForkSeq::Bellatrix => self.bellatrix_fork_epoch,
            ForkSeq::Capella => self.capella_fork_epoch,
            ForkSeq::Eip4844 => self.eip4844_fork_epoch,
        }
    }

    pub fn fork_at_epoch(&self, epoch: Epoch) -> ForkSeq {
        ForkSeq::ALL
            .iter()
            .rev()
            .copied()
            .find(|fork| self.fork_epoch(*fork) <= epoch)
            .unwrap_or(ForkSeq::Phase0)
    }

    pub fn fork_at_slot(&self, slot: Slot) -> ForkSeq {
        self.fork_at_epoch(self.epoch_at_slot(slot))
    }

    pub fn epoch_at_slot(&self, slot: Slot) -> Epoch {
        slot.epoch(self.preset().slots_per_epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fork_schedule() {
        let config = ChainConfig {
            preset: PresetName::Minimal,
            seconds_per_slot: 6,
            altair_fork_epoch: Epoch::new(1),
            bellatrix_fork_epoch: Epoch::new(2),
            capella_fork_epoch: Epoch::new(2),
            eip4844_fork_epoch: Epoch::new(4),
        };
        assert_eq!(config.fork_at_slot(Slot::new(7)), ForkSeq::Phase0);
        assert_eq!(config.fork_at_slot(Slot::new(8)), ForkSeq::Altair);
        assert_eq!(config.fork_at_epoch(Epoch::new(2)), ForkSeq::Capella);
        assert_eq!(config.fork_at_epoch(Epoch::new(3)), ForkSeq::Capella);
        assert_eq!(config.fork_at_epoch(Epoch::new(4)), ForkSeq::Eip4844);
    }

    #[test]
    fn load_from_yaml() {
        let yaml = r#"
preset: minimal
seconds_per_slot: 6
altair_fork_epoch: 0
bellatrix_fork_epoch: 0
"#;
        let config: ChainConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.preset().field_elements_per_blob, 4);
        assert_eq!(config.fork_at_epoch(Epoch::new(10)), ForkSeq::Bellatrix);
        assert_eq!(config.eip4844_fork_epoch, FAR_FUTURE_EPOCH);
    }

    #[test]
    fn minimal_at_activates_every_prior_fork() {
        let config = ChainConfig::minimal_at(ForkSeq::Eip4844);
        assert_eq!(config.fork_at_epoch(Epoch::new(0)), ForkSeq::Eip4844);
        assert_eq!(config.preset().bytes_per_blob(), 128);
    }
}
