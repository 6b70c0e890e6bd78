// std
use std::fmt::{Display, Formatter};
// crates
use serde::{Deserialize, Serialize};
// internal

/// Protocol versions in activation order. Validation rules are gated with
/// "at or after" comparisons, so the discriminant order is load bearing.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ForkSeq {
    #[default]
    Phase0 = 0,
    Altair = 1,
    Bellatrix = 2,
    Capella = 3,
    Eip4844 = 4,
}

impl ForkSeq {
    pub const ALL: [ForkSeq; 5] = [
        ForkSeq::Phase0,
        ForkSeq::Altair,
        ForkSeq::Bellatrix,
        ForkSeq::Capella,
        ForkSeq::Eip4844,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ForkSeq::Phase0 => "phase0",
            ForkSeq::Altair => "altair",
            ForkSeq::Bellatrix => "bellatrix",
            ForkSeq::Capella => "capella",
            ForkSeq::Eip4844 => "eip4844",
        }
    }

    pub fn previous(&self) -> Option<ForkSeq> {
        match self {
            ForkSeq::Phase0 => None,
            ForkSeq::Altair => Some(ForkSeq::Phase0),
            ForkSeq::Bellatrix => Some(ForkSeq::Altair),
            ForkSeq::Capella => Some(ForkSeq::Bellatrix),
            ForkSeq::Eip4844 => Some(ForkSeq::Capella),
        }
    }

    pub fn has_sync_committee(&self) -> bool {
        *self >= ForkSeq::Altair
    }

    pub fn has_execution(&self) -> bool {
        *self >= ForkSeq::Bellatrix
    }

    pub fn has_blobs(&self) -> bool {
        *self >= ForkSeq::Eip4844
    }
}

impl Display for ForkSeq {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
