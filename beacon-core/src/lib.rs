pub mod block;
pub mod config;
pub mod crypto;
pub mod da;
pub mod fork;
pub mod merkle;
pub mod primitives;
pub mod state;
pub mod utils;
pub mod wire;

pub use config::{ChainConfig, Preset, PresetName};
pub use fork::ForkSeq;
pub use primitives::{Epoch, Gwei, Root, Slot, ValidatorIndex, GENESIS_SLOT, ZERO_HASH};
