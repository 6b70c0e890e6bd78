mod block;
mod epoch;
mod genesis;
mod signature;
mod slots;
#[cfg(any(test, feature = "testutils"))]
pub mod testutils;

// std
use std::fmt::{Display, Formatter};
// crates
use beacon_core::block::{BeaconBlock, SignedBeaconBlock};
use beacon_core::crypto::{compute_domain, compute_signing_root, BlsSignature, DOMAIN_BEACON_PROPOSER};
use beacon_core::da::BlobsSidecar;
use beacon_core::merkle::HashTreeRoot;
use beacon_core::state::BeaconState;
use beacon_core::{ChainConfig, ForkSeq, Root, Slot, ValidatorIndex};
use beacon_da_verifier::{BlobCommitmentsError, DataAvailability, DataAvailabilityChecker, SidecarValidationError};
use thiserror::Error;
// internal
pub use block::process_block;
pub use genesis::{empty_block_body, initialize_beacon_state, GenesisValidator};
pub use signature::{BlstVerifier, SignatureVerifier, DST_BLS12381};
pub use slots::process_slots;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignatureKind {
    Proposer,
    Randao,
    ProposerSlashing,
    AttesterSlashing,
    Attestation,
    VoluntaryExit,
    SyncAggregate,
}

impl Display for SignatureKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::Proposer => "proposer",
            Self::Randao => "randao",
            Self::ProposerSlashing => "proposer slashing",
            Self::AttesterSlashing => "attester slashing",
            Self::Attestation => "attestation",
            Self::VoluntaryExit => "voluntary exit",
            Self::SyncAggregate => "sync aggregate",
        };
        write!(f, "{kind}")
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Cannot move state at slot {state} back to slot {target}")]
    SlotInPast { state: Slot, target: Slot },
    #[error("Block slot {block} does not match state slot {state}")]
    BlockSlotMismatch { state: Slot, block: Slot },
    #[error("Block slot {block} is not newer than the latest block slot {latest}")]
    BlockNotNewer { latest: Slot, block: Slot },
    #[error("Got a {block} block for a {state} state")]
    ForkMismatch { state: ForkSeq, block: ForkSeq },
    #[error("Block proposer {actual} is not the expected proposer {expected}")]
    ProposerMismatch {
        expected: ValidatorIndex,
        actual: ValidatorIndex,
    },
    #[error("No active validators")]
    NoActiveValidators,
    #[error(
        "Parent root {} does not match the latest block {}",
        const_hex::encode(.actual),
        const_hex::encode(.expected)
    )]
    ParentRootMismatch { expected: Root, actual: Root },
    #[error("Proposer {0} is slashed")]
    ProposerSlashed(ValidatorIndex),
    #[error("Unknown validator {0}")]
    UnknownValidator(ValidatorIndex),
    #[error("Invalid {0} signature")]
    InvalidSignature(SignatureKind),
    #[error("Execution payload does not extend the latest execution block")]
    PayloadParentHashMismatch,
    #[error("Execution payload prev_randao does not match the current randao mix")]
    PayloadPrevRandaoMismatch,
    #[error("Execution payload timestamp is {actual}, expected {expected}")]
    PayloadTimestampMismatch { expected: u64, actual: u64 },
    #[error("Timestamp of slot {slot} overflows")]
    SlotTimestampOverflow { slot: Slot },
    #[error("Too many {kind}: {count} > {max}")]
    TooManyOperations {
        kind: &'static str,
        count: usize,
        max: usize,
    },
    #[error("Block has {actual} deposits, expected {expected}")]
    DepositCountMismatch { expected: usize, actual: usize },
    #[error("Invalid proposer slashing: {0}")]
    InvalidProposerSlashing(&'static str),
    #[error("Invalid attester slashing: {0}")]
    InvalidAttesterSlashing(&'static str),
    #[error("Invalid indexed attestation: {0}")]
    InvalidIndexedAttestation(&'static str),
    #[error("Invalid attestation: {0}")]
    InvalidAttestation(&'static str),
    #[error("Invalid voluntary exit: {0}")]
    InvalidVoluntaryExit(&'static str),
    #[error("Sync aggregate has {actual} bits, expected {expected}")]
    SyncCommitteeBitsLength { expected: usize, actual: usize },
    #[error("State has no current sync committee")]
    MissingSyncCommittee,
    #[error("Invalid blob commitments: {0}")]
    InvalidBlobCommitments(#[from] BlobCommitmentsError),
    #[error("Invalid blobs sidecar: {0}")]
    InvalidSidecar(#[from] SidecarValidationError),
    #[error("Blob verification needs a data availability checker")]
    NoDataAvailabilityChecker,
    #[error(
        "Post state root {} does not match block state root {}",
        const_hex::encode(.actual),
        const_hex::encode(.expected)
    )]
    StateRootMismatch { expected: Root, actual: Root },
}

/// Which checks a transition runs. Mutations happen regardless.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransitionOpts {
    pub verify_state_root: bool,
    pub verify_proposer: bool,
    pub verify_signatures: bool,
    pub verify_blobs: bool,
}

impl Default for TransitionOpts {
    fn default() -> Self {
        Self {
            verify_state_root: true,
            verify_proposer: true,
            verify_signatures: true,
            verify_blobs: true,
        }
    }
}

impl TransitionOpts {
    /// Nothing is verified: for blocks assembled locally from trusted data.
    pub fn trusted() -> Self {
        Self {
            verify_state_root: false,
            verify_proposer: false,
            verify_signatures: false,
            verify_blobs: false,
        }
    }
}

/// Collaborators shared by every transition of a chain.
#[derive(Clone, Copy)]
pub struct TransitionContext<'a> {
    pub config: &'a ChainConfig,
    pub verifier: &'a dyn SignatureVerifier,
    pub data_availability: Option<&'a DataAvailabilityChecker>,
}

impl<'a> TransitionContext<'a> {
    pub fn new(config: &'a ChainConfig, verifier: &'a dyn SignatureVerifier) -> Self {
        Self {
            config,
            verifier,
            data_availability: None,
        }
    }

    pub fn with_data_availability(mut self, checker: &'a DataAvailabilityChecker) -> Self {
        self.data_availability = Some(checker);
        self
    }
}

#[derive(Debug)]
pub struct Transition {
    pub state: BeaconState,
    /// `None` before the blob fork or when blobs were not checked.
    pub data_availability: Option<DataAvailability>,
}

/// Advance `state` to the block slot and apply the block.
pub fn state_transition(
    ctx: TransitionContext<'_>,
    state: BeaconState,
    signed_block: &SignedBeaconBlock,
    sidecar: Option<&BlobsSidecar>,
    opts: TransitionOpts,
) -> Result<Transition, LedgerError> {
    let block = &signed_block.message;
    let mut state = process_slots(ctx.config, state, block.slot)?;
    if opts.verify_proposer {
        verify_block_signature(ctx.verifier, &state, signed_block)?;
    }
    let data_availability = process_block(ctx, &mut state, block, sidecar, opts)?;
    if opts.verify_state_root {
        let actual = state.hash_tree_root();
        if actual != block.state_root {
            return Err(LedgerError::StateRootMismatch {
                expected: block.state_root,
                actual,
            });
        }
    }
    Ok(Transition {
        state,
        data_availability,
    })
}

pub fn verify_block_signature(
    verifier: &dyn SignatureVerifier,
    state: &BeaconState,
    signed_block: &SignedBeaconBlock,
) -> Result<(), LedgerError> {
    let proposer_index = signed_block.message.proposer_index;
    let proposer = state
        .validator(proposer_index)
        .ok_or(LedgerError::UnknownValidator(proposer_index))?;
    let domain = compute_domain(DOMAIN_BEACON_PROPOSER, &state.genesis_validators_root);
    let signing_root = compute_signing_root(&signed_block.message, &domain);
    if !verifier.verify(&proposer.pubkey, &signing_root, &signed_block.signature) {
        return Err(LedgerError::InvalidSignature(SignatureKind::Proposer));
    }
    Ok(())
}

/// Post-state root of `block` on top of `state`, with every check disabled.
/// Used while producing a block, before its state root is known.
pub fn compute_new_state_root(
    ctx: TransitionContext<'_>,
    state: BeaconState,
    block: &BeaconBlock,
) -> Result<Root, LedgerError> {
    let signed_block = SignedBeaconBlock {
        message: block.clone(),
        signature: BlsSignature::empty(),
    };
    let transition = state_transition(ctx, state, &signed_block, None, TransitionOpts::trusted())?;
    Ok(transition.state.hash_tree_root())
}
