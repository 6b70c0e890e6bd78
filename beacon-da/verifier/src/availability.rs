// std
use std::sync::Arc;
// crates
use beacon_core::da::{BlobsSidecar, KzgCommitment};
use beacon_core::{Root, Slot};
use beacon_kzg::{verify_aggregate_kzg_proof, KzgError, KzgSettings};
use serde::{Deserialize, Serialize};
use thiserror::Error;
// internal

/// What a failure inside the proof library means for the block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KzgFailurePolicy {
    /// Library errors reject the sidecar as `ProofVerificationFailed`.
    #[default]
    Reject,
    /// Library errors leave the data pending, flagged as `ProofError`.
    TreatAsPending,
}

#[derive(Debug)]
pub enum NotAvailableReason {
    Missing,
    ProofError(KzgError),
}

#[derive(Debug)]
pub enum DataAvailability {
    Available,
    NotAvailable(NotAvailableReason),
}

impl DataAvailability {
    pub fn is_available(&self) -> bool {
        matches!(self, DataAvailability::Available)
    }
}

#[derive(Error, Debug)]
pub enum SidecarValidationError {
    #[error("Sidecar is for slot {actual}, block is at slot {expected}")]
    SlotMismatch { expected: Slot, actual: Slot },
    #[error(
        "Sidecar is for block {}, expected {}",
        const_hex::encode(.actual),
        const_hex::encode(.expected)
    )]
    RootMismatch { expected: Root, actual: Root },
    #[error("Sidecar has {blobs} blobs but the block commits to {commitments}")]
    CommitmentCountMismatch { blobs: usize, commitments: usize },
    #[error("Aggregate KZG proof does not verify")]
    InvalidProof,
    #[error("Aggregate KZG proof could not be checked: {0}")]
    ProofVerificationFailed(#[source] KzgError),
}

/// Validates sidecars against the commitments declared by their block.
#[derive(Clone, Debug)]
pub struct DataAvailabilityChecker {
    settings: Arc<KzgSettings>,
    policy: KzgFailurePolicy,
}

impl DataAvailabilityChecker {
    pub fn new(settings: Arc<KzgSettings>) -> Self {
        Self::with_policy(settings, KzgFailurePolicy::default())
    }

    pub fn with_policy(settings: Arc<KzgSettings>, policy: KzgFailurePolicy) -> Self {
        Self { settings, policy }
    }

    /// Exactly one outcome per call: available, not (yet) available, or the
    /// first failing check.
    pub fn is_data_available(
        &self,
        sidecar: Option<&BlobsSidecar>,
        slot: Slot,
        block_root: Root,
        commitments: &[KzgCommitment],
    ) -> Result<DataAvailability, SidecarValidationError> {
        let Some(sidecar) = sidecar else {
            tracing::debug!(%slot, root = %const_hex::encode(block_root), "blobs sidecar missing");
            return Ok(DataAvailability::NotAvailable(NotAvailableReason::Missing));
        };
        match self.validate_blobs_sidecar(slot, block_root, commitments, sidecar) {
            Ok(()) => Ok(DataAvailability::Available),
            Err(SidecarValidationError::ProofVerificationFailed(error))
                if self.policy == KzgFailurePolicy::TreatAsPending =>
            {
                tracing::warn!(%slot, %error, "KZG library failure, treating blobs as pending");
                Ok(DataAvailability::NotAvailable(
                    NotAvailableReason::ProofError(error),
                ))
            }
            Err(error) => Err(error),
        }
    }

    /// Checks slot, root, blob count and the aggregate proof, in that order.
    pub fn validate_blobs_sidecar(
        &self,
        slot: Slot,
        block_root: Root,
        commitments: &[KzgCommitment],
        sidecar: &BlobsSidecar,
    ) -> Result<(), SidecarValidationError> {
        if sidecar.beacon_block_slot != slot {
            return Err(SidecarValidationError::SlotMismatch {
                expected: slot,
                actual: sidecar.beacon_block_slot,
            });
        }
        if sidecar.beacon_block_root != block_root {
            return Err(SidecarValidationError::RootMismatch {
                expected: block_root,
                actual: sidecar.beacon_block_root,
            });
        }
        if sidecar.blobs.len() != commitments.len() {
            return Err(SidecarValidationError::CommitmentCountMismatch {
                blobs: sidecar.blobs.len(),
                commitments: commitments.len(),
            });
        }
        // the proof primitive rejects empty input, no blobs is trivially valid
        if sidecar.blobs.is_empty() {
            return Ok(());
        }
        match verify_aggregate_kzg_proof(
            &sidecar.blobs,
            commitments,
            &sidecar.kzg_aggregated_proof,
            &self.settings,
        ) {
            Ok(true) => Ok(()),
            Ok(false) => Err(SidecarValidationError::InvalidProof),
            Err(error) => Err(SidecarValidationError::ProofVerificationFailed(error)),
        }
    }
}
