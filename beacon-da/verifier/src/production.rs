// crates
use beacon_core::block::{BeaconBlock, Transaction};
use beacon_core::da::{Blob, BlobsSidecar, KzgCommitment};
use beacon_core::merkle::HashTreeRoot;
use beacon_kzg::{blob_to_kzg_commitment, compute_aggregate_kzg_proof, KzgError, KzgSettings};
use thiserror::Error;
// internal
use crate::commitments::{verify_kzg_commitments_against_transactions, BlobCommitmentsError};

#[derive(Error, Debug)]
pub enum BlobsProductionError {
    #[error("Got {blobs} blobs for {commitments} commitments")]
    LengthMismatch { blobs: usize, commitments: usize },
    #[error("Commitment {0} does not commit to its blob")]
    CommitmentMismatch(usize),
    #[error(transparent)]
    Commitments(#[from] BlobCommitmentsError),
    #[error(transparent)]
    Kzg(#[from] KzgError),
}

/// Consistency check a block producer runs on the blobs bundle returned by the
/// execution engine before building a block around it.
pub fn validate_blobs_and_kzg_commitments(
    transactions: &[Transaction],
    blobs: &[Blob],
    commitments: &[KzgCommitment],
    settings: &KzgSettings,
) -> Result<(), BlobsProductionError> {
    if blobs.len() != commitments.len() {
        return Err(BlobsProductionError::LengthMismatch {
            blobs: blobs.len(),
            commitments: commitments.len(),
        });
    }
    for (index, (blob, commitment)) in blobs.iter().zip(commitments).enumerate() {
        if blob_to_kzg_commitment(blob, settings)? != *commitment {
            return Err(BlobsProductionError::CommitmentMismatch(index));
        }
    }
    verify_kzg_commitments_against_transactions(transactions, commitments)?;
    Ok(())
}

/// Sidecar carrying `blobs` for `block`, with the aggregate proof over them.
pub fn blobs_sidecar(
    block: &BeaconBlock,
    blobs: Vec<Blob>,
    settings: &KzgSettings,
) -> Result<BlobsSidecar, KzgError> {
    let kzg_aggregated_proof = compute_aggregate_kzg_proof(&blobs, settings)?;
    Ok(BlobsSidecar {
        beacon_block_root: block.hash_tree_root(),
        beacon_block_slot: block.slot,
        blobs,
        kzg_aggregated_proof,
    })
}

#[cfg(test)]
mod tests {
    use beacon_core::block::{BeaconBlockBody, BodyBase, ExecutionPayload, SyncAggregate};
    use beacon_core::da::{encode_blob_transaction, kzg_commitment_to_versioned_hash};
    use beacon_core::Slot;
    use beacon_kzg::testutils::{random_blob, MINIMAL_SETTINGS};

    use super::*;
    use crate::availability::DataAvailabilityChecker;

    fn bundle(count: usize) -> (Vec<Blob>, Vec<KzgCommitment>, Vec<Transaction>) {
        let blobs: Vec<Blob> = (0..count).map(|_| random_blob(4)).collect();
        let commitments: Vec<KzgCommitment> = blobs
            .iter()
            .map(|blob| blob_to_kzg_commitment(blob, &MINIMAL_SETTINGS).unwrap())
            .collect();
        let hashes: Vec<_> = commitments
            .iter()
            .map(kzg_commitment_to_versioned_hash)
            .collect();
        (blobs, commitments, vec![encode_blob_transaction(&hashes)])
    }

    #[test]
    fn consistent_bundle() {
        let (blobs, commitments, transactions) = bundle(2);
        validate_blobs_and_kzg_commitments(&transactions, &blobs, &commitments, &MINIMAL_SETTINGS)
            .unwrap();
    }

    #[test]
    fn commitment_for_another_blob() {
        let (mut blobs, commitments, transactions) = bundle(2);
        blobs[1] = random_blob(4);
        assert!(matches!(
            validate_blobs_and_kzg_commitments(
                &transactions,
                &blobs,
                &commitments,
                &MINIMAL_SETTINGS
            ),
            Err(BlobsProductionError::CommitmentMismatch(1))
        ));
    }

    #[test]
    fn transactions_must_reference_the_commitments() {
        let (blobs, commitments, _) = bundle(1);
        assert!(matches!(
            validate_blobs_and_kzg_commitments(&[], &blobs, &commitments, &MINIMAL_SETTINGS),
            Err(BlobsProductionError::Commitments(_))
        ));
    }

    #[test]
    fn produced_sidecar_is_available() {
        let (blobs, commitments, transactions) = bundle(3);
        let block = BeaconBlock {
            slot: Slot::new(9),
            proposer_index: 1,
            parent_root: [1; 32],
            state_root: [2; 32],
            body: BeaconBlockBody::Eip4844 {
                base: BodyBase::default(),
                sync_aggregate: SyncAggregate::empty(32),
                execution_payload: ExecutionPayload {
                    transactions,
                    ..Default::default()
                },
                blob_kzg_commitments: commitments.clone(),
            },
        };
        let sidecar = blobs_sidecar(&block, blobs, &MINIMAL_SETTINGS).unwrap();
        assert_eq!(sidecar.beacon_block_slot, block.slot);
        let checker = DataAvailabilityChecker::new(MINIMAL_SETTINGS.clone());
        checker
            .validate_blobs_sidecar(block.slot, block.hash_tree_root(), &commitments, &sidecar)
            .unwrap();
    }
}
