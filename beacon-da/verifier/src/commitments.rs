// crates
use beacon_core::block::Transaction;
use beacon_core::da::{
    kzg_commitment_to_versioned_hash, tx_peek_blob_versioned_hashes, KzgCommitment,
    TxParseError, VersionedHash, BLOB_TX_TYPE,
};
use thiserror::Error;
// internal

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlobCommitmentsError {
    #[error("Transaction {index} is malformed: {source}")]
    MalformedTransaction {
        index: usize,
        #[source]
        source: TxParseError,
    },
    #[error("Transactions carry {hashes} versioned hashes for {commitments} commitments")]
    CountMismatch { hashes: usize, commitments: usize },
    #[error("Versioned hash {index} does not match its commitment")]
    HashMismatch { index: usize },
}

/// Versioned hashes of every blob transaction, in transaction order.
pub fn blob_versioned_hashes(
    transactions: &[Transaction],
) -> Result<Vec<VersionedHash>, BlobCommitmentsError> {
    let mut hashes = Vec::new();
    for (index, tx) in transactions.iter().enumerate() {
        if tx.first() != Some(&BLOB_TX_TYPE) {
            continue;
        }
        let tx_hashes = tx_peek_blob_versioned_hashes(tx)
            .map_err(|source| BlobCommitmentsError::MalformedTransaction { index, source })?;
        hashes.extend(tx_hashes);
    }
    Ok(hashes)
}

/// Check the commitments declared by a block against the versioned hashes its
/// blob transactions reference: same length, same order, same bytes.
pub fn verify_kzg_commitments_against_transactions(
    transactions: &[Transaction],
    commitments: &[KzgCommitment],
) -> Result<(), BlobCommitmentsError> {
    let hashes = blob_versioned_hashes(transactions)?;
    if hashes.len() != commitments.len() {
        return Err(BlobCommitmentsError::CountMismatch {
            hashes: hashes.len(),
            commitments: commitments.len(),
        });
    }
    match hashes
        .iter()
        .zip(commitments)
        .position(|(hash, commitment)| *hash != kzg_commitment_to_versioned_hash(commitment))
    {
        Some(index) => Err(BlobCommitmentsError::HashMismatch { index }),
        None => Ok(()),
    }
}
