pub mod availability;
pub mod commitments;
pub mod production;

pub use availability::{
    DataAvailability, DataAvailabilityChecker, KzgFailurePolicy, NotAvailableReason,
    SidecarValidationError,
};
pub use commitments::{
    blob_versioned_hashes, verify_kzg_commitments_against_transactions, BlobCommitmentsError,
};
pub use production::{blobs_sidecar, validate_blobs_and_kzg_commitments, BlobsProductionError};
