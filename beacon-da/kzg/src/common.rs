// crates
use ark_bls12_381::{Fr, G1Affine};
use ark_poly::{EvaluationDomain, Evaluations};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use beacon_core::da::{Blob, KzgCommitment, KzgProof};
use thiserror::Error;
// internal
use crate::{Commitment, Polynomial, PolynomialEvaluationDomain, Proof, BYTES_PER_FIELD_ELEMENT};

#[derive(Error, Debug)]
pub enum KzgError {
    #[error("Blob {index} has {actual} bytes, expected {expected}")]
    InvalidBlobLength {
        index: usize,
        expected: usize,
        actual: usize,
    },
    #[error("Blob {blob} holds a non canonical field element at position {element}")]
    NonCanonicalFieldElement { blob: usize, element: usize },
    #[error("Commitment {0} is not a valid compressed G1 point")]
    InvalidCommitment(usize),
    #[error("Proof is not a valid compressed G1 point")]
    InvalidProof,
    #[error("Aggregate proofs need at least one blob")]
    EmptyInput,
    #[error("Got {blobs} blobs but {commitments} commitments")]
    LengthMismatch { blobs: usize, commitments: usize },
    #[error("No evaluation domain of size {0}")]
    InvalidDomainSize(usize),
    #[error("Trusted setup supports degree {supported}, {required} required")]
    InsufficientSetup { supported: usize, required: usize },
    #[error(transparent)]
    PolyCommitError(#[from] ark_poly_commit::Error),
    #[error(transparent)]
    SerializationError(#[from] ark_serialize::SerializationError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Read a blob as evaluations of a polynomial over `domain`. Every 32 byte
/// chunk must be a canonical little endian scalar.
pub fn blob_to_evaluations(
    blob: &Blob,
    index: usize,
    domain: PolynomialEvaluationDomain,
) -> Result<Evaluations<Fr>, KzgError> {
    let expected = domain.size() * BYTES_PER_FIELD_ELEMENT;
    if blob.len() != expected {
        return Err(KzgError::InvalidBlobLength {
            index,
            expected,
            actual: blob.len(),
        });
    }
    let elements = blob
        .as_bytes()
        .chunks_exact(BYTES_PER_FIELD_ELEMENT)
        .enumerate()
        .map(|(element, chunk)| {
            Fr::deserialize_compressed(chunk).map_err(|_| KzgError::NonCanonicalFieldElement {
                blob: index,
                element,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Evaluations::from_vec_and_domain(elements, domain))
}

/// Coefficient form of the blob polynomial.
pub fn blob_to_polynomial(
    blob: &Blob,
    index: usize,
    domain: PolynomialEvaluationDomain,
) -> Result<Polynomial, KzgError> {
    blob_to_evaluations(blob, index, domain).map(Evaluations::interpolate)
}

pub fn field_element_to_bytes(element: &Fr) -> Result<[u8; 32], KzgError> {
    let mut bytes = [0u8; 32];
    element.serialize_compressed(&mut bytes[..])?;
    Ok(bytes)
}

pub fn g1_to_bytes(point: &G1Affine) -> Result<[u8; 48], KzgError> {
    let mut bytes = [0u8; 48];
    point.serialize_compressed(&mut bytes[..])?;
    Ok(bytes)
}

pub fn commitment_to_bytes(commitment: &Commitment) -> Result<KzgCommitment, KzgError> {
    g1_to_bytes(&commitment.0).map(KzgCommitment)
}

pub fn commitment_from_bytes(
    commitment: &KzgCommitment,
    index: usize,
) -> Result<Commitment, KzgError> {
    G1Affine::deserialize_compressed(commitment.as_ref())
        .map(ark_poly_commit::kzg10::Commitment)
        .map_err(|_| KzgError::InvalidCommitment(index))
}

pub fn proof_to_bytes(proof: &Proof) -> Result<KzgProof, KzgError> {
    g1_to_bytes(&proof.w).map(KzgProof)
}

pub fn proof_from_bytes(proof: &KzgProof) -> Result<Proof, KzgError> {
    G1Affine::deserialize_compressed(proof.as_ref())
        .map(|w| Proof { w, random_v: None })
        .map_err(|_| KzgError::InvalidProof)
}
