// crates
use ark_bls12_381::{Bls12_381, Fr, G1Affine, G1Projective};
use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::{Field, PrimeField};
use ark_poly::univariate::DensePolynomial;
use ark_poly::{DenseUVPolynomial, Evaluations, Polynomial};
use ark_poly_commit::kzg10::{Commitment, Proof, KZG10};
use beacon_core::da::{Blob, KzgCommitment, KzgProof};
use num_traits::{One, Zero};
use sha2::{Digest as _, Sha256};
// internal
use crate::common::{
    blob_to_evaluations, blob_to_polynomial, commitment_from_bytes, commitment_to_bytes,
    field_element_to_bytes, g1_to_bytes, proof_from_bytes, proof_to_bytes,
};
use crate::{KzgError, KzgSettings};

const FIAT_SHAMIR_PROTOCOL_DOMAIN: &[u8; 16] = b"FSBLOBVERIFY_V1_";

fn commit_polynomial(
    polynomial: &DensePolynomial<Fr>,
    settings: &KzgSettings,
) -> Result<Commitment<Bls12_381>, KzgError> {
    KZG10::commit(&settings.powers(), polynomial, None, None)
        .map_err(KzgError::PolyCommitError)
        .map(|(commitment, _)| commitment)
}

pub fn blob_to_kzg_commitment(
    blob: &Blob,
    settings: &KzgSettings,
) -> Result<KzgCommitment, KzgError> {
    let polynomial = blob_to_polynomial(blob, 0, settings.domain())?;
    commitment_to_bytes(&commit_polynomial(&polynomial, settings)?)
}

fn compute_challenge(
    blobs: &[Blob],
    commitments: &[KzgCommitment],
    settings: &KzgSettings,
) -> Fr {
    let mut hasher = Sha256::new();
    hasher.update(FIAT_SHAMIR_PROTOCOL_DOMAIN);
    hasher.update((settings.field_elements_per_blob() as u64).to_le_bytes());
    hasher.update((blobs.len() as u64).to_le_bytes());
    for blob in blobs {
        hasher.update(blob.as_bytes());
    }
    for commitment in commitments {
        hasher.update(commitment.as_ref());
    }
    Fr::from_le_bytes_mod_order(&hasher.finalize())
}

fn compute_evaluation_point(r: &Fr, aggregated_commitment: &G1Affine) -> Result<Fr, KzgError> {
    let mut hasher = Sha256::new();
    hasher.update(FIAT_SHAMIR_PROTOCOL_DOMAIN);
    hasher.update(field_element_to_bytes(r)?);
    hasher.update(g1_to_bytes(aggregated_commitment)?);
    Ok(Fr::from_le_bytes_mod_order(&hasher.finalize()))
}

fn powers_of(r: Fr, count: usize) -> Vec<Fr> {
    std::iter::successors(Some(Fr::one()), |power| Some(*power * r))
        .take(count)
        .collect()
}

/// Random linear combination of the blob polynomials and of their commitments,
/// plus the evaluation point both sides derive from it.
struct Aggregate {
    polynomial: DensePolynomial<Fr>,
    commitment: Commitment<Bls12_381>,
    point: Fr,
}

fn aggregate(
    blobs: &[Blob],
    commitments: &[Commitment<Bls12_381>],
    encoded_commitments: &[KzgCommitment],
    settings: &KzgSettings,
) -> Result<Aggregate, KzgError> {
    let r = compute_challenge(blobs, encoded_commitments, settings);
    let powers = powers_of(r, blobs.len());
    let domain = settings.domain();

    let mut aggregated = vec![Fr::zero(); settings.field_elements_per_blob()];
    for (index, (blob, power)) in blobs.iter().zip(&powers).enumerate() {
        let evaluations = blob_to_evaluations(blob, index, domain)?;
        for (accumulated, evaluation) in aggregated.iter_mut().zip(&evaluations.evals) {
            *accumulated += *evaluation * power;
        }
    }
    let polynomial = Evaluations::from_vec_and_domain(aggregated, domain).interpolate();

    let commitment = commitments
        .iter()
        .zip(&powers)
        .map(|(commitment, power)| commitment.0 * power)
        .sum::<G1Projective>()
        .into_affine();
    let point = compute_evaluation_point(&r, &commitment)?;
    Ok(Aggregate {
        polynomial,
        commitment: Commitment(commitment),
        point,
    })
}

fn check_lengths(blobs: &[Blob], commitments: &[KzgCommitment]) -> Result<(), KzgError> {
    if blobs.len() != commitments.len() {
        return Err(KzgError::LengthMismatch {
            blobs: blobs.len(),
            commitments: commitments.len(),
        });
    }
    Ok(())
}

/// Single proof opening the random linear combination of every blob
/// polynomial at the Fiat-Shamir point. No blobs gives the identity proof.
pub fn compute_aggregate_kzg_proof(
    blobs: &[Blob],
    settings: &KzgSettings,
) -> Result<KzgProof, KzgError> {
    if blobs.is_empty() {
        return Ok(KzgProof(g1_to_bytes(&G1Affine::zero())?));
    }
    let commitments = blobs
        .iter()
        .enumerate()
        .map(|(index, blob)| {
            let polynomial = blob_to_polynomial(blob, index, settings.domain())?;
            commit_polynomial(&polynomial, settings)
        })
        .collect::<Result<Vec<_>, _>>()?;
    let encoded = commitments
        .iter()
        .map(commitment_to_bytes)
        .collect::<Result<Vec<_>, _>>()?;
    let Aggregate {
        polynomial, point, ..
    } = aggregate(blobs, &commitments, &encoded, settings)?;

    // witness(X) = (p(X) - p(x)) / (X - x)
    let value = polynomial.evaluate(&point);
    let numerator = &polynomial - &DensePolynomial::from_coefficients_vec(vec![value]);
    let divisor = DensePolynomial::from_coefficients_vec(vec![-point, Fr::ONE]);
    let witness = &numerator / &divisor;
    let witness_commitment = commit_polynomial(&witness, settings)?;
    proof_to_bytes(&Proof {
        w: witness_commitment.0,
        random_v: None,
    })
}

/// Check one aggregate proof against every (blob, commitment) pair.
///
/// `Ok(false)` means well formed inputs with a proof that does not open the
/// aggregate; malformed inputs are errors.
pub fn verify_aggregate_kzg_proof(
    blobs: &[Blob],
    commitments: &[KzgCommitment],
    proof: &KzgProof,
    settings: &KzgSettings,
) -> Result<bool, KzgError> {
    check_lengths(blobs, commitments)?;
    if blobs.is_empty() {
        return Err(KzgError::EmptyInput);
    }
    let decoded = commitments
        .iter()
        .enumerate()
        .map(|(index, commitment)| commitment_from_bytes(commitment, index))
        .collect::<Result<Vec<_>, _>>()?;
    let proof = proof_from_bytes(proof)?;
    let Aggregate {
        polynomial,
        commitment,
        point,
    } = aggregate(blobs, &decoded, commitments, settings)?;
    let value = polynomial.evaluate(&point);
    KZG10::<Bls12_381, DensePolynomial<Fr>>::check(
        settings.verifier_key(),
        &commitment,
        point,
        value,
        &proof,
    )
    .map_err(KzgError::PolyCommitError)
}
