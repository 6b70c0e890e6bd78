pub mod common;
pub mod global_parameters;
pub mod kzg;
pub mod settings;
#[cfg(any(test, feature = "testutils"))]
pub mod testutils;

use ark_bls12_381::{Bls12_381, Fr};
use ark_poly::univariate::DensePolynomial;
use ark_poly::GeneralEvaluationDomain;
use ark_poly_commit::kzg10;
use ark_poly_commit::sonic_pc::UniversalParams;

pub use common::{blob_to_evaluations, blob_to_polynomial, KzgError};
pub use global_parameters::{global_parameters_from_file, global_parameters_from_randomness};
pub use kzg::{blob_to_kzg_commitment, compute_aggregate_kzg_proof, verify_aggregate_kzg_proof};
pub use settings::KzgSettings;

pub type Commitment = kzg10::Commitment<Bls12_381>;
pub type Proof = kzg10::Proof<Bls12_381>;
pub type FieldElement = Fr;
pub type Polynomial = DensePolynomial<Fr>;
pub type Evaluations = ark_poly::Evaluations<Fr>;
pub type PolynomialEvaluationDomain = GeneralEvaluationDomain<Fr>;

pub type GlobalParameters = UniversalParams<Bls12_381>;

pub use beacon_core::config::BYTES_PER_FIELD_ELEMENT;
