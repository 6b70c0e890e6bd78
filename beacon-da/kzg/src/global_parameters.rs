// std
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
// crates
use ark_bls12_381::{fr::Fr, Bls12_381};
use ark_poly::polynomial::univariate::DensePolynomial;
use ark_poly_commit::kzg10::KZG10;
use ark_serialize::CanonicalDeserialize;
use rand::Rng;
// internal
use super::{GlobalParameters, KzgError};

/// Insecure parameters from local randomness, for development networks and tests.
pub fn global_parameters_from_randomness<R: Rng>(
    max_degree: usize,
    rng: &mut R,
) -> Result<GlobalParameters, KzgError> {
    KZG10::<Bls12_381, DensePolynomial<Fr>>::setup(max_degree, true, rng).map_err(Into::into)
}

/// Load parameters written with `serialize_uncompressed`.
pub fn global_parameters_from_file(path: impl AsRef<Path>) -> Result<GlobalParameters, KzgError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    GlobalParameters::deserialize_uncompressed_unchecked(reader).map_err(Into::into)
}
