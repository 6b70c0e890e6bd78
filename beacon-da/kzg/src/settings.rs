// std
use std::borrow::Cow;
// crates
use ark_bls12_381::{Bls12_381, G1Affine};
use ark_poly::EvaluationDomain;
use ark_poly_commit::kzg10::{Powers, VerifierKey};
// internal
use crate::{GlobalParameters, KzgError, PolynomialEvaluationDomain};

/// Everything needed to commit to, prove and verify blobs of a fixed size.
#[derive(Clone, Debug)]
pub struct KzgSettings {
    field_elements_per_blob: usize,
    domain: PolynomialEvaluationDomain,
    powers_of_g: Vec<G1Affine>,
    powers_of_gamma_g: Vec<G1Affine>,
    verifier_key: VerifierKey<Bls12_381>,
}

impl KzgSettings {
    pub fn new(
        global_parameters: &GlobalParameters,
        field_elements_per_blob: usize,
    ) -> Result<Self, KzgError> {
        let domain = PolynomialEvaluationDomain::new(field_elements_per_blob)
            .filter(|domain| domain.size() == field_elements_per_blob)
            .ok_or(KzgError::InvalidDomainSize(field_elements_per_blob))?;
        let supported = global_parameters.powers_of_g.len();
        if supported < field_elements_per_blob {
            return Err(KzgError::InsufficientSetup {
                supported,
                required: field_elements_per_blob,
            });
        }
        let powers_of_gamma_g = (0..field_elements_per_blob)
            .map(|i| global_parameters.powers_of_gamma_g.get(&i).copied())
            .collect::<Option<Vec<_>>>()
            .ok_or(KzgError::InsufficientSetup {
                supported: global_parameters.powers_of_gamma_g.len(),
                required: field_elements_per_blob,
            })?;
        let verifier_key = VerifierKey {
            g: global_parameters.powers_of_g[0],
            gamma_g: powers_of_gamma_g[0],
            h: global_parameters.h,
            beta_h: global_parameters.beta_h,
            prepared_h: global_parameters.prepared_h.clone(),
            prepared_beta_h: global_parameters.prepared_beta_h.clone(),
        };
        Ok(Self {
            field_elements_per_blob,
            domain,
            powers_of_g: global_parameters.powers_of_g[..field_elements_per_blob].to_vec(),
            powers_of_gamma_g,
            verifier_key,
        })
    }

    pub fn field_elements_per_blob(&self) -> usize {
        self.field_elements_per_blob
    }

    pub fn domain(&self) -> PolynomialEvaluationDomain {
        self.domain
    }

    pub fn powers(&self) -> Powers<'_, Bls12_381> {
        Powers {
            powers_of_g: Cow::Borrowed(&self.powers_of_g),
            powers_of_gamma_g: Cow::Borrowed(&self.powers_of_gamma_g),
        }
    }

    pub fn verifier_key(&self) -> &VerifierKey<Bls12_381> {
        &self.verifier_key
    }
}
