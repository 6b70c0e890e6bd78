// std
use std::sync::Arc;
// crates
use beacon_core::config::MINIMAL;
use beacon_core::da::Blob;
use once_cell::sync::Lazy;
use rand::{thread_rng, RngCore};
// internal
use crate::{global_parameters_from_randomness, KzgSettings, BYTES_PER_FIELD_ELEMENT};

/// Random setup sized for the minimal preset. Development only.
pub static MINIMAL_SETTINGS: Lazy<Arc<KzgSettings>> = Lazy::new(|| {
    tracing::warn!("KZG global parameters are randomly generated, use for development only");
    let mut rng = thread_rng();
    let params = global_parameters_from_randomness(MINIMAL.field_elements_per_blob, &mut rng)
        .expect("random setup");
    Arc::new(KzgSettings::new(&params, MINIMAL.field_elements_per_blob).expect("minimal settings"))
});

/// Random blob of canonical field elements: the most significant byte of each
/// little endian element is left at zero.
pub fn random_blob(field_elements: usize) -> Blob {
    let mut rng = thread_rng();
    let mut bytes = vec![0u8; field_elements * BYTES_PER_FIELD_ELEMENT];
    for element in bytes.chunks_exact_mut(BYTES_PER_FIELD_ELEMENT) {
        rng.fill_bytes(&mut element[..BYTES_PER_FIELD_ELEMENT - 1]);
    }
    Blob::from(bytes)
}
