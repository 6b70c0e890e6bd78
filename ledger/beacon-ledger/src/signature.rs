// crates
use beacon_core::crypto::{BlsPublicKey, BlsSignature};
use beacon_core::Root;
use blst::min_pk::{PublicKey, Signature};
use blst::BLST_ERROR;
// internal

pub const DST_BLS12381: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

/// BLS verification backend. Inputs are compressed points; anything that does
/// not decode is simply an invalid signature.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, pubkey: &BlsPublicKey, message: &Root, signature: &BlsSignature) -> bool;

    /// Every key signed the same message. False for an empty key set.
    fn fast_aggregate_verify(
        &self,
        pubkeys: &[BlsPublicKey],
        message: &Root,
        signature: &BlsSignature,
    ) -> bool;
}

/// blst with public keys in G1 and signatures in G2.
#[derive(Clone, Copy, Debug, Default)]
pub struct BlstVerifier;

impl SignatureVerifier for BlstVerifier {
    fn verify(&self, pubkey: &BlsPublicKey, message: &Root, signature: &BlsSignature) -> bool {
        let (Ok(pubkey), Ok(signature)) = (
            PublicKey::from_bytes(pubkey.as_bytes()),
            Signature::from_bytes(signature.as_bytes()),
        ) else {
            return false;
        };
        BLST_ERROR::BLST_SUCCESS
            == signature.verify(true, message, DST_BLS12381, &[], &pubkey, true)
    }

    fn fast_aggregate_verify(
        &self,
        pubkeys: &[BlsPublicKey],
        message: &Root,
        signature: &BlsSignature,
    ) -> bool {
        if pubkeys.is_empty() {
            return false;
        }
        let Ok(signature) = Signature::from_bytes(signature.as_bytes()) else {
            return false;
        };
        let Ok(keys) = pubkeys
            .iter()
            .map(|pubkey| PublicKey::from_bytes(pubkey.as_bytes()))
            .collect::<Result<Vec<_>, _>>()
        else {
            return false;
        };
        let keys: Vec<&PublicKey> = keys.iter().collect();
        BLST_ERROR::BLST_SUCCESS
            == signature.fast_aggregate_verify(true, message, DST_BLS12381, &keys)
    }
}

/// Sync committee flavour of aggregate verification: with no participants the
/// signature must be the point at infinity.
pub(crate) fn eth_fast_aggregate_verify(
    verifier: &dyn SignatureVerifier,
    pubkeys: &[BlsPublicKey],
    message: &Root,
    signature: &BlsSignature,
) -> bool {
    if pubkeys.is_empty() {
        return signature.is_infinity();
    }
    verifier.fast_aggregate_verify(pubkeys, message, signature)
}
