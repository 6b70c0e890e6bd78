//! Serializer for wire and storage formats.
//!
//! Sidecars, blocks and protocol messages are encoded with a fixed bincode
//! configuration: little endian, fixed-size integers, bounded size and
//! trailing bytes rejected. Only round-trip fidelity is relied upon.
// crates
use bincode::config::{
    Bounded, FixintEncoding, LittleEndian, RejectTrailing, WithOtherEndian, WithOtherIntEncoding,
    WithOtherLimit, WithOtherTrailing,
};
use bincode::de::read::SliceReader;
use bincode::Options;
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
// internal

pub type Error = bincode::Error;
pub type ErrorKind = bincode::ErrorKind;
pub type Result<T> = std::result::Result<T, Error>;

// Type composition is cool but also makes naming types a bit awkward
type BincodeOptions = WithOtherTrailing<
    WithOtherIntEncoding<
        WithOtherLimit<WithOtherEndian<bincode::DefaultOptions, LittleEndian>, Bounded>,
        FixintEncoding,
    >,
    RejectTrailing,
>;

/// Do not serialize/deserialize more than 4 MiB.
/// A mainnet sidecar carries at most 16 blobs of 128 KiB each.
pub const DATA_LIMIT: u64 = 1 << 22;

static OPTIONS: Lazy<BincodeOptions> = Lazy::new(|| {
    bincode::DefaultOptions::new()
        .with_little_endian()
        .with_limit(DATA_LIMIT)
        .with_fixint_encoding()
        .reject_trailing_bytes()
});

type BincodeDeserializer<'de> = bincode::Deserializer<SliceReader<'de>, BincodeOptions>;

pub struct Deserializer<'de> {
    inner: BincodeDeserializer<'de>,
}

impl<'de> Deserializer<'de> {
    pub fn deserialize<T: Deserialize<'de>>(&mut self) -> Result<T> {
        <T>::deserialize(&mut self.inner)
    }
}

/// Return a deserializer for wire format
///
/// We only operate on in-memory slices as to abstract
/// any underlying protocol. See https://sans-io.readthedocs.io/how-to-sans-io.html
pub fn deserializer(data: &[u8]) -> Deserializer<'_> {
    Deserializer {
        inner: bincode::de::Deserializer::from_slice(data, *OPTIONS),
    }
}

/// Deserialize an object directly
pub fn deserialize<T: DeserializeOwned>(item: &[u8]) -> Result<T> {
    deserializer(item).deserialize()
}

/// Serialize an object directly into a vec
pub fn serialize<T: Serialize>(item: &T) -> Result<Vec<u8>> {
    let size = OPTIONS.serialized_size(item)?;
    let mut buf = Vec::with_capacity(size as usize);
    OPTIONS.serialize_into(&mut buf, item)?;
    Ok(buf)
}
