#[cfg(any(test, feature = "mock"))]
pub mod mock;
#[cfg(feature = "sled")]
pub mod sled;

// std
use std::error::Error;
// crates
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
// internal

/// Single mutation inside an atomic batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOp {
    Put { key: Bytes, value: Bytes },
    Delete { key: Bytes },
}

pub type KeyValue = (Bytes, Bytes);

/// Ordered key-value engine under the sidecar store.
///
/// Reads take `&self` so one backend can serve concurrent readers; writes are
/// grouped in batches that either fully apply or not at all.
#[async_trait]
pub trait StorageBackend: Sized + Send + Sync + 'static {
    /// Backend settings
    type Settings: Clone + Send + Sync + 'static;
    /// Backend operations error type
    type Error: Error + 'static + Send + Sync;

    fn new(settings: Self::Settings) -> Result<Self, Self::Error>;

    async fn load(&self, key: &[u8]) -> Result<Option<Bytes>, Self::Error>;

    /// Apply every operation atomically, in order.
    async fn apply(&self, batch: Vec<WriteOp>) -> Result<(), Self::Error>;

    /// Entries with keys in `[start, end)`, ascending, produced lazily.
    fn scan(&self, start: Bytes, end: Bytes) -> BoxStream<'static, Result<KeyValue, Self::Error>>;
}
