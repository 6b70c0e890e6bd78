pub mod backends;

// std
use std::sync::Arc;
// crates
use async_trait::async_trait;
use beacon_core::da::{BlobsSidecar, SidecarFetcher};
use beacon_core::{wire, Root, Slot};
use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use thiserror::Error;
// internal
use crate::backends::{StorageBackend, WriteOp};

pub const SIDECAR_PREFIX: &str = "sidecars/";
pub const SLOT_INDEX_PREFIX: &str = "sidecars_by_slot/";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage backend failure: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Could not encode or decode a sidecar: {0}")]
    Serialization(#[from] wire::Error),
    #[error("Slot index entry {0} is malformed")]
    CorruptIndex(String),
}

impl StorageError {
    fn backend<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Self::Backend(Box::new(error))
    }
}

pub fn sidecar_key(block_root: &Root) -> Bytes {
    let mut key = BytesMut::with_capacity(SIDECAR_PREFIX.len() + block_root.len());
    key.put_slice(SIDECAR_PREFIX.as_bytes());
    key.put_slice(block_root);
    key.freeze()
}

/// `prefix ++ slot (big endian) ++ root`, so index keys sort by slot.
pub fn slot_index_key(slot: Slot, block_root: &Root) -> Bytes {
    let mut key = slot_index_bound(slot);
    key.put_slice(block_root);
    key.freeze()
}

fn slot_index_bound(slot: Slot) -> BytesMut {
    let mut key = BytesMut::with_capacity(SLOT_INDEX_PREFIX.len() + 8 + 32);
    key.put_slice(SLOT_INDEX_PREFIX.as_bytes());
    key.put_slice(&slot.to_be_bytes());
    key
}

fn root_from_index_value(value: &[u8]) -> Result<Root, StorageError> {
    value
        .try_into()
        .map_err(|_| StorageError::CorruptIndex(const_hex::encode(value)))
}

/// Sidecars keyed by block root, with a secondary index by slot.
///
/// Writes go through single atomic batches, so a reader never sees a sidecar
/// without its index entry or the other way around.
pub struct BlobSidecarStore<Backend> {
    backend: Arc<Backend>,
}

impl<Backend> Clone for BlobSidecarStore<Backend> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<Backend: StorageBackend> BlobSidecarStore<Backend> {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn from_settings(settings: Backend::Settings) -> Result<Self, StorageError> {
        Backend::new(settings)
            .map(Self::new)
            .map_err(StorageError::backend)
    }

    pub async fn get(&self, block_root: &Root) -> Result<Option<BlobsSidecar>, StorageError> {
        self.get_encoded(block_root)
            .await?
            .map(|bytes| BlobsSidecar::decode(&bytes).map_err(StorageError::from))
            .transpose()
    }

    pub async fn get_encoded(&self, block_root: &Root) -> Result<Option<Bytes>, StorageError> {
        self.backend
            .load(&sidecar_key(block_root))
            .await
            .map_err(StorageError::backend)
    }

    /// Encoded sidecars for the roots that have one. Missing roots are skipped,
    /// so the output is not positionally aligned with `block_roots`.
    pub async fn get_many(&self, block_roots: &[Root]) -> Result<Vec<Bytes>, StorageError> {
        let mut sidecars = Vec::with_capacity(block_roots.len());
        for block_root in block_roots {
            if let Some(sidecar) = self.get_encoded(block_root).await? {
                sidecars.push(sidecar);
            }
        }
        Ok(sidecars)
    }

    /// Block roots with a stored sidecar for slots in `[start, end)`, ascending.
    pub fn stream_roots_by_slot_range(
        &self,
        start: Slot,
        end: Slot,
    ) -> BoxStream<'static, Result<Root, StorageError>> {
        self.backend
            .scan(slot_index_bound(start).freeze(), slot_index_bound(end).freeze())
            .map_err(StorageError::backend)
            .and_then(|(_, value)| futures::future::ready(root_from_index_value(&value)))
            .boxed()
    }

    /// Encoded sidecars for slots in `[start, end)`, fetched one at a time as
    /// the stream is polled. Ordered by slot.
    pub fn stream_by_slot_range(
        &self,
        start: Slot,
        end: Slot,
    ) -> BoxStream<'static, Result<Bytes, StorageError>> {
        let store = self.clone();
        self.stream_roots_by_slot_range(start, end)
            .try_filter_map(move |block_root| {
                let store = store.clone();
                async move { store.get_encoded(&block_root).await }
            })
            .boxed()
    }

    /// Insert or replace the sidecar of `sidecar.beacon_block_root`. A
    /// replaced sidecar at another slot loses its old index entry in the same
    /// batch.
    pub async fn put(&self, sidecar: &BlobsSidecar) -> Result<(), StorageError> {
        let value = sidecar.encode()?;
        let root = sidecar.beacon_block_root;
        let mut batch = Vec::with_capacity(3);
        if let Some(previous) = self.get(&root).await? {
            if previous.beacon_block_slot != sidecar.beacon_block_slot {
                batch.push(WriteOp::Delete {
                    key: slot_index_key(previous.beacon_block_slot, &root),
                });
            }
        }
        batch.push(WriteOp::Put {
            key: sidecar_key(&root),
            value,
        });
        batch.push(WriteOp::Put {
            key: slot_index_key(sidecar.beacon_block_slot, &root),
            value: Bytes::copy_from_slice(&root),
        });
        self.backend
            .apply(batch)
            .await
            .map_err(StorageError::backend)?;
        tracing::debug!(slot = %sidecar.beacon_block_slot, root = %const_hex::encode(root), "stored blobs sidecar");
        Ok(())
    }

    /// Remove a sidecar and its index entry. Missing sidecars are a no-op.
    pub async fn delete(&self, block_root: &Root) -> Result<(), StorageError> {
        let Some(sidecar) = self.get(block_root).await? else {
            return Ok(());
        };
        self.backend
            .apply(vec![
                WriteOp::Delete {
                    key: sidecar_key(block_root),
                },
                WriteOp::Delete {
                    key: slot_index_key(sidecar.beacon_block_slot, block_root),
                },
            ])
            .await
            .map_err(StorageError::backend)
    }

    /// Drop every sidecar for a slot before `slot`. Returns how many were removed.
    pub async fn prune_before(&self, slot: Slot) -> Result<usize, StorageError> {
        let entries: Vec<(Bytes, Bytes)> = self
            .backend
            .scan(
                slot_index_bound(Slot::genesis()).freeze(),
                slot_index_bound(slot).freeze(),
            )
            .try_collect()
            .await
            .map_err(StorageError::backend)?;
        let mut batch = Vec::with_capacity(entries.len() * 2);
        for (index_key, value) in &entries {
            let block_root = root_from_index_value(value)?;
            batch.push(WriteOp::Delete {
                key: sidecar_key(&block_root),
            });
            batch.push(WriteOp::Delete {
                key: index_key.clone(),
            });
        }
        if !batch.is_empty() {
            self.backend
                .apply(batch)
                .await
                .map_err(StorageError::backend)?;
        }
        tracing::debug!(%slot, pruned = entries.len(), "pruned blobs sidecars");
        Ok(entries.len())
    }
}

#[async_trait]
impl<Backend: StorageBackend> SidecarFetcher for BlobSidecarStore<Backend> {
    type Error = StorageError;

    async fn fetch_sidecar(&self, block_root: Root) -> Result<Option<BlobsSidecar>, Self::Error> {
        self.get(&block_root).await
    }
}
