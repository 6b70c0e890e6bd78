// std
use std::sync::Arc;
// crates
use beacon_core::{Root, Slot};
use beacon_da_storage::backends::StorageBackend;
use beacon_da_storage::{BlobSidecarStore, StorageError};
use bytes::Bytes;
use futures::future;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
// internal
use crate::messages::BlobsSidecarsByRangeRequest;
use crate::RangeSyncError;

/// `{slot, block_root}` of a block on the canonical chain.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BlockSummary {
    pub slot: Slot,
    pub block_root: Root,
}

/// Fork-choice view used to resolve which block sits at each slot.
pub trait ChainAncestry: Send + Sync {
    /// Ancestors of the current head, head included, newest first.
    fn ancestors_from_head(&self) -> Box<dyn Iterator<Item = BlockSummary> + Send + '_>;
}

#[derive(Clone)]
pub enum RangeStrategy {
    /// Serve whatever the store indexes for the slots, abandoned forks included.
    SlotScan,
    /// Serve only sidecars of blocks on the canonical chain.
    Ancestry(Arc<dyn ChainAncestry>),
}

/// Roots of canonical blocks with `start <= slot < end`, slot ascending.
fn canonical_roots(ancestry: &dyn ChainAncestry, start: Slot, end: Slot) -> Vec<Root> {
    let mut roots: Vec<Root> = ancestry
        .ancestors_from_head()
        .take_while(|block| block.slot >= start)
        .filter(|block| block.slot < end)
        .map(|block| block.block_root)
        .collect();
    roots.reverse();
    roots
}

pub struct RangeSyncResponder<Backend> {
    store: BlobSidecarStore<Backend>,
    strategy: RangeStrategy,
}

impl<Backend> Clone for RangeSyncResponder<Backend> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            strategy: self.strategy.clone(),
        }
    }
}

impl<Backend: StorageBackend> RangeSyncResponder<Backend> {
    pub fn new(store: BlobSidecarStore<Backend>, ancestry: Arc<dyn ChainAncestry>) -> Self {
        Self::with_strategy(store, RangeStrategy::Ancestry(ancestry))
    }

    pub fn with_strategy(store: BlobSidecarStore<Backend>, strategy: RangeStrategy) -> Self {
        Self { store, strategy }
    }

    /// Lazily produced encoded sidecars for the requested range. Each item is
    /// read from the store only when the stream is polled for it.
    pub fn respond(
        &self,
        request: &BlobsSidecarsByRangeRequest,
    ) -> Result<BoxStream<'static, Result<Bytes, StorageError>>, RangeSyncError> {
        request.validate().map_err(RangeSyncError::InvalidRequest)?;
        let (start, end) = (request.start_slot, request.end_slot());
        match &self.strategy {
            RangeStrategy::SlotScan => Ok(self.store.stream_by_slot_range(start, end)),
            RangeStrategy::Ancestry(ancestry) => {
                let roots = canonical_roots(ancestry.as_ref(), start, end);
                tracing::trace!(%start, %end, resolved = roots.len(), "resolved canonical roots");
                let store = self.store.clone();
                Ok(stream::iter(roots)
                    .then(move |block_root| {
                        let store = store.clone();
                        async move { store.get_encoded(&block_root).await }
                    })
                    .try_filter_map(|sidecar| future::ready(Ok(sidecar)))
                    .boxed())
            }
        }
    }
}
