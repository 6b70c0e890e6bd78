// std
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
// crates
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use thiserror::Error;
use tokio::sync::RwLock;
// internal
use super::{KeyValue, StorageBackend, WriteOp};

#[derive(Debug, Error)]
#[error("mock storage error")]
pub struct MockStorageError;

/// In memory backend for tests.
#[derive(Clone, Debug, Default)]
pub struct MockStorage {
    inner: Arc<RwLock<BTreeMap<Bytes, Bytes>>>,
}

#[async_trait]
impl StorageBackend for MockStorage {
    type Settings = ();
    type Error = MockStorageError;

    fn new(_config: Self::Settings) -> Result<Self, Self::Error> {
        Ok(Self::default())
    }

    async fn load(&self, key: &[u8]) -> Result<Option<Bytes>, Self::Error> {
        Ok(self.inner.read().await.get(key).cloned())
    }

    async fn apply(&self, batch: Vec<WriteOp>) -> Result<(), Self::Error> {
        let mut inner = self.inner.write().await;
        for op in batch {
            match op {
                WriteOp::Put { key, value } => {
                    inner.insert(key, value);
                }
                WriteOp::Delete { key } => {
                    inner.remove(&key);
                }
            }
        }
        Ok(())
    }

    /// Walks the map one key at a time, taking the read lock per step.
    fn scan(&self, start: Bytes, end: Bytes) -> BoxStream<'static, Result<KeyValue, Self::Error>> {
        if start >= end {
            return stream::empty().boxed();
        }
        let inner = Arc::clone(&self.inner);
        stream::unfold(Bound::Included(start), move |lower| {
            let inner = Arc::clone(&inner);
            let end = end.clone();
            async move {
                let next = inner
                    .read()
                    .await
                    .range((lower, Bound::Excluded(end)))
                    .next()
                    .map(|(key, value)| (key.clone(), value.clone()));
                next.map(|(key, value)| (Ok((key.clone(), value)), Bound::Excluded(key)))
            }
        })
        .boxed()
    }
}
