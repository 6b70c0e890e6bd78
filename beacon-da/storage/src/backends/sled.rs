// std
use std::path::PathBuf;
// crates
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
// internal
use super::{KeyValue, StorageBackend, WriteOp};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Error(#[from] sled::Error),
}

/// Sled backend setting
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SledBackendSettings {
    /// File path to the db file
    pub db_path: PathBuf,
}

/// Sled storage backend
#[derive(Clone)]
pub struct SledBackend {
    sled: sled::Db,
}

impl core::fmt::Debug for SledBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        format!("SledBackend {{ sled: {:?} }}", self.sled).fmt(f)
    }
}

fn ivec_to_bytes(ivec: sled::IVec) -> Bytes {
    Bytes::copy_from_slice(&ivec)
}

#[async_trait]
impl StorageBackend for SledBackend {
    type Settings = SledBackendSettings;
    type Error = Error;

    fn new(config: Self::Settings) -> Result<Self, Self::Error> {
        Ok(Self {
            sled: sled::open(config.db_path)?,
        })
    }

    async fn load(&self, key: &[u8]) -> Result<Option<Bytes>, Self::Error> {
        Ok(self.sled.get(key)?.map(ivec_to_bytes))
    }

    async fn apply(&self, batch: Vec<WriteOp>) -> Result<(), Self::Error> {
        let mut sled_batch = sled::Batch::default();
        for op in batch {
            match op {
                WriteOp::Put { key, value } => sled_batch.insert(key.as_ref(), value.as_ref()),
                WriteOp::Delete { key } => sled_batch.remove(key.as_ref()),
            }
        }
        self.sled.apply_batch(sled_batch)?;
        Ok(())
    }

    fn scan(&self, start: Bytes, end: Bytes) -> BoxStream<'static, Result<KeyValue, Self::Error>> {
        if start >= end {
            return stream::empty().boxed();
        }
        let entries = self.sled.range(start..end).map(|entry| {
            entry
                .map(|(key, value)| (ivec_to_bytes(key), ivec_to_bytes(value)))
                .map_err(Error::from)
        });
        stream::iter(entries).boxed()
    }
}

#[cfg(test)]
mod test {
    use tempfile::TempDir;

    use super::super::testing::check_backend;
    use super::*;

    #[tokio::test]
    async fn test_backend_contract() -> Result<(), Error> {
        let temp_path = TempDir::new().unwrap();
        let sled_settings = SledBackendSettings {
            db_path: temp_path.path().to_path_buf(),
        };
        check_backend(SledBackend::new(sled_settings)?).await
    }

    #[tokio::test]
    async fn test_data_survives_reopen() -> Result<(), Error> {
        let temp_path = TempDir::new().unwrap();
        let sled_settings = SledBackendSettings {
            db_path: temp_path.path().to_path_buf(),
        };
        {
            let sled_db = SledBackend::new(sled_settings.clone())?;
            sled_db
                .apply(vec![WriteOp::Put {
                    key: Bytes::from_static(b"foo"),
                    value: Bytes::from_static(b"bar"),
                }])
                .await?;
            sled_db.sled.flush()?;
        }
        let sled_db = SledBackend::new(sled_settings)?;
        assert_eq!(
            sled_db.load(b"foo").await?,
            Some(Bytes::from_static(b"bar"))
        );
        Ok(())
    }

    #[test]
    fn settings_from_yaml() {
        let settings: SledBackendSettings =
            serde_yaml::from_str("db_path: /tmp/sidecars").unwrap();
        assert_eq!(settings.db_path, PathBuf::from("/tmp/sidecars"));
    }
}
