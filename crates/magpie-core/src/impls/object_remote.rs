//! Remote store over the `object_store` crate.
//!
//! One adapter covers every backend the crate supports (S3,
//! LocalFileSystem for mirror directories, InMemory in tests); the only
//! logic here is mapping its error taxonomy onto the pipeline's
//! transient/permanent split.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use tracing::debug;

use crate::ports::{RemoteError, RemoteObject, RemoteStore};

pub struct ObjectStoreRemote {
    inner: Arc<dyn ObjectStore>,
}

impl ObjectStoreRemote {
    pub fn new(inner: Arc<dyn ObjectStore>) -> Self {
        Self { inner }
    }
}

fn classify(err: object_store::Error) -> RemoteError {
    match err {
        // Retrying cannot fix authorization, addressing, or capability gaps.
        object_store::Error::NotFound { .. }
        | object_store::Error::PermissionDenied { .. }
        | object_store::Error::Unauthenticated { .. }
        | object_store::Error::InvalidPath { .. }
        | object_store::Error::NotSupported { .. }
        | object_store::Error::NotImplemented { .. }
        | object_store::Error::UnknownConfigurationKey { .. } => {
            RemoteError::Permanent(err.to_string())
        }
        other => RemoteError::Transient(other.to_string()),
    }
}

#[async_trait]
impl RemoteStore for ObjectStoreRemote {
    async fn put(&self, key: &str, payload: Bytes) -> Result<(), RemoteError> {
        let location = ObjectPath::from(key);
        self.inner
            .put(&location, PutPayload::from(payload))
            .await
            .map(|_| ())
            .map_err(classify)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<RemoteObject>, RemoteError> {
        let location = ObjectPath::from(prefix);
        let mut stream = self.inner.list(Some(&location));
        let mut objects = Vec::new();
        while let Some(meta) = stream.next().await {
            let meta = meta.map_err(classify)?;
            objects.push(RemoteObject {
                key: meta.location.to_string(),
                last_modified: Some(meta.last_modified),
            });
        }
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    async fn delete(&self, key: &str) -> Result<(), RemoteError> {
        let location = ObjectPath::from(key);
        match self.inner.delete(&location).await {
            Ok(()) => Ok(()),
            // Already gone is the outcome we wanted.
            Err(object_store::Error::NotFound { .. }) => {
                debug!(key, "remote object already absent");
                Ok(())
            }
            Err(err) => Err(classify(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    fn remote() -> ObjectStoreRemote {
        ObjectStoreRemote::new(Arc::new(InMemory::new()))
    }

    #[tokio::test]
    async fn put_list_delete_round_trip() {
        let remote = remote();
        remote
            .put("backups/20260826T031500Z.sql.gz", Bytes::from_static(b"gz"))
            .await
            .unwrap();
        remote
            .put("backups/20260827T031500Z.sql.gz", Bytes::from_static(b"gz"))
            .await
            .unwrap();
        remote
            .put("elsewhere/20260826T031500Z.sql.gz", Bytes::from_static(b"gz"))
            .await
            .unwrap();

        let listed = remote.list("backups").await.unwrap();
        let keys: Vec<_> = listed.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "backups/20260826T031500Z.sql.gz",
                "backups/20260827T031500Z.sql.gz",
            ]
        );
        assert!(listed.iter().all(|o| o.last_modified.is_some()));

        remote.delete("backups/20260826T031500Z.sql.gz").await.unwrap();
        assert_eq!(remote.list("backups").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn overwriting_a_key_is_idempotent() {
        let remote = remote();
        remote
            .put("backups/20260826T031500Z.sql.gz", Bytes::from_static(b"v1"))
            .await
            .unwrap();
        remote
            .put("backups/20260826T031500Z.sql.gz", Bytes::from_static(b"v2"))
            .await
            .unwrap();
        assert_eq!(remote.list("backups").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn deleting_an_absent_key_succeeds() {
        let remote = remote();
        remote.delete("backups/never-existed.sql.gz").await.unwrap();
    }

    #[tokio::test]
    async fn listing_an_empty_prefix_is_empty_not_an_error() {
        let remote = remote();
        assert!(remote.list("backups").await.unwrap().is_empty());
    }
}
