//! Remote upload with retry/backoff.
//!
//! Design intent:
//! - The key is derived from the artifact's timestamp, so retries and
//!   whole-run re-uploads are idempotent overwrites of the same key.
//! - Transient failures back off exponentially up to a bounded attempt
//!   count; permanent failures (authorization, missing bucket) fail at
//!   once. Either way the local artifact stays valid.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{info, warn};

use crate::app::retry::RetryPolicy;
use crate::domain::{BackupArtifact, BackupError};
use crate::ports::RemoteStore;

pub struct Uploader {
    store: Arc<dyn RemoteStore>,
    retry: RetryPolicy,
}

impl Uploader {
    pub fn new(store: Arc<dyn RemoteStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Upload one verified artifact, returning the remote key it now
    /// lives under.
    pub async fn upload(
        &self,
        artifact: &BackupArtifact,
        prefix: &str,
    ) -> Result<String, BackupError> {
        let key = artifact.name().remote_key(prefix);
        let payload = tokio::fs::read(artifact.path())
            .await
            .map_err(|e| BackupError::Upload {
                attempts: 0,
                reason: format!("read local artifact {}: {e}", artifact.path().display()),
            })?;
        let payload = Bytes::from(payload);

        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.store.put(&key, payload.clone()).await {
                Ok(()) => {
                    info!(key = %key, bytes = payload.len(), attempts, "uploaded artifact");
                    return Ok(key);
                }
                Err(err) if err.is_transient() && attempts < self.retry.max_attempts => {
                    let delay = self.retry.next_delay(attempts);
                    warn!(
                        key = %key,
                        attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient upload failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    return Err(BackupError::Upload {
                        attempts,
                        reason: err.to_string(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BackupArtifact;
    use crate::ports::{RemoteError, RemoteObject};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Remote fake whose first `failures` puts fail as scripted.
    struct ScriptedStore {
        failures: Mutex<Vec<RemoteError>>,
        objects: Mutex<HashMap<String, Vec<u8>>>,
        put_calls: Mutex<u32>,
    }

    impl ScriptedStore {
        fn new(failures: Vec<RemoteError>) -> Self {
            Self {
                failures: Mutex::new(failures),
                objects: Mutex::new(HashMap::new()),
                put_calls: Mutex::new(0),
            }
        }

        fn put_calls(&self) -> u32 {
            *self.put_calls.lock().unwrap()
        }

        fn stored_keys(&self) -> Vec<String> {
            self.objects.lock().unwrap().keys().cloned().collect()
        }
    }

    #[async_trait]
    impl RemoteStore for ScriptedStore {
        async fn put(&self, key: &str, payload: Bytes) -> Result<(), RemoteError> {
            *self.put_calls.lock().unwrap() += 1;
            let mut failures = self.failures.lock().unwrap();
            if failures.is_empty() {
                self.objects
                    .lock()
                    .unwrap()
                    .insert(key.to_string(), payload.to_vec());
                Ok(())
            } else {
                Err(failures.remove(0))
            }
        }

        async fn list(&self, _prefix: &str) -> Result<Vec<RemoteObject>, RemoteError> {
            Ok(Vec::new())
        }

        async fn delete(&self, _key: &str) -> Result<(), RemoteError> {
            Ok(())
        }
    }

    fn artifact(dir: &std::path::Path) -> BackupArtifact {
        let path = dir.join("20260826T031500Z.sql.gz");
        std::fs::write(&path, b"gzip bytes").unwrap();
        BackupArtifact::verified(
            Utc.with_ymd_and_hms(2026, 8, 26, 3, 15, 0).unwrap(),
            path,
            10,
            "abcd".into(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures_with_growing_backoff() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ScriptedStore::new(vec![
            RemoteError::Transient("timeout".into()),
            RemoteError::Transient("throttled".into()),
        ]));
        let uploader = Uploader::new(store.clone(), RetryPolicy::default_upload());

        let before = tokio::time::Instant::now();
        let key = uploader.upload(&artifact(dir.path()), "backups").await.unwrap();

        assert_eq!(key, "backups/20260826T031500Z.sql.gz");
        assert_eq!(store.put_calls(), 3);
        // Two waits: 1s then 2s.
        assert_eq!(before.elapsed(), Duration::from_secs(3));
        assert_eq!(store.stored_keys(), vec![key]);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_surface_an_upload_error_and_keep_the_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ScriptedStore::new(vec![
            RemoteError::Transient("timeout".into()),
            RemoteError::Transient("timeout".into()),
            RemoteError::Transient("timeout".into()),
        ]));
        let uploader = Uploader::new(store.clone(), RetryPolicy::default_upload());
        let artifact = artifact(dir.path());

        let err = uploader.upload(&artifact, "backups").await.unwrap_err();
        match err {
            BackupError::Upload { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.put_calls(), 3);
        assert!(artifact.path().exists(), "local artifact must survive");
        assert!(store.stored_keys().is_empty());
    }

    #[tokio::test]
    async fn permanent_failures_do_not_retry() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ScriptedStore::new(vec![RemoteError::Permanent(
            "access denied".into(),
        )]));
        let uploader = Uploader::new(store.clone(), RetryPolicy::default_upload());

        let err = uploader.upload(&artifact(dir.path()), "backups").await.unwrap_err();
        match err {
            BackupError::Upload { attempts, reason } => {
                assert_eq!(attempts, 1);
                assert!(reason.contains("access denied"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.put_calls(), 1);
    }

    #[tokio::test]
    async fn reupload_hits_the_same_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ScriptedStore::new(Vec::new()));
        let uploader = Uploader::new(store.clone(), RetryPolicy::default_upload());
        let artifact = artifact(dir.path());

        let first = uploader.upload(&artifact, "backups").await.unwrap();
        let second = uploader.upload(&artifact, "backups").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.stored_keys().len(), 1);
    }
}
