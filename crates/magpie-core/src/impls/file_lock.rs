//! File-based run lock.
//!
//! Design intent:
//! - Acquisition is `create_new` on a lock file carrying the holder's pid
//!   and acquisition time, so existence alone is mutual exclusion.
//! - Release is Drop, which covers success, failure, and unwinding alike.
//! - A holder that died without releasing leaves the file behind; the next
//!   acquire reclaims it once it is older than the configured stale age
//!   (whole-process termination is the only cancellation mechanism, so
//!   age is the only signal available).

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::BackupError;
use crate::ports::{LockManager, RunLockGuard};

/// Lock file name inside the backup directory.
pub const LOCK_FILE: &str = ".magpie.lock";

#[derive(Debug, Serialize, Deserialize)]
struct LockPayload {
    pid: u32,
    acquired_at: DateTime<Utc>,
}

pub struct FileLockManager {
    path: PathBuf,
    stale_after: Duration,
}

impl FileLockManager {
    pub fn new(dir: &Path, stale_after: Duration) -> Self {
        Self {
            path: dir.join(LOCK_FILE),
            stale_after,
        }
    }

    fn try_create(&self, now: DateTime<Utc>) -> Result<Option<Box<dyn RunLockGuard>>, BackupError> {
        match OpenOptions::new().write(true).create_new(true).open(&self.path) {
            Ok(mut file) => {
                let payload = LockPayload {
                    pid: std::process::id(),
                    acquired_at: now,
                };
                let body = serde_json::to_vec(&payload).map_err(|e| {
                    BackupError::storage("serialize lock payload", &self.path, io::Error::other(e))
                })?;
                file.write_all(&body)
                    .and_then(|()| file.sync_all())
                    .map_err(|e| BackupError::storage("write lock file", &self.path, e))?;
                Ok(Some(Box::new(FileLockGuard {
                    path: self.path.clone(),
                })))
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(None),
            Err(err) => Err(BackupError::storage("create lock file", &self.path, err)),
        }
    }

    /// When the existing lock is stale, remove it and report `true`.
    fn reclaim_if_stale(&self, now: DateTime<Utc>) -> Result<bool, BackupError> {
        let acquired_at = match fs::read(&self.path) {
            // Lost the race with the holder's release; just retry.
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(true),
            Err(err) => return Err(BackupError::storage("read lock file", &self.path, err)),
            Ok(body) => match serde_json::from_slice::<LockPayload>(&body) {
                Ok(payload) => {
                    if now - payload.acquired_at <= self.stale_after {
                        return Ok(false);
                    }
                    warn!(
                        pid = payload.pid,
                        acquired_at = %payload.acquired_at,
                        "reclaiming stale run lock"
                    );
                    Some(payload.acquired_at)
                }
                // Unreadable payload: fall back to the file's mtime.
                Err(_) => None,
            },
        };

        if acquired_at.is_none() {
            let modified = fs::metadata(&self.path)
                .and_then(|meta| meta.modified())
                .map_err(|e| BackupError::storage("stat lock file", &self.path, e))?;
            let modified: DateTime<Utc> = modified.into();
            if now - modified <= self.stale_after {
                return Ok(false);
            }
            warn!(path = %self.path.display(), "reclaiming unreadable stale run lock");
        }

        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(true),
            Err(err) => Err(BackupError::storage("remove stale lock", &self.path, err)),
        }
    }
}

impl LockManager for FileLockManager {
    fn acquire(&self, now: DateTime<Utc>) -> Result<Option<Box<dyn RunLockGuard>>, BackupError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| BackupError::storage("create lock directory", dir, e))?;
        }
        if let Some(guard) = self.try_create(now)? {
            return Ok(Some(guard));
        }
        if self.reclaim_if_stale(now)? {
            // One retry; a loser of this race simply skips the cycle.
            return self.try_create(now);
        }
        Ok(None)
    }
}

struct FileLockGuard {
    path: PathBuf,
}

impl RunLockGuard for FileLockGuard {}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            if err.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %err, "could not release run lock");
            }
        }
    }
}
