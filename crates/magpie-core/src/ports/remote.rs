//! Remote store port.
//!
//! Design intent:
//! - A deliberately narrow surface (put / list / delete) over whatever
//!   object store backs the deployment.
//! - Errors carry only the distinction the pipeline acts on: transient
//!   failures are retried with backoff, permanent ones are not.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    /// Worth retrying: network hiccups, throttling, 5xx responses.
    #[error("transient remote failure: {0}")]
    Transient(String),

    /// Not worth retrying: authorization, missing bucket, bad key.
    #[error("permanent remote failure: {0}")]
    Permanent(String),
}

impl RemoteError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// One listed remote object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub key: String,
    /// Store-side creation metadata, used when the key does not carry a
    /// parseable timestamp.
    pub last_modified: Option<DateTime<Utc>>,
}

/// Durable object storage for verified artifacts.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn put(&self, key: &str, payload: Bytes) -> Result<(), RemoteError>;

    /// List every object under `prefix`. An empty result is not an error.
    async fn list(&self, prefix: &str) -> Result<Vec<RemoteObject>, RemoteError>;

    /// Delete one object. Deleting an already-absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), RemoteError>;
}
