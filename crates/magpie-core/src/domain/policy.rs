//! Retention policy: how many local backups to keep, how old remote
//! backups may get.
//!
//! The two knobs are evaluated independently: a remote deletion decision
//! never looks at local state, and vice versa.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("local_keep_count must be at least 1")]
    ZeroKeepCount,

    #[error("remote_max_age_days must not be negative (got {0})")]
    NegativeMaxAge(i64),
}

/// Validated retention parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    local_keep_count: usize,
    remote_max_age_days: i64,
}

impl RetentionPolicy {
    pub fn new(local_keep_count: usize, remote_max_age_days: i64) -> Result<Self, PolicyError> {
        if local_keep_count == 0 {
            return Err(PolicyError::ZeroKeepCount);
        }
        if remote_max_age_days < 0 {
            return Err(PolicyError::NegativeMaxAge(remote_max_age_days));
        }
        Ok(Self {
            local_keep_count,
            remote_max_age_days,
        })
    }

    pub fn local_keep_count(&self) -> usize {
        self.local_keep_count
    }

    pub fn remote_max_age_days(&self) -> i64 {
        self.remote_max_age_days
    }

    pub fn remote_max_age(&self) -> Duration {
        Duration::days(self.remote_max_age_days)
    }
}
