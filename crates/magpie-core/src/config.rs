//! Configuration, constructed and validated once at startup.
//!
//! Every knob comes from the environment (populated by the deployment's
//! secret store and unit file); nothing in the pipeline reads the
//! environment ad hoc mid-run. Credentials are consumed, never persisted.

use std::path::PathBuf;

use chrono::Duration;
use thiserror::Error;

use crate::domain::{PolicyError, RetentionPolicy};

pub const ENV_DATABASE_URL: &str = "MAGPIE_DATABASE_URL";
pub const ENV_BACKUP_DIR: &str = "MAGPIE_BACKUP_DIR";
pub const ENV_S3_BUCKET: &str = "MAGPIE_S3_BUCKET";
pub const ENV_REMOTE_DIR: &str = "MAGPIE_REMOTE_DIR";
pub const ENV_REMOTE_PREFIX: &str = "MAGPIE_REMOTE_PREFIX";
pub const ENV_LOCAL_KEEP_COUNT: &str = "MAGPIE_LOCAL_KEEP_COUNT";
pub const ENV_REMOTE_MAX_AGE_DAYS: &str = "MAGPIE_REMOTE_MAX_AGE_DAYS";
pub const ENV_LOCK_STALE_MINUTES: &str = "MAGPIE_LOCK_STALE_MINUTES";

const DEFAULT_REMOTE_PREFIX: &str = "backups";
const DEFAULT_LOCAL_KEEP_COUNT: usize = 7;
const DEFAULT_REMOTE_MAX_AGE_DAYS: i64 = 30;
const DEFAULT_LOCK_STALE_MINUTES: i64 = 360;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },

    #[error(transparent)]
    Policy(#[from] PolicyError),
}

/// Where uploads go.
#[derive(Debug, Clone)]
pub enum RemoteTarget {
    /// S3 bucket; credentials come from the ambient AWS environment.
    S3Bucket(String),
    /// Filesystem mirror, for deployments without an object store and for
    /// local testing.
    Directory(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub backup_dir: PathBuf,
    pub remote_target: RemoteTarget,
    pub remote_prefix: String,
    pub policy: RetentionPolicy,
    pub lock_stale_after: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary lookup, so tests never touch the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = required(&lookup, ENV_DATABASE_URL)?;
        let backup_dir = PathBuf::from(required(&lookup, ENV_BACKUP_DIR)?);

        let remote_target = match (lookup(ENV_S3_BUCKET), lookup(ENV_REMOTE_DIR)) {
            (Some(bucket), _) if !bucket.is_empty() => RemoteTarget::S3Bucket(bucket),
            (_, Some(dir)) if !dir.is_empty() => RemoteTarget::Directory(PathBuf::from(dir)),
            _ => return Err(ConfigError::Missing(ENV_S3_BUCKET)),
        };

        let remote_prefix = lookup(ENV_REMOTE_PREFIX)
            .filter(|prefix| !prefix.is_empty())
            .unwrap_or_else(|| DEFAULT_REMOTE_PREFIX.to_string());

        let local_keep_count =
            parsed(&lookup, ENV_LOCAL_KEEP_COUNT, DEFAULT_LOCAL_KEEP_COUNT)?;
        let remote_max_age_days =
            parsed(&lookup, ENV_REMOTE_MAX_AGE_DAYS, DEFAULT_REMOTE_MAX_AGE_DAYS)?;
        let policy = RetentionPolicy::new(local_keep_count, remote_max_age_days)?;

        let lock_stale_minutes =
            parsed(&lookup, ENV_LOCK_STALE_MINUTES, DEFAULT_LOCK_STALE_MINUTES)?;
        if lock_stale_minutes <= 0 {
            return Err(ConfigError::Invalid {
                name: ENV_LOCK_STALE_MINUTES,
                value: lock_stale_minutes.to_string(),
            });
        }

        Ok(Self {
            database_url,
            backup_dir,
            remote_target,
            remote_prefix,
            policy,
            lock_stale_after: Duration::minutes(lock_stale_minutes),
        })
    }
}

fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    lookup(name)
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
