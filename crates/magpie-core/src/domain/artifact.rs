//! Backup artifact model and the timestamp-derived naming scheme.
//!
//! An artifact's identity is its creation timestamp (UTC, second precision).
//! Committed artifacts live directly in the backup directory as
//! `<timestamp>.sql.gz`; anything still being written lives under `incoming/`
//! with a `.partial` suffix, so a restart can tell the two apart and discard
//! incomplete temporaries without touching committed backups.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Suffix of a committed (compressed, verified) artifact file.
pub const COMMITTED_SUFFIX: &str = ".sql.gz";

/// Suffix marking a file that has not been committed yet.
pub const PARTIAL_SUFFIX: &str = ".partial";

const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Whether an artifact's checksum has been confirmed.
///
/// Only `Verified` artifacts are ever eligible for pruning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyStatus {
    Unverified,
    Verified,
    Corrupt,
}

/// Where an artifact currently exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    LocalOnly,
    RemoteOnly,
    Both,
}

/// One backup instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupArtifact {
    created_at: DateTime<Utc>,
    path: PathBuf,
    size_bytes: u64,
    /// sha256 of the compressed file, hex-encoded. `None` for artifacts
    /// rediscovered on disk, whose digest was checked when they were written.
    checksum: Option<String>,
    verification: VerifyStatus,
    location: Location,
}

impl BackupArtifact {
    /// A freshly committed artifact whose digest was just confirmed.
    pub fn verified(
        created_at: DateTime<Utc>,
        path: PathBuf,
        size_bytes: u64,
        checksum: String,
    ) -> Self {
        Self {
            created_at,
            path,
            size_bytes,
            checksum: Some(checksum),
            verification: VerifyStatus::Verified,
            location: Location::LocalOnly,
        }
    }

    /// An artifact rediscovered by scanning the backup directory.
    ///
    /// Committed names only exist after verification, so these are trusted.
    pub fn scanned(created_at: DateTime<Utc>, path: PathBuf, size_bytes: u64) -> Self {
        Self {
            created_at,
            path,
            size_bytes,
            checksum: None,
            verification: VerifyStatus::Verified,
            location: Location::LocalOnly,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }

    pub fn verification(&self) -> VerifyStatus {
        self.verification
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn name(&self) -> ArtifactName {
        ArtifactName::new(self.created_at)
    }

    /// Record that the artifact now also exists remotely.
    pub fn mark_uploaded(&mut self) {
        self.location = Location::Both;
    }
}

/// The timestamp-derived identity of an artifact.
///
/// Formatting and parsing are inverses, which makes remote keys
/// self-describing: age can be recovered from the key alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactName(DateTime<Utc>);

impl ArtifactName {
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self(created_at)
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.0
    }

    fn stamp(&self) -> String {
        self.0.format(TIMESTAMP_FORMAT).to_string()
    }

    /// File name of the committed artifact, e.g. `20260826T031500Z.sql.gz`.
    pub fn file_name(&self) -> String {
        format!("{}{}", self.stamp(), COMMITTED_SUFFIX)
    }

    /// File name of the raw (uncompressed) export temporary.
    pub fn dump_temp_name(&self) -> String {
        format!("{}.sql{}", self.stamp(), PARTIAL_SUFFIX)
    }

    /// File name of the compressed-but-unverified temporary.
    pub fn archive_temp_name(&self) -> String {
        format!("{}{}{}", self.stamp(), COMMITTED_SUFFIX, PARTIAL_SUFFIX)
    }

    /// Deterministic remote key: `<prefix>/<timestamp>.sql.gz`.
    ///
    /// Re-uploading the same artifact hits the same key, so retries and
    /// re-runs are overwrite-safe and never collide with other artifacts.
    pub fn remote_key(&self, prefix: &str) -> String {
        let prefix = prefix.trim_end_matches('/');
        if prefix.is_empty() {
            self.file_name()
        } else {
            format!("{}/{}", prefix, self.file_name())
        }
    }

    /// Parse a committed artifact file name back into its identity.
    pub fn parse(file_name: &str) -> Option<Self> {
        let stamp = file_name.strip_suffix(COMMITTED_SUFFIX)?;
        let naive = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?;
        Some(Self(naive.and_utc()))
    }

    /// Recover the creation timestamp from a remote key, tolerating any
    /// prefix in front of the final path segment.
    pub fn parse_key(key: &str) -> Option<DateTime<Utc>> {
        let segment = key.rsplit('/').next()?;
        Self::parse(segment).map(|name| name.0)
    }
}
