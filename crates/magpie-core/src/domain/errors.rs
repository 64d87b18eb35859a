//! Error taxonomy for the backup pipeline.
//!
//! Every pipeline error is either fatal (the run produced no new artifact
//! and must stop before anything is registered for retention) or recoverable
//! (the run continues to completion with a lesser classification).

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// How an error affects the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Abort the pipeline; no new artifact is registered.
    Fatal,
    /// Continue; the run is reported as degraded.
    Recoverable,
}

#[derive(Debug, Error)]
pub enum BackupError {
    /// The database export could not be produced.
    #[error("dump failed: {reason}")]
    Dump { reason: String },

    /// The checksum of the written archive disagrees with the checksum
    /// computed at compression time (truncated or corrupted write).
    #[error("integrity check failed for {path}: expected {expected}, got {actual}")]
    Integrity {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// The local filesystem rejected an operation.
    #[error("local storage failure during {operation} on {path}")]
    Storage {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Remote transfer gave up after exhausting retries, or hit a
    /// non-retryable failure.
    #[error("upload gave up after {attempts} attempt(s): {reason}")]
    Upload { attempts: u32, reason: String },

    /// One or more retention deletions failed.
    #[error("remote retention failed: {detail}")]
    Retention { detail: String },
}

impl BackupError {
    pub fn severity(&self) -> Severity {
        match self {
            Self::Dump { .. } | Self::Integrity { .. } | Self::Storage { .. } => Severity::Fatal,
            Self::Upload { .. } | Self::Retention { .. } => Severity::Recoverable,
        }
    }

    pub fn dump(reason: impl Into<String>) -> Self {
        Self::Dump {
            reason: reason.into(),
        }
    }

    pub fn storage(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Storage {
            operation,
            path: path.into(),
            source,
        }
    }
}
