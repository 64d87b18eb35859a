//! Dump producer port.
//!
//! Design intent:
//! - The producer writes a transactionally consistent export to the path it
//!   is given (a temporary location, never the artifact's final identity).
//! - Any failure maps to a fatal `BackupError::Dump`/`Storage`; a partial
//!   export must never be registered.

use std::path::Path;

use async_trait::async_trait;

use crate::domain::BackupError;

/// What a successful export produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpStats {
    /// Size of the raw (uncompressed) export.
    pub bytes: u64,
}

/// Produces a consistent point-in-time export of all databases.
#[async_trait]
pub trait DumpProducer: Send + Sync {
    async fn produce(&self, dest: &Path) -> Result<DumpStats, BackupError>;
}
