//! Local retention: the backup directory as the tracked artifact set.
//!
//! Design intent:
//! - The directory itself is the source of truth; scanning recognizes only
//!   committed names, which exist only after verification.
//! - Temporaries live under `incoming/` and are discarded wholesale on the
//!   next run, so a crash mid-pipeline never leaves ambiguous state.
//! - Pruning deletes oldest-first and a single failed deletion does not
//!   abort the pass.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::domain::{ArtifactName, BackupArtifact, BackupError, VerifyStatus};

/// Subdirectory for files that are not committed artifacts yet.
pub const INCOMING_DIR: &str = "incoming";

/// What a prune pass did.
#[derive(Debug, Default)]
pub struct PruneOutcome {
    pub deleted: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
    pub kept: usize,
}

/// The local backup directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn incoming_dir(&self) -> PathBuf {
        self.root.join(INCOMING_DIR)
    }

    /// Path a committed artifact with this identity would occupy.
    pub fn committed_path(&self, name: &ArtifactName) -> PathBuf {
        self.root.join(name.file_name())
    }

    pub fn ensure_layout(&self) -> Result<(), BackupError> {
        fs::create_dir_all(self.incoming_dir())
            .map_err(|e| BackupError::storage("create backup directory", &self.root, e))
    }

    /// Remove everything under `incoming/`: leftovers from a run that died
    /// mid-pipeline. Committed artifacts are never touched.
    pub fn discard_incomplete(&self) -> Result<usize, BackupError> {
        let incoming = self.incoming_dir();
        let entries = match fs::read_dir(&incoming) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(BackupError::storage("read incoming directory", &incoming, err)),
        };

        let mut discarded = 0;
        for entry in entries {
            let entry =
                entry.map_err(|e| BackupError::storage("read incoming directory", &incoming, e))?;
            let path = entry.path();
            match fs::remove_file(&path) {
                Ok(()) => {
                    info!(path = %path.display(), "discarded incomplete temporary");
                    discarded += 1;
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "could not discard temporary");
                }
            }
        }
        Ok(discarded)
    }

    /// All committed artifacts, ordered by creation timestamp ascending
    /// (ties broken by path). Foreign files are ignored.
    pub fn scan(&self) -> Result<Vec<BackupArtifact>, BackupError> {
        let entries = fs::read_dir(&self.root)
            .map_err(|e| BackupError::storage("read backup directory", &self.root, e))?;

        let mut artifacts = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| BackupError::storage("read backup directory", &self.root, e))?;
            let path = entry.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(name) = ArtifactName::parse(file_name) else {
                debug!(path = %path.display(), "ignoring foreign file in backup directory");
                continue;
            };
            let size = entry
                .metadata()
                .map_err(|e| BackupError::storage("stat artifact", &path, e))?
                .len();
            artifacts.push(BackupArtifact::scanned(name.timestamp(), path, size));
        }

        artifacts.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.path().cmp(b.path()))
        });
        Ok(artifacts)
    }

    /// Confirm a freshly committed artifact is tracked: it must be verified
    /// and present at its committed path.
    pub fn register(&self, artifact: &BackupArtifact) -> Result<(), BackupError> {
        if artifact.verification() != VerifyStatus::Verified {
            return Err(BackupError::storage(
                "register artifact",
                artifact.path(),
                std::io::Error::other("refusing to track an unverified artifact"),
            ));
        }
        let metadata = fs::metadata(artifact.path())
            .map_err(|e| BackupError::storage("register artifact", artifact.path(), e))?;
        if metadata.len() != artifact.size_bytes() {
            return Err(BackupError::storage(
                "register artifact",
                artifact.path(),
                std::io::Error::other("size changed after commit"),
            ));
        }
        Ok(())
    }

    /// Delete the oldest artifacts beyond `keep`. Only verified artifacts
    /// are candidates (scanning yields nothing else), and a failed deletion
    /// is recorded and skipped, never fatal.
    pub fn prune(&self, keep: usize) -> Result<PruneOutcome, BackupError> {
        let artifacts = self.scan()?;
        let mut outcome = PruneOutcome {
            kept: artifacts.len().min(keep),
            ..PruneOutcome::default()
        };
        if artifacts.len() <= keep {
            return Ok(outcome);
        }

        let excess = artifacts.len() - keep;
        for artifact in artifacts.into_iter().take(excess) {
            debug_assert_eq!(artifact.verification(), VerifyStatus::Verified);
            match fs::remove_file(artifact.path()) {
                Ok(()) => {
                    info!(
                        path = %artifact.path().display(),
                        created_at = %artifact.created_at(),
                        "pruned local artifact"
                    );
                    outcome.deleted.push(artifact.path().to_path_buf());
                }
                Err(err) => {
                    warn!(
                        path = %artifact.path().display(),
                        error = %err,
                        "could not prune local artifact"
                    );
                    outcome
                        .failed
                        .push((artifact.path().to_path_buf(), err.to_string()));
                }
            }
        }
        Ok(outcome)
    }
}
