//! Compression and integrity checking.
//!
//! The raw export is streamed through a gzip encoder into a `.partial`
//! file while the compressed bytes are hashed. The written file is then
//! re-read and its digest compared against the streamed one — a mismatch
//! means the write was truncated or corrupted (disk exhaustion,
//! interrupted write). Only after the digests agree is the file renamed
//! to its timestamped identity and the directory fsynced, so a committed
//! name always denotes a verified artifact.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use flate2::Compression;
use flate2::write::GzEncoder;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::domain::{BackupArtifact, BackupError};

/// Hashes everything written through it.
struct HashingWriter<W: Write> {
    inner: W,
    hasher: Sha256,
}

impl<W: Write> HashingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    fn into_parts(self) -> (W, String) {
        (self.inner, format!("{:x}", self.hasher.finalize()))
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.hasher.update(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Compress `src`, verify the written bytes, and commit the result to
/// `final_path`. On any failure the partial file is discarded and no
/// committed name appears.
pub fn build_artifact(
    src: &Path,
    partial: &Path,
    final_path: &Path,
    created_at: DateTime<Utc>,
) -> Result<BackupArtifact, BackupError> {
    let checksum = match compress(src, partial) {
        Ok(checksum) => checksum,
        Err(err) => {
            discard(partial);
            return Err(err);
        }
    };

    if let Err(err) = verify_digest(partial, &checksum) {
        discard(partial);
        return Err(err);
    }

    let size_bytes = fs::metadata(partial)
        .map_err(|e| BackupError::storage("stat archive", partial, e))?
        .len();

    fs::rename(partial, final_path)
        .map_err(|e| BackupError::storage("commit archive", final_path, e))?;
    if let Some(dir) = final_path.parent() {
        sync_dir(dir).map_err(|e| BackupError::storage("sync backup directory", dir, e))?;
    }

    // The raw export is no longer needed; losing it is not worth failing over.
    if let Err(err) = fs::remove_file(src) {
        warn!(path = %src.display(), error = %err, "could not remove raw export temporary");
    }

    Ok(BackupArtifact::verified(
        created_at,
        final_path.to_path_buf(),
        size_bytes,
        checksum,
    ))
}

/// Stream `src` through gzip into `dest`, returning the sha256 of the
/// compressed output. The file is fsynced before the digest is trusted.
fn compress(src: &Path, dest: &Path) -> Result<String, BackupError> {
    let src_file = File::open(src).map_err(|e| BackupError::storage("open export", src, e))?;
    let dest_file =
        File::create(dest).map_err(|e| BackupError::storage("create archive", dest, e))?;

    let mut encoder = GzEncoder::new(
        HashingWriter::new(BufWriter::new(dest_file)),
        Compression::default(),
    );
    io::copy(&mut BufReader::new(src_file), &mut encoder)
        .map_err(|e| BackupError::storage("compress export", dest, e))?;
    let writer = encoder
        .finish()
        .map_err(|e| BackupError::storage("finish compression", dest, e))?;

    let (buffered, checksum) = writer.into_parts();
    let dest_file = buffered
        .into_inner()
        .map_err(|e| BackupError::storage("flush archive", dest, e.into_error()))?;
    dest_file
        .sync_all()
        .map_err(|e| BackupError::storage("sync archive", dest, e))?;
    Ok(checksum)
}

/// Re-read `path` and compare its digest with `expected`.
pub(crate) fn verify_digest(path: &Path, expected: &str) -> Result<(), BackupError> {
    let actual = hash_file(path)?;
    if actual == expected {
        Ok(())
    } else {
        Err(BackupError::Integrity {
            path: path.to_path_buf(),
            expected: expected.to_string(),
            actual,
        })
    }
}

pub(crate) fn hash_file(path: &Path) -> Result<String, BackupError> {
    let file = File::open(path).map_err(|e| BackupError::storage("open for hashing", path, e))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let read = reader
            .read(&mut buf)
            .map_err(|e| BackupError::storage("read for hashing", path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn discard(partial: &Path) {
    if let Err(err) = fs::remove_file(partial) {
        if err.kind() != io::ErrorKind::NotFound {
            warn!(path = %partial.display(), error = %err, "could not discard partial archive");
        }
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Location, VerifyStatus};
    use chrono::TimeZone;
    use flate2::read::GzDecoder;
    use std::io::Write as _;

    fn created_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 26, 3, 15, 0).unwrap()
    }

    #[test]
    fn compresses_verifies_and_commits() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("export.sql.partial");
        let partial = dir.path().join("archive.sql.gz.partial");
        let final_path = dir.path().join("20260826T031500Z.sql.gz");
        fs::write(&src, b"CREATE TABLE t (id int);\n").unwrap();

        let artifact = build_artifact(&src, &partial, &final_path, created_at()).unwrap();

        assert_eq!(artifact.verification(), VerifyStatus::Verified);
        assert_eq!(artifact.location(), Location::LocalOnly);
        assert_eq!(artifact.path(), final_path);
        assert!(artifact.size_bytes() > 0);
        assert!(final_path.exists());
        assert!(!partial.exists());
        assert!(!src.exists(), "raw export temporary should be cleaned up");

        let mut decoder = GzDecoder::new(File::open(&final_path).unwrap());
        let mut restored = String::new();
        decoder.read_to_string(&mut restored).unwrap();
        assert_eq!(restored, "CREATE TABLE t (id int);\n");
    }

    #[test]
    fn digest_mismatch_is_an_integrity_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.gz");
        fs::write(&path, b"compressed bytes").unwrap();
        let digest = hash_file(&path).unwrap();
        assert!(verify_digest(&path, &digest).is_ok());

        // Truncation after the digest was taken must be caught.
        let mut file = File::options().append(true).open(&path).unwrap();
        file.write_all(b"tail").unwrap();
        let err = verify_digest(&path, &digest).unwrap_err();
        assert!(matches!(err, BackupError::Integrity { .. }));
    }

    #[test]
    fn missing_export_is_a_storage_error_and_leaves_no_partial() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("nope.sql");
        let partial = dir.path().join("a.partial");
        let final_path = dir.path().join("a.sql.gz");

        let err = build_artifact(&src, &partial, &final_path, created_at()).unwrap_err();
        assert!(matches!(err, BackupError::Storage { .. }));
        assert!(!partial.exists());
        assert!(!final_path.exists());
    }
}
