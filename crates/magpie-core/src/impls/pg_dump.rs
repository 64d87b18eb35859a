//! Dump producer backed by `pg_dumpall`.
//!
//! `pg_dumpall` exports every database through MVCC snapshots, so the
//! result is point-in-time consistent without long-lived write locks on
//! production tables. Stdout goes straight to the destination file;
//! stderr is captured into the error on failure.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use crate::domain::BackupError;
use crate::ports::{DumpProducer, DumpStats};

const STDERR_SNIPPET_LIMIT: usize = 512;

pub struct PgDumpProducer {
    program: String,
    args: Vec<String>,
}

impl PgDumpProducer {
    pub fn new(database_url: &str) -> Self {
        Self {
            program: "pg_dumpall".to_string(),
            args: vec![
                "--dbname".to_string(),
                database_url.to_string(),
                "--no-password".to_string(),
            ],
        }
    }

    /// Arbitrary export command, for tests and non-default installations.
    pub fn with_command(
        program: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl DumpProducer for PgDumpProducer {
    async fn produce(&self, dest: &Path) -> Result<DumpStats, BackupError> {
        let out_file = std::fs::File::create(dest)
            .map_err(|e| BackupError::storage("create export file", dest, e))?;

        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(out_file))
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BackupError::dump(format!("spawn {}: {e}", self.program)))?;

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| BackupError::dump(format!("wait for {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let snippet: String = stderr.trim().chars().take(STDERR_SNIPPET_LIMIT).collect();
            return Err(BackupError::dump(format!(
                "{} exited with {}: {snippet}",
                self.program, output.status
            )));
        }

        let bytes = std::fs::metadata(dest)
            .map_err(|e| BackupError::storage("stat export file", dest, e))?
            .len();
        if bytes == 0 {
            return Err(BackupError::dump("export produced no data"));
        }

        info!(program = %self.program, bytes, "export completed");
        Ok(DumpStats { bytes })
    }
}
