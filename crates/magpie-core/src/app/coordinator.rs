//! Run coordinator: one full backup cycle.
//!
//! Design intent:
//! - Stages run strictly sequentially; a fatal failure (dump, verify)
//!   stops the pipeline before anything is registered for retention, a
//!   recoverable one (upload, remote prune) lets it finish degraded.
//! - The lock guard is held across all mutating stages and released by
//!   Drop on every exit path; the report is emitted exactly once, after
//!   release.
//! - Remote pruning is skipped when this cycle's upload failed, so a
//!   persistent outage can never drain the remote history.

use std::sync::Arc;

use tracing::{error, info, warn};
use ulid::Ulid;

use crate::app::archive;
use crate::app::local_store::LocalStore;
use crate::app::remote_retention;
use crate::app::retry::RetryPolicy;
use crate::app::upload::Uploader;
use crate::config::Config;
use crate::domain::{ArtifactName, RunReport, RunState, RunStatus, Stage};
use crate::ports::{Clock, DumpProducer, LockManager, RemoteStore, ReportSink};

pub struct Coordinator {
    config: Config,
    clock: Arc<dyn Clock>,
    dump: Arc<dyn DumpProducer>,
    remote: Arc<dyn RemoteStore>,
    lock: Arc<dyn LockManager>,
    sink: Arc<dyn ReportSink>,
    retry: RetryPolicy,
}

impl Coordinator {
    pub fn new(
        config: Config,
        clock: Arc<dyn Clock>,
        dump: Arc<dyn DumpProducer>,
        remote: Arc<dyn RemoteStore>,
        lock: Arc<dyn LockManager>,
        sink: Arc<dyn ReportSink>,
    ) -> Self {
        Self {
            config,
            clock,
            dump,
            remote,
            lock,
            sink,
            retry: RetryPolicy::default_upload(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Execute one cycle and emit its report.
    pub async fn run(&self) -> RunReport {
        let started = self.clock.now();
        let run_id = Ulid::from_parts(started.timestamp_millis() as u64, rand::random());
        let mut report = RunReport::begin(run_id, started);

        let state = RunState::Idle.advance();
        info!(run_id = %run_id, state = state.as_str(), "backup run starting");

        let guard = match self.lock.acquire(started) {
            Ok(Some(guard)) => guard,
            Ok(None) => {
                info!(run_id = %run_id, "another run holds the lock, skipping this cycle");
                report.finish_skipped(self.clock.now());
                self.sink.emit(&report);
                return report;
            }
            Err(err) => {
                error!(run_id = %run_id, error = %err, "could not acquire run lock");
                report.finish_failed(format!("lock acquisition: {err}"), self.clock.now());
                self.sink.emit(&report);
                return report;
            }
        };

        self.execute(&mut report, state).await;
        report.finalize(self.clock.now());
        drop(guard);

        match report.status() {
            Some(RunStatus::Success) => info!(run_id = %run_id, "backup run succeeded"),
            Some(RunStatus::Degraded) => {
                warn!(run_id = %run_id, error = report.error(), "backup run degraded");
            }
            _ => error!(run_id = %run_id, error = report.error(), "backup run failed"),
        }
        self.sink.emit(&report);
        report
    }

    async fn execute(&self, report: &mut RunReport, mut state: RunState) {
        let store = LocalStore::new(&self.config.backup_dir);

        state = state.advance();
        info!(state = state.as_str(), "entering stage");
        if let Err(err) = store.ensure_layout() {
            report.stage_failed(Stage::Dump, err.to_string(), self.clock.now());
            return;
        }
        match store.discard_incomplete() {
            Ok(0) => {}
            Ok(discarded) => info!(discarded, "cleared temporaries from an interrupted run"),
            Err(err) => warn!(error = %err, "could not clear incomplete temporaries"),
        }

        let created_at = self.clock.now();
        let name = ArtifactName::new(created_at);
        let dump_path = store.incoming_dir().join(name.dump_temp_name());
        match self.dump.produce(&dump_path).await {
            Ok(stats) => {
                info!(bytes = stats.bytes, "export produced");
                report.stage_succeeded(Stage::Dump, None, Some(stats.bytes), self.clock.now());
            }
            Err(err) => {
                error!(stage = Stage::Dump.as_str(), error = %err, "stage failed");
                report.stage_failed(Stage::Dump, err.to_string(), self.clock.now());
                return;
            }
        }

        state = state.advance();
        info!(state = state.as_str(), "entering stage");
        let partial = store.incoming_dir().join(name.archive_temp_name());
        let final_path = store.committed_path(&name);
        let built = {
            let dump_path = dump_path.clone();
            let partial = partial.clone();
            let final_path = final_path.clone();
            tokio::task::spawn_blocking(move || {
                archive::build_artifact(&dump_path, &partial, &final_path, created_at)
            })
            .await
        };
        let mut artifact = match built {
            Ok(Ok(artifact)) => {
                info!(
                    path = %artifact.path().display(),
                    bytes = artifact.size_bytes(),
                    checksum = artifact.checksum(),
                    "artifact committed"
                );
                report.stage_succeeded(
                    Stage::Verify,
                    artifact.checksum().map(str::to_string),
                    Some(artifact.size_bytes()),
                    self.clock.now(),
                );
                artifact
            }
            Ok(Err(err)) => {
                error!(stage = Stage::Verify.as_str(), error = %err, "stage failed");
                report.stage_failed(Stage::Verify, err.to_string(), self.clock.now());
                return;
            }
            Err(join_err) => {
                error!(stage = Stage::Verify.as_str(), error = %join_err, "compression task died");
                report.stage_failed(
                    Stage::Verify,
                    format!("compression task: {join_err}"),
                    self.clock.now(),
                );
                return;
            }
        };

        state = state.advance();
        info!(state = state.as_str(), "entering stage");
        match store.register(&artifact) {
            Err(err) => {
                warn!(error = %err, "artifact registration failed");
                report.stage_failed(Stage::LocalPrune, err.to_string(), self.clock.now());
            }
            Ok(()) => match store.prune(self.config.policy.local_keep_count()) {
                Ok(outcome) => {
                    for (path, reason) in &outcome.failed {
                        report.push_warning(format!(
                            "local prune left {}: {reason}",
                            path.display()
                        ));
                    }
                    report.stage_succeeded(
                        Stage::LocalPrune,
                        Some(format!(
                            "deleted {}, kept {}",
                            outcome.deleted.len(),
                            outcome.kept
                        )),
                        None,
                        self.clock.now(),
                    );
                }
                Err(err) => {
                    warn!(stage = Stage::LocalPrune.as_str(), error = %err, "stage failed");
                    report.stage_failed(Stage::LocalPrune, err.to_string(), self.clock.now());
                }
            },
        }

        state = state.advance();
        info!(state = state.as_str(), "entering stage");
        let uploader = Uploader::new(self.remote.clone(), self.retry.clone());
        match uploader.upload(&artifact, &self.config.remote_prefix).await {
            Ok(key) => {
                artifact.mark_uploaded();
                report.stage_succeeded(
                    Stage::Upload,
                    Some(key),
                    Some(artifact.size_bytes()),
                    self.clock.now(),
                );
            }
            Err(err) => {
                warn!(stage = Stage::Upload.as_str(), error = %err, "stage failed");
                report.stage_failed(Stage::Upload, err.to_string(), self.clock.now());
                // No newer remote artifact landed, so pruning the remote
                // side now could drain it during an outage.
                report.stage_skipped(
                    Stage::RemotePrune,
                    "skipped: upload failed this cycle".into(),
                    self.clock.now(),
                );
                return;
            }
        }

        state = state.advance();
        info!(state = state.as_str(), "entering stage");
        match remote_retention::prune(
            self.remote.as_ref(),
            &self.config.remote_prefix,
            &self.config.policy,
            self.clock.now(),
        )
        .await
        {
            Ok(outcome) => {
                report.stage_succeeded(
                    Stage::RemotePrune,
                    Some(format!(
                        "examined {}, deleted {}",
                        outcome.examined,
                        outcome.deleted.len()
                    )),
                    None,
                    self.clock.now(),
                );
            }
            Err(err) => {
                warn!(stage = Stage::RemotePrune.as_str(), error = %err, "stage failed");
                report.stage_failed(Stage::RemotePrune, err.to_string(), self.clock.now());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RemoteTarget;
    use crate::domain::{BackupError, RetentionPolicy, StageStatus};
    use crate::impls::file_lock::FileLockManager;
    use crate::ports::{DumpStats, FixedClock, RemoteError, RemoteObject};
    use async_trait::async_trait;
    use bytes::Bytes;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration as StdDuration;

    struct ScriptedDump {
        content: &'static [u8],
        fail: bool,
    }

    #[async_trait]
    impl DumpProducer for ScriptedDump {
        async fn produce(&self, dest: &Path) -> Result<DumpStats, BackupError> {
            if self.fail {
                return Err(BackupError::dump("connection refused"));
            }
            std::fs::write(dest, self.content)
                .map_err(|e| BackupError::storage("write export", dest, e))?;
            Ok(DumpStats {
                bytes: self.content.len() as u64,
            })
        }
    }

    #[derive(Default)]
    struct MemoryRemote {
        objects: Mutex<BTreeMap<String, Bytes>>,
        fail_puts: Mutex<bool>,
    }

    impl MemoryRemote {
        fn set_failing(&self, failing: bool) {
            *self.fail_puts.lock().unwrap() = failing;
        }

        fn keys(&self) -> Vec<String> {
            self.objects.lock().unwrap().keys().cloned().collect()
        }
    }

    #[async_trait]
    impl RemoteStore for MemoryRemote {
        async fn put(&self, key: &str, payload: Bytes) -> Result<(), RemoteError> {
            if *self.fail_puts.lock().unwrap() {
                return Err(RemoteError::Transient("remote unreachable".into()));
            }
            self.objects.lock().unwrap().insert(key.to_string(), payload);
            Ok(())
        }

        async fn list(&self, prefix: &str) -> Result<Vec<RemoteObject>, RemoteError> {
            Ok(self
                .objects
                .lock()
                .unwrap()
                .keys()
                .filter(|key| key.starts_with(prefix))
                .map(|key| RemoteObject {
                    key: key.clone(),
                    last_modified: None,
                })
                .collect())
        }

        async fn delete(&self, key: &str) -> Result<(), RemoteError> {
            self.objects.lock().unwrap().remove(key);
            Ok(())
        }
    }

    #[derive(Default)]
    struct CollectingSink {
        reports: Mutex<Vec<RunReport>>,
    }

    impl ReportSink for CollectingSink {
        fn emit(&self, report: &RunReport) {
            self.reports.lock().unwrap().push(report.clone());
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        backup_dir: std::path::PathBuf,
        clock: FixedClock,
        remote: Arc<MemoryRemote>,
        sink: Arc<CollectingSink>,
    }

    fn start_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, 3, 0, 0).unwrap()
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        Harness {
            backup_dir: dir.path().join("backups"),
            _dir: dir,
            clock: FixedClock::new(start_time()),
            remote: Arc::new(MemoryRemote::default()),
            sink: Arc::new(CollectingSink::default()),
        }
    }

    fn coordinator(h: &Harness, policy: RetentionPolicy, fail_dump: bool) -> Coordinator {
        let config = Config {
            database_url: "postgres://backup@localhost/postgres".into(),
            backup_dir: h.backup_dir.clone(),
            remote_target: RemoteTarget::Directory(h.backup_dir.join("mirror")),
            remote_prefix: "backups".into(),
            policy,
            lock_stale_after: Duration::minutes(360),
        };
        let lock = Arc::new(FileLockManager::new(&h.backup_dir, Duration::minutes(360)));
        Coordinator::new(
            config,
            Arc::new(h.clock.clone()),
            Arc::new(ScriptedDump {
                content: b"CREATE TABLE t (id int);\n",
                fail: fail_dump,
            }),
            h.remote.clone(),
            lock,
            h.sink.clone(),
        )
        .with_retry(RetryPolicy {
            base_delay: StdDuration::from_millis(1),
            multiplier: 2.0,
            max_attempts: 3,
        })
    }

    fn local_names(h: &Harness) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&h.backup_dir)
            .unwrap()
            .filter_map(|entry| {
                let name = entry.unwrap().file_name().to_string_lossy().into_owned();
                ArtifactName::parse(&name).map(|_| name)
            })
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn successful_run_commits_uploads_and_reports_success() {
        let h = harness();
        let c = coordinator(&h, RetentionPolicy::new(3, 30).unwrap(), false);

        let report = c.run().await;

        assert_eq!(report.status(), Some(RunStatus::Success));
        assert_eq!(report.exit_code(), 0);
        for stage in [
            Stage::Dump,
            Stage::Verify,
            Stage::LocalPrune,
            Stage::Upload,
            Stage::RemotePrune,
        ] {
            assert_eq!(report.stage_status(stage), Some(StageStatus::Succeeded));
        }
        assert_eq!(local_names(&h), vec!["20260801T030000Z.sql.gz"]);
        assert_eq!(h.remote.keys(), vec!["backups/20260801T030000Z.sql.gz"]);
        assert_eq!(h.sink.reports.lock().unwrap().len(), 1, "emitted exactly once");
    }

    #[tokio::test]
    async fn five_daily_runs_keep_the_three_newest_locally() {
        let h = harness();
        let c = coordinator(&h, RetentionPolicy::new(3, 30).unwrap(), false);

        for _ in 0..5 {
            let report = c.run().await;
            assert_eq!(report.status(), Some(RunStatus::Success));
            h.clock.advance(Duration::days(1));
        }

        assert_eq!(
            local_names(&h),
            vec![
                "20260803T030000Z.sql.gz",
                "20260804T030000Z.sql.gz",
                "20260805T030000Z.sql.gz",
            ]
        );
        // Remote retention has a different clock: everything is younger
        // than 30 days, so all five stay remote.
        assert_eq!(h.remote.keys().len(), 5);
    }

    #[tokio::test]
    async fn remote_artifacts_over_the_age_threshold_are_eventually_deleted() {
        let h = harness();
        let c = coordinator(&h, RetentionPolicy::new(7, 2).unwrap(), false);

        for _ in 0..5 {
            assert_eq!(c.run().await.status(), Some(RunStatus::Success));
            h.clock.advance(Duration::days(1));
        }

        assert_eq!(
            h.remote.keys(),
            vec![
                "backups/20260803T030000Z.sql.gz",
                "backups/20260804T030000Z.sql.gz",
                "backups/20260805T030000Z.sql.gz",
            ]
        );
    }

    #[tokio::test]
    async fn upload_failure_degrades_and_preserves_local_state() {
        let h = harness();
        let c = coordinator(&h, RetentionPolicy::new(3, 30).unwrap(), false);
        h.remote.set_failing(true);

        let report = c.run().await;

        assert_eq!(report.status(), Some(RunStatus::Degraded));
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.stage_status(Stage::Upload), Some(StageStatus::Failed));
        assert_eq!(
            report.stage_status(Stage::RemotePrune),
            Some(StageStatus::Skipped)
        );
        assert_eq!(local_names(&h).len(), 1, "local artifact must survive");
        assert!(h.remote.keys().is_empty());

        // The next cycle recovers on its own.
        h.remote.set_failing(false);
        h.clock.advance(Duration::days(1));
        let report = c.run().await;
        assert_eq!(report.status(), Some(RunStatus::Success));
        assert_eq!(h.remote.keys(), vec!["backups/20260802T030000Z.sql.gz"]);
    }

    #[tokio::test]
    async fn dump_failure_fails_the_run_and_registers_nothing() {
        let h = harness();
        let c = coordinator(&h, RetentionPolicy::new(3, 30).unwrap(), true);

        let report = c.run().await;

        assert_eq!(report.status(), Some(RunStatus::Failed));
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.stage_status(Stage::Dump), Some(StageStatus::Failed));
        assert_eq!(report.stage_status(Stage::Upload), None);
        assert!(local_names(&h).is_empty());
        assert!(h.remote.keys().is_empty());
    }

    #[tokio::test]
    async fn concurrent_trigger_is_skipped_not_queued() {
        let h = harness();
        let c = coordinator(&h, RetentionPolicy::new(3, 30).unwrap(), false);

        std::fs::create_dir_all(&h.backup_dir).unwrap();
        let manager = FileLockManager::new(&h.backup_dir, Duration::minutes(360));
        let _held = manager.acquire(h.clock.now()).unwrap().unwrap();

        let report = c.run().await;
        assert_eq!(report.status(), Some(RunStatus::Skipped));
        assert_eq!(report.exit_code(), 0);
        assert!(report.stages().is_empty());
        assert!(local_names(&h).is_empty(), "no dump may run under a held lock");
    }

    #[tokio::test]
    async fn consecutive_runs_produce_distinct_keys() {
        let h = harness();
        let c = coordinator(&h, RetentionPolicy::new(5, 30).unwrap(), false);

        c.run().await;
        h.clock.advance(Duration::hours(1));
        c.run().await;

        let keys = h.remote.keys();
        assert_eq!(keys.len(), 2);
        assert_ne!(keys[0], keys[1]);
    }
}
