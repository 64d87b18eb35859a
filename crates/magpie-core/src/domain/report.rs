//! Run report: the per-stage outcome record for one run.
//!
//! Design intent:
//! - Created at run start, appended to by each stage, finalized once.
//! - Classification is derived purely from the recorded stage outcomes,
//!   so it cannot drift from what actually happened.
//! - Serialized as one JSON document for the monitoring boundary; never
//!   mutated after emission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Dump,
    Verify,
    LocalPrune,
    Upload,
    RemotePrune,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dump => "dump",
            Self::Verify => "verify",
            Self::LocalPrune => "local_prune",
            Self::Upload => "upload",
            Self::RemotePrune => "remote_prune",
        }
    }

    fn is_fatal_on_failure(self) -> bool {
        matches!(self, Self::Dump | Self::Verify)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Succeeded,
    Failed,
    Skipped,
}

/// Final classification of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Degraded,
    Failed,
    Skipped,
}

/// One stage's recorded outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub status: StageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
    pub recorded_at: DateTime<Utc>,
}

/// Outcome record for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    run_id: Ulid,
    started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    finished_at: Option<DateTime<Utc>>,
    stages: Vec<StageRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<RunStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
}

impl RunReport {
    pub fn begin(run_id: Ulid, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            started_at,
            finished_at: None,
            stages: Vec::new(),
            status: None,
            error: None,
            warnings: Vec::new(),
        }
    }

    pub fn run_id(&self) -> Ulid {
        self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn status(&self) -> Option<RunStatus> {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn stages(&self) -> &[StageRecord] {
        &self.stages
    }

    pub fn stage_status(&self, stage: Stage) -> Option<StageStatus> {
        self.stages
            .iter()
            .find(|record| record.stage == stage)
            .map(|record| record.status)
    }

    pub fn stage_succeeded(
        &mut self,
        stage: Stage,
        detail: Option<String>,
        bytes: Option<u64>,
        at: DateTime<Utc>,
    ) {
        self.record(stage, StageStatus::Succeeded, detail, bytes, at);
    }

    pub fn stage_failed(&mut self, stage: Stage, detail: String, at: DateTime<Utc>) {
        self.record(stage, StageStatus::Failed, Some(detail), None, at);
    }

    pub fn stage_skipped(&mut self, stage: Stage, reason: String, at: DateTime<Utc>) {
        self.record(stage, StageStatus::Skipped, Some(reason), None, at);
    }

    fn record(
        &mut self,
        stage: Stage,
        status: StageStatus,
        detail: Option<String>,
        bytes: Option<u64>,
        at: DateTime<Utc>,
    ) {
        self.stages.push(StageRecord {
            stage,
            status,
            detail,
            bytes,
            recorded_at: at,
        });
    }

    /// Note a non-fatal problem that should not change the classification.
    pub fn push_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    /// Mark the run as skipped (lock already held). No stages ran.
    pub fn finish_skipped(&mut self, finished_at: DateTime<Utc>) {
        self.status = Some(RunStatus::Skipped);
        self.finished_at = Some(finished_at);
    }

    /// Mark the run as failed before any stage could run (for example the
    /// lock file could not be created).
    pub fn finish_failed(&mut self, error: String, finished_at: DateTime<Utc>) {
        self.status = Some(RunStatus::Failed);
        self.error = Some(error);
        self.finished_at = Some(finished_at);
    }

    /// Derive the final classification from the recorded stages.
    pub fn finalize(&mut self, finished_at: DateTime<Utc>) {
        let fatal = self
            .stages
            .iter()
            .any(|record| record.status == StageStatus::Failed && record.stage.is_fatal_on_failure());
        let any_failed = self
            .stages
            .iter()
            .any(|record| record.status == StageStatus::Failed);

        self.status = Some(if fatal {
            RunStatus::Failed
        } else if any_failed {
            RunStatus::Degraded
        } else {
            RunStatus::Success
        });
        self.error = self
            .stages
            .iter()
            .find(|record| record.status == StageStatus::Failed)
            .and_then(|record| record.detail.clone());
        self.finished_at = Some(finished_at);
    }

    /// Process exit status: only a failed run is non-zero.
    pub fn exit_code(&self) -> u8 {
        match self.status {
            Some(RunStatus::Failed) | None => 1,
            Some(RunStatus::Success | RunStatus::Degraded | RunStatus::Skipped) => 0,
        }
    }
}
