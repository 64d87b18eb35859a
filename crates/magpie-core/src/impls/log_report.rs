//! Report sink for the monitoring boundary.
//!
//! Log lines (stderr via the subscriber) carry the human-readable
//! summary; the full report goes to stdout as a single JSON line for
//! log aggregation to pick up.

use tracing::{error, info, warn};

use crate::domain::{RunReport, RunStatus};
use crate::ports::ReportSink;

pub struct LogReportSink;

impl ReportSink for LogReportSink {
    fn emit(&self, report: &RunReport) {
        let stages = report.stages().len();
        match report.status() {
            Some(RunStatus::Success) => {
                info!(run_id = %report.run_id(), stages, "run report: success");
            }
            Some(RunStatus::Skipped) => {
                info!(run_id = %report.run_id(), "run report: skipped, lock held elsewhere");
            }
            Some(RunStatus::Degraded) => {
                warn!(
                    run_id = %report.run_id(),
                    stages,
                    error = report.error(),
                    "run report: degraded"
                );
            }
            Some(RunStatus::Failed) | None => {
                error!(
                    run_id = %report.run_id(),
                    stages,
                    error = report.error(),
                    "run report: failed"
                );
            }
        }
        for warning in report.warnings() {
            warn!(run_id = %report.run_id(), warning = %warning, "run warning");
        }

        match serde_json::to_string(report) {
            Ok(line) => println!("{line}"),
            Err(err) => error!(error = %err, "could not serialize run report"),
        }
    }
}
