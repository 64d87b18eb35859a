//! Domain model (artifacts, retention policy, run reports, run state, errors).

pub mod artifact;
pub mod errors;
pub mod policy;
pub mod report;
pub mod state;

pub use artifact::{ArtifactName, BackupArtifact, Location, VerifyStatus};
pub use errors::{BackupError, Severity};
pub use policy::{PolicyError, RetentionPolicy};
pub use report::{RunReport, RunStatus, Stage, StageRecord, StageStatus};
pub use state::RunState;
