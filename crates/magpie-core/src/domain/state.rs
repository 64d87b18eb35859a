//! Run state machine.
//!
//! One run walks `Idle → Locking → Dumping → Verifying → LocalPrune →
//! Uploading → RemotePrune → Reporting → Idle`. A fatal failure jumps
//! straight to `Reporting`; a recoverable one also ends at `Reporting`
//! but only after the remaining recoverable stages had their chance.

/// Position of a run in its lifecycle. `Idle` is both initial and terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Locking,
    Dumping,
    Verifying,
    LocalPrune,
    Uploading,
    RemotePrune,
    Reporting,
}

impl RunState {
    /// Next state on the happy path.
    pub fn advance(self) -> Self {
        match self {
            Self::Idle => Self::Locking,
            Self::Locking => Self::Dumping,
            Self::Dumping => Self::Verifying,
            Self::Verifying => Self::LocalPrune,
            Self::LocalPrune => Self::Uploading,
            Self::Uploading => Self::RemotePrune,
            Self::RemotePrune => Self::Reporting,
            Self::Reporting => Self::Idle,
        }
    }

    /// Target state when the current stage fails. Every failure converges
    /// on `Reporting`; the report's classification carries the difference
    /// between fatal and recoverable.
    pub fn fail(self) -> Self {
        Self::Reporting
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Locking => "locking",
            Self::Dumping => "dumping",
            Self::Verifying => "verifying",
            Self::LocalPrune => "local_prune",
            Self::Uploading => "uploading",
            Self::RemotePrune => "remote_prune",
            Self::Reporting => "reporting",
        }
    }
}
