//! Run lock port.
//!
//! Design intent:
//! - At most one live lock system-wide; acquisition happens before any
//!   mutating stage, release happens on every exit path via Drop.
//! - A held lock is not an error: the caller skips the cycle.
//! - An implementation must be able to detect and reclaim a lock left
//!   behind by a holder that died (stale by age).

use chrono::{DateTime, Utc};

use crate::domain::BackupError;

/// Held for the duration of one run; releasing is dropping.
pub trait RunLockGuard: Send {}

/// Mutual exclusion between runs.
pub trait LockManager: Send + Sync {
    /// `Ok(None)` means another run holds the lock and this cycle should be
    /// skipped. `now` feeds stale-lock detection.
    fn acquire(&self, now: DateTime<Utc>) -> Result<Option<Box<dyn RunLockGuard>>, BackupError>;
}
