//! Remote retention: age-based pruning of uploaded artifacts.
//!
//! Design intent:
//! - Age comes from the key's embedded timestamp, falling back to the
//!   store's `last_modified` metadata when the key does not parse. An
//!   object with neither is left alone — never delete what cannot be dated.
//! - Partial failure is tolerated: every candidate is attempted, failures
//!   are aggregated into one recoverable error.
//! - An empty listing (first-ever run) is a successful no-op.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::domain::{ArtifactName, BackupError, RetentionPolicy};
use crate::ports::RemoteStore;

/// What a remote prune pass did.
#[derive(Debug, Default)]
pub struct RemotePruneOutcome {
    pub examined: usize,
    pub deleted: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// Delete every object under `prefix` older than the policy's threshold.
pub async fn prune(
    store: &dyn RemoteStore,
    prefix: &str,
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
) -> Result<RemotePruneOutcome, BackupError> {
    let objects = store.list(prefix).await.map_err(|e| BackupError::Retention {
        detail: format!("list {prefix}: {e}"),
    })?;

    let cutoff = now - policy.remote_max_age();
    let mut outcome = RemotePruneOutcome {
        examined: objects.len(),
        ..RemotePruneOutcome::default()
    };

    for object in objects {
        let created_at = match ArtifactName::parse_key(&object.key).or(object.last_modified) {
            Some(created_at) => created_at,
            None => {
                warn!(key = %object.key, "remote object has no datable identity, leaving it");
                continue;
            }
        };
        if created_at >= cutoff {
            continue;
        }
        match store.delete(&object.key).await {
            Ok(()) => {
                info!(key = %object.key, created_at = %created_at, "pruned remote artifact");
                outcome.deleted.push(object.key);
            }
            Err(err) => {
                warn!(key = %object.key, error = %err, "could not prune remote artifact");
                outcome.failed.push((object.key, err.to_string()));
            }
        }
    }

    if outcome.failed.is_empty() {
        Ok(outcome)
    } else {
        Err(BackupError::Retention {
            detail: format!(
                "{} of {} deletion(s) failed (deleted {})",
                outcome.failed.len(),
                outcome.failed.len() + outcome.deleted.len(),
                outcome.deleted.len()
            ),
        })
    }
}
