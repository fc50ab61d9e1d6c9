//! Partition retention
//!
//! Deletes partitions whose bucket has aged past the retention window. The age comes
//! from the bucket encoded in the file name, not the file's modification time.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use super::rotating::RotationPolicy;
use crate::error::PruneError;

/// Outcome of one pruning pass
#[derive(Debug, Default)]
pub struct PruneReport {
    /// Partitions deleted
    pub removed: Vec<PathBuf>,
    /// Partitions that could not be deleted; the pass continued past them
    pub failures: Vec<PruneError>,
}

impl PruneReport {
    /// Emit the pass outcome as tracing events
    pub fn log(&self, policy: &RotationPolicy) {
        if !self.removed.is_empty() {
            tracing::debug!(
                log = policy.name(),
                count = self.removed.len(),
                "Pruned expired log partitions"
            );
        }
        for failure in &self.failures {
            tracing::warn!(
                path = %failure.path.display(),
                error = %failure.source,
                "Failed to prune log partition"
            );
        }
    }
}

/// Delete every expired partition of `policy` at `now`
///
/// `keep` is never deleted, whatever its age. Deleting an already missing file
/// counts as neither removal nor failure, so repeated passes are idempotent.
pub fn prune_expired(policy: &RotationPolicy, now: DateTime<Utc>, keep: Option<&Path>) -> PruneReport {
    prune_expired_with(policy, now, keep, |path| fs::remove_file(path))
}

/// [`prune_expired`] with a custom deletion step
pub fn prune_expired_with<F>(
    policy: &RotationPolicy,
    now: DateTime<Utc>,
    keep: Option<&Path>,
    mut remove: F,
) -> PruneReport
where
    F: FnMut(&Path) -> io::Result<()>,
{
    let mut report = PruneReport::default();
    let log_dir = policy.log_dir();

    let entries = match fs::read_dir(log_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return report,
        Err(source) => {
            report.failures.push(PruneError {
                path: log_dir.to_path_buf(),
                source,
            });
            return report;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(source) => {
                report.failures.push(PruneError {
                    path: log_dir.to_path_buf(),
                    source,
                });
                continue;
            }
        };
        let path = entry.path();

        // Only regular files named after this sink's partitions
        let Some(bucket) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| policy.bucket_of(n))
        else {
            continue;
        };
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        if keep == Some(path.as_path()) || !policy.is_expired(bucket, now) {
            continue;
        }

        match remove(&path) {
            Ok(()) => report.removed.push(path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => report.failures.push(PruneError { path, source }),
        }
    }

    report.removed.sort();
    report
}
