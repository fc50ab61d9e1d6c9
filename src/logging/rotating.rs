//! Time-partitioned log files with a stable alias
//!
//! Each sink writes to `<dir>/<name>.<suffix>`, one file per time bucket, and keeps
//! `<dir>/<name>` as a symlink to the newest partition.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};

use super::clock::{Clock, SystemClock};
use super::retention::{self, PruneReport};
use crate::error::{ConfigError, SinkError};

/// Default width of a partition bucket
pub const DEFAULT_BUCKET: Duration = Duration::from_secs(60 * 60);

/// Default age after which partitions are pruned
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Default strftime pattern for partition suffixes, e.g. `2026012114`
pub const DEFAULT_SUFFIX_FORMAT: &str = "%Y%m%d%H";

// Arbitrary instant with non-zero minutes and seconds, used to check that a suffix
// pattern is fine-grained enough for the bucket width.
const SUFFIX_SAMPLE_SECS: i64 = 1_769_006_445;

/// Start of a time bucket, in local wall-clock seconds since the epoch
///
/// Buckets are floored on local time so partition names line up with the `ts` of
/// the lines inside them, whatever the zone offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketKey(i64);

impl BucketKey {
    /// Bucket containing `time` for buckets of `width`
    pub fn containing(time: DateTime<Utc>, width: Duration) -> Self {
        let width = width_secs(width);
        Self(local_secs(time).div_euclid(width) * width)
    }

    pub fn start_secs(&self) -> i64 {
        self.0
    }

    /// Local wall-clock time the bucket starts at
    pub fn start(&self) -> Option<NaiveDateTime> {
        DateTime::from_timestamp(self.0, 0).map(|t| t.naive_utc())
    }
}

/// Seconds since the epoch as read off the local wall clock
fn local_secs(time: DateTime<Utc>) -> i64 {
    time.with_timezone(&Local).naive_local().and_utc().timestamp()
}

fn width_secs(width: Duration) -> i64 {
    i64::try_from(width.as_secs()).unwrap_or(i64::MAX).max(1)
}

/// Naming, rotation and retention settings for one sink
///
/// Sub-second parts of the durations are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPolicy {
    log_dir: PathBuf,
    name: String,
    bucket: Duration,
    retention: Duration,
    suffix_format: String,
}

impl RotationPolicy {
    /// Hourly partitions kept for seven days
    pub fn new(log_dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            log_dir: log_dir.into(),
            name: name.into(),
            bucket: DEFAULT_BUCKET,
            retention: DEFAULT_RETENTION,
            suffix_format: DEFAULT_SUFFIX_FORMAT.to_string(),
        }
    }

    pub fn with_bucket(mut self, bucket: Duration) -> Self {
        self.bucket = bucket;
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_suffix_format(mut self, format: impl Into<String>) -> Self {
        self.suffix_format = format.into();
        self
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bucket(&self) -> Duration {
        self.bucket
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    pub fn suffix_format(&self) -> &str {
        &self.suffix_format
    }

    /// Path of the symlink that tracks the newest partition
    pub fn alias_path(&self) -> PathBuf {
        self.log_dir.join(&self.name)
    }

    /// Path of the partition file for a bucket
    pub fn partition_path(&self, bucket: BucketKey) -> PathBuf {
        self.log_dir
            .join(format!("{}.{}", self.name, self.format_suffix(bucket)))
    }

    fn format_suffix(&self, bucket: BucketKey) -> String {
        match bucket.start() {
            Some(start) => start.format(&self.suffix_format).to_string(),
            None => bucket.start_secs().to_string(),
        }
    }

    /// Recover the bucket key from a partition file name, if it is one of ours
    pub fn bucket_of(&self, file_name: &str) -> Option<BucketKey> {
        let suffix = file_name
            .strip_prefix(self.name.as_str())?
            .strip_prefix('.')?;
        let start = parse_suffix(suffix, &self.suffix_format)?;
        Some(BucketKey(start.and_utc().timestamp()))
    }

    /// Whether a bucket has aged out at `now`
    pub fn is_expired(&self, bucket: BucketKey, now: DateTime<Utc>) -> bool {
        let retention = i64::try_from(self.retention.as_secs()).unwrap_or(i64::MAX);
        local_secs(now).saturating_sub(bucket.start_secs()) >= retention
    }

    /// Check the policy is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty()
            || self.name == "."
            || self.name == ".."
            || self.name.contains(['/', '\\'])
        {
            return Err(ConfigError::InvalidLogName(self.name.clone()));
        }
        let bucket_secs = self.bucket.as_secs();
        let retention_secs = self.retention.as_secs();
        if bucket_secs == 0 {
            return Err(ConfigError::ZeroBucket);
        }
        if retention_secs == 0 {
            return Err(ConfigError::ZeroRetention);
        }
        if retention_secs < bucket_secs {
            return Err(ConfigError::RetentionShorterThanBucket {
                retention_secs,
                bucket_secs,
            });
        }
        if self.suffix_format.trim().is_empty() {
            return Err(ConfigError::EmptySuffixFormat);
        }

        // Two different buckets must never map to the same file name
        let sample = DateTime::from_timestamp(SUFFIX_SAMPLE_SECS, 0).unwrap_or_default();
        let bucket = BucketKey::containing(sample, self.bucket);
        let name = self.partition_path(bucket);
        let file_name = name.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if self.bucket_of(file_name) != Some(bucket) {
            return Err(ConfigError::SuffixTooCoarse {
                format: self.suffix_format.clone(),
                bucket_secs,
            });
        }
        Ok(())
    }
}

/// Parse a partition suffix back into the bucket start
///
/// chrono needs at least hour and minute to build a time, so hour- and
/// day-granular patterns are completed before giving up.
fn parse_suffix(suffix: &str, format: &str) -> Option<NaiveDateTime> {
    if let Ok(time) = NaiveDateTime::parse_from_str(suffix, format) {
        return Some(time);
    }
    let padded = format!("{}00", suffix);
    let padded_format = format!("{}%M", format);
    if let Ok(time) = NaiveDateTime::parse_from_str(&padded, &padded_format) {
        return Some(time);
    }
    NaiveDate::parse_from_str(suffix, format)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// The partition currently receiving writes
struct ActivePartition {
    bucket: BucketKey,
    path: PathBuf,
    file: File,
}

impl ActivePartition {
    fn append(&mut self, line: &str) -> Result<(), SinkError> {
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');
        self.file
            .write_all(buf.as_bytes())
            .and_then(|()| self.file.flush())
            .map_err(|source| SinkError::Write {
                path: self.path.clone(),
                source,
            })
    }
}

/// Durable, hourly-rotated destination for one band
///
/// All writes go through one lock, so concurrent callers never interleave lines or
/// race each other into a rotation.
pub struct RotatingFileSink {
    policy: RotationPolicy,
    clock: Arc<dyn Clock>,
    active: Mutex<Option<ActivePartition>>,
}

impl std::fmt::Debug for RotatingFileSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotatingFileSink")
            .field("policy", &self.policy)
            .field("active", &self.active_path())
            .finish()
    }
}

impl RotatingFileSink {
    /// Create a sink on the system clock
    ///
    /// Nothing is opened until the first write.
    pub fn new(policy: RotationPolicy) -> Result<Self, ConfigError> {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    /// Create a sink driven by a custom clock
    pub fn with_clock(policy: RotationPolicy, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        policy.validate()?;
        Ok(Self {
            policy,
            clock,
            active: Mutex::new(None),
        })
    }

    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    /// Path of the partition currently open, if any
    pub fn active_path(&self) -> Option<PathBuf> {
        self.lock_active().as_ref().map(|p| p.path.clone())
    }

    /// Append one line, rotating first if the clock has entered a newer bucket
    ///
    /// `line` must not contain a line terminator. Failures to rotate or write are
    /// returned as-is; nothing is retried.
    pub fn write(&self, line: &str) -> Result<(), SinkError> {
        let report = {
            let mut active = self.lock_active();
            let now = self.clock.now();
            let bucket = BucketKey::containing(now, self.policy.bucket);

            // Only forward transitions rotate, so a clock stepping backward keeps
            // writing to the newest partition.
            let needs_rotation = active
                .as_ref()
                .map_or(true, |current| bucket > current.bucket);

            let report = if needs_rotation {
                let next = self.open_partition(bucket)?;
                // Replacing the previous partition closes its handle
                *active = Some(next);
                Some(retention::prune_expired(
                    &self.policy,
                    now,
                    active.as_ref().map(|p| p.path.as_path()),
                ))
            } else {
                None
            };

            if let Some(partition) = active.as_mut() {
                partition.append(line)?;
            }
            report
        };

        // Reported outside the lock so a subscriber routing back here cannot deadlock
        if let Some(report) = report {
            report.log(&self.policy);
        }
        Ok(())
    }

    /// Delete partitions that have aged out, sparing the active one
    pub fn prune(&self) -> PruneReport {
        let report = {
            let active = self.lock_active();
            retention::prune_expired(
                &self.policy,
                self.clock.now(),
                active.as_ref().map(|p| p.path.as_path()),
            )
        };
        report.log(&self.policy);
        report
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, Option<ActivePartition>> {
        // A panic mid-write leaves at worst a partial line; the handle is still usable
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open_partition(&self, bucket: BucketKey) -> Result<ActivePartition, SinkError> {
        let log_dir = self.policy.log_dir();
        fs::create_dir_all(log_dir).map_err(|source| SinkError::Rotation {
            path: log_dir.to_path_buf(),
            source,
        })?;

        let path = self.policy.partition_path(bucket);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| SinkError::Rotation {
                path: path.clone(),
                source,
            })?;

        self.repoint_alias(&path)
            .map_err(|source| SinkError::Rotation {
                path: self.policy.alias_path(),
                source,
            })?;

        Ok(ActivePartition { bucket, path, file })
    }

    /// Swap the alias to `target` with a rename so it never goes missing
    fn repoint_alias(&self, target: &Path) -> io::Result<()> {
        let alias = self.policy.alias_path();
        let staging = self
            .policy
            .log_dir()
            .join(format!(".{}.link", self.policy.name()));

        match fs::remove_file(&staging) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
            _ => {}
        }

        // Relative target: alias and partition share a directory
        let relative = target.file_name().map(Path::new).unwrap_or(target);
        make_symlink(relative, &staging)?;
        fs::rename(&staging, &alias)
    }
}

#[cfg(unix)]
fn make_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn make_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}
