//! Error types for the logging pipeline and the process lifecycle marker

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Categories of disk errors for user-friendly messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskErrorKind {
    /// Disk is full or quota exceeded
    DiskFull,
    /// Permission denied (read or write)
    PermissionDenied,
    /// File already exists
    AlreadyExists,
    /// File or directory not found
    NotFound,
    /// Other IO error
    Other,
}

impl DiskErrorKind {
    /// Get a user-friendly message for this error kind
    pub fn user_message(&self) -> &'static str {
        match self {
            DiskErrorKind::DiskFull => "disk full",
            DiskErrorKind::PermissionDenied => "permission denied",
            DiskErrorKind::AlreadyExists => "file already exists",
            DiskErrorKind::NotFound => "file or directory not found",
            DiskErrorKind::Other => "I/O failure",
        }
    }
}

/// Categorize an IO error into a user-friendly category
pub fn categorize_io_error(e: &io::Error) -> DiskErrorKind {
    use std::io::ErrorKind;

    match e.kind() {
        ErrorKind::StorageFull => DiskErrorKind::DiskFull,
        // Some platforms report a full disk as a zero-length write
        ErrorKind::WriteZero => DiskErrorKind::DiskFull,
        ErrorKind::PermissionDenied => DiskErrorKind::PermissionDenied,
        ErrorKind::AlreadyExists => DiskErrorKind::AlreadyExists,
        ErrorKind::NotFound => DiskErrorKind::NotFound,
        _ => {
            #[cfg(unix)]
            {
                if let Some(os_error) = e.raw_os_error() {
                    // ENOSPC = 28, EDQUOT = 122 on Linux and 69 on macOS
                    if os_error == libc::ENOSPC || os_error == libc::EDQUOT {
                        return DiskErrorKind::DiskFull;
                    }
                    if os_error == libc::EACCES {
                        return DiskErrorKind::PermissionDenied;
                    }
                }
            }
            DiskErrorKind::Other
        }
    }
}

/// Fatal failure of a rotating file sink
///
/// Either variant means the sink could not durably record a line. The caller
/// decides whether to retry; the sink never does.
#[derive(Debug, Error)]
pub enum SinkError {
    /// A partition could not be opened or the alias could not be repointed
    #[error("failed to rotate log partition {}: {source}", .path.display())]
    Rotation {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Appending to the active partition failed
    #[error("failed to write log partition {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SinkError {
    /// Path of the partition or alias involved
    pub fn path(&self) -> &PathBuf {
        match self {
            SinkError::Rotation { path, .. } | SinkError::Write { path, .. } => path,
        }
    }

    /// Classify the underlying I/O error
    pub fn disk_error_kind(&self) -> DiskErrorKind {
        match self {
            SinkError::Rotation { source, .. } | SinkError::Write { source, .. } => {
                categorize_io_error(source)
            }
        }
    }
}

/// A stale partition could not be deleted (non-fatal)
#[derive(Debug, Error)]
#[error("failed to prune log partition {}: {source}", .path.display())]
pub struct PruneError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Failure to create or remove the process marker file
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The marker could not be created; startup must abort
    #[error("failed to create pid file {}: {source}", .path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The marker exists but could not be deleted
    #[error("failed to remove pid file {}: {source}", .path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl LifecycleError {
    /// Classify the underlying I/O error
    pub fn disk_error_kind(&self) -> DiskErrorKind {
        match self {
            LifecycleError::Create { source, .. } | LifecycleError::Remove { source, .. } => {
                categorize_io_error(source)
            }
        }
    }
}

/// Invalid logging configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("rotation interval must be greater than zero")]
    ZeroBucket,

    #[error("retention must be greater than zero")]
    ZeroRetention,

    #[error("retention ({retention_secs}s) is shorter than one rotation interval ({bucket_secs}s)")]
    RetentionShorterThanBucket {
        retention_secs: u64,
        bucket_secs: u64,
    },

    #[error("partition suffix format must not be empty")]
    EmptySuffixFormat,

    #[error("partition suffix format {format:?} cannot tell apart {bucket_secs}s buckets")]
    SuffixTooCoarse { format: String, bucket_secs: u64 },

    #[error("log name must be a plain file name, got {0:?}")]
    InvalidLogName(String),

    #[error("normal and elevated logs must use distinct names, both are {0:?}")]
    DuplicateLogName(String),
}
