//! Process lifecycle marker (pid file)
//!
//! The marker holds the decimal pid of the running process and exists only while
//! that process is up. It is a best-effort liveness marker, not a cross-process lock.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::LifecycleError;

/// Whether this process currently owns the marker file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Absent,
    Present,
}

/// Marker file recording the owning process id
///
/// Dropping a `Present` marker removes the file. A marker that never reached
/// `Present` never deletes anything, so a failed second instance cannot remove
/// the first instance's file.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
    pid: u32,
    state: LifecycleState,
}

impl PidFile {
    /// Marker for the current process
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_pid(path, std::process::id())
    }

    /// Marker recording an explicit pid
    pub fn with_pid(path: impl Into<PathBuf>, pid: u32) -> Self {
        Self {
            path: path.into(),
            pid,
            state: LifecycleState::Absent,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Exclusively create the marker and write the pid
    ///
    /// Fails if the file already exists or cannot be created. Callers must treat
    /// failure as fatal to startup.
    pub fn create(&mut self) -> Result<(), LifecycleError> {
        let create_err = |source| LifecycleError::Create {
            path: self.path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .map_err(create_err)?;

        let written = file
            .write_all(self.pid.to_string().as_bytes())
            .and_then(|()| file.sync_all());
        if let Err(source) = written {
            drop(file);
            // Never leave a marker without a valid pid behind
            let _ = fs::remove_file(&self.path);
            return Err(create_err(source));
        }

        self.state = LifecycleState::Present;
        tracing::info!(path = %self.path.display(), pid = self.pid, "Created pid file");
        Ok(())
    }

    /// Delete the marker if present
    ///
    /// Returns whether a file was actually removed; an absent file is not an error.
    /// The marker counts as released even when removal fails, so it is reported once.
    pub fn remove(&mut self) -> Result<bool, LifecycleError> {
        self.state = LifecycleState::Absent;
        end_lifecycle(&self.path)
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if self.state == LifecycleState::Present {
            if let Err(e) = self.remove() {
                tracing::warn!("{}", e);
            }
        }
    }
}

/// Create the marker for the current process at `path`
pub fn start_lifecycle(path: impl Into<PathBuf>) -> Result<PidFile, LifecycleError> {
    let mut pid_file = PidFile::new(path);
    pid_file.create()?;
    Ok(pid_file)
}

/// Remove the marker at `path`
///
/// Returns `Ok(false)` when there was nothing to remove.
pub fn end_lifecycle(path: &Path) -> Result<bool, LifecycleError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(LifecycleError::Remove {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiskErrorKind;
    use tempfile::TempDir;

    #[test]
    fn test_create_writes_decimal_pid() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("running.pid");

        let pid_file = start_lifecycle(&path).unwrap();
        assert_eq!(pid_file.state(), LifecycleState::Present);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            std::process::id().to_string()
        );
    }

    #[test]
    fn test_second_create_fails() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("running.pid");

        let _first = start_lifecycle(&path).unwrap();
        let mut second = PidFile::with_pid(&path, 1);
        let err = second.create().unwrap_err();

        assert!(matches!(err, LifecycleError::Create { .. }));
        assert_eq!(err.disk_error_kind(), DiskErrorKind::AlreadyExists);
        assert_eq!(second.state(), LifecycleState::Absent);

        // The failed instance must leave the first marker untouched
        drop(second);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            std::process::id().to_string()
        );
    }

    #[test]
    fn test_remove_after_create() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("running.pid");

        let mut pid_file = PidFile::with_pid(&path, 31337);
        pid_file.create().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "31337");

        assert!(pid_file.remove().unwrap());
        assert_eq!(pid_file.state(), LifecycleState::Absent);
        assert!(!path.exists());
    }

    #[test]
    fn test_remove_absent_is_ok() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("never-created.pid");

        assert!(!end_lifecycle(&path).unwrap());

        let mut pid_file = PidFile::new(&path);
        assert!(!pid_file.remove().unwrap());
        assert!(!pid_file.remove().unwrap());
    }

    #[test]
    fn test_create_in_missing_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing").join("running.pid");

        let err = start_lifecycle(&path).unwrap_err();
        assert!(matches!(err, LifecycleError::Create { .. }));
        assert_eq!(err.disk_error_kind(), DiskErrorKind::NotFound);
    }

    #[test]
    fn test_drop_removes_present_marker() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("running.pid");

        {
            let _pid_file = start_lifecycle(&path).unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());

        // The path is free again for the next process
        let pid_file = start_lifecycle(&path).unwrap();
        assert_eq!(pid_file.state(), LifecycleState::Present);
    }

    #[test]
    fn test_remove_directory_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("running.pid");
        fs::create_dir(&path).unwrap();

        let err = end_lifecycle(&path).unwrap_err();
        assert!(matches!(err, LifecycleError::Remove { .. }));
        assert!(path.exists());
    }

    #[test]
    fn test_failed_remove_is_not_retried_on_drop() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("running.pid");

        let mut pid_file = start_lifecycle(&path).unwrap();
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();

        assert!(matches!(pid_file.remove(), Err(LifecycleError::Remove { .. })));
        assert_eq!(pid_file.state(), LifecycleState::Absent);

        drop(pid_file);
        assert!(path.is_dir());
    }
}
