// SPDX-License-Identifier: MIT

//! Cross-process exclusive lock guarding a state directory, so two
//! orchestrator instances never run against the same output directory at
//! once. The lock is advisory (`flock`-based) and held for the lifetime of
//! the returned guard.

use crate::StorageError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Holds an exclusive lock on `path` until dropped.
pub struct DirectoryLock {
    file: File,
    path: PathBuf,
}

impl DirectoryLock {
    /// Attempt to acquire the lock, retrying until `timeout` elapses.
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let deadline = Instant::now() + timeout;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(Self { file, path: path.to_path_buf() }),
                Err(_) if Instant::now() < deadline => thread::sleep(POLL_INTERVAL),
                Err(_) => {
                    return Err(StorageError::LockTimeout {
                        path: path.to_path_buf(),
                        timeout_ms: timeout.as_millis() as u64,
                    })
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DirectoryLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn acquires_uncontended_lock() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join(".lock");
        let lock = DirectoryLock::acquire(&path, Duration::from_millis(100)).expect("acquire");
        assert_eq!(lock.path(), path);
    }

    #[test]
    fn second_acquire_times_out_while_first_held() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join(".lock");
        let _first = DirectoryLock::acquire(&path, Duration::from_millis(100)).expect("acquire");
        let second = DirectoryLock::acquire(&path, Duration::from_millis(150));
        assert!(matches!(second, Err(StorageError::LockTimeout { .. })));
    }

    #[test]
    fn lock_is_released_on_drop() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join(".lock");
        {
            let _first = DirectoryLock::acquire(&path, Duration::from_millis(100)).expect("acquire");
        }
        let second = DirectoryLock::acquire(&path, Duration::from_millis(100));
        assert!(second.is_ok());
    }
}
