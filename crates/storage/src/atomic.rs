// SPDX-License-Identifier: MIT

//! Atomic JSON persistence: serialize to a sibling temp file, fsync, then
//! rename over the canonical path. Guarantees an external observer never
//! sees a partial or truncated document — only the pre-write or post-write
//! state.

use crate::StorageError;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Abstracts the filesystem calls behind atomic persistence so tests can
/// inject failures without touching a real disk.
pub trait AtomicWriter: Send + Sync {
    fn write_tmp(&self, path: &Path, data: &[u8]) -> Result<(), StorageError>;
    fn fsync_file(&self, path: &Path) -> Result<(), StorageError>;
    fn rename(&self, from: &Path, to: &Path) -> Result<(), StorageError>;
    fn fsync_dir(&self, path: &Path) -> Result<(), StorageError>;
}

/// Production writer using real filesystem operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsAtomicWriter;

impl AtomicWriter for FsAtomicWriter {
    fn write_tmp(&self, path: &Path, data: &[u8]) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = File::create(path)?;
        file.write_all(data)?;
        Ok(())
    }

    fn fsync_file(&self, path: &Path) -> Result<(), StorageError> {
        File::open(path)?.sync_all()?;
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), StorageError> {
        std::fs::rename(from, to)?;
        Ok(())
    }

    fn fsync_dir(&self, path: &Path) -> Result<(), StorageError> {
        // Not all platforms allow opening a directory for fsync (notably
        // Windows); treat failure to open as a no-op rather than fatal,
        // since the rename itself is already atomic on all supported targets.
        if let Ok(dir) = File::open(path) {
            let _ = dir.sync_all();
        }
        Ok(())
    }
}

/// Serialize `value` to JSON and atomically replace the file at `path`
/// using the temp-write/fsync/rename/fsync-dir sequence.
pub fn save_atomic<T: Serialize, W: AtomicWriter>(
    writer: &W,
    path: &Path,
    value: &T,
) -> Result<(), StorageError> {
    let tmp_path = tmp_path_for(path);
    let bytes = serde_json::to_vec_pretty(value)?;
    writer.write_tmp(&tmp_path, &bytes)?;
    writer.fsync_file(&tmp_path)?;
    writer.rename(&tmp_path, path)?;
    if let Some(parent) = path.parent() {
        writer.fsync_dir(parent)?;
    }
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str(".tmp");
    path.with_file_name(name)
}
