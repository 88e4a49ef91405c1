// SPDX-License-Identifier: MIT

//! Durable state store backed by a [`StateSnapshot`] — a lighter-weight
//! alternative to [`crate::manifest_store::ManifestStore`] for streaming
//! runs that don't need per-file concept statistics, only completion
//! tracking.

use crate::atomic::{save_atomic, AtomicWriter, FsAtomicWriter};
use crate::error::StorageError;
use annobatch_core::StateSnapshot;
use std::path::{Path, PathBuf};
use tracing::debug;

const FLUSH_BATCH_SIZE: usize = 10;

pub struct SnapshotStore<W: AtomicWriter = FsAtomicWriter> {
    path: PathBuf,
    snapshot: StateSnapshot,
    writer: W,
    pending_since_flush: usize,
}

impl SnapshotStore<FsAtomicWriter> {
    pub fn load_or_create(path: impl Into<PathBuf>, now_ms: u64) -> Result<Self, StorageError> {
        Self::load_or_create_with(path, now_ms, FsAtomicWriter)
    }
}

impl<W: AtomicWriter> SnapshotStore<W> {
    pub fn load_or_create_with(path: impl Into<PathBuf>, now_ms: u64, writer: W) -> Result<Self, StorageError> {
        let path = path.into();
        let snapshot = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            StateSnapshot::new(now_ms)
        };
        Ok(Self { path, snapshot, writer, pending_since_flush: 0 })
    }

    pub fn snapshot(&self) -> &StateSnapshot {
        &self.snapshot
    }

    pub fn is_completed(&self, id: &str) -> bool {
        self.snapshot.is_completed(id)
    }

    pub fn pending(&self, all_ids: &[String]) -> Vec<String> {
        self.snapshot.pending(all_ids)
    }

    pub fn mark_in_progress(&mut self, id: &str, now_ms: u64) -> Result<(), StorageError> {
        self.snapshot.mark_in_progress(id, now_ms);
        self.maybe_flush(false)
    }

    pub fn mark_completed(&mut self, id: &str, concepts: u64, now_ms: u64) -> Result<(), StorageError> {
        self.snapshot.mark_completed(id, concepts, now_ms);
        self.pending_since_flush += 1;
        self.maybe_flush(false)
    }

    pub fn mark_failed(&mut self, id: &str, now_ms: u64) -> Result<(), StorageError> {
        self.snapshot.mark_failed(id, now_ms);
        self.maybe_flush(true)
    }

    pub fn reset(&mut self, now_ms: u64) -> Result<(), StorageError> {
        self.snapshot.reset(now_ms);
        self.maybe_flush(true)
    }

    pub fn reset_file(&mut self, id: &str, now_ms: u64) -> Result<(), StorageError> {
        self.snapshot.reset_file(id, now_ms);
        self.maybe_flush(true)
    }

    pub fn flush(&mut self) -> Result<(), StorageError> {
        debug_assert!(self.snapshot.is_disjoint());
        save_atomic(&self.writer, &self.path, &self.snapshot)?;
        self.pending_since_flush = 0;
        debug!(path = %self.path.display(), "flushed snapshot");
        Ok(())
    }

    fn maybe_flush(&mut self, force: bool) -> Result<(), StorageError> {
        if force || self.pending_since_flush >= FLUSH_BATCH_SIZE {
            self.flush()?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_or_create_starts_empty_when_absent() {
        let dir = tempdir().expect("tempdir");
        let store = SnapshotStore::load_or_create(dir.path().join("snapshot.json"), 0).expect("load");
        assert!(store.snapshot().processed.is_empty());
    }

    #[test]
    fn completion_persists_after_batch_threshold() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("snapshot.json");
        let mut store = SnapshotStore::load_or_create(&path, 0).expect("load");
        for i in 0..FLUSH_BATCH_SIZE {
            let id = format!("f{i}");
            store.mark_in_progress(&id, 0).expect("mark_in_progress");
            store.mark_completed(&id, 1, 1).expect("mark_completed");
        }
        let reloaded = SnapshotStore::load_or_create(&path, 0).expect("reload");
        assert_eq!(reloaded.snapshot().processed.len(), FLUSH_BATCH_SIZE);
    }

    #[test]
    fn failure_flushes_immediately() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("snapshot.json");
        let mut store = SnapshotStore::load_or_create(&path, 0).expect("load");
        store.mark_failed("a", 1).expect("mark_failed");
        let reloaded = SnapshotStore::load_or_create(&path, 0).expect("reload");
        assert!(reloaded.snapshot().failed.contains("a"));
    }

    #[test]
    fn reset_file_clears_persisted_entry() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("snapshot.json");
        let mut store = SnapshotStore::load_or_create(&path, 0).expect("load");
        store.mark_completed("a", 1, 1).expect("mark_completed");
        store.reset_file("a", 2).expect("reset_file");
        assert!(!store.is_completed("a"));
    }
}
