// SPDX-License-Identifier: MIT

//! Durable state store backed by a [`Manifest`]. Owns the on-disk manifest
//! path, batches completion writes to amortize fsync cost, and always
//! flushes immediately on failure so a crash never hides an error from the
//! next run.

use crate::atomic::{save_atomic, AtomicWriter, FsAtomicWriter};
use crate::error::StorageError;
use annobatch_core::{FileRecord, FileStatus, Manifest};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Number of completions batched between manifest flushes. Failures always
/// flush immediately regardless of this threshold.
const FLUSH_BATCH_SIZE: usize = 10;

pub struct ManifestStore<W: AtomicWriter = FsAtomicWriter> {
    path: PathBuf,
    manifest: Manifest,
    writer: W,
    pending_since_flush: usize,
}

impl ManifestStore<FsAtomicWriter> {
    /// Load an existing manifest from `path`, or create a fresh one if the
    /// file doesn't exist yet.
    pub fn load_or_create(path: impl Into<PathBuf>, now_ms: u64) -> Result<Self, StorageError> {
        Self::load_or_create_with(path, now_ms, FsAtomicWriter)
    }
}

impl<W: AtomicWriter> ManifestStore<W> {
    pub fn load_or_create_with(path: impl Into<PathBuf>, now_ms: u64, writer: W) -> Result<Self, StorageError> {
        let path = path.into();
        let manifest = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            Manifest::new(now_ms)
        };
        Ok(Self { path, manifest, writer, pending_since_flush: 0 })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn is_completed(&self, relative_path: &str) -> bool {
        self.manifest.is_completed(relative_path)
    }

    /// All relative paths the manifest already has a terminal record for.
    pub fn known_paths(&self) -> impl Iterator<Item = &String> {
        self.manifest.files.keys()
    }

    pub fn failed_paths(&self) -> Vec<String> {
        self.manifest
            .files
            .values()
            .filter(|r| r.status == FileStatus::Failed)
            .map(|r| r.relative_path.clone())
            .collect()
    }

    pub fn mark_in_progress(
        &mut self,
        relative_path: &str,
        input_path: PathBuf,
        output_path: PathBuf,
        input_hash: &str,
        file_size: u64,
        now_ms: u64,
    ) -> Result<(), StorageError> {
        let record = FileRecord::new_in_progress(relative_path, input_path, output_path, input_hash, file_size, now_ms);
        self.manifest.upsert(record, now_ms);
        // In-progress markers are informational for crash resume; no need to
        // flush synchronously on every one.
        self.maybe_flush(false)
    }

    pub fn mark_completed(
        &mut self,
        relative_path: &str,
        concepts_found: u64,
        concept_counts: &HashMap<String, u64>,
        processing_time_secs: f64,
        now_ms: u64,
    ) -> Result<(), StorageError> {
        let record = self
            .manifest
            .files
            .get_mut(relative_path)
            .ok_or_else(|| StorageError::UnknownFile(relative_path.to_string()))?;
        record.mark_completed(concepts_found, processing_time_secs, now_ms);
        self.manifest.statistics.record_concepts(concept_counts);
        self.manifest.statistics.total_concepts += concepts_found;
        self.manifest.last_updated_ms = now_ms;
        self.manifest.recompute_stats();
        self.pending_since_flush += 1;
        self.maybe_flush(false)
    }

    pub fn mark_failed(&mut self, relative_path: &str, error: &str, now_ms: u64) -> Result<(), StorageError> {
        let record = self
            .manifest
            .files
            .get_mut(relative_path)
            .ok_or_else(|| StorageError::UnknownFile(relative_path.to_string()))?;
        record.mark_failed(error, now_ms);
        self.manifest.last_updated_ms = now_ms;
        self.manifest.recompute_stats();
        // Failures are rare and diagnostically valuable; never let one sit
        // unflushed in memory.
        self.maybe_flush(true)
    }

    pub fn reset_file(&mut self, relative_path: &str, now_ms: u64) -> Result<(), StorageError> {
        self.manifest.remove(relative_path, now_ms);
        self.maybe_flush(true)
    }

    pub fn flush(&mut self) -> Result<(), StorageError> {
        save_atomic(&self.writer, &self.path, &self.manifest)?;
        self.pending_since_flush = 0;
        debug!(path = %self.path.display(), "flushed manifest");
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
