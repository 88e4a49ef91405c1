// SPDX-License-Identifier: MIT

//! File discovery and classification: walks the input directory, compares
//! against the durable manifest, and buckets files into unprocessed,
//! failed, and completed so the scheduler never re-does finished work.

use crate::processor::validate_output;
use crate::EngineError;
use annobatch_adapters::hash::hash_file;
use annobatch_core::{FileRecord, FileStatus};
use annobatch_storage::ManifestStore;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One file discovered under the input root, not yet attempted this run.
#[derive(Debug, Clone)]
pub struct PendingFile {
    pub relative_path: String,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
}

/// Result of classifying every discovered file against the manifest and the
/// output directory, per the scheduler's start-up filtering step: a file is
/// either already done (and, if so, never appears here), needs an annotator
/// run (`pending`), or has a leftover output artifact valid enough to count
/// as done without spending a run on it (`already_valid`).
#[derive(Debug, Default)]
pub struct PendingSelection {
    pub pending: Vec<PendingFile>,
    pub already_valid: Vec<PendingFile>,
}

pub struct FileTracker<'a> {
    input_dir: PathBuf,
    output_dir: PathBuf,
    manifest: &'a ManifestStore,
}

impl<'a> FileTracker<'a> {
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>, manifest: &'a ManifestStore) -> Self {
        Self { input_dir: input_dir.into(), output_dir: output_dir.into(), manifest }
    }

    /// Files with no manifest record at all, plus — if `rescan` — completed
    /// files whose current content hash no longer matches the record's
    /// stored hash (the file was edited after being processed).
    pub fn unprocessed(&self, rescan: bool) -> Result<Vec<PendingFile>, EngineError> {
        let all = self.discover_all()?;
        Ok(all
            .into_iter()
            .filter(|f| match self.manifest.manifest().get(&f.relative_path) {
                None => true,
                Some(record) => rescan && record.status == FileStatus::Completed && Self::hash_changed(f, record),
            })
            .collect())
    }

    /// Relative paths the manifest has a `completed` record for.
    pub fn processed_files(&self) -> Vec<String> {
        self.manifest
            .manifest()
            .files
            .values()
            .filter(|r| r.status == FileStatus::Completed)
            .map(|r| r.relative_path.clone())
            .collect()
    }

    /// Classify every discovered file per the scheduler's start-up
    /// sequence: already-completed files are dropped entirely; a file with
    /// no completed record but a sentinel-valid output artifact is already
    /// done in all but name (`already_valid`); everything else needs an
    /// annotator run (`pending`), covering both never-attempted files and
    /// previously-failed ones. `rescan` additionally re-queues completed
    /// files whose content has changed since they were processed.
    pub fn select_pending(&self, rescan: bool) -> Result<PendingSelection, EngineError> {
        let mut selection = PendingSelection::default();
        for file in self.discover_all()? {
            match self.manifest.manifest().get(&file.relative_path) {
                Some(record) if record.status == FileStatus::Completed && !(rescan && Self::hash_changed(&file, record)) => {
                    continue;
                }
                _ => {}
            }
            if validate_output(&file.output_path).is_ok() {
                selection.already_valid.push(file);
            } else {
                selection.pending.push(file);
            }
        }
        Ok(selection)
    }

    fn hash_changed(file: &PendingFile, record: &FileRecord) -> bool {
        content_hash(&file.input_path).map(|hash| hash != record.input_hash).unwrap_or(false)
    }

    /// Every file under the input root with extension `.txt`/`.text`/`.input`,
    /// or no extension at all (as long as its name isn't hidden), regardless
    /// of manifest state.
    pub fn discover_all(&self) -> Result<Vec<PendingFile>, EngineError> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.input_dir).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() || !is_eligible_input(entry.path()) {
                continue;
            }
            let relative_path = entry
                .path()
                .strip_prefix(&self.input_dir)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .into_owned();
            let output_path = self.output_path_for(&relative_path);
            files.push(PendingFile { relative_path, input_path: entry.path().to_path_buf(), output_path });
        }
        Ok(files)
    }

    /// Relative paths with a `failed` record, still present on disk.
    pub fn failed_files(&self) -> Vec<PendingFile> {
        self.manifest
            .failed_paths()
            .into_iter()
            .filter_map(|relative_path| {
                let input_path = self.input_dir.join(&relative_path);
                input_path.exists().then(|| {
                    let output_path = self.output_path_for(&relative_path);
                    PendingFile { relative_path, input_path, output_path }
                })
            })
            .collect()
    }

    fn output_path_for(&self, relative_path: &str) -> PathBuf {
        let stem = Path::new(relative_path).with_extension("");
        self.output_dir.join(format!("{}.csv", stem.display()))
    }

    /// Take up to `target` files from `unprocessed`; if that leaves room,
    /// top up from `failed`.
    pub fn suggest_batch(&self, target: Option<usize>, rescan: bool) -> Result<Vec<PendingFile>, EngineError> {
        let mut batch = self.unprocessed(rescan)?;
        match target {
            Some(n) => {
                batch.truncate(n);
                if batch.len() < n {
                    let mut failed = self.failed_files();
                    failed.truncate(n - batch.len());
                    batch.append(&mut failed);
                }
            }
            None => batch.append(&mut self.failed_files()),
        }
        Ok(batch)
    }

    /// Drop manifest entries whose input file no longer exists on disk.
    pub fn orphan_paths(&self) -> Vec<String> {
        self.manifest
            .known_paths()
            .filter(|relative_path| !self.input_dir.join(relative_path).exists())
            .cloned()
            .collect()
    }
}

pub fn content_hash(path: &Path) -> std::io::Result<String> {
    hash_file(path)
}

const INPUT_EXTENSIONS: &[&str] = &["txt", "text", "input"];

/// Matches the selector's extension set: `.txt`/`.text`/`.input`, or an
/// extension-less file whose name doesn't start with `.` (a hidden file).
fn is_eligible_input(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => INPUT_EXTENSIONS.contains(&ext),
        None => !path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.')),
    }
}
