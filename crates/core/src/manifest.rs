// SPDX-License-Identifier: MIT

//! Processing manifest: a versioned collection of file records plus
//! derived aggregate statistics.
//!
//! Invariant: `total_processed + total_failed <= records.len()`; the
//! aggregate counters are always derivable from the records, so `recompute_stats`
//! is the single source of truth rather than counters drifting independently.

use crate::file_record::{FileRecord, FileStatus};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Current on-disk manifest schema version.
pub const MANIFEST_VERSION: &str = "1.0";

/// Number of top concepts retained in [`ManifestStatistics::top_concepts`].
pub const TOP_CONCEPTS_LEN: usize = 10;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifestStatistics {
    pub total_processed: u64,
    pub total_failed: u64,
    pub total_concepts: u64,
    /// Concept occurrence counts, accumulated additively on each completion.
    #[serde(default)]
    pub concept_counts: HashMap<String, u64>,
    /// Semantic-type occurrence counts, accumulated the same way.
    #[serde(default)]
    pub semantic_type_counts: HashMap<String, u64>,
    /// Top `TOP_CONCEPTS_LEN` concepts by occurrence, recomputed on every save.
    #[serde(default)]
    pub top_concepts: Vec<(String, u64)>,
}

impl ManifestStatistics {
    /// Fold in concept occurrences from one completed file and recompute the
    /// top-N list. Additive: never re-derived from scratch from the record set.
    pub fn record_concepts(&mut self, concepts: &HashMap<String, u64>) {
        for (name, count) in concepts {
            *self.concept_counts.entry(name.clone()).or_insert(0) += count;
        }
        self.recompute_top_concepts();
    }

    fn recompute_top_concepts(&mut self) {
        let mut entries: Vec<(String, u64)> = self
            .concept_counts
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries.truncate(TOP_CONCEPTS_LEN);
        self.top_concepts = entries;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default = "default_version")]
    pub version: String,
    pub created_ms: u64,
    pub last_updated_ms: u64,
    /// Keyed by relative path.
    pub files: BTreeMap<String, FileRecord>,
    pub statistics: ManifestStatistics,
}

fn default_version() -> String {
    MANIFEST_VERSION.to_string()
}

impl Manifest {
    pub fn new(now_ms: u64) -> Self {
        Self {
            version: MANIFEST_VERSION.to_string(),
            created_ms: now_ms,
            last_updated_ms: now_ms,
            files: BTreeMap::new(),
            statistics: ManifestStatistics::default(),
        }
    }

    pub fn upsert(&mut self, record: FileRecord, now_ms: u64) {
        self.files.insert(record.relative_path.clone(), record);
        self.last_updated_ms = now_ms;
        self.recompute_stats();
    }

    pub fn get(&self, relative_path: &str) -> Option<&FileRecord> {
        self.files.get(relative_path)
    }

    pub fn remove(&mut self, relative_path: &str, now_ms: u64) {
        self.files.remove(relative_path);
        self.last_updated_ms = now_ms;
        self.recompute_stats();
    }

    pub fn is_completed(&self, relative_path: &str) -> bool {
        self.files
            .get(relative_path)
            .is_some_and(FileRecord::is_completed)
    }

    /// Recompute `total_processed`/`total_failed` from the current record
    /// set; `total_concepts` and the top-N list stay additive (see
    /// [`ManifestStatistics::record_concepts`]) since concept occurrences
    /// aren't stored per-record in full.
    pub fn recompute_stats(&mut self) {
        let mut processed = 0u64;
        let mut failed = 0u64;
        for record in self.files.values() {
            match record.status {
                FileStatus::Completed => processed += 1,
                FileStatus::Failed => failed += 1,
                FileStatus::InProgress => {}
            }
        }
        self.statistics.total_processed = processed;
        self.statistics.total_failed = failed;
        debug_assert!(
            self.statistics.total_processed + self.statistics.total_failed
                <= self.files.len() as u64
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sample(name: &str, status: FileStatus) -> FileRecord {
        let mut r = FileRecord::new_in_progress(
            name,
            PathBuf::from(format!("/in/{name}")),
            PathBuf::from(format!("/out/{name}.csv")),
            "hash",
            10,
            0,
        );
        r.status = status;
        r
    }

    #[test]
    fn recompute_stats_counts_by_status() {
        let mut m = Manifest::new(0);
        m.upsert(sample("a.txt", FileStatus::Completed), 1);
        m.upsert(sample("b.txt", FileStatus::Failed), 2);
        m.upsert(sample("c.txt", FileStatus::InProgress), 3);
        assert_eq!(m.statistics.total_processed, 1);
        assert_eq!(m.statistics.total_failed, 1);
        assert_eq!(m.files.len(), 3);
    }

    #[test]
    fn invariant_processed_plus_failed_le_records() {
        let mut m = Manifest::new(0);
        for i in 0..5 {
            m.upsert(sample(&format!("f{i}.txt"), FileStatus::Completed), i as u64);
        }
        assert!(m.statistics.total_processed + m.statistics.total_failed <= m.files.len() as u64);
    }

    #[test]
    fn top_concepts_recomputed_additively() {
        let mut stats = ManifestStatistics::default();
        let mut first = HashMap::new();
        first.insert("Neoplasm".to_string(), 3);
        first.insert("Finding".to_string(), 1);
        stats.record_concepts(&first);

        let mut second = HashMap::new();
        second.insert("Neoplasm".to_string(), 2);
        stats.record_concepts(&second);

        assert_eq!(stats.concept_counts.get("Neoplasm"), Some(&5));
        assert_eq!(stats.top_concepts[0].0, "Neoplasm");
    }

    #[test]
    fn is_completed_reflects_status() {
        let mut m = Manifest::new(0);
        m.upsert(sample("a.txt", FileStatus::Completed), 1);
        assert!(m.is_completed("a.txt"));
        assert!(!m.is_completed("missing.txt"));
    }
}
