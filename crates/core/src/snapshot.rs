// SPDX-License-Identifier: MIT

//! Lightweight state snapshot: the streaming-path alternative to the
//! full [`crate::manifest::Manifest`].
//!
//! Invariant: `processed`, `failed`, and `in_progress` are pairwise
//! disjoint; a file id appears in at most one of the three sets at a time.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotStats {
    pub total_processed: u64,
    pub total_failed: u64,
    pub total_concepts: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub processed: HashSet<String>,
    pub failed: HashSet<String>,
    pub in_progress: HashSet<String>,
    pub stats: SnapshotStats,
    pub last_update_ms: u64,
}

impl StateSnapshot {
    pub fn new(now_ms: u64) -> Self {
        Self {
            last_update_ms: now_ms,
            ..Default::default()
        }
    }

    /// Remove `id` from whichever set currently holds it.
    fn evict(&mut self, id: &str) {
        self.processed.remove(id);
        self.failed.remove(id);
        self.in_progress.remove(id);
    }

    pub fn mark_in_progress(&mut self, id: &str, now_ms: u64) {
        self.evict(id);
        self.in_progress.insert(id.to_string());
        self.last_update_ms = now_ms;
    }

    pub fn mark_completed(&mut self, id: &str, concepts: u64, now_ms: u64) {
        self.evict(id);
        self.processed.insert(id.to_string());
        self.stats.total_concepts += concepts;
        self.last_update_ms = now_ms;
        self.recompute_counts();
    }

    pub fn mark_failed(&mut self, id: &str, now_ms: u64) {
        self.evict(id);
        self.failed.insert(id.to_string());
        self.last_update_ms = now_ms;
        self.recompute_counts();
    }

    pub fn is_completed(&self, id: &str) -> bool {
        self.processed.contains(id)
    }

    pub fn pending(&self, all_ids: &[String]) -> Vec<String> {
        all_ids
            .iter()
            .filter(|id| !self.processed.contains(id.as_str()))
            .cloned()
            .collect()
    }

    pub fn reset(&mut self, now_ms: u64) {
        *self = StateSnapshot::new(now_ms);
    }

    pub fn reset_file(&mut self, id: &str, now_ms: u64) {
        self.evict(id);
        self.last_update_ms = now_ms;
        self.recompute_counts();
    }

    fn recompute_counts(&mut self) {
        self.stats.total_processed = self.processed.len() as u64;
        self.stats.total_failed = self.failed.len() as u64;
    }

    /// Assert the disjointness invariant; used by tests and by callers that
    /// want to fail loudly on corruption rather than silently diverge.
    pub fn is_disjoint(&self) -> bool {
        self.processed.is_disjoint(&self.failed)
            && self.processed.is_disjoint(&self.in_progress)
            && self.failed.is_disjoint(&self.in_progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_move_between_disjoint_sets() {
        let mut s = StateSnapshot::new(0);
        s.mark_in_progress("a", 1);
        assert!(s.in_progress.contains("a"));
        s.mark_completed("a", 5, 2);
        assert!(s.processed.contains("a"));
        assert!(!s.in_progress.contains("a"));
        assert!(s.is_disjoint());
    }

    #[test]
    fn failed_file_can_reenter_in_progress() {
        let mut s = StateSnapshot::new(0);
        s.mark_failed("a", 1);
        assert!(s.failed.contains("a"));
        s.mark_in_progress("a", 2);
        assert!(!s.failed.contains("a"));
        assert!(s.in_progress.contains("a"));
    }

    #[test]
    fn pending_is_set_difference_against_processed() {
        let mut s = StateSnapshot::new(0);
        s.mark_completed("a", 1, 1);
        let all = vec!["a".to_string(), "b".to_string()];
        assert_eq!(s.pending(&all), vec!["b".to_string()]);
    }

    #[test]
    fn reset_file_clears_single_entry() {
        let mut s = StateSnapshot::new(0);
        s.mark_completed("a", 1, 1);
        s.reset_file("a", 2);
        assert!(!s.is_completed("a"));
    }
}
