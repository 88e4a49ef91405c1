// SPDX-License-Identifier: MIT

//! Worker Scheduler: discovers pending files, dispatches them across a
//! bounded pool of worker tasks, folds results back into the durable state
//! store, and runs the Retry Controller over whatever's still failed once
//! the main pass completes.

use crate::events::{self, SchedulerEvent};
use crate::pool::AdaptiveInstancePool;
use crate::processor::{process_file, ProcessOutcome, ProcessorConfig};
use crate::retry::{RetryController, RetryPolicy};
use crate::tracker::{content_hash, FileTracker, PendingFile};
use crate::EngineError;
use annobatch_core::SequentialIdGen;
use annobatch_storage::ManifestStore;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sysinfo::System;
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Overall budget given to [`AdaptiveInstancePool::shutdown`] to drain idle
/// handles and terminate any outstanding subprocess at the end of a run.
const POOL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub driver: PathBuf,
    pub max_workers: usize,
    pub chunk_size: Option<usize>,
    pub timeout_per_file: Duration,
    pub retry: RetryPolicy,
    pub retries_enabled: bool,
    pub dynamic_workers: bool,
    pub worker_floor: usize,
    /// When re-scanning for unprocessed files, also re-queue completed
    /// files whose content hash no longer matches the manifest record.
    pub rescan: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            output_dir: PathBuf::from("."),
            driver: PathBuf::from("metamap"),
            max_workers: 4,
            chunk_size: None,
            timeout_per_file: Duration::from_secs(300),
            retry: RetryPolicy::default(),
            retries_enabled: true,
            dynamic_workers: false,
            worker_floor: 1,
            rescan: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SchedulerResult {
    pub success: bool,
    pub total: usize,
    pub processed: u64,
    pub failed: u64,
    pub failed_ids: Vec<String>,
    pub elapsed: Duration,
    pub concepts_found: u64,
}

pub struct WorkerScheduler {
    config: SchedulerConfig,
    events: broadcast::Sender<SchedulerEvent>,
}

impl WorkerScheduler {
    pub fn new(config: SchedulerConfig) -> (Self, broadcast::Receiver<SchedulerEvent>) {
        let (events, rx) = events::channel();
        (Self { config, events }, rx)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.events.subscribe()
    }

    /// Shared sender, so collaborators like the health monitor can publish
    /// onto the same event stream instead of opening a second channel.
    pub fn sender(&self) -> broadcast::Sender<SchedulerEvent> {
        self.events.clone()
    }

    pub async fn run(&self, manifest: &mut ManifestStore, now_ms: impl Fn() -> u64 + Send + Sync + Copy + 'static) -> Result<SchedulerResult, EngineError> {
        let start = Instant::now();
        let tracker = FileTracker::new(&self.config.input_dir, &self.config.output_dir, manifest);
        let selection = tracker.select_pending(self.config.rescan)?;

        for file in &selection.already_valid {
            self.mark_already_valid(manifest, file, now_ms)?;
        }

        let mut batch = selection.pending;
        if let Some(n) = self.config.chunk_size {
            batch.truncate(n);
        }
        let total = batch.len();
        let _ = self.events.send(SchedulerEvent::BatchStarted { total_files: total });

        if total == 0 {
            manifest.flush()?;
            return Ok(SchedulerResult { success: true, total: 0, elapsed: start.elapsed(), ..Default::default() });
        }

        let adaptive = Arc::new(AdaptiveInstancePool::new(self.config.max_workers, self.config.worker_floor, self.config.max_workers));
        let id_gen = SequentialIdGen::new("handle");

        let result = self.run_with_pool(manifest, batch, total, &adaptive, &id_gen, now_ms, start).await;
        adaptive.shutdown(POOL_SHUTDOWN_TIMEOUT).await;
        result
    }

    /// Mark a file with no completed manifest record but a leftover
    /// sentinel-valid output artifact as completed, without invoking the
    /// annotator. Goes through `mark_in_progress` first since `mark_completed`
    /// requires an existing record.
    fn mark_already_valid(&self, manifest: &mut ManifestStore, file: &PendingFile, now_ms: impl Fn() -> u64) -> Result<(), EngineError> {
        let concepts_found = crate::processor::validate_output(&file.output_path).unwrap_or(0);
        let hash = content_hash(&file.input_path).unwrap_or_default();
        let size = std::fs::metadata(&file.input_path).map(|m| m.len()).unwrap_or(0);
        manifest.mark_in_progress(&file.relative_path, file.input_path.clone(), file.output_path.clone(), &hash, size, now_ms())?;
        manifest.mark_completed(&file.relative_path, concepts_found, &Default::default(), 0.0, now_ms())?;
        Ok(())
    }

    /// The dispatch-and-retry body of [`Self::run`], split out so the pool
    /// shutdown in the caller runs whether this returns `Ok` or `Err`.
    #[allow(clippy::too_many_arguments)]
    async fn run_with_pool(
        &self,
        manifest: &mut ManifestStore,
        batch: Vec<PendingFile>,
        total: usize,
        adaptive: &Arc<AdaptiveInstancePool>,
        id_gen: &SequentialIdGen,
        now_ms: impl Fn() -> u64 + Send + Sync + Copy + 'static,
        start: Instant,
    ) -> Result<SchedulerResult, EngineError> {
        let mut retry_controller = RetryController::new(self.config.retry);

        self.mark_batch_in_progress(manifest, &batch, now_ms)?;
        let outcomes = self.run_batch(&batch, adaptive, id_gen, now_ms).await;

        let mut processed = 0u64;
        let mut failed_ids = Vec::new();
        let mut concepts_found = 0u64;
        for (file, outcome) in batch.iter().zip(outcomes.iter()) {
            if outcome.success {
                processed += 1;
                concepts_found += outcome.concepts_found;
                manifest.mark_completed(&file.relative_path, outcome.concepts_found, &Default::default(), outcome.elapsed.as_secs_f64(), now_ms())?;
                let _ = self.events.send(SchedulerEvent::FileComplete {
                    relative_path: file.relative_path.clone(),
                    concepts_found: outcome.concepts_found,
                    elapsed_secs: outcome.elapsed.as_secs_f64(),
                });
            } else {
                manifest.mark_failed(&file.relative_path, outcome.error.as_deref().unwrap_or("unknown error"), now_ms())?;
                failed_ids.push(file.relative_path.clone());
                let _ = self.events.send(SchedulerEvent::FileFailed {
                    relative_path: file.relative_path.clone(),
                    error: outcome.error.clone().unwrap_or_default(),
                    attempt: 1,
                });
            }
        }

        if self.config.retries_enabled && !failed_ids.is_empty() {
            info!(count = failed_ids.len(), "retrying failed files");
            let file_index: HashMap<String, PendingFile> = batch.iter().cloned().map(|f| (f.relative_path.clone(), f)).collect();

            let (retry_summary, retry_results) = retry_controller
                .retry_failed(&failed_ids, now_ms, |relative_path| {
                    let processor_config = ProcessorConfig { driver: self.config.driver.clone(), timeout: self.config.timeout_per_file };
                    let pool = adaptive.clone();
                    let id_gen = id_gen.clone();
                    let file = file_index.get(&relative_path).cloned();
                    async move {
                        match file {
                            Some(file) => process_one(&processor_config, &pool, &id_gen, now_ms, &file.input_path, &file.output_path).await,
                            None => ProcessOutcome { success: false, elapsed: Duration::ZERO, error: Some("file missing from batch".to_string()), concepts_found: 0 },
                        }
                    }
                })
                .await;

            for (relative_path, outcome) in &retry_results {
                if outcome.success {
                    processed += 1;
                    concepts_found += outcome.concepts_found;
                    failed_ids.retain(|id| id != relative_path);
                    manifest.mark_completed(relative_path, outcome.concepts_found, &Default::default(), outcome.elapsed.as_secs_f64(), now_ms())?;
                    let _ = self.events.send(SchedulerEvent::FileComplete {
                        relative_path: relative_path.clone(),
                        concepts_found: outcome.concepts_found,
                        elapsed_secs: outcome.elapsed.as_secs_f64(),
                    });
                } else {
                    manifest.mark_failed(relative_path, outcome.error.as_deref().unwrap_or("unknown error"), now_ms())?;
                }
            }
            if !retry_summary.skipped.is_empty() {
                info!(count = retry_summary.skipped.len(), "retry budget exhausted or still in backoff, left failed");
            }
        }

        manifest.flush()?;
        let failed = failed_ids.len() as u64;
        let _ = self.events.send(SchedulerEvent::BatchFinished { processed, failed });

        Ok(SchedulerResult { success: true, total, processed, failed, failed_ids, elapsed: start.elapsed(), concepts_found })
    }

    fn mark_batch_in_progress(&self, manifest: &mut ManifestStore, batch: &[PendingFile], now_ms: impl Fn() -> u64) -> Result<(), EngineError> {
        for file in batch {
            let hash = content_hash(&file.input_path).unwrap_or_default();
            let size = std::fs::metadata(&file.input_path).map(|m| m.len()).unwrap_or(0);
            manifest.mark_in_progress(&file.relative_path, file.input_path.clone(), file.output_path.clone(), &hash, size, now_ms())?;
        }
        Ok(())
    }

    async fn run_batch(
        &self,
        batch: &[PendingFile],
        adaptive: &Arc<AdaptiveInstancePool>,
        id_gen: &SequentialIdGen,
        now_ms: impl Fn() -> u64 + Send + Sync + Copy + 'static,
    ) -> Vec<crate::processor::ProcessOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_workers.max(1)));
        let processor_config = Arc::new(ProcessorConfig { driver: self.config.driver.clone(), timeout: self.config.timeout_per_file });
        let mut join_set = JoinSet::new();
        let mut last_status_emit = Instant::now();

        for (index, file) in batch.iter().cloned().enumerate() {
            // The semaphore is never closed, so acquire_owned only fails if
            // this scheduler is dropped mid-dispatch; skip rather than panic.
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                continue;
            };
            let processor_config = processor_config.clone();
            let pool = adaptive.clone();
            let events = self.events.clone();
            let id_gen = id_gen.clone();

            join_set.spawn(async move {
                let _ = events.send(SchedulerEvent::FileStarted { relative_path: file.relative_path.clone() });
                let outcome = process_one(&processor_config, &pool, &id_gen, now_ms, &file.input_path, &file.output_path).await;
                drop(permit);
                (index, outcome)
            });

            if last_status_emit.elapsed() >= Duration::from_millis(500) {
                let _ = self.events.send(SchedulerEvent::WorkerStatus {
                    active_workers: self.config.max_workers - semaphore.available_permits(),
                    target_workers: self.config.max_workers,
                });
                last_status_emit = Instant::now();
            }

            if self.config.dynamic_workers {
                let system = System::new_all();
                adaptive.rebalance(&system).await;
            }
        }

        let mut ordered: Vec<Option<crate::processor::ProcessOutcome>> = (0..batch.len()).map(|_| None).collect();
        while let Some(result) = join_set.join_next().await {
            match result {
                Ok((index, outcome)) => ordered[index] = Some(outcome),
                Err(join_err) => warn!(error = %join_err, "worker task panicked"),
            }
        }

        ordered
            .into_iter()
            .map(|o| o.unwrap_or(ProcessOutcome { success: false, elapsed: Duration::ZERO, error: Some("worker task aborted".to_string()), concepts_found: 0 }))
            .collect()
    }
}

/// Acquire a pool handle, run one file through it, and release the handle
/// on every exit path. Shared by the main dispatch loop and the retry pass
/// so both go through the same resource discipline, per §4.G's "the
/// scheduler injects a `process_fn` that dispatches through the pool".
async fn process_one(
    processor_config: &ProcessorConfig,
    pool: &AdaptiveInstancePool,
    id_gen: &SequentialIdGen,
    now_ms: impl Fn() -> u64,
    input_path: &std::path::Path,
    output_path: &std::path::Path,
) -> ProcessOutcome {
    let lease = match pool.pool.acquire(id_gen, now_ms()).await {
        Ok(lease) => lease,
        Err(_) => return ProcessOutcome { success: false, elapsed: Duration::ZERO, error: Some("instance pool is shut down".to_string()), concepts_found: 0 },
    };
    let outcome = process_file(processor_config, input_path, output_path).await;
    pool.pool.release(lease.handle).await;
    if outcome.success {
        pool.record_completion();
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_worker_floor() {
        let config = SchedulerConfig::default();
        assert!(config.worker_floor >= 1);
        assert!(config.max_workers >= config.worker_floor);
    }

    #[tokio::test]
    async fn empty_input_dir_yields_empty_success_result() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("input");
        let output = dir.path().join("output");
        std::fs::create_dir_all(&input).expect("mkdir");
        std::fs::create_dir_all(&output).expect("mkdir");

        let config = SchedulerConfig { input_dir: input, output_dir: output.clone(), ..SchedulerConfig::default() };
        let (scheduler, _rx) = WorkerScheduler::new(config);
        let mut manifest = ManifestStore::load_or_create(output.join("manifest.json"), 0).expect("manifest");
        let result = scheduler.run(&mut manifest, || 0).await.expect("run");
        assert!(result.success);
        assert_eq!(result.total, 0);
        assert_eq!(result.processed, 0);
    }
}
