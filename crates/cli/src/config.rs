// SPDX-License-Identifier: MIT

//! On-disk configuration: a TOML file overridable by CLI flags, holding the
//! orthogonal feature toggles and numeric knobs the scheduler is built from.

use annobatch_engine::{RetryPolicy, SchedulerConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub driver: PathBuf,
    pub max_workers: usize,
    pub worker_floor: usize,
    pub chunk_size: Option<usize>,
    pub timeout_per_file_secs: u64,
    pub max_retry_attempts: u32,
    /// Re-queue completed files whose content hash no longer matches the
    /// manifest record, in addition to never-attempted and failed ones.
    pub rescan: bool,

    /// Orthogonal feature toggles. Not every one changes scheduler
    /// behavior today; `unified_tracking` and `memory_streaming` are
    /// recorded for forward compatibility with the alternate snapshot
    /// backend and are not yet wired into `into_scheduler_config`.
    pub chunked_processing: bool,
    pub dynamic_workers: bool,
    pub adaptive_pool: bool,
    pub live_monitoring: bool,
    pub validation: bool,
    pub health_monitoring: bool,
    pub unified_tracking: bool,
    pub memory_streaming: bool,

    pub supervisor: Option<SupervisorConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    pub tagger_control_script: PathBuf,
    pub wsd_control_script: PathBuf,
    pub install_root: PathBuf,
    pub java_home: Option<PathBuf>,
    pub port_wait_timeout_secs: u64,
    pub health_check_interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("input"),
            output_dir: PathBuf::from("output"),
            driver: PathBuf::from("metamap"),
            max_workers: 4,
            worker_floor: 1,
            chunk_size: None,
            timeout_per_file_secs: 300,
            max_retry_attempts: 3,
            rescan: false,
            chunked_processing: false,
            dynamic_workers: false,
            adaptive_pool: true,
            live_monitoring: true,
            validation: true,
            health_monitoring: false,
            unified_tracking: false,
            memory_streaming: false,
            supervisor: None,
        }
    }
}

impl AppConfig {
    /// Load from `path` if given, falling back to defaults when absent.
    pub fn load(path: Option<&std::path::Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .map_err(|e| anyhow::anyhow!("reading config '{}': {e}", path.display()))?;
                toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing config '{}': {e}", path.display()))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn into_scheduler_config(self) -> SchedulerConfig {
        let chunk_size = if self.chunked_processing { self.chunk_size } else { None };
        SchedulerConfig {
            input_dir: self.input_dir,
            output_dir: self.output_dir,
            driver: self.driver,
            max_workers: self.max_workers,
            chunk_size,
            timeout_per_file: Duration::from_secs(self.timeout_per_file_secs),
            retry: RetryPolicy { max_attempts: self.max_retry_attempts, ..RetryPolicy::default() },
            retries_enabled: self.max_retry_attempts > 0,
            dynamic_workers: self.dynamic_workers && self.adaptive_pool,
            worker_floor: self.worker_floor,
            rescan: self.rescan,
        }
    }
}
