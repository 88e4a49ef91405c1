// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! annobatch-engine: orchestration layer tying file discovery, the
//! annotator pool, the backend service supervisor and health monitor, and
//! durable state together behind the worker scheduler.

pub mod error;
pub mod events;
pub mod health;
pub mod pool;
pub mod processor;
pub mod retry;
pub mod scheduler;
pub mod supervisor;
pub mod tracker;

pub use error::EngineError;
pub use events::SchedulerEvent;
pub use health::{HealthMonitor, RestartHandle, ServerStatus};
pub use pool::{AdaptiveInstancePool, InstancePool, Lease};
pub use processor::{process_file, ProcessOutcome, ProcessorConfig};
pub use retry::{RetryController, RetryOutcome, RetryPolicy};
pub use scheduler::{SchedulerConfig, SchedulerResult, WorkerScheduler};
pub use supervisor::{ServerSupervisor, ServiceLaunchSpec};
pub use tracker::{content_hash, FileTracker, PendingFile, PendingSelection};
