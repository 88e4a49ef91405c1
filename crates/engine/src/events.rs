// SPDX-License-Identifier: MIT

//! Typed progress events emitted by the scheduler over a broadcast channel,
//! so a CLI progress bar, a log sink, and a test harness can all subscribe
//! independently instead of the scheduler taking ad hoc callback closures.

use annobatch_core::ServiceName;
use tokio::sync::broadcast;

/// Default channel capacity; a slow subscriber that falls behind this many
/// events starts missing the oldest ones (see `broadcast::Receiver::recv`'s
/// `Lagged` error) rather than back-pressuring the scheduler.
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    BatchStarted { total_files: usize },
    FileStarted { relative_path: String },
    FileComplete { relative_path: String, concepts_found: u64, elapsed_secs: f64 },
    FileFailed { relative_path: String, error: String, attempt: u32 },
    WorkerStatus { active_workers: usize, target_workers: usize },
    ServiceStateChanged { service: ServiceName, healthy: bool },
    StatsTick { processed: u64, failed: u64, pending: u64 },
    BatchFinished { processed: u64, failed: u64 },
}

pub fn channel() -> (broadcast::Sender<SchedulerEvent>, broadcast::Receiver<SchedulerEvent>) {
    broadcast::channel(EVENT_CHANNEL_CAPACITY)
}
