// SPDX-License-Identifier: MIT

//! Instance Pool: a bounded set of reusable [`AnnotatorHandle`]s, acquired
//! cooperatively (blocking the acquirer rather than failing fast when
//! saturated). [`AdaptiveInstancePool`] wraps it with runtime resizing
//! driven by free memory and recent throughput.

use crate::EngineError;
use annobatch_adapters::process_control;
use annobatch_core::{AnnotatorHandle, HandleId, IdGen};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use sysinfo::System;
use tokio::sync::{Mutex, Notify};

/// Grace period given to a drained handle's subprocess during shutdown
/// before it's killed outright.
const SHUTDOWN_KILL_GRACE: Duration = Duration::from_secs(2);

struct PoolState {
    idle: VecDeque<AnnotatorHandle>,
    cap: usize,
    created: usize,
    closed: bool,
}

/// A handle checked out from the pool; returns itself on drop via the
/// enclosing `InstancePool::acquire` caller calling [`InstancePool::release`].
pub struct Lease {
    pub handle: AnnotatorHandle,
}

pub struct InstancePool {
    state: Mutex<PoolState>,
    notify: Notify,
}

impl InstancePool {
    pub fn new(cap: usize) -> Self {
        Self { state: Mutex::new(PoolState { idle: VecDeque::new(), cap, created: 0, closed: false }), notify: Notify::new() }
    }

    pub async fn cap(&self) -> usize {
        self.state.lock().await.cap
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    /// Block cooperatively until a handle is available, constructing a new
    /// one if the pool hasn't reached capacity yet. Fails once the pool has
    /// been shut down, including for a caller already blocked when shutdown
    /// happens.
    pub async fn acquire<G: IdGen>(&self, id_gen: &G, now_ms: u64) -> Result<Lease, EngineError> {
        loop {
            {
                let mut state = self.state.lock().await;
                if state.closed {
                    return Err(EngineError::PoolShutDown);
                }
                if let Some(handle) = state.idle.pop_front() {
                    return Ok(Lease { handle });
                }
                if state.created < state.cap {
                    state.created += 1;
                    let handle = AnnotatorHandle::new(HandleId::new(id_gen.next()), now_ms, None);
                    return Ok(Lease { handle });
                }
            }
            self.notify.notified().await;
        }
    }

    pub async fn release(&self, handle: AnnotatorHandle) {
        let mut state = self.state.lock().await;
        if handle.is_alive() && !state.closed {
            state.idle.push_back(handle);
        } else {
            state.created = state.created.saturating_sub(1);
        }
        drop(state);
        self.notify.notify_one();
    }

    pub async fn set_cap(&self, cap: usize) {
        let mut state = self.state.lock().await;
        state.cap = cap;
        drop(state);
        self.notify.notify_waiters();
    }

    pub async fn created_handles(&self) -> usize {
        self.state.lock().await.created
    }

    /// Close the pool to further acquisitions, wake every blocked acquirer
    /// so it observes the closed state instead of hanging, and drain idle
    /// handles, terminating any outstanding subprocess within `timeout`
    /// overall.
    pub async fn shutdown(&self, timeout: Duration) {
        let mut state = self.state.lock().await;
        state.closed = true;
        let drained: Vec<AnnotatorHandle> = state.idle.drain(..).collect();
        drop(state);
        self.notify.notify_waiters();

        let deadline = tokio::time::Instant::now() + timeout;
        for handle in drained {
            if tokio::time::Instant::now() >= deadline {
                break;
            }
            if let Some(pid) = handle.pid {
                let _ = process_control::terminate(pid, SHUTDOWN_KILL_GRACE).await;
            }
        }
    }
}

/// Wraps [`InstancePool`] with throughput-aware resizing between `floor`
/// and `ceiling`, consulted by the scheduler at chunk boundaries.
pub struct AdaptiveInstancePool {
    pub pool: InstancePool,
    floor: usize,
    ceiling: usize,
    recent_completions: AtomicUsize,
}

impl AdaptiveInstancePool {
    pub fn new(initial_cap: usize, floor: usize, ceiling: usize) -> Self {
        Self { pool: InstancePool::new(initial_cap.clamp(floor, ceiling)), floor, ceiling, recent_completions: AtomicUsize::new(0) }
    }

    pub fn record_completion(&self) {
        self.recent_completions.fetch_add(1, Ordering::Relaxed);
    }

    pub async fn shutdown(&self, timeout: Duration) {
        self.pool.shutdown(timeout).await;
    }

    /// Re-evaluate capacity based on free memory and recent throughput.
    /// Grows when memory is plentiful and work has been flowing; shrinks
    /// when memory is tight, regardless of throughput.
    pub async fn rebalance(&self, system: &System) {
        let free_ratio = free_memory_ratio(system);
        let had_throughput = self.recent_completions.swap(0, Ordering::Relaxed) > 0;
        let current = self.pool.cap().await;

        let next = if free_ratio < 0.15 {
            current.saturating_sub(1).max(self.floor)
        } else if free_ratio > 0.40 && had_throughput {
            (current + 1).min(self.ceiling)
        } else {
            current
        };

        if next != current {
            self.pool.set_cap(next).await;
        }
    }
}

fn free_memory_ratio(system: &System) -> f64 {
    let total = system.total_memory();
    if total == 0 {
        return 1.0;
    }
    system.available_memory() as f64 / total as f64
}

pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(120);
