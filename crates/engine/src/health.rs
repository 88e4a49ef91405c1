// SPDX-License-Identifier: MIT

//! Health Monitor: periodically TCP-probes each backend service and trips
//! a circuit breaker after repeated failures, firing a restart request
//! through an injected supervisor handle.

use crate::events::SchedulerEvent;
use annobatch_core::ServiceName;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

const CIRCUIT_BREAKER_THRESHOLD: u32 = 3;
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    Healthy,
    Degraded,
    Down,
    Starting,
    Unknown,
}

struct ServiceHealth {
    status: ServerStatus,
    consecutive_failures: u32,
}

impl Default for ServiceHealth {
    fn default() -> Self {
        Self { status: ServerStatus::Unknown, consecutive_failures: 0 }
    }
}

/// Restart hook invoked when a service's circuit trips. Implemented as a
/// trait object so the monitor doesn't need to know about the supervisor's
/// concrete type or its other collaborators.
#[async_trait::async_trait]
pub trait RestartHandle: Send + Sync {
    async fn restart(&self, service: ServiceName);
}

pub struct HealthMonitor {
    statuses: Mutex<HashMap<ServiceName, ServiceHealth>>,
    check_interval: Duration,
    events: broadcast::Sender<SchedulerEvent>,
    restart: Option<Arc<dyn RestartHandle>>,
}

impl HealthMonitor {
    pub fn new(check_interval: Duration, events: broadcast::Sender<SchedulerEvent>, restart: Option<Arc<dyn RestartHandle>>) -> Self {
        Self { statuses: Mutex::new(HashMap::new()), check_interval, events, restart }
    }

    /// Run forever, probing every configured service each tick. Intended to
    /// be driven inside a `tokio::spawn`'d task and cancelled by dropping
    /// its `JoinHandle`.
    pub async fn run(self: Arc<Self>, services: Vec<ServiceName>) {
        let mut interval = tokio::time::interval(self.check_interval);
        loop {
            interval.tick().await;
            for &service in &services {
                let healthy = probe_port(service.default_port()).await;
                self.clone().update_status(service, healthy).await;
            }
        }
    }

    async fn update_status(self: Arc<Self>, service: ServiceName, healthy: bool) {
        let mut statuses = self.statuses.lock().await;
        let entry = statuses.entry(service).or_default();
        let old_status = entry.status;

        if healthy {
            entry.consecutive_failures = 0;
            entry.status = ServerStatus::Healthy;
        } else {
            entry.consecutive_failures += 1;
            entry.status = if entry.consecutive_failures >= CIRCUIT_BREAKER_THRESHOLD {
                ServerStatus::Down
            } else {
                ServerStatus::Degraded
            };
        }
        let new_status = entry.status;
        let tripped = !healthy && entry.consecutive_failures >= CIRCUIT_BREAKER_THRESHOLD && old_status != ServerStatus::Down;
        drop(statuses);

        if old_status != new_status {
            info!(service = %service, from = ?old_status, to = ?new_status, "health status changed");
            let _ = self.events.send(SchedulerEvent::ServiceStateChanged { service, healthy: new_status == ServerStatus::Healthy });
        }

        if tripped {
            if let Some(restart) = self.restart.clone() {
                warn!(service = %service, "circuit tripped, requesting restart");
                tokio::spawn(async move { restart.restart(service).await });
            }
        }
    }

    pub async fn status(&self, service: ServiceName) -> ServerStatus {
        self.statuses.lock().await.get(&service).map(|h| h.status).unwrap_or(ServerStatus::Unknown)
    }
}

async fn probe_port(port: u16) -> bool {
    tokio::time::timeout(PROBE_TIMEOUT, tokio::net::TcpStream::connect(("127.0.0.1", port)))
        .await
        .map(|r| r.is_ok())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRestart(Arc<AtomicUsize>);

    #[async_trait::async_trait]
    impl RestartHandle for CountingRestart {
        async fn restart(&self, _service: ServiceName) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn healthy_probe_clears_failure_count() {
        let (tx, _rx) = broadcast::channel(16);
        let monitor = Arc::new(HealthMonitor::new(Duration::from_secs(30), tx, None));
        monitor.clone().update_status(ServiceName::Tagger, true).await;
        assert_eq!(monitor.status(ServiceName::Tagger).await, ServerStatus::Healthy);
    }

    #[tokio::test]
    async fn repeated_failure_trips_circuit_and_degrades_first() {
        let (tx, _rx) = broadcast::channel(16);
        let monitor = Arc::new(HealthMonitor::new(Duration::from_secs(30), tx, None));
        monitor.clone().update_status(ServiceName::Tagger, false).await;
        assert_eq!(monitor.status(ServiceName::Tagger).await, ServerStatus::Degraded);
        monitor.clone().update_status(ServiceName::Tagger, false).await;
        monitor.clone().update_status(ServiceName::Tagger, false).await;
        assert_eq!(monitor.status(ServiceName::Tagger).await, ServerStatus::Down);
    }

    #[tokio::test]
    async fn circuit_trip_invokes_restart_handle_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let (tx, _rx) = broadcast::channel(16);
        let monitor = Arc::new(HealthMonitor::new(Duration::from_secs(30), tx, Some(Arc::new(CountingRestart(count.clone())))));
        for _ in 0..3 {
            monitor.clone().update_status(ServiceName::Wsd, false).await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
