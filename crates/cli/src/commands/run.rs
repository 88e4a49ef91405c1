// SPDX-License-Identifier: MIT

//! `annobatch run` - drive one batch of files through the scheduler.

use crate::config::AppConfig;
use annobatch_core::{Clock, ServiceName, SystemClock};
use annobatch_engine::{
    HealthMonitor, RestartHandle, ServerSupervisor, ServiceLaunchSpec, SchedulerEvent, WorkerScheduler,
};
use annobatch_storage::ManifestStore;
use clap::Args;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, warn};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Directory to read `.txt` input files from.
    #[arg(long)]
    pub input_dir: Option<PathBuf>,

    /// Directory to write per-file output artifacts and the manifest to.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Path to a TOML configuration file; flags override its values.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Path to the annotator driver executable.
    #[arg(long)]
    pub driver: Option<PathBuf>,

    /// Number of files to process concurrently.
    #[arg(long)]
    pub max_workers: Option<usize>,

    /// Process files in fixed-size chunks instead of as one batch.
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Per-file timeout, in seconds.
    #[arg(long)]
    pub timeout_per_file_secs: Option<u64>,

    /// Disable the retry controller for this run.
    #[arg(long)]
    pub no_retries: bool,

    /// Disable backend service startup and health monitoring.
    #[arg(long)]
    pub no_health_monitoring: bool,

    /// Also re-queue completed files whose content has changed since they
    /// were processed.
    #[arg(long)]
    pub rescan: bool,
}

pub async fn handle(args: RunArgs) -> anyhow::Result<i32> {
    let mut config = AppConfig::load(args.config.as_deref())?;
    apply_overrides(&mut config, &args);

    std::fs::create_dir_all(&config.output_dir)?;
    std::fs::create_dir_all(&config.input_dir)?;

    let clock = SystemClock;
    let now_ms = move || clock.epoch_ms();

    let manifest_path = config.output_dir.join("manifest.json");
    let mut manifest = ManifestStore::load_or_create(&manifest_path, now_ms())?;

    let scheduler_config = config.clone().into_scheduler_config();
    let (scheduler, mut events) = WorkerScheduler::new(scheduler_config);

    let supervisor_session = if config.health_monitoring {
        Some(start_supervision(&config, scheduler.sender(), now_ms).await?)
    } else {
        None
    };

    let progress = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => log_event(&event),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let run_result = scheduler.run(&mut manifest, now_ms).await;

    progress.abort();
    if let Some(session) = supervisor_session {
        session.health_task.abort();
    }

    let result = run_result?;
    info!(total = result.total, processed = result.processed, failed = result.failed, elapsed_secs = result.elapsed.as_secs_f64(), "run finished");
    if !result.failed_ids.is_empty() {
        warn!(failed = ?result.failed_ids, "some files did not complete after retries");
    }

    Ok(0)
}

fn apply_overrides(config: &mut AppConfig, args: &RunArgs) {
    if let Some(v) = &args.input_dir {
        config.input_dir = v.clone();
    }
    if let Some(v) = &args.output_dir {
        config.output_dir = v.clone();
    }
    if let Some(v) = &args.driver {
        config.driver = v.clone();
    }
    if let Some(v) = args.max_workers {
        config.max_workers = v;
    }
    if let Some(v) = args.chunk_size {
        config.chunk_size = Some(v);
        config.chunked_processing = true;
    }
    if let Some(v) = args.timeout_per_file_secs {
        config.timeout_per_file_secs = v;
    }
    if args.no_retries {
        config.max_retry_attempts = 0;
    }
    if args.no_health_monitoring {
        config.health_monitoring = false;
    }
    if args.rescan {
        config.rescan = true;
    }
}

fn log_event(event: &SchedulerEvent) {
    match event {
        SchedulerEvent::BatchStarted { total_files } => info!(total_files, "batch started"),
        SchedulerEvent::FileStarted { relative_path } => info!(relative_path, "file started"),
        SchedulerEvent::FileComplete { relative_path, concepts_found, elapsed_secs } => {
            info!(relative_path, concepts_found, elapsed_secs, "file complete")
        }
        SchedulerEvent::FileFailed { relative_path, error, attempt } => {
            warn!(relative_path, error, attempt, "file failed")
        }
        SchedulerEvent::WorkerStatus { active_workers, target_workers } => {
            info!(active_workers, target_workers, "worker status")
        }
        SchedulerEvent::ServiceStateChanged { service, healthy } => info!(%service, healthy, "service state changed"),
        SchedulerEvent::StatsTick { processed, failed, pending } => info!(processed, failed, pending, "progress"),
        SchedulerEvent::BatchFinished { processed, failed } => info!(processed, failed, "batch finished"),
    }
}

struct SupervisorSession {
    health_task: tokio::task::JoinHandle<()>,
}

/// Start both backend services per the configured launch specs and begin
/// health-monitoring them with restart-on-circuit-trip wired back through
/// the same supervisor instance.
async fn start_supervision(
    config: &AppConfig,
    events: broadcast::Sender<SchedulerEvent>,
    now_ms: impl Fn() -> u64 + Send + Sync + Copy + 'static,
) -> anyhow::Result<SupervisorSession> {
    let supervisor_config = config
        .supervisor
        .clone()
        .ok_or_else(|| anyhow::anyhow!("health_monitoring is enabled but no [supervisor] section is configured"))?;

    let specs = launch_specs(&supervisor_config);
    let supervisor = Arc::new(Mutex::new(ServerSupervisor::new()));

    {
        let mut guard = supervisor.lock().await;
        for (name, spec) in &specs {
            info!(service = %name, "starting backend service");
            guard.start(spec, now_ms).await?;
        }
    }

    let restart = Arc::new(SupervisorRestart { supervisor: supervisor.clone(), specs: specs.clone(), now_ms });
    let monitor = Arc::new(HealthMonitor::new(
        Duration::from_secs(supervisor_config.health_check_interval_secs),
        events,
        Some(restart),
    ));
    let services: Vec<ServiceName> = specs.keys().copied().collect();
    let health_task = tokio::spawn(async move { monitor.run(services).await });

    Ok(SupervisorSession { health_task })
}

fn launch_specs(config: &crate::config::SupervisorConfig) -> HashMap<ServiceName, ServiceLaunchSpec> {
    let timeout = Duration::from_secs(config.port_wait_timeout_secs);
    let mut specs = HashMap::new();
    specs.insert(
        ServiceName::Tagger,
        ServiceLaunchSpec {
            name: ServiceName::Tagger,
            control_script: config.tagger_control_script.clone(),
            install_root: config.install_root.clone(),
            java_home: config.java_home.clone(),
            port_wait_timeout: timeout,
        },
    );
    specs.insert(
        ServiceName::Wsd,
        ServiceLaunchSpec {
            name: ServiceName::Wsd,
            control_script: config.wsd_control_script.clone(),
            install_root: config.install_root.clone(),
            java_home: config.java_home.clone(),
            port_wait_timeout: timeout,
        },
    );
    specs
}

struct SupervisorRestart<F> {
    supervisor: Arc<Mutex<ServerSupervisor>>,
    specs: HashMap<ServiceName, ServiceLaunchSpec>,
    now_ms: F,
}

#[async_trait::async_trait]
impl<F: Fn() -> u64 + Send + Sync> RestartHandle for SupervisorRestart<F> {
    async fn restart(&self, service: ServiceName) {
        let Some(spec) = self.specs.get(&service) else {
            return;
        };
        let mut supervisor = self.supervisor.lock().await;
        if let Err(err) = supervisor.restart(spec, &self.now_ms).await {
            error!(service = %service, error = %err, "failed to restart service after circuit trip");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_enable_chunked_processing_when_chunk_size_given() {
        let mut config = AppConfig::default();
        let args = RunArgs {
            input_dir: None,
            output_dir: None,
            config: None,
            driver: None,
            max_workers: None,
            chunk_size: Some(25),
            timeout_per_file_secs: None,
            no_retries: false,
            no_health_monitoring: false,
            rescan: false,
        };
        apply_overrides(&mut config, &args);
        assert!(config.chunked_processing);
        assert_eq!(config.chunk_size, Some(25));
    }

    #[test]
    fn no_retries_flag_zeroes_max_attempts() {
        let mut config = AppConfig::default();
        let args = RunArgs {
            input_dir: None,
            output_dir: None,
            config: None,
            driver: None,
            max_workers: None,
            chunk_size: None,
            timeout_per_file_secs: None,
            no_retries: true,
            no_health_monitoring: false,
            rescan: false,
        };
        apply_overrides(&mut config, &args);
        assert_eq!(config.max_retry_attempts, 0);
    }
}
