// SPDX-License-Identifier: MIT

//! Server Supervisor: owns the lifecycle of the two backend annotator
//! services (tagger, WSD), each moving through
//! `Stopped -> Starting -> Running -> Stopping -> Stopped`, with a terminal
//! `Failed` state reachable from any point that exhausts its start protocol.

use crate::EngineError;
use annobatch_adapters::{config_patch, jvm, port_guard, process_control};
use annobatch_core::{ServiceDescriptor, ServiceName, ServiceState};
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

/// Where to find a service's control script and config, and how to launch
/// it directly if the control script can't.
#[derive(Debug, Clone)]
pub struct ServiceLaunchSpec {
    pub name: ServiceName,
    pub control_script: PathBuf,
    pub install_root: PathBuf,
    pub java_home: Option<PathBuf>,
    pub port_wait_timeout: Duration,
}

pub struct ServerSupervisor {
    descriptors: std::collections::HashMap<ServiceName, ServiceDescriptor>,
}

impl Default for ServerSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerSupervisor {
    pub fn new() -> Self {
        let mut descriptors = std::collections::HashMap::new();
        descriptors.insert(ServiceName::Tagger, ServiceDescriptor::new(ServiceName::Tagger));
        descriptors.insert(ServiceName::Wsd, ServiceDescriptor::new(ServiceName::Wsd));
        Self { descriptors }
    }

    pub fn state(&self, service: ServiceName) -> ServiceState {
        self.descriptors.get(&service).map(|d| d.state).unwrap_or(ServiceState::Stopped)
    }

    /// Start protocol: evict whatever's squatting on the port, patch the
    /// control script's embedded paths, launch it (falling back to a direct
    /// JVM invocation if the script is missing), then poll for the port to
    /// come up.
    pub async fn start(&mut self, spec: &ServiceLaunchSpec, now_ms: impl Fn() -> u64) -> Result<(), EngineError> {
        self.set_state(spec.name, ServiceState::Starting);

        port_guard::ensure_port_available(spec.name, spec.port_wait_timeout, &now_ms).await?;

        let java_path = jvm::find_java(spec.java_home.as_deref())
            .ok_or_else(|| EngineError::ServiceUnhealthy { service: spec.name.to_string(), attempts: 0 })?;

        let pid = if spec.control_script.exists() {
            config_patch::patch_script_file(&spec.control_script, &spec.install_root, &java_path)?;
            launch_control_script(&spec.control_script).await?
        } else {
            warn!(service = %spec.name, "control script missing, launching via java directly");
            launch_direct(spec.name, &java_path, &spec.install_root).await?
        };

        wait_for_port(spec.name.default_port(), spec.port_wait_timeout).await?;

        if let Some(descriptor) = self.descriptors.get_mut(&spec.name) {
            descriptor.pid = Some(pid);
            descriptor.state = ServiceState::Running;
            descriptor.consecutive_failures = 0;
        }
        info!(service = %spec.name, pid, "service started");
        Ok(())
    }

    pub async fn stop(&mut self, service: ServiceName) -> Result<(), EngineError> {
        self.set_state(service, ServiceState::Stopping);
        if let Some(pid) = self.descriptors.get(&service).and_then(|d| d.pid) {
            process_control::terminate(pid, Duration::from_secs(2)).await?;
        }
        if let Some(descriptor) = self.descriptors.get_mut(&service) {
            descriptor.pid = None;
            descriptor.state = ServiceState::Stopped;
        }
        Ok(())
    }

    pub async fn restart(&mut self, spec: &ServiceLaunchSpec, now_ms: impl Fn() -> u64) -> Result<(), EngineError> {
        self.stop(spec.name).await?;
        self.start(spec, now_ms).await
    }

    pub fn mark_failed(&mut self, service: ServiceName) {
        self.set_state(service, ServiceState::Failed);
    }

    fn set_state(&mut self, service: ServiceName, state: ServiceState) {
        if let Some(descriptor) = self.descriptors.get_mut(&service) {
            descriptor.state = state;
        }
    }
}

async fn launch_control_script(script: &std::path::Path) -> Result<u32, EngineError> {
    let child = Command::new(script).arg("start").spawn()?;
    Ok(child.id().unwrap_or(0))
}

async fn launch_direct(service: ServiceName, java_path: &std::path::Path, install_root: &std::path::Path) -> Result<u32, EngineError> {
    let jar = install_root.join("lib").join(format!("{}.jar", service.as_str()));
    let child = Command::new(java_path).arg("-jar").arg(jar).spawn()?;
    Ok(child.id().unwrap_or(0))
}

async fn wait_for_port(port: u16, timeout: Duration) -> Result<(), EngineError> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(EngineError::ServiceUnhealthy { service: port.to_string(), attempts: 0 });
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
}
