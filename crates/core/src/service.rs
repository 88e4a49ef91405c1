// SPDX-License-Identifier: MIT

//! Service descriptor for the two required backend annotator services.

use serde::{Deserialize, Serialize};

/// The two backend services the supervisor manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceName {
    Tagger,
    Wsd,
}

impl ServiceName {
    /// Fixed loopback port this service binds to.
    pub fn default_port(self) -> u16 {
        match self {
            ServiceName::Tagger => 1795,
            ServiceName::Wsd => 5554,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ServiceName::Tagger => "tagger",
            ServiceName::Wsd => "wsd",
        }
    }

    /// Binary-name indicators used by the port guard to recognize this
    /// service's process when it's found squatting on the port.
    pub fn indicator_names(self) -> &'static [&'static str] {
        match self {
            ServiceName::Tagger => &["java", "metamap", "skrmedpostctl", "tagger-server"],
            ServiceName::Wsd => &["java", "metamap", "wsdserverctl", "disambserver"],
        }
    }
}

impl std::fmt::Display for ServiceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle state of a supervised service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

/// Per-service bookkeeping owned exclusively by the supervisor.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    pub name: ServiceName,
    pub port: u16,
    pub pid: Option<u32>,
    pub expected_binary_name: &'static str,
    pub state: ServiceState,
    pub consecutive_failures: u32,
}

impl ServiceDescriptor {
    pub fn new(name: ServiceName) -> Self {
        Self {
            name,
            port: name.default_port(),
            pid: None,
            expected_binary_name: match name {
                ServiceName::Tagger => "skrmedpostctl",
                ServiceName::Wsd => "wsdserverctl",
            },
            state: ServiceState::Stopped,
            consecutive_failures: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ports_match_spec() {
        assert_eq!(ServiceName::Tagger.default_port(), 1795);
        assert_eq!(ServiceName::Wsd.default_port(), 5554);
    }

    #[test]
    fn new_descriptor_starts_stopped() {
        let d = ServiceDescriptor::new(ServiceName::Tagger);
        assert_eq!(d.state, ServiceState::Stopped);
        assert_eq!(d.consecutive_failures, 0);
    }
}
