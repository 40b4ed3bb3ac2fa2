// ABOUTME: Container runtime kinds and where their API sockets live.
// ABOUTME: Also holds the detected RuntimeInfo and the configured override.

use serde::{Deserialize, Serialize};
use std::fmt;

pub(crate) const ROOTFUL_PODMAN_SOCKET: &str = "/run/podman/podman.sock";
pub(crate) const DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Daemon flavour behind a Docker-compatible API socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeType {
    Docker,
    Podman,
}

impl RuntimeType {
    pub fn as_str(self) -> &'static str {
        match self {
            RuntimeType::Docker => "docker",
            RuntimeType::Podman => "podman",
        }
    }

    /// System-wide socket used when only the runtime is configured.
    pub fn default_socket(self) -> &'static str {
        match self {
            RuntimeType::Docker => DOCKER_SOCKET,
            RuntimeType::Podman => ROOTFUL_PODMAN_SOCKET,
        }
    }

    /// Best guess from a socket path; anything not named for Podman is Docker.
    pub fn from_socket_path(socket_path: &str) -> Self {
        if socket_path.contains("podman") {
            RuntimeType::Podman
        } else {
            RuntimeType::Docker
        }
    }
}

impl fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The runtime a build will talk to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeInfo {
    pub runtime_type: RuntimeType,
    pub socket_path: String,
}

impl RuntimeInfo {
    pub fn new(runtime_type: RuntimeType, socket_path: impl Into<String>) -> Self {
        Self {
            runtime_type,
            socket_path: socket_path.into(),
        }
    }

    /// Runtime type inferred from the socket path.
    pub fn from_socket(socket_path: impl Into<String>) -> Self {
        let socket_path = socket_path.into();
        Self {
            runtime_type: RuntimeType::from_socket_path(&socket_path),
            socket_path,
        }
    }
}

/// `runtime` and `socket` settings; both unset means auto-detect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RuntimeConfig {
    pub runtime: Option<RuntimeType>,
    pub socket: Option<String>,
}
