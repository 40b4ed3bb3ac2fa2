// ABOUTME: Local container runtime detection for the image toolchain.
// ABOUTME: Explicit config wins, then DOCKER_HOST, then Podman sockets before Docker.

use super::types::{DOCKER_SOCKET, ROOTFUL_PODMAN_SOCKET, RuntimeConfig, RuntimeInfo, RuntimeType};
use std::path::Path;

/// Error during runtime detection.
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("no container runtime found (checked DOCKER_HOST, Podman and Docker sockets)")]
    NoRuntimeFound,

    #[error("unsupported DOCKER_HOST {0:?}: only unix:// sockets are supported")]
    UnsupportedHost(String),
}

/// Pick the runtime to build with.
///
/// Order:
/// 1. `runtime`/`socket` from configuration
/// 2. `DOCKER_HOST` when it names a unix socket
/// 3. Rootless Podman socket (`/run/user/$UID/podman/podman.sock`)
/// 4. Rootful Podman socket (`/run/podman/podman.sock`)
/// 5. Docker socket (`/var/run/docker.sock`)
pub fn detect_runtime(config: &RuntimeConfig) -> Result<RuntimeInfo, DetectionError> {
    match (config.runtime, config.socket.as_deref()) {
        (Some(runtime), socket) => {
            return Ok(RuntimeInfo::new(
                runtime,
                socket.unwrap_or(runtime.default_socket()),
            ));
        }
        (None, Some(socket)) => return Ok(RuntimeInfo::from_socket(socket)),
        (None, None) => {}
    }

    if let Some(host) = std::env::var("DOCKER_HOST").ok().filter(|h| !h.is_empty()) {
        let socket = host
            .strip_prefix("unix://")
            .ok_or_else(|| DetectionError::UnsupportedHost(host.clone()))?;
        return Ok(RuntimeInfo::from_socket(socket));
    }

    detect_local()
}

/// Check the well-known socket locations.
pub fn detect_local() -> Result<RuntimeInfo, DetectionError> {
    let rootless = current_uid().map(|uid| format!("/run/user/{}/podman/podman.sock", uid));

    let candidates = rootless
        .into_iter()
        .map(|socket| (RuntimeType::Podman, socket))
        .chain([
            (RuntimeType::Podman, ROOTFUL_PODMAN_SOCKET.to_string()),
            (RuntimeType::Docker, DOCKER_SOCKET.to_string()),
        ]);

    for (runtime, socket) in candidates {
        if Path::new(&socket).exists() {
            tracing::debug!(%runtime, socket = %socket, "found runtime socket");
            return Ok(RuntimeInfo::new(runtime, socket));
        }
    }

    Err(DetectionError::NoRuntimeFound)
}

/// `$UID`, else the real uid from `/proc/self/status`.
fn current_uid() -> Option<String> {
    std::env::var("UID").ok().or_else(|| {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        status
            .lines()
            .find_map(|line| line.strip_prefix("Uid:"))
            .and_then(|rest| rest.split_whitespace().next())
            .map(str::to_string)
    })
}
