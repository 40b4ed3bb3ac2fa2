// ABOUTME: Errors raised before a build can start: no runtime, or no connection to it.
// ABOUTME: Exposes a flat kind() so callers can branch without matching sources.

use snafu::Snafu;

use super::detection::DetectionError;

/// Failure to reach a container runtime.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RuntimeError {
    #[snafu(display("runtime detection failed: {source}"))]
    Detection { source: DetectionError },

    #[snafu(display("runtime connection to {socket_path} failed: {source}"))]
    Connection {
        socket_path: String,
        source: bollard::errors::Error,
    },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    NoRuntimeFound,
    /// DOCKER_HOST names a transport other than a unix socket.
    UnsupportedHost,
    ConnectionFailed,
}

impl RuntimeError {
    pub fn kind(&self) -> RuntimeErrorKind {
        match self {
            RuntimeError::Detection { source } => match source {
                DetectionError::NoRuntimeFound => RuntimeErrorKind::NoRuntimeFound,
                DetectionError::UnsupportedHost(_) => RuntimeErrorKind::UnsupportedHost,
            },
            RuntimeError::Connection { .. } => RuntimeErrorKind::ConnectionFailed,
        }
    }
}

impl From<DetectionError> for RuntimeError {
    fn from(source: DetectionError) -> Self {
        RuntimeError::Detection { source }
    }
}
