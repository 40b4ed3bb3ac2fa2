// ABOUTME: Lifecycle error types with SNAFU pattern.
// ABOUTME: Wraps each leaf failure with the step and image it belongs to.

use snafu::Snafu;

use crate::auth::AuthError;
use crate::build::BuildSpecError;
use crate::registry::RegistryError;
use crate::runtime::ToolchainError;
use crate::types::ParseImageRefError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum LifecycleError {
    #[snafu(display("invalid image_uri {image_uri:?}: {source}"))]
    InvalidImageUri {
        image_uri: String,
        source: ParseImageRefError,
    },

    #[snafu(display("failed to parse build specification: {source}"))]
    BuildSpec { source: BuildSpecError },

    #[snafu(display("failed to resolve registry credentials for {image_uri}: {source}"))]
    Credentials {
        image_uri: String,
        source: AuthError,
    },

    #[snafu(display("registry lookup for {image_uri} failed: {source}"))]
    Registry {
        image_uri: String,
        source: RegistryError,
    },

    #[snafu(display("failed to build {image_uri}: {source}"))]
    Build {
        image_uri: String,
        source: ToolchainError,
    },

    #[snafu(display("failed to push {image_uri}: {source}"))]
    Push {
        image_uri: String,
        source: ToolchainError,
    },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleErrorKind {
    /// Image reference or build specification could not be parsed.
    Parse,
    /// Credentials could not be obtained from their source.
    AuthResolution,
    /// The image does not exist in the registry.
    RegistryNotFound,
    /// The registry rejected the credentials.
    RegistryAuth,
    /// Any other registry protocol, transport or decoding failure.
    RegistryProtocol,
    Build,
    Push,
}

impl LifecycleError {
    pub fn kind(&self) -> LifecycleErrorKind {
        match self {
            LifecycleError::InvalidImageUri { .. } | LifecycleError::BuildSpec { .. } => {
                LifecycleErrorKind::Parse
            }
            LifecycleError::Credentials { .. } => LifecycleErrorKind::AuthResolution,
            LifecycleError::Registry { source, .. } => match source {
                RegistryError::NotFound(_) => LifecycleErrorKind::RegistryNotFound,
                RegistryError::Unauthorized(_) => LifecycleErrorKind::RegistryAuth,
                _ => LifecycleErrorKind::RegistryProtocol,
            },
            LifecycleError::Build { .. } => LifecycleErrorKind::Build,
            LifecycleError::Push { .. } => LifecycleErrorKind::Push,
        }
    }
}
