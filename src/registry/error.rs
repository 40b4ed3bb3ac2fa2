// ABOUTME: Error types for registry inspection and deletion.
// ABOUTME: Separates not-found and auth failures from protocol and transport problems.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("image not found: {0}")]
    NotFound(String),

    #[error("authentication failed for registry: {0}")]
    Unauthorized(String),

    #[error("failed to {operation}, status: {status}")]
    UnexpectedStatus { operation: &'static str, status: u16 },

    #[error("no suitable manifest found in OCI Image Index")]
    NoSuitableManifest,

    #[error("could not determine digest for tag {0}")]
    DigestUnresolved(String),

    #[error("registry request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl RegistryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound(_))
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, RegistryError::Unauthorized(_))
    }
}
