// ABOUTME: Opaque resource identifier assigned at create or import.
// ABOUTME: Serializes as a bare string and is never derived from the image URI.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a managed image resource.
///
/// The value is a random UUID minted once; rebuilding or retagging the image
/// never changes it.
#[must_use = "IDs reference resources and should not be ignored"]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Fresh random ID (UUID v4).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
