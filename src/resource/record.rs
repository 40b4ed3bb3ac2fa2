// ABOUTME: The image resource record exchanged with the reconciliation engine.
// ABOUTME: Desired attributes plus the computed id and digest.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::auth::AuthConfig;
use crate::types::ResourceId;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageResource {
    /// Assigned once at create or import; never derived from `image_uri`.
    #[serde(default)]
    pub id: Option<ResourceId>,

    pub image_uri: String,

    /// JSON build specification.
    #[serde(default)]
    pub build: Option<String>,

    #[serde(default)]
    pub labels: Option<BTreeMap<String, String>>,

    /// Opaque values whose change makes the engine replace the resource.
    #[serde(default)]
    pub triggers: Option<BTreeMap<String, String>>,

    /// Remove the image from its registry when the resource is deleted.
    #[serde(default)]
    pub delete_image: bool,

    #[serde(default)]
    pub auth: Option<AuthConfig>,

    /// Manifest digest as last observed in the registry.
    #[serde(default)]
    pub sha256_digest: Option<String>,
}

impl ImageResource {
    /// Declared labels, empty when unset.
    pub fn declared_labels(&self) -> BTreeMap<String, String> {
        self.labels.clone().unwrap_or_default()
    }
}
