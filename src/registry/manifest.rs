// ABOUTME: Wire types for registry manifests, image indexes and config blobs.
// ABOUTME: Only the fields needed to find the config digest and labels are decoded.

use serde::Deserialize;
use std::collections::BTreeMap;

pub const DOCKER_MANIFEST_V2: &str = "application/vnd.docker.distribution.manifest.v2+json";
pub const DOCKER_MANIFEST_LIST: &str = "application/vnd.docker.distribution.manifest.list.v2+json";
pub const OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
pub const OCI_INDEX: &str = "application/vnd.oci.image.index.v1+json";

/// Annotation marking provenance/SBOM entries inside an index.
pub const REFERENCE_TYPE_ANNOTATION: &str = "vnd.docker.reference.type";
pub const ATTESTATION_MANIFEST: &str = "attestation-manifest";

/// A manifest or an index; which one is decided by `media_type` or by the
/// presence of `manifests`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub config: Option<Descriptor>,
    #[serde(default)]
    pub manifests: Vec<IndexEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub digest: String,
}

#[derive(Debug, Deserialize)]
pub struct IndexEntry {
    #[serde(default)]
    pub digest: String,
    #[serde(default)]
    pub annotations: Option<BTreeMap<String, String>>,
}

impl IndexEntry {
    fn is_attestation(&self) -> bool {
        self.annotations
            .as_ref()
            .and_then(|a| a.get(REFERENCE_TYPE_ANNOTATION))
            .is_some_and(|t| t == ATTESTATION_MANIFEST)
    }
}

impl Manifest {
    pub fn is_index(&self, content_type: Option<&str>) -> bool {
        let media_type = self.media_type.as_deref().or(content_type);
        match media_type {
            Some(OCI_INDEX) | Some(DOCKER_MANIFEST_LIST) => true,
            Some(_) => false,
            None => !self.manifests.is_empty() && self.config.is_none(),
        }
    }

    /// First index entry that is not an attestation.
    pub fn select_image_manifest(&self) -> Option<&str> {
        self.manifests
            .iter()
            .find(|entry| !entry.is_attestation())
            .map(|entry| entry.digest.as_str())
            .filter(|digest| !digest.is_empty())
    }

    pub fn config_digest(&self) -> Option<&str> {
        self.config
            .as_ref()
            .map(|c| c.digest.as_str())
            .filter(|d| !d.is_empty())
    }
}

/// Image configuration blob; labels live under `config.Labels`.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigBlob {
    #[serde(default)]
    pub config: Option<ContainerConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ContainerConfig {
    #[serde(rename = "Labels", default)]
    pub labels: Option<BTreeMap<String, String>>,
}

impl ConfigBlob {
    pub fn into_labels(self) -> BTreeMap<String, String> {
        self.config.and_then(|c| c.labels).unwrap_or_default()
    }
}
