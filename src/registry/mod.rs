// ABOUTME: Registry inspection over the distribution v2 HTTP API.
// ABOUTME: Fetches manifest digest and labels for drift detection, and deletes manifests.

mod client;
mod error;
mod manifest;

pub use client::{ImageInfo, ImageInspector, RegistryClient, is_loopback};
pub use error::RegistryError;
pub use manifest::{
    ATTESTATION_MANIFEST, DOCKER_MANIFEST_LIST, DOCKER_MANIFEST_V2, OCI_INDEX, OCI_MANIFEST,
    REFERENCE_TYPE_ANNOTATION,
};
