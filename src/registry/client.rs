// ABOUTME: Registry v2 HTTP client for reading image metadata and deleting manifests.
// ABOUTME: Resolves OCI indexes to an image manifest and reads labels from the config blob.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Response, StatusCode};
use std::collections::{BTreeMap, BTreeSet};

use super::error::RegistryError;
use super::manifest::{ConfigBlob, DOCKER_MANIFEST_V2, Manifest, OCI_INDEX, OCI_MANIFEST};
use crate::auth::Credential;
use crate::types::{ImageRef, Target};

const DOCKER_CONTENT_DIGEST: &str = "Docker-Content-Digest";

/// Metadata observed for an image in its registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    /// `Docker-Content-Digest` of the top-level manifest response, if sent.
    pub manifest_digest: Option<String>,
    /// Digest of the image configuration blob.
    pub config_digest: String,
    pub labels: BTreeMap<String, String>,
}

impl ImageInfo {
    /// Manifest digest when the registry reported one, else the config digest.
    pub fn digest(&self) -> &str {
        self.manifest_digest
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or(&self.config_digest)
    }
}

/// Read and delete operations against an image's registry.
#[async_trait]
pub trait ImageInspector: Send + Sync {
    async fn fetch_image_info(
        &self,
        image: &ImageRef,
        credential: Option<&Credential>,
    ) -> Result<ImageInfo, RegistryError>;

    async fn delete_image(
        &self,
        image: &ImageRef,
        credential: Option<&Credential>,
    ) -> Result<(), RegistryError>;
}

/// Minimal registry API v2 client over `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct RegistryClient {
    http: reqwest::Client,
    insecure_registries: BTreeSet<String>,
}

impl RegistryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hosts reached over plain HTTP in addition to loopback addresses.
    pub fn with_insecure_registries<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insecure_registries = hosts.into_iter().map(Into::into).collect();
        self
    }

    fn scheme(&self, host: &str) -> &'static str {
        if is_loopback(host) || self.insecure_registries.contains(host) {
            "http"
        } else {
            "https"
        }
    }

    fn manifest_url(&self, image: &ImageRef, reference: &str) -> String {
        let host = image.api_host();
        format!(
            "{}://{}/v2/{}/manifests/{}",
            self.scheme(host),
            host,
            image.repository(),
            reference
        )
    }

    fn blob_url(&self, image: &ImageRef, digest: &str) -> String {
        let host = image.api_host();
        format!(
            "{}://{}/v2/{}/blobs/{}",
            self.scheme(host),
            host,
            image.repository(),
            digest
        )
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        accept: &[&str],
        credential: Option<&Credential>,
    ) -> Result<Response, RegistryError> {
        let mut request = self.http.request(method.clone(), url);
        if !accept.is_empty() {
            request = request.header(ACCEPT, accept.join(", "));
        }
        if let Some(credential) = credential {
            request = request.header(AUTHORIZATION, credential.basic_auth_header());
        }

        tracing::debug!(
            %method,
            url,
            accept = ?accept,
            authorization = credential.map(|_| "<redacted>"),
            "registry request"
        );
        let response = request.send().await?;
        tracing::debug!(
            %method,
            url,
            status = response.status().as_u16(),
            digest = header(&response, DOCKER_CONTENT_DIGEST),
            "registry response"
        );
        Ok(response)
    }

    /// GET a manifest, mapping 404/401 and other failures. Returns the decoded
    /// body and the `Docker-Content-Digest` header.
    async fn get_manifest(
        &self,
        image: &ImageRef,
        reference: &str,
        accept: &[&str],
        credential: Option<&Credential>,
    ) -> Result<(Manifest, Option<String>, Option<String>), RegistryError> {
        let url = self.manifest_url(image, reference);
        let response = self.send(Method::GET, &url, accept, credential).await?;
        check_status(&response, image, "get manifest")?;

        let digest = header(&response, DOCKER_CONTENT_DIGEST).map(str::to_string);
        let content_type = header(&response, CONTENT_TYPE.as_str())
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_string());
        let body = response.bytes().await?;
        let manifest = serde_json::from_slice(&body).map_err(|source| RegistryError::Decode {
            what: "manifest",
            source,
        })?;
        Ok((manifest, digest, content_type))
    }
}

#[async_trait]
impl ImageInspector for RegistryClient {
    async fn fetch_image_info(
        &self,
        image: &ImageRef,
        credential: Option<&Credential>,
    ) -> Result<ImageInfo, RegistryError> {
        let target = image.target();
        tracing::debug!(image_uri = %image, target = target.as_str(), "fetching image info");

        let (mut manifest, manifest_digest, content_type) = self
            .get_manifest(
                image,
                target.as_str(),
                &[DOCKER_MANIFEST_V2, OCI_MANIFEST, OCI_INDEX],
                credential,
            )
            .await?;

        if manifest.is_index(content_type.as_deref()) {
            let selected = manifest
                .select_image_manifest()
                .ok_or(RegistryError::NoSuitableManifest)?
                .to_string();
            tracing::info!(digest = %selected, "selected manifest from image index");

            let (inner, _, _) = self
                .get_manifest(
                    image,
                    &selected,
                    &[DOCKER_MANIFEST_V2, OCI_MANIFEST],
                    credential,
                )
                .await?;
            manifest = inner;
        }

        let config_digest = manifest
            .config_digest()
            .ok_or_else(|| RegistryError::Decode {
                what: "manifest",
                source: <serde_json::Error as serde::de::Error>::missing_field("config"),
            })?
            .to_string();

        let url = self.blob_url(image, &config_digest);
        let response = self.send(Method::GET, &url, &[], credential).await?;
        check_status(&response, image, "get config")?;
        let body = response.bytes().await?;
        let blob: ConfigBlob =
            serde_json::from_slice(&body).map_err(|source| RegistryError::Decode {
                what: "config blob",
                source,
            })?;

        let info = ImageInfo {
            manifest_digest: manifest_digest.filter(|d| !d.is_empty()),
            config_digest,
            labels: blob.into_labels(),
        };
        tracing::debug!(
            image_uri = %image,
            manifest_digest = ?info.manifest_digest,
            config_digest = %info.config_digest,
            labels = info.labels.len(),
            "retrieved image info"
        );
        Ok(info)
    }

    async fn delete_image(
        &self,
        image: &ImageRef,
        credential: Option<&Credential>,
    ) -> Result<(), RegistryError> {
        let digest = match image.target() {
            Target::Digest(digest) => digest.to_string(),
            Target::Tag(tag) => self.resolve_tag_digest(image, tag, credential).await?,
        };

        let url = self.manifest_url(image, &digest);
        tracing::debug!(image_uri = %image, %digest, "deleting manifest");
        let response = self.send(Method::DELETE, &url, &[], credential).await?;

        match response.status() {
            StatusCode::OK | StatusCode::ACCEPTED => Ok(()),
            StatusCode::UNAUTHORIZED => Err(RegistryError::Unauthorized(image.registry().into())),
            status => Err(RegistryError::UnexpectedStatus {
                operation: "delete image",
                status: status.as_u16(),
            }),
        }
    }
}

impl RegistryClient {
    /// Digest a tag points at: the `Docker-Content-Digest` header first,
    /// then the config digest from the manifest body.
    async fn resolve_tag_digest(
        &self,
        image: &ImageRef,
        tag: &str,
        credential: Option<&Credential>,
    ) -> Result<String, RegistryError> {
        let url = self.manifest_url(image, tag);
        let response = self
            .send(Method::GET, &url, &[DOCKER_MANIFEST_V2], credential)
            .await?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED => {
                return Err(RegistryError::Unauthorized(image.registry().into()));
            }
            status => {
                return Err(RegistryError::UnexpectedStatus {
                    operation: "get manifest",
                    status: status.as_u16(),
                });
            }
        }

        if let Some(digest) = header(&response, DOCKER_CONTENT_DIGEST).filter(|d| !d.is_empty()) {
            return Ok(digest.to_string());
        }

        let body = response.bytes().await?;
        let manifest: Manifest =
            serde_json::from_slice(&body).map_err(|source| RegistryError::Decode {
                what: "manifest",
                source,
            })?;
        manifest
            .config_digest()
            .map(str::to_string)
            .ok_or_else(|| RegistryError::DigestUnresolved(tag.to_string()))
    }
}

fn check_status(
    response: &Response,
    image: &ImageRef,
    operation: &'static str,
) -> Result<(), RegistryError> {
    match response.status() {
        StatusCode::OK => Ok(()),
        StatusCode::NOT_FOUND => Err(RegistryError::NotFound(image.to_string())),
        StatusCode::UNAUTHORIZED => Err(RegistryError::Unauthorized(image.registry().into())),
        status => Err(RegistryError::UnexpectedStatus {
            operation,
            status: status.as_u16(),
        }),
    }
}

fn header<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

/// Loopback registries (`localhost`, `127.0.0.1`, `[::1]`, any port) speak plain HTTP.
pub fn is_loopback(host: &str) -> bool {
    let name = match host.rsplit_once(':') {
        Some((name, port)) if !port.ends_with(']') && port.chars().all(|c| c.is_ascii_digit()) => {
            name
        }
        _ => host,
    };
    matches!(name, "localhost" | "[::1]") || name.starts_with("127.")
}
