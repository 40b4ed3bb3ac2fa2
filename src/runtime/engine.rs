// ABOUTME: Bollard-based image toolchain for Docker and Podman.
// ABOUTME: Streams the build context to the daemon's build API and pushes through it.

use async_trait::async_trait;
use bollard::Docker;
use bollard::models::PushImageInfo;
use bollard::query_parameters::{BuildImageOptions, PushImageOptions};
use futures::StreamExt;
use snafu::ResultExt;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::io::ReaderStream;

use super::error::{ConnectionSnafu, RuntimeError};
use super::toolchain::{BuildRequest, ImageToolchain, ToolchainError, push_name};
use super::types::{RuntimeInfo, RuntimeType};
use crate::auth::Credential;
use crate::build::{ContextArchive, ContextError};
use crate::types::ImageRef;

/// Default daemon request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

fn map_build_error(e: bollard::errors::Error) -> ToolchainError {
    match e {
        bollard::errors::Error::DockerStreamError { error } => ToolchainError::Build(error),
        bollard::errors::Error::DockerResponseServerError { message, .. } => {
            ToolchainError::Build(message)
        }
        other => ToolchainError::Runtime(other.to_string()),
    }
}

fn map_push_error(e: bollard::errors::Error, image: &str) -> ToolchainError {
    let message = match e {
        bollard::errors::Error::DockerStreamError { error } => error,
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } => format!("{} (status {})", message, status_code),
        other => other.to_string(),
    };
    ToolchainError::Push {
        image: image.to_string(),
        message,
    }
}

/// Image toolchain talking to a local Docker-compatible API socket.
pub struct BollardToolchain {
    client: Docker,
    runtime_type: RuntimeType,
}

impl BollardToolchain {
    pub fn new(client: Docker, runtime_type: RuntimeType) -> Self {
        Self {
            client,
            runtime_type,
        }
    }

    /// Connect to a runtime found by `detect_runtime()`.
    pub fn connect(info: &RuntimeInfo, timeout: Duration) -> Result<Self, RuntimeError> {
        let client = Docker::connect_with_unix(
            &info.socket_path,
            timeout.as_secs(),
            bollard::API_DEFAULT_VERSION,
        )
        .context(ConnectionSnafu {
            socket_path: info.socket_path.clone(),
        })?;
        tracing::debug!(
            runtime = %info.runtime_type,
            socket = %info.socket_path,
            "connected to container runtime"
        );
        Ok(Self::new(client, info.runtime_type))
    }
}

fn build_options(request: &BuildRequest, tag: String) -> Result<BuildImageOptions, ToolchainError> {
    let config = &request.config;
    let shmsize = config
        .shm_size
        .map(|size| {
            i32::try_from(size).map_err(|_| {
                ToolchainError::InvalidOption(format!(
                    "shm_size of {} bytes exceeds the {} byte limit of the build API",
                    size,
                    i32::MAX
                ))
            })
        })
        .transpose()?;

    let buildargs: HashMap<String, String> = config
        .args
        .iter()
        .filter_map(|(key, value)| match value {
            Some(value) => Some((key.clone(), value.clone())),
            None => {
                tracing::debug!(arg = %key, "build arg has no value, using the Dockerfile default");
                None
            }
        })
        .collect();
    let labels: HashMap<String, String> = config
        .labels
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    Ok(BuildImageOptions {
        dockerfile: config.dockerfile.clone(),
        t: Some(tag),
        buildargs: Some(buildargs),
        labels: Some(labels),
        rm: true,
        forcerm: true,
        // Always refresh base images, like `--pull`
        pull: Some("1".to_string()),
        nocache: config.no_cache,
        target: config.target.clone().unwrap_or_default(),
        platform: config.platforms.first().cloned().unwrap_or_default(),
        networkmode: config.network.clone(),
        extrahosts: (!config.extra_hosts.is_empty()).then(|| config.extra_hosts.join(",")),
        shmsize,
        ..Default::default()
    })
}

#[async_trait]
impl ImageToolchain for BollardToolchain {
    async fn build_image(&self, request: &BuildRequest) -> Result<(), ToolchainError> {
        let config = &request.config;
        let tags = request.tags();
        tracing::info!(image_uri = %request.image, runtime = %self.runtime_type, "building image");
        tracing::debug!(
            context = %config.context,
            dockerfile = %config.dockerfile,
            "build context"
        );

        let context_dir = PathBuf::from(&config.context);
        let primary = tags[0].clone();
        let options = build_options(request, primary.clone())?;

        // The archive must outlive the build stream; dropping it removes the file.
        let (archive, file) = tokio::task::spawn_blocking(move || {
            let archive = ContextArchive::pack(&context_dir)?;
            let file = archive.reader()?;
            Ok::<_, ContextError>((archive, file))
        })
        .await
        .map_err(|e| ToolchainError::Runtime(format!("context packing task failed: {}", e)))??;

        let body = bollard::body_try_stream(ReaderStream::new(tokio::fs::File::from_std(file)));
        let mut stream = self.client.build_image(options, None, Some(body));

        while let Some(result) = stream.next().await {
            let output = result.map_err(map_build_error)?;
            if let Some(line) = output.stream.as_deref().map(str::trim_end)
                && !line.is_empty()
            {
                tracing::debug!(target: "imagewright::build", "{}", line);
            }
            if let Some(detail) = output.error_detail {
                let message = detail
                    .message
                    .unwrap_or_else(|| "unknown build failure".to_string());
                return Err(ToolchainError::Build(message));
            }
        }
        drop(archive);

        for extra in &tags[1..] {
            let (repo, tag) = split_tag(extra);
            let options = bollard::query_parameters::TagImageOptions {
                repo: Some(repo.to_string()),
                tag: tag.map(str::to_string),
            };
            self.client
                .tag_image(&primary, Some(options))
                .await
                .map_err(|e| ToolchainError::Runtime(format!("failed to tag {}: {}", extra, e)))?;
        }

        tracing::info!(image_uri = %request.image, "image built");
        Ok(())
    }

    async fn push_image(
        &self,
        image: &ImageRef,
        credential: Option<&Credential>,
    ) -> Result<(), ToolchainError> {
        let name = push_name(image);
        let tag = image
            .tag()
            .ok_or_else(|| ToolchainError::UntaggedPush(name.clone()))?;
        let repository = format!("{}/{}", image.registry(), image.repository());

        tracing::info!(image_uri = %image, authenticated = credential.is_some(), "pushing image");

        let options = PushImageOptions {
            tag: Some(tag.to_string()),
            ..Default::default()
        };
        let credentials = credential.map(|c| c.docker_credentials(image.registry()));
        let mut stream = self
            .client
            .push_image(&repository, Some(options), credentials);

        while let Some(result) = stream.next().await {
            let info = result.map_err(|e| map_push_error(e, &name))?;
            // Registry-side failures arrive as an error entry in the progress stream
            if let Some(message) = push_failure(info) {
                return Err(ToolchainError::Push {
                    image: name,
                    message,
                });
            }
        }

        tracing::info!(image_uri = %image, "image pushed");
        Ok(())
    }
}

fn push_failure(info: PushImageInfo) -> Option<String> {
    info.error_detail
        .and_then(|detail| detail.message)
        .filter(|message| !message.is_empty())
}

/// Split `repo:tag`, ignoring a colon that belongs to a registry port.
fn split_tag(reference: &str) -> (&str, Option<&str>) {
    match reference.rsplit_once(':') {
        Some((repo, tag)) if !tag.contains('/') => (repo, Some(tag)),
        _ => (reference, None),
    }
}
