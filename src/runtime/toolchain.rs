// ABOUTME: Image toolchain capability: build an image and push it to its registry.
// ABOUTME: The lifecycle drives builds through this trait; bollard provides the real one.

use async_trait::async_trait;

use crate::auth::Credential;
use crate::build::{BuildConfig, ContextError};
use crate::types::ImageRef;

/// Everything needed to build one image.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Reference the built image is tagged with and later pushed as.
    pub image: ImageRef,
    pub config: BuildConfig,
}

impl BuildRequest {
    pub fn new(image: ImageRef, config: BuildConfig) -> Self {
        Self { image, config }
    }

    /// The image reference first, then the configured extra tags, without duplicates.
    pub fn tags(&self) -> Vec<String> {
        let mut tags = vec![push_name(&self.image)];
        for tag in &self.config.tags {
            if !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }
        tags
    }
}

/// `registry/repository:tag` (or `@digest` when untagged) as the daemon names it.
pub fn push_name(image: &ImageRef) -> String {
    let repository = format!("{}/{}", image.registry(), image.repository());
    match (image.tag(), image.digest()) {
        (Some(tag), _) => format!("{}:{}", repository, tag),
        (None, Some(digest)) => format!("{}@{}", repository, digest),
        (None, None) => repository,
    }
}

/// Errors from building or pushing images.
#[derive(Debug, thiserror::Error)]
pub enum ToolchainError {
    #[error("failed to prepare build context: {0}")]
    Context(#[from] ContextError),

    #[error("build error: {0}")]
    Build(String),

    #[error("invalid build option: {0}")]
    InvalidOption(String),

    #[error("failed to push image {image}: {message}")]
    Push { image: String, message: String },

    #[error("cannot push {0}: a tag is required")]
    UntaggedPush(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}

#[async_trait]
pub trait ImageToolchain: Send + Sync {
    /// Build and tag an image from a normalized build configuration.
    async fn build_image(&self, request: &BuildRequest) -> Result<(), ToolchainError>;

    /// Push a previously built image, authenticating with `credential` when given.
    async fn push_image(
        &self,
        image: &ImageRef,
        credential: Option<&Credential>,
    ) -> Result<(), ToolchainError>;
}
