// ABOUTME: The image lifecycle state machine driven by the reconciliation engine.
// ABOUTME: Builds and pushes on create/update, detects drift on read, cleans up on delete.

use snafu::ResultExt;
use std::sync::Arc;

use super::error::{
    BuildSnafu, BuildSpecSnafu, CredentialsSnafu, InvalidImageUriSnafu, LifecycleError, PushSnafu,
    RegistrySnafu,
};
use crate::auth::{Credential, CredentialResolver};
use crate::build::BuildSpec;
use crate::diagnostics::{Diagnostics, Warning};
use crate::registry::{ImageInfo, ImageInspector};
use crate::resource::ImageResource;
use crate::runtime::{BuildRequest, ImageToolchain};
use crate::types::{ImageRef, ResourceId};

/// Variable lookup used for build spec interpolation.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Result of a create or update: the new state plus non-fatal warnings.
#[derive(Debug)]
pub struct Applied {
    pub resource: ImageResource,
    pub diagnostics: Diagnostics,
}

#[derive(Debug)]
pub enum ReadOutcome {
    /// Image still exists; state refreshed from the registry.
    Present(ImageResource),
    /// Image can no longer be observed; the engine should drop the resource.
    Gone,
}

#[derive(Debug, Default)]
pub struct DeleteOutcome {
    pub diagnostics: Diagnostics,
}

/// Lifecycle verbs over an image toolchain `T` and a registry inspector `I`.
///
/// Read, delete and import never touch the toolchain, so an inspect-only
/// lifecycle can be built without a container runtime.
pub struct ImageLifecycle<T, I> {
    toolchain: T,
    inspector: I,
    credentials: CredentialResolver,
    lookup: EnvLookup,
}

impl<I: ImageInspector> ImageLifecycle<(), I> {
    /// A lifecycle for read, delete and import only.
    pub fn inspect_only(inspector: I, credentials: CredentialResolver) -> Self {
        ImageLifecycle::new((), inspector, credentials)
    }
}

impl<T, I: ImageInspector> ImageLifecycle<T, I> {
    pub fn new(toolchain: T, inspector: I, credentials: CredentialResolver) -> Self {
        Self {
            toolchain,
            inspector,
            credentials,
            lookup: Arc::new(|name| std::env::var(name).ok()),
        }
    }

    /// Replace the process-environment lookup used for interpolation.
    pub fn with_env_lookup(
        mut self,
        lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.lookup = Arc::new(lookup);
        self
    }

    /// Refresh state from the registry. Any failure to observe the image,
    /// whether missing, unauthorized, unparseable or otherwise, means it is gone.
    pub async fn read(&self, mut state: ImageResource) -> Result<ReadOutcome, LifecycleError> {
        let info = match self.observe(&state).await {
            Ok(info) => info,
            Err(err) => {
                tracing::warn!(
                    image_uri = %state.image_uri,
                    kind = ?err.kind(),
                    error = %err,
                    "image not observable in registry, removing from state"
                );
                return Ok(ReadOutcome::Gone);
            }
        };

        if !info.labels.is_empty() {
            state.labels = Some(info.labels.clone());
        }
        state.sha256_digest = Some(info.digest().to_string());
        tracing::debug!(
            image_uri = %state.image_uri,
            digest = info.digest(),
            "state refreshed from registry"
        );
        Ok(ReadOutcome::Present(state))
    }

    /// Drop the resource, removing the registry image when `delete_image` is
    /// set. Remote failures become warnings; delete itself never fails.
    pub async fn delete(&self, state: &ImageResource) -> DeleteOutcome {
        let mut outcome = DeleteOutcome::default();
        if !state.delete_image {
            tracing::debug!(image_uri = %state.image_uri, "leaving image in registry");
            return outcome;
        }

        let result: Result<(), LifecycleError> = async {
            let image = parse_image(&state.image_uri)?;
            let credential = self.resolve_credential(state, &image).await?;
            self.inspector
                .delete_image(&image, credential.as_ref())
                .await
                .context(RegistrySnafu {
                    image_uri: &state.image_uri,
                })
        }
        .await;

        match result {
            Ok(()) => tracing::info!(image_uri = %state.image_uri, "deleted image from registry"),
            Err(err) => outcome.diagnostics.warn(Warning::registry_delete(format!(
                "failed to delete image {} from registry: {}",
                state.image_uri, err
            ))),
        }
        outcome
    }

    /// Skeleton state for an existing image. Only `image_uri` is known.
    pub fn import(&self, raw_id: &str) -> Result<ImageResource, LifecycleError> {
        parse_image(raw_id)?;
        let resource = ImageResource {
            id: Some(ResourceId::generate()),
            image_uri: raw_id.to_string(),
            delete_image: false,
            ..Default::default()
        };
        tracing::info!(image_uri = raw_id, "imported image");
        Ok(resource)
    }

    async fn resolve_credential(
        &self,
        resource: &ImageResource,
        image: &ImageRef,
    ) -> Result<Option<Credential>, LifecycleError> {
        self.credentials
            .resolve(resource.auth.as_ref(), image)
            .await
            .context(CredentialsSnafu {
                image_uri: &resource.image_uri,
            })
    }

    async fn observe(&self, resource: &ImageResource) -> Result<ImageInfo, LifecycleError> {
        let image = parse_image(&resource.image_uri)?;
        let credential = self.resolve_credential(resource, &image).await?;
        self.inspector
            .fetch_image_info(&image, credential.as_ref())
            .await
            .context(RegistrySnafu {
                image_uri: &resource.image_uri,
            })
    }
}

impl<T: ImageToolchain, I: ImageInspector> ImageLifecycle<T, I> {
    /// Build and push a new image and assign the resource its id.
    pub async fn create(&self, desired: ImageResource) -> Result<Applied, LifecycleError> {
        self.apply(desired, ResourceId::generate()).await
    }

    /// Rebuild and push. The id carries over from the prior state, then the
    /// plan; a fresh one is minted only if neither has one.
    pub async fn update(
        &self,
        plan: ImageResource,
        prior: &ImageResource,
    ) -> Result<Applied, LifecycleError> {
        let id = prior
            .id
            .clone()
            .or_else(|| plan.id.clone())
            .unwrap_or_else(ResourceId::generate);
        self.apply(plan, id).await
    }

    async fn apply(
        &self,
        mut desired: ImageResource,
        id: ResourceId,
    ) -> Result<Applied, LifecycleError> {
        let mut diagnostics = Diagnostics::default();
        let image = parse_image(&desired.image_uri)?;

        let config = BuildSpec::parse(
            desired.build.as_deref().unwrap_or_default(),
            &desired.declared_labels(),
            &*self.lookup,
        )
        .context(BuildSpecSnafu)?;

        if !config.additional_contexts.is_empty() {
            diagnostics.warn(Warning::unsupported_build_option(format!(
                "additional build contexts are ignored: {}",
                config
                    .additional_contexts
                    .keys()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }
        if config.platforms.len() > 1 {
            diagnostics.warn(Warning::unsupported_build_option(format!(
                "only the first of {} platforms is built",
                config.platforms.len()
            )));
        }

        let credential = self.resolve_credential(&desired, &image).await?;

        self.toolchain
            .build_image(&BuildRequest::new(image.clone(), config))
            .await
            .context(BuildSnafu {
                image_uri: &desired.image_uri,
            })?;

        self.toolchain
            .push_image(&image, credential.as_ref())
            .await
            .context(PushSnafu {
                image_uri: &desired.image_uri,
            })?;

        desired.sha256_digest = match self
            .inspector
            .fetch_image_info(&image, credential.as_ref())
            .await
        {
            Ok(info) => Some(info.digest().to_string()),
            Err(err) => {
                diagnostics.warn(Warning::digest_refresh(format!(
                    "image {} was pushed but its digest could not be read: {}",
                    desired.image_uri, err
                )));
                None
            }
        };
        desired.id = Some(id);

        tracing::info!(
            image_uri = %desired.image_uri,
            digest = desired.sha256_digest.as_deref(),
            "image applied"
        );
        Ok(Applied {
            resource: desired,
            diagnostics,
        })
    }
}

fn parse_image(image_uri: &str) -> Result<ImageRef, LifecycleError> {
    ImageRef::parse(image_uri).context(InvalidImageUriSnafu { image_uri })
}
