// ABOUTME: Integration tests for the image lifecycle verbs.
// ABOUTME: Uses a fake toolchain and registry inspector to check create/read/update/delete/import.

mod support;

use async_trait::async_trait;
use imagewright::auth::*;
use imagewright::diagnostics::WarningKind;
use imagewright::lifecycle::*;
use imagewright::registry::{ImageInfo, ImageInspector, RegistryError};
use imagewright::resource::ImageResource;
use imagewright::runtime::{BuildRequest, ImageToolchain, ToolchainError};
use imagewright::types::{ImageRef, ResourceId};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

const IMAGE_URI: &str = "registry.example.com/team/app:v1";
const DIGEST: &str = "sha256:1111111111111111111111111111111111111111111111111111111111111111";

// --- fakes ---

/// Clones share their recorded calls.
#[derive(Clone, Default)]
struct FakeToolchain {
    fail_build: bool,
    fail_push: bool,
    builds: Arc<Mutex<Vec<BuildRequest>>>,
    pushes: Arc<Mutex<Vec<(String, Option<Credential>)>>>,
}

#[async_trait]
impl ImageToolchain for FakeToolchain {
    async fn build_image(&self, request: &BuildRequest) -> Result<(), ToolchainError> {
        self.builds.lock().unwrap().push(request.clone());
        if self.fail_build {
            return Err(ToolchainError::Build("step 3/7 failed".into()));
        }
        Ok(())
    }

    async fn push_image(
        &self,
        image: &ImageRef,
        credential: Option<&Credential>,
    ) -> Result<(), ToolchainError> {
        self.pushes
            .lock()
            .unwrap()
            .push((image.to_string(), credential.cloned()));
        if self.fail_push {
            return Err(ToolchainError::Push {
                image: image.to_string(),
                message: "denied".into(),
            });
        }
        Ok(())
    }
}

/// What the fake registry reports for an image.
#[derive(Clone)]
enum Observed {
    Image {
        digest: Option<&'static str>,
        labels: &'static [(&'static str, &'static str)],
    },
    NotFound,
    Unauthorized,
    Status(u16),
}

impl Observed {
    fn present(labels: &'static [(&'static str, &'static str)]) -> Self {
        Observed::Image {
            digest: Some(DIGEST),
            labels,
        }
    }

    fn to_result(&self, image: &ImageRef) -> Result<ImageInfo, RegistryError> {
        match self {
            Observed::Image { digest, labels } => Ok(ImageInfo {
                manifest_digest: digest.map(str::to_string),
                config_digest: "sha256:config".into(),
                labels: labels
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            }),
            Observed::NotFound => Err(RegistryError::NotFound(image.to_string())),
            Observed::Unauthorized => Err(RegistryError::Unauthorized(image.registry().into())),
            Observed::Status(status) => Err(RegistryError::UnexpectedStatus {
                operation: "get manifest",
                status: *status,
            }),
        }
    }
}

#[derive(Clone)]
struct FakeInspector {
    observed: Observed,
    delete_fails: bool,
    fetches: Arc<Mutex<Vec<Option<Credential>>>>,
    deletes: Arc<Mutex<Vec<String>>>,
}

impl FakeInspector {
    fn new(observed: Observed) -> Self {
        Self {
            observed,
            delete_fails: false,
            fetches: Arc::default(),
            deletes: Arc::default(),
        }
    }
}

#[async_trait]
impl ImageInspector for FakeInspector {
    async fn fetch_image_info(
        &self,
        image: &ImageRef,
        credential: Option<&Credential>,
    ) -> Result<ImageInfo, RegistryError> {
        self.fetches.lock().unwrap().push(credential.cloned());
        self.observed.to_result(image)
    }

    async fn delete_image(
        &self,
        image: &ImageRef,
        _credential: Option<&Credential>,
    ) -> Result<(), RegistryError> {
        self.deletes.lock().unwrap().push(image.to_string());
        if self.delete_fails {
            return Err(RegistryError::UnexpectedStatus {
                operation: "delete image",
                status: 405,
            });
        }
        Ok(())
    }
}

/// Every external credential source fails.
struct Unavailable;

#[async_trait]
impl AwsSecretsManager for Unavailable {
    async fn secret_value(&self, _arn: &str) -> Result<SecretValue, CapabilityError> {
        Err(CapabilityError::Malformed("unavailable".into()))
    }
}

#[async_trait]
impl GoogleSecretManager for Unavailable {
    async fn access_secret(&self, _name: &str) -> Result<Vec<u8>, CapabilityError> {
        Err(CapabilityError::Malformed("unavailable".into()))
    }
}

#[async_trait]
impl EcrTokenSource for Unavailable {
    async fn authorization_token(
        &self,
        _profile: Option<&str>,
        _region: Option<&str>,
    ) -> Result<String, CapabilityError> {
        Err(CapabilityError::NoAuthorizationData)
    }
}

#[async_trait]
impl AccessTokenSource for Unavailable {
    async fn access_token(&self, _scope: &str) -> Result<String, CapabilityError> {
        Err(CapabilityError::Malformed("unavailable".into()))
    }
}

fn resolver() -> CredentialResolver {
    let unavailable = Arc::new(Unavailable);
    CredentialResolver::new(CredentialSources {
        aws_secrets: unavailable.clone(),
        google_secrets: unavailable.clone(),
        ecr_tokens: unavailable.clone(),
        access_tokens: unavailable,
    })
}

struct Harness {
    toolchain: FakeToolchain,
    inspector: FakeInspector,
}

impl Harness {
    fn new(toolchain: FakeToolchain, inspector: FakeInspector) -> Self {
        support::init_tracing();
        Self { toolchain, inspector }
    }

    fn with_image(observed: Observed) -> Self {
        Self::new(FakeToolchain::default(), FakeInspector::new(observed))
    }

    fn lifecycle(&self) -> ImageLifecycle<FakeToolchain, FakeInspector> {
        ImageLifecycle::new(self.toolchain.clone(), self.inspector.clone(), resolver())
            .with_env_lookup(|name| (name == "APP_DIR").then(|| "/src/app".to_string()))
    }

    fn inspect_only(&self) -> ImageLifecycle<(), FakeInspector> {
        ImageLifecycle::inspect_only(self.inspector.clone(), resolver())
    }

    fn build_count(&self) -> usize {
        self.toolchain.builds.lock().unwrap().len()
    }

    fn push_count(&self) -> usize {
        self.toolchain.pushes.lock().unwrap().len()
    }
}

fn desired(build: &str) -> ImageResource {
    ImageResource {
        image_uri: IMAGE_URI.into(),
        build: Some(build.into()),
        ..Default::default()
    }
}

fn literal_auth() -> AuthConfig {
    AuthConfig::UsernamePassword(UsernamePassword {
        username: Some("robot".into()),
        password: Some("s3cret".into()),
        ..Default::default()
    })
}

fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// --- create ---

mod create {
    use super::*;

    #[tokio::test]
    async fn builds_pushes_and_records_digest() {
        let harness = Harness::with_image(Observed::present(&[]));
        let mut record = desired(r#"{"context": "${APP_DIR}", "labels": {"tier": "web"}}"#);
        record.labels = Some(labels(&[("team", "core")]));

        let applied = harness.lifecycle().create(record).await.unwrap();

        let builds = harness.toolchain.builds.lock().unwrap();
        assert_eq!(builds.len(), 1);
        assert_eq!(builds[0].image.to_string(), IMAGE_URI);
        assert_eq!(builds[0].config.context, "/src/app");
        assert_eq!(
            builds[0].config.labels,
            labels(&[("team", "core"), ("tier", "web")])
        );

        let pushes = harness.toolchain.pushes.lock().unwrap();
        assert_eq!(*pushes, vec![(IMAGE_URI.to_string(), None)]);

        let resource = applied.resource;
        assert!(resource.id.is_some());
        assert_eq!(resource.sha256_digest.as_deref(), Some(DIGEST));
        assert_eq!(resource.labels, Some(labels(&[("team", "core")])));
        assert!(!applied.diagnostics.has_warnings());
    }

    #[tokio::test]
    async fn credential_is_used_for_push_and_digest_refresh() {
        let harness = Harness::with_image(Observed::present(&[]));
        let mut record = desired(r#"{"context": "."}"#);
        record.auth = Some(literal_auth());

        harness.lifecycle().create(record).await.unwrap();

        let expected = Some(Credential::new("robot", "s3cret"));
        assert_eq!(harness.toolchain.pushes.lock().unwrap()[0].1, expected);
        assert_eq!(*harness.inspector.fetches.lock().unwrap(), vec![expected]);
    }

    #[tokio::test]
    async fn digest_falls_back_to_config_digest() {
        let harness = Harness::with_image(Observed::Image {
            digest: None,
            labels: &[],
        });

        let applied = harness
            .lifecycle()
            .create(desired(r#"{"context": "."}"#))
            .await
            .unwrap();
        assert_eq!(
            applied.resource.sha256_digest.as_deref(),
            Some("sha256:config")
        );
    }

    #[tokio::test]
    async fn digest_refresh_failure_is_a_warning() {
        let harness = Harness::with_image(Observed::Status(503));

        let applied = harness
            .lifecycle()
            .create(desired(r#"{"context": "."}"#))
            .await
            .unwrap();

        assert!(applied.resource.id.is_some());
        assert_eq!(applied.resource.sha256_digest, None);
        let warnings = applied.diagnostics.warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::DigestRefresh);
    }

    #[tokio::test]
    async fn unsupported_build_options_are_warnings() {
        let harness = Harness::with_image(Observed::present(&[]));
        let applied = harness
            .lifecycle()
            .create(desired(
                r#"{
                    "context": ".",
                    "additional_contexts": {"shared": "../shared"},
                    "platforms": ["linux/amd64", "linux/arm64"]
                }"#,
            ))
            .await
            .unwrap();

        let kinds: Vec<_> = applied
            .diagnostics
            .warnings()
            .iter()
            .map(|w| w.kind)
            .collect();
        assert_eq!(
            kinds,
            [
                WarningKind::UnsupportedBuildOption,
                WarningKind::UnsupportedBuildOption
            ]
        );
        assert_eq!(harness.build_count(), 1);
    }

    #[tokio::test]
    async fn invalid_image_uri_fails_before_building() {
        let harness = Harness::with_image(Observed::present(&[]));
        let mut record = desired(r#"{"context": "."}"#);
        record.image_uri = "registry.example.com/team/app".into();

        let err = harness.lifecycle().create(record).await.unwrap_err();

        assert_eq!(err.kind(), LifecycleErrorKind::Parse);
        assert!(err.to_string().contains("must specify tag or digest"));
        assert_eq!(harness.build_count(), 0);
    }

    #[tokio::test]
    async fn missing_build_spec_is_a_parse_error() {
        let harness = Harness::with_image(Observed::present(&[]));
        let record = ImageResource {
            image_uri: IMAGE_URI.into(),
            ..Default::default()
        };

        let err = harness.lifecycle().create(record).await.unwrap_err();
        assert_eq!(err.kind(), LifecycleErrorKind::Parse);
        assert_eq!(harness.build_count(), 0);
    }

    #[tokio::test]
    async fn credential_failure_stops_before_building() {
        let harness = Harness::with_image(Observed::present(&[]));
        let mut record = desired(r#"{"context": "."}"#);
        record.auth = Some(AuthConfig::AwsEcr { profile: None });

        let err = harness.lifecycle().create(record).await.unwrap_err();

        assert_eq!(err.kind(), LifecycleErrorKind::AuthResolution);
        assert_eq!(harness.build_count(), 0);
        assert_eq!(harness.push_count(), 0);
    }

    #[tokio::test]
    async fn build_failure_skips_push() {
        let harness = Harness::new(
            FakeToolchain {
                fail_build: true,
                ..Default::default()
            },
            FakeInspector::new(Observed::present(&[])),
        );

        let err = harness
            .lifecycle()
            .create(desired(r#"{"context": "."}"#))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), LifecycleErrorKind::Build);
        assert!(err.to_string().contains("step 3/7 failed"));
        assert_eq!(harness.push_count(), 0);
    }

    #[tokio::test]
    async fn push_failure_is_reported() {
        let harness = Harness::new(
            FakeToolchain {
                fail_push: true,
                ..Default::default()
            },
            FakeInspector::new(Observed::present(&[])),
        );

        let err = harness
            .lifecycle()
            .create(desired(r#"{"context": "."}"#))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), LifecycleErrorKind::Push);
        assert!(harness.inspector.fetches.lock().unwrap().is_empty());
    }
}

// --- update ---

mod update {
    use super::*;

    #[tokio::test]
    async fn keeps_prior_id_and_rebuilds() {
        let harness = Harness::with_image(Observed::present(&[]));
        let prior = ImageResource {
            id: Some(ResourceId::new("existing-id")),
            sha256_digest: Some("sha256:old".into()),
            ..desired(r#"{"context": "."}"#)
        };
        let plan = desired(r#"{"context": ".", "args": {"VERSION": "2"}}"#);

        let applied = harness.lifecycle().update(plan, &prior).await.unwrap();

        assert_eq!(applied.resource.id, Some(ResourceId::new("existing-id")));
        assert_eq!(applied.resource.sha256_digest.as_deref(), Some(DIGEST));
        assert_eq!(harness.build_count(), 1);
        assert_eq!(harness.push_count(), 1);
    }

    #[tokio::test]
    async fn falls_back_to_plan_id() {
        let harness = Harness::with_image(Observed::present(&[]));
        let plan = ImageResource {
            id: Some(ResourceId::new("plan-id")),
            ..desired(r#"{"context": "."}"#)
        };

        let applied = harness
            .lifecycle()
            .update(plan, &ImageResource::default())
            .await
            .unwrap();
        assert_eq!(applied.resource.id, Some(ResourceId::new("plan-id")));
    }

    #[tokio::test]
    async fn mints_id_when_none_known() {
        let harness = Harness::with_image(Observed::present(&[]));
        let applied = harness
            .lifecycle()
            .update(desired(r#"{"context": "."}"#), &ImageResource::default())
            .await
            .unwrap();
        assert!(applied.resource.id.is_some());
    }
}

// --- read ---

mod read {
    use super::*;

    fn state() -> ImageResource {
        ImageResource {
            id: Some(ResourceId::new("id-1")),
            image_uri: IMAGE_URI.into(),
            labels: Some(labels(&[("team", "core")])),
            sha256_digest: Some("sha256:stale".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn refreshes_digest_and_labels() {
        let harness = Harness::with_image(Observed::present(&[("team", "platform")]));

        let outcome = harness.inspect_only().read(state()).await.unwrap();

        let ReadOutcome::Present(refreshed) = outcome else {
            panic!("expected image to be present");
        };
        assert_eq!(refreshed.sha256_digest.as_deref(), Some(DIGEST));
        assert_eq!(refreshed.labels, Some(labels(&[("team", "platform")])));
        assert_eq!(refreshed.id, Some(ResourceId::new("id-1")));
    }

    #[tokio::test]
    async fn empty_registry_labels_keep_state_labels() {
        let harness = Harness::with_image(Observed::present(&[]));

        let ReadOutcome::Present(refreshed) = harness.inspect_only().read(state()).await.unwrap()
        else {
            panic!("expected image to be present");
        };
        assert_eq!(refreshed.labels, Some(labels(&[("team", "core")])));
    }

    #[tokio::test]
    async fn unobservable_image_is_gone() {
        for observed in [
            Observed::NotFound,
            Observed::Unauthorized,
            Observed::Status(500),
        ] {
            let harness = Harness::with_image(observed);
            let outcome = harness.inspect_only().read(state()).await.unwrap();
            assert!(matches!(outcome, ReadOutcome::Gone));
        }
    }

    #[tokio::test]
    async fn credential_failure_means_gone() {
        let harness = Harness::with_image(Observed::present(&[]));
        let mut state = state();
        state.auth = Some(AuthConfig::GoogleArtifactRegistry {});

        let outcome = harness.inspect_only().read(state).await.unwrap();
        assert!(matches!(outcome, ReadOutcome::Gone));
        assert!(harness.inspector.fetches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unparseable_image_uri_is_gone() {
        let harness = Harness::with_image(Observed::present(&[]));
        let mut state = state();
        state.image_uri = "Not A Reference".into();

        let outcome = harness.inspect_only().read(state).await.unwrap();
        assert!(matches!(outcome, ReadOutcome::Gone));
        assert!(harness.inspector.fetches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn read_after_create_matches_what_was_pushed() {
        let harness = Harness::with_image(Observed::present(&[("team", "core")]));
        let mut record = desired(r#"{"context": "."}"#);
        record.labels = Some(labels(&[("team", "core")]));
        record.auth = Some(literal_auth());

        let created = harness.lifecycle().create(record).await.unwrap().resource;
        let outcome = harness.lifecycle().read(created.clone()).await.unwrap();

        let ReadOutcome::Present(refreshed) = outcome else {
            panic!("expected the image to be present, got {:?}", outcome);
        };
        assert_eq!(refreshed, created);
        assert_eq!(refreshed.sha256_digest.as_deref(), Some(DIGEST));
        assert_eq!(refreshed.labels, Some(labels(&[("team", "core")])));
        assert_eq!(harness.inspector.fetches.lock().unwrap().len(), 2);
    }
}

// --- delete ---

mod delete {
    use super::*;

    fn state(delete_image: bool) -> ImageResource {
        ImageResource {
            id: Some(ResourceId::new("id-1")),
            image_uri: IMAGE_URI.into(),
            delete_image,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn leaves_registry_alone_by_default() {
        let harness = Harness::with_image(Observed::present(&[]));

        let outcome = harness.inspect_only().delete(&state(false)).await;

        assert!(!outcome.diagnostics.has_warnings());
        assert!(harness.inspector.deletes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn removes_image_when_requested() {
        let harness = Harness::with_image(Observed::present(&[]));

        let outcome = harness.inspect_only().delete(&state(true)).await;

        assert!(!outcome.diagnostics.has_warnings());
        assert_eq!(
            *harness.inspector.deletes.lock().unwrap(),
            vec![IMAGE_URI.to_string()]
        );
    }

    #[tokio::test]
    async fn registry_failure_becomes_warning() {
        let harness = Harness::new(
            FakeToolchain::default(),
            FakeInspector {
                delete_fails: true,
                ..FakeInspector::new(Observed::present(&[]))
            },
        );

        let outcome = harness.inspect_only().delete(&state(true)).await;

        let warnings = outcome.diagnostics.warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::RegistryDelete);
        assert!(warnings[0].message.contains(IMAGE_URI));
    }

    #[tokio::test]
    async fn credential_failure_becomes_warning() {
        let harness = Harness::with_image(Observed::present(&[]));
        let mut state = state(true);
        state.auth = Some(AuthConfig::AwsEcr { profile: None });

        let outcome = harness.inspect_only().delete(&state).await;

        assert_eq!(outcome.diagnostics.warnings().len(), 1);
        assert!(harness.inspector.deletes.lock().unwrap().is_empty());
    }
}

// --- import ---

mod import {
    use super::*;

    #[tokio::test]
    async fn produces_skeleton_state() {
        let harness = Harness::with_image(Observed::present(&[]));

        let resource = harness.inspect_only().import(IMAGE_URI).unwrap();

        assert!(resource.id.is_some());
        assert_eq!(resource.image_uri, IMAGE_URI);
        assert!(!resource.delete_image);
        assert!(resource.build.is_none());
        assert!(resource.auth.is_none());
        assert!(resource.sha256_digest.is_none());
        assert!(harness.inspector.fetches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn every_import_gets_a_fresh_id() {
        let harness = Harness::with_image(Observed::present(&[]));
        let lifecycle = harness.inspect_only();

        let first = lifecycle.import(IMAGE_URI).unwrap();
        let second = lifecycle.import(IMAGE_URI).unwrap();
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn rejects_invalid_reference() {
        let harness = Harness::with_image(Observed::present(&[]));

        let err = harness.inspect_only().import("ghcr.io/org/app").unwrap_err();
        assert_eq!(err.kind(), LifecycleErrorKind::Parse);
    }
}
