// ABOUTME: Capability traits for secret stores and token sources, and the resolver over them.
// ABOUTME: One exhaustive match turns an auth block into a registry credential.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::sync::Arc;

use super::config::{AuthConfig, PasswordSource};
use super::credential::Credential;
use super::error::{AuthError, CapabilityError};
use crate::types::ImageRef;

/// OAuth scope requested for Artifact Registry access tokens.
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Secret material as returned by AWS Secrets Manager.
#[derive(Clone, PartialEq, Eq)]
pub enum SecretValue {
    Text(String),
    /// Base64 text of a binary secret, as the store hands it out.
    Binary(Vec<u8>),
}

#[async_trait]
pub trait AwsSecretsManager: Send + Sync {
    async fn secret_value(&self, arn: &str) -> Result<SecretValue, CapabilityError>;
}

#[async_trait]
pub trait GoogleSecretManager: Send + Sync {
    /// Payload bytes of a secret version (`projects/*/secrets/*/versions/*`).
    async fn access_secret(&self, name: &str) -> Result<Vec<u8>, CapabilityError>;
}

#[async_trait]
pub trait EcrTokenSource: Send + Sync {
    /// Base64 `user:password` authorization token for ECR.
    async fn authorization_token(
        &self,
        profile: Option<&str>,
        region: Option<&str>,
    ) -> Result<String, CapabilityError>;
}

#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self, scope: &str) -> Result<String, CapabilityError>;
}

/// The external credential capabilities a resolver draws on.
#[derive(Clone)]
pub struct CredentialSources {
    pub aws_secrets: Arc<dyn AwsSecretsManager>,
    pub google_secrets: Arc<dyn GoogleSecretManager>,
    pub ecr_tokens: Arc<dyn EcrTokenSource>,
    pub access_tokens: Arc<dyn AccessTokenSource>,
}

/// Resolves declared auth settings into a credential. Nothing is cached;
/// every call goes back to the source.
#[derive(Clone)]
pub struct CredentialResolver {
    sources: CredentialSources,
}

impl CredentialResolver {
    pub fn new(sources: CredentialSources) -> Self {
        Self { sources }
    }

    /// Resolve credentials for `image`. `None` auth means anonymous access.
    pub async fn resolve(
        &self,
        auth: Option<&AuthConfig>,
        image: &ImageRef,
    ) -> Result<Option<Credential>, AuthError> {
        let Some(auth) = auth else {
            return Ok(None);
        };

        let credential = match auth {
            AuthConfig::UsernamePassword(up) => match up.source() {
                Some(PasswordSource::Literal { username, password }) => {
                    Credential::new(username, password)
                }
                Some(PasswordSource::AwsSecretsManager(arn)) => self.from_aws_secret(arn).await?,
                Some(PasswordSource::GoogleSecretManager(name)) => {
                    self.from_google_secret(name).await?
                }
                None => return Err(AuthError::Insufficient),
            },
            AuthConfig::AwsEcr { profile } => {
                self.from_ecr(profile.as_deref(), ecr_region(image.registry()))
                    .await?
            }
            AuthConfig::GoogleArtifactRegistry {} => {
                let token = self
                    .sources
                    .access_tokens
                    .access_token(CLOUD_PLATFORM_SCOPE)
                    .await
                    .map_err(AuthError::AccessToken)?;
                Credential::oauth2_access_token(token.trim())
            }
        };

        tracing::debug!(
            registry = image.registry(),
            username = credential.username(),
            "resolved registry credential"
        );
        Ok(Some(credential))
    }

    async fn from_aws_secret(&self, arn: &str) -> Result<Credential, AuthError> {
        let value = self
            .sources
            .aws_secrets
            .secret_value(arn)
            .await
            .map_err(|source| AuthError::AwsSecret {
                arn: arn.to_string(),
                source,
            })?;

        let payload = match value {
            SecretValue::Text(text) => text,
            SecretValue::Binary(encoded) => {
                let raw = BASE64
                    .decode(encoded.trim_ascii())
                    .map_err(|source| AuthError::Base64 {
                        what: "binary secret",
                        source,
                    })?;
                String::from_utf8(raw).map_err(|_| AuthError::Utf8 {
                    what: "binary secret",
                })?
            }
        };
        Credential::parse(&payload)
    }

    async fn from_google_secret(&self, name: &str) -> Result<Credential, AuthError> {
        let payload = self
            .sources
            .google_secrets
            .access_secret(name)
            .await
            .map_err(|source| AuthError::GoogleSecret {
                name: name.to_string(),
                source,
            })?;
        let payload = String::from_utf8(payload).map_err(|_| AuthError::Utf8 {
            what: "secret payload",
        })?;
        Credential::parse(&payload)
    }

    async fn from_ecr(
        &self,
        profile: Option<&str>,
        region: Option<&str>,
    ) -> Result<Credential, AuthError> {
        let token = self
            .sources
            .ecr_tokens
            .authorization_token(profile, region)
            .await
            .map_err(AuthError::EcrToken)?;
        let decoded = BASE64
            .decode(token.trim())
            .map_err(|source| AuthError::Base64 {
                what: "ECR authorization token",
                source,
            })?;
        let decoded = String::from_utf8(decoded).map_err(|_| AuthError::Utf8 {
            what: "ECR authorization token",
        })?;
        Credential::parse(&decoded)
    }
}

/// Region of an ECR registry host (`<account>.dkr.ecr.<region>.amazonaws.com`).
pub fn ecr_region(host: &str) -> Option<&str> {
    let host = host.split(':').next().unwrap_or(host);
    let (_, rest) = host.split_once(".dkr.ecr.")?;
    let region = rest.split('.').next()?;
    (!region.is_empty()).then_some(region)
}
