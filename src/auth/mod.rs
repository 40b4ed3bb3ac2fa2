// ABOUTME: Registry credential resolution.
// ABOUTME: Declarative auth settings, capability traits for secret stores, and CLI/REST backends.

pub mod cloud;
mod config;
mod credential;
mod error;
mod resolver;

pub use config::{AuthConfig, PasswordSource, UsernamePassword};
pub use credential::{Credential, OAUTH2_ACCESS_TOKEN_USER};
pub use error::{AuthError, CapabilityError};
pub use resolver::{
    AccessTokenSource, AwsSecretsManager, CLOUD_PLATFORM_SCOPE, CredentialResolver,
    CredentialSources, EcrTokenSource, GoogleSecretManager, SecretValue, ecr_region,
};
