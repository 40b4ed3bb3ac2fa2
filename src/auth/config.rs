// ABOUTME: Declarative registry authentication settings as a tagged union.
// ABOUTME: One variant per auth method; username/password has its own source precedence.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Registry authentication method declared on a resource.
///
/// Serialized with explicit variant tags, e.g. `{"aws_ecr": {"profile": "ci"}}`
/// or `{"google_artifact_registry": {}}`. A resource without an `auth` block
/// pulls and pushes anonymously.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum AuthConfig {
    /// Amazon ECR authorization token, optionally from a named AWS profile.
    AwsEcr {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        profile: Option<String>,
    },
    /// Google Artifact Registry via application default credentials.
    GoogleArtifactRegistry {},
    /// Username and password, given literally or stored in a secret manager.
    UsernamePassword(UsernamePassword),
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UsernamePassword {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// ARN of an AWS Secrets Manager secret holding the credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_secrets_manager: Option<String>,
    /// Resource name of a Google Secret Manager secret version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_secret_manager: Option<String>,
}

/// Where a username/password pair comes from, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordSource<'a> {
    Literal { username: &'a str, password: &'a str },
    AwsSecretsManager(&'a str),
    GoogleSecretManager(&'a str),
}

impl UsernamePassword {
    /// Pick the source to resolve. A complete literal pair wins over secret
    /// references; empty strings count as unset.
    pub fn source(&self) -> Option<PasswordSource<'_>> {
        if let (Some(username), Some(password)) =
            (non_empty(&self.username), non_empty(&self.password))
        {
            return Some(PasswordSource::Literal { username, password });
        }
        if let Some(arn) = non_empty(&self.aws_secrets_manager) {
            return Some(PasswordSource::AwsSecretsManager(arn));
        }
        non_empty(&self.google_secret_manager).map(PasswordSource::GoogleSecretManager)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

impl fmt::Debug for UsernamePassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsernamePassword")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("aws_secrets_manager", &self.aws_secrets_manager)
            .field("google_secret_manager", &self.google_secret_manager)
            .finish()
    }
}
