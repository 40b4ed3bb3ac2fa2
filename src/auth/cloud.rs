// ABOUTME: Shipped credential capabilities backed by the aws/gcloud CLIs and Google REST API.
// ABOUTME: Each backend shells out or calls HTTP and maps failures to CapabilityError.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;

use super::error::CapabilityError;
use super::resolver::{
    AccessTokenSource, AwsSecretsManager, CLOUD_PLATFORM_SCOPE, CredentialSources,
    EcrTokenSource, GoogleSecretManager, SecretValue,
};

pub const DEFAULT_AWS_CLI: &str = "aws";
pub const DEFAULT_GCLOUD_CLI: &str = "gcloud";
pub const SECRET_MANAGER_ENDPOINT: &str = "https://secretmanager.googleapis.com";

/// Run a CLI and return its stdout, turning spawn failures and non-zero
/// exits into capability errors.
async fn run_cli(program: &Path, args: &[&str]) -> Result<Vec<u8>, CapabilityError> {
    let name = program.display().to_string();
    tracing::debug!(program = %name, ?args, "running credential helper");

    let output = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| CapabilityError::Spawn {
            program: name.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(CapabilityError::Command {
            program: name,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output.stdout)
}

/// Region segment of an ARN (`arn:<partition>:<service>:<region>:...`).
fn arn_region(arn: &str) -> Option<&str> {
    arn.split(':').nth(3).filter(|r| !r.is_empty())
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SecretValueOutput {
    secret_string: Option<String>,
    secret_binary: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EcrTokenOutput {
    #[serde(default)]
    authorization_data: Vec<EcrAuthorizationData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EcrAuthorizationData {
    authorization_token: Option<String>,
}

pub(crate) fn parse_secret_value_output(stdout: &[u8]) -> Result<SecretValue, CapabilityError> {
    let output: SecretValueOutput = serde_json::from_slice(stdout)
        .map_err(|e| CapabilityError::Malformed(format!("get-secret-value output: {}", e)))?;
    match (output.secret_string, output.secret_binary) {
        (Some(text), _) => Ok(SecretValue::Text(text)),
        (None, Some(binary)) => Ok(SecretValue::Binary(binary.into_bytes())),
        (None, None) => Err(CapabilityError::Malformed(
            "secret has neither SecretString nor SecretBinary".to_string(),
        )),
    }
}

pub(crate) fn parse_ecr_token_output(stdout: &[u8]) -> Result<String, CapabilityError> {
    let output: EcrTokenOutput = serde_json::from_slice(stdout).map_err(|e| {
        CapabilityError::Malformed(format!("get-authorization-token output: {}", e))
    })?;
    output
        .authorization_data
        .into_iter()
        .next()
        .and_then(|data| data.authorization_token)
        .ok_or(CapabilityError::NoAuthorizationData)
}

/// AWS Secrets Manager through `aws secretsmanager get-secret-value`.
#[derive(Debug, Clone)]
pub struct CliAwsSecretsManager {
    program: PathBuf,
}

impl CliAwsSecretsManager {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl AwsSecretsManager for CliAwsSecretsManager {
    async fn secret_value(&self, arn: &str) -> Result<SecretValue, CapabilityError> {
        let mut args = vec![
            "secretsmanager",
            "get-secret-value",
            "--secret-id",
            arn,
            "--output",
            "json",
        ];
        if let Some(region) = arn_region(arn) {
            args.extend(["--region", region]);
        }
        let stdout = run_cli(&self.program, &args).await?;
        parse_secret_value_output(&stdout)
    }
}

/// ECR authorization tokens through `aws ecr get-authorization-token`.
#[derive(Debug, Clone)]
pub struct CliEcrTokenSource {
    program: PathBuf,
}

impl CliEcrTokenSource {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl EcrTokenSource for CliEcrTokenSource {
    async fn authorization_token(
        &self,
        profile: Option<&str>,
        region: Option<&str>,
    ) -> Result<String, CapabilityError> {
        let mut args = vec!["ecr", "get-authorization-token", "--output", "json"];
        if let Some(profile) = profile {
            args.extend(["--profile", profile]);
        }
        if let Some(region) = region {
            args.extend(["--region", region]);
        }
        let stdout = run_cli(&self.program, &args).await?;
        parse_ecr_token_output(&stdout)
    }
}

/// Application default credentials through `gcloud`.
#[derive(Debug, Clone)]
pub struct GcloudAccessTokenSource {
    program: PathBuf,
}

impl GcloudAccessTokenSource {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl AccessTokenSource for GcloudAccessTokenSource {
    async fn access_token(&self, scope: &str) -> Result<String, CapabilityError> {
        // print-access-token always yields a cloud-platform token
        if scope != CLOUD_PLATFORM_SCOPE {
            return Err(CapabilityError::UnsupportedScope(scope.to_string()));
        }
        let stdout = run_cli(
            &self.program,
            &["auth", "application-default", "print-access-token"],
        )
        .await?;
        let token = String::from_utf8_lossy(&stdout).trim().to_string();
        if token.is_empty() {
            return Err(CapabilityError::Malformed(
                "empty access token from gcloud".to_string(),
            ));
        }
        Ok(token)
    }
}

#[derive(Deserialize)]
struct AccessSecretResponse {
    payload: Option<SecretPayload>,
}

#[derive(Deserialize)]
struct SecretPayload {
    data: Option<String>,
}

/// Google Secret Manager over its REST API, authenticated with a bearer
/// token from an access-token source.
#[derive(Clone)]
pub struct RestGoogleSecretManager {
    http: reqwest::Client,
    endpoint: String,
    tokens: Arc<dyn AccessTokenSource>,
}

impl RestGoogleSecretManager {
    pub fn new(tokens: Arc<dyn AccessTokenSource>) -> Self {
        Self::with_endpoint(tokens, SECRET_MANAGER_ENDPOINT)
    }

    pub fn with_endpoint(tokens: Arc<dyn AccessTokenSource>, endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }
}

#[async_trait]
impl GoogleSecretManager for RestGoogleSecretManager {
    async fn access_secret(&self, name: &str) -> Result<Vec<u8>, CapabilityError> {
        let token = self.tokens.access_token(CLOUD_PLATFORM_SCOPE).await?;
        let url = format!("{}/v1/{}:access", self.endpoint, name.trim_start_matches('/'));
        tracing::debug!(%url, "accessing secret version");

        let response = self.http.get(&url).bearer_auth(token).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CapabilityError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: AccessSecretResponse = response.json().await?;
        let data = body
            .payload
            .and_then(|p| p.data)
            .ok_or_else(|| CapabilityError::Malformed("secret version has no payload".into()))?;
        BASE64
            .decode(data)
            .map_err(|e| CapabilityError::Malformed(format!("secret payload: {}", e)))
    }
}

impl CredentialSources {
    /// The shipped backends, driving the given `aws` and `gcloud` binaries.
    pub fn from_cli(aws_cli: impl Into<PathBuf>, gcloud_cli: impl Into<PathBuf>) -> Self {
        let aws_cli = aws_cli.into();
        let access_tokens: Arc<dyn AccessTokenSource> =
            Arc::new(GcloudAccessTokenSource::new(gcloud_cli));
        Self {
            aws_secrets: Arc::new(CliAwsSecretsManager::new(aws_cli.clone())),
            google_secrets: Arc::new(RestGoogleSecretManager::new(access_tokens.clone())),
            ecr_tokens: Arc::new(CliEcrTokenSource::new(aws_cli)),
            access_tokens,
        }
    }
}
