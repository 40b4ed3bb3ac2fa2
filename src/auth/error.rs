// ABOUTME: Error types for credential resolution.
// ABOUTME: Names the source that failed so a broken secret never reads as anonymous access.

use thiserror::Error;

/// Failure reported by a credential capability (secret store, token source).
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Command {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("no authorization data received from ECR")]
    NoAuthorizationData,

    #[error("unsupported scope: {0}")]
    UnsupportedScope(String),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(
        "invalid credentials format: expected JSON with username/password or string with format 'username:password'"
    )]
    InvalidFormat,

    #[error("insufficient authentication information provided")]
    Insufficient,

    #[error("failed to read AWS Secrets Manager secret {arn}: {source}")]
    AwsSecret {
        arn: String,
        #[source]
        source: CapabilityError,
    },

    #[error("failed to access Google Secret Manager secret {name}: {source}")]
    GoogleSecret {
        name: String,
        #[source]
        source: CapabilityError,
    },

    #[error("failed to get ECR authorization token: {0}")]
    EcrToken(#[source] CapabilityError),

    #[error("failed to get Google access token: {0}")]
    AccessToken(#[source] CapabilityError),

    #[error("failed to decode {what}: {source}")]
    Base64 {
        what: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    #[error("{what} is not valid UTF-8")]
    Utf8 { what: &'static str },
}
