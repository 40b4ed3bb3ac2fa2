// ABOUTME: Resolved registry credential and its wire renderings.
// ABOUTME: Basic auth header for registry HTTP calls, encoded auth blob for the image toolchain.

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD as BASE64, URL_SAFE as BASE64_URL};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::AuthError;

/// Username expected by Google Artifact Registry alongside an OAuth access token.
pub const OAUTH2_ACCESS_TOKEN_USER: &str = "oauth2accesstoken";

/// A username/password pair ready to present to a registry.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    username: String,
    password: String,
}

#[derive(Serialize, Deserialize)]
struct CredentialJson {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Credential for an OAuth access token (Artifact Registry style).
    pub fn oauth2_access_token(token: impl Into<String>) -> Self {
        Self::new(OAUTH2_ACCESS_TOKEN_USER, token)
    }

    /// Parse a secret payload: a JSON `{"username": .., "password": ..}`
    /// object, or else `username:password` split on the first colon. A JSON
    /// object missing either field is rejected, never colon-split.
    pub fn parse(payload: &str) -> Result<Self, AuthError> {
        if let Ok(json) = serde_json::from_str::<CredentialJson>(payload) {
            if json.username.is_empty() || json.password.is_empty() {
                return Err(AuthError::InvalidFormat);
            }
            return Ok(Self::new(json.username, json.password));
        }

        match payload.split_once(':') {
            Some((username, password)) if !username.is_empty() && !password.is_empty() => {
                Ok(Self::new(username, password))
            }
            _ => Err(AuthError::InvalidFormat),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// `Authorization` header value for registry API requests.
    pub fn basic_auth_header(&self) -> String {
        let pair = format!("{}:{}", self.username, self.password);
        format!("Basic {}", BASE64.encode(pair.as_bytes()))
    }

    /// Base64url-encoded JSON auth config, the encoding the Docker Engine
    /// expects in `X-Registry-Auth`.
    pub fn registry_auth(&self) -> String {
        let json = serde_json::json!({
            "username": self.username,
            "password": self.password,
        });
        BASE64_URL.encode(json.to_string().as_bytes())
    }

    /// Credentials in the shape the bollard client sends with a push.
    pub fn docker_credentials(&self, server: &str) -> bollard::auth::DockerCredentials {
        bollard::auth::DockerCredentials {
            username: Some(self.username.clone()),
            password: Some(self.password.clone()),
            serveraddress: Some(server.to_string()),
            ..Default::default()
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
