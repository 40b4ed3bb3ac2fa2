// ABOUTME: Optional settings file for imagewright (imagewright.yml).
// ABOUTME: Runtime selection, daemon timeout, insecure registries and cloud CLI paths.

use crate::error::{Error, Result};
use crate::runtime::{RuntimeConfig, RuntimeType};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "imagewright.yml";
pub const CONFIG_FILENAME_ALT: &str = "imagewright.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".imagewright/config.yml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Explicit runtime (`docker` or `podman`); auto-detected when unset.
    #[serde(default)]
    pub runtime: Option<RuntimeType>,

    /// Explicit API socket path.
    #[serde(default)]
    pub socket: Option<String>,

    #[serde(default = "default_docker_timeout", with = "humantime_serde")]
    pub docker_timeout: Duration,

    /// Registry hosts reached over plain HTTP.
    #[serde(default)]
    pub insecure_registries: Vec<String>,

    #[serde(default = "default_aws_cli")]
    pub aws_cli: PathBuf,

    #[serde(default = "default_gcloud_cli")]
    pub gcloud_cli: PathBuf,
}

fn default_docker_timeout() -> Duration {
    crate::runtime::DEFAULT_TIMEOUT
}

fn default_aws_cli() -> PathBuf {
    PathBuf::from(crate::auth::cloud::DEFAULT_AWS_CLI)
}

fn default_gcloud_cli() -> PathBuf {
    PathBuf::from(crate::auth::cloud::DEFAULT_GCLOUD_CLI)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            runtime: None,
            socket: None,
            docker_timeout: default_docker_timeout(),
            insecure_registries: Vec::new(),
            aws_cli: default_aws_cli(),
            gcloud_cli: default_gcloud_cli(),
        }
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load the first settings file found in `dir`.
    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading configuration");
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Like `discover`, but a missing file means defaults.
    pub fn discover_or_default(dir: &Path) -> Result<Self> {
        match Self::discover(dir) {
            Err(Error::ConfigNotFound(_)) => Ok(Self::default()),
            other => other,
        }
    }

    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            runtime: self.runtime,
            socket: self.socket.clone(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.docker_timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "docker_timeout must be greater than zero".to_string(),
            ));
        }
        if let Some(host) = self.insecure_registries.iter().find(|h| h.trim().is_empty()) {
            return Err(Error::InvalidConfig(format!(
                "insecure_registries contains an empty host: {:?}",
                host
            )));
        }
        if self.socket.as_deref().is_some_and(|s| s.trim().is_empty()) {
            return Err(Error::InvalidConfig("socket cannot be empty".to_string()));
        }
        Ok(())
    }
}
