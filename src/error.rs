// ABOUTME: Application-wide error types for imagewright.
// ABOUTME: Uses thiserror for ergonomic error handling.

use std::path::PathBuf;
use thiserror::Error;

use crate::lifecycle::LifecycleError;
use crate::runtime::RuntimeError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid input record: {0}")]
    InvalidInput(#[source] serde_json::Error),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("operation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
