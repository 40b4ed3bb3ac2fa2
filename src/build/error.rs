// ABOUTME: Error types for build specification parsing and context packing.
// ABOUTME: Distinguishes malformed input from interpolation and I/O failures.

use std::path::PathBuf;
use thiserror::Error;

use super::interpolate::InterpolationError;

#[derive(Debug, Error)]
pub enum BuildSpecError {
    #[error("build specification is empty")]
    Empty,

    #[error("invalid JSON in build specification: {0}")]
    InvalidJson(String),

    #[error("failed to interpolate variables in build specification at {path}: {source}")]
    Interpolation {
        path: String,
        #[source]
        source: InterpolationError,
    },

    #[error("failed to decode build specification: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("build context not specified in build configuration")]
    MissingContext,
}

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("build context {0} is not a directory")]
    NotADirectory(PathBuf),

    #[error("failed to prepare build context {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
