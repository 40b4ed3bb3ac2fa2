// ABOUTME: Image reference parsing with Docker Hub normalization and canonical rendering.
// ABOUTME: Splits registry/repository[:tag][@digest] into registry host, path and target.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Registry host used when a reference names no registry.
pub const DEFAULT_REGISTRY: &str = "docker.io";

/// Host that actually serves the registry API for `docker.io`.
const DOCKER_HUB_API_HOST: &str = "registry-1.docker.io";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseImageRefError {
    #[error("invalid image URI format: reference cannot be empty")]
    Empty,

    #[error("invalid image URI format: invalid character {0:?}")]
    InvalidChar(char),

    #[error("invalid image URI format: {0}")]
    InvalidFormat(String),

    #[error("invalid reference: must specify tag or digest")]
    MissingTagOrDigest,
}

/// What a manifest request addresses: a mutable tag or an immutable digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target<'a> {
    Tag(&'a str),
    Digest(&'a str),
}

impl Target<'_> {
    pub fn as_str(&self) -> &str {
        match self {
            Target::Tag(t) => t,
            Target::Digest(d) => d,
        }
    }
}

/// A fully normalized image reference.
///
/// Normalization follows the Docker rules: the first path component is a
/// registry host only if it contains a `.` or `:` or is `localhost`, and
/// single-component Docker Hub names live under `library/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    registry: String,
    repository: String,
    tag: Option<String>,
    digest: Option<String>,
}

impl ImageRef {
    pub fn parse(input: &str) -> Result<Self, ParseImageRefError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseImageRefError::Empty);
        }

        for c in input.chars() {
            if !c.is_ascii_alphanumeric()
                && c != '/'
                && c != ':'
                && c != '.'
                && c != '-'
                && c != '_'
                && c != '@'
                && c != '['
                && c != ']'
            {
                return Err(ParseImageRefError::InvalidChar(c));
            }
        }

        // Split off digest if present
        let (without_digest, digest) = match input.split_once('@') {
            Some((before, after)) => {
                validate_digest(after)?;
                (before, Some(after.to_string()))
            }
            None => (input, None),
        };

        // A colon followed by a slash belongs to a registry port, not a tag
        let (without_tag, tag) = match without_digest.rsplit_once(':') {
            Some((before, after)) if !after.contains('/') && !after.ends_with(']') => {
                validate_tag(after)?;
                (before, Some(after.to_string()))
            }
            _ => (without_digest, None),
        };

        let (registry, repository) = Self::parse_registry_and_name(without_tag)?;

        if tag.is_none() && digest.is_none() {
            return Err(ParseImageRefError::MissingTagOrDigest);
        }

        Ok(Self {
            registry,
            repository,
            tag,
            digest,
        })
    }

    fn parse_registry_and_name(input: &str) -> Result<(String, String), ParseImageRefError> {
        let (registry, name) = match input.split_once('/') {
            Some((first, rest))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                validate_host(first)?;
                (first.to_string(), rest.to_string())
            }
            _ => (DEFAULT_REGISTRY.to_string(), input.to_string()),
        };

        let registry = if registry == "index.docker.io" {
            DEFAULT_REGISTRY.to_string()
        } else {
            registry
        };

        validate_repository(&name)?;

        let repository = if registry == DEFAULT_REGISTRY && !name.contains('/') {
            format!("library/{}", name)
        } else {
            name
        };

        Ok((registry, repository))
    }

    /// Registry host as written in the reference (e.g. `ghcr.io`, `localhost:5000`).
    pub fn registry(&self) -> &str {
        &self.registry
    }

    /// Host serving the registry HTTP API.
    pub fn api_host(&self) -> &str {
        if self.registry == DEFAULT_REGISTRY {
            DOCKER_HUB_API_HOST
        } else {
            &self.registry
        }
    }

    /// Repository path within the registry (e.g. `library/nginx`).
    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// The manifest lookup target. A tag wins when both are present.
    pub fn target(&self) -> Target<'_> {
        match (&self.tag, &self.digest) {
            (Some(tag), _) => Target::Tag(tag),
            (None, Some(digest)) => Target::Digest(digest),
            // parse() rejects references without either
            (None, None) => unreachable!("image reference without tag or digest"),
        }
    }
}

impl FromStr for ImageRef {
    type Err = ParseImageRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.registry, self.repository)?;
        if let Some(ref tag) = self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(ref digest) = self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

fn validate_host(host: &str) -> Result<(), ParseImageRefError> {
    let (name, port) = match host.rsplit_once(':') {
        Some((name, port)) if !port.ends_with(']') => (name, Some(port)),
        _ => (host, None),
    };

    if name.is_empty() {
        return Err(ParseImageRefError::InvalidFormat(format!(
            "empty registry host in {:?}",
            host
        )));
    }

    if let Some(port) = port
        && port.parse::<u16>().is_err()
    {
        return Err(ParseImageRefError::InvalidFormat(format!(
            "invalid registry port {:?}",
            port
        )));
    }

    Ok(())
}

fn validate_repository(name: &str) -> Result<(), ParseImageRefError> {
    if name.is_empty() {
        return Err(ParseImageRefError::InvalidFormat(
            "repository path cannot be empty".to_string(),
        ));
    }

    for component in name.split('/') {
        let valid = !component.is_empty()
            && component
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "._-".contains(c))
            && component
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphanumeric())
            && component
                .chars()
                .last()
                .is_some_and(|c| c.is_ascii_alphanumeric());

        if !valid {
            return Err(ParseImageRefError::InvalidFormat(format!(
                "invalid repository path component {:?}",
                component
            )));
        }
    }

    Ok(())
}

fn validate_tag(tag: &str) -> Result<(), ParseImageRefError> {
    let valid = !tag.is_empty()
        && tag.len() <= 128
        && tag
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_.-".contains(c));

    if valid {
        Ok(())
    } else {
        Err(ParseImageRefError::InvalidFormat(format!(
            "invalid tag {:?}",
            tag
        )))
    }
}

fn validate_digest(digest: &str) -> Result<(), ParseImageRefError> {
    let invalid = || ParseImageRefError::InvalidFormat(format!("invalid digest {:?}", digest));

    let (algorithm, hex) = digest.split_once(':').ok_or_else(invalid)?;

    let algorithm_ok = !algorithm.is_empty()
        && algorithm
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "+._-".contains(c));
    let hex_ok = hex.len() >= 32 && hex.chars().all(|c| c.is_ascii_hexdigit());

    if algorithm_ok && hex_ok {
        Ok(())
    } else {
        Err(invalid())
    }
}
