// ABOUTME: Parses a compose-style JSON build specification into a normalized BuildConfig.
// ABOUTME: Interpolates variables, resolves value-less args, and accepts list or map forms.

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use super::args::resolve_build_args;
use super::error::BuildSpecError;
use super::interpolate::{Lookup, interpolate_value};

pub const DEFAULT_DOCKERFILE: &str = "Dockerfile";

/// Normalized build input handed to the image toolchain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildConfig {
    pub context: String,
    pub dockerfile: String,
    /// `None` values are args the environment could not supply; the daemon
    /// falls back to the Dockerfile's `ARG` default for those.
    pub args: BTreeMap<String, Option<String>>,
    pub additional_contexts: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    pub tags: Vec<String>,
    pub target: Option<String>,
    pub network: Option<String>,
    pub no_cache: bool,
    pub pull: bool,
    pub platforms: Vec<String>,
    pub extra_hosts: Vec<String>,
    pub shm_size: Option<u64>,
}

/// Raw decoded form of the build specification. Keys this tool does not act
/// on (`cache_from`, `secrets`, `ssh`, ...) are accepted and ignored.
#[derive(Debug, Default, Deserialize)]
pub struct BuildSpec {
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    dockerfile: Option<String>,
    #[serde(default, deserialize_with = "mapping_with_optional_values")]
    args: BTreeMap<String, Option<String>>,
    #[serde(default, deserialize_with = "mapping")]
    additional_contexts: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "mapping")]
    labels: BTreeMap<String, String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    network: Option<String>,
    #[serde(default, deserialize_with = "flexible_bool")]
    no_cache: bool,
    #[serde(default, deserialize_with = "flexible_bool")]
    pull: bool,
    #[serde(default)]
    platforms: Vec<String>,
    #[serde(default, deserialize_with = "host_list")]
    extra_hosts: Vec<String>,
    #[serde(default, deserialize_with = "byte_size")]
    shm_size: Option<u64>,
}

impl BuildSpec {
    /// Parse `json`, expanding variables through `lookup`. `extra_labels`
    /// are merged over the spec's own labels.
    pub fn parse(
        json: &str,
        extra_labels: &BTreeMap<String, String>,
        lookup: Lookup<'_>,
    ) -> Result<BuildConfig, BuildSpecError> {
        if json.trim().is_empty() {
            return Err(BuildSpecError::Empty);
        }

        let raw: Value =
            serde_json::from_str(json).map_err(|e| BuildSpecError::InvalidJson(e.to_string()))?;
        if !raw.is_object() {
            return Err(BuildSpecError::InvalidJson(
                "expected a JSON object".to_string(),
            ));
        }

        let mut interpolated = interpolate_value(raw, lookup)
            .map_err(|(path, source)| BuildSpecError::Interpolation { path, source })?;

        if let Some(map) = interpolated.as_object_mut()
            && let Some(args) = map.remove("args")
        {
            map.insert("args".to_string(), resolve_build_args(args, lookup));
        }

        let spec: BuildSpec =
            serde_json::from_value(interpolated).map_err(BuildSpecError::Decode)?;
        spec.normalize(extra_labels)
    }

    fn normalize(
        self,
        extra_labels: &BTreeMap<String, String>,
    ) -> Result<BuildConfig, BuildSpecError> {
        let context = self
            .context
            .filter(|c| !c.trim().is_empty())
            .ok_or(BuildSpecError::MissingContext)?;

        let mut labels = self.labels;
        labels.extend(extra_labels.iter().map(|(k, v)| (k.clone(), v.clone())));

        Ok(BuildConfig {
            context,
            dockerfile: self
                .dockerfile
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| DEFAULT_DOCKERFILE.to_string()),
            args: self.args,
            additional_contexts: self.additional_contexts,
            labels,
            tags: self.tags,
            target: self.target.filter(|t| !t.is_empty()),
            network: self.network.filter(|n| !n.is_empty()),
            no_cache: self.no_cache,
            pull: self.pull,
            platforms: self.platforms,
            extra_hosts: self.extra_hosts,
            shm_size: self.shm_size,
        })
    }
}

/// Scalar to string the way compose does for mapping values.
fn scalar_to_string<E: de::Error>(value: Value) -> Result<Option<String>, E> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(E::custom(format!("expected a scalar value, got {}", other))),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListOrMap {
    List(Vec<String>),
    Map(BTreeMap<String, Value>),
}

/// `["K=V", "K"]` or `{"K": "V", "K": null}`; a missing value stays `None`.
fn mapping_with_optional_values<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<String, Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<ListOrMap>::deserialize(deserializer)? {
        None => Ok(BTreeMap::new()),
        Some(ListOrMap::List(items)) => Ok(items
            .into_iter()
            .map(|item| match item.split_once('=') {
                Some((k, v)) => (k.to_string(), Some(v.to_string())),
                None => (item, None),
            })
            .collect()),
        Some(ListOrMap::Map(map)) => map
            .into_iter()
            .map(|(k, v)| Ok((k, scalar_to_string::<D::Error>(v)?)))
            .collect(),
    }
}

/// Like `mapping_with_optional_values` but a missing value is an empty string.
fn mapping<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(mapping_with_optional_values(deserializer)?
        .into_iter()
        .map(|(k, v)| (k, v.unwrap_or_default()))
        .collect())
}

/// `["host:ip"]`, `["host=ip"]` or `{"host": "ip"}`, normalized to `host:ip`.
fn host_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<ListOrMap>::deserialize(deserializer)? {
        None => Ok(Vec::new()),
        Some(ListOrMap::List(items)) => Ok(items
            .into_iter()
            .map(|item| match item.split_once('=') {
                Some((host, ip)) => format!("{}:{}", host, ip),
                None => item,
            })
            .collect()),
        Some(ListOrMap::Map(map)) => map
            .into_iter()
            .map(|(host, ip)| {
                let ip = scalar_to_string::<D::Error>(ip)?.unwrap_or_default();
                Ok(format!("{}:{}", host, ip))
            })
            .collect(),
    }
}

/// Booleans may arrive as strings after interpolation.
fn flexible_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" | "" => Ok(false),
            other => Err(de::Error::custom(format!("invalid boolean {:?}", other))),
        },
        other => Err(de::Error::custom(format!("invalid boolean {}", other))),
    }
}

/// Byte counts as integers or strings with a unit (`"2gb"`, `"512m"`).
fn byte_size<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid size {}", n))),
        Value::String(s) => parse_byte_size(&s)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid size {:?}", s))),
        other => Err(de::Error::custom(format!("invalid size {}", other))),
    }
}

pub(crate) fn parse_byte_size(input: &str) -> Option<u64> {
    let input = input.trim().to_ascii_lowercase();
    let split = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let (digits, unit) = input.split_at(split);
    let number: u64 = digits.parse().ok()?;
    let multiplier: u64 = match unit.trim() {
        "" | "b" => 1,
        "k" | "kb" => 1 << 10,
        "m" | "mb" => 1 << 20,
        "g" | "gb" => 1 << 30,
        _ => return None,
    };
    number.checked_mul(multiplier)
}
