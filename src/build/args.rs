// ABOUTME: Fills in build args that name a variable but carry no value.
// ABOUTME: Handles both the list (["KEY", "K=V"]) and map ({"KEY": null}) forms.

use serde_json::Value;

use super::interpolate::Lookup;

/// Resolve value-less build args from the environment. Entries that cannot
/// be resolved are left as they are; other shapes pass through untouched.
pub fn resolve_build_args(args: Value, lookup: Lookup<'_>) -> Value {
    match args {
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| match item {
                    Value::String(entry) if !entry.contains('=') => match lookup(&entry) {
                        Some(value) => Value::String(format!("{}={}", entry, value)),
                        None => Value::String(entry),
                    },
                    other => other,
                })
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| {
                    let value = match value {
                        Value::Null => lookup(&key).map(Value::String).unwrap_or(Value::Null),
                        other => other,
                    };
                    (key, value)
                })
                .collect(),
        ),
        other => other,
    }
}
