// ABOUTME: Compose-style variable interpolation for build specification strings.
// ABOUTME: Supports $VAR, ${VAR}, default/required/alternate modifiers and $$ escapes.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InterpolationError {
    #[error("invalid template: {template:?}")]
    InvalidTemplate { template: String },

    #[error("unterminated variable expression in {template:?}")]
    Unterminated { template: String },

    #[error("required variable {name} is missing a value: {message}")]
    RequiredVariable { name: String, message: String },
}

/// Variable lookup, `None` when unset.
pub type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Interpolate every string inside `value`. Object keys are left alone.
/// Errors carry the dotted path of the offending value.
pub fn interpolate_value(
    value: Value,
    lookup: Lookup<'_>,
) -> Result<Value, (String, InterpolationError)> {
    walk(value, "", lookup)
}

fn walk(
    value: Value,
    path: &str,
    lookup: Lookup<'_>,
) -> Result<Value, (String, InterpolationError)> {
    match value {
        Value::String(s) => interpolate_str(&s, lookup)
            .map(Value::String)
            .map_err(|e| (path.to_string(), e)),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| walk(item, &format!("{}[{}]", path, i), lookup))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, item) in map {
                let child = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                out.insert(key, walk(item, &child, lookup)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other),
    }
}

/// Expand all variable references in `input`.
pub fn interpolate_str(input: &str, lookup: Lookup<'_>) -> Result<String, InterpolationError> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(stripped) = after.strip_prefix('$') {
            out.push('$');
            rest = stripped;
            continue;
        }

        if let Some(body) = after.strip_prefix('{') {
            let end = matching_brace(body).ok_or_else(|| InterpolationError::Unterminated {
                template: input.to_string(),
            })?;
            out.push_str(&expand_braced(&body[..end], input, lookup)?);
            rest = &body[end + 1..];
            continue;
        }

        let len = identifier_len(after);
        if len == 0 {
            return Err(InterpolationError::InvalidTemplate {
                template: input.to_string(),
            });
        }
        out.push_str(&lookup_or_blank(&after[..len], lookup));
        rest = &after[len..];
    }

    out.push_str(rest);
    Ok(out)
}

fn expand_braced(
    expr: &str,
    template: &str,
    lookup: Lookup<'_>,
) -> Result<String, InterpolationError> {
    let invalid = || InterpolationError::InvalidTemplate {
        template: template.to_string(),
    };

    let len = identifier_len(expr);
    if len == 0 {
        return Err(invalid());
    }
    let (name, modifier) = expr.split_at(len);
    if modifier.is_empty() {
        return Ok(lookup_or_blank(name, lookup));
    }

    let value = lookup(name);
    let non_empty = value.as_deref().filter(|v| !v.is_empty());

    // Operands are expanded lazily so an unused required-variable branch never fails
    if let Some(default) = modifier.strip_prefix(":-") {
        return match non_empty {
            Some(v) => Ok(v.to_string()),
            None => interpolate_str(default, lookup),
        };
    }
    if let Some(message) = modifier.strip_prefix(":?") {
        return match non_empty {
            Some(v) => Ok(v.to_string()),
            None => Err(required(name, message, lookup)?),
        };
    }
    if let Some(alternate) = modifier.strip_prefix(":+") {
        return match non_empty {
            Some(_) => interpolate_str(alternate, lookup),
            None => Ok(String::new()),
        };
    }
    if let Some(default) = modifier.strip_prefix('-') {
        return match value {
            Some(v) => Ok(v),
            None => interpolate_str(default, lookup),
        };
    }
    if let Some(message) = modifier.strip_prefix('?') {
        return match value {
            Some(v) => Ok(v),
            None => Err(required(name, message, lookup)?),
        };
    }
    if let Some(alternate) = modifier.strip_prefix('+') {
        return match value {
            Some(_) => interpolate_str(alternate, lookup),
            None => Ok(String::new()),
        };
    }

    Err(invalid())
}

fn required(
    name: &str,
    message: &str,
    lookup: Lookup<'_>,
) -> Result<InterpolationError, InterpolationError> {
    Ok(InterpolationError::RequiredVariable {
        name: name.to_string(),
        message: interpolate_str(message, lookup)?,
    })
}

fn lookup_or_blank(name: &str, lookup: Lookup<'_>) -> String {
    lookup(name).unwrap_or_else(|| {
        tracing::warn!(
            variable = name,
            "variable is not set, defaulting to a blank string"
        );
        String::new()
    })
}

/// Byte length of a leading `[A-Za-z_][A-Za-z0-9_]*` identifier.
fn identifier_len(s: &str) -> usize {
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return 0,
    }
    chars
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Index of the `}` closing a `${`, honoring nested expressions.
fn matching_brace(body: &str) -> Option<usize> {
    let bytes = body.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'$' if bytes.get(i + 1) == Some(&b'{') => {
                depth += 1;
                i += 2;
                continue;
            }
            b'}' if depth == 0 => return Some(i),
            b'}' => depth -= 1,
            _ => {}
        }
        i += 1;
    }
    None
}
