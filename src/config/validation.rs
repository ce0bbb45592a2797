use crate::ConfigError;
use serde_json::Value;

/// Validates a list of strings (country filters, categories)
///
/// Blank entries are dropped; any non-string entry rejects the whole list.
pub fn string_list(key: &'static str, value: &Value) -> Result<Vec<String>, ConfigError> {
    let items = value.as_array().ok_or_else(|| ConfigError::InvalidValue {
        key,
        message: format!("expected a list of strings, got {}", type_name(value)),
    })?;

    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let s = item.as_str().ok_or_else(|| ConfigError::InvalidValue {
            key,
            message: format!("list entries must be strings, got {}", type_name(item)),
        })?;
        let s = s.trim();
        if !s.is_empty() {
            out.push(s.to_string());
        }
    }

    Ok(out)
}

/// Validates a strictly positive integer
pub fn positive_int(key: &'static str, value: &Value) -> Result<usize, ConfigError> {
    match value.as_u64() {
        Some(n) if n > 0 => usize::try_from(n).map_err(|_| ConfigError::InvalidValue {
            key,
            message: format!("{} is too large", n),
        }),
        _ => Err(ConfigError::InvalidValue {
            key,
            message: format!("expected a positive integer, got {}", value),
        }),
    }
}

/// Validates an integer within `min..=max`
pub fn int_in_range(key: &'static str, value: &Value, min: u32, max: u32) -> Result<u32, ConfigError> {
    match value.as_u64() {
        Some(n) if n >= u64::from(min) && n <= u64::from(max) => Ok(n as u32),
        _ => Err(ConfigError::InvalidValue {
            key,
            message: format!("expected an integer between {} and {}, got {}", min, max, value),
        }),
    }
}

/// Validates a non-empty string, returned trimmed
pub fn non_empty_string(key: &'static str, value: &Value) -> Result<String, ConfigError> {
    match value.as_str().map(str::trim) {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(ConfigError::InvalidValue {
            key,
            message: format!("expected a non-empty string, got {}", value),
        }),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
