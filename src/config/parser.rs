use crate::config::types::{ConfigOverrides, Paths, RunConfig, DEFAULT_CATEGORIES};
use crate::config::validation::{int_in_range, non_empty_string, positive_int, string_list};
use crate::ConfigError;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Extracts the recognised keys from a parsed override document
///
/// Absent and `null` keys are skipped silently. Malformed keys are logged
/// with a `[CFG]` warning and skipped so the default stands.
///
/// # Returns
///
/// * `Ok(ConfigOverrides)` - The well-formed overrides
/// * `Err(ConfigError::NotAnObject)` - The document root is not a JSON object
pub fn parse_overrides(value: &Value) -> Result<ConfigOverrides, ConfigError> {
    let map = value.as_object().ok_or(ConfigError::NotAnObject)?;
    let mut overrides = ConfigOverrides::default();

    fn pick<T>(
        map: &serde_json::Map<String, Value>,
        key: &'static str,
        check: impl Fn(&'static str, &Value) -> Result<T, ConfigError>,
    ) -> Option<T> {
        match map.get(key) {
            None | Some(Value::Null) => None,
            Some(v) => match check(key, v) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    tracing::warn!("[CFG] Ignoring override: {}", e);
                    None
                }
            },
        }
    }

    overrides.countries = pick(map, "COUNTRIES_QUERY", string_list);
    overrides.categories = pick(map, "CATEGORIES", string_list);
    overrides.max_queries = pick(map, "MAX_QUERIES", positive_int);
    overrides.results_per_query = pick(map, "RESULTS_PER_QUERY", |k, v| int_in_range(k, v, 1, 100));
    overrides.requery_ttl_days = pick(map, "REQUERY_TTL_DAYS", |k, v| int_in_range(k, v, 0, u32::MAX));
    overrides.output_csv = pick(map, "OUTPUT_CSV", non_empty_string);

    Ok(overrides)
}

/// Reads and parses the override file
///
/// # Returns
///
/// * `Ok(None)` - The file does not exist
/// * `Ok(Some(ConfigOverrides))` - The file was parsed
/// * `Err(ConfigError)` - The file exists but could not be read or parsed
pub fn load_overrides(path: &Path) -> Result<Option<ConfigOverrides>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content)?;
    parse_overrides(&value).map(Some)
}

/// Loads the default category list
///
/// Falls back to the built-in categories when the file is missing, unreadable
/// or not a JSON list of strings.
pub fn load_default_categories(path: &Path) -> Vec<String> {
    let fallback = || DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect();

    if !path.exists() {
        tracing::debug!("[DEFAULTS] {} not found, using built-in categories", path.display());
        return fallback();
    }

    let parsed = std::fs::read_to_string(path)
        .map_err(ConfigError::from)
        .and_then(|content| serde_json::from_str::<Value>(&content).map_err(ConfigError::from))
        .and_then(|value| string_list("default categories", &value));

    match parsed {
        Ok(categories) => {
            tracing::info!(
                "[DEFAULTS] {} categories loaded from {}",
                categories.len(),
                path.display()
            );
            categories
        }
        Err(e) => {
            tracing::warn!("[DEFAULTS] Could not use {}: {}", path.display(), e);
            fallback()
        }
    }
}

/// Resolves the run configuration
///
/// Never fails: a missing override file yields the defaults, and an
/// unreadable one is reported and ignored entirely.
pub fn load_run_config(paths: &Paths) -> RunConfig {
    let defaults = RunConfig::defaults(paths, load_default_categories(&paths.default_categories_path));

    let config = match load_overrides(&paths.config_path) {
        Ok(Some(overrides)) => {
            match compute_config_hash(&paths.config_path) {
                Ok(hash) => tracing::info!(
                    "[CFG] Overrides applied from {} (sha256 {})",
                    paths.config_path.display(),
                    &hash[..12]
                ),
                Err(_) => tracing::info!(
                    "[CFG] Overrides applied from {}",
                    paths.config_path.display()
                ),
            }
            defaults.merge(&overrides, &paths.base_dir)
        }
        Ok(None) => {
            tracing::info!("[CFG] No overrides; using default settings");
            defaults
        }
        Err(e) => {
            tracing::warn!(
                "[CFG] Could not read {}: {}; using default settings",
                paths.config_path.display(),
                e
            );
            defaults
        }
    };

    tracing::info!("[CFG] COUNTRIES_QUERY = {:?}", config.countries);
    tracing::info!("[CFG] CATEGORIES = {:?}", config.categories);

    config
}

/// Computes a SHA-256 hash of the override file content
///
/// Logged at startup so a run can be matched to the exact dashboard settings
/// it used.
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(hex::encode(hasher.finalize()))
}
