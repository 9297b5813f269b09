#![forbid(unsafe_code)]

use super::StoreError;
use serde::Deserialize;
use std::path::PathBuf;

const ENV_STORAGE_DIR: &str = "BLOCKDOC_STORAGE_DIR";
const ENV_BUSY_TIMEOUT_MS: &str = "BLOCKDOC_BUSY_TIMEOUT_MS";
const ENV_SEARCH_LIMIT: &str = "BLOCKDOC_SEARCH_LIMIT";
const ENV_SINGLETON_TYPES: &str = "BLOCKDOC_SINGLETON_TYPES";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreConfig {
    pub storage_dir: PathBuf,
    pub busy_timeout_ms: u64,
    pub default_search_limit: usize,
    pub max_search_limit: usize,
    /// Deepest allowed parent chain for a block.
    pub max_tree_depth: usize,
    /// Object type keys that may exist once per store and are never cloned.
    pub singleton_type_keys: Vec<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from(".blockdoc"),
            busy_timeout_ms: 5_000,
            default_search_limit: 50,
            max_search_limit: 500,
            max_tree_depth: 512,
            singleton_type_keys: vec!["home".to_string()],
        }
    }
}

impl StoreConfig {
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            ..Self::default()
        }
    }

    /// Defaults overridden by `BLOCKDOC_*` environment variables.
    pub fn from_env() -> Result<Self, StoreError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_vars<F>(lookup: F) -> Result<Self, StoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(dir) = lookup(ENV_STORAGE_DIR) {
            config.storage_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(ENV_BUSY_TIMEOUT_MS) {
            config.busy_timeout_ms = parse_number(ENV_BUSY_TIMEOUT_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_SEARCH_LIMIT) {
            config.default_search_limit = parse_number(ENV_SEARCH_LIMIT, &raw)?;
        }
        if let Some(raw) = lookup(ENV_SINGLETON_TYPES) {
            config.singleton_type_keys = raw
                .split(',')
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_string)
                .collect();
        }
        config.validate()?;
        Ok(config)
    }

    pub fn is_singleton_type(&self, type_key: &str) -> bool {
        self.singleton_type_keys.iter().any(|key| key == type_key)
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        if self.default_search_limit == 0 || self.max_search_limit == 0 {
            return Err(StoreError::validation("search limits must be positive"));
        }
        if self.default_search_limit > self.max_search_limit {
            return Err(StoreError::validation(
                "default search limit exceeds max search limit",
            ));
        }
        if self.max_tree_depth == 0 {
            return Err(StoreError::validation("max tree depth must be positive"));
        }
        Ok(())
    }

    pub(crate) fn clamp_search_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_search_limit)
            .clamp(1, self.max_search_limit)
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, StoreError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| StoreError::validation(format!("{name} must be a non-negative integer")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<StoreConfig, StoreError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        StoreConfig::from_vars(|name| vars.get(name).cloned())
    }

    #[test]
    fn env_vars_override_defaults() {
        let config = from_pairs(&[
            (ENV_STORAGE_DIR, "/var/lib/bd"),
            (ENV_BUSY_TIMEOUT_MS, " 250 "),
            (ENV_SEARCH_LIMIT, "20"),
            (ENV_SINGLETON_TYPES, "home, inbox,,"),
        ])
        .unwrap();
        assert_eq!(config.storage_dir, PathBuf::from("/var/lib/bd"));
        assert_eq!(config.busy_timeout_ms, 250);
        assert_eq!(config.default_search_limit, 20);
        assert_eq!(config.singleton_type_keys, vec!["home", "inbox"]);
        assert!(config.is_singleton_type("inbox"));

        assert_eq!(from_pairs(&[]).unwrap(), StoreConfig::default());
        let config = from_pairs(&[(ENV_SINGLETON_TYPES, "")]).unwrap();
        assert!(!config.is_singleton_type("home"));
    }

    #[test]
    fn bad_env_values_are_rejected() {
        let err = from_pairs(&[(ENV_BUSY_TIMEOUT_MS, "soon")]).unwrap_err();
        assert_eq!(err.code(), "VALIDATION");
        assert!(err.to_string().contains(ENV_BUSY_TIMEOUT_MS));

        let err = from_pairs(&[(ENV_SEARCH_LIMIT, "-3")]).unwrap_err();
        assert_eq!(err.code(), "VALIDATION");
        let err = from_pairs(&[(ENV_SEARCH_LIMIT, "0")]).unwrap_err();
        assert_eq!(err.code(), "VALIDATION");
        let err = from_pairs(&[(ENV_SEARCH_LIMIT, "501")]).unwrap_err();
        assert_eq!(err.code(), "VALIDATION");
    }

    #[test]
    fn json_config_fills_missing_fields_with_defaults() {
        let config: StoreConfig =
            serde_json::from_str(r#"{"storageDir": "/tmp/bd", "defaultSearchLimit": 20}"#).unwrap();
        assert_eq!(config.storage_dir, PathBuf::from("/tmp/bd"));
        assert_eq!(config.default_search_limit, 20);
        assert_eq!(config.max_search_limit, 500);
        assert!(config.is_singleton_type("home"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn search_limit_is_clamped() {
        let config = StoreConfig::default();
        assert_eq!(config.clamp_search_limit(None), 50);
        assert_eq!(config.clamp_search_limit(Some(0)), 1);
        assert_eq!(config.clamp_search_limit(Some(10_000)), 500);
    }

    #[test]
    fn inconsistent_limits_are_rejected() {
        let config = StoreConfig {
            default_search_limit: 600,
            ..StoreConfig::default()
        };
        assert_eq!(config.validate().unwrap_err().code(), "VALIDATION");
    }
}
