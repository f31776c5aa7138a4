//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `STOCKTAKE_BASE_URL` - Backend base URL (default: `http://localhost:8081`)
//! - `STOCKTAKE_DEFAULT_LIMIT` - Page size for new list views (default: 50)
//! - `STOCKTAKE_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `STOCKTAKE_CACHE_CAPACITY` - Maximum cached list pages (default: 1000)
//! - `STOCKTAKE_CACHE_TTL_SECS` - Lifetime of a cached list page (default: 300)
//! - `STOCKTAKE_TOKEN_FILE` - Where the bearer token is persisted (default: `.stocktake-token`)
//! - `STOCKTAKE_RESOLUTION_POLICY` - `strict` or `permissive` (default: `strict`)

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use stocktake_core::ResolutionPolicy;
use thiserror::Error;
use url::Url;

const DEFAULT_BASE_URL: &str = "http://localhost:8081";
const DEFAULT_LIMIT: u32 = 50;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CACHE_CAPACITY: u64 = 1000;
const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_TOKEN_FILE: &str = ".stocktake-token";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Settings for [`crate::InventoryClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub default_limit: u32,
    pub request_timeout: Duration,
    pub cache_capacity: u64,
    pub cache_ttl: Duration,
    pub token_file: PathBuf,
    pub resolution_policy: ResolutionPolicy,
}

impl ClientConfig {
    /// Configuration for `base_url` with every other setting at its default.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            default_limit: DEFAULT_LIMIT,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            token_file: PathBuf::from(DEFAULT_TOKEN_FILE),
            resolution_policy: ResolutionPolicy::default(),
        }
    }

    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(get_optional_env)
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_url = lookup("STOCKTAKE_BASE_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = Url::parse(raw_url.trim()).map_err(|e| {
            ConfigError::InvalidEnvVar("STOCKTAKE_BASE_URL".to_string(), e.to_string())
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidEnvVar(
                "STOCKTAKE_BASE_URL".to_string(),
                format!("{base_url} cannot be used as a base URL"),
            ));
        }

        let defaults = Self::new(base_url);
        let default_limit: u32 = parse_or(&lookup, "STOCKTAKE_DEFAULT_LIMIT", defaults.default_limit)?;
        if default_limit == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "STOCKTAKE_DEFAULT_LIMIT".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            default_limit,
            request_timeout: Duration::from_secs(parse_or(
                &lookup,
                "STOCKTAKE_REQUEST_TIMEOUT_SECS",
                DEFAULT_TIMEOUT_SECS,
            )?),
            cache_capacity: parse_or(&lookup, "STOCKTAKE_CACHE_CAPACITY", DEFAULT_CACHE_CAPACITY)?,
            cache_ttl: Duration::from_secs(parse_or(
                &lookup,
                "STOCKTAKE_CACHE_TTL_SECS",
                DEFAULT_CACHE_TTL_SECS,
            )?),
            token_file: lookup("STOCKTAKE_TOKEN_FILE")
                .filter(|v| !v.trim().is_empty())
                .map_or_else(|| defaults.token_file.clone(), PathBuf::from),
            resolution_policy: parse_or(
                &lookup,
                "STOCKTAKE_RESOLUTION_POLICY",
                defaults.resolution_policy,
            )?,
            ..defaults
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Parse a variable if it is set and non-blank, otherwise use `default`.
fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        _ => Ok(default),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.base_url.as_str(), "http://localhost:8081/");
        assert_eq!(config.default_limit, 50);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.token_file, PathBuf::from(".stocktake-token"));
        assert_eq!(config.resolution_policy, ResolutionPolicy::Strict);
    }

    #[test]
    fn test_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("STOCKTAKE_BASE_URL", "https://erp.example.com/api"),
            ("STOCKTAKE_DEFAULT_LIMIT", "20"),
            ("STOCKTAKE_CACHE_CAPACITY", "10"),
            ("STOCKTAKE_RESOLUTION_POLICY", "Permissive"),
        ]))
        .unwrap();
        assert_eq!(config.base_url.path(), "/api");
        assert_eq!(config.default_limit, 20);
        assert_eq!(config.cache_capacity, 10);
        assert_eq!(config.resolution_policy, ResolutionPolicy::Permissive);
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[("STOCKTAKE_DEFAULT_LIMIT", "  ")])).unwrap();
        assert_eq!(config.default_limit, 50);
    }

    #[test]
    fn test_invalid_base_url() {
        let err = ClientConfig::from_lookup(lookup(&[("STOCKTAKE_BASE_URL", "not a url")])).unwrap_err();
        assert!(err.to_string().contains("STOCKTAKE_BASE_URL"));
    }

    #[test]
    fn test_invalid_values_name_the_variable() {
        let err = ClientConfig::from_lookup(lookup(&[("STOCKTAKE_DEFAULT_LIMIT", "lots")])).unwrap_err();
        assert!(err.to_string().contains("STOCKTAKE_DEFAULT_LIMIT"));

        let err = ClientConfig::from_lookup(lookup(&[("STOCKTAKE_DEFAULT_LIMIT", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(key, _) if key == "STOCKTAKE_DEFAULT_LIMIT"));

        assert!(
            ClientConfig::from_lookup(lookup(&[("STOCKTAKE_RESOLUTION_POLICY", "loose")])).is_err()
        );
    }
}
