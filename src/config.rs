use std::{env, path::PathBuf, time::Duration};

use thiserror::Error;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_MODEL: &str = "deepseek-r1-250120";

/// Process-wide settings, read once at startup and shared read-only afterwards.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub api_key: String,
    pub api_url: String,
    pub port: u16,
    pub upstream_timeout: Duration,
    pub model: String,
    pub static_dir: PathBuf,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {name}")]
    Invalid { name: &'static str, value: String },
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let api_key = read("API_KEY").ok_or(ConfigError::Missing("API_KEY"))?;
        let api_url = read("API_URL").ok_or(ConfigError::Missing("API_URL"))?;

        let port = match read("PORT") {
            Some(value) => value
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid {
                    name: "PORT",
                    value,
                })?,
            None => DEFAULT_PORT,
        };

        let timeout_ms = match read("UPSTREAM_TIMEOUT_MS") {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or(ConfigError::Invalid {
                    name: "UPSTREAM_TIMEOUT_MS",
                    value,
                })?,
            None => DEFAULT_TIMEOUT_MS,
        };

        Ok(Self {
            api_key,
            api_url: api_url.trim().to_owned(),
            port,
            upstream_timeout: Duration::from_millis(timeout_ms),
            model: read("UPSTREAM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
            static_dir: read("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
        })
    }

    /// `.env` is a development convenience; production deployments
    /// (`NODE_ENV` or `APP_ENV` set to `production`) take the real environment only.
    pub fn loads_dotenv<F>(lookup: F) -> bool
    where
        F: Fn(&str) -> Option<String>,
    {
        !["NODE_ENV", "APP_ENV"]
            .iter()
            .any(|name| lookup(name).is_some_and(|value| value.trim() == "production"))
    }

    /// Settings pointing at `api_url` with every optional knob at its default.
    pub fn for_upstream(api_url: impl Into<String>) -> Self {
        Self {
            api_key: "test-key".to_owned(),
            api_url: api_url.into(),
            port: DEFAULT_PORT,
            upstream_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            model: DEFAULT_MODEL.to_owned(),
            static_dir: PathBuf::from("."),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn missing_api_key_is_fatal() {
        let error = RelayConfig::from_lookup(lookup_from(&[("API_URL", "http://x")]))
            .expect_err("api key is required");
        assert_eq!(error, ConfigError::Missing("API_KEY"));
    }

    #[test]
    fn blank_api_url_counts_as_missing() {
        let error =
            RelayConfig::from_lookup(lookup_from(&[("API_KEY", "k"), ("API_URL", "  ")]))
                .expect_err("api url is required");
        assert_eq!(error, ConfigError::Missing("API_URL"));
    }

    #[test]
    fn defaults_apply_when_optional_values_absent() {
        let config =
            RelayConfig::from_lookup(lookup_from(&[("API_KEY", "k"), ("API_URL", "http://x")]))
                .expect("config should load");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.upstream_timeout, Duration::from_secs(60));
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.static_dir, PathBuf::from("."));
    }

    #[test]
    fn rejects_unparseable_port() {
        let error = RelayConfig::from_lookup(lookup_from(&[
            ("API_KEY", "k"),
            ("API_URL", "http://x"),
            ("PORT", "eighty"),
        ]))
        .expect_err("port must be numeric");
        assert_eq!(
            error,
            ConfigError::Invalid {
                name: "PORT",
                value: "eighty".to_owned()
            }
        );
    }

    #[test]
    fn production_skips_dotenv() {
        assert!(RelayConfig::loads_dotenv(lookup_from(&[])));
        assert!(RelayConfig::loads_dotenv(lookup_from(&[("NODE_ENV", "development")])));
        assert!(!RelayConfig::loads_dotenv(lookup_from(&[("NODE_ENV", "production")])));
        assert!(!RelayConfig::loads_dotenv(lookup_from(&[("APP_ENV", "production")])));
    }

    #[test]
    fn reads_overrides() {
        let config = RelayConfig::from_lookup(lookup_from(&[
            ("API_KEY", "k"),
            ("API_URL", "http://x/chat"),
            ("PORT", "8081"),
            ("UPSTREAM_TIMEOUT_MS", "1500"),
            ("UPSTREAM_MODEL", "other-model"),
        ]))
        .expect("config should load");
        assert_eq!(config.port, 8081);
        assert_eq!(config.upstream_timeout, Duration::from_millis(1500));
        assert_eq!(config.model, "other-model");
    }
}
