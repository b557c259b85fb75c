use core_config::{ConfigError, FromEnv, env_parse_or};
use std::time::Duration;

pub const DEFAULT_PAGE_LIMIT: u64 = 20;
pub const DEFAULT_MAX_PAGE_LIMIT: u64 = 100;
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

/// Tunables shared by the query engines.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryConfig {
    /// Used when `limit` is absent, non-numeric or not positive.
    pub default_limit: u64,
    /// Larger limits are capped to this value.
    pub max_limit: u64,
    /// Server-side `maxTimeMS` for every find, count and aggregate.
    pub query_timeout: Duration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_PAGE_LIMIT,
            max_limit: DEFAULT_MAX_PAGE_LIMIT,
            query_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
        }
    }
}

impl FromEnv for QueryConfig {
    /// - `ENGAGEMENT_DEFAULT_PAGE_LIMIT` (default: 20)
    /// - `ENGAGEMENT_MAX_PAGE_LIMIT` (default: 100)
    /// - `ENGAGEMENT_QUERY_TIMEOUT_SECS` (default: 30)
    fn from_env() -> Result<Self, ConfigError> {
        let default_limit = env_parse_or("ENGAGEMENT_DEFAULT_PAGE_LIMIT", DEFAULT_PAGE_LIMIT)?;
        let max_limit = env_parse_or("ENGAGEMENT_MAX_PAGE_LIMIT", DEFAULT_MAX_PAGE_LIMIT)?;
        let timeout_secs =
            env_parse_or("ENGAGEMENT_QUERY_TIMEOUT_SECS", DEFAULT_QUERY_TIMEOUT_SECS)?;

        if default_limit == 0 || max_limit == 0 || default_limit > max_limit {
            return Err(ConfigError::ParseError {
                key: "ENGAGEMENT_DEFAULT_PAGE_LIMIT".to_string(),
                details: format!(
                    "must be between 1 and ENGAGEMENT_MAX_PAGE_LIMIT ({}), got {}",
                    max_limit, default_limit
                ),
            });
        }

        Ok(Self {
            default_limit,
            max_limit,
            query_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEYS: [&str; 3] = [
        "ENGAGEMENT_DEFAULT_PAGE_LIMIT",
        "ENGAGEMENT_MAX_PAGE_LIMIT",
        "ENGAGEMENT_QUERY_TIMEOUT_SECS",
    ];

    #[test]
    fn test_query_config_defaults() {
        temp_env::with_vars_unset(KEYS, || {
            let config = QueryConfig::from_env().unwrap();
            assert_eq!(config, QueryConfig::default());
            assert_eq!(config.default_limit, 20);
            assert_eq!(config.max_limit, 100);
            assert_eq!(config.query_timeout, Duration::from_secs(30));
        });
    }

    #[test]
    fn test_query_config_overrides() {
        temp_env::with_vars(
            [
                ("ENGAGEMENT_DEFAULT_PAGE_LIMIT", Some("50")),
                ("ENGAGEMENT_MAX_PAGE_LIMIT", Some("500")),
                ("ENGAGEMENT_QUERY_TIMEOUT_SECS", Some("5")),
            ],
            || {
                let config = QueryConfig::from_env().unwrap();
                assert_eq!(config.default_limit, 50);
                assert_eq!(config.max_limit, 500);
                assert_eq!(config.query_timeout, Duration::from_secs(5));
            },
        );
    }

    #[test]
    fn test_query_config_rejects_default_above_max() {
        temp_env::with_vars(
            [
                ("ENGAGEMENT_DEFAULT_PAGE_LIMIT", Some("200")),
                ("ENGAGEMENT_MAX_PAGE_LIMIT", Some("100")),
                ("ENGAGEMENT_QUERY_TIMEOUT_SECS", None),
            ],
            || {
                let err = QueryConfig::from_env().unwrap_err();
                assert!(err.to_string().contains("ENGAGEMENT_DEFAULT_PAGE_LIMIT"));
            },
        );
    }

    #[test]
    fn test_query_config_rejects_garbage_timeout() {
        temp_env::with_var("ENGAGEMENT_QUERY_TIMEOUT_SECS", Some("fast"), || {
            let err = QueryConfig::from_env().unwrap_err();
            assert!(err.to_string().contains("ENGAGEMENT_QUERY_TIMEOUT_SECS"));
        });
    }
}
