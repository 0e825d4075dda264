use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::scheduler::SchedulerConfig;
use crate::source::FETCH_TIMEOUT;

const DEFAULT_DATABASE_URL: &str = "sqlite:aggregator.db?mode=rwc";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
const DEFAULT_BATCH_SIZE: usize = 10;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} has an invalid value: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Process configuration, read from the environment (and `.env`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub poll_interval: Duration,
    pub batch_size: usize,
    pub fetch_timeout: Duration,
    pub max_connections: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            batch_size: DEFAULT_BATCH_SIZE,
            fetch_timeout: FETCH_TIMEOUT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let database_url = lookup("DATABASE_URL").unwrap_or(defaults.database_url);
        let poll_interval = parse(&lookup, "POLL_INTERVAL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.poll_interval);
        let batch_size = parse(&lookup, "BATCH_SIZE")?.unwrap_or(defaults.batch_size);
        let fetch_timeout = parse(&lookup, "FETCH_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.fetch_timeout);
        let max_connections =
            parse(&lookup, "DB_MAX_CONNECTIONS")?.unwrap_or(defaults.max_connections);

        let config = Self {
            database_url,
            poll_interval,
            batch_size,
            fetch_timeout,
            max_connections,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Zero("POLL_INTERVAL_SECS"));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Zero("BATCH_SIZE"));
        }
        if self.fetch_timeout.is_zero() {
            return Err(ConfigError::Zero("FETCH_TIMEOUT_SECS"));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::Zero("DB_MAX_CONNECTIONS"));
        }
        Ok(())
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            poll_interval: self.poll_interval,
            batch_size: self.batch_size,
        }
    }
}

fn parse<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.fetch_timeout, Duration::from_secs(10));
    }

    #[test]
    fn reads_every_key() {
        let config = config_from(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("POLL_INTERVAL_SECS", "5"),
            ("BATCH_SIZE", "3"),
            ("FETCH_TIMEOUT_SECS", "2"),
            ("DB_MAX_CONNECTIONS", "1"),
        ])
        .unwrap();

        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.scheduler().poll_interval, Duration::from_secs(5));
        assert_eq!(config.scheduler().batch_size, 3);
        assert_eq!(config.fetch_timeout, Duration::from_secs(2));
        assert_eq!(config.max_connections, 1);
    }

    #[test]
    fn rejects_unparseable_numbers() {
        let err = config_from(&[("BATCH_SIZE", "many")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "BATCH_SIZE",
                value: "many".to_string()
            }
        );
    }

    #[test]
    fn rejects_zero_batch_size() {
        assert_eq!(
            config_from(&[("BATCH_SIZE", "0")]).unwrap_err(),
            ConfigError::Zero("BATCH_SIZE")
        );
    }
}
