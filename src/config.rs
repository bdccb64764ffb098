//! Configuration management for the SQL agent tools.
//!
//! Configuration can be set via environment variables (a `.env` file in the
//! working directory is loaded first when present):
//! - `DATABASE_URL` - Required. Connection string, e.g. `sqlite://data/ry-vue.db?mode=ro`.
//! - `DB_POOL_SIZE` - Optional. Connections kept in the pool. Defaults to `5`.
//! - `DB_MAX_OVERFLOW` - Optional. Extra connections allowed under load. Defaults to `10`.
//! - `DB_POOL_RECYCLE_SECS` - Optional. Maximum connection age. Defaults to `3600`.
//! - `LOG_SINK` - Optional. `stdout`, `stderr` or a file path. Defaults to `stderr` so logs stay
//!   out of tool output on stdout.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_POOL_SIZE: usize = 5;
pub const DEFAULT_MAX_OVERFLOW: usize = 10;
pub const DEFAULT_POOL_RECYCLE: Duration = Duration::from_secs(3600);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Where log output goes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogSink {
    Stdout,
    #[default]
    Stderr,
    File(PathBuf),
}

impl FromStr for LogSink {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "" => Err(ConfigError::InvalidValue(
                "LOG_SINK".to_string(),
                "empty value".to_string(),
            )),
            v if v.eq_ignore_ascii_case("stdout") => Ok(Self::Stdout),
            v if v.eq_ignore_ascii_case("stderr") => Ok(Self::Stderr),
            path => Ok(Self::File(PathBuf::from(path))),
        }
    }
}

/// Database connection and pool settings.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Connection string
    pub url: String,

    /// Connections kept open in the pool
    pub pool_size: usize,

    /// Additional connections allowed beyond `pool_size`
    pub max_overflow: usize,

    /// Connections older than this are replaced on checkout
    pub pool_recycle: Duration,
}

impl DatabaseConfig {
    /// Settings for `url` with the default pool sizing.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            pool_size: DEFAULT_POOL_SIZE,
            max_overflow: DEFAULT_MAX_OVERFLOW,
            pool_recycle: DEFAULT_POOL_RECYCLE,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,

    pub log_sink: LogSink,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `DATABASE_URL` is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?;

        let pool_size = parse_or(&lookup, "DB_POOL_SIZE", DEFAULT_POOL_SIZE)?;
        let max_overflow = parse_or(&lookup, "DB_MAX_OVERFLOW", DEFAULT_MAX_OVERFLOW)?;
        let recycle_secs = parse_or(
            &lookup,
            "DB_POOL_RECYCLE_SECS",
            DEFAULT_POOL_RECYCLE.as_secs(),
        )?;

        if pool_size == 0 {
            return Err(ConfigError::InvalidValue(
                "DB_POOL_SIZE".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let log_sink = lookup("LOG_SINK")
            .map(|v| v.parse::<LogSink>())
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            database: DatabaseConfig {
                url,
                pool_size,
                max_overflow,
                pool_recycle: Duration::from_secs(recycle_secs),
            },
            log_sink,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database: DatabaseConfig::new(database_url),
            log_sink: LogSink::default(),
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(key.to_string(), format!("{}", e))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_url_is_set() {
        let config = Config::from_lookup(lookup(&[("DATABASE_URL", "sqlite://app.db")]))
            .expect("config");
        assert_eq!(config.database.url, "sqlite://app.db");
        assert_eq!(config.database.pool_size, 5);
        assert_eq!(config.database.max_overflow, 10);
        assert_eq!(config.database.pool_recycle, Duration::from_secs(3600));
        assert_eq!(config.log_sink, LogSink::Stderr);
    }

    #[test]
    fn missing_url_is_an_error() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref v) if v == "DATABASE_URL"));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite://app.db"),
            ("DB_POOL_SIZE", "2"),
            ("DB_MAX_OVERFLOW", "0"),
            ("DB_POOL_RECYCLE_SECS", "60"),
            ("LOG_SINK", "/tmp/sql-agent.log"),
        ]))
        .expect("config");
        assert_eq!(config.database.pool_size, 2);
        assert_eq!(config.database.max_overflow, 0);
        assert_eq!(config.database.pool_recycle, Duration::from_secs(60));
        assert_eq!(
            config.log_sink,
            LogSink::File(PathBuf::from("/tmp/sql-agent.log"))
        );
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite://app.db"),
            ("DB_POOL_SIZE", "many"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref k, _) if k == "DB_POOL_SIZE"));

        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite://app.db"),
            ("DB_POOL_SIZE", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(..)));
    }

    #[test]
    fn log_sink_parsing() {
        assert_eq!("STDERR".parse::<LogSink>().expect("stderr"), LogSink::Stderr);
        assert_eq!("stdout".parse::<LogSink>().expect("stdout"), LogSink::Stdout);
        assert!("  ".parse::<LogSink>().is_err());
    }
}
