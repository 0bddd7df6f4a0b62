use std::str::FromStr;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::model::apperror::{ApplicationError, ErrorType};

/**
 * Command-line arguments for the application.
 */
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct ApplicationArguments {
    /**
     * Path to the configuration file. When omitted the configuration is read from environment variables.
     */
    #[arg(short, long)]
    pub config_file: Option<String>,
    /**
     * Run the embedded database migrations before starting the server.
     */
    #[arg(short, long)]
    pub migrate: bool,
}

/**
 * Default pool acquire timeout. Requests queue for a connection instead of failing, but sqlx needs a
 * finite deadline it can add to the current instant.
 */
pub const QUEUED_ACQUIRE_TIMEOUT_MS: u64 = 86_400_000;

/**
 * Represents the configuration for the application.
 */
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /**
     * Logging configuration for the application.
     */
    pub logging: LoggingConfig,
    /**
     * Server configuration for the application.
     */
    pub server: Server,
    /**
     * Database configuration for the application.
     */
    pub database: Database,
}

impl Config {
    /**
     * Reads the configuration from the process environment.
     *
     * # Returns
     * The configuration or an initialization error if a value cannot be parsed.
     */
    pub fn from_env() -> Result<Self, ApplicationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /**
     * Builds the configuration from a key lookup, using defaults for missing keys.
     *
     * # Arguments
     * `lookup`: Returns the value of an environment variable, if set.
     */
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ApplicationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_type = DatabaseType::Postgresql {
            host: lookup("DB_HOST").unwrap_or_else(|| "localhost".to_string()),
            port: parse_or(&lookup, "DB_PORT", 5432)?,
            username: lookup("DB_USER").unwrap_or_default(),
            password: lookup("DB_PASSWORD"),
            database_name: lookup("DB_NAME").unwrap_or_default(),
            ssl: lookup("DB_SSL").is_some_and(|value| value == "true"),
            max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?,
            min_connections: 0,
            acquire_timeout: QUEUED_ACQUIRE_TIMEOUT_MS,
            acquire_slow_threshold: 2_000,
            idle_timeout: 600_000,
            max_lifetime: 1_800_000,
        };
        let server = Server { workers: parse_or(&lookup, "WORKERS", 4)?, http_port: parse_or(&lookup, "PORT", 5000)? };
        Ok(Config { logging: LoggingConfig::default(), server, database: Database { db_type } })
    }

    /**
     * Reads the configuration from a TOML file.
     *
     * # Arguments
     * `config_file`: The path to the configuration file.
     */
    pub fn from_file(config_file: &str) -> Result<Self, ApplicationError> {
        let config_str = std::fs::read_to_string(config_file).map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Failed to read config file: {err}")))?;
        toml::from_str(&config_str).map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Failed to parse config file: {err}")))
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ApplicationError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => value.trim().parse::<T>().map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Invalid value for {key}: {err}"))),
        _ => Ok(default),
    }
}

#[allow(clippy::struct_excessive_bools)]
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /**
     * Whether to log the target of the log message.
     */
    pub target: bool,
    /**
     * Whether to log thread IDs .
     */
    pub thread_ids: bool,
    /**
     * Whether to log thread names.
     */
    pub thread_names: bool,
    /**
     * Whether to log line numbers.
     */
    pub line_number: bool,
    /**
     * Whether to log the log level.
     */
    pub level: bool,
    /**
     * Whether to use ANSI colors in logs.
     */
    pub ansi: bool,
    /**
     * Whether to log the source file.
     */
    pub file: bool,
    /**
     * Additional directives for the log filter, e.g. `sqlx=warn`.
     */
    pub directives: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig { target: true, thread_ids: false, thread_names: false, line_number: false, level: true, ansi: true, file: false, directives: vec![] }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Database {
    /**
     * Type of the database (e.g., `PostgreSQL`).
     */
    pub db_type: DatabaseType,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DatabaseType {
    /**
     * `PostgreSQL` database type. Timeouts are in milliseconds.
     */
    #[serde(rename_all = "camelCase")]
    Postgresql {
        host: String,
        port: u16,
        username: String,
        password: Option<String>,
        database_name: String,
        ssl: bool,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: u64,
        acquire_slow_threshold: u64,
        idle_timeout: u64,
        max_lifetime: u64,
    },
}

/**
 * Represents the server configuration for the application.
 */
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    /**
     * Number of worker threads for the server.
     */
    pub workers: usize,
    /**
     * HTTP port for the server.
     */
    pub http_port: u16,
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(values: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = values.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_config_from_lookup_defaults() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.server.http_port, 5000);
        assert_eq!(config.server.workers, 4);
        let DatabaseType::Postgresql { host, port, ssl, max_connections, password, .. } = config.database.db_type;
        assert_eq!(host, "localhost");
        assert_eq!(port, 5432);
        assert!(!ssl);
        assert_eq!(max_connections, 10);
        assert!(password.is_none());
    }

    #[test]
    fn test_config_acquire_waits_in_queue() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        let DatabaseType::Postgresql { acquire_timeout, .. } = config.database.db_type;
        assert_eq!(acquire_timeout, QUEUED_ACQUIRE_TIMEOUT_MS);
        let config = Config::from_file("./config/config.example.toml").unwrap();
        let DatabaseType::Postgresql { acquire_timeout, .. } = config.database.db_type;
        assert_eq!(acquire_timeout, QUEUED_ACQUIRE_TIMEOUT_MS);
    }

    #[test]
    fn test_config_from_lookup_values() {
        let config = Config::from_lookup(lookup_from(&[
            ("DB_HOST", "db.internal"),
            ("DB_PORT", "19640"),
            ("DB_USER", "warehouse"),
            ("DB_PASSWORD", "secret"),
            ("DB_NAME", "defaultdb"),
            ("DB_SSL", "true"),
            ("PORT", "8080"),
        ]))
        .unwrap();
        assert_eq!(config.server.http_port, 8080);
        let DatabaseType::Postgresql { host, port, username, password, database_name, ssl, .. } = config.database.db_type;
        assert_eq!(host, "db.internal");
        assert_eq!(port, 19640);
        assert_eq!(username, "warehouse");
        assert_eq!(password.as_deref(), Some("secret"));
        assert_eq!(database_name, "defaultdb");
        assert!(ssl);
    }

    #[test]
    fn test_config_ssl_only_when_true() {
        let config = Config::from_lookup(lookup_from(&[("DB_SSL", "yes")])).unwrap();
        let DatabaseType::Postgresql { ssl, .. } = config.database.db_type;
        assert!(!ssl);
    }

    #[test]
    fn test_config_invalid_port() {
        let result = Config::from_lookup(lookup_from(&[("PORT", "eighty")]));
        let err = result.err().unwrap();
        assert_eq!(err.error_type, ErrorType::Initialization);
        assert!(err.message.contains("PORT"));
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::from_lookup(lookup_from(&[("DB_NAME", "warehouse"), ("DB_PASSWORD", "pw")])).unwrap();
        let serialized = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(config.logging.target, deserialized.logging.target);
        assert_eq!(config.logging.ansi, deserialized.logging.ansi);
        assert_eq!(config.logging.directives, deserialized.logging.directives);
        assert_eq!(config.server.workers, deserialized.server.workers);
        assert_eq!(config.server.http_port, deserialized.server.http_port);
        let DatabaseType::Postgresql { database_name, password, .. } = deserialized.database.db_type;
        assert_eq!(database_name, "warehouse");
        assert_eq!(password.as_deref(), Some("pw"));
    }

    #[test]
    fn test_config_example_file() {
        let config = Config::from_file("./config/config.example.toml").unwrap();
        assert_eq!(config.server.http_port, 5000);
        assert_eq!(config.logging.directives, vec!["sqlx=warn".to_string(), "performance=debug".to_string()]);
        let DatabaseType::Postgresql { database_name, max_connections, ssl, .. } = config.database.db_type;
        assert_eq!(database_name, "warehouse");
        assert_eq!(max_connections, 10);
        assert!(!ssl);
    }

    #[test]
    fn test_config_file_missing() {
        let err = Config::from_file("./does-not-exist.toml").err().unwrap();
        assert_eq!(err.error_type, ErrorType::Initialization);
    }
}
