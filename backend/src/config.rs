use std::env;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a number, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },
    #[error("{name} must be at least {min}, got {value}")]
    TooSmall {
        name: &'static str,
        min: u64,
        value: u64,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub static_files_path: Option<String>,
    pub cors_origins: Vec<String>,
    /// Name of the cookie carrying the anonymous per-browser identity
    pub identity_cookie: String,
    /// Completion facts older than this many calendar months are swept
    pub retention_months: u32,
    pub sweep_interval_hours: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_var("PORT", 8080)?,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:tickoff.db?mode=rwc".to_string()),
            database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 5)?,
            static_files_path: env::var("STATIC_FILES_PATH").ok(),
            cors_origins: env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:8080".to_string())
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),
            identity_cookie: env::var("IDENTITY_COOKIE").unwrap_or_else(|_| "user_id".to_string()),
            retention_months: at_least(
                "RETENTION_MONTHS",
                parse_var("RETENTION_MONTHS", 3)?,
                1,
            )?,
            sweep_interval_hours: parse_var("SWEEP_INTERVAL_HOURS", 24)?,
        })
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { name, value }),
        Err(_) => Ok(default),
    }
}

fn at_least(name: &'static str, value: u32, min: u32) -> Result<u32, ConfigError> {
    if value < min {
        return Err(ConfigError::TooSmall {
            name,
            min: min.into(),
            value: value.into(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to ensure config tests run serially (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn clear_env() {
        env::remove_var("HOST");
        env::remove_var("PORT");
        env::remove_var("DATABASE_URL");
        env::remove_var("DATABASE_MAX_CONNECTIONS");
        env::remove_var("STATIC_FILES_PATH");
        env::remove_var("CORS_ORIGINS");
        env::remove_var("IDENTITY_COOKIE");
        env::remove_var("RETENTION_MONTHS");
        env::remove_var("SWEEP_INTERVAL_HOURS");
    }

    #[test]
    fn test_config_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();

        let config = Config::from_env().unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_url, "sqlite:tickoff.db?mode=rwc");
        assert_eq!(config.database_max_connections, 5);
        assert!(config.static_files_path.is_none());
        assert_eq!(config.cors_origins, vec!["http://localhost:8080".to_string()]);
        assert_eq!(config.identity_cookie, "user_id");
        assert_eq!(config.retention_months, 3);
        assert_eq!(config.sweep_interval_hours, 24);
    }

    #[test]
    fn test_config_from_env() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();

        env::set_var("HOST", "0.0.0.0");
        env::set_var("PORT", "3000");
        env::set_var("DATABASE_URL", "sqlite:test.db");
        env::set_var("STATIC_FILES_PATH", "./dist");
        env::set_var("CORS_ORIGINS", "http://a.test, http://b.test");
        env::set_var("IDENTITY_COOKIE", "tracker_id");
        env::set_var("RETENTION_MONTHS", "6");

        let config = Config::from_env().unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.database_url, "sqlite:test.db");
        assert_eq!(config.static_files_path, Some("./dist".to_string()));
        assert_eq!(config.cors_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(config.identity_cookie, "tracker_id");
        assert_eq!(config.retention_months, 6);

        // Clean up
        clear_env();
    }

    #[test]
    fn test_config_rejects_bad_number() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();

        env::set_var("PORT", "eighty");
        let err = Config::from_env().unwrap_err();
        assert_eq!(err.to_string(), "PORT must be a number, got \"eighty\"");

        clear_env();
    }

    #[test]
    fn test_config_rejects_zero_retention() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();

        env::set_var("RETENTION_MONTHS", "0");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::TooSmall {
                name: "RETENTION_MONTHS",
                min: 1,
                value: 0
            }
        ));
        assert_eq!(err.to_string(), "RETENTION_MONTHS must be at least 1, got 0");

        clear_env();
    }
}
