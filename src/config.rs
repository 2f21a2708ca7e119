use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::scheduler::{
    DEFAULT_BUFFER_CAPACITY, DEFAULT_CHANGE_EVENT_CAPACITY, DEFAULT_TARGET_PAGE_SIZE,
    SchedulerSettings,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse TOML from config file at {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("Failed to load config from environment: {0}")]
    Env(#[from] envy::Error),
    #[error("{0} is required")]
    Missing(&'static str),
}

/// Deployment profile; selects the default log level and format.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Local,
    Dev,
    #[default]
    Prod,
}

impl Environment {
    pub fn default_log_filter(self) -> &'static str {
        match self {
            Environment::Local => "debug,sea_orm=info,sqlx=warn",
            Environment::Dev => "info,sea_orm=warn,sqlx=warn",
            Environment::Prod => "warn,pingwatch=info,sqlx=warn",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_url: String,
    pub statistics_database_url: String,
    pub telegram_bot_token: Option<String>,
    pub environment: Environment,
    pub log_dir: String,
    pub max_db_connections: u32,
    pub default_poll_interval_secs: u64,
    pub flush_interval_secs: u64,
    pub refresh_check_interval_secs: u64,
    pub target_page_size: u64,
    pub buffer_capacity: usize,
    pub change_event_capacity: usize,
    pub max_concurrent_probes: Option<usize>,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug, PartialEq)]
struct PartialAppConfig {
    database_url: Option<String>,
    statistics_database_url: Option<String>,
    telegram_bot_token: Option<String>,
    environment: Option<Environment>,
    log_dir: Option<String>,
    max_db_connections: Option<u32>,
    default_poll_interval_secs: Option<u64>,
    flush_interval_secs: Option<u64>,
    refresh_check_interval_secs: Option<u64>,
    target_page_size: Option<u64>,
    buffer_capacity: Option<usize>,
    change_event_capacity: Option<usize>,
    max_concurrent_probes: Option<usize>,
}

impl PartialAppConfig {
    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let display = path.display().to_string();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }

    /// Fields set in `self` win over those in `fallback`.
    fn or(self, fallback: PartialAppConfig) -> PartialAppConfig {
        PartialAppConfig {
            database_url: self.database_url.or(fallback.database_url),
            statistics_database_url: self.statistics_database_url.or(fallback.statistics_database_url),
            telegram_bot_token: self.telegram_bot_token.or(fallback.telegram_bot_token),
            environment: self.environment.or(fallback.environment),
            log_dir: self.log_dir.or(fallback.log_dir),
            max_db_connections: self.max_db_connections.or(fallback.max_db_connections),
            default_poll_interval_secs: self
                .default_poll_interval_secs
                .or(fallback.default_poll_interval_secs),
            flush_interval_secs: self.flush_interval_secs.or(fallback.flush_interval_secs),
            refresh_check_interval_secs: self
                .refresh_check_interval_secs
                .or(fallback.refresh_check_interval_secs),
            target_page_size: self.target_page_size.or(fallback.target_page_size),
            buffer_capacity: self.buffer_capacity.or(fallback.buffer_capacity),
            change_event_capacity: self.change_event_capacity.or(fallback.change_event_capacity),
            max_concurrent_probes: self.max_concurrent_probes.or(fallback.max_concurrent_probes),
        }
    }

    fn finish(self) -> Result<AppConfig, ConfigError> {
        let database_url = self
            .database_url
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        Ok(AppConfig {
            statistics_database_url: self
                .statistics_database_url
                .unwrap_or_else(|| database_url.clone()),
            database_url,
            telegram_bot_token: self.telegram_bot_token.filter(|t| !t.trim().is_empty()),
            environment: self.environment.unwrap_or_default(),
            log_dir: self.log_dir.unwrap_or_else(|| "logs".to_string()),
            max_db_connections: self.max_db_connections.unwrap_or(10),
            default_poll_interval_secs: self.default_poll_interval_secs.unwrap_or(300),
            flush_interval_secs: self.flush_interval_secs.unwrap_or(30),
            refresh_check_interval_secs: self.refresh_check_interval_secs.unwrap_or(30),
            target_page_size: self.target_page_size.unwrap_or(DEFAULT_TARGET_PAGE_SIZE),
            buffer_capacity: self.buffer_capacity.unwrap_or(DEFAULT_BUFFER_CAPACITY),
            change_event_capacity: self
                .change_event_capacity
                .unwrap_or(DEFAULT_CHANGE_EVENT_CAPACITY),
            max_concurrent_probes: self.max_concurrent_probes,
        })
    }
}

impl AppConfig {
    /// Loads the TOML file at `config_path` (if it exists), then overlays
    /// environment variables. Environment wins.
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let file_config = match config_path {
            Some(path) => PartialAppConfig::from_file(Path::new(path))?,
            None => PartialAppConfig::default(),
        };
        let env_config: PartialAppConfig = envy::from_env()?;

        env_config.or(file_config).finish()
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            default_poll_interval: Duration::from_secs(self.default_poll_interval_secs),
            flush_interval: Duration::from_secs(self.flush_interval_secs),
            refresh_check_interval: Duration::from_secs(self.refresh_check_interval_secs),
            target_page_size: self.target_page_size,
            buffer_capacity: self.buffer_capacity,
            change_event_capacity: self.change_event_capacity,
            max_concurrent_probes: self.max_concurrent_probes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_minimal_file() {
        let partial: PartialAppConfig =
            toml::from_str(r#"database_url = "postgres://localhost/ping""#).unwrap();
        let config = partial.finish().unwrap();

        assert_eq!(config.statistics_database_url, "postgres://localhost/ping");
        assert_eq!(config.environment, Environment::Prod);
        assert_eq!(config.telegram_bot_token, None);

        let settings = config.scheduler_settings();
        assert_eq!(settings, SchedulerSettings::default());
    }

    #[test]
    fn test_env_layer_wins_over_file() {
        let file: PartialAppConfig = toml::from_str(
            r#"
            database_url = "postgres://file/ping"
            environment = "dev"
            flush_interval_secs = 60
            max_concurrent_probes = 32
            "#,
        )
        .unwrap();
        let env = PartialAppConfig {
            database_url: Some("postgres://env/ping".to_string()),
            flush_interval_secs: Some(5),
            ..Default::default()
        };

        let config = env.or(file).finish().unwrap();
        assert_eq!(config.database_url, "postgres://env/ping");
        assert_eq!(config.environment, Environment::Dev);
        assert_eq!(config.flush_interval_secs, 5);
        assert_eq!(config.max_concurrent_probes, Some(32));
    }

    #[test]
    fn test_missing_database_url() {
        let err = PartialAppConfig::default().finish().unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn test_blank_bot_token_disables_notifications() {
        let partial = PartialAppConfig {
            database_url: Some("postgres://localhost/ping".to_string()),
            telegram_bot_token: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(partial.finish().unwrap().telegram_bot_token, None);
    }
}
