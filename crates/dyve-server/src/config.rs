use std::fmt;
use std::time::Duration;

use dyve_cloudfoundry::CloudFoundryConfig;
use dyve_db_postgres::PostgresConfig;
use dyve_github::GitHubConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config build error: {0}")]
    Build(#[source] config::ConfigError),

    #[error("config deserialize error: {0}")]
    Deserialize(#[source] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<String> for ConfigError {
    fn from(message: String) -> Self {
        Self::Invalid(message)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }

        let rc = &self.reconciliation;
        if rc.workers == 0 {
            return Err("reconciliation.workers must be > 0".into());
        }
        if rc.poll_interval_ms == 0 {
            return Err("reconciliation.poll_interval_ms must be > 0".into());
        }
        if rc.older_than_secs == 0 {
            return Err("reconciliation.older_than_secs must be > 0".into());
        }

        if self.storage.backend == StorageBackend::Postgres {
            let pg = &self.storage.postgres;
            let url = parse_url("storage.postgres.url", &pg.url)?;
            if !matches!(url.scheme(), "postgres" | "postgresql") {
                return Err("storage.postgres.url must use the postgres:// scheme".into());
            }
            if pg.pool_size == 0 {
                return Err("storage.postgres.pool_size must be > 0".into());
            }
        }

        match self.provider.kind {
            ProviderKind::CloudFoundry => {
                let cf = &self.provider.cloudfoundry;
                cf.validate()?;
                parse_url("provider.cloudfoundry.api", &cf.api)?;
                if let Some(token_url) = &cf.token_url {
                    parse_url("provider.cloudfoundry.token_url", token_url)?;
                }
            }
            ProviderKind::GitHub => {
                let gh = &self.provider.github;
                gh.validate()?;
                parse_url("provider.github.api_url", &gh.api_url)?;
            }
        }
        Ok(())
    }
}

fn parse_url(field: &str, value: &str) -> Result<Url, String> {
    Url::parse(value).map_err(|e| format!("{field} is not a valid URL: {e}"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

/// Worker pool and lease timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    pub workers: usize,
    /// Backoff after an idle poll.
    pub poll_interval_ms: u64,
    /// Minimum age of an entity's last reconcile before it can be leased
    /// again. Also bounds how long one handler may safely run.
    pub older_than_secs: u64,
    /// Upper bound of the random delay before each worker's first poll.
    pub startup_jitter_ms: u64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            poll_interval_ms: 1000,
            older_than_secs: 60,
            startup_jitter_ms: 0,
        }
    }
}

impl ReconciliationConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn older_than(&self) -> Duration {
        Duration::from_secs(self.older_than_secs)
    }

    pub fn startup_jitter(&self) -> Duration {
        Duration::from_millis(self.startup_jitter_ms)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str("memory"),
            Self::Postgres => f.write_str("postgres"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default)]
    pub postgres: PostgresConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderKind {
    #[default]
    #[serde(rename = "cloudfoundry")]
    CloudFoundry,
    #[serde(rename = "github")]
    GitHub,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CloudFoundry => f.write_str("cloudfoundry"),
            Self::GitHub => f.write_str("github"),
        }
    }
}

/// Which upstream this process mirrors. Only the section matching `kind`
/// is validated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub kind: ProviderKind,
    #[serde(default)]
    pub cloudfoundry: CloudFoundryConfig,
    #[serde(default)]
    pub github: GitHubConfig,
}

pub mod loader {
    use super::{AppConfig, ConfigError};
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub const DEFAULT_CONFIG_PATH: &str = "dyve.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, ConfigError> {
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
        let mut builder = Config::builder();
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., DYVE__RECONCILIATION__WORKERS=8
        builder = builder.add_source(
            Environment::with_prefix("DYVE")
                .try_parsing(true)
                .separator("__"),
        );
        let merged: AppConfig = builder
            .build()
            .map_err(ConfigError::Build)?
            .try_deserialize()
            .map_err(ConfigError::Deserialize)?;
        merged.validate()?;
        Ok(merged)
    }
}
