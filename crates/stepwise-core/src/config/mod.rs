mod database;
mod migrations;

pub use database::DatabaseConfig;
pub use migrations::{MigrationsConfig, DEFAULT_VERSION_KEY};

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, StepwiseError};

/// Root configuration for Stepwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepwiseConfig {
    /// Database configuration.
    pub database: DatabaseConfig,

    /// Migration runner configuration.
    #[serde(default)]
    pub migrations: MigrationsConfig,
}

impl StepwiseConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| StepwiseError::Config(format!("Failed to read config file: {}", e)))?;

        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let content = substitute_env_vars(content);

        let config: Self = toml::from_str(&content)
            .map_err(|e| StepwiseError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;

        tracing::debug!(version_key = %config.migrations.version_key, "Configuration loaded");
        Ok(config)
    }

    /// Configuration with defaults for everything but the database URL.
    pub fn default_with_database_url(url: &str) -> Self {
        Self {
            database: DatabaseConfig {
                url: url.to_string(),
                ..Default::default()
            },
            migrations: MigrationsConfig::default(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.database.url.trim().is_empty() {
            return Err(StepwiseError::Config("database.url must be set".into()));
        }
        for (field, value) in [
            ("database.url", &self.database.url),
            ("migrations.dir", &self.migrations.dir),
            ("migrations.version_key", &self.migrations.version_key),
        ] {
            if let Some(var) = unresolved_placeholder(value) {
                return Err(StepwiseError::Config(format!(
                    "{} uses ${{{}}} but that environment variable is not set",
                    field, var
                )));
            }
        }
        if self.database.pool_size < 2 && self.migrations.lock {
            return Err(StepwiseError::Config(
                "database.pool_size must be at least 2 when migrations.lock is enabled".into(),
            ));
        }
        if self.migrations.version_key.trim().is_empty() {
            return Err(StepwiseError::Config(
                "migrations.version_key must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Substitute environment variables in the format ${VAR_NAME}.
fn substitute_env_vars(content: &str) -> String {
    let mut result = content.to_string();
    let re = match regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}") {
        Ok(re) => re,
        Err(_) => return result,
    };

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}

/// Name of the first `${VAR}` left in `value` after substitution.
fn unresolved_placeholder(value: &str) -> Option<&str> {
    let start = value.find("${")? + 2;
    let len = value[start..].find('}')?;
    Some(&value[start..start + len])
}
