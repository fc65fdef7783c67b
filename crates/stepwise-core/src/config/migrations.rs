use serde::{Deserialize, Serialize};

/// Default settings key holding the version record.
pub const DEFAULT_VERSION_KEY: &str = "migration_version";

/// Migration runner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationsConfig {
    /// Directory holding `*.sql` migration files.
    #[serde(default = "default_dir")]
    pub dir: String,

    /// Settings key under which the version record is stored.
    #[serde(default = "default_version_key")]
    pub version_key: String,

    /// Hold an exclusive store lock for the whole run.
    #[serde(default = "default_lock")]
    pub lock: bool,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            version_key: default_version_key(),
            lock: default_lock(),
        }
    }
}

fn default_dir() -> String {
    "migrations".to_string()
}

fn default_version_key() -> String {
    DEFAULT_VERSION_KEY.to_string()
}

fn default_lock() -> bool {
    true
}
