mod runner;
mod sql;
mod version;

pub use runner::{MigrationRunner, MigrationStatus, RunReport};
pub use sql::{load_catalog_from_dir, load_migrations_from_dir, SqlMigration};
pub use version::VersionStore;
