pub mod db;
pub mod migrations;
pub mod store;

pub use db::Database;
pub use migrations::{
    load_catalog_from_dir, load_migrations_from_dir, MigrationRunner, MigrationStatus, RunReport,
    SqlMigration, VersionStore,
};
pub use store::{MemoryScope, MemoryStore, MigrationStore, PgScope, PgStore};
