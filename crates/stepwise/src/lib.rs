//! Stepwise - versioned, resumable migrations for transactional stores.
//!
//! Build a [`Catalog`] of migrations, hand it to a [`MigrationRunner`] over a
//! store backend, and every entry past the stored version is applied once,
//! in order, each in its own transaction.

#[doc(hidden)]
pub use stepwise_core;

pub use stepwise_core::config::{DatabaseConfig, MigrationsConfig, StepwiseConfig};
pub use stepwise_core::{BoxFuture, Catalog, Migration, Result, StepwiseError, VersionRecord};
pub use stepwise_runtime::{
    load_catalog_from_dir, load_migrations_from_dir, Database, MemoryScope, MemoryStore,
    MigrationRunner, MigrationStatus, MigrationStore, PgScope, PgStore, RunReport, SqlMigration,
    VersionStore,
};
