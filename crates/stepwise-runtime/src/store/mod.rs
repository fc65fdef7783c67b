//! Storage collaborators the runner drives.
//!
//! A backend hands out transactional scopes, persists small JSON settings
//! values and optionally provides an exclusive lock for a whole run.

mod memory;
mod postgres;

pub use memory::{MemoryScope, MemoryStore};
pub use postgres::{PgScope, PgStore, SETTINGS_TABLE};

use stepwise_core::{BoxFuture, Result};

/// Transactional key/value backend used by the version store and runner.
pub trait MigrationStore: Send + Sync + 'static {
    /// Atomic unit of work. Dropping a scope without committing discards it.
    type Scope: Send + 'static;
    /// Proof of holding the run lock.
    type Lock: Send;

    /// Open a fresh scope.
    fn begin(&self) -> BoxFuture<'_, Result<Self::Scope>>;

    /// Make the scope's effects durable.
    fn commit(&self, scope: Self::Scope) -> BoxFuture<'_, Result<()>>;

    /// Discard the scope's effects.
    fn rollback(&self, scope: Self::Scope) -> BoxFuture<'_, Result<()>>;

    /// Read the setting at `key`, inserting `default` first if it is absent.
    /// Runs outside any scope.
    fn load_or_init_setting<'a>(
        &'a self,
        key: &'a str,
        default: serde_json::Value,
    ) -> BoxFuture<'a, Result<serde_json::Value>>;

    /// Write the setting at `key` as part of `scope`.
    fn store_setting<'a>(
        &'a self,
        scope: &'a mut Self::Scope,
        key: &'a str,
        value: serde_json::Value,
    ) -> BoxFuture<'a, Result<()>>;

    /// Block until no other runner holds the lock, then take it.
    fn lock(&self) -> BoxFuture<'_, Result<Self::Lock>>;

    /// Release a lock taken with [`MigrationStore::lock`].
    fn unlock(&self, lock: Self::Lock) -> BoxFuture<'_, Result<()>>;
}
