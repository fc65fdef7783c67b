//! Migration runner.
//!
//! Applies every catalog entry past the stored version, one transaction per
//! migration. The version record is written inside the same transaction, so a
//! crash or failure leaves the store at the last committed step and the next
//! run resumes there. Optionally holds a store-level lock for the whole run so
//! that only one runner works against a store at a time.

use std::sync::Arc;
use std::time::Instant;

use stepwise_core::config::MigrationsConfig;
use stepwise_core::{Catalog, Migration, Result, StepwiseError};
use tracing::{debug, error, info, warn};

use super::version::VersionStore;
use crate::store::MigrationStore;

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Stored version before the run.
    pub from_version: u64,
    /// Stored version after the run.
    pub to_version: u64,
    /// Names of the migrations committed by this run, in order.
    pub applied: Vec<String>,
}

impl RunReport {
    fn starting_at(version: u64) -> Self {
        Self {
            from_version: version,
            to_version: version,
            applied: Vec::new(),
        }
    }

    /// True when nothing was pending.
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Applied/pending split of a catalog against the stored version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub version: u64,
    pub applied: Vec<String>,
    pub pending: Vec<String>,
    /// The store was migrated by a longer catalog than the one given.
    pub ahead: bool,
}

/// Runs catalogs against a store.
pub struct MigrationRunner<S: MigrationStore> {
    store: Arc<S>,
    versions: VersionStore<S>,
    exclusive: bool,
}

impl<S: MigrationStore> MigrationRunner<S> {
    /// Runner with the default version key and the run lock enabled.
    pub fn new(store: S) -> Self {
        let store = Arc::new(store);
        Self {
            versions: VersionStore::new(store.clone()),
            store,
            exclusive: true,
        }
    }

    /// Runner configured from the `[migrations]` section.
    pub fn from_config(store: S, config: &MigrationsConfig) -> Self {
        Self::new(store)
            .with_version_key(&config.version_key)
            .with_lock(config.lock)
    }

    /// Store the version record under `key`.
    pub fn with_version_key(mut self, key: impl Into<String>) -> Self {
        self.versions = VersionStore::with_key(self.store.clone(), key);
        self
    }

    /// Enable or disable the run lock.
    pub fn with_lock(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }

    pub fn versions(&self) -> &VersionStore<S> {
        &self.versions
    }

    /// Apply all pending migrations in catalog order.
    ///
    /// Stops at the first failure with [`StepwiseError::MigrationFailed`];
    /// migrations committed before it stay applied.
    pub async fn run(&self, catalog: &Catalog<S::Scope>) -> Result<RunReport> {
        let lock = if self.exclusive {
            Some(self.store.lock().await?)
        } else {
            None
        };

        let result = self.run_pending(catalog).await;

        // Always release lock, even on error
        if let Some(lock) = lock {
            if let Err(e) = self.store.unlock(lock).await {
                warn!("Failed to release migration lock: {}", e);
            }
        }

        result
    }

    /// Report which catalog entries are committed without applying anything.
    pub async fn status(&self, catalog: &Catalog<S::Scope>) -> Result<MigrationStatus> {
        let version = self.versions.get().await?.version;
        let split = usize::try_from(version.min(catalog.len())).unwrap_or(usize::MAX);

        let mut applied: Vec<String> = catalog.names().map(str::to_string).collect();
        let pending = applied.split_off(split);

        Ok(MigrationStatus {
            version,
            applied,
            pending,
            ahead: version > catalog.len(),
        })
    }

    async fn run_pending(&self, catalog: &Catalog<S::Scope>) -> Result<RunReport> {
        let version = self.versions.get().await?.version;
        let mut report = RunReport::starting_at(version);

        if version > catalog.len() {
            warn!(
                version,
                catalog_len = catalog.len(),
                "Stored version is ahead of the catalog, nothing to apply"
            );
            return Ok(report);
        }

        let pending = catalog.len() - version;
        if pending == 0 {
            debug!(version, "No pending migrations");
            return Ok(report);
        }

        info!(version, pending, "Running pending migrations");

        for (index, migration) in catalog.pending(version) {
            self.apply_one(index, migration).await?;
            report.to_version = index;
            report.applied.push(migration.name().to_string());
        }

        info!(
            from = report.from_version,
            to = report.to_version,
            "Migrations complete"
        );
        Ok(report)
    }

    async fn apply_one(&self, index: u64, migration: &dyn Migration<S::Scope>) -> Result<()> {
        let name = migration.name();
        let started = Instant::now();
        info!(index, migration = %name, "Applying migration");

        let mut scope = self
            .store
            .begin()
            .await
            .map_err(|cause| self.failed(name, index, cause))?;

        let outcome = match migration.apply(&mut scope).await {
            Ok(()) => self.versions.set(&mut scope, index).await,
            Err(e) => Err(e),
        };

        if let Err(cause) = outcome {
            if let Err(e) = self.store.rollback(scope).await {
                warn!(index, migration = %name, "Rollback failed: {}", e);
            }
            return Err(self.failed(name, index, cause));
        }

        self.store
            .commit(scope)
            .await
            .map_err(|cause| self.failed(name, index, cause))?;

        info!(
            index,
            migration = %name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Migration applied"
        );
        Ok(())
    }

    fn failed(&self, name: &str, index: u64, cause: StepwiseError) -> StepwiseError {
        error!(index, migration = %name, "Migration failed: {}", cause);
        StepwiseError::migration_failed(name, index, cause)
    }
}
