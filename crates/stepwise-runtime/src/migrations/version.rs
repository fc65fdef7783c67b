use std::sync::Arc;

use stepwise_core::config::DEFAULT_VERSION_KEY;
use stepwise_core::{Result, VersionRecord};
use tracing::debug;

use crate::store::MigrationStore;

/// Reads and writes the singleton version record.
pub struct VersionStore<S: MigrationStore> {
    store: Arc<S>,
    key: String,
}

impl<S: MigrationStore> VersionStore<S> {
    /// Version store under the default `migration_version` key.
    pub fn new(store: Arc<S>) -> Self {
        Self::with_key(store, DEFAULT_VERSION_KEY)
    }

    pub fn with_key(store: Arc<S>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Current record, created as version 0 if absent.
    pub async fn get(&self) -> Result<VersionRecord> {
        let initial = VersionRecord::default().to_value()?;
        let value = self.store.load_or_init_setting(&self.key, initial).await?;
        let record = VersionRecord::from_value(&value)?;
        debug!(key = %self.key, version = record.version, "Read version record");
        Ok(record)
    }

    /// Record `version` as part of `scope`. Does not commit.
    pub async fn set(&self, scope: &mut S::Scope, version: u64) -> Result<()> {
        let value = VersionRecord::new(version).to_value()?;
        self.store.store_setting(scope, &self.key, value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;
    use stepwise_core::StepwiseError;

    #[tokio::test]
    async fn test_get_creates_initial_record() {
        let store = MemoryStore::new();
        let versions = VersionStore::new(Arc::new(store.clone()));

        assert_eq!(versions.get().await.unwrap().version, 0);
        assert_eq!(
            store.setting("migration_version").await,
            Some(json!({ "version": 0 }))
        );
    }

    #[tokio::test]
    async fn test_null_value_reads_as_zero() {
        let store = MemoryStore::new();
        store.seed_setting("migration_version", serde_json::Value::Null).await;

        let versions = VersionStore::new(Arc::new(store));
        assert_eq!(versions.get().await.unwrap().version, 0);
    }

    #[tokio::test]
    async fn test_set_is_visible_after_commit_only() {
        let store = MemoryStore::new();
        let versions = VersionStore::with_key(Arc::new(store.clone()), "hub_version");
        versions.get().await.unwrap();

        let mut scope = store.begin().await.unwrap();
        versions.set(&mut scope, 5).await.unwrap();
        assert_eq!(versions.get().await.unwrap().version, 0);

        store.commit(scope).await.unwrap();
        assert_eq!(versions.get().await.unwrap().version, 5);
    }

    #[tokio::test]
    async fn test_set_failure_is_persistence_error() {
        let store = MemoryStore::new();
        let versions = VersionStore::new(Arc::new(store.clone()));
        store.fail_setting_writes(true).await;

        let mut scope = store.begin().await.unwrap();
        let err = versions.set(&mut scope, 1).await.unwrap_err();
        assert!(matches!(err, StepwiseError::Persistence(_)));
    }

    #[tokio::test]
    async fn test_corrupt_record_is_rejected() {
        let store = MemoryStore::new();
        store
            .seed_setting("migration_version", json!({ "revision": "x" }))
            .await;

        let versions = VersionStore::new(Arc::new(store));
        assert!(matches!(
            versions.get().await,
            Err(StepwiseError::Persistence(_))
        ));
    }
}
