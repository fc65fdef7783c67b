use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use stepwise_core::{BoxFuture, Result, StepwiseError};

use super::MigrationStore;

/// In-process store with snapshot transactions.
///
/// Each scope works on a private copy of the committed state and replaces it
/// on commit. That is only sound with a single writer, which is what the run
/// lock guarantees. Faults can be injected to exercise failure paths.
#[derive(Clone, Default)]
pub struct MemoryStore {
    committed: Arc<RwLock<MemoryState>>,
    faults: Arc<RwLock<Faults>>,
    counters: Arc<RwLock<Counters>>,
    run_lock: Arc<Mutex<()>>,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    settings: BTreeMap<String, serde_json::Value>,
    data: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Default)]
struct Faults {
    begin: bool,
    setting_writes: bool,
    commits: bool,
}

#[derive(Debug, Default)]
struct Counters {
    commits: usize,
    rollbacks: usize,
}

/// Scope handed to migrations running against a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryScope {
    state: MemoryState,
}

impl MemoryScope {
    /// Read a data entry as seen by this scope.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.state.data.get(key)
    }

    /// Write a data entry.
    pub fn put(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.state.data.insert(key.into(), value);
    }

    /// Remove a data entry.
    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.state.data.remove(key)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed data entry.
    pub async fn data(&self, key: &str) -> Option<serde_json::Value> {
        self.committed.read().await.data.get(key).cloned()
    }

    /// Committed setting.
    pub async fn setting(&self, key: &str) -> Option<serde_json::Value> {
        self.committed.read().await.settings.get(key).cloned()
    }

    /// Seed a committed setting, e.g. a version left behind by an earlier run.
    pub async fn seed_setting(&self, key: impl Into<String>, value: serde_json::Value) {
        self.committed
            .write()
            .await
            .settings
            .insert(key.into(), value);
    }

    /// Make `begin` fail until switched off.
    pub async fn fail_begin(&self, on: bool) {
        self.faults.write().await.begin = on;
    }

    /// Make settings writes inside a scope fail until switched off.
    pub async fn fail_setting_writes(&self, on: bool) {
        self.faults.write().await.setting_writes = on;
    }

    /// Make commits fail until switched off.
    pub async fn fail_commits(&self, on: bool) {
        self.faults.write().await.commits = on;
    }

    /// Number of successful commits.
    pub async fn commits(&self) -> usize {
        self.counters.read().await.commits
    }

    /// Number of rollbacks.
    pub async fn rollbacks(&self) -> usize {
        self.counters.read().await.rollbacks
    }

    /// Whether the run lock is currently free.
    pub fn is_unlocked(&self) -> bool {
        self.run_lock.try_lock().is_ok()
    }
}

impl MigrationStore for MemoryStore {
    type Scope = MemoryScope;
    type Lock = OwnedMutexGuard<()>;

    fn begin(&self) -> BoxFuture<'_, Result<MemoryScope>> {
        Box::pin(async move {
            if self.faults.read().await.begin {
                return Err(StepwiseError::Persistence(
                    "injected fault: begin".to_string(),
                ));
            }
            let state = self.committed.read().await.clone();
            Ok(MemoryScope { state })
        })
    }

    fn commit(&self, scope: MemoryScope) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.faults.read().await.commits {
                self.counters.write().await.rollbacks += 1;
                return Err(StepwiseError::Persistence(
                    "injected fault: commit".to_string(),
                ));
            }
            *self.committed.write().await = scope.state;
            self.counters.write().await.commits += 1;
            Ok(())
        })
    }

    fn rollback(&self, scope: MemoryScope) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            drop(scope);
            self.counters.write().await.rollbacks += 1;
            Ok(())
        })
    }

    fn load_or_init_setting<'a>(
        &'a self,
        key: &'a str,
        default: serde_json::Value,
    ) -> BoxFuture<'a, Result<serde_json::Value>> {
        Box::pin(async move {
            let mut state = self.committed.write().await;
            Ok(state
                .settings
                .entry(key.to_string())
                .or_insert(default)
                .clone())
        })
    }

    fn store_setting<'a>(
        &'a self,
        scope: &'a mut MemoryScope,
        key: &'a str,
        value: serde_json::Value,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if self.faults.read().await.setting_writes {
                return Err(StepwiseError::Persistence(format!(
                    "injected fault: write {}",
                    key
                )));
            }
            scope.state.settings.insert(key.to_string(), value);
            Ok(())
        })
    }

    fn lock(&self) -> BoxFuture<'_, Result<OwnedMutexGuard<()>>> {
        Box::pin(async move { Ok(self.run_lock.clone().lock_owned().await) })
    }

    fn unlock(&self, lock: OwnedMutexGuard<()>) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            drop(lock);
            Ok(())
        })
    }
}
