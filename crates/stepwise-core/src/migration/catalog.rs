use std::collections::HashSet;
use std::fmt;

use super::traits::Migration;
use crate::error::{Result, StepwiseError};

/// Ordered, append-only list of migrations.
///
/// Positions are 1-based: index 0 is a no-op sentinel so that a migration's
/// index equals the version stored once it has committed. Released entries
/// must never be reordered or removed, only appended to.
pub struct Catalog<S> {
    migrations: Vec<Box<dyn Migration<S>>>,
    names: HashSet<String>,
}

impl<S> Catalog<S> {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self {
            migrations: Vec::new(),
            names: HashSet::new(),
        }
    }

    /// Append a migration, builder style.
    pub fn with<M>(mut self, migration: M) -> Result<Self>
    where
        M: Migration<S> + 'static,
    {
        self.push(Box::new(migration))?;
        Ok(self)
    }

    /// Append a migration. Names must be unique within the catalog.
    pub fn push(&mut self, migration: Box<dyn Migration<S>>) -> Result<()> {
        let name = migration.name().to_string();
        if name.trim().is_empty() {
            return Err(StepwiseError::InvalidArgument(format!(
                "Migration at index {} has an empty name",
                self.migrations.len() + 1
            )));
        }
        if !self.names.insert(name.clone()) {
            return Err(StepwiseError::InvalidArgument(format!(
                "Duplicate migration name: {}",
                name
            )));
        }
        self.migrations.push(migration);
        Ok(())
    }

    /// Number of real migrations (the highest reachable version).
    pub fn len(&self) -> u64 {
        self.migrations.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// Migration at 1-based `index`. The sentinel at 0 has no migration.
    pub fn get(&self, index: u64) -> Option<&dyn Migration<S>> {
        let slot = usize::try_from(index.checked_sub(1)?).ok()?;
        self.migrations.get(slot).map(|m| m.as_ref())
    }

    /// Migrations after `version`, in catalog order, with their indices.
    pub fn pending(&self, version: u64) -> impl Iterator<Item = (u64, &dyn Migration<S>)> + '_ {
        let start = usize::try_from(version).unwrap_or(usize::MAX);
        self.migrations
            .iter()
            .enumerate()
            .skip(start)
            .map(|(slot, m)| (slot as u64 + 1, m.as_ref()))
    }

    /// Names in catalog order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.migrations.iter().map(|m| m.name())
    }
}

impl<S> Default for Catalog<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for Catalog<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::BoxFuture;

    struct Noop(&'static str);

    impl Migration<()> for Noop {
        fn name(&self) -> &str {
            self.0
        }

        fn apply<'a>(&'a self, _scope: &'a mut ()) -> BoxFuture<'a, Result<()>> {
            Box::pin(async { Ok(()) })
        }
    }

    fn catalog() -> Catalog<()> {
        Catalog::new()
            .with(Noop("m1"))
            .and_then(|c| c.with(Noop("m2")))
            .and_then(|c| c.with(Noop("m3")))
            .unwrap()
    }

    #[test]
    fn test_indices_are_one_based() {
        let catalog = catalog();
        assert_eq!(catalog.len(), 3);
        assert!(catalog.get(0).is_none());
        assert_eq!(catalog.get(1).unwrap().name(), "m1");
        assert_eq!(catalog.get(3).unwrap().name(), "m3");
        assert!(catalog.get(4).is_none());
    }

    #[test]
    fn test_pending_from_version() {
        let catalog = catalog();

        let all: Vec<_> = catalog.pending(0).map(|(i, m)| (i, m.name())).collect();
        assert_eq!(all, vec![(1, "m1"), (2, "m2"), (3, "m3")]);

        let rest: Vec<_> = catalog.pending(2).map(|(i, m)| (i, m.name())).collect();
        assert_eq!(rest, vec![(3, "m3")]);

        assert_eq!(catalog.pending(3).count(), 0);
        assert_eq!(catalog.pending(10).count(), 0);
        assert_eq!(catalog.pending(u64::MAX).count(), 0);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let err = catalog().with(Noop("m2")).unwrap_err();
        assert!(matches!(err, StepwiseError::InvalidArgument(_)));
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(Catalog::<()>::new().with(Noop("  ")).is_err());
    }

    #[test]
    fn test_debug_lists_names() {
        assert_eq!(format!("{:?}", catalog()), r#"["m1", "m2", "m3"]"#);
    }

    #[test]
    fn test_apply_through_catalog() {
        let catalog = catalog();
        let mut scope = ();
        for (_, migration) in catalog.pending(0) {
            tokio_test::block_on(migration.apply(&mut scope)).unwrap();
        }
    }
}
