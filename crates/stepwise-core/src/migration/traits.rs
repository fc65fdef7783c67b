use std::future::Future;
use std::pin::Pin;

use crate::error::Result;

/// Boxed future returned by store and migration operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A single named step of the catalog.
///
/// `S` is the transactional scope handed out by the store backend. Everything
/// a migration does must go through the scope so that its effects commit or
/// roll back together with the version record.
pub trait Migration<S>: Send + Sync {
    /// Stable human-readable name, used in logs and errors.
    fn name(&self) -> &str;

    /// Apply the migration inside `scope`.
    fn apply<'a>(&'a self, scope: &'a mut S) -> BoxFuture<'a, Result<()>>;
}
