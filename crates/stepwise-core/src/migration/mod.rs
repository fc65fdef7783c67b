//! The migration capability, the ordered catalog and the version record.

mod catalog;
mod traits;
mod version;

pub use catalog::Catalog;
pub use traits::{BoxFuture, Migration};
pub use version::VersionRecord;
