pub mod config;
pub mod error;
pub mod migration;

pub use config::StepwiseConfig;
pub use error::{Result, StepwiseError};
pub use migration::{BoxFuture, Catalog, Migration, VersionRecord};
