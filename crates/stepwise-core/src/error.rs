use thiserror::Error;

/// Core error type for Stepwise operations.
#[derive(Error, Debug)]
pub enum StepwiseError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Reading or writing the version record, or managing the underlying
    /// connection, failed.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A specific migration could not be applied, recorded or committed.
    #[error("Migration {index} ({name}) failed: {cause}")]
    MigrationFailed {
        name: String,
        index: u64,
        #[source]
        cause: Box<StepwiseError>,
    },

    /// Free-form failure raised from inside a migration body.
    #[error("{0}")]
    Apply(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl StepwiseError {
    /// Wrap `cause` as the failure of the migration at `index`.
    pub fn migration_failed(name: impl Into<String>, index: u64, cause: StepwiseError) -> Self {
        StepwiseError::MigrationFailed {
            name: name.into(),
            index,
            cause: Box::new(cause),
        }
    }

    /// Name of the failed migration, if this is a migration failure.
    pub fn failed_migration(&self) -> Option<&str> {
        match self {
            StepwiseError::MigrationFailed { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for StepwiseError {
    fn from(e: serde_json::Error) -> Self {
        StepwiseError::Serialization(e.to_string())
    }
}

/// Result type alias using StepwiseError.
pub type Result<T> = std::result::Result<T, StepwiseError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_migration_failed_names_step() {
        let err = StepwiseError::migration_failed(
            "0002_add_tags",
            2,
            StepwiseError::Apply("column exists".into()),
        );

        assert_eq!(err.failed_migration(), Some("0002_add_tags"));
        assert_eq!(
            err.to_string(),
            "Migration 2 (0002_add_tags) failed: column exists"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn test_failed_migration_none_for_other_errors() {
        let err = StepwiseError::Persistence("connection refused".into());
        assert!(err.failed_migration().is_none());
    }

    #[test]
    fn test_from_serde_json_error() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: StepwiseError = parse.unwrap_err().into();
        assert!(matches!(err, StepwiseError::Serialization(_)));
    }
}
