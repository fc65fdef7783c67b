use serde::{Deserialize, Serialize};

use crate::error::{Result, StepwiseError};

/// Persisted index of the last committed migration. `0` means none applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionRecord {
    pub version: u64,
}

impl VersionRecord {
    pub fn new(version: u64) -> Self {
        Self { version }
    }

    /// Decode a stored settings value. A null value is the initial record.
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value.clone()).map_err(|e| {
            StepwiseError::Persistence(format!("Invalid version record {}: {}", value, e))
        })
    }

    /// Encode for storage.
    pub fn to_value(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self)
            .map_err(|e| StepwiseError::Persistence(format!("Failed to encode version: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_is_initial_record() {
        let record = VersionRecord::from_value(&serde_json::Value::Null).unwrap();
        assert_eq!(record.version, 0);
    }

    #[test]
    fn test_stored_shape() {
        let value = VersionRecord::new(7).to_value().unwrap();
        assert_eq!(value, json!({ "version": 7 }));
        assert_eq!(VersionRecord::from_value(&value).unwrap().version, 7);
    }

    #[test]
    fn test_garbage_is_persistence_error() {
        let err = VersionRecord::from_value(&json!({ "version": -3 })).unwrap_err();
        assert!(matches!(err, StepwiseError::Persistence(_)));

        let err = VersionRecord::from_value(&json!("3")).unwrap_err();
        assert!(matches!(err, StepwiseError::Persistence(_)));
    }
}
