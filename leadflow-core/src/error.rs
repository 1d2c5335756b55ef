//! Error types for leadflow operations

use crate::identity::EntityType;
use thiserror::Error;
use uuid::Uuid;

/// Storage layer errors.
///
/// `NotFound` is the "referenced source or operator does not exist" signal;
/// every other variant is a persistence failure surfaced unchanged.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {entity_type:?} with id {id}")]
    NotFound { entity_type: EntityType, id: Uuid },

    #[error("Insert failed for {entity_type:?}: {reason}")]
    InsertFailed { entity_type: EntityType, reason: String },

    #[error("Constraint violation on {constraint}: {reason}")]
    ConstraintViolation { constraint: String, reason: String },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all leadflow errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LeadflowError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl LeadflowError {
    /// Shorthand for a not-found storage error.
    pub fn not_found(entity_type: EntityType, id: Uuid) -> Self {
        LeadflowError::Storage(StorageError::NotFound { entity_type, id })
    }

    /// True when a referenced entity does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, LeadflowError::Storage(StorageError::NotFound { .. }))
    }

    /// True for failures raised while persisting, as opposed to lookups.
    pub fn is_persistence_failure(&self) -> bool {
        matches!(self, LeadflowError::Storage(err) if !matches!(err, StorageError::NotFound { .. }))
    }
}

/// Result type alias for leadflow operations.
pub type LeadflowResult<T> = Result<T, LeadflowError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display_not_found() {
        let err = StorageError::NotFound {
            entity_type: EntityType::Source,
            id: Uuid::nil(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Entity not found"));
        assert!(msg.contains("Source"));
        assert!(msg.contains("00000000-0000-0000-0000-000000000000"));
    }

    #[test]
    fn test_constraint_violation_display() {
        let err = StorageError::ConstraintViolation {
            constraint: "uq_lead_external_id".to_string(),
            reason: "external_id x1 already exists".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("uq_lead_external_id"));
        assert!(msg.contains("x1"));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "default_weight".to_string(),
            value: "-1".to_string(),
            reason: "must be non-negative".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("default_weight"));
        assert!(msg.contains("-1"));
        assert!(msg.contains("must be non-negative"));
    }

    #[test]
    fn test_leadflow_error_from_variants() {
        let storage = LeadflowError::from(StorageError::LockPoisoned);
        assert!(matches!(storage, LeadflowError::Storage(_)));

        let validation = LeadflowError::from(ValidationError::RequiredFieldMissing {
            field: "name".to_string(),
        });
        assert!(matches!(validation, LeadflowError::Validation(_)));

        let config = LeadflowError::from(ConfigError::InvalidValue {
            field: "scenario".to_string(),
            value: "contacts = -1".to_string(),
            reason: "invalid TOML".to_string(),
        });
        assert!(matches!(config, LeadflowError::Config(_)));
    }

    #[test]
    fn test_not_found_is_not_a_persistence_failure() {
        let not_found = LeadflowError::not_found(EntityType::Operator, Uuid::nil());
        assert!(not_found.is_not_found());
        assert!(!not_found.is_persistence_failure());

        let failed = LeadflowError::from(StorageError::TransactionFailed {
            reason: "disk full".to_string(),
        });
        assert!(!failed.is_not_found());
        assert!(failed.is_persistence_failure());
    }

    #[test]
    fn test_storage_error_display_lock_poisoned() {
        let msg = format!("{}", StorageError::LockPoisoned);
        assert!(msg.contains("lock poisoned"));
    }
}
